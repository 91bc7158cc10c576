//! # Kernel Physical Memory Management
//!
//! This crate hands out and reclaims 4 KiB physical frames and tracks how many
//! owners share each frame, which is what makes copy-on-write `fork` safe:
//! releasing one process's mapping of a shared frame must never free it out
//! from under the others.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          Physical Memory Manager (frame_alloc)      │
//! │    • initialize / add_range                         │
//! │    • allocate_page / free_page                      │
//! │    • copy-on-write release policy                   │
//! └────────────┬───────────────────────────┬────────────┘
//!              │                           │
//! ┌────────────▼─────────────┐ ┌───────────▼────────────┐
//! │   Free List (free_list)  │ │ Ref Counts (ref_count) │
//! │  • intrusive LIFO chain  │ │ • one u16 per frame    │
//! │  • own spin lock         │ │ • own spin lock        │
//! └────────────┬─────────────┘ └────────────────────────┘
//!              │
//! ┌────────────▼─────────────┐
//! │ Physical Mapper          │
//! │ (phys_mapper)            │
//! │  • PA → pointer          │
//! └──────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Physical Memory Manager ([`frame_alloc`])
//! [`PhysicalMemoryManager`](frame_alloc::PhysicalMemoryManager) is the
//! context object owning both structures. It is built once at boot and
//! passed to the virtual memory and process layers. A frame is always either
//! on the free list with count 0, or live with count ≥ 1.
//!
//! ### Free List ([`free_list`])
//! Free frames are linked through their own first word, so tracking free
//! memory costs no memory. The only code that reinterprets frame contents.
//!
//! ### Reference Counts ([`ref_count`])
//! A fixed-capacity table of owner counts indexed by frame number, with a
//! maximum sharing count and underflow detection.
//!
//! ### Physical Mapper ([`phys_mapper`])
//! Converts physical addresses into pointers, so the same allocator runs on
//! identity-mapped RAM in the kernel and on a host buffer in tests.
//!
//! ### Global Instance ([`global`])
//! A single boot-time manager for code that cannot be handed one explicitly.
//!
//! ## Fill Patterns
//!
//! Freed frames are filled with `0x01` and freshly allocated frames with
//! `0x05`, so reads of stale or uninitialized memory are recognizable.
//! Allocation never zeroes; callers that need zeroed memory clear it.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::frame_alloc::{FreeOutcome, PhysicalMemoryManager};
//! use kernel_alloc::phys_mapper::OffsetPhysMapper;
//! use kernel_info::layout::PhysicalMemoryLayout;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! #[repr(C, align(4096))]
//! struct Ram([u8; 4 * 4096]);
//! let mut ram = Box::new(Ram([0; 4 * 4096]));
//!
//! let base = PhysicalAddress::new(0x8000_0000);
//! let layout = PhysicalMemoryLayout::new(base, base + 4 * 4096).unwrap();
//! let mapper = OffsetPhysMapper::for_window(base, ram.0.as_mut_ptr());
//! let pmm: PhysicalMemoryManager<_, 4> =
//!     unsafe { PhysicalMemoryManager::new(layout, mapper) }.unwrap();
//! assert_eq!(pmm.initialize(), 4);
//!
//! let frame = pmm.allocate_page().unwrap();
//! pmm.increment(frame.base()).unwrap(); // shared by a forked child
//! assert_eq!(pmm.free_page(frame.base()), FreeOutcome::Shared { remaining: 1 });
//! assert_eq!(pmm.free_page(frame.base()), FreeOutcome::Reclaimed);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod frame_alloc;
pub mod free_list;
pub mod global;
pub mod phys_mapper;
pub mod ref_count;
