//! # Kernel Memory Configuration
//!
//! This crate is the single source of truth for the physical memory
//! configuration shared by the kernel and its physical memory manager.
//!
//! ## Overview
//!
//! ### Memory Constants ([`memory`])
//! Compile-time configuration of the machine's RAM and the allocator:
//! * **RAM bounds**: [`KERNBASE`](memory::KERNBASE) and
//!   [`PHYSTOP`](memory::PHYSTOP) of the `virt` machine
//! * **Table capacity**: [`MAX_FRAMES`](memory::MAX_FRAMES), one reference
//!   count slot per frame between the two
//! * **Fill patterns**: [`FREE_FILL`](memory::FREE_FILL) and
//!   [`ALLOC_FILL`](memory::ALLOC_FILL), written over frames on free and on
//!   allocation so stale or uninitialized accesses stand out
//! * **Sharing limit**: [`MAX_REFCOUNT`](memory::MAX_REFCOUNT)
//!
//! ### Runtime Layout ([`layout`])
//! [`PhysicalMemoryLayout`](layout::PhysicalMemoryLayout) combines the
//! linker-provided end of the kernel image with the memory ceiling, validates
//! the pair, and defines the frame index used by the reference count table.
//!
//! ```text
//! Physical Memory Layout:
//! 0x8000_0000 ┌─────────────────────────────────┐ KERNBASE
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//!             ├─────────────────────────────────┤ kernel_end
//!             │    Available RAM                │
//!             │  (Managed by allocator)         │
//! 0x8800_0000 └─────────────────────────────────┘ PHYSTOP
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::layout::PhysicalMemoryLayout;
//! use kernel_info::memory::{KERNBASE, MAX_FRAMES};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let kernel_end = PhysicalAddress::new(KERNBASE + 0x4_2345);
//! let layout = PhysicalMemoryLayout::with_default_top(kernel_end).unwrap();
//! assert!(layout.frame_count() <= MAX_FRAMES);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod layout;
pub mod memory;
