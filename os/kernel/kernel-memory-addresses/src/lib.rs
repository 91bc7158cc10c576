//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses and the page frames the
//! physical memory manager hands out.
//!
//! ## Overview
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address. |
//! | [`PhysicalFrame<S>`] | The page-aligned base of a physical frame of size `S`. |
//! | [`PageSize`] | Marker trait carrying [`SIZE`](PageSize::SIZE) and [`SHIFT`](PageSize::SHIFT). |
//!
//! Only [`Size4K`] frames exist; the allocator has no larger granularity.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let start = PhysicalAddress::new(0x8002_1234);
//! let first = start.align_up::<Size4K>().unwrap();
//! let frame = PhysicalFrame::<Size4K>::from_aligned(first).unwrap();
//! assert_eq!(frame.base().as_u64(), 0x8002_2000);
//! assert_eq!(frame.next().unwrap().base().as_u64(), 0x8002_3000);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and zero-cost.
//! - Alignment helpers are `const fn` so layout constants can be validated at
//!   compile time.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_size;
mod physical_address;
mod physical_frame;

pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;

/// Size of the allocator's frames in bytes.
pub const PAGE_SIZE: u64 = Size4K::SIZE;
