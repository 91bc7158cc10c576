//! # Physical Memory Access
//!
//! The allocator stores its free-list links *inside* free frames and stamps
//! fill patterns over frames on allocation and release, so it must be able to
//! touch physical memory. Code can only dereference virtual addresses; a
//! [`PhysMapper`] turns a physical address into a usable pointer.
//!
//! The mapping strategy differs between environments, so it is a trait:
//! - [`IdentityPhysMapper`]: physical memory is identity-mapped (the kernel
//!   runs with paging off or with a direct 1:1 map of RAM).
//! - [`OffsetPhysMapper`]: physical memory appears at a fixed offset, as with
//!   a higher-half direct map, or a host buffer standing in for RAM in tests.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::{OffsetPhysMapper, PhysMapper};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let mapper = OffsetPhysMapper::new(0xffff_8880_0000_0000);
//! let ptr = unsafe { mapper.phys_to_ptr(PhysicalAddress::new(0x8000_0000)) };
//! assert_eq!(ptr as u64, 0xffff_8880_8000_0000);
//! ```

use kernel_memory_addresses::PhysicalAddress;

/// Translation from physical addresses to dereferenceable pointers.
pub trait PhysMapper {
    /// Pointer through which the byte at `pa` can be accessed.
    ///
    /// # Safety
    /// - The mapping must be present and cover the referenced physical range.
    /// - The returned pointer must only be used for memory the caller owns.
    unsafe fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;
}

/// [`PhysMapper`] for identity-mapped physical memory (`va == pa`).
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        pa.as_u64() as usize as *mut u8
    }
}

/// [`PhysMapper`] for physical memory mapped at `va = pa + offset`.
///
/// The offset wraps, so a region can also be mapped *below* its physical
/// address (e.g. a host buffer standing in for RAM at `0x8000_0000`).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OffsetPhysMapper {
    offset: u64,
}

impl OffsetPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Mapper that places physical address `phys_base` at `window`.
    #[must_use]
    pub fn for_window(phys_base: PhysicalAddress, window: *mut u8) -> Self {
        Self::new((window as usize as u64).wrapping_sub(phys_base.as_u64()))
    }
}

impl PhysMapper for OffsetPhysMapper {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        pa.as_u64().wrapping_add(self.offset) as usize as *mut u8
    }
}
