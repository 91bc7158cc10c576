//! # Kernel-Wide Physical Memory Manager
//!
//! Most of the kernel should be handed a [`PhysicalMemoryManager`] explicitly.
//! Code that cannot be (trap handlers, early process setup) reaches the one
//! boot-time instance through the free functions here. The instance assumes
//! identity-mapped physical memory.
//!
//! The instance is a `static` built at compile time; [`init`] only hands it
//! the layout, so booting never copies the count table through a stack.
//!
//! ```rust,no_run
//! use kernel_alloc::global;
//! use kernel_info::layout::PhysicalMemoryLayout;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! # let kernel_end = PhysicalAddress::new(0x8002_1000);
//! let layout = PhysicalMemoryLayout::with_default_top(kernel_end).unwrap();
//! unsafe { global::init(layout) }.unwrap();
//!
//! let frame = global::allocate_page().expect("out of memory");
//! global::free_page(frame.base());
//! ```

use crate::frame_alloc::{FreeOutcome, MemoryStats, PhysicalMemoryManager};
use crate::phys_mapper::IdentityPhysMapper;
use crate::ref_count::RefCountError;
use kernel_info::layout::{LayoutError, PhysicalMemoryLayout};
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};

/// The manager type behind the free functions of this module.
pub type GlobalPhysicalMemory = PhysicalMemoryManager<IdentityPhysMapper>;

static PHYSICAL_MEMORY: GlobalPhysicalMemory =
    PhysicalMemoryManager::unbound(IdentityPhysMapper);

/// Build the kernel-wide manager over `layout` and seed its free list.
///
/// # Safety
/// The contract of [`PhysicalMemoryManager::bind`] with identity-mapped RAM.
///
/// # Errors
/// [`LayoutError::CapacityExceeded`] if `layout` does not fit the default table.
///
/// # Panics
/// If called more than once.
pub unsafe fn init(
    layout: PhysicalMemoryLayout,
) -> Result<&'static GlobalPhysicalMemory, LayoutError> {
    assert!(
        !PHYSICAL_MEMORY.is_bound(),
        "global::init: physical memory manager is already set up"
    );
    unsafe { PHYSICAL_MEMORY.bind(layout) }?;
    PHYSICAL_MEMORY.initialize();
    Ok(&PHYSICAL_MEMORY)
}

/// The kernel-wide manager.
///
/// # Panics
/// Before [`init`].
pub fn physical_memory() -> &'static GlobalPhysicalMemory {
    assert!(
        PHYSICAL_MEMORY.is_initialized(),
        "global: physical memory used before init"
    );
    &PHYSICAL_MEMORY
}

/// See [`PhysicalMemoryManager::allocate_page`].
pub fn allocate_page() -> Option<PhysicalFrame> {
    physical_memory().allocate_page()
}

/// See [`PhysicalMemoryManager::free_page`].
pub fn free_page(pa: PhysicalAddress) -> FreeOutcome {
    physical_memory().free_page(pa)
}

/// See [`PhysicalMemoryManager::increment`].
///
/// # Errors
/// [`RefCountError::Saturated`] when the frame has the maximum number of owners.
pub fn increment(pa: PhysicalAddress) -> Result<u16, RefCountError> {
    physical_memory().increment(pa)
}

/// See [`PhysicalMemoryManager::decrement`].
///
/// # Errors
/// [`RefCountError::Underflow`] if the frame has no owners.
pub fn decrement(pa: PhysicalAddress) -> Result<u16, RefCountError> {
    physical_memory().decrement(pa)
}

/// See [`PhysicalMemoryManager::set`].
pub fn set(pa: PhysicalAddress, n: u16) {
    physical_memory().set(pa, n);
}

/// See [`PhysicalMemoryManager::get`].
#[must_use]
pub fn get(pa: PhysicalAddress) -> u16 {
    physical_memory().get(pa)
}

/// See [`PhysicalMemoryManager::stats`].
#[must_use]
pub fn stats() -> MemoryStats {
    physical_memory().stats()
}
