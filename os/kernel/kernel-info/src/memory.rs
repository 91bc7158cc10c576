//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// Where RAM starts on the `virt` machine; the kernel image is loaded here.
pub const KERNBASE: u64 = 0x8000_0000;

/// Top of the RAM the kernel manages (exclusive).
///
/// # Kernel Build
/// Must match the amount of memory handed to the machine (`-m 128M`).
pub const PHYSTOP: u64 = KERNBASE + 128 * 1024 * 1024;

/// Number of frames between [`KERNBASE`] and [`PHYSTOP`].
///
/// This is the default capacity of the reference count table; every managed
/// frame lies in this range, so no layout built from the defaults exceeds it.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_FRAMES: usize = ((PHYSTOP - KERNBASE) / PAGE_SIZE) as usize;

/// Byte written over a frame when it goes back on the free list.
pub const FREE_FILL: u8 = 0x01;

/// Byte written over a frame when it is handed out.
pub const ALLOC_FILL: u8 = 0x05;

/// Highest number of owners a single frame may have.
pub const MAX_REFCOUNT: u16 = u16::MAX;

const _: () = {
    assert!(KERNBASE.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP > KERNBASE);
    assert!(FREE_FILL != ALLOC_FILL);
};
