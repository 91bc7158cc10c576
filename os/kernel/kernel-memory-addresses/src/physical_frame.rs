use crate::{PageSize, PhysicalAddress, Size4K};
use core::fmt;
use core::marker::PhantomData;

/// A physical memory frame of size `S`.
///
/// Identity is the frame's page-aligned physical base address; the frame is
/// never an object in its own right, only a name for `S::SIZE` bytes of RAM.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let frame = PhysicalFrame::<Size4K>::containing(PhysicalAddress::new(0x8000_1FFF));
/// assert_eq!(frame.base().as_u64(), 0x8000_1000);
/// assert_eq!(frame.next().unwrap().base().as_u64(), 0x8000_2000);
/// assert!(PhysicalFrame::<Size4K>::from_aligned(PhysicalAddress::new(0x8000_1001)).is_none());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame<S: PageSize = Size4K> {
    base: u64,
    _size: PhantomData<S>,
}

impl<S: PageSize> PhysicalFrame<S> {
    /// Frame that contains `pa` (aligns down).
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self {
            base: pa.as_u64() & !S::MASK,
            _size: PhantomData,
        }
    }

    /// Frame starting exactly at `pa`; `None` if `pa` is not aligned.
    #[inline]
    #[must_use]
    pub const fn from_aligned(pa: PhysicalAddress) -> Option<Self> {
        if pa.is_aligned::<S>() {
            Some(Self::containing(pa))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base)
    }

    /// The frame directly following this one; `None` at the top of the address space.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.base.checked_add(S::SIZE) {
            Some(base) => Some(Self {
                base,
                _size: PhantomData,
            }),
            None => None,
        }
    }
}

impl<S: PageSize> fmt::Debug for PhysicalFrame<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalFrame<{}>(0x{:016X})", S::as_str(), self.base)
    }
}

impl<S: PageSize> fmt::Display for PhysicalFrame<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/{}", self.base, S::as_str())
    }
}
