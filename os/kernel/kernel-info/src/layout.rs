//! # Physical Memory Layout
//!
//! The range of physical memory handed to the page allocator: everything from
//! the first byte after the kernel image (`kernel_end`, provided by the linker)
//! up to the physical memory ceiling (`phys_top`).
//!
//! ```text
//! KERNBASE    ┌─────────────────────────────────┐
//!             │   Kernel Text, Data, BSS        │
//! kernel_end  ├─────────────────────────────────┤
//!             │   (padding to page boundary)    │
//! first_frame ├─────────────────────────────────┤  index 0
//!             │   Managed 4 KiB frames          │
//!             │   ...                           │
//! phys_top    └─────────────────────────────────┘  (exclusive)
//! ```

use crate::memory::PHYSTOP;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, Size4K};

/// Validated description of the physical range managed by the allocator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PhysicalMemoryLayout {
    kernel_end: PhysicalAddress,
    first_frame: PhysicalAddress,
    phys_top: PhysicalAddress,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("physical memory ceiling {0} is not page aligned")]
    UnalignedTop(PhysicalAddress),
    #[error("no whole frame between kernel end {kernel_end} and ceiling {phys_top}")]
    Empty {
        kernel_end: PhysicalAddress,
        phys_top: PhysicalAddress,
    },
    #[error("layout spans {frames} frames but the table holds only {capacity}")]
    CapacityExceeded { frames: usize, capacity: usize },
}

impl PhysicalMemoryLayout {
    /// Describe the range `[kernel_end, phys_top)`.
    ///
    /// # Errors
    /// - [`LayoutError::UnalignedTop`] if `phys_top` is not page aligned.
    /// - [`LayoutError::Empty`] if not a single whole frame fits.
    pub const fn new(
        kernel_end: PhysicalAddress,
        phys_top: PhysicalAddress,
    ) -> Result<Self, LayoutError> {
        if !phys_top.is_aligned::<Size4K>() {
            return Err(LayoutError::UnalignedTop(phys_top));
        }

        let Some(first_frame) = kernel_end.align_up::<Size4K>() else {
            return Err(LayoutError::Empty {
                kernel_end,
                phys_top,
            });
        };

        if first_frame.as_u64() >= phys_top.as_u64() {
            return Err(LayoutError::Empty {
                kernel_end,
                phys_top,
            });
        }

        Ok(Self {
            kernel_end,
            first_frame,
            phys_top,
        })
    }

    /// Layout ending at the default ceiling [`PHYSTOP`].
    ///
    /// # Errors
    /// See [`PhysicalMemoryLayout::new`].
    pub const fn with_default_top(kernel_end: PhysicalAddress) -> Result<Self, LayoutError> {
        Self::new(kernel_end, PhysicalAddress::new(PHYSTOP))
    }

    #[inline]
    #[must_use]
    pub const fn kernel_end(&self) -> PhysicalAddress {
        self.kernel_end
    }

    #[inline]
    #[must_use]
    pub const fn phys_top(&self) -> PhysicalAddress {
        self.phys_top
    }

    /// The lowest managed frame; reference count index 0.
    #[inline]
    #[must_use]
    pub const fn first_frame(&self) -> PhysicalAddress {
        self.first_frame
    }

    /// Number of whole frames in the managed range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn frame_count(&self) -> usize {
        ((self.phys_top.as_u64() - self.first_frame.as_u64()) / PAGE_SIZE) as usize
    }

    /// Whether `pa` lies in `[kernel_end, phys_top)`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        pa.as_u64() >= self.kernel_end.as_u64() && pa.as_u64() < self.phys_top.as_u64()
    }

    /// Table index of the frame starting at `pa`.
    ///
    /// `None` unless `pa` is page aligned and inside the managed range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(&self, pa: PhysicalAddress) -> Option<usize> {
        if !pa.is_aligned::<Size4K>() || !self.contains(pa) {
            return None;
        }
        Some(((pa.as_u64() - self.first_frame.as_u64()) / PAGE_SIZE) as usize)
    }

    /// Check the layout fits a table of `capacity` slots.
    ///
    /// # Errors
    /// [`LayoutError::CapacityExceeded`] if more frames are managed than fit.
    pub const fn ensure_capacity(&self, capacity: usize) -> Result<(), LayoutError> {
        let frames = self.frame_count();
        if frames > capacity {
            return Err(LayoutError::CapacityExceeded { frames, capacity });
        }
        Ok(())
    }
}
