//! # Frame Reference Counts
//!
//! One counter per managed frame recording how many logical owners share it,
//! typically the number of page-table entries across address spaces that map
//! the frame after a copy-on-write fork. A count of 0 means the frame is free
//! or being freed; a freshly allocated frame has count 1.
//!
//! Every operation takes the table lock, touches exactly one slot and
//! releases it again. [`RefCountTable::release`] is the one compound step: it
//! decides "last owner or not" and applies the change in the same critical
//! section, so a concurrent [`RefCountTable::increment`] is never lost.
//!
//! The table can be built in a `static` with [`RefCountTable::unbound`] and
//! given its layout later, so the count array never has to pass through a
//! (small) kernel stack.

use kernel_info::layout::{LayoutError, PhysicalMemoryLayout};
use kernel_info::memory::{MAX_FRAMES, MAX_REFCOUNT};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::{SpinLock, SyncOnceCell};
use log::warn;

/// Result of releasing one ownership of a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Release {
    /// Other owners remain; the frame stays live.
    Shared { remaining: u16 },
    /// That was the last owner; the count is now 0 and the frame must be reclaimed.
    Last,
    /// The count was already 0: either a frame whose owners were dropped by
    /// hand, or one that is already free.
    Unowned,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefCountError {
    #[error("reference count of frame {frame} is saturated at {max}")]
    Saturated { frame: PhysicalAddress, max: u16 },
    #[error("reference count of frame {0} is already zero")]
    Underflow(PhysicalAddress),
}

/// Fixed-capacity table of per-frame owner counts.
///
/// `N` is the capacity in frames; the layout may manage fewer.
pub struct RefCountTable<const N: usize = MAX_FRAMES> {
    layout: SyncOnceCell<PhysicalMemoryLayout>,
    counts: SpinLock<[u16; N]>,
}

impl<const N: usize> RefCountTable<N> {
    /// Zeroed table without a layout; see [`RefCountTable::bind`].
    #[must_use]
    pub const fn unbound() -> Self {
        Self {
            layout: SyncOnceCell::new(),
            counts: SpinLock::new("refcount", [0; N]),
        }
    }

    /// Zeroed table for the frames of `layout`.
    ///
    /// # Errors
    /// [`LayoutError::CapacityExceeded`] if `layout` has more than `N` frames.
    pub fn new(layout: PhysicalMemoryLayout) -> Result<Self, LayoutError> {
        let table = Self::unbound();
        table.bind(layout)?;
        Ok(table)
    }

    /// Attach the layout that maps addresses to slots.
    ///
    /// # Errors
    /// [`LayoutError::CapacityExceeded`] if `layout` has more than `N` frames.
    ///
    /// # Panics
    /// If the table already has a layout.
    pub fn bind(&self, layout: PhysicalMemoryLayout) -> Result<(), LayoutError> {
        layout.ensure_capacity(N)?;
        assert!(
            self.layout.set(layout).is_ok(),
            "refcount: layout is already bound"
        );
        Ok(())
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.layout.is_initialized()
    }

    /// # Panics
    /// Before [`RefCountTable::bind`].
    #[must_use]
    pub fn layout(&self) -> &PhysicalMemoryLayout {
        match self.layout.get() {
            Some(layout) => layout,
            None => panic!("refcount: table used before a layout was bound"),
        }
    }

    /// Add an owner.
    ///
    /// # Errors
    /// [`RefCountError::Saturated`] at [`MAX_REFCOUNT`]; the count is unchanged.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    pub fn increment(&self, pa: PhysicalAddress) -> Result<u16, RefCountError> {
        let i = self.index(pa);
        let mut counts = self.counts.lock();
        if counts[i] >= MAX_REFCOUNT {
            drop(counts);
            warn!("refcount: frame {pa} already has {MAX_REFCOUNT} owners");
            return Err(RefCountError::Saturated {
                frame: pa,
                max: MAX_REFCOUNT,
            });
        }
        counts[i] += 1;
        Ok(counts[i])
    }

    /// Remove an owner without reclaiming anything.
    ///
    /// # Errors
    /// [`RefCountError::Underflow`] if the count is already 0; the count is unchanged.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    pub fn decrement(&self, pa: PhysicalAddress) -> Result<u16, RefCountError> {
        let i = self.index(pa);
        let mut counts = self.counts.lock();
        if counts[i] == 0 {
            drop(counts);
            warn!("refcount: decrement of unowned frame {pa}");
            return Err(RefCountError::Underflow(pa));
        }
        counts[i] -= 1;
        Ok(counts[i])
    }

    /// Overwrite the count.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    pub fn set(&self, pa: PhysicalAddress, n: u16) {
        let i = self.index(pa);
        self.counts.lock()[i] = n;
    }

    /// Snapshot of the count; may be stale as soon as it returns.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    #[must_use]
    pub fn get(&self, pa: PhysicalAddress) -> u16 {
        let i = self.index(pa);
        self.counts.lock()[i]
    }

    /// Drop one owner; if it was the last, the count ends at 0.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    pub fn release(&self, pa: PhysicalAddress) -> Release {
        let i = self.index(pa);
        let mut counts = self.counts.lock();
        match counts[i] {
            0 => Release::Unowned,
            1 => {
                counts[i] = 0;
                Release::Last
            }
            _ => {
                counts[i] -= 1;
                Release::Shared {
                    remaining: counts[i],
                }
            }
        }
    }

    /// Zero every slot.
    pub fn reset(&self) {
        self.counts.lock().fill(0);
    }

    /// Number of frames with at least one owner.
    #[must_use]
    pub fn live_frames(&self) -> usize {
        let n = self.layout().frame_count();
        self.counts.lock()[..n].iter().filter(|&&c| c > 0).count()
    }

    fn index(&self, pa: PhysicalAddress) -> usize {
        match self.layout().index_of(pa) {
            Some(i) => i,
            None => panic!("refcount: {pa} is not a managed frame"),
        }
    }
}
