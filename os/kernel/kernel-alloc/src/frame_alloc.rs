//! # Physical Page Allocator
//!
//! [`PhysicalMemoryManager`] hands out and reclaims 4 KiB frames and owns the
//! per-frame reference counts that make frame sharing (copy-on-write) safe.
//!
//! Every managed frame is in exactly one of two states:
//!
//! ```text
//!               allocate_page()
//!   ┌────────┐ ────────────────► ┌──────────┐  increment()
//!   │  Free  │                   │ Live(n)  │ ◄──────────┐
//!   │ count 0│ ◄──────────────── │ count ≥ 1│ ───────────┘
//!   └────────┘  free_page(), n=1 └──────────┘  free_page(), n>1
//! ```
//!
//! ## Locking
//! The free list and the count table each have their own lock and no
//! operation ever holds both. `free_page` decides "last owner or not" inside
//! the table lock ([`RefCountTable::release`]) and only then, with the table
//! lock dropped, pushes the frame onto the list. `allocate_page` pops under
//! the list lock and only then sets the count; in between, the frame is
//! reachable by nobody else.
//!
//! ## Failure modes
//! - Out of memory is ordinary: [`PhysicalMemoryManager::allocate_page`]
//!   returns `None`.
//! - A malformed address passed to [`PhysicalMemoryManager::free_page`] means
//!   the kernel's view of physical memory is corrupt. It panics before
//!   touching any state. So does freeing a frame that is already free.
//!
//! ## Placement
//! With the default capacity the count table alone is 64 KiB, more than a
//! kernel stack. [`PhysicalMemoryManager::unbound`] is `const`, so such a
//! manager can live in a `static` and receive its layout later through
//! [`PhysicalMemoryManager::bind`].

use crate::free_list::FreeList;
use crate::phys_mapper::PhysMapper;
use crate::ref_count::{RefCountError, RefCountTable, Release};
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_info::layout::{LayoutError, PhysicalMemoryLayout};
use kernel_info::memory::{ALLOC_FILL, FREE_FILL, MAX_FRAMES};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame, Size4K};
use log::{debug, info, trace, warn};

/// What [`PhysicalMemoryManager::free_page`] did with the frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FreeOutcome {
    /// Other owners remain; the frame is still live and untouched.
    Shared { remaining: u16 },
    /// The frame was filled with [`FREE_FILL`] and put back on the free list.
    Reclaimed,
}

/// Point-in-time counters for diagnostics.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryStats {
    /// Frames between the end of the kernel and the memory ceiling.
    pub managed_frames: usize,
    /// Frames currently on the free list.
    pub free_frames: usize,
    /// Frames with at least one owner.
    pub live_frames: usize,
}

/// The physical memory manager: free list, reference counts and layout.
///
/// Constructed once at boot and passed to whoever allocates frames.
/// `N` is the reference count table capacity in frames.
pub struct PhysicalMemoryManager<M: PhysMapper, const N: usize = MAX_FRAMES> {
    mapper: M,
    free: FreeList,
    refs: RefCountTable<N>,
    initialized: AtomicBool,
}

impl<M: PhysMapper, const N: usize> PhysicalMemoryManager<M, N> {
    /// Create a manager with an empty free list and a zeroed count table.
    ///
    /// # Safety
    /// See [`Self::bind`].
    ///
    /// # Errors
    /// [`LayoutError::CapacityExceeded`] if `layout` has more than `N` frames.
    pub unsafe fn new(layout: PhysicalMemoryLayout, mapper: M) -> Result<Self, LayoutError> {
        let pmm = Self::unbound(mapper);
        unsafe { pmm.bind(layout) }?;
        Ok(pmm)
    }

    /// A manager that does not know its memory yet. Until [`Self::bind`]
    /// it has no free frames and every address is unmanaged.
    #[must_use]
    pub const fn unbound(mapper: M) -> Self {
        Self {
            mapper,
            free: FreeList::new(),
            refs: RefCountTable::unbound(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Hand the manager the physical range it owns.
    ///
    /// # Safety
    /// - All RAM in `[layout.kernel_end(), layout.phys_top())` must be mapped by
    ///   the mapper, writable, and used by nothing but this manager and the
    ///   owners of the frames it hands out.
    /// - At most one manager may exist for any frame.
    ///
    /// # Errors
    /// [`LayoutError::CapacityExceeded`] if `layout` has more than `N` frames.
    ///
    /// # Panics
    /// If a layout was already bound.
    pub unsafe fn bind(&self, layout: PhysicalMemoryLayout) -> Result<(), LayoutError> {
        self.refs.bind(layout)
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.refs.is_bound()
    }

    /// Zero the count table and put every managed frame on the free list.
    ///
    /// Returns the number of frames made available.
    ///
    /// # Panics
    /// When called a second time, or before [`Self::bind`].
    pub fn initialize(&self) -> usize {
        assert!(self.is_bound(), "initialize: no memory layout bound");
        assert!(
            !self.initialized.swap(true, Ordering::AcqRel),
            "initialize: physical memory manager is already initialized"
        );

        let layout = *self.refs.layout();
        info!(
            "Physical memory: kernel ends at {}, ceiling at {}",
            layout.kernel_end(),
            layout.phys_top()
        );

        self.refs.reset();
        let added = self.add_range(layout.kernel_end(), layout.phys_top());

        info!(
            "Physical memory: {added} frames ({} KiB) available",
            added as u64 * PAGE_SIZE / 1024
        );
        added
    }

    /// Free every whole frame in `[start, end)`, `start` rounded up to a page.
    ///
    /// Frames in the range are expected to be unowned. Returns the number of
    /// frames added to the free list.
    ///
    /// # Panics
    /// If the range reaches outside the managed memory. The whole range is
    /// checked before the first frame is freed.
    pub fn add_range(&self, start: PhysicalAddress, end: PhysicalAddress) -> usize {
        let Some(first) = start.align_up::<Size4K>() else {
            return 0;
        };
        let stop = end.align_down::<Size4K>();
        let Some(len) = stop.checked_offset_from(first).filter(|&len| len > 0) else {
            return 0;
        };

        let mut frame = self.managed_frame(first, "add_range");
        self.managed_frame(PhysicalAddress::new(stop.as_u64() - PAGE_SIZE), "add_range");

        let mut added = 0;
        for _ in 0..len / PAGE_SIZE {
            if self.release(frame, false) == FreeOutcome::Reclaimed {
                added += 1;
            }
            match frame.next() {
                Some(next) => frame = next,
                None => break,
            }
        }

        debug!("add_range: {added} frames from {start}..{end}");
        added
    }

    /// Hand out one frame with count 1, filled with [`ALLOC_FILL`].
    ///
    /// Returns `None` when physical memory is exhausted; never blocks or
    /// retries. The frame is not zeroed.
    pub fn allocate_page(&self) -> Option<PhysicalFrame> {
        let Some(frame) = (unsafe { self.free.pop(&self.mapper) }) else {
            warn!("allocate_page: out of physical memory");
            return None;
        };

        self.refs.set(frame.base(), 1);
        unsafe { self.fill(frame, ALLOC_FILL, 0) };

        trace!("allocate_page: {frame}");
        Some(frame)
    }

    /// Release one ownership of the frame at `pa`.
    ///
    /// With other owners left the count is decremented and the frame stays
    /// live. Otherwise the frame is filled with [`FREE_FILL`], its count set
    /// to 0, and it goes back on the free list.
    ///
    /// A frame whose count was already dropped to 0 with [`Self::decrement`]
    /// or [`Self::set`] is reclaimed as well.
    ///
    /// # Panics
    /// If `pa` is misaligned, below the end of the kernel, or at or above the
    /// memory ceiling, or if the frame is already free. Nothing is modified
    /// in that case.
    pub fn free_page(&self, pa: PhysicalAddress) -> FreeOutcome {
        let frame = self.managed_frame(pa, "free_page");
        self.release(frame, true)
    }

    fn release(&self, frame: PhysicalFrame, reject_free: bool) -> FreeOutcome {
        match self.refs.release(frame.base()) {
            Release::Shared { remaining } => {
                trace!("free_page: {frame} still has {remaining} owners");
                return FreeOutcome::Shared { remaining };
            }
            // Only an unowned frame can already be on the list; walk it then.
            Release::Unowned if reject_free && self.is_free(frame) => {
                panic!("free_page: double free of frame {frame}");
            }
            Release::Last | Release::Unowned => {}
        }

        // The link word is written by the push itself.
        unsafe {
            self.fill(frame, FREE_FILL, FreeList::LINK_SIZE);
            self.free.push(&self.mapper, frame);
        }
        trace!("free_page: {frame} reclaimed");
        FreeOutcome::Reclaimed
    }

    /// Add an owner to the frame at `pa`, e.g. when a fork shares it.
    ///
    /// # Errors
    /// [`RefCountError::Saturated`] when the frame has the maximum number of owners.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    pub fn increment(&self, pa: PhysicalAddress) -> Result<u16, RefCountError> {
        self.refs.increment(pa)
    }

    /// Remove an owner without reclaiming the frame.
    ///
    /// # Errors
    /// [`RefCountError::Underflow`] if the frame has no owners.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    pub fn decrement(&self, pa: PhysicalAddress) -> Result<u16, RefCountError> {
        self.refs.decrement(pa)
    }

    /// Overwrite the owner count of the frame at `pa`.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    pub fn set(&self, pa: PhysicalAddress, n: u16) {
        self.refs.set(pa, n);
    }

    /// Owner count of the frame at `pa`.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    #[must_use]
    pub fn get(&self, pa: PhysicalAddress) -> u16 {
        self.refs.get(pa)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.free.len()
    }

    /// # Panics
    /// Before [`Self::bind`].
    #[must_use]
    pub fn managed_frames(&self) -> usize {
        self.refs.layout().frame_count()
    }

    /// Whether the frame is on the free list. Walks the list; diagnostics only.
    #[must_use]
    pub fn is_free(&self, frame: PhysicalFrame) -> bool {
        unsafe { self.free.contains(&self.mapper, frame) }
    }

    /// # Panics
    /// Before [`Self::bind`].
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            managed_frames: self.managed_frames(),
            free_frames: self.free_frames(),
            live_frames: self.refs.live_frames(),
        }
    }

    /// # Panics
    /// Before [`Self::bind`].
    #[must_use]
    pub fn layout(&self) -> &PhysicalMemoryLayout {
        self.refs.layout()
    }

    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    fn managed_frame(&self, pa: PhysicalAddress, op: &str) -> PhysicalFrame {
        let layout = self.refs.layout();
        match PhysicalFrame::from_aligned(pa) {
            Some(frame) if layout.contains(pa) => frame,
            _ => panic!(
                "{op}: {pa} is not a managed frame (kernel end {}, ceiling {})",
                layout.kernel_end(),
                layout.phys_top()
            ),
        }
    }

    /// Write `byte` over the frame, leaving the first `skip` bytes alone.
    ///
    /// # Safety
    /// `frame` must be managed and not in use by anyone else.
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn fill(&self, frame: PhysicalFrame, byte: u8, skip: usize) {
        let len = PAGE_SIZE as usize - skip;
        unsafe {
            let start = self.mapper.phys_to_ptr(frame.base()).add(skip);
            ptr::write_bytes(start, byte, len);
        }
    }
}
