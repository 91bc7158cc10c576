mod common;

use common::{CAPACITY, Machine, RAM_BASE};
use kernel_alloc::frame_alloc::{FreeOutcome, MemoryStats, PhysicalMemoryManager};
use kernel_alloc::phys_mapper::IdentityPhysMapper;
use kernel_info::layout::{LayoutError, PhysicalMemoryLayout};
use kernel_info::memory::{ALLOC_FILL, FREE_FILL};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

#[test]
fn initialize_frees_everything_after_the_kernel() {
    // 16 frames of RAM, kernel occupies 2.5 frames -> frames 3..16 are managed.
    let m = Machine::new(16, 2 * PAGE_SIZE + 0x800);
    assert!(!m.pmm.is_initialized());
    assert_eq!(m.pmm.free_frames(), 0);

    assert_eq!(m.pmm.initialize(), 13);
    assert!(m.pmm.is_initialized());
    assert_eq!(
        m.pmm.stats(),
        MemoryStats {
            managed_frames: 13,
            free_frames: 13,
            live_frames: 0,
        }
    );

    let handed_out: HashSet<_> = m.drain().into_iter().map(|f| f.base()).collect();
    let expected: HashSet<_> = (3..16).map(Machine::pa).collect();
    assert_eq!(handed_out, expected);
}

#[test]
#[should_panic(expected = "already initialized")]
fn initialize_twice_halts() {
    let m = Machine::booted(8, 0);
    m.pmm.initialize();
}

#[test]
fn allocation_is_fresh() {
    let m = Machine::booted(8, 0);
    let frame = m.pmm.allocate_page().unwrap();

    assert!(frame.base().is_aligned::<kernel_memory_addresses::Size4K>());
    assert_eq!(m.pmm.get(frame.base()), 1);
    assert!(m.bytes(frame).iter().all(|&b| b == ALLOC_FILL));
    assert!(!m.pmm.is_free(frame));
}

#[test]
fn allocation_is_lifo() {
    let m = Machine::booted(8, 0);
    let a = m.pmm.allocate_page().unwrap();
    let b = m.pmm.allocate_page().unwrap();

    m.pmm.free_page(a.base());
    m.pmm.free_page(b.base());

    assert_eq!(m.pmm.allocate_page(), Some(b));
    assert_eq!(m.pmm.allocate_page(), Some(a));
}

#[test]
fn exhaustion_returns_none_and_recovers() {
    let m = Machine::booted(4, 0);
    let frames = m.drain();
    assert_eq!(frames.len(), 4);
    assert!(m.pmm.allocate_page().is_none());
    assert!(m.pmm.allocate_page().is_none());

    m.pmm.free_page(frames[2].base());
    assert_eq!(m.pmm.allocate_page(), Some(frames[2]));
}

#[test]
fn reclaimed_frame_carries_free_fill() {
    let m = Machine::booted(8, 0);
    let frame = m.pmm.allocate_page().unwrap();
    m.bytes_mut(frame).fill(0x42);

    assert_eq!(m.pmm.free_page(frame.base()), FreeOutcome::Reclaimed);
    assert_eq!(m.pmm.get(frame.base()), 0);
    assert!(m.pmm.is_free(frame));

    // The first word links to the next free frame.
    let body = &m.bytes(frame)[8..];
    assert!(body.iter().all(|&b| b == FREE_FILL));
}

#[test]
fn balanced_alloc_free_conserves_frames() {
    let m = Machine::booted(32, PAGE_SIZE);
    let before = m.pmm.free_frames();

    let frames: Vec<_> = (0..20).map(|_| m.pmm.allocate_page().unwrap()).collect();
    assert_eq!(m.pmm.free_frames(), before - 20);
    assert_eq!(m.pmm.stats().live_frames, 20);

    for f in &frames {
        assert_eq!(m.pmm.free_page(f.base()), FreeOutcome::Reclaimed);
    }

    assert_eq!(m.pmm.free_frames(), before);
    assert!(frames.iter().all(|f| m.pmm.get(f.base()) == 0));
    assert_eq!(m.pmm.stats().live_frames, 0);
}

#[test]
fn every_frame_is_either_free_or_live() {
    let m = Machine::booted(16, 0);
    let live: Vec<_> = (0..6).map(|_| m.pmm.allocate_page().unwrap()).collect();
    m.pmm.increment(live[0].base()).unwrap();
    m.pmm.free_page(live[1].base());

    for i in 0..16 {
        let frame = Machine::frame(i);
        let count = m.pmm.get(frame.base());
        let free = m.pmm.is_free(frame);
        assert!(
            (free && count == 0) || (!free && count >= 1),
            "frame {i}: free={free} count={count}"
        );
    }
}

#[test]
fn add_range_seeds_whole_pages_only() {
    let m = Machine::new(16, 0);
    assert!(m.pmm.allocate_page().is_none());

    // Starts mid-frame 2, ends mid-frame 7: frames 3, 4, 5, 6 fit.
    let start = Machine::pa(2) + 0x10;
    let end = Machine::pa(7) + 0x800;
    assert_eq!(m.pmm.add_range(start, end), 4);
    assert_eq!(m.pmm.free_frames(), 4);

    let got: HashSet<_> = m.drain().into_iter().map(|f| f.base()).collect();
    let expected: HashSet<_> = (3..7).map(Machine::pa).collect();
    assert_eq!(got, expected);
}

#[test]
fn add_range_shorter_than_a_page_adds_nothing() {
    let m = Machine::new(16, 0);
    assert_eq!(m.pmm.add_range(Machine::pa(1) + 1, Machine::pa(2) + 0xFFF), 0);
    assert_eq!(m.pmm.add_range(Machine::pa(4), Machine::pa(4)), 0);
    assert_eq!(m.pmm.free_frames(), 0);
}

#[test]
fn layout_larger_than_table_is_rejected() {
    let base = PhysicalAddress::new(RAM_BASE);
    let layout =
        PhysicalMemoryLayout::new(base, base + (CAPACITY as u64 + 1) * PAGE_SIZE).unwrap();
    let result = unsafe {
        PhysicalMemoryManager::<IdentityPhysMapper, CAPACITY>::new(layout, IdentityPhysMapper)
    };
    assert!(matches!(
        result,
        Err(LayoutError::CapacityExceeded { frames, capacity })
            if frames == CAPACITY + 1 && capacity == CAPACITY
    ));
}

#[test]
fn unbound_manager_has_no_memory_until_bound() {
    let m = Machine::unbound(8);
    assert!(!m.pmm.is_bound());
    assert!(m.pmm.allocate_page().is_none());

    unsafe { m.pmm.bind(Machine::layout(8, PAGE_SIZE)) }.unwrap();
    assert!(m.pmm.is_bound());
    assert_eq!(m.pmm.initialize(), 7);
    assert_eq!(m.pmm.get(m.pmm.allocate_page().unwrap().base()), 1);
}

#[test]
#[should_panic(expected = "no memory layout bound")]
fn initialize_before_bind_halts() {
    let m = Machine::unbound(8);
    m.pmm.initialize();
}

#[test]
fn add_range_outside_managed_memory_frees_nothing() {
    let m = Machine::new(16, 2 * PAGE_SIZE);

    let past_ceiling = panic::catch_unwind(AssertUnwindSafe(|| {
        m.pmm.add_range(Machine::pa(10), Machine::pa(20))
    }));
    assert!(past_ceiling.is_err());

    let below_kernel = panic::catch_unwind(AssertUnwindSafe(|| {
        m.pmm.add_range(Machine::pa(0), Machine::pa(5))
    }));
    assert!(below_kernel.is_err());

    assert_eq!(m.pmm.free_frames(), 0);
    assert_eq!(m.pmm.add_range(Machine::pa(2), Machine::pa(16)), 14);
}
