//! # Intrusive Free-Frame List
//!
//! Free frames are chained through their own memory: the first machine word
//! of every linked frame holds the physical address of the next free frame.
//!
//! ```text
//! head ──► ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//!          │ next: 0x8003 │ ─► │ next: 0x8001 │ ─► │ next: NIL    │
//!          │ 01 01 01 ... │    │ 01 01 01 ... │    │ 01 01 01 ... │
//!          └──────────────┘    └──────────────┘    └──────────────┘
//!            frame 0x8005        frame 0x8003        frame 0x8001
//! ```
//!
//! Links are physical addresses rather than pointers, so the list does not
//! depend on how physical memory happens to be mapped. Every access to frame
//! memory goes through [`PhysMapper`] and stays inside this module.
//!
//! The list is LIFO: the most recently freed frame is handed out first, which
//! keeps recently touched memory warm in caches and TLBs. Callers must not
//! depend on the order.

use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};
use kernel_sync::SpinLock;

/// End-of-list marker. Never page aligned, so never a frame base.
const NIL: u64 = u64::MAX;

struct Links {
    head: Option<PhysicalFrame>,
    len: usize,
}

/// Lock-protected LIFO list of free frames.
///
/// # Invariants
/// - Every linked frame is page aligned and exclusively owned by the list.
/// - The first word of each linked frame is the base of the next linked frame,
///   or `NIL` for the last one.
/// - `len` equals the number of linked frames.
pub struct FreeList {
    links: SpinLock<Links>,
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeList {
    /// Bytes at the start of every linked frame that hold the link.
    pub const LINK_SIZE: usize = size_of::<u64>();

    #[must_use]
    pub const fn new() -> Self {
        Self {
            links: SpinLock::new(
                "free_list",
                Links {
                    head: None,
                    len: 0,
                },
            ),
        }
    }

    /// Number of linked frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.lock().len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.lock().head.is_none()
    }

    /// Link `frame` in as the new head.
    ///
    /// # Safety
    /// - `frame` must be mapped by `mapper` and writable.
    /// - The caller gives up all access to `frame`; it must not already be linked.
    /// - `mapper` must be the mapper used for every other call on this list.
    ///
    /// # Panics
    /// Pushing the current head a second time (an immediate double free) halts.
    pub unsafe fn push<M: PhysMapper>(&self, mapper: &M, frame: PhysicalFrame) {
        let mut links = self.links.lock();
        if links.head == Some(frame) {
            drop(links);
            panic!("free_list: double free of frame {frame}");
        }

        let next = links.head.map_or(NIL, |f| f.base().as_u64());
        unsafe { write_link(mapper, frame, next) };
        links.head = Some(frame);
        links.len += 1;
    }

    /// Unlink and return the head, or `None` when no frame is free.
    ///
    /// # Safety
    /// `mapper` must be the mapper the frames were pushed with.
    pub unsafe fn pop<M: PhysMapper>(&self, mapper: &M) -> Option<PhysicalFrame> {
        let mut links = self.links.lock();
        let frame = links.head?;
        let next = unsafe { read_link(mapper, frame) };
        links.head = decode(next);
        links.len -= 1;
        Some(frame)
    }

    /// Whether `frame` is currently linked. Walks the whole list.
    ///
    /// # Safety
    /// `mapper` must be the mapper the frames were pushed with.
    pub unsafe fn contains<M: PhysMapper>(&self, mapper: &M, frame: PhysicalFrame) -> bool {
        let links = self.links.lock();
        let mut cursor = links.head;
        while let Some(current) = cursor {
            if current == frame {
                return true;
            }
            cursor = decode(unsafe { read_link(mapper, current) });
        }
        false
    }
}

fn decode(link: u64) -> Option<PhysicalFrame> {
    if link == NIL {
        return None;
    }
    let frame = PhysicalFrame::from_aligned(PhysicalAddress::new(link));
    assert!(frame.is_some(), "free_list: corrupted link {link:#x}");
    frame
}

/// # Safety
/// `frame` must be owned by the list (or about to be) and mapped by `mapper`.
unsafe fn write_link<M: PhysMapper>(mapper: &M, frame: PhysicalFrame, next: u64) {
    unsafe { mapper.phys_to_ptr(frame.base()).cast::<u64>().write(next) }
}

/// # Safety
/// `frame` must be linked and mapped by `mapper`.
unsafe fn read_link<M: PhysMapper>(mapper: &M, frame: PhysicalFrame) -> u64 {
    unsafe { mapper.phys_to_ptr(frame.base()).cast::<u64>().read() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phys_mapper::OffsetPhysMapper;

    const BASE: u64 = 0x8000_0000;

    #[repr(C, align(4096))]
    struct Ram([[u8; 4096]; 4]);

    fn frame(i: u64) -> PhysicalFrame {
        PhysicalFrame::from_aligned(PhysicalAddress::new(BASE + i * 4096)).unwrap()
    }

    fn mapper(ram: &mut Ram) -> OffsetPhysMapper {
        OffsetPhysMapper::for_window(PhysicalAddress::new(BASE), ram.0.as_mut_ptr().cast())
    }

    #[test]
    fn pop_on_empty_list_is_none() {
        let mut ram = Ram([[0; 4096]; 4]);
        let m = mapper(&mut ram);
        let list = FreeList::new();
        assert!(list.is_empty());
        assert!(unsafe { list.pop(&m) }.is_none());
    }

    #[test]
    fn frames_come_back_in_lifo_order() {
        let mut ram = Ram([[0; 4096]; 4]);
        let m = mapper(&mut ram);
        let list = FreeList::new();

        unsafe {
            list.push(&m, frame(0));
            list.push(&m, frame(2));
            list.push(&m, frame(1));
        }
        assert_eq!(list.len(), 3);

        unsafe {
            assert_eq!(list.pop(&m), Some(frame(1)));
            assert_eq!(list.pop(&m), Some(frame(2)));
            assert_eq!(list.pop(&m), Some(frame(0)));
            assert_eq!(list.pop(&m), None);
        }
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn link_lives_in_first_word_of_frame() {
        let mut ram = Ram([[0xAA; 4096]; 4]);
        let m = mapper(&mut ram);
        let list = FreeList::new();
        unsafe {
            list.push(&m, frame(3));
            list.push(&m, frame(1));
        }

        let link = u64::from_ne_bytes(ram.0[1][..8].try_into().unwrap());
        assert_eq!(link, BASE + 3 * 4096);
        let last = u64::from_ne_bytes(ram.0[3][..8].try_into().unwrap());
        assert_eq!(last, NIL);
        assert!(ram.0[1][8..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn contains_walks_the_chain() {
        let mut ram = Ram([[0; 4096]; 4]);
        let m = mapper(&mut ram);
        let list = FreeList::new();
        unsafe {
            list.push(&m, frame(0));
            list.push(&m, frame(2));
            assert!(list.contains(&m, frame(0)));
            assert!(list.contains(&m, frame(2)));
            assert!(!list.contains(&m, frame(1)));
        }
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn pushing_head_twice_halts() {
        let mut ram = Ram([[0; 4096]; 4]);
        let m = mapper(&mut ram);
        let list = FreeList::new();
        unsafe {
            list.push(&m, frame(0));
            list.push(&m, frame(0));
        }
    }
}
