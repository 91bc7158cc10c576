//! Host-side stand-in for a machine's RAM.
#![allow(dead_code)]

use kernel_alloc::frame_alloc::PhysicalMemoryManager;
use kernel_alloc::phys_mapper::{OffsetPhysMapper, PhysMapper};
use kernel_info::layout::PhysicalMemoryLayout;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame};

/// Physical address the emulated RAM starts at.
pub const RAM_BASE: u64 = 0x8000_0000;

/// Table capacity used by the tests.
pub const CAPACITY: usize = 64;

pub type TestManager = PhysicalMemoryManager<OffsetPhysMapper, CAPACITY>;

#[derive(Clone)]
#[repr(C, align(4096))]
struct Frame([u8; 4096]);

/// Page-aligned host memory posing as `[RAM_BASE, RAM_BASE + frames * 4096)`.
pub struct Machine {
    pub pmm: TestManager,
    ram: *mut [Frame],
}

// Safety: the RAM is only touched through the manager (which synchronizes)
// and by tests reading frames they own.
unsafe impl Send for Machine {}
unsafe impl Sync for Machine {}

impl Machine {
    /// `frames` frames of RAM; the kernel image occupies the first
    /// `kernel_bytes` bytes. The manager is not yet initialized.
    pub fn new(frames: usize, kernel_bytes: u64) -> Self {
        let machine = Self::unbound(frames);
        unsafe { machine.pmm.bind(Self::layout(frames, kernel_bytes)) }.unwrap();
        machine
    }

    /// `frames` frames of RAM behind a manager that has no layout yet.
    pub fn unbound(frames: usize) -> Self {
        let ram = Box::into_raw(vec![Frame([0; 4096]); frames].into_boxed_slice());
        let base = PhysicalAddress::new(RAM_BASE);
        let mapper = OffsetPhysMapper::for_window(base, ram.cast::<u8>());
        let pmm = PhysicalMemoryManager::unbound(mapper);
        Self { pmm, ram }
    }

    /// The layout of `frames` frames with the kernel in the first `kernel_bytes`.
    pub fn layout(frames: usize, kernel_bytes: u64) -> PhysicalMemoryLayout {
        let base = PhysicalAddress::new(RAM_BASE);
        PhysicalMemoryLayout::new(base + kernel_bytes, base + frames as u64 * PAGE_SIZE).unwrap()
    }

    /// Like [`Machine::new`], with the manager initialized.
    pub fn booted(frames: usize, kernel_bytes: u64) -> Self {
        let machine = Self::new(frames, kernel_bytes);
        machine.pmm.initialize();
        machine
    }

    pub fn pa(index: u64) -> PhysicalAddress {
        PhysicalAddress::new(RAM_BASE + index * PAGE_SIZE)
    }

    pub fn frame(index: u64) -> PhysicalFrame {
        PhysicalFrame::from_aligned(Self::pa(index)).unwrap()
    }

    /// Contents of the frame at `frame`.
    pub fn bytes(&self, frame: PhysicalFrame) -> &[u8] {
        unsafe {
            let ptr = self.pmm.mapper().phys_to_ptr(frame.base());
            std::slice::from_raw_parts(ptr, 4096)
        }
    }

    /// Writable contents of a frame the test owns.
    #[allow(clippy::mut_from_ref)]
    pub fn bytes_mut(&self, frame: PhysicalFrame) -> &mut [u8] {
        unsafe {
            let ptr = self.pmm.mapper().phys_to_ptr(frame.base());
            std::slice::from_raw_parts_mut(ptr, 4096)
        }
    }

    /// Drain the free list, returning every frame it held.
    pub fn drain(&self) -> Vec<PhysicalFrame> {
        std::iter::from_fn(|| self.pmm.allocate_page()).collect()
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.ram) });
    }
}
