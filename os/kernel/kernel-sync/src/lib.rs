//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: named busy-waiting lock for short critical sections.
//! * [`SyncOnceCell`]: write-once cell for process-lifetime singletons.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod sync_once_cell;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
