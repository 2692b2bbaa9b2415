//! Poison-tolerant lock acquisition.
//!
//! A panicking listener or cache user must not wedge the process; a poisoned
//! guard is recovered and logged, accepting possibly stale state.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn read_guard<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(op, lock_kind = "rwlock.read", "recovered poisoned lock");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn write_guard<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(op, lock_kind = "rwlock.write", "recovered poisoned lock");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn lock_guard<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(op, lock_kind = "mutex.lock", "recovered poisoned lock");
            poisoned.into_inner()
        }
    }
}
