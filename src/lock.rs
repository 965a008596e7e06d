//! Per-device reader/writer lock with writer preference, nestable by the
//! thread that already holds the write lock.
//!
//! Grounded on the "construction increments, drop decrements, reclaim on
//! expiry" shape the teacher already leans on for mount guards
//! (`sys_mount::Mount`/`UnmountDrop`), adapted here into a condvar-based
//! reader/writer primitive since `parking_lot::RwLock` has no notion of a
//! single owner recursively re-entering its own write lock.

use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

struct State {
    readers: usize,
    writer: Option<ThreadId>,
    write_depth: usize,
    waiting_writers: usize,
}

/// Device-wide lock guarding an entire partition subtree (spec C1).
///
/// Readers may run concurrently; a writer excludes all readers and other
/// writers, but the thread already holding the write lock may re-acquire it
/// (e.g. a boundary call that itself invokes a manager method which write
/// locks the same device again).
pub struct DeviceLock {
    state: Mutex<State>,
    cv: Condvar,
}

impl DeviceLock {
    pub fn new() -> Self {
        DeviceLock {
            state: Mutex::new(State { readers: 0, writer: None, write_depth: 0, waiting_writers: 0 }),
            cv: Condvar::new(),
        }
    }

    pub fn read_lock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        if state.writer == Some(me) {
            // the current writer may always read its own subtree.
            return;
        }
        loop {
            if state.writer.is_none() && state.waiting_writers == 0 {
                state.readers += 1;
                return;
            }
            state = self.cv.wait(state).unwrap();
        }
    }

    pub fn read_unlock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        if state.writer == Some(me) {
            return;
        }
        state.readers -= 1;
        if state.readers == 0 {
            self.cv.notify_all();
        }
    }

    pub fn write_lock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        if state.writer == Some(me) {
            state.write_depth += 1;
            return;
        }
        state.waiting_writers += 1;
        while state.writer.is_some() || state.readers > 0 {
            state = self.cv.wait(state).unwrap();
        }
        state.waiting_writers -= 1;
        state.writer = Some(me);
        state.write_depth = 1;
    }

    pub fn write_unlock(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert_eq!(state.writer, Some(thread::current().id()));
        state.write_depth -= 1;
        if state.write_depth == 0 {
            state.writer = None;
            self.cv.notify_all();
        }
    }

    pub fn is_write_locked(&self) -> bool { self.state.lock().unwrap().writer.is_some() }

    pub fn is_read_locked(&self, or_write: bool) -> bool {
        let state = self.state.lock().unwrap();
        state.readers > 0 || (or_write && state.writer.is_some())
    }

    pub fn read(&self) -> ReadGuard<'_> {
        self.read_lock();
        ReadGuard { lock: self }
    }

    pub fn write(&self) -> WriteGuard<'_> {
        self.write_lock();
        WriteGuard { lock: self }
    }
}

impl Default for DeviceLock {
    fn default() -> Self { DeviceLock::new() }
}

pub struct ReadGuard<'a> {
    lock: &'a DeviceLock,
}

impl<'a> Drop for ReadGuard<'a> {
    fn drop(&mut self) { self.lock.read_unlock(); }
}

pub struct WriteGuard<'a> {
    lock: &'a DeviceLock,
}

impl<'a> Drop for WriteGuard<'a> {
    fn drop(&mut self) { self.lock.write_unlock(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn readers_run_concurrently() {
        let lock = Arc::new(DeviceLock::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = lock.clone();
            let concurrent = concurrent.clone();
            let peak = peak.clone();
            handles.push(thread::spawn(move || {
                let _guard = lock.read();
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn write_excludes_readers() {
        let lock = DeviceLock::new();
        assert!(!lock.is_write_locked());
        {
            let _w = lock.write();
            assert!(lock.is_write_locked());
        }
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn write_lock_is_nestable_by_owner() {
        let lock = DeviceLock::new();
        lock.write_lock();
        lock.write_lock();
        assert!(lock.is_write_locked());
        lock.write_unlock();
        assert!(lock.is_write_locked());
        lock.write_unlock();
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn writer_can_read_its_own_subtree() {
        let lock = DeviceLock::new();
        lock.write_lock();
        lock.read_lock();
        lock.read_unlock();
        lock.write_unlock();
    }
}
