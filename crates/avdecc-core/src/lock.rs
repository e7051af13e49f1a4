// ── Reentrant entity lock ──
//
// One lock per physical entity, shared through `SharedLock` by every
// tracker instance that represents it. The holding thread may lock
// again any number of times; a depth counter records how many. A holder
// that must hand off exclusive access deep inside a call chain (before
// running a callback that may re-enter from another thread) drops every
// level with `release_all` and later restores the exact depth with
// `reacquire`.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

pub type SharedLock = Arc<EntityLock>;

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<ThreadId>,
    depth: u32,
}

/// Depth-counted reentrant lock.
#[derive(Debug, Default)]
pub struct EntityLock {
    state: Mutex<Ownership>,
    released: Condvar,
}

impl EntityLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedLock {
        Arc::new(Self::new())
    }

    /// Acquire one level, blocking while another thread holds the lock.
    pub fn lock(&self) {
        self.acquire(1);
    }

    /// Acquire one level without blocking. Returns `false` if another
    /// thread holds the lock.
    pub fn try_lock(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        match state.owner {
            Some(owner) if owner != me => false,
            _ => {
                state.owner = Some(me);
                state.depth += 1;
                true
            }
        }
    }

    /// Release one level.
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the lock.
    pub fn unlock(&self) {
        let mut state = self.state.lock();
        Self::assert_held(&state, "unlock");
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
    }

    /// Release every level held by the calling thread and return how many
    /// there were.
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the lock.
    pub fn release_all(&self) -> u32 {
        let mut state = self.state.lock();
        Self::assert_held(&state, "release_all");
        let depth = std::mem::take(&mut state.depth);
        state.owner = None;
        drop(state);
        self.released.notify_one();
        trace!(depth, "released entity lock");
        depth
    }

    /// Re-acquire `depth` levels at once, typically the value returned by
    /// `release_all`. A depth of zero is a no-op.
    pub fn reacquire(&self, depth: u32) {
        if depth > 0 {
            self.acquire(depth);
            trace!(depth, "reacquired entity lock");
        }
    }

    /// Whether the calling thread holds at least one level.
    pub fn is_self_locked(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Levels held by the calling thread (zero if it is not the holder).
    pub fn depth(&self) -> u32 {
        let state = self.state.lock();
        if state.owner == Some(thread::current().id()) {
            state.depth
        } else {
            0
        }
    }

    /// Lock one level for the lifetime of the returned guard.
    pub fn guard(&self) -> EntityLockGuard<'_> {
        self.lock();
        EntityLockGuard { lock: self }
    }

    /// Lock one level if no other thread holds the lock.
    pub fn try_guard(&self) -> Option<EntityLockGuard<'_>> {
        if self.try_lock() {
            Some(EntityLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Release every level until the returned scope is dropped, then
    /// restore the same depth.
    pub fn release_scope(&self) -> ReleasedScope<'_> {
        let depth = self.release_all();
        ReleasedScope { lock: self, depth }
    }

    fn acquire(&self, levels: u32) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = levels;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += levels;
                    return;
                }
                Some(_) => self.released.wait(&mut state),
            }
        }
    }

    fn assert_held(state: &Ownership, operation: &str) {
        assert!(
            state.owner == Some(thread::current().id()) && state.depth > 0,
            "EntityLock::{operation} called by a thread that does not hold the lock"
        );
    }
}

/// Holds one level of an [`EntityLock`] until dropped.
#[derive(Debug)]
pub struct EntityLockGuard<'a> {
    lock: &'a EntityLock,
}

impl Drop for EntityLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// Restores a released depth when dropped, on every exit path.
#[derive(Debug)]
pub struct ReleasedScope<'a> {
    lock: &'a EntityLock,
    depth: u32,
}

impl ReleasedScope<'_> {
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

impl Drop for ReleasedScope<'_> {
    fn drop(&mut self) {
        self.lock.reacquire(self.depth);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn lock_is_reentrant_and_counts_depth() {
        let lock = EntityLock::new();
        lock.lock();
        lock.lock();
        lock.lock();
        assert_eq!(lock.depth(), 3);

        lock.unlock();
        assert_eq!(lock.depth(), 2);
        assert!(lock.is_self_locked());

        lock.unlock();
        lock.unlock();
        assert!(!lock.is_self_locked());
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn release_all_then_reacquire_restores_exact_depth() {
        let lock = EntityLock::new();
        for depth in 1..=5 {
            for _ in 0..depth {
                lock.lock();
            }
            let released = lock.release_all();
            assert_eq!(released, depth);
            assert!(!lock.is_self_locked());

            lock.reacquire(released);
            assert_eq!(lock.depth(), depth);
            assert_eq!(lock.release_all(), depth);
        }
    }

    #[test]
    fn reacquire_zero_does_not_lock() {
        let lock = EntityLock::new();
        lock.reacquire(0);
        assert!(!lock.is_self_locked());
    }

    #[test]
    #[should_panic(expected = "does not hold the lock")]
    fn unlock_without_holding_panics() {
        EntityLock::new().unlock();
    }

    #[test]
    #[should_panic(expected = "does not hold the lock")]
    fn release_all_without_holding_panics() {
        EntityLock::new().release_all();
    }

    #[test]
    fn unlock_from_another_thread_panics() {
        let lock = EntityLock::shared();
        lock.lock();
        let other = Arc::clone(&lock);
        let result = thread::spawn(move || other.unlock()).join();
        assert!(result.is_err());
        assert_eq!(lock.depth(), 1);
        lock.unlock();
    }

    #[test]
    fn other_threads_block_until_release_all() {
        let lock = EntityLock::shared();
        lock.lock();
        lock.lock();

        let acquired = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let handle = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                assert!(!lock.try_lock());
                tx.send(()).unwrap();
                let _guard = lock.guard();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!acquired.load(Ordering::SeqCst));

        {
            let scope = lock.release_scope();
            assert_eq!(scope.depth(), 2);
            handle.join().unwrap();
            assert!(acquired.load(Ordering::SeqCst));
        }

        assert_eq!(lock.depth(), 2);
        lock.release_all();
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = EntityLock::new();
        {
            let _outer = lock.guard();
            let _inner = lock.guard();
            assert_eq!(lock.depth(), 2);
        }
        assert!(!lock.is_self_locked());
    }

    #[test]
    fn try_guard_fails_while_another_thread_holds_the_lock() {
        let lock = EntityLock::shared();
        let _held = lock.guard();

        let other = Arc::clone(&lock);
        let acquired = thread::spawn(move || other.try_guard().is_some())
            .join()
            .unwrap();
        assert!(!acquired);

        let nested = lock.try_guard();
        assert!(nested.is_some());
        assert_eq!(lock.depth(), 2);
    }
}
