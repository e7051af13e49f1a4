// ── Shared entity ──
//
// A `ControlledEntity` reachable from several threads. Its state is only
// handed out through an `EntityGuard`, which holds one level of the
// entity's `EntityLock` for as long as it lives. While a holder has
// released every level around a callback, the state is out of reach on
// its own thread too, and other threads may lock and mutate it.

use std::cell::RefCell;

use parking_lot::ReentrantMutex;

use crate::entity::ControlledEntity;
use crate::lock::{EntityLock, EntityLockGuard, ReleasedScope, SharedLock};

#[derive(Debug)]
pub struct SharedEntity {
    lock: SharedLock,
    // Only ever locked by the `EntityLock` holder, so it is uncontended.
    // Reentrant so nested reads on the holding thread work.
    state: ReentrantMutex<RefCell<ControlledEntity>>,
}

impl SharedEntity {
    /// Share an entity behind its own lock.
    pub fn new(entity: ControlledEntity) -> Self {
        Self::with_shared_lock(entity, EntityLock::shared())
    }

    /// Share an entity behind a lock also used by other trackers that
    /// represent the same physical device.
    pub fn with_shared_lock(entity: ControlledEntity, lock: SharedLock) -> Self {
        Self {
            lock,
            state: ReentrantMutex::new(RefCell::new(entity)),
        }
    }

    pub fn entity_lock(&self) -> &EntityLock {
        &self.lock
    }

    pub fn shared_lock(&self) -> SharedLock {
        SharedLock::clone(&self.lock)
    }

    /// Acquire one level of the entity lock, blocking while another
    /// thread holds it.
    pub fn lock(&self) -> EntityGuard<'_> {
        EntityGuard {
            shared: self,
            _level: self.lock.guard(),
        }
    }

    /// Acquire one level without blocking.
    pub fn try_lock(&self) -> Option<EntityGuard<'_>> {
        self.lock.try_guard().map(|level| EntityGuard {
            shared: self,
            _level: level,
        })
    }

    pub fn into_inner(self) -> ControlledEntity {
        self.state.into_inner().into_inner()
    }

    fn assert_held(&self, operation: &str) {
        assert!(
            self.lock.is_self_locked(),
            "SharedEntity::{operation} while the entity lock is released"
        );
    }
}

/// One level of an entity's lock, with access to its state.
///
/// # Panics
///
/// `read` and `write` panic when called inside a [`ReleasedScope`] of the
/// same lock, and `write` panics when nested inside another access on the
/// same thread.
#[derive(Debug)]
pub struct EntityGuard<'a> {
    shared: &'a SharedEntity,
    _level: EntityLockGuard<'a>,
}

impl EntityGuard<'_> {
    pub fn read<R>(&self, f: impl FnOnce(&ControlledEntity) -> R) -> R {
        self.shared.assert_held("read");
        let state = self.shared.state.lock();
        let entity = state.borrow();
        f(&entity)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut ControlledEntity) -> R) -> R {
        self.shared.assert_held("write");
        let state = self.shared.state.lock();
        let mut entity = state.borrow_mut();
        f(&mut entity)
    }

    /// Levels of the entity lock held by this thread.
    pub fn depth(&self) -> u32 {
        self.shared.lock.depth()
    }

    /// Drop every level held by this thread (this guard's and any outer
    /// ones) until the scope ends, e.g. around an observer callback.
    pub fn release_scope(&self) -> ReleasedScope<'_> {
        self.shared.lock.release_scope()
    }
}
