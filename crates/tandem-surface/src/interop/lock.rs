use std::fmt;

use crate::device::{AcquireStatus, KeyedMutex, LockSide, LockTimeout};
use crate::error::{InteropError, Result};

/// One side's capability to lock the shared surface.
///
/// Obtained when the surface is opened and passed explicitly to whoever
/// draws; there is no global lock state. Acquire and release must pair up
/// on the same side before the other side can get in.
pub struct CrossContextLock<L> {
    side: LockSide,
    mutex: L,
}

impl<L: KeyedMutex> CrossContextLock<L> {
    pub fn new(side: LockSide, mutex: L) -> Self {
        Self { side, mutex }
    }

    #[inline]
    pub fn side(&self) -> LockSide {
        self.side
    }

    /// Native keyed mutex behind this capability.
    pub fn raw(&self) -> &L {
        &self.mutex
    }

    /// Waits up to `timeout` for the surface. A timeout is a value, not an error.
    pub fn acquire(&self, key: u64, timeout: LockTimeout) -> Result<AcquireStatus> {
        let status = self.mutex.acquire(key, timeout)?;
        if !status.is_acquired() {
            log::debug!("{} lock: acquire(key {key}) timed out after {timeout}", self.side);
        }
        Ok(status)
    }

    pub fn release(&self, key: u64) -> Result<()> {
        self.mutex.release(key)
    }

    /// Acquires, turning a timeout into [`InteropError::LockTimeout`], and
    /// returns a guard that releases with the same key when dropped.
    #[inline]
    pub fn lock(&self, key: u64, timeout: LockTimeout) -> Result<LockGuard<'_, L>> {
        self.lock_handing_off(key, key, timeout)
    }

    /// Like [`lock`](Self::lock), but the guard releases with `next_key`, so
    /// only the side acquiring with `next_key` can take the surface next.
    pub fn lock_handing_off(
        &self,
        key: u64,
        next_key: u64,
        timeout: LockTimeout,
    ) -> Result<LockGuard<'_, L>> {
        match self.acquire(key, timeout)? {
            AcquireStatus::Acquired => Ok(LockGuard {
                lock: self,
                next_key,
                released: false,
            }),
            AcquireStatus::TimedOut => Err(InteropError::LockTimeout {
                side: self.side,
                timeout,
            }),
        }
    }
}

impl<L: Clone> Clone for CrossContextLock<L> {
    fn clone(&self) -> Self {
        Self {
            side: self.side,
            mutex: self.mutex.clone(),
        }
    }
}

impl<L> fmt::Debug for CrossContextLock<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossContextLock").field("side", &self.side).finish()
    }
}

/// Held surface lock. Released on drop; use [`LockGuard::release`] to see
/// the release result.
#[must_use = "the surface is released as soon as the guard is dropped"]
pub struct LockGuard<'a, L: KeyedMutex> {
    lock: &'a CrossContextLock<L>,
    next_key: u64,
    released: bool,
}

impl<L: KeyedMutex> LockGuard<'_, L> {
    #[inline]
    pub fn side(&self) -> LockSide {
        self.lock.side
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release(self.next_key)
    }
}

impl<L: KeyedMutex> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.lock.release(self.next_key) {
            log::error!("{} lock: release on drop failed: {e}", self.lock.side);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::error::ResultCode;

    /// Single-threaded keyed mutex model shared by two sides.
    #[derive(Default)]
    struct Model {
        holder: Cell<Option<LockSide>>,
        key: Cell<u64>,
        log: RefCell<Vec<String>>,
    }

    struct Side<'a> {
        model: &'a Model,
        side: LockSide,
    }

    impl KeyedMutex for Side<'_> {
        fn acquire(&self, key: u64, _timeout: LockTimeout) -> Result<AcquireStatus> {
            if self.model.holder.get().is_none() && self.model.key.get() == key {
                self.model.holder.set(Some(self.side));
                self.model.log.borrow_mut().push(format!("acquire {}", self.side));
                Ok(AcquireStatus::Acquired)
            } else {
                Ok(AcquireStatus::TimedOut)
            }
        }

        fn release(&self, key: u64) -> Result<()> {
            if self.model.holder.get() != Some(self.side) {
                return Err(InteropError::graphics(ResultCode::DXGI_ERROR_INVALID_CALL, "release"));
            }
            self.model.holder.set(None);
            self.model.key.set(key);
            self.model.log.borrow_mut().push(format!("release {}", self.side));
            Ok(())
        }
    }

    fn lock(model: &Model, side: LockSide) -> CrossContextLock<Side<'_>> {
        CrossContextLock::new(side, Side { model, side })
    }

    #[test]
    fn at_most_one_side_holds() {
        let model = Model::default();
        let owner = lock(&model, LockSide::Owner);
        let guest = lock(&model, LockSide::Guest);

        assert!(guest.acquire(0, LockTimeout::IMMEDIATE).unwrap().is_acquired());
        assert_eq!(owner.acquire(0, LockTimeout::IMMEDIATE).unwrap(), AcquireStatus::TimedOut);

        guest.release(0).unwrap();
        assert!(owner.acquire(0, LockTimeout::IMMEDIATE).unwrap().is_acquired());
        assert_eq!(model.holder.get(), Some(LockSide::Owner));
    }

    #[test]
    fn lock_turns_timeout_into_error() {
        let model = Model::default();
        let owner = lock(&model, LockSide::Owner);
        let guest = lock(&model, LockSide::Guest);

        let _held = guest.lock(0, LockTimeout::IMMEDIATE).unwrap();
        let err = owner.lock(0, LockTimeout::IMMEDIATE).err().unwrap();
        assert!(err.is_lock_timeout());
    }

    #[test]
    fn guard_releases_on_drop() {
        let model = Model::default();
        let owner = lock(&model, LockSide::Owner);
        {
            let guard = owner.lock(0, LockTimeout::Infinite).unwrap();
            assert_eq!(guard.side(), LockSide::Owner);
        }
        assert_eq!(model.holder.get(), None);
        assert_eq!(*model.log.borrow(), ["acquire owner", "release owner"]);
    }

    #[test]
    fn explicit_release_reports_and_does_not_double_release() {
        let model = Model::default();
        let owner = lock(&model, LockSide::Owner);
        let guard = owner.lock(0, LockTimeout::Infinite).unwrap();
        guard.release().unwrap();
        assert_eq!(model.log.borrow().len(), 2);
    }

    #[test]
    fn hand_off_alternates_sides() {
        let model = Model::default();
        let owner = lock(&model, LockSide::Owner);
        let guest = lock(&model, LockSide::Guest);

        for _ in 0..2 {
            let g = guest.lock_handing_off(0, 1, LockTimeout::IMMEDIATE).unwrap();
            drop(g);
            assert_eq!(model.key.get(), 1);
            let err = guest.lock_handing_off(0, 1, LockTimeout::IMMEDIATE).err().unwrap();
            assert!(err.is_lock_timeout());

            owner.lock_handing_off(1, 0, LockTimeout::IMMEDIATE).unwrap().release().unwrap();
            assert_eq!(model.key.get(), 0);
        }
        assert_eq!(
            *model.log.borrow(),
            [
                "acquire guest",
                "release guest",
                "acquire owner",
                "release owner",
                "acquire guest",
                "release guest",
                "acquire owner",
                "release owner",
            ]
        );
    }
}
