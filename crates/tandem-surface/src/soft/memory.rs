use std::time::Instant;

use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::device::{AcquireStatus, LockTimeout, MiscFlags, TextureDesc};
use crate::error::{InteropError, Result, ResultCode};

use super::adapter::DeviceId;

/// Texel storage of one texture, shared by every device view of it.
///
/// Texels are premultiplied RGBA8 whatever the declared format.
#[derive(Debug)]
pub(crate) struct TextureMemory {
    id: u64,
    desc: TextureDesc,
    texels: RwLock<Vec<[u8; 4]>>,
    keyed: Option<KeyedState>,
}

impl TextureMemory {
    pub(crate) fn new(id: u64, desc: TextureDesc) -> Self {
        let len = desc.width as usize * desc.height as usize;
        let keyed = desc
            .misc
            .contains(MiscFlags::SHARED_KEYED_MUTEX)
            .then(KeyedState::new);
        Self {
            id,
            desc,
            texels: RwLock::new(vec![[0; 4]; len]),
            keyed,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    #[inline]
    pub(crate) fn has_keyed_mutex(&self) -> bool {
        self.keyed.is_some()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<[u8; 4]>> {
        self.texels.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<[u8; 4]>> {
        self.texels.write()
    }

    /// True if `device` may touch the texels right now.
    ///
    /// Textures without a keyed mutex are always accessible.
    pub(crate) fn is_accessible_by(&self, device: DeviceId) -> bool {
        self.keyed
            .as_ref()
            .map_or(true, |k| k.state.lock().holder == Some(device))
    }

    pub(crate) fn holder(&self) -> Option<DeviceId> {
        self.keyed.as_ref().and_then(|k| k.state.lock().holder)
    }

    pub(crate) fn acquire(
        &self,
        device: DeviceId,
        key: u64,
        timeout: LockTimeout,
    ) -> Result<AcquireStatus> {
        self.keyed_state()?.acquire(device, key, timeout)
    }

    pub(crate) fn release(&self, device: DeviceId, key: u64) -> Result<()> {
        self.keyed_state()?.release(device, key)
    }

    fn keyed_state(&self) -> Result<&KeyedState> {
        self.keyed.as_ref().ok_or_else(|| {
            InteropError::graphics(
                ResultCode::E_NOINTERFACE,
                format!("texture {} was not created with a keyed mutex", self.id),
            )
        })
    }
}

/// DXGI keyed-mutex model.
///
/// Starts released with key `0`. `acquire(k)` succeeds once the mutex is free
/// and was last released with `k`.
#[derive(Debug)]
struct KeyedState {
    state: Mutex<KeyedInner>,
    cond: Condvar,
}

#[derive(Debug)]
struct KeyedInner {
    holder: Option<DeviceId>,
    key: u64,
}

impl KeyedState {
    fn new() -> Self {
        Self {
            state: Mutex::new(KeyedInner { holder: None, key: 0 }),
            cond: Condvar::new(),
        }
    }

    fn acquire(&self, device: DeviceId, key: u64, timeout: LockTimeout) -> Result<AcquireStatus> {
        let mut state = self.state.lock();
        if state.holder == Some(device) {
            return Err(InteropError::graphics(
                ResultCode::DXGI_ERROR_INVALID_CALL,
                format!("AcquireSync: {device} already holds the keyed mutex"),
            ));
        }

        // A deadline past the representable range waits forever.
        let deadline = timeout.duration().and_then(|d| Instant::now().checked_add(d));
        loop {
            if state.holder.is_none() && state.key == key {
                state.holder = Some(device);
                return Ok(AcquireStatus::Acquired);
            }
            match deadline {
                None => self.cond.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Ok(AcquireStatus::TimedOut);
                    }
                    // Spurious wakeups and missed deadlines both re-check above.
                    let _ = self.cond.wait_until(&mut state, deadline);
                }
            }
        }
    }

    fn release(&self, device: DeviceId, key: u64) -> Result<()> {
        let mut state = self.state.lock();
        if state.holder != Some(device) {
            return Err(InteropError::graphics(
                ResultCode::DXGI_ERROR_INVALID_CALL,
                format!("ReleaseSync: {device} does not hold the keyed mutex"),
            ));
        }
        state.holder = None;
        state.key = key;
        drop(state);
        self.cond.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::device::PixelFormat;

    const A: DeviceId = DeviceId(1);
    const B: DeviceId = DeviceId(2);

    fn keyed() -> TextureMemory {
        let desc = TextureDesc::new(2, 2, PixelFormat::Bgra8Unorm).shared_surface(PixelFormat::Bgra8Unorm);
        TextureMemory::new(7, desc)
    }

    #[test]
    fn starts_released_with_key_zero() {
        let mem = keyed();
        assert_eq!(mem.acquire(A, 0, LockTimeout::IMMEDIATE).unwrap(), AcquireStatus::Acquired);
        assert_eq!(mem.holder(), Some(A));
    }

    #[test]
    fn wrong_key_times_out() {
        let mem = keyed();
        assert_eq!(mem.acquire(A, 1, LockTimeout::IMMEDIATE).unwrap(), AcquireStatus::TimedOut);
        assert_eq!(mem.holder(), None);
    }

    #[test]
    fn release_key_selects_next_acquirer() {
        let mem = keyed();
        assert!(mem.acquire(A, 0, LockTimeout::IMMEDIATE).unwrap().is_acquired());
        mem.release(A, 1).unwrap();

        assert_eq!(mem.acquire(A, 0, LockTimeout::IMMEDIATE).unwrap(), AcquireStatus::TimedOut);
        assert_eq!(mem.acquire(B, 1, LockTimeout::IMMEDIATE).unwrap(), AcquireStatus::Acquired);
    }

    #[test]
    fn release_without_holding_is_invalid_call() {
        let mem = keyed();
        let err = mem.release(A, 0).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::DXGI_ERROR_INVALID_CALL));

        assert!(mem.acquire(A, 0, LockTimeout::IMMEDIATE).unwrap().is_acquired());
        assert!(mem.release(B, 0).is_err());
    }

    #[test]
    fn recursive_acquire_is_rejected() {
        let mem = keyed();
        assert!(mem.acquire(A, 0, LockTimeout::Infinite).unwrap().is_acquired());
        assert!(mem.acquire(A, 0, LockTimeout::IMMEDIATE).is_err());
    }

    #[test]
    fn infinite_wait_wakes_on_release() {
        let mem = Arc::new(keyed());
        assert!(mem.acquire(A, 0, LockTimeout::Infinite).unwrap().is_acquired());

        let waiter = {
            let mem = Arc::clone(&mem);
            thread::spawn(move || mem.acquire(B, 0, LockTimeout::Infinite).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        mem.release(A, 0).unwrap();

        assert_eq!(waiter.join().unwrap(), AcquireStatus::Acquired);
        assert_eq!(mem.holder(), Some(B));
    }

    #[test]
    fn finite_wait_respects_deadline() {
        let mem = keyed();
        assert!(mem.acquire(A, 0, LockTimeout::Infinite).unwrap().is_acquired());

        let start = Instant::now();
        let status = mem.acquire(B, 0, LockTimeout::from_millis(30)).unwrap();
        assert_eq!(status, AcquireStatus::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn unrepresentable_deadline_waits_like_infinite() {
        let mem = Arc::new(keyed());
        assert!(mem.acquire(A, 0, LockTimeout::Infinite).unwrap().is_acquired());

        let waiter = {
            let mem = Arc::clone(&mem);
            thread::spawn(move || mem.acquire(B, 0, LockTimeout::After(Duration::MAX)).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        mem.release(A, 0).unwrap();

        assert_eq!(waiter.join().unwrap(), AcquireStatus::Acquired);
        assert_eq!(mem.holder(), Some(B));
    }

    #[test]
    fn plain_texture_has_no_keyed_mutex() {
        let mem = TextureMemory::new(1, TextureDesc::new(1, 1, PixelFormat::Bgra8Unorm));
        assert!(mem.is_accessible_by(A));
        let err = mem.acquire(A, 0, LockTimeout::IMMEDIATE).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::E_NOINTERFACE));
    }
}
