use std::fmt;
use std::sync::Arc;

use crate::device::{AcquireStatus, KeyedMutex, LockTimeout};
use crate::error::Result;

use super::adapter::{DeviceId, SoftAdapter, SoftEvent};
use super::memory::TextureMemory;

/// One device's keyed-mutex view of a shared texture.
///
/// `Send + Sync`: the lock may be handed to another thread.
#[derive(Clone)]
pub struct SoftKeyedMutex {
    adapter: SoftAdapter,
    device: DeviceId,
    memory: Arc<TextureMemory>,
}

impl SoftKeyedMutex {
    pub(crate) fn new(adapter: SoftAdapter, device: DeviceId, memory: Arc<TextureMemory>) -> Self {
        Self {
            adapter,
            device,
            memory,
        }
    }

    #[inline]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// True if this view currently holds the mutex.
    pub fn is_held(&self) -> bool {
        self.memory.holder() == Some(self.device)
    }
}

impl KeyedMutex for SoftKeyedMutex {
    fn acquire(&self, key: u64, timeout: LockTimeout) -> Result<AcquireStatus> {
        let status = self.memory.acquire(self.device, key, timeout)?;
        let (device, texture) = (self.device, self.memory.id());
        self.adapter.record(match status {
            AcquireStatus::Acquired => SoftEvent::KeyedAcquire { device, texture, key },
            AcquireStatus::TimedOut => SoftEvent::KeyedAcquireTimedOut { device, texture, key },
        });
        Ok(status)
    }

    fn release(&self, key: u64) -> Result<()> {
        self.memory.release(self.device, key)?;
        self.adapter.record(SoftEvent::KeyedRelease {
            device: self.device,
            texture: self.memory.id(),
            key,
        });
        Ok(())
    }
}

impl fmt::Debug for SoftKeyedMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftKeyedMutex")
            .field("device", &self.device)
            .field("texture", &self.memory.id())
            .finish()
    }
}
