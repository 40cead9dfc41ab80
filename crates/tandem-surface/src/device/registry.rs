use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::Result;

use super::{AdapterId, Platform};

/// Per-adapter cache of owner devices.
///
/// Façades created on the same adapter share one owner device; guest devices
/// are created fresh on every request. The registry is an explicit object so
/// its lifetime and sharing are up to the host.
pub struct DeviceRegistry<P: Platform> {
    platform: P,
    owners: Mutex<HashMap<AdapterId, P::Owner>>,
}

impl<P: Platform> DeviceRegistry<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            owners: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Cached owner device for `adapter`, created on first use.
    pub fn owner_device(&self, adapter: &P::Adapter) -> Result<P::Owner> {
        let id = self.platform.adapter_id(adapter);

        let mut owners = self.owners.lock();
        if let Some(device) = owners.get(&id) {
            return Ok(device.clone());
        }

        let device = self.platform.create_owner_device(adapter)?;
        log::debug!("DeviceRegistry: created owner device for {id}");
        owners.insert(id, device.clone());
        Ok(device)
    }

    /// A new guest device on `adapter`.
    pub fn create_guest_device(&self, adapter: &P::Adapter) -> Result<P::Guest> {
        let device = self.platform.create_guest_device(adapter)?;
        log::debug!(
            "DeviceRegistry: created guest device for {}",
            self.platform.adapter_id(adapter)
        );
        Ok(device)
    }

    /// True if an owner device for `adapter` is cached.
    pub fn has_owner(&self, adapter: &P::Adapter) -> bool {
        let id = self.platform.adapter_id(adapter);
        self.owners.lock().contains_key(&id)
    }

    pub fn cached_devices(&self) -> usize {
        self.owners.lock().len()
    }

    /// Drops the cached owner device of one adapter (e.g. after device loss).
    pub fn evict(&self, adapter: &P::Adapter) -> Option<P::Owner> {
        let id = self.platform.adapter_id(adapter);
        self.owners.lock().remove(&id)
    }

    pub fn clear(&self) {
        self.owners.lock().clear();
    }
}
