//! Shared canonical control state.

use std::sync::Arc;

use tokio::sync::watch;

use growbox_types::{ControlSettings, DeviceBoard, DeviceKind, Switch};

use crate::resource::{Synced, SyncedResource};

/// Canonical settings snapshot and device board.
///
/// One store is shared (as [`SharedStore`]) by the synchronizer, which
/// applies pulled snapshots, and the dispatcher, which patches optimistically.
/// Both write the same fields and the last applied write wins.
#[derive(Debug)]
pub struct ControlStore {
    settings: SyncedResource<ControlSettings>,
    devices: SyncedResource<DeviceBoard>,
}

/// Shared handle to a [`ControlStore`].
pub type SharedStore = Arc<ControlStore>;

impl Default for ControlStore {
    fn default() -> Self {
        Self::new(ControlSettings::default())
    }
}

impl ControlStore {
    /// Create a store that shows `defaults` until the first settings fetch.
    pub fn new(defaults: ControlSettings) -> Self {
        Self {
            settings: SyncedResource::new("settings", defaults),
            devices: SyncedResource::new("devices", DeviceBoard::default()),
        }
    }

    /// Create a shared store with built-in defaults.
    pub fn shared() -> SharedStore {
        Arc::new(Self::default())
    }

    pub fn settings(&self) -> &SyncedResource<ControlSettings> {
        &self.settings
    }

    pub fn devices(&self) -> &SyncedResource<DeviceBoard> {
        &self.devices
    }

    /// Current status of one device.
    pub fn device_status(&self, device: DeviceKind) -> Switch {
        self.devices.value().status(device)
    }

    /// Current settings snapshot.
    pub fn current_settings(&self) -> ControlSettings {
        self.settings.value()
    }

    pub fn subscribe_settings(&self) -> watch::Receiver<Synced<ControlSettings>> {
        self.settings.subscribe()
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<Synced<DeviceBoard>> {
        self.devices.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_starts_with_defaults() {
        let store = ControlStore::default();
        assert_eq!(store.current_settings(), ControlSettings::default());
        for device in DeviceKind::ALL {
            assert_eq!(store.device_status(device), Switch::Off);
        }
        assert!(!store.settings().get().is_synced());
    }

    #[test]
    fn test_patch_visible_to_subscribers() {
        let store = ControlStore::shared();
        let mut rx = store.subscribe_devices();
        store
            .devices()
            .patch(|board| board.set_status(DeviceKind::Fan, Switch::On));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().value.status(DeviceKind::Fan), Switch::On);
    }
}
