use std::sync::Arc;

use autotss_catalog::FirmwareCatalog;
use autotss_core::types::{Device, UserId};
use autotss_core::BlobTree;
use tracing::info;

use crate::error::{DeviceError, Result};
use crate::store::DeviceStore;
use crate::types::NewDevice;
use crate::validate::{self, ValidationError};

/// User-facing device management: add with validation, remove with blob
/// cleanup.
pub struct DeviceRegistry {
    store: Arc<dyn DeviceStore>,
    catalog: Arc<dyn FirmwareCatalog>,
    blobs: BlobTree,
    max_devices: usize,
}

impl DeviceRegistry {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        catalog: Arc<dyn FirmwareCatalog>,
        blobs: BlobTree,
        max_devices: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            blobs,
            max_devices,
        }
    }

    pub fn list_devices(&self, user: UserId) -> Result<Vec<Device>> {
        self.store.get_devices(user)
    }

    /// Validate `input` and append it to the user's list. Adding a device
    /// (re-)enables the user. `is_owner` lifts the device cap.
    pub async fn add_device(&self, user: UserId, input: NewDevice, is_owner: bool) -> Result<Device> {
        let mut devices = self.store.get_devices(user)?;
        if !is_owner && devices.len() >= self.max_devices {
            return Err(ValidationError::TooManyDevices(self.max_devices).into());
        }

        let device = validate::validate_new(self.catalog.as_ref(), &devices, input).await?;
        devices.push(device.clone());
        self.store.put_devices(user, &devices)?;
        self.store.set_enabled(user, true)?;

        info!(%user, name = %device.name, identifier = %device.identifier, "device added");
        Ok(device)
    }

    /// Remove the device named `name` (case-insensitive) and everything saved
    /// for its ECID. A user left with no devices is deleted.
    pub fn remove_device(&self, user: UserId, name: &str) -> Result<Device> {
        let mut devices = self.store.get_devices(user)?;
        let idx = devices
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))?;
        let device = devices.remove(idx);

        self.blobs.remove_ecid(&device.ecid)?;
        if devices.is_empty() {
            self.store.delete_user(user)?;
        } else {
            self.store.put_devices(user, &devices)?;
        }

        info!(%user, name = %device.name, remaining = devices.len(), "device removed");
        Ok(device)
    }
}
