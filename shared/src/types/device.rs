//! Physical accelerator references

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable device index used as the grouping key for device-scoped records.
pub type DeviceId = u32;

/// A physical GPU as reported by the telemetry backend.
///
/// Devices are created once by the monitor and shared between records via
/// [`DeviceRef`]; records never own a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GpuDevice {
    /// Backend index of the device
    pub device_id: DeviceId,

    /// Vendor UUID, if the backend exposes one
    pub uuid: Option<String>,

    /// Marketing name (e.g. "NVIDIA A100-SXM4-40GB")
    pub name: Option<String>,
}

/// Shared handle to a device.
pub type DeviceRef = Arc<GpuDevice>;

impl GpuDevice {
    /// Create a device known only by its index
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            uuid: None,
            name: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Wrap into a shareable reference
    pub fn into_ref(self) -> DeviceRef {
        Arc::new(self)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "GPU {} ({})", self.device_id, name),
            None => write!(f, "GPU {}", self.device_id),
        }
    }
}
