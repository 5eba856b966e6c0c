//! NVML probe

use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use sightline_shared::{DeviceRef, GpuDevice, RecordKind};
use tracing::{info, warn};

use super::{bytes_to_mb, milliwatts_to_watts};
use crate::{GpuProbe, GpuSelection, MonitorError};

fn backend(e: NvmlError) -> MonitorError {
    MonitorError::Backend(e.to_string())
}

/// Reads GPU metrics through NVML
pub struct NvmlProbe {
    nvml: Nvml,
}

impl NvmlProbe {
    /// Load NVML and initialize it
    pub fn init() -> Result<Self, MonitorError> {
        let nvml = Nvml::init().map_err(backend)?;
        if let Ok(version) = nvml.sys_driver_version() {
            info!("NVML initialized (driver {})", version);
        }
        Ok(Self { nvml })
    }
}

impl GpuProbe for NvmlProbe {
    fn devices(&self, selection: &GpuSelection) -> Result<Vec<DeviceRef>, MonitorError> {
        let count = self.nvml.device_count().map_err(backend)?;

        if let GpuSelection::Ids(ids) = selection {
            for id in ids.iter().filter(|id| **id >= count) {
                warn!("GPU {} requested but only {} devices are present", id, count);
            }
        }

        let mut devices = Vec::new();
        for index in (0..count).filter(|index| selection.includes(*index)) {
            let handle = self.nvml.device_by_index(index).map_err(backend)?;
            let mut device = GpuDevice::new(index);
            if let Ok(uuid) = handle.uuid() {
                device = device.with_uuid(uuid);
            }
            if let Ok(name) = handle.name() {
                device = device.with_name(name);
            }
            devices.push(device.into_ref());
        }
        Ok(devices)
    }

    fn read(&self, device: &GpuDevice, kind: RecordKind) -> Result<f64, MonitorError> {
        let handle = self
            .nvml
            .device_by_index(device.device_id())
            .map_err(backend)?;

        match kind {
            RecordKind::GpuUsedMemory => {
                Ok(bytes_to_mb(handle.memory_info().map_err(backend)?.used))
            }
            RecordKind::GpuFreeMemory => {
                Ok(bytes_to_mb(handle.memory_info().map_err(backend)?.free))
            }
            RecordKind::GpuUtilization => {
                Ok(handle.utilization_rates().map_err(backend)?.gpu as f64)
            }
            RecordKind::GpuPowerUsage => {
                Ok(milliwatts_to_watts(handle.power_usage().map_err(backend)?))
            }
            RecordKind::PerfThroughput | RecordKind::PerfLatency => Err(MonitorError::Backend(
                format!("'{}' is not a GPU metric", kind),
            )),
        }
    }
}
