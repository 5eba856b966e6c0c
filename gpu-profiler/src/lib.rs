//! GPU telemetry
//!
//! Samples device-scoped metrics on a fixed interval while a workload runs.
//! A [`GpuMonitor`] is started before the workload and stopped after it;
//! `stop_recording` hands back exactly the samples taken in between.

pub mod sampler;
pub mod selection;

#[cfg(feature = "nvml")]
pub mod nvml;

pub use sampler::{ProbeMonitorFactory, SamplingMonitor};
pub use selection::GpuSelection;

use async_trait::async_trait;
use sightline_shared::{DeviceRef, GpuDevice, Record, RecordKind};
use std::time::Duration;
use thiserror::Error;

/// Telemetry errors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor is already recording")]
    AlreadyRecording,

    #[error("monitor is not recording")]
    NotRecording,

    #[error("monitor has been destroyed")]
    Destroyed,

    #[error("no GPUs match selection '{0}'")]
    NoDevices(String),

    #[error("monitoring interval must be greater than 0")]
    InvalidInterval,

    #[error("GPU sampling requires a running tokio runtime")]
    NoRuntime,

    #[error("GPU backend error: {0}")]
    Backend(String),

    #[error("sampler task failed: {0}")]
    SamplerTask(String),
}

/// Reads raw values from a telemetry backend.
pub trait GpuProbe: Send + Sync + 'static {
    /// Devices matching `selection`
    fn devices(&self, selection: &GpuSelection) -> Result<Vec<DeviceRef>, MonitorError>;

    /// Current value of `kind` on `device`
    fn read(&self, device: &GpuDevice, kind: RecordKind) -> Result<f64, MonitorError>;
}

/// Background recorder of device-scoped samples.
#[async_trait]
pub trait GpuMonitor: Send {
    /// Begin sampling. Returns once the first sample round has been taken.
    async fn start_recording(&mut self) -> Result<(), MonitorError>;

    /// Stop sampling and return every sample taken since the matching start.
    async fn stop_recording(&mut self) -> Result<Vec<Record>, MonitorError>;

    /// Release backend resources. Aborts an unfinished recording.
    fn destroy(&mut self);
}

/// Builds one monitor per profiling cycle.
pub trait MonitorFactory: Send + Sync {
    fn create(
        &self,
        selection: &GpuSelection,
        interval: Duration,
        tags: &[RecordKind],
    ) -> Result<Box<dyn GpuMonitor>, MonitorError>;
}
