//! Scoped ownership of a GPU monitor for one cycle
//!
//! A [`MonitorSession`] exists only while its monitor is recording. It is
//! released exactly once: by [`MonitorSession::finish`] on every normal exit
//! path (success or workload failure), or by `Drop` when the cycle future is
//! cancelled or unwinds.

use sightline_gpu::{GpuMonitor, MonitorError};
use sightline_shared::Record;
use tracing::{debug, warn};

pub struct MonitorSession {
    monitor: Option<Box<dyn GpuMonitor>>,
}

impl MonitorSession {
    /// Start recording. The monitor is destroyed if it fails to start.
    pub async fn start(mut monitor: Box<dyn GpuMonitor>) -> Result<Self, MonitorError> {
        if let Err(e) = monitor.start_recording().await {
            monitor.destroy();
            return Err(e);
        }
        Ok(Self {
            monitor: Some(monitor),
        })
    }

    /// Stop recording, release the monitor, and return its samples.
    pub async fn finish(mut self) -> Result<Vec<Record>, MonitorError> {
        let Some(mut monitor) = self.monitor.take() else {
            return Err(MonitorError::NotRecording);
        };
        let records = monitor.stop_recording().await;
        monitor.destroy();
        debug!("GPU monitor released");
        records
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            warn!("Profiling cycle aborted; releasing GPU monitor");
            monitor.destroy();
        }
    }
}
