//! Interval sampler
//!
//! Runs a tokio task that reads every configured metric on every selected
//! device once per tick. The task owns its sample buffer and returns it when
//! cancelled, so samples taken after `stop_recording` cannot leak into the
//! returned batch.

use async_trait::async_trait;
use sightline_shared::{DeviceRef, Record, RecordKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{GpuMonitor, GpuProbe, GpuSelection, MonitorError, MonitorFactory};

struct Recording {
    cancel: CancellationToken,
    handle: JoinHandle<Vec<Record>>,
}

/// [`GpuMonitor`] backed by a [`GpuProbe`].
pub struct SamplingMonitor<P: GpuProbe> {
    probe: Arc<P>,
    devices: Vec<DeviceRef>,
    interval: Duration,
    kinds: Vec<RecordKind>,
    recording: Option<Recording>,
    destroyed: bool,
}

impl<P: GpuProbe> SamplingMonitor<P> {
    /// Create a monitor for the selected devices.
    ///
    /// Run-scoped kinds in `tags` are ignored.
    pub fn new(
        probe: Arc<P>,
        selection: &GpuSelection,
        interval: Duration,
        tags: &[RecordKind],
    ) -> Result<Self, MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::InvalidInterval);
        }

        let devices = probe.devices(selection)?;
        if devices.is_empty() {
            return Err(MonitorError::NoDevices(selection.to_string()));
        }

        let kinds: Vec<RecordKind> = tags
            .iter()
            .copied()
            .filter(|kind| kind.is_device_scoped())
            .collect();
        if kinds.len() != tags.len() {
            debug!("Ignoring run-scoped tags passed to GPU monitor");
        }

        Ok(Self {
            probe,
            devices,
            interval,
            kinds,
            recording: None,
            destroyed: false,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    fn abort_recording(&mut self) {
        if let Some(recording) = self.recording.take() {
            recording.cancel.cancel();
            recording.handle.abort();
        }
    }
}

fn sample_round<P: GpuProbe>(
    probe: &P,
    devices: &[DeviceRef],
    kinds: &[RecordKind],
    records: &mut Vec<Record>,
) {
    for device in devices {
        for &kind in kinds {
            let sampled = probe
                .read(device, kind)
                .map_err(|e| e.to_string())
                .and_then(|value| {
                    Record::sample(kind, device.clone(), value).map_err(|e| e.to_string())
                });
            match sampled {
                Ok(record) => records.push(record),
                Err(e) => debug!("Failed to sample {} on {}: {}", kind, device, e),
            }
        }
    }
}

#[async_trait]
impl<P: GpuProbe> GpuMonitor for SamplingMonitor<P> {
    async fn start_recording(&mut self) -> Result<(), MonitorError> {
        if self.destroyed {
            return Err(MonitorError::Destroyed);
        }
        if self.recording.is_some() {
            return Err(MonitorError::AlreadyRecording);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let (started_tx, started_rx) = oneshot::channel();

        let probe = self.probe.clone();
        let devices = self.devices.clone();
        let kinds = self.kinds.clone();
        let interval = self.interval;
        let token = cancel.clone();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut records = Vec::new();
            let mut started_tx = Some(started_tx);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        sample_round(probe.as_ref(), &devices, &kinds, &mut records);
                        if let Some(tx) = started_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                }
            }
            records
        });

        self.recording = Some(Recording { cancel, handle });

        if started_rx.await.is_err() {
            // The task ended before its first round; surface why.
            if let Some(recording) = self.recording.take() {
                return match recording.handle.await {
                    Ok(_) => Err(MonitorError::SamplerTask(
                        "stopped before first sample".to_string(),
                    )),
                    Err(e) => Err(MonitorError::SamplerTask(e.to_string())),
                };
            }
        }

        info!(
            "Recording {} metrics on {} GPUs every {:?}",
            self.kinds.len(),
            self.devices.len(),
            self.interval
        );
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<Vec<Record>, MonitorError> {
        let recording = self.recording.take().ok_or(MonitorError::NotRecording)?;
        recording.cancel.cancel();
        let records = recording
            .handle
            .await
            .map_err(|e| MonitorError::SamplerTask(e.to_string()))?;
        info!("Collected {} GPU samples", records.len());
        Ok(records)
    }

    fn destroy(&mut self) {
        self.abort_recording();
        self.destroyed = true;
    }
}

impl<P: GpuProbe> Drop for SamplingMonitor<P> {
    fn drop(&mut self) {
        self.abort_recording();
    }
}

/// Creates a [`SamplingMonitor`] per cycle around a shared probe.
pub struct ProbeMonitorFactory<P: GpuProbe> {
    probe: Arc<P>,
}

impl<P: GpuProbe> ProbeMonitorFactory<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe: Arc::new(probe),
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }
}

impl<P: GpuProbe> MonitorFactory for ProbeMonitorFactory<P> {
    fn create(
        &self,
        selection: &GpuSelection,
        interval: Duration,
        tags: &[RecordKind],
    ) -> Result<Box<dyn GpuMonitor>, MonitorError> {
        let monitor = SamplingMonitor::new(self.probe.clone(), selection, interval, tags)?;
        Ok(Box::new(monitor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_shared::GpuDevice;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeProbe {
        device_count: u32,
        reads: AtomicU64,
    }

    impl FakeProbe {
        fn new(device_count: u32) -> Self {
            Self {
                device_count,
                reads: AtomicU64::new(0),
            }
        }
    }

    impl GpuProbe for FakeProbe {
        fn devices(&self, selection: &GpuSelection) -> Result<Vec<DeviceRef>, MonitorError> {
            Ok((0..self.device_count)
                .filter(|id| selection.includes(*id))
                .map(|id| GpuDevice::new(id).into_ref())
                .collect())
        }

        fn read(&self, _device: &GpuDevice, kind: RecordKind) -> Result<f64, MonitorError> {
            if kind == RecordKind::GpuPowerUsage {
                return Err(MonitorError::Backend("power not supported".to_string()));
            }
            Ok(self.reads.fetch_add(1, Ordering::Relaxed) as f64)
        }
    }

    fn monitor(devices: u32, interval_ms: u64, tags: &[RecordKind]) -> SamplingMonitor<FakeProbe> {
        SamplingMonitor::new(
            Arc::new(FakeProbe::new(devices)),
            &GpuSelection::All,
            Duration::from_millis(interval_ms),
            tags,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_samples_are_bracketed() {
        let mut monitor = monitor(1, 50, &[RecordKind::GpuUsedMemory]);
        monitor.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let records = monitor.stop_recording().await.unwrap();

        assert!(records.len() >= 3, "got {} samples", records.len());
        assert!(records.len() <= 5, "got {} samples", records.len());

        // Nothing is recorded after stop.
        let reads_after_stop = monitor.probe.reads.load(Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(monitor.probe.reads.load(Ordering::Relaxed), reads_after_stop);
    }

    #[tokio::test]
    async fn test_first_round_taken_before_start_returns() {
        let mut monitor = monitor(2, 1000, &[RecordKind::GpuUsedMemory, RecordKind::GpuFreeMemory]);
        monitor.start_recording().await.unwrap();
        assert_eq!(monitor.probe.reads.load(Ordering::Relaxed), 4);
        let records = monitor.stop_recording().await.unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.device().is_some()));
    }

    #[tokio::test]
    async fn test_run_scoped_tags_ignored() {
        let tags = [RecordKind::GpuUsedMemory, RecordKind::PerfThroughput];
        let mut monitor = monitor(1, 1000, &tags);
        monitor.start_recording().await.unwrap();
        let records = monitor.stop_recording().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), RecordKind::GpuUsedMemory);
    }

    #[tokio::test]
    async fn test_failed_reads_are_skipped() {
        let mut monitor = monitor(1, 1000, &[RecordKind::GpuPowerUsage, RecordKind::GpuUsedMemory]);
        monitor.start_recording().await.unwrap();
        let records = monitor.stop_recording().await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_and_stop_without_start() {
        let mut monitor = monitor(1, 1000, &[RecordKind::GpuUsedMemory]);
        assert!(matches!(
            monitor.stop_recording().await,
            Err(MonitorError::NotRecording)
        ));
        monitor.start_recording().await.unwrap();
        assert!(matches!(
            monitor.start_recording().await,
            Err(MonitorError::AlreadyRecording)
        ));
        monitor.stop_recording().await.unwrap();
    }

    #[tokio::test]
    async fn test_destroy_aborts_and_blocks_restart() {
        let mut monitor = monitor(1, 10, &[RecordKind::GpuUsedMemory]);
        monitor.start_recording().await.unwrap();
        monitor.destroy();
        assert!(!monitor.is_recording());
        assert!(matches!(
            monitor.start_recording().await,
            Err(MonitorError::Destroyed)
        ));
    }

    #[test]
    fn test_no_devices() {
        let result = SamplingMonitor::new(
            Arc::new(FakeProbe::new(2)),
            &GpuSelection::Ids(vec![7]),
            Duration::from_millis(10),
            &[RecordKind::GpuUsedMemory],
        );
        assert!(matches!(result, Err(MonitorError::NoDevices(_))));
    }

    #[test]
    fn test_zero_interval() {
        let result = SamplingMonitor::new(
            Arc::new(FakeProbe::new(1)),
            &GpuSelection::All,
            Duration::ZERO,
            &[RecordKind::GpuUsedMemory],
        );
        assert!(matches!(result, Err(MonitorError::InvalidInterval)));
    }

    #[test]
    fn test_factory_builds_monitor() {
        let factory = ProbeMonitorFactory::new(FakeProbe::new(1));
        assert!(factory
            .create(&GpuSelection::All, Duration::from_millis(10), &[RecordKind::GpuUsedMemory])
            .is_ok());
    }
}
