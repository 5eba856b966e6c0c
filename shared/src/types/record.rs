//! Measurement records
//!
//! A [`Record`] is one timestamped measurement of a [`RecordKind`]. Kinds form
//! a closed set; per-kind metadata (label, device scope) lives in a static
//! table indexed by the kind, so no dynamic dispatch is involved.
//!
//! Records are immutable once built. Device-scoped kinds always carry a
//! [`DeviceRef`], run-scoped kinds never do; the constructors enforce this.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::device::{DeviceId, DeviceRef};
use crate::utils::time;

/// Errors raised while building or inspecting records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record shape does not match its kind
    #[error("record type mismatch for '{kind}': {reason}")]
    TypeMismatch { kind: RecordKind, reason: String },

    /// A device was requested from a run-scoped record
    #[error("record '{0}' is not associated with a device")]
    NoDevice(RecordKind),

    /// A kind name did not match the catalog
    #[error("unknown record type '{0}'")]
    UnknownKind(String),
}

/// Tag identifying the measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    GpuUsedMemory,
    GpuFreeMemory,
    GpuUtilization,
    GpuPowerUsage,
    PerfThroughput,
    PerfLatency,
}

/// Static metadata for one kind
#[derive(Debug)]
pub struct KindInfo {
    pub name: &'static str,
    pub header: &'static str,
    pub device_scoped: bool,
}

// Indexed by `RecordKind as usize`; keep in declaration order.
static CATALOG: [KindInfo; 6] = [
    KindInfo {
        name: "gpu_used_memory",
        header: "GPU Used Memory [MB]",
        device_scoped: true,
    },
    KindInfo {
        name: "gpu_free_memory",
        header: "GPU Free Memory [MB]",
        device_scoped: true,
    },
    KindInfo {
        name: "gpu_utilization",
        header: "GPU Utilization [%]",
        device_scoped: true,
    },
    KindInfo {
        name: "gpu_power_usage",
        header: "GPU Power Usage [W]",
        device_scoped: true,
    },
    KindInfo {
        name: "perf_throughput",
        header: "Throughput [infer/sec]",
        device_scoped: false,
    },
    KindInfo {
        name: "perf_latency",
        header: "p99 Latency [ms]",
        device_scoped: false,
    },
];

impl RecordKind {
    /// Every kind, in catalog order
    pub const ALL: [RecordKind; 6] = [
        RecordKind::GpuUsedMemory,
        RecordKind::GpuFreeMemory,
        RecordKind::GpuUtilization,
        RecordKind::GpuPowerUsage,
        RecordKind::PerfThroughput,
        RecordKind::PerfLatency,
    ];

    pub fn info(self) -> &'static KindInfo {
        &CATALOG[self as usize]
    }

    /// Human-readable column label
    pub fn header(self) -> &'static str {
        self.info().header
    }

    /// Stable snake_case name used in configuration
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Whether records of this kind are measured per device
    pub fn is_device_scoped(self) -> bool {
        self.info().device_scoped
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| RecordError::UnknownKind(s.to_string()))
    }
}

/// One measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: RecordKind,
    value: f64,
    device: Option<DeviceRef>,
    timestamp: f64,
}

impl Record {
    /// Build a record, checking that the device presence matches the kind.
    pub fn new(
        kind: RecordKind,
        value: f64,
        device: Option<DeviceRef>,
        timestamp: f64,
    ) -> Result<Self, RecordError> {
        match (kind.is_device_scoped(), device.is_some()) {
            (true, false) => Err(RecordError::TypeMismatch {
                kind,
                reason: "device-scoped record requires a device".to_string(),
            }),
            (false, true) => Err(RecordError::TypeMismatch {
                kind,
                reason: "run-scoped record cannot carry a device".to_string(),
            }),
            _ => Ok(Self {
                kind,
                value,
                device,
                timestamp,
            }),
        }
    }

    /// Build a device-scoped record stamped with the current elapsed time.
    pub fn sample(kind: RecordKind, device: DeviceRef, value: f64) -> Result<Self, RecordError> {
        Self::new(kind, value, Some(device), time::elapsed_secs())
    }

    pub fn gpu_used_memory(device: DeviceRef, used_mb: f64, timestamp: f64) -> Self {
        Self::device_record(RecordKind::GpuUsedMemory, device, used_mb, timestamp)
    }

    pub fn gpu_free_memory(device: DeviceRef, free_mb: f64, timestamp: f64) -> Self {
        Self::device_record(RecordKind::GpuFreeMemory, device, free_mb, timestamp)
    }

    pub fn gpu_utilization(device: DeviceRef, percent: f64, timestamp: f64) -> Self {
        Self::device_record(RecordKind::GpuUtilization, device, percent, timestamp)
    }

    pub fn gpu_power_usage(device: DeviceRef, watts: f64, timestamp: f64) -> Self {
        Self::device_record(RecordKind::GpuPowerUsage, device, watts, timestamp)
    }

    pub fn perf_throughput(infer_per_sec: f64, timestamp: f64) -> Self {
        Self::run_record(RecordKind::PerfThroughput, infer_per_sec, timestamp)
    }

    pub fn perf_latency(latency_ms: f64, timestamp: f64) -> Self {
        Self::run_record(RecordKind::PerfLatency, latency_ms, timestamp)
    }

    fn device_record(kind: RecordKind, device: DeviceRef, value: f64, timestamp: f64) -> Self {
        Self {
            kind,
            value,
            device: Some(device),
            timestamp,
        }
    }

    fn run_record(kind: RecordKind, value: f64, timestamp: f64) -> Self {
        Self {
            kind,
            value,
            device: None,
            timestamp,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Seconds since the process reference start
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn header(&self) -> &'static str {
        self.kind.header()
    }

    /// The device this record was measured on, `None` for run-scoped kinds.
    pub fn device(&self) -> Option<&DeviceRef> {
        self.device.as_ref()
    }

    /// Grouping key for device-scoped records.
    pub fn device_id(&self) -> Result<DeviceId, RecordError> {
        self.device
            .as_ref()
            .map(|d| d.device_id())
            .ok_or(RecordError::NoDevice(self.kind))
    }

    /// Total order over values, consistent with numeric comparison.
    pub fn cmp_value(&self, other: &Record) -> Ordering {
        self.value.total_cmp(&other.value)
    }
}
