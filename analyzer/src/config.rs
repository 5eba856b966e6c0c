//! Configuration types for the analyzer

use serde::{Deserialize, Serialize};
use sightline_gpu::GpuSelection;
use sightline_shared::RecordKind;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AnalyzerError, Result};
use crate::perf::PerfConfig;

/// Analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Path to the perf_analyzer binary
    pub perf_analyzer_path: PathBuf,

    /// Length of the server-only idle window, in seconds
    pub duration_seconds: u64,

    /// GPU sampling interval, in milliseconds
    pub monitoring_interval_ms: u64,

    /// GPUs to monitor
    pub gpus: GpuSelection,

    /// Metrics to collect, in result column order
    pub monitoring_metrics: Vec<RecordKind>,

    /// Optional deadline for one perf_analyzer run, in seconds
    pub workload_timeout_secs: Option<u64>,

    /// Model column value for server-only rows
    pub server_name: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            perf_analyzer_path: PathBuf::from("perf_analyzer"),
            duration_seconds: 5,
            monitoring_interval_ms: 10,
            gpus: GpuSelection::All,
            monitoring_metrics: vec![
                RecordKind::PerfThroughput,
                RecordKind::PerfLatency,
                RecordKind::GpuUsedMemory,
                RecordKind::GpuFreeMemory,
            ],
            workload_timeout_secs: None,
            server_name: "triton-server".to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Server-only idle window
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring_interval_ms)
    }

    pub fn workload_timeout(&self) -> Option<Duration> {
        self.workload_timeout_secs.map(Duration::from_secs)
    }

    /// Device-scoped metrics, in configured order
    pub fn device_tags(&self) -> Vec<RecordKind> {
        self.monitoring_metrics
            .iter()
            .copied()
            .filter(|kind| kind.is_device_scoped())
            .collect()
    }

    /// Run-scoped metrics, in configured order
    pub fn run_tags(&self) -> Vec<RecordKind> {
        self.monitoring_metrics
            .iter()
            .copied()
            .filter(|kind| !kind.is_device_scoped())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.monitoring_interval_ms == 0 {
            return Err(AnalyzerError::Config(
                "Monitoring interval must be greater than 0".to_string(),
            ));
        }

        if self.duration_seconds == 0 {
            return Err(AnalyzerError::Config(
                "Duration must be greater than 0".to_string(),
            ));
        }

        if self.workload_timeout_secs == Some(0) {
            return Err(AnalyzerError::Config(
                "Workload timeout must be greater than 0".to_string(),
            ));
        }

        if self.monitoring_metrics.is_empty() {
            return Err(AnalyzerError::Config(
                "At least one monitoring metric is required".to_string(),
            ));
        }

        for (i, kind) in self.monitoring_metrics.iter().enumerate() {
            if self.monitoring_metrics[..i].contains(kind) {
                return Err(AnalyzerError::Config(format!(
                    "Metric '{}' listed more than once",
                    kind
                )));
            }
        }

        Ok(())
    }
}

/// perf_analyzer arguments owned by dedicated `RunConfig` fields
const RESERVED_OPTIONS: [&str; 4] = [
    "model-name",
    "batch-size",
    "concurrency-range",
    "request-rate-range",
];

/// Parameters of one model profiling cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub model_name: String,

    pub batch_size: u32,

    /// Concurrency range, e.g. "4" or "1:16:2"
    #[serde(default)]
    pub concurrency_range: Option<String>,

    /// Request rate range, used instead of a concurrency range
    #[serde(default)]
    pub request_rate_range: Option<String>,

    /// Further perf_analyzer options, by perf_analyzer argument name
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl RunConfig {
    pub fn new(model_name: impl Into<String>, batch_size: u32, concurrency: u32) -> Self {
        Self {
            model_name: model_name.into(),
            batch_size,
            concurrency_range: Some(concurrency.to_string()),
            request_rate_range: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Value of the load column in result tables
    pub fn load_label(&self) -> String {
        self.concurrency_range
            .clone()
            .or_else(|| self.request_rate_range.clone())
            .unwrap_or_default()
    }

    /// Translate into perf_analyzer arguments, rejecting unsupported keys.
    ///
    /// `extra` cannot set the arguments that key result rows.
    pub fn to_perf_config(&self) -> Result<PerfConfig> {
        if self.model_name.trim().is_empty() {
            return Err(AnalyzerError::Config("Model name must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(AnalyzerError::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.concurrency_range.is_none() && self.request_rate_range.is_none() {
            return Err(AnalyzerError::Config(
                "Either a concurrency range or a request rate range is required".to_string(),
            ));
        }

        if let Some(key) = self
            .extra
            .keys()
            .find(|key| RESERVED_OPTIONS.contains(&key.as_str()))
        {
            return Err(AnalyzerError::Config(format!(
                "'{}' must be set through the run parameters, not as an extra option",
                key
            )));
        }

        let mut config = PerfConfig::new();
        config.set("model-name", &self.model_name)?;
        config.set("batch-size", self.batch_size.to_string())?;
        if let Some(range) = &self.concurrency_range {
            config.set("concurrency-range", range)?;
        }
        if let Some(range) = &self.request_rate_range {
            config.set("request-rate-range", range)?;
        }
        for (key, value) in &self.extra {
            config.set(key, value)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitoring_interval(), Duration::from_millis(10));
        assert_eq!(config.workload_timeout(), None);
    }

    #[test]
    fn test_tag_split_keeps_order() {
        let config = AnalyzerConfig {
            monitoring_metrics: vec![
                RecordKind::GpuFreeMemory,
                RecordKind::PerfLatency,
                RecordKind::GpuUsedMemory,
                RecordKind::PerfThroughput,
            ],
            ..AnalyzerConfig::default()
        };
        assert_eq!(
            config.device_tags(),
            vec![RecordKind::GpuFreeMemory, RecordKind::GpuUsedMemory]
        );
        assert_eq!(
            config.run_tags(),
            vec![RecordKind::PerfLatency, RecordKind::PerfThroughput]
        );
    }

    #[test]
    fn test_validation_zero_interval() {
        let config = AnalyzerConfig {
            monitoring_interval_ms: 0,
            ..AnalyzerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_duration() {
        let config = AnalyzerConfig {
            duration_seconds: 0,
            ..AnalyzerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_duplicate_metric() {
        let config = AnalyzerConfig {
            monitoring_metrics: vec![RecordKind::GpuUsedMemory, RecordKind::GpuUsedMemory],
            ..AnalyzerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_metrics() {
        let config = AnalyzerConfig {
            monitoring_metrics: Vec::new(),
            ..AnalyzerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: AnalyzerConfig = serde_json::from_str(
            r#"{"gpus": "0,1", "monitoring_metrics": ["gpu_used_memory", "perf_throughput"]}"#,
        )
        .unwrap();
        assert_eq!(config.gpus, GpuSelection::Ids(vec![0, 1]));
        assert_eq!(config.duration_seconds, 5);
        assert_eq!(config.device_tags(), vec![RecordKind::GpuUsedMemory]);
    }

    #[test]
    fn test_run_config_to_perf_config() {
        let run = RunConfig::new("resnet50", 8, 4).with_option("measurement-interval", "5000");
        let perf = run.to_perf_config().unwrap();
        assert_eq!(perf.get("model-name").unwrap(), Some("resnet50"));
        assert_eq!(perf.get("batch-size").unwrap(), Some("8"));
        assert_eq!(perf.get("concurrency-range").unwrap(), Some("4"));
        assert_eq!(perf.get("measurement-interval").unwrap(), Some("5000"));
    }

    #[test]
    fn test_run_config_rejects_unknown_option() {
        let run = RunConfig::new("resnet50", 1, 1).with_option("warp-speed", "9");
        assert!(matches!(run.to_perf_config(), Err(AnalyzerError::Config(_))));
    }

    #[test]
    fn test_run_config_rejects_row_key_overrides() {
        for key in ["model-name", "batch-size", "concurrency-range", "request-rate-range"] {
            let run = RunConfig::new("resnet50", 1, 1).with_option(key, "16");
            assert!(
                matches!(run.to_perf_config(), Err(AnalyzerError::Config(_))),
                "'{}' was accepted as an extra option",
                key
            );
        }
    }

    #[test]
    fn test_run_config_requires_load() {
        let run = RunConfig {
            concurrency_range: None,
            ..RunConfig::new("resnet50", 1, 1)
        };
        assert!(run.to_perf_config().is_err());

        let rate = RunConfig {
            concurrency_range: None,
            request_rate_range: Some("100:200:50".to_string()),
            ..RunConfig::new("resnet50", 1, 1)
        };
        assert!(rate.to_perf_config().is_ok());
        assert_eq!(rate.load_label(), "100:200:50");
    }
}
