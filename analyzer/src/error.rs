//! Analyzer error types

use sightline_aggregator::AggregatorError;
use sightline_gpu::MonitorError;
use sightline_shared::RecordKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the external load generator
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("perf_analyzer binary not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("perf_analyzer exited with {status}: {stderr}")]
    InvocationFailed { status: String, stderr: String },

    #[error("failed to run perf_analyzer: {0}")]
    Io(#[from] std::io::Error),

    #[error("perf_analyzer output has no value for '{0}'")]
    MissingMetric(RecordKind),
}

/// Failure of one profiling cycle
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("workload invocation failed: {0}")]
    WorkloadInvocation(#[from] WorkloadError),

    #[error("workload did not finish within {0:?}")]
    WorkloadTimeout(Duration),

    #[error("GPU monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregatorError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
