//! perf_analyzer process runner

use async_trait::async_trait;
use sightline_shared::utils::time;
use sightline_shared::{Record, RecordKind};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use super::{PerfConfig, Workload};
use crate::error::WorkloadError;

/// Runs the perf_analyzer binary with a fixed argument set.
pub struct PerfAnalyzer {
    path: PathBuf,
    config: PerfConfig,
    output: Option<String>,
}

impl PerfAnalyzer {
    pub fn new(path: impl Into<PathBuf>, config: PerfConfig) -> Self {
        Self {
            path: path.into(),
            config,
            output: None,
        }
    }
}

#[async_trait]
impl Workload for PerfAnalyzer {
    async fn run(&mut self, tags: &[RecordKind]) -> Result<Vec<Record>, WorkloadError> {
        let args = self.config.to_cli_args();
        info!("Running {} {}", self.path.display(), args.join(" "));

        // The child must not outlive a cancelled or timed-out cycle.
        let output = Command::new(&self.path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => WorkloadError::BinaryNotFound(self.path.clone()),
                _ => WorkloadError::Io(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        self.output = Some(stdout);

        if !output.status.success() {
            return Err(WorkloadError::InvocationFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_records(self.output.as_deref().unwrap_or_default(), tags)
    }

    fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }
}

/// Extract run-scoped records from perf_analyzer's summary output.
///
/// Reads the last `Throughput: <n> infer/sec` and `p99 latency: <n> usec`
/// lines; latency is reported in milliseconds.
pub fn parse_records(output: &str, tags: &[RecordKind]) -> Result<Vec<Record>, WorkloadError> {
    let mut throughput = None;
    let mut p99_usec = None;

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Throughput:") {
            throughput = first_number(rest).or(throughput);
        } else if let Some(rest) = line.strip_prefix("p99 latency:") {
            p99_usec = first_number(rest).or(p99_usec);
        }
    }
    debug!("Parsed throughput={:?} p99_usec={:?}", throughput, p99_usec);

    let timestamp = time::elapsed_secs();
    let mut records = Vec::with_capacity(tags.len());
    for &tag in tags {
        let record = match tag {
            RecordKind::PerfThroughput => throughput
                .map(|v| Record::perf_throughput(v, timestamp))
                .ok_or(WorkloadError::MissingMetric(tag))?,
            RecordKind::PerfLatency => p99_usec
                .map(|v| Record::perf_latency(v / 1000.0, timestamp))
                .ok_or(WorkloadError::MissingMetric(tag))?,
            _ => continue,
        };
        records.push(record);
    }
    Ok(records)
}

fn first_number(s: &str) -> Option<f64> {
    s.split_whitespace().next().and_then(|tok| tok.parse().ok())
}
