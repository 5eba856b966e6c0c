//! Load generator integration
//!
//! The coordinator only sees the [`Workload`] trait; [`PerfAnalyzer`] is the
//! production implementation that shells out to `perf_analyzer`.

pub mod config;
pub mod runner;

pub use config::PerfConfig;
pub use runner::PerfAnalyzer;

use async_trait::async_trait;
use sightline_shared::{Record, RecordKind};

use crate::error::WorkloadError;

/// A blocking benchmark invocation producing run-scoped records.
#[async_trait]
pub trait Workload: Send {
    /// Run to completion and report one record per requested tag.
    async fn run(&mut self, tags: &[RecordKind]) -> Result<Vec<Record>, WorkloadError>;

    /// Raw output of the last run, if any
    fn output(&self) -> Option<&str> {
        None
    }
}
