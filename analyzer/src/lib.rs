//! Sightline analyzer library
//!
//! Coordinates one profiling cycle at a time: a GPU monitor records in the
//! background while a load generator runs (or while the server idles), then
//! the samples and the workload's own measurements are reduced into result
//! table rows.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod output;
pub mod perf;
pub mod rows;
pub mod session;

pub use analyzer::{Analyzer, CycleMetrics, CycleResult};
pub use config::{AnalyzerConfig, RunConfig};
pub use error::{AnalyzerError, WorkloadError};
pub use perf::{PerfAnalyzer, PerfConfig, Workload};
pub use session::MonitorSession;
