//! Profiling coordinator
//!
//! One [`Analyzer`] owns the result tables of a whole sweep. Every cycle
//! brackets a workload (or an idle window) with a GPU monitor, reduces the
//! samples per device and the workload records per run, and appends rows.

use serde::Serialize;
use sightline_aggregator::{RecordAggregator, Reduction};
use sightline_gpu::MonitorFactory;
use sightline_shared::{DeviceId, Record, RecordKind};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, RunConfig};
use crate::error::{AnalyzerError, Result};
use crate::output::{json, OutputTable};
use crate::perf::{PerfAnalyzer, Workload};
use crate::rows;
use crate::session::MonitorSession;

/// Cell value for parameters that do not apply and for metrics with no value
pub const DEFAULT_VALUE: &str = "0";

pub const MODEL_GPU_TABLE: &str = "Models (GPU Metrics)";
pub const SERVER_ONLY_TABLE: &str = "Server Only";
pub const MODEL_INFERENCE_TABLE: &str = "Models (Inference)";

/// Reduced values of one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleMetrics {
    /// Device-scoped metric -> device id -> reduced value
    pub gpu: BTreeMap<RecordKind, BTreeMap<DeviceId, f64>>,
    /// Run-scoped metric -> reduced value; empty for server-only cycles
    pub run: BTreeMap<RecordKind, f64>,
}

/// Row parameters of a finished cycle with its unrounded values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    pub model: String,
    pub batch: String,
    pub concurrency: String,
    pub metrics: CycleMetrics,
}

pub struct Analyzer {
    config: AnalyzerConfig,
    monitor_factory: Arc<dyn MonitorFactory>,
    device_tags: Vec<RecordKind>,
    run_tags: Vec<RecordKind>,
    reduction: Reduction,
    model_gpu_table: OutputTable,
    server_table: OutputTable,
    inference_table: OutputTable,
    cycles: Vec<CycleResult>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, monitor_factory: Arc<dyn MonitorFactory>) -> Result<Self> {
        config.validate()?;

        let device_tags = config.device_tags();
        let run_tags = config.run_tags();
        // Throughput and latency are both reduced with max, so latency
        // columns report the worst observed value.
        let reduction = Reduction::default();

        let gpu_headers = rows::gpu_table_headers(&device_tags, reduction);
        let inference_headers = rows::inference_table_headers(&run_tags);

        Ok(Self {
            model_gpu_table: OutputTable::new(MODEL_GPU_TABLE, gpu_headers.clone()),
            server_table: OutputTable::new(SERVER_ONLY_TABLE, gpu_headers),
            inference_table: OutputTable::new(MODEL_INFERENCE_TABLE, inference_headers),
            cycles: Vec::new(),
            config,
            monitor_factory,
            device_tags,
            run_tags,
            reduction,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Tables in write order
    pub fn tables(&self) -> [&OutputTable; 3] {
        [&self.model_gpu_table, &self.server_table, &self.inference_table]
    }

    /// Successful cycles in the order they ran
    pub fn cycles(&self) -> &[CycleResult] {
        &self.cycles
    }

    /// Record GPU metrics while the server idles for the configured duration.
    pub async fn profile_server_only(&mut self) -> Result<CycleMetrics> {
        info!("Profiling server only metrics...");
        let metrics = self.profile(None).await?;

        let params = vec![
            self.config.server_name.clone(),
            DEFAULT_VALUE.to_string(),
            DEFAULT_VALUE.to_string(),
        ];
        for row in rows::gpu_rows(&params, &metrics, &self.device_tags, DEFAULT_VALUE) {
            self.server_table.add_row(row)?;
        }
        self.push_cycle(params, &metrics);
        Ok(metrics)
    }

    /// Profile one model configuration with perf_analyzer.
    ///
    /// Unsupported run options are rejected before any monitor is created.
    pub async fn profile_model(
        &mut self,
        run_config: &RunConfig,
        perf_output: Option<&mut (dyn Write + Send)>,
    ) -> Result<CycleMetrics> {
        let perf_config = run_config.to_perf_config()?;
        let mut workload = PerfAnalyzer::new(&self.config.perf_analyzer_path, perf_config);
        self.profile_model_with(run_config, &mut workload, perf_output)
            .await
    }

    /// Profile one model configuration with a caller-supplied workload.
    pub async fn profile_model_with(
        &mut self,
        run_config: &RunConfig,
        workload: &mut dyn Workload,
        perf_output: Option<&mut (dyn Write + Send)>,
    ) -> Result<CycleMetrics> {
        info!("Profiling model {}...", run_config.model_name);
        let metrics = self.profile(Some(&mut *workload)).await?;

        if let (Some(writer), Some(output)) = (perf_output, workload.output()) {
            writeln!(writer, "{}", output)?;
        }

        let params = vec![
            run_config.model_name.clone(),
            run_config.batch_size.to_string(),
            run_config.load_label(),
        ];
        for row in rows::gpu_rows(&params, &metrics, &self.device_tags, DEFAULT_VALUE) {
            self.model_gpu_table.add_row(row)?;
        }
        let row = rows::inference_row(&params, &metrics, &self.run_tags, DEFAULT_VALUE);
        self.inference_table.add_row(row)?;
        self.push_cycle(params, &metrics);

        Ok(metrics)
    }

    fn push_cycle(&mut self, params: Vec<String>, metrics: &CycleMetrics) {
        let mut params = params.into_iter();
        let mut next = || params.next().unwrap_or_default();
        self.cycles.push(CycleResult {
            model: next(),
            batch: next(),
            concurrency: next(),
            metrics: metrics.clone(),
        });
    }

    /// Run one cycle: monitor around the workload, or around an idle window
    /// when `workload` is `None`.
    ///
    /// The monitor is stopped and released before this returns, whether the
    /// workload succeeded, failed, or timed out.
    pub async fn profile(&self, workload: Option<&mut dyn Workload>) -> Result<CycleMetrics> {
        let monitor = self.monitor_factory.create(
            &self.config.gpus,
            self.config.monitoring_interval(),
            &self.device_tags,
        )?;
        let session = MonitorSession::start(monitor).await?;

        let outcome = match workload {
            Some(workload) => self.run_workload(workload).await,
            None => {
                tokio::time::sleep(self.config.duration()).await;
                Ok(Vec::new())
            }
        };
        let gpu_records = session.finish().await;

        let perf_records = match outcome {
            Ok(records) => records,
            Err(e) => {
                warn!("Workload failed: {}", e);
                if let Err(monitor_err) = gpu_records {
                    warn!("GPU monitor also failed: {}", monitor_err);
                }
                return Err(e);
            }
        };
        let gpu_records = gpu_records?;
        debug!(
            "Cycle produced {} GPU samples and {} workload records",
            gpu_records.len(),
            perf_records.len()
        );

        Ok(CycleMetrics {
            gpu: self.group_by_device(gpu_records)?,
            run: self.reduce_run(perf_records)?,
        })
    }

    async fn run_workload(&self, workload: &mut dyn Workload) -> Result<Vec<Record>> {
        let run = workload.run(&self.run_tags);
        match self.config.workload_timeout() {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| AnalyzerError::WorkloadTimeout(limit))?
                .map_err(AnalyzerError::from),
            None => Ok(run.await?),
        }
    }

    fn group_by_device(
        &self,
        records: Vec<Record>,
    ) -> Result<BTreeMap<RecordKind, BTreeMap<DeviceId, f64>>> {
        let aggregator: RecordAggregator = records.into_iter().collect();

        let mut grouped = BTreeMap::new();
        for &tag in &self.device_tags {
            if aggregator.records(tag).map_or(true, <[Record]>::is_empty) {
                warn!("No '{}' samples were collected", tag);
                continue;
            }
            let per_device = aggregator.groupby(
                tag,
                |record: &Record| record.device_id().ok(),
                self.reduction,
            )?;
            let per_device: BTreeMap<DeviceId, f64> = per_device
                .into_iter()
                .filter_map(|(device_id, value)| device_id.map(|id| (id, value)))
                .collect();
            grouped.insert(tag, per_device);
        }
        Ok(grouped)
    }

    fn reduce_run(&self, records: Vec<Record>) -> Result<BTreeMap<RecordKind, f64>> {
        let aggregator: RecordAggregator = records.into_iter().collect();
        Ok(aggregator.aggregate(&[], self.reduction)?)
    }

    /// Write every table with its title, columns padded.
    pub fn write_results<W: Write + ?Sized>(&self, writer: &mut W, separator: &str) -> Result<()> {
        for table in self.tables() {
            write!(
                writer,
                "{}:\n{}\n\n",
                table.title(),
                table.to_formatted_string(separator, false)
            )?;
        }
        Ok(())
    }

    /// Write the server-only table without title or padding.
    pub fn export_server_only_csv<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        separator: &str,
    ) -> Result<()> {
        write_plain(&self.server_table, writer, separator)
    }

    /// Write the model inference and model GPU tables without title or padding.
    pub fn export_model_csv<W1, W2>(
        &self,
        inference_writer: &mut W1,
        gpu_writer: &mut W2,
        separator: &str,
    ) -> Result<()>
    where
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        write_plain(&self.model_gpu_table, gpu_writer, separator)?;
        write_plain(&self.inference_table, inference_writer, separator)
    }

    /// Dump all tables, plus every cycle at full precision, as a JSON report.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        json::generate_json(self.tables().to_vec(), &self.cycles, path)
    }
}

fn write_plain<W: Write + ?Sized>(
    table: &OutputTable,
    writer: &mut W,
    separator: &str,
) -> Result<()> {
    write!(writer, "{}\n\n", table.to_formatted_string(separator, true))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_gpu::{GpuMonitor, GpuSelection, MonitorError};
    use sightline_shared::GpuDevice;

    struct NoopMonitor;

    #[async_trait::async_trait]
    impl GpuMonitor for NoopMonitor {
        async fn start_recording(&mut self) -> std::result::Result<(), MonitorError> {
            Ok(())
        }

        async fn stop_recording(&mut self) -> std::result::Result<Vec<Record>, MonitorError> {
            let device = GpuDevice::new(0).into_ref();
            Ok(vec![Record::gpu_used_memory(device, 512.0, 0.0)])
        }

        fn destroy(&mut self) {}
    }

    struct NoopFactory;

    impl MonitorFactory for NoopFactory {
        fn create(
            &self,
            _selection: &GpuSelection,
            _interval: std::time::Duration,
            _tags: &[RecordKind],
        ) -> std::result::Result<Box<dyn GpuMonitor>, MonitorError> {
            Ok(Box::new(NoopMonitor))
        }
    }

    fn analyzer() -> Analyzer {
        let config = AnalyzerConfig {
            duration_seconds: 1,
            monitoring_metrics: vec![RecordKind::PerfThroughput, RecordKind::GpuUsedMemory],
            ..AnalyzerConfig::default()
        };
        Analyzer::new(config, Arc::new(NoopFactory)).unwrap()
    }

    #[test]
    fn test_table_headers() {
        let analyzer = analyzer();
        let [gpu, server, inference] = analyzer.tables();
        assert_eq!(gpu.title(), MODEL_GPU_TABLE);
        assert_eq!(server.headers(), gpu.headers());
        assert_eq!(
            gpu.headers(),
            ["Model", "Batch", "Concurrency", "Max GPU Used Memory [MB]", "GPU ID"]
        );
        assert_eq!(
            inference.headers(),
            ["Model", "Batch", "Concurrency", "Throughput [infer/sec]"]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalyzerConfig {
            monitoring_interval_ms: 0,
            ..AnalyzerConfig::default()
        };
        assert!(matches!(
            Analyzer::new(config, Arc::new(NoopFactory)),
            Err(AnalyzerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_server_only_writes_results() {
        let mut analyzer = analyzer();
        let metrics = analyzer.profile_server_only().await.unwrap();
        assert!(metrics.run.is_empty());

        let mut out = Vec::new();
        analyzer.write_results(&mut out, ",").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Models (GPU Metrics):\n"));
        assert!(text.contains("Server Only:\n"));
        assert!(text.contains("triton-server,0    ,0          ,512"));

        let mut csv = Vec::new();
        analyzer.export_server_only_csv(&mut csv, ",").unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "Model,Batch,Concurrency,Max GPU Used Memory [MB],GPU ID\ntriton-server,0,0,512,0\n\n"
        );
    }
}
