//! Profile command implementation

use anyhow::{Context, Result};
use clap::Args;
use config::{Config, Environment, File};
use indicatif::{ProgressBar, ProgressStyle};
use sightline_analyzer::{Analyzer, AnalyzerConfig, RunConfig};
use sightline_gpu::MonitorFactory;
use sightline_shared::RecordKind;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::output;

/// Prefix of environment variables that override the config file
const ENV_PREFIX: &str = "SIGHTLINE";

/// Column separator of the results printed to stdout
const RESULTS_SEPARATOR: &str = "  ";

/// Column separator of exported CSV files
const CSV_SEPARATOR: &str = ",";

#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Models to profile, comma separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub model_names: Vec<String>,

    /// Batch sizes to profile, comma separated
    #[arg(short, long, value_delimiter = ',', default_value = "1")]
    pub batch_sizes: Vec<u32>,

    /// Concurrency values to profile, comma separated
    #[arg(short, long, value_delimiter = ',', default_value = "1")]
    pub concurrency: Vec<u32>,

    /// Path to the perf_analyzer binary
    #[arg(long)]
    pub perf_analyzer_path: Option<PathBuf>,

    /// Length of the server-only measurement, in seconds
    #[arg(short, long)]
    pub duration_seconds: Option<u64>,

    /// GPU sampling interval, in milliseconds
    #[arg(short = 'i', long)]
    pub monitoring_interval_ms: Option<u64>,

    /// GPUs to monitor: "all" or comma-separated ids
    #[arg(long)]
    pub gpus: Option<String>,

    /// Metrics to collect, comma separated (e.g. perf_throughput,gpu_used_memory)
    #[arg(long, value_delimiter = ',')]
    pub metrics: Vec<RecordKind>,

    /// Deadline for one perf_analyzer run, in seconds
    #[arg(long)]
    pub workload_timeout_secs: Option<u64>,

    /// Export results as CSV files
    #[arg(long)]
    pub export: bool,

    /// Directory for exported CSV files
    #[arg(short, long, default_value = ".")]
    pub export_path: PathBuf,

    #[arg(long, default_value = "metrics-model-inference.csv")]
    pub filename_model_inference: String,

    #[arg(long, default_value = "metrics-model-gpu.csv")]
    pub filename_model_gpu: String,

    #[arg(long, default_value = "metrics-server-only.csv")]
    pub filename_server_only: String,

    /// Also write all result tables to a JSON file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Verbose logging; also echoes perf_analyzer output
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run(args: ProfileArgs) -> Result<()> {
    let config = load_config(&args)?;
    info!("Configuration: {:?}", config);

    sightline_shared::utils::time::init_reference();

    let factory = monitor_factory()?;
    let mut analyzer = Analyzer::new(config, factory).context("Invalid analyzer configuration")?;

    let run_configs = build_run_configs(&args);
    let total = run_configs.len() + 1;
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );

    let mut failures = 0;

    progress.set_message("server only");
    if let Err(e) = analyzer.profile_server_only().await {
        failures += 1;
        error!("Server-only cycle failed: {}", e);
    }
    progress.inc(1);

    let mut stdout = std::io::stdout();
    for run_config in &run_configs {
        let label = format!(
            "{} batch={} concurrency={}",
            run_config.model_name,
            run_config.batch_size,
            run_config.load_label()
        );
        progress.set_message(label.clone());

        let perf_output: Option<&mut (dyn Write + Send)> = if args.verbose {
            Some(&mut stdout)
        } else {
            None
        };
        if let Err(e) = analyzer.profile_model(run_config, perf_output).await {
            failures += 1;
            error!("Cycle {} failed: {}", label, e);
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    analyzer
        .write_results(&mut std::io::stdout().lock(), RESULTS_SEPARATOR)
        .context("Failed to write results")?;

    if args.export {
        export_csv(&analyzer, &args)?;
    }

    if let Some(path) = &args.json {
        analyzer
            .write_json(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        output::success(&format!("JSON report written to {}", path.display()));
    }

    output::summary(total, failures);
    if failures > 0 {
        anyhow::bail!("{} of {} profiling cycles failed", failures, total);
    }
    Ok(())
}

/// Resolve the analyzer configuration.
///
/// Precedence, lowest first: built-in defaults, the config file,
/// `SIGHTLINE_*` environment variables, command-line flags.
pub fn load_config(args: &ProfileArgs) -> Result<AnalyzerConfig> {
    let mut builder = Config::builder();

    if let Some(path) = &args.config {
        builder = builder.add_source(File::from(path.as_path()));
    }

    builder = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("monitoring_metrics"),
        )
        .set_override_option(
            "perf_analyzer_path",
            args.perf_analyzer_path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
        )?
        .set_override_option("duration_seconds", args.duration_seconds.map(|v| v.to_string()))?
        .set_override_option(
            "monitoring_interval_ms",
            args.monitoring_interval_ms.map(|v| v.to_string()),
        )?
        .set_override_option("gpus", args.gpus.clone())?
        .set_override_option(
            "workload_timeout_secs",
            args.workload_timeout_secs.map(|v| v.to_string()),
        )?;

    if !args.metrics.is_empty() {
        let metrics: Vec<String> = args
            .metrics
            .iter()
            .map(|kind| kind.name().to_string())
            .collect();
        builder = builder.set_override("monitoring_metrics", metrics)?;
    }

    let config: AnalyzerConfig = builder
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}

/// One run per (model, batch size, concurrency), model-major.
pub fn build_run_configs(args: &ProfileArgs) -> Vec<RunConfig> {
    let mut runs = Vec::new();
    for model in &args.model_names {
        for &batch_size in &args.batch_sizes {
            for &concurrency in &args.concurrency {
                runs.push(RunConfig::new(model.clone(), batch_size, concurrency));
            }
        }
    }
    runs
}

fn export_csv(analyzer: &Analyzer, args: &ProfileArgs) -> Result<()> {
    fs::create_dir_all(&args.export_path).with_context(|| {
        format!("Failed to create export directory {}", args.export_path.display())
    })?;

    let server_path = args.export_path.join(&args.filename_server_only);
    let mut server_writer = create_writer(&server_path)?;
    analyzer.export_server_only_csv(&mut server_writer, CSV_SEPARATOR)?;
    server_writer.flush()?;

    let inference_path = args.export_path.join(&args.filename_model_inference);
    let gpu_path = args.export_path.join(&args.filename_model_gpu);
    let mut inference_writer = create_writer(&inference_path)?;
    let mut gpu_writer = create_writer(&gpu_path)?;
    analyzer.export_model_csv(&mut inference_writer, &mut gpu_writer, CSV_SEPARATOR)?;
    inference_writer.flush()?;
    gpu_writer.flush()?;

    output::success(&format!(
        "Exported {}, {} and {}",
        server_path.display(),
        inference_path.display(),
        gpu_path.display()
    ));
    Ok(())
}

fn create_writer(path: &Path) -> Result<BufWriter<fs::File>> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(feature = "nvml")]
fn monitor_factory() -> Result<Arc<dyn MonitorFactory>> {
    use sightline_gpu::{nvml::NvmlProbe, ProbeMonitorFactory};

    let probe = NvmlProbe::init().context("Failed to initialize NVML")?;
    Ok(Arc::new(ProbeMonitorFactory::new(probe)))
}

#[cfg(not(feature = "nvml"))]
fn monitor_factory() -> Result<Arc<dyn MonitorFactory>> {
    output::warning("GPU sampling needs NVML; rebuild with --features nvml");
    anyhow::bail!("sightline was built without NVML support")
}
