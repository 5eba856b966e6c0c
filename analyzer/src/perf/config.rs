//! perf_analyzer arguments
//!
//! The set of supported arguments is closed: setting anything outside it is
//! rejected before a cycle starts.

use std::collections::BTreeMap;

use crate::error::{AnalyzerError, Result};

/// Long `--name=value` arguments, in command-line order
const LONG_ARGS: [&str; 21] = [
    "async",
    "sync",
    "measurement-interval",
    "concurrency-range",
    "request-rate-range",
    "request-distribution",
    "request-intervals",
    "binary-search",
    "num-of-sequence",
    "latency-threshold",
    "max-threads",
    "stability-percentage",
    "max-trials",
    "percentile",
    "input-data",
    "shared-memory",
    "output-shared-memory-size",
    "shape",
    "sequence-length",
    "string-length",
    "string-data",
];

/// Arguments passed as short options, mapped to their flag
const SHORT_OPTIONS: [(&str, &str); 7] = [
    ("model-name", "-m"),
    ("model-version", "-x"),
    ("batch-size", "-b"),
    ("url", "-u"),
    ("protocol", "-i"),
    ("latency-report-file", "-f"),
    ("streaming", "-H"),
];

/// Boolean verbosity arguments, mapped to their flags
const VERBOSE_FLAGS: [(&str, &[&str]); 2] = [
    ("verbose", &["-v"]),
    ("extra-verbose", &["-v", "-v"]),
];

fn is_supported(key: &str) -> bool {
    LONG_ARGS.contains(&key)
        || SHORT_OPTIONS.iter().any(|(name, _)| *name == key)
        || VERBOSE_FLAGS.iter().any(|(name, _)| *name == key)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Arguments for one perf_analyzer invocation. Unset arguments use
/// perf_analyzer's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerfConfig {
    values: BTreeMap<String, String>,
}

impl PerfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an argument by its perf_analyzer name.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if !is_supported(key) {
            return Err(AnalyzerError::Config(format!(
                "The argument '{}' to perf_analyzer is not supported",
                key
            )));
        }
        self.values.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Current value of an argument, `None` if unset.
    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        if !is_supported(key) {
            return Err(AnalyzerError::Config(format!(
                "'{}' not found in perf_analyzer config",
                key
            )));
        }
        Ok(self.values.get(key).map(String::as_str))
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Command-line arguments: short options, then verbosity flags, then
    /// long arguments.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for (name, flag) in SHORT_OPTIONS {
            if let Some(value) = self.value(name) {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        }

        for (name, flags) in VERBOSE_FLAGS {
            if self.value(name).is_some_and(is_truthy) {
                args.extend(flags.iter().map(|f| f.to_string()));
            }
        }

        for name in LONG_ARGS {
            if let Some(value) = self.value(name) {
                args.push(format!("--{}={}", name, value));
            }
        }

        args
    }

    /// Arguments joined for logging
    pub fn to_cli_string(&self) -> String {
        self.to_cli_args().join(" ")
    }
}
