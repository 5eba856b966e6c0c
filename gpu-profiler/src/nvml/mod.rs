//! NVIDIA Management Library backend
//!
//! The shared library is loaded at runtime by `nvml-wrapper`, so building
//! with this feature does not require a driver to be installed.

pub mod probe;

pub use probe::NvmlProbe;

/// NVML reports memory in bytes; tables use megabytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// NVML reports power in milliwatts.
pub fn milliwatts_to_watts(milliwatts: u32) -> f64 {
    milliwatts as f64 / 1000.0
}
