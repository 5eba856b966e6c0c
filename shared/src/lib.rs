//! Shared types and utilities for Sightline
//!
//! This crate contains the measurement record model, the device reference
//! type, and small helpers used by the aggregator, the GPU monitor, and the
//! analyzer.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{device::*, record::*};
