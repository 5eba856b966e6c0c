//! Time-related utilities
//!
//! Record timestamps are seconds elapsed since a process-wide reference
//! instant, taken the first time any of these helpers is called.

use once_cell::sync::Lazy;
use std::time::Instant;

static REFERENCE_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Pin the reference instant. Later calls are no-ops.
pub fn init_reference() {
    Lazy::force(&REFERENCE_START);
}

/// Seconds elapsed since the reference instant
pub fn elapsed_secs() -> f64 {
    REFERENCE_START.elapsed().as_secs_f64()
}
