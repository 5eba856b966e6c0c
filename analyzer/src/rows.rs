//! Row assembly
//!
//! Turns the reduced values of one cycle into table rows: parameter columns
//! first, then one column per metric in configured order, then the device id
//! for GPU tables.

use sightline_aggregator::Reduction;
use sightline_shared::{DeviceId, RecordKind};
use std::collections::BTreeSet;

use crate::analyzer::CycleMetrics;

pub const PARAM_HEADERS: [&str; 3] = ["Model", "Batch", "Concurrency"];

pub const GPU_ID_HEADER: &str = "GPU ID";

/// Headers of a per-device table, e.g. "Max GPU Used Memory [MB]"
pub fn gpu_table_headers(device_tags: &[RecordKind], reduction: Reduction) -> Vec<String> {
    let mut headers: Vec<String> = PARAM_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(
        device_tags
            .iter()
            .map(|tag| format!("{} {}", reduction.label(), tag.header())),
    );
    headers.push(GPU_ID_HEADER.to_string());
    headers
}

/// Headers of the per-run inference table
pub fn inference_table_headers(run_tags: &[RecordKind]) -> Vec<String> {
    let mut headers: Vec<String> = PARAM_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(run_tags.iter().map(|tag| tag.header().to_string()));
    headers
}

/// Render a measurement; whole numbers print without decimals.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{:.3}", value)
    }
}

/// One row per device observed in any device-scoped metric, by ascending id.
pub fn gpu_rows(
    params: &[String],
    metrics: &CycleMetrics,
    device_tags: &[RecordKind],
    default_value: &str,
) -> Vec<Vec<String>> {
    let device_ids: BTreeSet<DeviceId> = metrics
        .gpu
        .values()
        .flat_map(|per_device| per_device.keys().copied())
        .collect();

    device_ids
        .into_iter()
        .map(|device_id| {
            let mut row = params.to_vec();
            row.extend(device_tags.iter().map(|tag| {
                metrics
                    .gpu
                    .get(tag)
                    .and_then(|per_device| per_device.get(&device_id))
                    .map(|v| format_value(*v))
                    .unwrap_or_else(|| default_value.to_string())
            }));
            row.push(device_id.to_string());
            row
        })
        .collect()
}

/// The single inference row of a model cycle
pub fn inference_row(
    params: &[String],
    metrics: &CycleMetrics,
    run_tags: &[RecordKind],
    default_value: &str,
) -> Vec<String> {
    let mut row = params.to_vec();
    row.extend(run_tags.iter().map(|tag| {
        metrics
            .run
            .get(tag)
            .map(|v| format_value(*v))
            .unwrap_or_else(|| default_value.to_string())
    }));
    row
}
