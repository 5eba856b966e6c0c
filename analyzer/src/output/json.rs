//! JSON output
//!
//! Exports result tables in JSON format for further analysis

use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use super::OutputTable;
use crate::analyzer::CycleResult;
use crate::error::Result;

/// Serialized form of a results file
#[derive(Debug, Serialize)]
pub struct ResultsReport<'a> {
    pub generated_at: String,
    pub tables: Vec<&'a OutputTable>,
    /// Table cells are rounded for display; these values are not.
    pub cycles: &'a [CycleResult],
}

impl<'a> ResultsReport<'a> {
    pub fn new(tables: Vec<&'a OutputTable>, cycles: &'a [CycleResult]) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            tables,
            cycles,
        }
    }
}

/// Generate JSON output from result tables and raw cycle values
pub fn generate_json(
    tables: Vec<&OutputTable>,
    cycles: &[CycleResult],
    output_path: &Path,
) -> Result<()> {
    info!("Generating JSON output: {}", output_path.display());

    let file = File::create(output_path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &ResultsReport::new(tables, cycles))?;

    info!("JSON output written to {}", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_json() {
        let mut table = OutputTable::new("Models (Inference)", vec!["Model".to_string()]);
        table.add_row(vec!["resnet50".to_string()]).unwrap();

        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("results.json");

        generate_json(vec![&table], &[], &output_path).unwrap();
        assert!(output_path.exists());

        let contents = std::fs::read_to_string(output_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["tables"][0]["title"], "Models (Inference)");
        assert_eq!(parsed["tables"][0]["rows"][0][0], "resnet50");
    }
}
