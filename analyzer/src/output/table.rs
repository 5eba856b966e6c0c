//! Plain-text result tables

use serde::Serialize;

use crate::error::{AnalyzerError, Result};

/// A titled table of string cells. Rows only enter through [`OutputTable::add_row`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputTable {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl OutputTable {
    pub fn new(title: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            title: title.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row; it must have one cell per header.
    pub fn add_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.headers.len() {
            return Err(AnalyzerError::Table(format!(
                "table '{}' has {} columns but row has {}",
                self.title,
                self.headers.len(),
                row.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Render headers and rows, one line each. Cells are padded to the
    /// widest cell of their column unless `ignore_widths` is set.
    pub fn to_formatted_string(&self, separator: &str, ignore_widths: bool) -> String {
        let widths: Vec<usize> = (0..self.headers.len())
            .map(|col| {
                std::iter::once(&self.headers)
                    .chain(self.rows.iter())
                    .map(|row| row[col].chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        std::iter::once(&self.headers)
            .chain(self.rows.iter())
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(cell, &width)| {
                        if ignore_widths {
                            cell.clone()
                        } else {
                            format!("{:<width$}", cell, width = width)
                        }
                    })
                    .collect();
                cells.join(separator)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
