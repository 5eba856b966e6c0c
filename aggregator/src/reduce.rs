//! Reduction functions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Collapses a list of values into one.
///
/// `Max` is the default for every kind, including latency where lower is
/// better: latency columns report the worst value seen in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Max,
    Min,
    Mean,
    Sum,
}

impl Reduction {
    /// Reduce `values`, or `None` when there is nothing to reduce.
    pub fn reduce(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let iter = values.iter().copied();
        match self {
            Reduction::Max => iter.max_by(f64::total_cmp),
            Reduction::Min => iter.min_by(f64::total_cmp),
            Reduction::Sum => Some(iter.sum()),
            Reduction::Mean => Some(iter.sum::<f64>() / values.len() as f64),
        }
    }

    /// Column prefix used in result tables
    pub fn label(self) -> &'static str {
        match self {
            Reduction::Max => "Max",
            Reduction::Min => "Min",
            Reduction::Mean => "Mean",
            Reduction::Sum => "Sum",
        }
    }
}

/// Anything that collapses a list of values into one.
///
/// Implemented by [`Reduction`] and by any `Fn(&[f64]) -> Option<f64>`, so
/// callers can pass a closure such as a median or a percentile.
pub trait Reducer {
    fn reduce(&self, values: &[f64]) -> Option<f64>;
}

impl Reducer for Reduction {
    fn reduce(&self, values: &[f64]) -> Option<f64> {
        Reduction::reduce(*self, values)
    }
}

impl<F> Reducer for F
where
    F: Fn(&[f64]) -> Option<f64>,
{
    fn reduce(&self, values: &[f64]) -> Option<f64> {
        self(values)
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Reduction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(Reduction::Max),
            "min" => Ok(Reduction::Min),
            "mean" | "avg" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            _ => Err(format!("Invalid reduction: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_max() {
        assert_eq!(Reduction::default(), Reduction::Max);
        assert_eq!(Reduction::default().reduce(&[10.0, 30.0, 20.0]), Some(30.0));
    }

    #[test]
    fn test_reductions() {
        let values = [4.0, 1.0, 7.0];
        assert_eq!(Reduction::Min.reduce(&values), Some(1.0));
        assert_eq!(Reduction::Sum.reduce(&values), Some(12.0));
        assert_eq!(Reduction::Mean.reduce(&values), Some(4.0));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Reduction::Max.reduce(&[]), None);
        assert_eq!(Reduction::Mean.reduce(&[]), None);
    }

    #[test]
    fn test_closure_reducer() {
        let first = |values: &[f64]| values.first().copied();
        assert_eq!(Reducer::reduce(&first, &[3.0, 9.0]), Some(3.0));
        assert_eq!(Reducer::reduce(&Reduction::Sum, &[3.0, 9.0]), Some(12.0));
    }

    #[test]
    fn test_parse_and_label() {
        assert_eq!("AVG".parse::<Reduction>().unwrap(), Reduction::Mean);
        assert!("median".parse::<Reduction>().is_err());
        assert_eq!(Reduction::Max.to_string(), "Max");
    }

    #[test]
    fn test_serde_lowercase() {
        let parsed: Reduction = serde_json::from_str("\"min\"").unwrap();
        assert_eq!(parsed, Reduction::Min);
    }
}
