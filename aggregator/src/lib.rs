//! Record aggregation
//!
//! A [`RecordAggregator`] stores records partitioned by kind and reduces them
//! either per bucket ([`RecordAggregator::aggregate`]) or per group key
//! ([`RecordAggregator::groupby`]). The store knows nothing about devices or
//! benchmark runs; callers pick the key and the reduction.

pub mod aggregate;
pub mod error;
pub mod reduce;

pub use aggregate::{Predicate, RecordAggregator};
pub use error::AggregatorError;
pub use reduce::{Reducer, Reduction};
