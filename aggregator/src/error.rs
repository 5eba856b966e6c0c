//! Aggregator error types

use sightline_shared::RecordKind;
use thiserror::Error;

/// Errors from malformed aggregator calls. All of them are caller bugs and
/// are surfaced immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    #[error("record type '{0}' not found in this aggregator")]
    UnknownType(RecordKind),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("got {types} record types but {predicates} filter predicates")]
    ArityMismatch { types: usize, predicates: usize },

    #[error("bucket '{bucket}' cannot hold a '{found}' record")]
    TypeMismatch { bucket: RecordKind, found: RecordKind },

    #[error("cannot reduce zero '{0}' records")]
    EmptyReduction(RecordKind),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
