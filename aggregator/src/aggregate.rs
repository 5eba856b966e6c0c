//! Type-partitioned record store
//!
//! Records are kept in one bucket per [`RecordKind`], each bucket in insertion
//! order. Duplicates are kept. Filtering returns a new aggregator and never
//! touches the source.

use sightline_shared::{Record, RecordKind};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

use crate::error::{AggregatorError, Result};
use crate::reduce::Reducer;

/// Record-level selection criterion passed to [`RecordAggregator::filter`].
pub type Predicate<'a> = &'a dyn Fn(&Record) -> bool;

/// Stores records grouped by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordAggregator {
    records: BTreeMap<RecordKind, Vec<Record>>,
}

impl RecordAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the bucket of its kind.
    pub fn insert(&mut self, record: Record) {
        self.records.entry(record.kind()).or_default().push(record);
    }

    /// Replace the whole bucket for `kind`.
    ///
    /// Every record must be of `kind`; an empty list still registers the kind.
    pub fn add_bucket(&mut self, kind: RecordKind, records: Vec<Record>) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.kind() != kind) {
            return Err(AggregatorError::TypeMismatch {
                bucket: kind,
                found: bad.kind(),
            });
        }
        self.put_bucket(kind, records);
        Ok(())
    }

    // Buckets copied from another aggregator are already consistent.
    fn put_bucket(&mut self, kind: RecordKind, records: Vec<Record>) {
        self.records.insert(kind, records);
    }

    /// Select records into a new aggregator.
    ///
    /// - no types, no predicates: copy of every bucket
    /// - types only: copy of those buckets
    /// - predicates only: `InvalidArgument`
    /// - both: `predicates[i]` applies to `record_types[i]`; the lengths must
    ///   match
    ///
    /// Naming a kind that was never inserted fails with `UnknownType`.
    pub fn filter(
        &self,
        record_types: &[RecordKind],
        predicates: &[Predicate<'_>],
    ) -> Result<RecordAggregator> {
        let mut filtered = RecordAggregator::new();

        if record_types.is_empty() && predicates.is_empty() {
            filtered.records = self.records.clone();
            return Ok(filtered);
        }

        if record_types.is_empty() {
            return Err(AggregatorError::InvalidArgument(
                "filter predicates require matching record types".to_string(),
            ));
        }

        if predicates.is_empty() {
            for &kind in record_types {
                filtered.put_bucket(kind, self.bucket(kind)?.to_vec());
            }
            return Ok(filtered);
        }

        if record_types.len() != predicates.len() {
            return Err(AggregatorError::ArityMismatch {
                types: record_types.len(),
                predicates: predicates.len(),
            });
        }

        for (&kind, predicate) in record_types.iter().zip(predicates) {
            let kept: Vec<Record> = self
                .bucket(kind)?
                .iter()
                .filter(|record| predicate(*record))
                .cloned()
                .collect();
            match filtered.records.entry(kind) {
                Entry::Occupied(mut bucket) => bucket.get_mut().extend(kept),
                Entry::Vacant(slot) => {
                    slot.insert(kept);
                }
            }
        }

        Ok(filtered)
    }

    /// Reduce the `kind` bucket separately for every distinct key.
    ///
    /// The returned map has exactly one entry per distinct `key_fn` value seen
    /// in the bucket. Fails with `UnknownType` when the bucket is missing or
    /// empty.
    pub fn groupby<K, F, R>(
        &self,
        kind: RecordKind,
        key_fn: F,
        reducer: R,
    ) -> Result<HashMap<K, f64>>
    where
        K: Eq + Hash + Clone,
        F: Fn(&Record) -> K,
        R: Reducer,
    {
        let source = self.filter(&[kind], &[])?;
        let bucket = source.bucket(kind)?;
        if bucket.is_empty() {
            return Err(AggregatorError::UnknownType(kind));
        }

        let keys: HashSet<K> = bucket.iter().map(&key_fn).collect();

        let mut grouped = HashMap::with_capacity(keys.len());
        for key in keys {
            let same_key = |record: &Record| key_fn(record) == key;
            let group = self.filter(&[kind], &[&same_key])?;
            let reduced = group.aggregate_with(&[kind], &reducer)?;
            let value = reduced
                .get(&kind)
                .copied()
                .ok_or(AggregatorError::EmptyReduction(kind))?;
            grouped.insert(key, value);
        }

        debug!(
            "Grouped {} '{}' records into {} groups",
            bucket.len(),
            kind,
            grouped.len()
        );
        Ok(grouped)
    }

    /// Kinds with at least one insertion or an explicitly added bucket
    pub fn record_types(&self) -> BTreeSet<RecordKind> {
        self.records.keys().copied().collect()
    }

    /// Number of records of `kind`, or of all kinds when `None`.
    pub fn total(&self, kind: Option<RecordKind>) -> Result<usize> {
        match kind {
            Some(kind) => Ok(self.bucket(kind)?.len()),
            None => Ok(self.records.values().map(Vec::len).sum()),
        }
    }

    /// Reduce every requested bucket (all known buckets when `record_types`
    /// is empty) to a single value.
    pub fn aggregate<R: Reducer>(
        &self,
        record_types: &[RecordKind],
        reducer: R,
    ) -> Result<BTreeMap<RecordKind, f64>> {
        self.aggregate_with(record_types, &reducer)
    }

    fn aggregate_with(
        &self,
        record_types: &[RecordKind],
        reducer: &dyn Reducer,
    ) -> Result<BTreeMap<RecordKind, f64>> {
        let kinds: Vec<RecordKind> = if record_types.is_empty() {
            self.records.keys().copied().collect()
        } else {
            record_types.to_vec()
        };

        let mut aggregated = BTreeMap::new();
        for kind in kinds {
            let values: Vec<f64> = self.bucket(kind)?.iter().map(Record::value).collect();
            let value = reducer
                .reduce(&values)
                .ok_or(AggregatorError::EmptyReduction(kind))?;
            aggregated.insert(kind, value);
        }
        Ok(aggregated)
    }

    /// Records of one kind in insertion order
    pub fn records(&self, kind: RecordKind) -> Option<&[Record]> {
        self.records.get(&kind).map(Vec::as_slice)
    }

    /// Iterate over all buckets
    pub fn buckets(&self) -> impl Iterator<Item = (RecordKind, &[Record])> {
        self.records.iter().map(|(kind, records)| (*kind, records.as_slice()))
    }

    fn bucket(&self, kind: RecordKind) -> Result<&[Record]> {
        self.records(kind).ok_or(AggregatorError::UnknownType(kind))
    }
}

impl Extend<Record> for RecordAggregator {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<Record> for RecordAggregator {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut aggregator = RecordAggregator::new();
        aggregator.extend(iter);
        aggregator
    }
}
