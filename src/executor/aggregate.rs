//! Fan-in of worker-local results. Workers hand their context back through
//! their join handle; merging happens here, after every worker finished.

use crate::executor::error::ConfigurationError;
use crate::executor::fault::FailureRecord;
use crate::executor::worker::WorkerContext;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Merged outcome of every worker of one batch.
#[derive(Debug)]
pub(crate) struct BatchOutcome<K, Req, T> {
    results: Vec<(K, T)>,
    succeeded: usize,
    failures: Vec<FailureRecord<K, Req>>,
}

impl<K, Req, T> BatchOutcome<K, Req, T> {
    pub(crate) fn with_capacity(batch_len: usize) -> Self {
        Self {
            results: Vec::with_capacity(batch_len),
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn merge(&mut self, context: WorkerContext<K, Req, T>) {
        let WorkerContext {
            results,
            succeeded,
            failures,
        } = context;
        self.results.extend(results);
        self.succeeded = self.succeeded.saturating_add(succeeded);
        self.failures.extend(failures);
    }

    pub(crate) fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub(crate) fn failed(&self) -> usize {
        self.failures.len()
    }

    pub(crate) fn into_parts(self) -> (Vec<(K, T)>, Vec<FailureRecord<K, Req>>) {
        (self.results, self.failures)
    }
}

/// How a batch hands its responses back to the caller.
pub trait BatchShape<K> {
    type Output<T>;

    /// Checks the batch before any work is dispatched.
    fn validate<Req>(_items: &[(K, Req)]) -> Result<(), ConfigurationError> {
        Ok(())
    }

    fn collect<T>(results: Vec<(K, T)>) -> Self::Output<T>;
}

/// Sequence batch: responses come back as a `Vec` in no particular order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Positional;

/// Keyed batch: responses come back mapped to the key of their request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keyed;

impl BatchShape<usize> for Positional {
    type Output<T> = Vec<T>;

    fn collect<T>(results: Vec<(usize, T)>) -> Self::Output<T> {
        results.into_iter().map(|(_, response)| response).collect()
    }
}

impl<K: Eq + Hash + fmt::Debug> BatchShape<K> for Keyed {
    type Output<T> = HashMap<K, T>;

    fn validate<Req>(items: &[(K, Req)]) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::with_capacity(items.len());
        for (key, _) in items {
            if !seen.insert(key) {
                return Err(ConfigurationError::DuplicateKey {
                    key: format!("{key:?}"),
                });
            }
        }
        Ok(())
    }

    fn collect<T>(results: Vec<(K, T)>) -> Self::Output<T> {
        results.into_iter().collect()
    }
}
