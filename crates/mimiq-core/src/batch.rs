//! Batch coordinator.
//!
//! Applies a single-item operation to an ordered list of inputs and records
//! either the success payload or the error per item, in input order. One bad
//! item never aborts or rolls back its neighbors, and nothing is retried.

use serde::Serialize;

use crate::error::{MimiqError, Result};

/// One failed batch entry.
#[derive(Debug, Serialize)]
pub struct BatchFailure {
    /// Position of the item in the input list.
    pub index: usize,
    /// Machine-readable error kind, e.g. "PayloadTooLarge".
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of a batch operation: one entry per input, in input order.
#[derive(Debug)]
pub struct BatchResults<T> {
    pub entries: Vec<Result<T>>,
}

impl<T> BatchResults<T> {
    pub fn any_failed(&self) -> bool {
        self.entries.iter().any(|e| e.is_err())
    }

    pub fn ok_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_ok()).count()
    }

    pub fn failures(&self) -> Vec<BatchFailure> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, e)| match e {
                Ok(_) => None,
                Err(err) => Some(BatchFailure {
                    index,
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            })
            .collect()
    }

    /// Successes in input order, failures dropped.
    pub fn successes(&self) -> Vec<&T> {
        self.entries.iter().filter_map(|e| e.as_ref().ok()).collect()
    }
}

/// Run `op` over every item independently, capturing per-item results.
pub fn apply_each<I, T>(
    items: impl IntoIterator<Item = I>,
    mut op: impl FnMut(I) -> Result<T>,
) -> BatchResults<T> {
    let entries = items.into_iter().map(&mut op).collect();
    BatchResults { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_keeps_order() {
        let results = apply_each(vec![1, 2, 3, 4], |n| {
            if n % 2 == 0 {
                Err(MimiqError::InvalidArgument(format!("even: {n}")))
            } else {
                Ok(n * 10)
            }
        });
        assert!(results.any_failed());
        assert_eq!(results.ok_count(), 2);
        assert_eq!(results.entries.len(), 4);
        assert_eq!(*results.entries[0].as_ref().unwrap(), 10);
        assert!(results.entries[1].is_err());

        let failures = results.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].kind, "InvalidArgument");
        assert_eq!(failures[1].index, 3);
    }

    #[test]
    fn test_all_ok() {
        let results = apply_each(vec!["a", "b"], |s| Ok(s.to_uppercase()));
        assert!(!results.any_failed());
        assert_eq!(results.successes(), vec!["A", "B"]);
    }
}
