// SPDX-License-Identifier: MIT OR Apache-2.0
//! Failure collection for bulk operations.
//!
//! A bulk operation keeps going when one item fails, records it, and
//! reports every failure at once when it finishes.

use crate::error::{ItemFailure, Result, TimelineError};

/// Failures gathered while processing a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    operation: String,
    processed: usize,
    failures: Vec<ItemFailure>,
}

impl BatchReport {
    /// Start a report for `operation`
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            processed: 0,
            failures: Vec::new(),
        }
    }

    /// Run `edit` for `item`, recording its failure instead of returning it
    pub fn run<T>(&mut self, item: &str, edit: impl FnOnce() -> Result<T>) -> Option<T> {
        self.processed += 1;
        match edit() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("{} failed on {item}: {e}", self.operation);
                self.failures.push(ItemFailure {
                    item: item.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Whether `item` already failed in this batch
    pub fn has_failed(&self, item: &str) -> bool {
        self.failures.iter().any(|f| f.item == item)
    }

    /// Number of items handed to [`BatchReport::run`]
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Finish the batch, failing with every collected item
    pub fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(TimelineError::OperationFailed {
            operation: self.operation,
            failures: self.failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_continues_after_failure() {
        let mut report = BatchReport::new("offset");
        let mut visited = Vec::new();
        for item in ["a", "b", "c"] {
            report.run(item, || {
                visited.push(item);
                if item == "b" {
                    Err(TimelineError::ReadOnly(item.to_string()))
                } else {
                    Ok(())
                }
            });
        }
        assert_eq!(visited, vec!["a", "b", "c"]);
        assert!(report.has_failed("b"));
        assert_eq!(report.processed(), 3);

        let err = report.finish().unwrap_err();
        assert_eq!(err.failed_items(), vec!["b"]);
    }

    #[test]
    fn test_clean_batch_finishes_ok() {
        let mut report = BatchReport::new("noop");
        report.run("a", || Ok(()));
        assert!(report.finish().is_ok());
    }
}
