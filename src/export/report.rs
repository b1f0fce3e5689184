//! Export summary report.

use serde::Serialize;
use std::fmt;

/// Lifecycle of an export run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// An example that was left out of the output because of a recoverable error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedExample {
    pub example: String,
    pub reason: String,
}

/// Counts and decisions of one export run.
#[derive(Clone, Debug, Serialize)]
pub struct ExportSummary {
    pub state: ExportState,
    /// Examples in the annotation file.
    pub total: usize,
    /// Shuffled positions below this went to training.
    pub train_size: usize,
    pub written_train: usize,
    pub written_validation: usize,
    /// Examples skipped because of recoverable errors.
    pub skipped: Vec<SkippedExample>,
    /// Examples left out because every box was excluded by the label map.
    pub dropped: usize,
    /// Seed of the shuffle; rerun with it to reproduce the split.
    pub seed: u64,
    /// Export labels; the class id of `labels[i]` is `i + 1`.
    pub labels: Vec<String>,
}

impl ExportSummary {
    pub(crate) fn new(total: usize, train_size: usize, seed: u64, labels: Vec<String>) -> Self {
        Self {
            state: ExportState::Running,
            total,
            train_size,
            written_train: 0,
            written_validation: 0,
            skipped: Vec::new(),
            dropped: 0,
            seed,
            labels,
        }
    }

    pub fn written(&self) -> usize {
        self.written_train + self.written_validation
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} examples: {} training, {} validation (train size {}, seed {})",
            self.total, self.written_train, self.written_validation, self.train_size, self.seed
        )?;
        writeln!(f, "  {} labels: {}", self.labels.len(), self.labels.join(", "))?;

        if self.dropped > 0 {
            writeln!(f, "  {} example(s) dropped with no exportable boxes", self.dropped)?;
        }

        if !self.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped ({}):", self.skipped.len())?;
            for skipped in &self.skipped {
                writeln!(f, "  - {}: {}", skipped.example, skipped.reason)?;
            }
        }

        Ok(())
    }
}
