//! Record file inspection.
//!
//! Reads a written `.record` file end to end, decoding every example, and
//! summarizes what it holds: record and box counts, image dimensions, and the
//! class distribution.

mod report;

pub use report::{LabelCount, LabelsSection, RecordReport, SummarySection};

use std::collections::HashMap;
use std::path::Path;

use crate::error::CamtrapError;
use crate::tfrecord::{ExampleRecord, RecordReader};

/// Options for record inspection.
#[derive(Clone, Debug)]
pub struct InspectOptions {
    /// Number of top labels to show in the histogram.
    pub top_labels: usize,
    /// Width of histogram bars (in characters).
    pub bar_width: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            top_labels: 10,
            bar_width: 20,
        }
    }
}

/// Inspect a record file and produce a report.
///
/// Fails on the first framing or decoding error; a report is only produced
/// for a file that reads cleanly to the end.
pub fn inspect_record_file(
    path: &Path,
    opts: &InspectOptions,
) -> Result<RecordReport, CamtrapError> {
    let mut summary = SummarySection::default();
    let mut counts: HashMap<(i64, String), usize> = HashMap::new();

    for payload in RecordReader::open(path)? {
        let record = ExampleRecord::decode(&payload?)?;

        summary.records += 1;
        summary.boxes += record.boxes.len();
        summary.encoded_bytes += record.encoded.len() as u64;
        if record.boxes.is_empty() {
            summary.empty_records += 1;
        }
        if record.filename.is_none() {
            summary.without_filename += 1;
        }
        summary.record_dimensions(record.width, record.height);

        for b in &record.boxes {
            *counts.entry((b.class_id, b.class_text.clone())).or_insert(0) += 1;
        }
    }

    tracing::debug!(
        path = %path.display(),
        records = summary.records,
        boxes = summary.boxes,
        "inspected record file"
    );

    Ok(RecordReport {
        path: path.display().to_string(),
        labels: compute_labels(counts, summary.boxes, opts.top_labels),
        summary,
        bar_width: opts.bar_width,
    })
}

/// Compute the class histogram, most frequent first.
fn compute_labels(
    counts: HashMap<(i64, String), usize>,
    total_boxes: usize,
    top_n: usize,
) -> LabelsSection {
    // Sort by count descending, then by class id for deterministic output
    let mut sorted: Vec<((i64, String), usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total_distinct = sorted.len();
    let mut entries = Vec::with_capacity(top_n.min(total_distinct));
    let mut other_count = 0;
    for (i, ((class_id, label), count)) in sorted.into_iter().enumerate() {
        if i < top_n {
            entries.push(LabelCount {
                class_id,
                label,
                count,
            });
        } else {
            other_count += count;
        }
    }

    LabelsSection {
        top_n,
        total_distinct,
        total_boxes,
        entries,
        other_count,
    }
}
