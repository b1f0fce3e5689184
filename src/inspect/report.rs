//! Record inspection report types and terminal formatting.

use std::fmt;

use serde::Serialize;

/// The result of inspecting a record file.
#[derive(Clone, Debug, Serialize)]
pub struct RecordReport {
    /// The inspected file.
    pub path: String,
    pub summary: SummarySection,
    /// Class distribution histogram.
    pub labels: LabelsSection,
    #[serde(skip)]
    pub(crate) bar_width: usize,
}

/// Summary counts for a record file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SummarySection {
    pub records: usize,
    pub boxes: usize,
    /// Records with no boxes.
    pub empty_records: usize,
    /// Records written without `image/filename`.
    pub without_filename: usize,
    /// Sum of `image/encoded` sizes.
    pub encoded_bytes: u64,
    /// Smallest image as `(width, height)`, by area.
    pub min_size: Option<(u32, u32)>,
    /// Largest image as `(width, height)`, by area.
    pub max_size: Option<(u32, u32)>,
}

impl SummarySection {
    pub(crate) fn record_dimensions(&mut self, width: u32, height: u32) {
        let area = |(w, h): (u32, u32)| u64::from(w) * u64::from(h);
        let size = (width, height);
        if self.min_size.map_or(true, |min| area(size) < area(min)) {
            self.min_size = Some(size);
        }
        if self.max_size.map_or(true, |max| area(size) > area(max)) {
            self.max_size = Some(size);
        }
    }
}

/// Class distribution section.
#[derive(Clone, Debug, Serialize)]
pub struct LabelsSection {
    /// How many top classes to show.
    pub top_n: usize,
    /// Distinct (class id, class text) pairs.
    pub total_distinct: usize,
    pub total_boxes: usize,
    /// Top entries, sorted by count descending.
    pub entries: Vec<LabelCount>,
    /// Sum of counts for classes not in the top N.
    pub other_count: usize,
}

/// A single class with its box count.
#[derive(Clone, Debug, Serialize)]
pub struct LabelCount {
    pub class_id: i64,
    pub label: String,
    pub count: usize,
}

impl fmt::Display for RecordReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Record file: {}", self.path)?;
        writeln!(f)?;
        self.fmt_summary(f)?;
        writeln!(f)?;
        self.fmt_labels(f)
    }
}

impl RecordReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;

        writeln!(f, "┌─ Summary ─────────────────────────────────────────────────┐")?;
        writeln!(f, "  Records:       {:>10}", format_number(s.records as u64))?;
        writeln!(f, "  Boxes:         {:>10}", format_number(s.boxes as u64))?;
        writeln!(f, "  Empty records: {:>10}", format_number(s.empty_records as u64))?;
        if s.without_filename > 0 {
            writeln!(
                f,
                "  No filename:   {:>10}",
                format_number(s.without_filename as u64)
            )?;
        }
        writeln!(f, "  Image bytes:   {:>10}", format_number(s.encoded_bytes))?;
        if let (Some((min_w, min_h)), Some((max_w, max_h))) = (s.min_size, s.max_size) {
            writeln!(f, "  Image size:    {}x{} .. {}x{}", min_w, min_h, max_w, max_h)?;
        }
        writeln!(f, "└───────────────────────────────────────────────────────────┘")?;

        Ok(())
    }

    fn fmt_labels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.labels;

        let header = if l.total_distinct > l.top_n {
            format!("Classes (top {} of {})", l.top_n, l.total_distinct)
        } else {
            format!("Classes ({})", l.total_distinct)
        };
        writeln!(f, "┌─ {} {}┐", header, "─".repeat(57usize.saturating_sub(header.len())))?;

        if l.entries.is_empty() {
            writeln!(f, "  No boxes found.")?;
        } else {
            let max_count = l.entries.iter().map(|e| e.count).max().unwrap_or(1);

            for entry in &l.entries {
                writeln!(
                    f,
                    "  {:>3} {:<16} {:>7} {:>6}  {}",
                    entry.class_id,
                    truncate_label(&entry.label, 16),
                    format_number(entry.count as u64),
                    fmt_percent(entry.count, l.total_boxes),
                    render_bar(entry.count, max_count, self.bar_width)
                )?;
            }

            if l.other_count > 0 {
                writeln!(
                    f,
                    "  {:>3} {:<16} {:>7} {:>6}  {}",
                    "",
                    "(other)",
                    format_number(l.other_count as u64),
                    fmt_percent(l.other_count, l.total_boxes),
                    render_bar(l.other_count, max_count, self.bar_width)
                )?;
            }
        }
        writeln!(f, "└───────────────────────────────────────────────────────────┘")?;

        Ok(())
    }
}

/// Format a number with thousands separators.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a percentage, handling zero denominators.
fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }
    let filled = ((count * width) / max_count).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

/// Truncate a label to fit in the display column.
fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        label.to_string()
    } else {
        let kept: String = label.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
