use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// The main error type for camtrap operations.
#[derive(Debug, Error)]
pub enum CamtrapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse annotation JSON from {path}: {source}")]
    AnnotationJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write annotation JSON to {path}: {source}")]
    AnnotationJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid label map {path}: {message}")]
    LabelMapParse { path: PathBuf, message: String },

    #[error("Byte window {start}+{size} exceeds image store length {len}")]
    OutOfRange { start: u64, size: u64, len: u64 },

    #[error("Refusing to append an empty image to the store")]
    EmptyImage,

    #[error("Invalid image format for '{example}': {message}")]
    InvalidImageFormat { example: String, message: String },

    #[error(
        "Mask for source '{source_id}' is {mask_width}x{mask_height} but image '{example}' is {image_width}x{image_height}"
    )]
    MaskDimensionMismatch {
        source_id: String,
        example: String,
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Failed to load mask {path}: {message}")]
    MaskLoad { path: PathBuf, message: String },

    #[error("Invalid annotation {index} on example '{example}': {message}")]
    InvalidAnnotation {
        example: String,
        index: usize,
        message: String,
    },

    #[error("Unknown label '{label}' on example '{example}' (not present in the label map)")]
    UnknownLabel { label: String, example: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Corrupt record in {path} at byte {offset}: {message}")]
    CorruptRecord {
        path: PathBuf,
        offset: u64,
        message: String,
    },

    #[error("Failed to decode example record: {0}")]
    ExampleDecode(#[from] prost::DecodeError),

    #[error("Malformed example record: {0}")]
    MalformedExample(String),

    #[error("Image '{id}' not found in the annotation file")]
    ImageNotFound { id: String },

    #[error("Export cancelled after {processed} example(s)")]
    Cancelled { processed: usize },

    #[error("Export worker panicked")]
    WorkerPanicked,

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },
}

impl CamtrapError {
    /// Returns true for errors that only affect a single example during export.
    ///
    /// Recoverable errors cause the example to be skipped and counted; all
    /// other errors abort the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CamtrapError::OutOfRange { .. }
                | CamtrapError::InvalidImageFormat { .. }
                | CamtrapError::MaskDimensionMismatch { .. }
                | CamtrapError::InvalidAnnotation { .. }
        )
    }
}
