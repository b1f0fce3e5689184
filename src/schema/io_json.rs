//! JSON serialization for `metadata.json`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::model::AnnotationFile;
use crate::error::CamtrapError;

/// Reads an annotation file from disk.
///
/// # Errors
/// Returns an error if the file cannot be read or does not match the schema.
pub fn read_annotation_file(path: &Path) -> Result<AnnotationFile, CamtrapError> {
    let file = File::open(path).map_err(CamtrapError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| CamtrapError::AnnotationJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes an annotation file as pretty-printed JSON.
pub fn write_annotation_file(path: &Path, annotations: &AnnotationFile) -> Result<(), CamtrapError> {
    let file = File::create(path).map_err(CamtrapError::Io)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, annotations).map_err(|source| {
        CamtrapError::AnnotationJsonWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Parses an annotation file from a byte slice.
pub fn from_json_slice(bytes: &[u8]) -> Result<AnnotationFile, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Parses an annotation file from a string.
pub fn from_json_str(json: &str) -> Result<AnnotationFile, serde_json::Error> {
    serde_json::from_str(json)
}

/// Renders an annotation file as pretty-printed JSON.
pub fn to_json_string(annotations: &AnnotationFile) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(annotations)
}
