//! Core annotation model.
//!
//! These types mirror the `metadata.json` document one to one. Every field
//! has a fixed shape; optional capture metadata is an explicit `Option`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bbox::BBoxXYXY;
use super::space::Normalized;

/// Current version written into new annotation files.
pub const SCHEMA_VERSION: &str = "1.0.0";

fn default_schema() -> String {
    SCHEMA_VERSION.to_string()
}

/// The root of a `metadata.json` document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationFile {
    /// Schema version string.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// People or tools that produced annotations in this file.
    #[serde(default)]
    pub analysts: Vec<String>,

    /// Image identifier to entry, ordered by identifier.
    #[serde(default)]
    pub images: BTreeMap<String, AnnotationEntry>,
}

impl Default for AnnotationFile {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            analysts: Vec::new(),
            images: BTreeMap::new(),
        }
    }
}

impl AnnotationFile {
    /// Total number of boxes across all images.
    pub fn annotation_count(&self) -> usize {
        self.images.values().map(|e| e.annotations.len()).sum()
    }

    /// Appends the annotations of `other` onto the matching entries of `self`.
    ///
    /// Used to fold the output of an annotation producer (for example a
    /// detector run over the same images) into an existing file. Images that
    /// `self` does not know about are ignored because they have no locator in
    /// this dataset's store. Returns the number of boxes merged.
    pub fn merge_annotations(&mut self, other: &AnnotationFile) -> usize {
        let mut merged = 0;
        for (id, incoming) in &other.images {
            if let Some(entry) = self.images.get_mut(id) {
                entry.annotations.extend(incoming.annotations.iter().cloned());
                merged += incoming.annotations.len();
            }
        }
        for analyst in &other.analysts {
            if !self.analysts.contains(analyst) {
                self.analysts.push(analyst.clone());
            }
        }
        merged
    }
}

/// A `(start, size)` byte window into the image store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub start: u64,
    pub size: u64,
}

impl Locator {
    pub fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// One past the last byte, or `None` if the window overflows `u64`.
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.size)
    }

    /// Returns true if the window is non-empty and fits in a store of `len` bytes.
    pub fn fits_within(&self, len: u64) -> bool {
        self.size > 0 && self.end().is_some_and(|end| end <= len)
    }
}

/// Metadata for one stored image.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationEntry {
    /// Where the encoded image lives in the store.
    pub image_data: Locator,

    /// Bounding boxes, in the order they were drawn.
    #[serde(default)]
    pub annotations: Vec<Annotation>,

    /// Camera or source identifier; also selects the privacy mask on export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,

    /// Capture time as recorded by the camera (free-form, usually ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl AnnotationEntry {
    pub fn new(image_data: Locator) -> Self {
        Self {
            image_data,
            annotations: Vec::new(),
            camera: None,
            timestamp: None,
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = Some(camera.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// One bounding box with its label and attributes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    /// Box in normalized coordinates.
    pub bbox: BBoxXYXY<Normalized>,

    /// Raw label as entered by the analyst or emitted by a detector.
    pub label: String,

    #[serde(default)]
    pub truncated: Flag,

    #[serde(default)]
    pub occluded: Flag,

    #[serde(default)]
    pub difficult: Flag,

    #[serde(default)]
    pub created_by: CreatedBy,
}

impl Annotation {
    /// Creates a human-drawn annotation with all flags cleared.
    pub fn new(label: impl Into<String>, bbox: BBoxXYXY<Normalized>) -> Self {
        Self {
            bbox,
            label: label.into(),
            truncated: Flag::No,
            occluded: Flag::No,
            difficult: Flag::No,
            created_by: CreatedBy::Human,
        }
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = Flag::Yes;
        self
    }

    pub fn occluded(mut self) -> Self {
        self.occluded = Flag::Yes;
        self
    }

    pub fn difficult(mut self) -> Self {
        self.difficult = Flag::Yes;
        self
    }

    pub fn created_by(mut self, created_by: CreatedBy) -> Self {
        self.created_by = created_by;
        self
    }
}

/// A two-valued attribute, stored as `"Y"` / `"N"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    #[serde(rename = "Y", alias = "y")]
    Yes,
    #[default]
    #[serde(rename = "N", alias = "n")]
    No,
}

impl Flag {
    /// Numeric form used in exported records.
    pub fn as_i64(self) -> i64 {
        match self {
            Flag::Yes => 1,
            Flag::No => 0,
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        if value {
            Flag::Yes
        } else {
            Flag::No
        }
    }
}

/// Who drew a box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    #[default]
    Human,
    Machine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_builder_pattern() {
        let annotation = Annotation::new("Elephant", BBoxXYXY::from_xyxy(0.0, 0.0, 0.5, 0.5))
            .occluded()
            .created_by(CreatedBy::Machine);

        assert_eq!(annotation.occluded, Flag::Yes);
        assert_eq!(annotation.truncated, Flag::No);
        assert_eq!(annotation.created_by, CreatedBy::Machine);
    }

    #[test]
    fn test_flags_parse_from_producer_encoding() {
        let json = r#"{
            "bbox": {"xmin": 0.1, "ymin": 0.1, "xmax": 0.2, "ymax": 0.2},
            "label": "Zebra",
            "truncated": "Y",
            "occluded": "N",
            "created_by": "machine"
        }"#;
        let annotation: Annotation = serde_json::from_str(json).expect("parse");
        assert_eq!(annotation.truncated.as_i64(), 1);
        assert_eq!(annotation.occluded.as_i64(), 0);
        assert_eq!(annotation.difficult, Flag::No);
        assert_eq!(annotation.created_by, CreatedBy::Machine);
    }

    #[test]
    fn test_unknown_flag_value_is_rejected() {
        let json = r#"{
            "bbox": {"xmin": 0.1, "ymin": 0.1, "xmax": 0.2, "ymax": 0.2},
            "label": "Zebra",
            "truncated": "maybe"
        }"#;
        assert!(serde_json::from_str::<Annotation>(json).is_err());
    }

    #[test]
    fn test_locator_bounds() {
        let loc = Locator::new(10, 5);
        assert_eq!(loc.end(), Some(15));
        assert!(loc.fits_within(15));
        assert!(!loc.fits_within(14));
        assert!(!Locator::new(0, 0).fits_within(100));
        assert_eq!(Locator::new(u64::MAX, 1).end(), None);
    }

    #[test]
    fn test_merge_annotations_only_touches_known_images() {
        let mut base = AnnotationFile::default();
        base.images
            .insert("a.jpg".into(), AnnotationEntry::new(Locator::new(0, 10)));

        let mut produced = AnnotationFile::default();
        produced.analysts.push("Machine Generated".into());
        produced.images.insert(
            "a.jpg".into(),
            AnnotationEntry::new(Locator::new(0, 1)).with_annotation(
                Annotation::new("Lion", BBoxXYXY::from_xyxy(0.1, 0.1, 0.3, 0.3))
                    .created_by(CreatedBy::Machine),
            ),
        );
        produced
            .images
            .insert("b.jpg".into(), AnnotationEntry::new(Locator::new(0, 1)));

        assert_eq!(base.merge_annotations(&produced), 1);
        assert_eq!(base.images["a.jpg"].annotations.len(), 1);
        assert_eq!(base.images["a.jpg"].image_data, Locator::new(0, 10));
        assert!(!base.images.contains_key("b.jpg"));
        assert_eq!(base.analysts, vec!["Machine Generated".to_string()]);
    }
}
