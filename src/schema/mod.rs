//! Annotation schema for camtrap datasets.
//!
//! A dataset is a directory holding two files:
//!
//! - `metadata.json`: an [`AnnotationFile`] mapping image identifiers to
//!   their [`AnnotationEntry`] (store locator, boxes, capture metadata).
//! - `images.bin`: the image store, raw encoded images addressed by the
//!   [`Locator`]s recorded in the metadata.
//!
//! Bounding boxes are stored in normalized XYXY form. The coordinate space is
//! part of the type (`BBoxXYXY<Normalized>`), so pixel values computed for
//! display or validation cannot be written back by accident.
//!
//! # Example
//!
//! ```
//! use camtrap::schema::{Annotation, AnnotationEntry, AnnotationFile, BBoxXYXY, Locator};
//!
//! let mut file = AnnotationFile::default();
//! file.images.insert(
//!     "cam01/IMG_0001.JPG".to_string(),
//!     AnnotationEntry::new(Locator::new(0, 2048)).with_annotation(Annotation::new(
//!         "Elephant",
//!         BBoxXYXY::from_xyxy(0.1, 0.2, 0.5, 0.8),
//!     )),
//! );
//! assert_eq!(file.annotation_count(), 1);
//! ```

mod bbox;
mod coord;
pub mod io_json;
mod model;
mod space;

pub use bbox::BBoxXYXY;
pub use coord::Coord;
pub use model::{
    Annotation, AnnotationEntry, AnnotationFile, CreatedBy, Flag, Locator, SCHEMA_VERSION,
};
pub use space::{Normalized, Pixel};

/// File name of the metadata document inside a dataset directory.
pub const METADATA_FILE: &str = "metadata.json";

/// File name of the image store inside a dataset directory.
pub const IMAGE_STORE_FILE: &str = "images.bin";
