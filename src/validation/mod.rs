//! Annotation file validation.
//!
//! Checks an [`AnnotationFile`] for problems that would make an export fail
//! or silently produce bad records:
//! - Locator integrity (non-empty windows inside the store, JPEG payloads)
//! - Label quality (non-empty, known to the label map)
//! - Geometric validity (finite, ordered, inside the unit square, at least a pixel)

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use crate::error::CamtrapError;
use crate::labels::LabelMap;
use crate::schema::{AnnotationEntry, AnnotationFile};
use crate::store::{ImageStore, StoreReader};

/// Validates an annotation file and returns a report of all issues found.
///
/// Store checks run only when `store` is given; label checks against the map
/// only when `label_map` is given. A store that cannot be opened is reported
/// once as an error on the file rather than per image.
pub fn validate_annotation_file(
    annotations: &AnnotationFile,
    store: Option<&ImageStore>,
    label_map: Option<&LabelMap>,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    if annotations.images.is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::NoImages,
            "Annotation file lists no images",
            IssueContext::File,
        ));
    }

    let mut images = store.and_then(|store| match open_store(store) {
        Ok(images) => Some(images),
        Err(message) => {
            report.add(ValidationIssue::error(
                IssueCode::ImageDataOutOfRange,
                message,
                IssueContext::File,
            ));
            None
        }
    });

    for (name, entry) in &annotations.images {
        let dims = match images.as_mut() {
            Some(images) => validate_image_data(name, entry, images, &mut report),
            None => None,
        };
        validate_annotations(name, entry, dims, label_map, &mut report);
    }

    report
}

/// Read access to the store plus its length, captured once.
struct StoreView {
    reader: StoreReader,
    len: u64,
}

fn open_store(store: &ImageStore) -> Result<StoreView, String> {
    let describe = |err: CamtrapError| {
        format!("Cannot read image store {}: {}", store.path().display(), err)
    };
    let len = store.len().map_err(describe)?;
    let reader = store.reader().map_err(describe)?;
    Ok(StoreView { reader, len })
}

/// Checks the locator and payload of one image; returns its dimensions when readable.
fn validate_image_data(
    name: &str,
    entry: &AnnotationEntry,
    images: &mut StoreView,
    report: &mut ValidationReport,
) -> Option<(u32, u32)> {
    let context = || IssueContext::Image {
        name: name.to_string(),
    };
    let locator = entry.image_data;

    if locator.size == 0 {
        report.add(ValidationIssue::error(
            IssueCode::EmptyImageData,
            format!("Zero-length image data at offset {}", locator.start),
            context(),
        ));
        return None;
    }

    if !locator.fits_within(images.len) {
        report.add(ValidationIssue::error(
            IssueCode::ImageDataOutOfRange,
            format!(
                "Image data {}+{} extends past the store ({} bytes)",
                locator.start, locator.size, images.len
            ),
            context(),
        ));
        return None;
    }

    let bytes = match images.reader.read(locator) {
        Ok(bytes) => bytes,
        Err(err) => {
            report.add(ValidationIssue::error(
                IssueCode::ImageDataOutOfRange,
                err.to_string(),
                context(),
            ));
            return None;
        }
    };

    match imagesize::image_type(&bytes) {
        Ok(imagesize::ImageType::Jpeg) => {}
        Ok(other) => {
            report.add(ValidationIssue::error(
                IssueCode::NotJpeg,
                format!("Stored bytes are {:?}, not JPEG", other),
                context(),
            ));
            return None;
        }
        Err(err) => {
            report.add(ValidationIssue::error(
                IssueCode::NotJpeg,
                format!("Stored bytes are not a recognizable image: {}", err),
                context(),
            ));
            return None;
        }
    }

    let size = imagesize::blob_size(&bytes).ok()?;
    let width = u32::try_from(size.width).ok()?;
    let height = u32::try_from(size.height).ok()?;
    Some((width, height))
}

fn validate_annotations(
    name: &str,
    entry: &AnnotationEntry,
    dims: Option<(u32, u32)>,
    label_map: Option<&LabelMap>,
    report: &mut ValidationReport,
) {
    for (index, annotation) in entry.annotations.iter().enumerate() {
        let context = || IssueContext::Annotation {
            image: name.to_string(),
            index,
        };

        if annotation.label.trim().is_empty() {
            report.add(ValidationIssue::error(
                IssueCode::EmptyLabel,
                "Empty label",
                context(),
            ));
        } else if let Some(map) = label_map {
            if map.get(&annotation.label).is_none() {
                report.add(ValidationIssue::error(
                    IssueCode::UnmappedLabel,
                    format!("Label '{}' is not in the label map", annotation.label),
                    context(),
                ));
            }
        }

        let bbox = &annotation.bbox;

        // Check for non-finite coordinates
        if !bbox.is_finite() {
            report.add(ValidationIssue::error(
                IssueCode::BBoxNotFinite,
                format!(
                    "Non-finite coordinates ({}, {}, {}, {})",
                    bbox.xmin(),
                    bbox.ymin(),
                    bbox.xmax(),
                    bbox.ymax()
                ),
                context(),
            ));
            continue;
        }

        if !bbox.is_ordered() {
            report.add(ValidationIssue::error(
                IssueCode::InvalidBBoxOrdering,
                format!(
                    "Invalid ordering: min ({}, {}) should be < max ({}, {})",
                    bbox.xmin(),
                    bbox.ymin(),
                    bbox.xmax(),
                    bbox.ymax()
                ),
                context(),
            ));
            continue;
        }

        if !bbox.is_within_unit() {
            report.add(ValidationIssue::error(
                IssueCode::BBoxOutOfBounds,
                format!(
                    "Bounding box ({:.3}, {:.3}, {:.3}, {:.3}) extends outside [0, 1]",
                    bbox.xmin(),
                    bbox.ymin(),
                    bbox.xmax(),
                    bbox.ymax()
                ),
                context(),
            ));
        }

        if let Some((width, height)) = dims {
            let pixels = bbox.to_pixel(width, height);
            if pixels.width() < 1.0 || pixels.height() < 1.0 {
                report.add(ValidationIssue::warning(
                    IssueCode::SubPixelBBox,
                    format!(
                        "Box is {:.2}x{:.2} px on a {}x{} image",
                        pixels.width(),
                        pixels.height(),
                        width,
                        height
                    ),
                    context(),
                ));
            }
        }
    }
}
