//! Building a store from a directory of camera-trap images.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ImageStore;
use crate::error::CamtrapError;
use crate::schema::{AnnotationEntry, AnnotationFile};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Outcome of an ingest pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Image ids appended to the store in this pass.
    pub added: Vec<String>,
    /// Files skipped because their id is already in the annotation file.
    pub already_present: usize,
    /// Files skipped because they are not JPEG data.
    pub rejected: Vec<String>,
}

/// Appends every JPEG under `images_dir` to `store` and registers it in `annotations`.
///
/// Images are keyed by their `/`-separated path relative to `images_dir` and
/// visited in sorted order, so re-running on the same tree is a no-op. A file
/// inside a sub-directory takes the first path component as its camera id.
pub fn ingest_directory(
    images_dir: &Path,
    store: &ImageStore,
    annotations: &mut AnnotationFile,
) -> Result<IngestReport, CamtrapError> {
    let mut report = IngestReport::default();

    for path in collect_image_files(images_dir)? {
        let rel = path.strip_prefix(images_dir).unwrap_or(&path);
        let id = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if annotations.images.contains_key(&id) {
            report.already_present += 1;
            continue;
        }

        let bytes = std::fs::read(&path)?;
        if !matches!(imagesize::image_type(&bytes), Ok(imagesize::ImageType::Jpeg)) {
            tracing::warn!(image = %id, "not JPEG data, skipping");
            report.rejected.push(id);
            continue;
        }

        let locator = store.append(&bytes)?;
        let mut entry = AnnotationEntry::new(locator);
        if rel.components().count() > 1 {
            if let Some(camera) = rel.components().next() {
                entry.camera = Some(camera.as_os_str().to_string_lossy().into_owned());
            }
        }

        annotations.images.insert(id.clone(), entry);
        report.added.push(id);
    }

    tracing::info!(
        added = report.added.len(),
        already_present = report.already_present,
        rejected = report.rejected.len(),
        "ingest finished"
    );
    Ok(report)
}

fn collect_image_files(root: &Path) -> Result<Vec<PathBuf>, CamtrapError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| {
            CamtrapError::Io(std::io::Error::other(format!(
                "failed while traversing {}: {source}",
                root.display()
            )))
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), IMAGE_EXTENSIONS) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}
