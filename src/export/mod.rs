//! Export of an annotated image store to TFRecord files.
//!
//! One run:
//!
//! 1. validates the [`ExportConfig`] and locks the output directory,
//! 2. resolves the label map into 1-based class ids,
//! 3. shuffles every example with a seeded uniform permutation,
//! 4. writes each example to `training.record` or `validation.record`
//!    according to its shuffled position,
//! 5. writes `label_map.pbtxt`.
//!
//! Per-example problems (bytes outside the store, non-JPEG data, a mask of
//! the wrong size, an empty label, a box that is not inside the unit square
//! with min < max) skip that example and are counted. An annotation
//! whose label is missing from the label map aborts the whole run: records
//! already written stay on disk, nothing further is written.
//!
//! [`run_export`] does the work on the calling thread and reports through a
//! callback; [`spawn_export`] runs it on a background thread and reports
//! through a channel.

mod report;
mod split;
mod worker;

pub use report::{ExportState, ExportSummary, SkippedExample};
pub use split::{partition_for, shuffle_seeded, train_size, Partition};
pub use worker::{spawn_export, ExportHandle};

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use sha2::{Digest, Sha256};

use crate::error::CamtrapError;
use crate::labels::{to_pbtxt_string, LabelMap, LabelResolver, Resolution};
use crate::mask::{self, Mask, MaskSet};
use crate::schema::{AnnotationEntry, AnnotationFile};
use crate::store::{ImageStore, StoreReader};
use crate::tfrecord::{BoxRecord, ExampleRecord, RecordWriter, JPEG_FORMAT};

pub const TRAINING_RECORD: &str = "training.record";
pub const VALIDATION_RECORD: &str = "validation.record";
pub const LABEL_MAP_FILE: &str = "label_map.pbtxt";

/// Present in the output directory while a run holds it.
pub const LOCK_FILE: &str = ".camtrap-export.lock";

const JPEG_QUALITY: u8 = 95;

/// What to do with an example that has no boxes left after label resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyExamplePolicy {
    /// Write the record with empty object lists.
    #[default]
    Keep,
    /// Leave the example out and count it as dropped.
    Drop,
}

/// Settings for one export run.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Existing, writable output directory.
    pub directory: PathBuf,
    /// Fraction of examples for validation, in `[0, 1]`.
    pub validation_split: f64,
    pub label_map: LabelMap,
    pub masks: MaskSet,
    /// Leave filename/source id out of records and re-encode images.
    pub strip_metadata: bool,
    /// Shuffle seed; drawn from system entropy when `None`.
    pub seed: Option<u64>,
    pub empty_examples: EmptyExamplePolicy,
}

impl ExportConfig {
    pub fn new(directory: impl Into<PathBuf>, label_map: LabelMap) -> Self {
        Self {
            directory: directory.into(),
            validation_split: 0.1,
            label_map,
            masks: MaskSet::new(),
            strip_metadata: false,
            seed: None,
            empty_examples: EmptyExamplePolicy::Keep,
        }
    }

    pub fn with_validation_split(mut self, validation_split: f64) -> Self {
        self.validation_split = validation_split;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_masks(mut self, masks: MaskSet) -> Self {
        self.masks = masks;
        self
    }

    pub fn with_strip_metadata(mut self, strip_metadata: bool) -> Self {
        self.strip_metadata = strip_metadata;
        self
    }

    pub fn with_empty_examples(mut self, policy: EmptyExamplePolicy) -> Self {
        self.empty_examples = policy;
        self
    }

    /// Checks everything that can be checked before touching the disk.
    pub fn validate(&self) -> Result<(), CamtrapError> {
        if !self.validation_split.is_finite() || !(0.0..=1.0).contains(&self.validation_split) {
            return Err(CamtrapError::Configuration(format!(
                "validation split must be in [0, 1], got {}",
                self.validation_split
            )));
        }
        if self.label_map.is_empty() {
            return Err(CamtrapError::Configuration(
                "label map is empty".to_string(),
            ));
        }
        if !self.directory.is_dir() {
            return Err(CamtrapError::Configuration(format!(
                "output directory {} does not exist",
                self.directory.display()
            )));
        }
        Ok(())
    }
}

/// Notifications emitted while a run progresses.
#[derive(Clone, Debug)]
pub enum ExportEvent {
    /// One more example was processed (written, dropped or skipped).
    Progress { count: usize, example: String },
    /// An example was skipped because of a recoverable error.
    Skipped { example: String, reason: String },
    /// The run finished; sent exactly once on success.
    Completed(ExportSummary),
    /// The run stopped early because of a fatal error or cancellation.
    Aborted { summary: ExportSummary, cause: String },
}

/// Runs an export on the calling thread.
///
/// `cancel` is checked before each example; once set, the run stops without
/// writing a partial record and returns [`CamtrapError::Cancelled`].
pub fn run_export(
    config: &ExportConfig,
    annotations: &AnnotationFile,
    store: &ImageStore,
    cancel: &AtomicBool,
    on_event: &mut dyn FnMut(ExportEvent),
) -> Result<ExportSummary, CamtrapError> {
    let mut summary = ExportSummary::new(annotations.images.len(), 0, 0, Vec::new());

    match export_into(config, annotations, store, cancel, on_event, &mut summary) {
        Ok(()) => {
            summary.state = ExportState::Completed;
            tracing::info!(
                written_train = summary.written_train,
                written_validation = summary.written_validation,
                skipped = summary.skipped_count(),
                dropped = summary.dropped,
                "export completed"
            );
            on_event(ExportEvent::Completed(summary.clone()));
            Ok(summary)
        }
        Err(err) => {
            summary.state = ExportState::Aborted;
            tracing::error!(error = %err, "export aborted");
            on_event(ExportEvent::Aborted {
                summary,
                cause: err.to_string(),
            });
            Err(err)
        }
    }
}

fn export_into(
    config: &ExportConfig,
    annotations: &AnnotationFile,
    store: &ImageStore,
    cancel: &AtomicBool,
    on_event: &mut dyn FnMut(ExportEvent),
    summary: &mut ExportSummary,
) -> Result<(), CamtrapError> {
    config.validate()?;
    let _lock = DirectoryLock::acquire(&config.directory)?;

    let resolver = LabelResolver::new(&config.label_map);
    let mut examples: Vec<(&String, &AnnotationEntry)> = annotations.images.iter().collect();
    let seed = config.seed.unwrap_or_else(rand::random);
    split::shuffle_seeded(&mut examples, seed);

    *summary = ExportSummary::new(
        examples.len(),
        split::train_size(examples.len(), config.validation_split),
        seed,
        resolver.labels().to_vec(),
    );
    tracing::info!(
        total = summary.total,
        train_size = summary.train_size,
        seed,
        labels = summary.labels.len(),
        directory = %config.directory.display(),
        "starting export"
    );

    let mut reader = store.reader()?;
    let mut training = create_writer(&config.directory.join(TRAINING_RECORD))?;
    let mut validation = create_writer(&config.directory.join(VALIDATION_RECORD))?;

    let ctx = ExampleContext {
        config,
        resolver: &resolver,
    };
    let written = write_examples(
        &ctx,
        &examples,
        &mut reader,
        [&mut training, &mut validation],
        cancel,
        on_event,
        summary,
    );

    // Records written before a failure stay on disk, so flush either way.
    let flushed = training.finish().and(validation.finish());
    written?;
    flushed?;

    fs::write(
        config.directory.join(LABEL_MAP_FILE),
        to_pbtxt_string(resolver.labels()),
    )?;
    Ok(())
}

type Writer = RecordWriter<BufWriter<File>>;

fn create_writer(path: &Path) -> Result<Writer, CamtrapError> {
    Ok(RecordWriter::new(BufWriter::new(File::create(path)?)))
}

fn write_examples(
    ctx: &ExampleContext<'_>,
    examples: &[(&String, &AnnotationEntry)],
    reader: &mut StoreReader,
    [training, validation]: [&mut Writer; 2],
    cancel: &AtomicBool,
    on_event: &mut dyn FnMut(ExportEvent),
    summary: &mut ExportSummary,
) -> Result<(), CamtrapError> {
    for (position, (name, entry)) in examples.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(CamtrapError::Cancelled {
                processed: position,
            });
        }

        match ctx.build_record(name, entry, reader) {
            Ok(Some(record)) => {
                let payload = record.encode();
                match split::partition_for(position, summary.train_size) {
                    Partition::Training => {
                        training.write_record(&payload)?;
                        summary.written_train += 1;
                    }
                    Partition::Validation => {
                        validation.write_record(&payload)?;
                        summary.written_validation += 1;
                    }
                }
                tracing::debug!(example = %name, position, boxes = record.boxes.len(), "wrote record");
            }
            Ok(None) => {
                tracing::debug!(example = %name, "no exportable boxes, dropped");
                summary.dropped += 1;
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(example = %name, error = %err, "skipping example");
                let reason = err.to_string();
                summary.skipped.push(SkippedExample {
                    example: name.to_string(),
                    reason: reason.clone(),
                });
                on_event(ExportEvent::Skipped {
                    example: name.to_string(),
                    reason,
                });
            }
            Err(err) => return Err(err),
        }

        on_event(ExportEvent::Progress {
            count: position + 1,
            example: name.to_string(),
        });
    }
    Ok(())
}

struct ExampleContext<'a> {
    config: &'a ExportConfig,
    resolver: &'a LabelResolver,
}

impl ExampleContext<'_> {
    /// Turns one entry into a record, or `None` when the empty-example policy drops it.
    fn build_record(
        &self,
        name: &str,
        entry: &AnnotationEntry,
        reader: &mut StoreReader,
    ) -> Result<Option<ExampleRecord>, CamtrapError> {
        // Labels first: an unknown label must abort even if the image is bad.
        let boxes = self.resolve_boxes(name, entry)?;
        if boxes.is_empty() && self.config.empty_examples == EmptyExamplePolicy::Drop {
            return Ok(None);
        }

        let bytes = reader.read(entry.image_data)?;
        let (width, height) = sniff_jpeg(name, &bytes)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));

        let source = entry.camera.as_deref();
        let mask = self.config.masks.for_source(source);
        let encoded = if mask.is_some() || self.config.strip_metadata {
            reencode(name, source.unwrap_or_default(), &bytes, mask)?
        } else {
            bytes
        };

        let provenance = (!self.config.strip_metadata).then(|| name.to_string());
        Ok(Some(ExampleRecord {
            width,
            height,
            filename: provenance.clone(),
            source_id: provenance,
            sha256,
            encoded,
            format: JPEG_FORMAT.to_string(),
            boxes,
        }))
    }

    fn resolve_boxes(
        &self,
        name: &str,
        entry: &AnnotationEntry,
    ) -> Result<Vec<BoxRecord>, CamtrapError> {
        let mut boxes = Vec::with_capacity(entry.annotations.len());
        let mut invalid = None;
        for (index, annotation) in entry.annotations.iter().enumerate() {
            if annotation.label.trim().is_empty() {
                invalid.get_or_insert_with(|| invalid_annotation(name, index, "empty label"));
                continue;
            }
            let (class_text, class_id) = match self.resolver.resolve(&annotation.label) {
                Some(Resolution::Class { name: label, id }) => (label, id),
                Some(Resolution::Excluded) => continue,
                None => {
                    return Err(CamtrapError::UnknownLabel {
                        label: annotation.label.clone(),
                        example: name.to_string(),
                    })
                }
            };
            let bbox = &annotation.bbox;
            if !(bbox.is_finite() && bbox.is_ordered() && bbox.is_within_unit()) {
                invalid.get_or_insert_with(|| {
                    invalid_annotation(
                        name,
                        index,
                        format!(
                            "box ({}, {}, {}, {}) is not an ordered box inside [0, 1]",
                            bbox.xmin(),
                            bbox.ymin(),
                            bbox.xmax(),
                            bbox.ymax()
                        ),
                    )
                });
                continue;
            }
            boxes.push(BoxRecord {
                xmin: bbox.xmin() as f32,
                ymin: bbox.ymin() as f32,
                xmax: bbox.xmax() as f32,
                ymax: bbox.ymax() as f32,
                class_id,
                class_text: class_text.to_string(),
                truncated: annotation.truncated.as_i64(),
                occluded: annotation.occluded.as_i64(),
                difficult: annotation.difficult.as_i64(),
            });
        }
        // Every label is resolved before a bad box skips the example.
        match invalid {
            Some(err) => Err(err),
            None => Ok(boxes),
        }
    }
}

fn invalid_annotation(name: &str, index: usize, message: impl Into<String>) -> CamtrapError {
    CamtrapError::InvalidAnnotation {
        example: name.to_string(),
        index,
        message: message.into(),
    }
}

/// Confirms `bytes` is JPEG and reads its dimensions from the header.
fn sniff_jpeg(name: &str, bytes: &[u8]) -> Result<(u32, u32), CamtrapError> {
    let invalid = |message: String| CamtrapError::InvalidImageFormat {
        example: name.to_string(),
        message,
    };

    match imagesize::image_type(bytes) {
        Ok(imagesize::ImageType::Jpeg) => {}
        Ok(other) => return Err(invalid(format!("expected JPEG, found {other:?}"))),
        Err(err) => return Err(invalid(err.to_string())),
    }

    let size = imagesize::blob_size(bytes).map_err(|err| invalid(err.to_string()))?;
    let width = u32::try_from(size.width)
        .map_err(|_| invalid(format!("width {} does not fit in u32", size.width)))?;
    let height = u32::try_from(size.height)
        .map_err(|_| invalid(format!("height {} does not fit in u32", size.height)))?;
    if width == 0 || height == 0 {
        return Err(invalid(format!("degenerate dimensions {width}x{height}")));
    }
    Ok((width, height))
}

/// Decodes, masks and re-encodes a JPEG. Re-encoding also drops EXIF blocks.
fn reencode(
    name: &str,
    source: &str,
    bytes: &[u8],
    mask: Option<&Mask>,
) -> Result<Vec<u8>, CamtrapError> {
    let invalid = |message: String| CamtrapError::InvalidImageFormat {
        example: name.to_string(),
        message,
    };

    let pixels = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|err| invalid(err.to_string()))?
        .to_rgb8();
    let pixels = mask::apply(pixels, mask, source, name)?;

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|err| invalid(format!("re-encoding failed: {err}")))?;
    Ok(out)
}

/// Marks an output directory as in use for the lifetime of the guard.
struct DirectoryLock {
    path: PathBuf,
}

impl DirectoryLock {
    fn acquire(directory: &Path) -> Result<Self, CamtrapError> {
        let path = directory.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(CamtrapError::Configuration(format!(
                    "another export is running in {} (remove {} if it is stale)",
                    directory.display(),
                    path.display()
                )))
            }
            Err(err) => Err(CamtrapError::Configuration(format!(
                "output directory {} is not writable: {err}",
                directory.display()
            ))),
        }
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to remove export lock");
        }
    }
}
