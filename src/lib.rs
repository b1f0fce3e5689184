//! Camtrap: camera-trap image store and TFRecord exporter.
//!
//! A camtrap dataset is a directory holding an append-only image store
//! (`images.bin`) and an annotation file (`metadata.json`) that locates every
//! image in the store and lists its bounding boxes. Camtrap builds datasets
//! from image folders, folds in annotations, validates them, and exports them
//! as `training.record` / `validation.record` files plus a `label_map.pbtxt`
//! for the TensorFlow Object Detection API.
//!
//! # Modules
//!
//! - [`schema`]: Annotation file types and JSON I/O
//! - [`store`]: The image store and directory ingest
//! - [`labels`]: Label maps and class-id resolution
//! - [`mask`]: Per-camera masks for blanking image regions
//! - [`tfrecord`]: `tf.train.Example` records and TFRecord framing
//! - [`export`]: The export pipeline and its background worker
//! - [`validation`]: Annotation file validation and error reporting
//! - [`inspect`]: Summaries of written record files
//! - [`error`]: Error types for camtrap operations

pub mod error;
pub mod export;
pub mod inspect;
pub mod labels;
pub mod mask;
pub mod schema;
pub mod store;
pub mod tfrecord;
pub mod validation;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

pub use error::CamtrapError;

use export::{EmptyExamplePolicy, ExportConfig, ExportEvent, ExportSummary};
use labels::LabelMap;
use mask::MaskSet;
use schema::io_json::{read_annotation_file, write_annotation_file};
use schema::{AnnotationFile, IMAGE_STORE_FILE, METADATA_FILE};
use store::ImageStore;

/// The camtrap CLI application.
#[derive(Parser)]
#[command(name = "camtrap")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Add every JPEG under a directory to a dataset (created if missing).
    Ingest(IngestArgs),
    /// Merge boxes from another annotation file into a dataset.
    Merge(MergeArgs),
    /// Validate a dataset for errors and warnings.
    Validate(ValidateArgs),
    /// Export a dataset to TFRecord training/validation files.
    Export(ExportArgs),
    /// Write one stored image to a file.
    Extract(ExtractArgs),
    /// Summarize a written .record file.
    Inspect(InspectArgs),
}

/// Report format for commands that print one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args)]
struct IngestArgs {
    /// Directory of camera-trap images (one sub-directory per camera).
    images_dir: PathBuf,

    /// Dataset directory holding metadata.json and images.bin.
    dataset_dir: PathBuf,
}

#[derive(clap::Args)]
struct MergeArgs {
    /// Dataset directory holding metadata.json and images.bin.
    dataset_dir: PathBuf,

    /// Annotation file whose boxes are appended to matching images.
    annotations: PathBuf,
}

#[derive(clap::Args)]
struct ValidateArgs {
    /// Dataset directory holding metadata.json and images.bin.
    dataset_dir: PathBuf,

    /// Label map JSON; also reports labels it does not cover.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Dataset directory holding metadata.json and images.bin.
    dataset_dir: PathBuf,

    /// Existing output directory for the record files and label map.
    out_dir: PathBuf,

    /// Label map JSON (raw label -> export name, "" to keep, "exclude" to drop).
    /// Without it every label is kept as-is.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Fraction of examples written to validation.record.
    #[arg(long, env = "CAMTRAP_VALIDATION_SPLIT", default_value_t = 0.1)]
    validation_split: f64,

    /// Shuffle seed; a random one is used and reported when omitted.
    #[arg(long, env = "CAMTRAP_SEED")]
    seed: Option<u64>,

    /// Directory of mask images named after camera ids.
    #[arg(long)]
    masks: Option<PathBuf>,

    /// Leave filenames out of records and re-encode images without metadata.
    #[arg(long)]
    strip_metadata: bool,

    /// Leave out examples with no boxes after label mapping.
    #[arg(long)]
    drop_empty: bool,

    /// Output format for the summary.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Dataset directory holding metadata.json and images.bin.
    dataset_dir: PathBuf,

    /// Image identifier as listed in metadata.json.
    image_id: String,

    /// Destination file.
    out_file: PathBuf,
}

#[derive(clap::Args)]
struct InspectArgs {
    /// Record file to summarize.
    record_file: PathBuf,

    /// Number of top classes to show.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

/// Run the camtrap CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CamtrapError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ingest(args)) => run_ingest(args),
        Some(Commands::Merge(args)) => run_merge(args),
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Export(args)) => run_export(args),
        Some(Commands::Extract(args)) => run_extract(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => {
            println!("camtrap {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Camera-trap image store and TFRecord exporter.");
            println!();
            println!("Run 'camtrap --help' for usage information.");
            Ok(())
        }
    }
}

/// Paths of the two files that make up a dataset.
struct DatasetPaths {
    metadata: PathBuf,
    store: PathBuf,
}

impl DatasetPaths {
    fn new(dir: &Path) -> Self {
        Self {
            metadata: dir.join(METADATA_FILE),
            store: dir.join(IMAGE_STORE_FILE),
        }
    }

    /// Opens an existing dataset; both files must be present.
    fn open(dir: &Path) -> Result<(Self, AnnotationFile, ImageStore), CamtrapError> {
        let paths = Self::new(dir);
        for required in [&paths.metadata, &paths.store] {
            if !required.is_file() {
                return Err(CamtrapError::Configuration(format!(
                    "{} is not a dataset: missing {}",
                    dir.display(),
                    required.display()
                )));
            }
        }
        let annotations = read_annotation_file(&paths.metadata)?;
        let store = ImageStore::open(&paths.store)?;
        Ok((paths, annotations, store))
    }
}

fn run_ingest(args: IngestArgs) -> Result<(), CamtrapError> {
    std::fs::create_dir_all(&args.dataset_dir)?;
    let paths = DatasetPaths::new(&args.dataset_dir);

    let mut annotations = if paths.metadata.is_file() {
        read_annotation_file(&paths.metadata)?
    } else {
        AnnotationFile::default()
    };
    let store = ImageStore::open(&paths.store)?;

    let report = store::ingest_directory(&args.images_dir, &store, &mut annotations)?;
    write_annotation_file(&paths.metadata, &annotations)?;

    println!(
        "Ingested {} image(s) into {} ({} already present, {} rejected)",
        report.added.len(),
        args.dataset_dir.display(),
        report.already_present,
        report.rejected.len()
    );
    for rejected in &report.rejected {
        println!("  - rejected {}: not JPEG data", rejected);
    }
    Ok(())
}

fn run_merge(args: MergeArgs) -> Result<(), CamtrapError> {
    let (paths, mut annotations, _store) = DatasetPaths::open(&args.dataset_dir)?;
    let incoming = read_annotation_file(&args.annotations)?;

    let unknown = incoming
        .images
        .keys()
        .filter(|id| !annotations.images.contains_key(*id))
        .count();
    let merged = annotations.merge_annotations(&incoming);
    write_annotation_file(&paths.metadata, &annotations)?;

    println!(
        "Merged {} box(es) from {} into {}",
        merged,
        args.annotations.display(),
        paths.metadata.display()
    );
    if unknown > 0 {
        println!("  {} image(s) not in the dataset were ignored", unknown);
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CamtrapError> {
    let (_paths, annotations, store) = DatasetPaths::open(&args.dataset_dir)?;
    let label_map = args
        .labels
        .as_deref()
        .map(labels::read_label_map)
        .transpose()?;

    let report =
        validation::validate_annotation_file(&annotations, Some(&store), label_map.as_ref());

    match args.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{}", report),
    }

    let has_errors = report.error_count() > 0;
    let has_warnings = report.warning_count() > 0;

    if has_errors || (args.strict && has_warnings) {
        Err(CamtrapError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

fn run_export(args: ExportArgs) -> Result<(), CamtrapError> {
    let (_paths, annotations, store) = DatasetPaths::open(&args.dataset_dir)?;

    let label_map = match &args.labels {
        Some(path) => labels::read_label_map(path)?,
        None => LabelMap::identity_from(&annotations),
    };
    let masks = match &args.masks {
        Some(dir) => {
            let masks = MaskSet::load_dir(dir)?;
            if masks.is_empty() {
                tracing::warn!(dir = %dir.display(), "mask directory holds no masks");
            } else {
                tracing::info!(count = masks.len(), dir = %dir.display(), "loaded masks");
            }
            masks
        }
        None => MaskSet::new(),
    };
    let empty_examples = if args.drop_empty {
        EmptyExamplePolicy::Drop
    } else {
        EmptyExamplePolicy::Keep
    };

    let mut config = ExportConfig::new(&args.out_dir, label_map)
        .with_validation_split(args.validation_split)
        .with_masks(masks)
        .with_strip_metadata(args.strip_metadata)
        .with_empty_examples(empty_examples);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let progress = if args.output == OutputFormat::Json {
        ProgressBar::hidden()
    } else {
        export_progress_bar(annotations.images.len() as u64)
    };

    let handle = export::spawn_export(config, annotations, Arc::new(store))?;
    let mut aborted = None;
    for event in handle.events() {
        match event {
            ExportEvent::Progress { count, example } => {
                progress.set_position(count as u64);
                progress.set_message(example);
            }
            // Already logged by the pipeline and listed in the summary.
            ExportEvent::Skipped { .. } => {}
            ExportEvent::Completed(_) => progress.finish_and_clear(),
            ExportEvent::Aborted { summary, cause } => {
                progress.abandon();
                aborted = Some((summary, cause));
            }
        }
    }

    match handle.join() {
        Ok(summary) => {
            let heading = format!("Exported to {}:", args.out_dir.display());
            print_export_summary(args.output, &heading, &summary)
        }
        Err(err) => {
            // Records written before the abort stay on disk; report how many.
            if let Some((summary, cause)) = aborted {
                let heading = format!("Export to {} aborted ({cause}):", args.out_dir.display());
                print_export_summary(args.output, &heading, &summary)?;
            }
            Err(err)
        }
    }
}

fn print_export_summary(
    output: OutputFormat,
    heading: &str,
    summary: &ExportSummary,
) -> Result<(), CamtrapError> {
    match output {
        OutputFormat::Json => print_json(summary)?,
        OutputFormat::Text => {
            println!("{heading}");
            print!("{}", summary);
        }
    }
    Ok(())
}

fn export_progress_bar(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}",
    )
    .map(|style| style.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress
}

fn run_extract(args: ExtractArgs) -> Result<(), CamtrapError> {
    let (_paths, annotations, store) = DatasetPaths::open(&args.dataset_dir)?;
    let entry = annotations
        .images
        .get(&args.image_id)
        .ok_or_else(|| CamtrapError::ImageNotFound {
            id: args.image_id.clone(),
        })?;

    let bytes = store.read(entry.image_data)?;
    std::fs::write(&args.out_file, &bytes)?;

    println!(
        "Wrote {} ({} bytes) to {}",
        args.image_id,
        bytes.len(),
        args.out_file.display()
    );
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<(), CamtrapError> {
    let opts = inspect::InspectOptions {
        top_labels: args.top,
        ..Default::default()
    };
    let report = inspect::inspect_record_file(&args.record_file, &opts)?;

    match args.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{}", report),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CamtrapError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| CamtrapError::Io(std::io::Error::other(err)))?;
    println!("{}", json);
    Ok(())
}
