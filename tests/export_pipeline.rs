use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use camtrap::export::{
    run_export, spawn_export, EmptyExamplePolicy, ExportConfig, ExportEvent, ExportState,
    LABEL_MAP_FILE, TRAINING_RECORD, VALIDATION_RECORD,
};
use camtrap::labels::LabelMap;
use camtrap::schema::{
    Annotation, AnnotationEntry, AnnotationFile, BBoxXYXY, Locator, IMAGE_STORE_FILE,
};
use camtrap::store::ImageStore;
use camtrap::tfrecord::{read_records, ExampleRecord};

mod common;

fn ids_in(path: &std::path::Path) -> BTreeSet<String> {
    read_records(path)
        .expect("read records")
        .iter()
        .map(|payload| {
            ExampleRecord::decode(payload)
                .expect("decode")
                .filename
                .expect("filename")
        })
        .collect()
}

fn export_once(
    dataset: &std::path::Path,
    annotations: &AnnotationFile,
    out: &std::path::Path,
    config: ExportConfig,
) -> camtrap::export::ExportSummary {
    std::fs::create_dir_all(out).expect("create out dir");
    let config = ExportConfig {
        directory: out.to_path_buf(),
        ..config
    };
    let store = ImageStore::open(dataset.join(IMAGE_STORE_FILE)).expect("open store");
    let cancel = AtomicBool::new(false);
    run_export(&config, annotations, &store, &cancel, &mut |_| {}).expect("export")
}

#[test]
fn same_seed_reproduces_the_split() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dataset = temp.path().join("dataset");
    let annotations = common::write_dataset(&dataset, 25, &["Elephant", "Zebra"]);
    let config = ExportConfig::new(temp.path(), LabelMap::identity_from(&annotations))
        .with_validation_split(0.2)
        .with_seed(1234);

    let first = temp.path().join("first");
    let second = temp.path().join("second");
    let a = export_once(&dataset, &annotations, &first, config.clone());
    let b = export_once(&dataset, &annotations, &second, config);

    assert_eq!(a.train_size, 20);
    assert_eq!(a.written_train, b.written_train);
    assert_eq!(ids_in(&first.join(TRAINING_RECORD)), ids_in(&second.join(TRAINING_RECORD)));
    assert_eq!(
        ids_in(&first.join(VALIDATION_RECORD)),
        ids_in(&second.join(VALIDATION_RECORD))
    );
    assert_eq!(
        std::fs::read(first.join(TRAINING_RECORD)).expect("read"),
        std::fs::read(second.join(TRAINING_RECORD)).expect("read")
    );
}

#[test]
fn every_example_is_accounted_for() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dataset = temp.path().join("dataset");
    let mut annotations = common::write_dataset(&dataset, 12, &["Elephant", "Human", "Zebra"]);
    annotations.images.insert(
        "cam09/missing.JPG".into(),
        AnnotationEntry::new(Locator::new(10_000_000, 4096)).with_annotation(Annotation::new(
            "Elephant",
            BBoxXYXY::from_xyxy(0.0, 0.0, 1.0, 1.0),
        )),
    );

    let label_map = LabelMap::from_pairs([
        ("Elephant", "Elephant"),
        ("Zebra", "Zebra"),
        ("Human", "exclude"),
    ]);
    let config = ExportConfig::new(temp.path(), label_map)
        .with_validation_split(0.3)
        .with_seed(7)
        .with_empty_examples(EmptyExamplePolicy::Drop);
    let out = temp.path().join("out");
    let summary = export_once(&dataset, &annotations, &out, config);

    assert_eq!(summary.total, 13);
    assert_eq!(summary.skipped_count(), 1);
    assert_eq!(summary.dropped, 4);
    assert_eq!(
        summary.written() + summary.skipped_count() + summary.dropped,
        summary.total
    );

    let train = ids_in(&out.join(TRAINING_RECORD));
    let validation = ids_in(&out.join(VALIDATION_RECORD));
    assert!(train.is_disjoint(&validation));
    assert_eq!(train.len() + validation.len(), summary.written());

    let pbtxt = std::fs::read_to_string(out.join(LABEL_MAP_FILE)).expect("label map");
    assert_eq!(
        pbtxt,
        "item {\n name: \"Elephant\"\n id: 1\n}\nitem {\n name: \"Zebra\"\n id: 2\n}\n"
    );
}

#[test]
fn records_carry_object_detection_features() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dataset = temp.path().join("dataset");
    let annotations = common::write_dataset(&dataset, 3, &["Zebra"]);
    let config = ExportConfig::new(temp.path(), LabelMap::identity_from(&annotations))
        .with_validation_split(0.0)
        .with_seed(1);
    let out = temp.path().join("out");
    export_once(&dataset, &annotations, &out, config);

    for payload in read_records(&out.join(TRAINING_RECORD)).expect("read") {
        let record = ExampleRecord::decode(&payload).expect("decode");
        assert_eq!((record.width, record.height), (32, 24));
        assert_eq!(record.format, "jpeg");
        assert_eq!(record.sha256.len(), 64);
        assert_eq!(record.boxes.len(), 1);
        let b = &record.boxes[0];
        assert_eq!((b.class_id, b.class_text.as_str()), (1, "Zebra"));
        assert!((b.xmin - 0.1).abs() < 1e-6 && (b.ymax - 0.8).abs() < 1e-6);
    }
}

#[test]
fn background_worker_streams_events_and_finishes() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dataset = temp.path().join("dataset");
    let annotations = common::write_dataset(&dataset, 10, &["Elephant"]);
    let out = temp.path().join("out");
    std::fs::create_dir_all(&out).expect("create out dir");

    let config = ExportConfig::new(&out, LabelMap::identity_from(&annotations))
        .with_validation_split(0.2)
        .with_seed(99);
    let store = ImageStore::open(dataset.join(IMAGE_STORE_FILE)).expect("open store");
    let handle = spawn_export(config, annotations, Arc::new(store)).expect("spawn");

    let events: Vec<ExportEvent> = handle.events().iter().collect();
    assert_eq!(handle.state(), ExportState::Completed);
    let summary = handle.join().expect("join");

    assert_eq!(summary.written_train, 8);
    assert_eq!(summary.written_validation, 2);
    let last_progress = events.iter().rev().find_map(|e| match e {
        ExportEvent::Progress { count, .. } => Some(*count),
        _ => None,
    });
    assert_eq!(last_progress, Some(10));
    assert!(matches!(events.last(), Some(ExportEvent::Completed(_))));
}
