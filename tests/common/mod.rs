#![allow(dead_code)]

use std::fs;
use std::path::Path;

use camtrap::schema::io_json::write_annotation_file;
use camtrap::schema::{
    Annotation, AnnotationEntry, AnnotationFile, BBoxXYXY, IMAGE_STORE_FILE, METADATA_FILE,
};
use camtrap::store::ImageStore;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, Rgb, RgbImage};

/// A small gradient JPEG; `seed` varies the pixels so images hash differently.
pub fn jpeg_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            seed,
        ])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .expect("encode jpeg");
    out
}

pub fn write_jpeg(path: &Path, width: u32, height: u32, seed: u8) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, jpeg_bytes(width, height, seed)).expect("write jpeg file");
}

/// Writes a dataset directory with one box per image, labels cycling through `labels`.
pub fn write_dataset(dir: &Path, images: usize, labels: &[&str]) -> AnnotationFile {
    fs::create_dir_all(dir).expect("create dataset dir");
    let store = ImageStore::open(dir.join(IMAGE_STORE_FILE)).expect("open store");

    let mut annotations = AnnotationFile::default();
    for i in 0..images {
        let locator = store
            .append(&jpeg_bytes(32, 24, i as u8))
            .expect("append image");
        let label = labels[i % labels.len()];
        annotations.images.insert(
            format!("cam{:02}/IMG_{:04}.JPG", i % 2, i),
            AnnotationEntry::new(locator)
                .with_camera(format!("cam{:02}", i % 2))
                .with_annotation(Annotation::new(
                    label,
                    BBoxXYXY::from_xyxy(0.1, 0.2, 0.6, 0.8),
                )),
        );
    }

    write_annotation_file(&dir.join(METADATA_FILE), &annotations).expect("write metadata");
    annotations
}
