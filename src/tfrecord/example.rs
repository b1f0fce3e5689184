//! Object-detection example records.

use std::collections::BTreeMap;

use prost::Message;

use super::proto::{Example, Feature, Features};
use crate::error::CamtrapError;

/// Value of `image/format` for JPEG payloads.
pub const JPEG_FORMAT: &str = "jpeg";

const HEIGHT: &str = "image/height";
const WIDTH: &str = "image/width";
const FILENAME: &str = "image/filename";
const SOURCE_ID: &str = "image/source_id";
const SHA256: &str = "image/key/sha256";
const ENCODED: &str = "image/encoded";
const FORMAT: &str = "image/format";
const XMIN: &str = "image/object/bbox/xmin";
const XMAX: &str = "image/object/bbox/xmax";
const YMIN: &str = "image/object/bbox/ymin";
const YMAX: &str = "image/object/bbox/ymax";
const CLASS_TEXT: &str = "image/object/class/text";
const CLASS_LABEL: &str = "image/object/class/label";
const DIFFICULT: &str = "image/object/difficult";
const TRUNCATED: &str = "image/object/truncated";
const OCCLUDED: &str = "image/object/occluded";

/// One exported box.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxRecord {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub class_id: i64,
    pub class_text: String,
    pub truncated: i64,
    pub occluded: i64,
    pub difficult: i64,
}

/// One exported image with its boxes.
///
/// `filename` and `source_id` are `None` when provenance is stripped; the
/// corresponding features are then left out of the serialized example.
#[derive(Clone, Debug, PartialEq)]
pub struct ExampleRecord {
    pub width: u32,
    pub height: u32,
    pub filename: Option<String>,
    pub source_id: Option<String>,
    pub sha256: String,
    pub encoded: Vec<u8>,
    pub format: String,
    pub boxes: Vec<BoxRecord>,
}

impl ExampleRecord {
    /// Builds the `tf.train.Example`, boxes flattened into parallel lists.
    pub fn to_example(&self) -> Example {
        let mut feature = BTreeMap::new();
        feature.insert(HEIGHT.to_string(), Feature::int64(i64::from(self.height)));
        feature.insert(WIDTH.to_string(), Feature::int64(i64::from(self.width)));
        if let Some(filename) = &self.filename {
            feature.insert(FILENAME.to_string(), Feature::bytes(filename.as_bytes().to_vec()));
        }
        if let Some(source_id) = &self.source_id {
            feature.insert(SOURCE_ID.to_string(), Feature::bytes(source_id.as_bytes().to_vec()));
        }
        feature.insert(SHA256.to_string(), Feature::bytes(self.sha256.as_bytes().to_vec()));
        feature.insert(ENCODED.to_string(), Feature::bytes(self.encoded.clone()));
        feature.insert(FORMAT.to_string(), Feature::bytes(self.format.as_bytes().to_vec()));

        let floats = |f: fn(&BoxRecord) -> f32| self.boxes.iter().map(f).collect::<Vec<_>>();
        let ints = |f: fn(&BoxRecord) -> i64| self.boxes.iter().map(f).collect::<Vec<_>>();

        feature.insert(XMIN.to_string(), Feature::float_list(floats(|b| b.xmin)));
        feature.insert(XMAX.to_string(), Feature::float_list(floats(|b| b.xmax)));
        feature.insert(YMIN.to_string(), Feature::float_list(floats(|b| b.ymin)));
        feature.insert(YMAX.to_string(), Feature::float_list(floats(|b| b.ymax)));
        feature.insert(
            CLASS_TEXT.to_string(),
            Feature::bytes_list(
                self.boxes
                    .iter()
                    .map(|b| b.class_text.as_bytes().to_vec())
                    .collect(),
            ),
        );
        feature.insert(CLASS_LABEL.to_string(), Feature::int64_list(ints(|b| b.class_id)));
        feature.insert(DIFFICULT.to_string(), Feature::int64_list(ints(|b| b.difficult)));
        feature.insert(TRUNCATED.to_string(), Feature::int64_list(ints(|b| b.truncated)));
        feature.insert(OCCLUDED.to_string(), Feature::int64_list(ints(|b| b.occluded)));

        Example {
            features: Some(Features { feature }),
        }
    }

    /// Serializes to protobuf bytes, ready for [`RecordWriter`](super::RecordWriter).
    pub fn encode(&self) -> Vec<u8> {
        self.to_example().encode_to_vec()
    }

    /// Decodes protobuf bytes written by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self, CamtrapError> {
        let example = Example::decode(bytes)?;
        Self::from_example(&example)
    }

    /// Reads the record back out of a `tf.train.Example`.
    pub fn from_example(example: &Example) -> Result<Self, CamtrapError> {
        let empty = BTreeMap::new();
        let features = example
            .features
            .as_ref()
            .map(|f| &f.feature)
            .unwrap_or(&empty);

        let xmin = float_list(features, XMIN);
        let xmax = float_list(features, XMAX);
        let ymin = float_list(features, YMIN);
        let ymax = float_list(features, YMAX);
        let labels = int64_list(features, CLASS_LABEL);
        let difficult = int64_list(features, DIFFICULT);
        let truncated = int64_list(features, TRUNCATED);
        let occluded = int64_list(features, OCCLUDED);
        let class_text = features
            .get(CLASS_TEXT)
            .and_then(Feature::as_bytes_list)
            .unwrap_or_default();

        let n = xmin.len();
        let lengths = [
            xmax.len(),
            ymin.len(),
            ymax.len(),
            labels.len(),
            class_text.len(),
            difficult.len(),
            truncated.len(),
            occluded.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(CamtrapError::MalformedExample(format!(
                "per-object lists have different lengths ({n} vs {lengths:?})"
            )));
        }

        let boxes = (0..n)
            .map(|i| BoxRecord {
                xmin: xmin[i],
                ymin: ymin[i],
                xmax: xmax[i],
                ymax: ymax[i],
                class_id: labels[i],
                class_text: String::from_utf8_lossy(&class_text[i]).into_owned(),
                truncated: truncated[i],
                occluded: occluded[i],
                difficult: difficult[i],
            })
            .collect();

        Ok(Self {
            width: dimension(features, WIDTH)?,
            height: dimension(features, HEIGHT)?,
            filename: text(features, FILENAME),
            source_id: text(features, SOURCE_ID),
            sha256: text(features, SHA256).ok_or_else(|| missing(SHA256))?,
            encoded: first_bytes(features, ENCODED).ok_or_else(|| missing(ENCODED))?,
            format: text(features, FORMAT).ok_or_else(|| missing(FORMAT))?,
            boxes,
        })
    }
}

type FeatureMap = BTreeMap<String, Feature>;

fn float_list<'a>(features: &'a FeatureMap, key: &str) -> &'a [f32] {
    features
        .get(key)
        .and_then(Feature::as_float_list)
        .unwrap_or_default()
}

fn int64_list<'a>(features: &'a FeatureMap, key: &str) -> &'a [i64] {
    features
        .get(key)
        .and_then(Feature::as_int64_list)
        .unwrap_or_default()
}

fn first_bytes(features: &FeatureMap, key: &str) -> Option<Vec<u8>> {
    features
        .get(key)
        .and_then(Feature::as_bytes_list)
        .and_then(|v| v.first().cloned())
}

fn text(features: &FeatureMap, key: &str) -> Option<String> {
    first_bytes(features, key).map(|b| String::from_utf8_lossy(&b).into_owned())
}

fn dimension(features: &FeatureMap, key: &str) -> Result<u32, CamtrapError> {
    let value = int64_list(features, key)
        .first()
        .copied()
        .ok_or_else(|| missing(key))?;
    u32::try_from(value).map_err(|_| CamtrapError::MalformedExample(format!("{key} out of range")))
}

fn missing(key: &str) -> CamtrapError {
    CamtrapError::MalformedExample(format!("missing feature {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExampleRecord {
        ExampleRecord {
            width: 640,
            height: 480,
            filename: Some("cam01/0001.jpg".into()),
            source_id: Some("cam01/0001.jpg".into()),
            sha256: "ab".repeat(32),
            encoded: vec![0xff, 0xd8, 0xff, 0xd9],
            format: JPEG_FORMAT.into(),
            boxes: vec![
                BoxRecord {
                    xmin: 0.1,
                    ymin: 0.2,
                    xmax: 0.3,
                    ymax: 0.4,
                    class_id: 1,
                    class_text: "Elephant".into(),
                    truncated: 1,
                    occluded: 0,
                    difficult: 0,
                },
                BoxRecord {
                    xmin: 0.5,
                    ymin: 0.5,
                    xmax: 0.9,
                    ymax: 1.0,
                    class_id: 2,
                    class_text: "Zebra".into(),
                    truncated: 0,
                    occluded: 1,
                    difficult: 1,
                },
            ],
        }
    }

    #[test]
    fn example_has_object_detection_keys() {
        let example = sample().to_example();
        let features = example.features.expect("features").feature;
        for key in [
            "image/height",
            "image/width",
            "image/filename",
            "image/source_id",
            "image/key/sha256",
            "image/encoded",
            "image/format",
            "image/object/bbox/xmin",
            "image/object/bbox/xmax",
            "image/object/bbox/ymin",
            "image/object/bbox/ymax",
            "image/object/class/text",
            "image/object/class/label",
            "image/object/difficult",
            "image/object/truncated",
            "image/object/occluded",
        ] {
            assert!(features.contains_key(key), "missing {key}");
        }
        assert_eq!(
            features["image/object/class/label"].as_int64_list(),
            Some(&[1, 2][..])
        );
    }

    #[test]
    fn decode_restores_parallel_lists_in_order() {
        let record = sample();
        let decoded = ExampleRecord::decode(&record.encode()).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn stripped_provenance_is_omitted() {
        let mut record = sample();
        record.filename = None;
        record.source_id = None;
        let features = record.to_example().features.expect("features").feature;
        assert!(!features.contains_key("image/filename"));
        assert!(!features.contains_key("image/source_id"));

        let decoded = ExampleRecord::decode(&record.encode()).expect("decode");
        assert_eq!(decoded.filename, None);
    }

    #[test]
    fn empty_box_lists_are_still_present() {
        let mut record = sample();
        record.boxes.clear();
        let features = record.to_example().features.expect("features").feature;
        assert_eq!(
            features["image/object/bbox/xmin"].as_float_list(),
            Some(&[][..])
        );
        let decoded = ExampleRecord::decode(&record.encode()).expect("decode");
        assert!(decoded.boxes.is_empty());
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(sample().encode(), sample().encode());
    }

    #[test]
    fn mismatched_lists_are_rejected() {
        let mut example = sample().to_example();
        let features = &mut example.features.as_mut().expect("features").feature;
        features.insert(XMIN.to_string(), Feature::float_list(vec![0.1]));
        assert!(matches!(
            ExampleRecord::from_example(&example),
            Err(CamtrapError::MalformedExample(_))
        ));
    }
}
