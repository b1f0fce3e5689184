//! Label maps and class-id resolution.
//!
//! A [`LabelMap`] says what each raw annotation label becomes on export:
//! renamed, kept as-is, or excluded. A [`LabelResolver`] is built from a map
//! once per export run and assigns 1-based class ids to the distinct export
//! labels in the order they first appear in the map.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::CamtrapError;
use crate::schema::AnnotationFile;

/// Map value that removes a label from the export (matched case-insensitively).
pub const EXCLUDE: &str = "exclude";

/// What happens to a raw label on export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelRule {
    /// Export under the raw label itself.
    Keep,
    /// Export under a different name.
    Rename(String),
    /// Drop boxes with this label.
    Exclude,
}

impl LabelRule {
    /// Interprets a label map value: `""` keeps, `exclude` (any case) excludes.
    pub fn parse(value: &str) -> Self {
        if value.is_empty() {
            LabelRule::Keep
        } else if value.eq_ignore_ascii_case(EXCLUDE) {
            LabelRule::Exclude
        } else {
            LabelRule::Rename(value.to_string())
        }
    }
}

/// Ordered mapping from raw label to [`LabelRule`].
///
/// Insertion order matters: it fixes the numeric class ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelMap {
    entries: Vec<(String, LabelRule)>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the rule for `raw`. A replaced rule keeps its position.
    pub fn insert(&mut self, raw: impl Into<String>, rule: LabelRule) {
        let raw = raw.into();
        match self.entries.iter_mut().find(|(r, _)| *r == raw) {
            Some(slot) => slot.1 = rule,
            None => self.entries.push((raw, rule)),
        }
    }

    /// Builds a map from `(raw, value)` pairs using [`LabelRule::parse`].
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (raw, value) in pairs {
            map.insert(raw, LabelRule::parse(value.as_ref()));
        }
        map
    }

    /// Keep-as-is map over every label used in `annotations`, in first-appearance order.
    pub fn identity_from(annotations: &AnnotationFile) -> Self {
        let mut map = Self::new();
        for entry in annotations.images.values() {
            for annotation in &entry.annotations {
                if map.get(&annotation.label).is_none() {
                    map.insert(annotation.label.clone(), LabelRule::Keep);
                }
            }
        }
        map
    }

    /// Parses a JSON object of `"raw": "export"` pairs, keeping document order.
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let object = value
            .as_object()
            .ok_or_else(|| "expected a JSON object of label pairs".to_string())?;

        let mut map = Self::new();
        for (raw, target) in object {
            let target = target
                .as_str()
                .ok_or_else(|| format!("value for '{raw}' must be a string"))?;
            map.insert(raw.clone(), LabelRule::parse(target));
        }
        Ok(map)
    }

    pub fn get(&self, raw: &str) -> Option<&LabelRule> {
        self.entries
            .iter()
            .find(|(r, _)| r == raw)
            .map(|(_, rule)| rule)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelRule)> {
        self.entries.iter().map(|(raw, rule)| (raw.as_str(), rule))
    }
}

/// Reads a label map JSON file.
pub fn read_label_map(path: &Path) -> Result<LabelMap, CamtrapError> {
    let text = fs::read_to_string(path)?;
    LabelMap::from_json_str(&text).map_err(|message| CamtrapError::LabelMapParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Result of resolving one raw label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Export under `name` with 1-based class id `id`.
    Class { name: &'a str, id: i64 },
    /// The label map excludes this label.
    Excluded,
}

/// Lookup table derived from a [`LabelMap`] for the duration of one export.
#[derive(Clone, Debug)]
pub struct LabelResolver {
    labels: Vec<String>,
    lookup: HashMap<String, Option<usize>>,
}

impl LabelResolver {
    pub fn new(map: &LabelMap) -> Self {
        let mut labels: Vec<String> = Vec::new();
        let mut lookup = HashMap::with_capacity(map.len());

        for (raw, rule) in map.iter() {
            let resolved = match rule {
                LabelRule::Exclude => None,
                LabelRule::Keep => Some(raw),
                LabelRule::Rename(name) => Some(name.as_str()),
            };
            let index = resolved.map(|name| match labels.iter().position(|l| l == name) {
                Some(index) => index,
                None => {
                    labels.push(name.to_string());
                    labels.len() - 1
                }
            });
            lookup.insert(raw.to_string(), index);
        }

        Self { labels, lookup }
    }

    /// Resolves a raw label; `None` means the label is not in the map at all.
    pub fn resolve(&self, raw: &str) -> Option<Resolution<'_>> {
        self.lookup.get(raw).map(|index| match index {
            Some(index) => Resolution::Class {
                name: &self.labels[*index],
                id: *index as i64 + 1,
            },
            None => Resolution::Excluded,
        })
    }

    /// Distinct export labels; the class id of `labels()[i]` is `i + 1`.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Renders labels in the object-detection `label_map.pbtxt` item format.
pub fn to_pbtxt_string(labels: &[String]) -> String {
    let mut out = String::new();
    for (index, label) in labels.iter().enumerate() {
        let escaped = label.replace('\\', "\\\\").replace('"', "\\\"");
        // Writing into a String cannot fail.
        let _ = write!(out, "item {{\n name: \"{escaped}\"\n id: {}\n}}\n", index + 1);
    }
    out
}
