//! Per-source pixel masks.
//!
//! Camera traps often capture things that must not leave the project, such
//! as a neighbouring house or a timestamp banner burned into the frame. A
//! [`Mask`] blanks those fixed regions before an image is exported. Masks are
//! keyed by camera id in a [`MaskSet`].

use std::collections::BTreeMap;
use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::error::CamtrapError;

const MASK_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// A binary keep/blank mask: `1` keeps a pixel, `0` blanks all three channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    /// Builds a mask from row-major values; any non-zero value means keep.
    ///
    /// Returns `None` when `values` does not hold exactly `width * height` entries.
    pub fn new(width: u32, height: u32, values: &[u8]) -> Option<Self> {
        if values.len() as u64 != u64::from(width) * u64::from(height) {
            return None;
        }
        Some(Self {
            width,
            height,
            data: values.iter().map(|&v| u8::from(v != 0)).collect(),
        })
    }

    /// Builds a mask from a greyscale image; black pixels blank, others keep.
    pub fn from_luma(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().iter().map(|&v| u8::from(v != 0)).collect(),
        }
    }

    /// Loads a mask from an image file.
    pub fn load(path: &Path) -> Result<Self, CamtrapError> {
        let image = image::open(path).map_err(|source| CamtrapError::MaskLoad {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;
        Ok(Self::from_luma(&image.to_luma8()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Multiplies every channel of `image` by the mask value at that pixel.
    ///
    /// The caller must have checked that dimensions match.
    fn apply_in_place(&self, image: &mut RgbImage) {
        for (pixel, &keep) in image.chunks_exact_mut(3).zip(&self.data) {
            for channel in pixel {
                *channel *= keep;
            }
        }
    }
}

/// Masks keyed by camera / source id.
#[derive(Clone, Debug, Default)]
pub struct MaskSet {
    masks: BTreeMap<String, Mask>,
}

impl MaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, mask: Mask) {
        self.masks.insert(source.into(), mask);
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Returns the mask for `source`, if that source has one.
    pub fn for_source(&self, source: Option<&str>) -> Option<&Mask> {
        source.and_then(|s| self.masks.get(s))
    }

    /// Loads every mask image in `dir`; each file stem is a camera id.
    pub fn load_dir(dir: &Path) -> Result<Self, CamtrapError> {
        let mut set = Self::new();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_mask_extension(path))
            .collect();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let mask = Mask::load(&path)?;
            tracing::debug!(source = stem, width = mask.width, height = mask.height, "loaded mask");
            set.insert(stem, mask);
        }
        Ok(set)
    }
}

fn has_mask_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MASK_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

/// Applies `mask` to `image`, or passes the image through when there is no mask.
///
/// `source` and `example` only label the error when the dimensions differ.
pub fn apply(
    image: RgbImage,
    mask: Option<&Mask>,
    source: &str,
    example: &str,
) -> Result<RgbImage, CamtrapError> {
    let Some(mask) = mask else {
        return Ok(image);
    };

    if (mask.width, mask.height) != image.dimensions() {
        return Err(CamtrapError::MaskDimensionMismatch {
            source_id: source.to_string(),
            example: example.to_string(),
            mask_width: mask.width,
            mask_height: mask.height,
            image_width: image.width(),
            image_height: image.height(),
        });
    }

    let mut image = image;
    mask.apply_in_place(&mut image);
    Ok(image)
}
