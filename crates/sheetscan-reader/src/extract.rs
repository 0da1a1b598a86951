//! Per-cell patch extraction.
//!
//! For every cell the printed border is re-located inside a search window
//! around the nominal box, the interior is cropped, and the crop is
//! normalized into a fixed-size patch with ink bright and paper dark.

use crate::contour::{select_enclosing, trace_contours};
use crate::threshold::binarize_otsu;
use serde::{Deserialize, Serialize};
use sheetscan_core::{Cell, GrayImage, GrayImageView};
use std::fmt;

/// Side of the square patches fed to the classifier.
pub const PATCH_SIZE: usize = 32;

/// Extraction settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorParams {
    /// Search window margin, in stroke thicknesses.
    pub search_factor: i64,
    /// Inward shrink of the located border, in stroke thicknesses.
    pub shrink_factor: i64,
    /// Output patch side.
    pub patch_size: usize,
    /// Paper value used to pad non-square crops before inversion, so the
    /// padding reads as blank.
    pub pad_value: u8,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            search_factor: 3,
            shrink_factor: 2,
            patch_size: PATCH_SIZE,
            pad_value: 255,
        }
    }
}

/// Normalized square patch, row-major, values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedPatch {
    pub size: usize,
    pub data: Vec<f32>,
}

impl ExtractedPatch {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.size + x]
    }

    /// Total intensity.
    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f32
        }
    }
}

/// Why a cell produced no patch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailure {
    #[error("search window lies outside the image")]
    EmptySearchWindow,
    #[error("no contour encloses the nominal area {nominal_area}")]
    NoEnclosingContour { nominal_area: i64 },
    #[error("interior is empty after shrinking the located border")]
    EmptyInterior,
}

/// A cell-level extraction failure with the identifying context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub code: String,
    pub section: usize,
    pub question: usize,
    pub cell: usize,
    pub failure: ExtractionFailure,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sheet {} S{}Q{} cell {}: {}",
            self.code,
            self.section + 1,
            self.question + 1,
            self.cell + 1,
            self.failure
        )
    }
}

/// Locates printed cells and turns their interiors into classifier patches.
#[derive(Clone, Debug, Default)]
pub struct RegionExtractor {
    params: ExtractorParams,
}

impl RegionExtractor {
    pub fn new(params: ExtractorParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &ExtractorParams {
        &self.params
    }

    /// Extract the patch of one cell from a rectified sheet.
    pub fn extract_cell(
        &self,
        image: &GrayImageView<'_>,
        cell: &Cell,
    ) -> Result<ExtractedPatch, ExtractionFailure> {
        let t = cell.thickness;
        let window = cell
            .bounds
            .rect()
            .inflate(self.params.search_factor * t)
            .clamp_to(image.width, image.height);
        if window.is_empty() {
            return Err(ExtractionFailure::EmptySearchWindow);
        }
        let roi = image.crop(window);

        let (threshold, mask) = binarize_otsu(&roi);
        let contours = trace_contours(&mask);
        let nominal_area = cell.nominal_area();
        let Some(border) = select_enclosing(&contours, nominal_area as f64) else {
            return Err(ExtractionFailure::NoEnclosingContour { nominal_area });
        };
        log::debug!(
            "S{}Q{} cell {}: otsu {threshold}, {} contours, border {:?} (area {:.0})",
            cell.section + 1,
            cell.question + 1,
            cell.index + 1,
            contours.len(),
            border.bounds,
            border.area
        );

        let interior = border.bounds.inflate(-self.params.shrink_factor * t);
        if interior.is_empty() {
            return Err(ExtractionFailure::EmptyInterior);
        }
        let crop = roi.view().crop(interior);
        if crop.width == 0 || crop.height == 0 {
            return Err(ExtractionFailure::EmptyInterior);
        }

        Ok(normalize_patch(&crop, &self.params))
    }

    /// Extract every cell independently; failures never affect siblings.
    pub fn extract_cells(
        &self,
        image: &GrayImageView<'_>,
        cells: &[Cell],
    ) -> Vec<Result<ExtractedPatch, ExtractionFailure>> {
        cells.iter().map(|c| self.extract_cell(image, c)).collect()
    }
}

/// Erode, pad to square, invert and area-resize a cropped interior.
pub fn normalize_patch(crop: &GrayImage, params: &ExtractorParams) -> ExtractedPatch {
    let square = pad_to_square(&erode_2x2(crop), params.pad_value);
    let inverted = GrayImage {
        width: square.width,
        height: square.height,
        data: square.data.iter().map(|&v| 255 - v).collect(),
    };
    let size = params.patch_size.max(1);
    let data = resize_area(&inverted, size)
        .into_iter()
        .map(|v| (v / 255.0).clamp(0.0, 1.0))
        .collect();
    ExtractedPatch { size, data }
}

/// Minimum over the 2×2 window ending at each pixel; taps outside the image are ignored.
fn erode_2x2(src: &GrayImage) -> GrayImage {
    let mut out = src.clone();
    for y in 0..src.height {
        for x in 0..src.width {
            let mut v = src.get(x, y);
            if x > 0 {
                v = v.min(src.get(x - 1, y));
            }
            if y > 0 {
                v = v.min(src.get(x, y - 1));
                if x > 0 {
                    v = v.min(src.get(x - 1, y - 1));
                }
            }
            out.set(x, y, v);
        }
    }
    out
}

/// Pad the shorter axis on both sides (extra pixel after) to make the image square.
fn pad_to_square(src: &GrayImage, value: u8) -> GrayImage {
    let side = src.width.max(src.height);
    let off_x = (side - src.width) / 2;
    let off_y = (side - src.height) / 2;
    let mut out = GrayImage::filled(side, side, value);
    for y in 0..src.height {
        for x in 0..src.width {
            out.set(x + off_x, y + off_y, src.get(x, y));
        }
    }
    out
}

/// Per-axis overlap weights of output bins over input pixels.
fn area_weights(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|o| {
            let start = o as f64 * scale;
            let end = start + scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            (first..last)
                .filter_map(|i| {
                    let overlap = (end.min(i as f64 + 1.0) - start.max(i as f64)).max(0.0);
                    (overlap > 0.0).then_some((i, (overlap / scale) as f32))
                })
                .collect()
        })
        .collect()
}

/// Resize a square image to `size × size` by averaging covered source area.
fn resize_area(src: &GrayImage, size: usize) -> Vec<f32> {
    let wx = area_weights(src.width, size);
    let wy = area_weights(src.height, size);
    let mut out = Vec::with_capacity(size * size);
    for row in &wy {
        for col in &wx {
            let mut acc = 0f32;
            for &(y, ky) in row {
                for &(x, kx) in col {
                    acc += ky * kx * src.get(x, y) as f32;
                }
            }
            out.push(acc);
        }
    }
    out
}
