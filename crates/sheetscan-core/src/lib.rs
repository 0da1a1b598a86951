//! Core types and utilities for printed answer-sheet recovery.
//!
//! This crate is small and purely geometric: gray image buffers, affine
//! estimation and warping, the validated sheet layout, and the per-sheet
//! answer/score tables. It does not decode images or QR symbols.

mod affine;
mod image;
pub mod io;
mod layout;
mod logger;
mod records;

pub use affine::{affine_from_3pt, triangle_area2, warp_affine_gray, Affine, MIN_TRIANGLE_AREA2};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView, PixelRect};
pub use io::JsonIoError;
pub use layout::{
    AnchorPosition, BoxCorners, Canvas, Cell, LayoutDocument, LayoutError, LayoutLoadError,
    LayoutReference, QuestionId, QuestionLayout, QuestionMetadata, SectionLayout,
};
pub use records::{AnswerTable, CodeTable, ScoreTable, TableError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

/// Label alphabet produced by the classifier; `_` is the blank sentinel.
pub const LABELS: &str = "ABCDEFGHIJKLM_";

/// Label for "no answer": an unmarked cell or a cell that could not be extracted.
pub const BLANK_LABEL: char = '_';

/// Most answer options a question can have: every label except the blank.
pub const MAX_OPTIONS: usize = LABELS.len() - 1;

/// Label of the option at `index` (`0 → 'A'`), or `None` past [`MAX_OPTIONS`].
pub fn option_label(index: usize) -> Option<char> {
    LABELS.chars().filter(|&c| c != BLANK_LABEL).nth(index)
}
