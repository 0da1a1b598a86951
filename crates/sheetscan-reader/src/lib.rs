//! Answer-cell reading on rectified sheets.
//!
//! For every cell of the layout the printed border is re-located with an
//! Otsu threshold and contour tracing, the interior is normalized into a
//! 32×32 patch, and a [`Classifier`] turns each question's patches into an
//! answer string. Cells that cannot be located yield the blank label `_` and
//! an [`ExtractionWarning`]; they never abort the sheet.

mod classifier;
mod contour;
mod extract;
mod reader;
mod threshold;

pub use classifier::{
    argmax_label, rounded_brightness, ClassificationResult, Classifier, ClassifierKind,
    ClassifyError, PatchModel, QuestionLabels,
};
pub use contour::{bounding_rect, polygon_area, select_enclosing, trace_contours, TracedContour};
pub use extract::{
    normalize_patch, ExtractedPatch, ExtractionFailure, ExtractionWarning, ExtractorParams,
    RegionExtractor, PATCH_SIZE,
};
pub use reader::{QuestionReading, RecognizedSheet, SheetReader};
