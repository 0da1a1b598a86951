//! Mark classification.
//!
//! Two interchangeable variants produce labels from the alphabet
//! `ABCDEFGHIJKLM_`: an externally supplied patch model (one label per cell)
//! and a brightness heuristic for single-answer questions (one label per
//! question). The variant is chosen from configuration.

use crate::extract::ExtractedPatch;
use serde::{Deserialize, Serialize};
use sheetscan_core::{option_label, BLANK_LABEL, LABELS, MAX_OPTIONS};
use std::fmt;
use std::sync::Arc;

/// Label and its confidence in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: char,
    pub confidence: f32,
}

impl ClassificationResult {
    /// "No answer" with zero confidence.
    pub const fn blank() -> Self {
        Self {
            label: BLANK_LABEL,
            confidence: 0.0,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("patch model failed: {0}")]
    Model(String),
    #[error("patch model returned {got} probability vectors for {expected} patches")]
    BatchSize { expected: usize, got: usize },
    #[error("probability vector has {got} entries, expected {expected}")]
    ProbabilityLength { expected: usize, got: usize },
    #[error("classifier `model` selected but no patch model was supplied")]
    ModelMissing,
    #[error("question has {cells} cells, at most {max} can be labelled")]
    TooManyOptions { cells: usize, max: usize },
}

/// Inference over a batch of patches.
///
/// Implementations return one probability vector per patch, in order, each
/// covering the label alphabet in order.
pub trait PatchModel: Send + Sync {
    fn predict(&self, batch: &[&ExtractedPatch]) -> Result<Vec<Vec<f32>>, ClassifyError>;
}

/// Configured classifier variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Per-cell labels from a [`PatchModel`].
    Model,
    /// The brightest cell of a question is its answer.
    #[default]
    Brightness,
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClassifierKind::Model => "model",
            ClassifierKind::Brightness => "brightness",
        })
    }
}

/// Labels produced for one question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionLabels {
    /// Answer string: one label per cell (model) or a single label (brightness).
    pub answer: String,
    /// Per-cell results; `None` for cells that failed extraction.
    pub cells: Vec<Option<ClassificationResult>>,
    /// Rounded per-cell brightness, brightness variant only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brightness: Vec<f32>,
    /// Confidence of the selected option, brightness variant only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Clone)]
pub enum Classifier {
    Model(Arc<dyn PatchModel>),
    Brightness,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classifier::Model(_) => f.write_str("Classifier::Model(..)"),
            Classifier::Brightness => f.write_str("Classifier::Brightness"),
        }
    }
}

impl Classifier {
    /// Build the configured variant; `model` is required for [`ClassifierKind::Model`].
    pub fn from_kind(
        kind: ClassifierKind,
        model: Option<Arc<dyn PatchModel>>,
    ) -> Result<Self, ClassifyError> {
        match kind {
            ClassifierKind::Model => model.map(Classifier::Model).ok_or(ClassifyError::ModelMissing),
            ClassifierKind::Brightness => Ok(Classifier::Brightness),
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::Model(_) => ClassifierKind::Model,
            Classifier::Brightness => ClassifierKind::Brightness,
        }
    }

    /// Classify the cells of one question; `None` marks a failed extraction.
    pub fn classify_question(
        &self,
        patches: &[Option<&ExtractedPatch>],
    ) -> Result<QuestionLabels, ClassifyError> {
        if patches.len() > MAX_OPTIONS {
            return Err(ClassifyError::TooManyOptions {
                cells: patches.len(),
                max: MAX_OPTIONS,
            });
        }
        match self {
            Classifier::Model(model) => classify_with_model(model.as_ref(), patches),
            Classifier::Brightness => Ok(classify_by_brightness(patches)),
        }
    }
}

/// Arg-max label of a probability vector over [`LABELS`].
pub fn argmax_label(probs: &[f32]) -> Result<ClassificationResult, ClassifyError> {
    let expected = LABELS.chars().count();
    if probs.len() != expected {
        return Err(ClassifyError::ProbabilityLength {
            expected,
            got: probs.len(),
        });
    }
    let (best, p) = probs
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |acc, (i, p)| {
            if p > acc.1 {
                (i, p)
            } else {
                acc
            }
        });
    let label = LABELS.chars().nth(best).unwrap_or(BLANK_LABEL);
    Ok(ClassificationResult {
        label,
        confidence: p.clamp(0.0, 1.0),
    })
}

fn classify_with_model(
    model: &dyn PatchModel,
    patches: &[Option<&ExtractedPatch>],
) -> Result<QuestionLabels, ClassifyError> {
    let batch: Vec<&ExtractedPatch> = patches.iter().flatten().copied().collect();
    let probs = if batch.is_empty() {
        Vec::new()
    } else {
        model.predict(&batch)?
    };
    if probs.len() != batch.len() {
        return Err(ClassifyError::BatchSize {
            expected: batch.len(),
            got: probs.len(),
        });
    }

    let mut labels = probs
        .iter()
        .map(|p| argmax_label(p))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let cells: Vec<Option<ClassificationResult>> = patches
        .iter()
        .map(|patch| patch.and_then(|_| labels.next()))
        .collect();
    let answer = cells
        .iter()
        .map(|c| c.map_or(BLANK_LABEL, |r| r.label))
        .collect();

    Ok(QuestionLabels {
        answer,
        cells,
        brightness: Vec::new(),
        confidence: None,
    })
}

/// Patch brightness rounded to the nearest ten (ties to even).
pub fn rounded_brightness(patch: &ExtractedPatch) -> f32 {
    ((patch.sum() as f64 / 10.0).round_ties_even() * 10.0) as f32
}

fn classify_by_brightness(patches: &[Option<&ExtractedPatch>]) -> QuestionLabels {
    let brightness: Vec<f32> = patches
        .iter()
        .map(|p| p.map(rounded_brightness).unwrap_or(0.0))
        .collect();

    // first maximum wins
    let mut best: Option<(usize, f32)> = None;
    for (i, &b) in brightness.iter().enumerate() {
        if best.is_none_or(|(_, bb)| b > bb) {
            best = Some((i, b));
        }
    }
    let total: f32 = brightness.iter().sum();

    let selected = match best {
        Some((i, b)) if b > 0.0 => {
            ClassificationResult {
                label: option_label(i).unwrap_or(BLANK_LABEL),
                confidence: if total > 0.0 { b / total } else { 0.0 },
            }
        }
        _ => ClassificationResult::blank(),
    };

    let cells = patches
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.map(|_| ClassificationResult {
                label: option_label(i).unwrap_or(BLANK_LABEL),
                confidence: if total > 0.0 { brightness[i] / total } else { 0.0 },
            })
        })
        .collect();

    QuestionLabels {
        answer: selected.label.to_string(),
        cells,
        brightness,
        confidence: Some(selected.confidence),
    }
}
