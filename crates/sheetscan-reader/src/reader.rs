use crate::classifier::{Classifier, ClassifyError, QuestionLabels};
use crate::extract::{ExtractionWarning, RegionExtractor};
use serde::{Deserialize, Serialize};
use sheetscan_core::{GrayImageView, LayoutReference};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Recognition output of one question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionReading {
    /// Table column, e.g. `S1Q2`.
    pub column: String,
    #[serde(flatten)]
    pub labels: QuestionLabels,
}

/// Everything read from one rectified sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognizedSheet {
    pub code: String,
    pub questions: Vec<QuestionReading>,
    pub warnings: Vec<ExtractionWarning>,
}

impl RecognizedSheet {
    /// Answer strings in column order.
    pub fn answers(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.labels.answer.clone()).collect()
    }
}

/// Extracts and classifies every cell of a rectified sheet.
#[derive(Clone, Debug)]
pub struct SheetReader {
    layout: Arc<LayoutReference>,
    extractor: RegionExtractor,
    classifier: Classifier,
}

impl SheetReader {
    pub fn new(layout: Arc<LayoutReference>, extractor: RegionExtractor, classifier: Classifier) -> Self {
        Self {
            layout,
            extractor,
            classifier,
        }
    }

    #[inline]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Read all questions of sheet `code` from its rectified image.
    ///
    /// Cell extraction failures become warnings and blank labels; only a
    /// classifier failure aborts the sheet.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(code = %code))
    )]
    pub fn read(&self, code: &str, image: &GrayImageView<'_>) -> Result<RecognizedSheet, ClassifyError> {
        let mut questions = Vec::with_capacity(self.layout.question_count());
        let mut warnings = Vec::new();

        for (id, _) in self.layout.questions() {
            let cells = self.layout.question_cells(id);
            let patches = self.extractor.extract_cells(image, &cells);

            for (cell, patch) in cells.iter().zip(&patches) {
                if let Err(failure) = patch {
                    let warning = ExtractionWarning {
                        code: code.to_string(),
                        section: cell.section,
                        question: cell.question,
                        cell: cell.index,
                        failure: failure.clone(),
                    };
                    log::warn!("{warning}");
                    warnings.push(warning);
                }
            }

            let refs: Vec<_> = patches.iter().map(|p| p.as_ref().ok()).collect();
            let labels = self.classifier.classify_question(&refs)?;
            questions.push(QuestionReading {
                column: id.column_name(),
                labels,
            });
        }

        log::debug!(
            "sheet {code}: {} questions read, {} cell warnings",
            questions.len(),
            warnings.len()
        );

        Ok(RecognizedSheet {
            code: code.to_string(),
            questions,
            warnings,
        })
    }
}
