//! End-to-end processing of scanned sheets: recovery, extraction, recognition.

use crate::core::{AnswerTable, LayoutReference, TableError};
use crate::error::{PipelineError, SheetError};
use crate::io::{PipelineParams, ReadReport, SheetFailure, SheetRecord, SheetSetConfig};
use crate::reader::{Classifier, PatchModel, RecognizedSheet, RegionExtractor, SheetReader};
use crate::recovery::{AnchorDecoder, QrAnchorDecoder, RectifiedSheet, Rectifier};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Result of one sheet that went through every stage.
#[derive(Clone, Debug)]
pub struct ProcessedSheet {
    pub rectified: RectifiedSheet,
    pub recognized: RecognizedSheet,
}

impl ProcessedSheet {
    #[inline]
    pub fn code(&self) -> &str {
        &self.recognized.code
    }
}

/// Answer table and report of a batch.
#[derive(Clone, Debug)]
pub struct ReadOutcome {
    pub answers: AnswerTable,
    pub report: ReadReport,
}

/// Immutable per-set pipeline; safe to share across worker threads.
pub struct SheetPipeline {
    layout: Arc<LayoutReference>,
    rectifier: Rectifier,
    reader: SheetReader,
}

impl SheetPipeline {
    /// Pipeline with the QR anchor decoder; `model` is needed for the model classifier.
    pub fn new(
        layout: Arc<LayoutReference>,
        params: &PipelineParams,
        model: Option<Arc<dyn PatchModel>>,
    ) -> Result<Self, PipelineError> {
        Self::with_decoder(layout, params, model, Box::new(QrAnchorDecoder))
    }

    pub fn with_decoder(
        layout: Arc<LayoutReference>,
        params: &PipelineParams,
        model: Option<Arc<dyn PatchModel>>,
        decoder: Box<dyn AnchorDecoder>,
    ) -> Result<Self, PipelineError> {
        let classifier = Classifier::from_kind(params.classifier, model)?;
        let rectifier = Rectifier::with_decoder(layout.clone(), params.rectifier.clone(), decoder);
        let reader = SheetReader::new(
            layout.clone(),
            RegionExtractor::new(params.extractor.clone()),
            classifier,
        );
        Ok(Self {
            layout,
            rectifier,
            reader,
        })
    }

    #[inline]
    pub fn layout(&self) -> &LayoutReference {
        &self.layout
    }

    /// Rectify, extract and classify one scan.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, scan), fields(width = scan.width(), height = scan.height()))
    )]
    pub fn process_sheet(&self, scan: &image::GrayImage) -> Result<ProcessedSheet, SheetError> {
        let rectified = self.rectifier.rectify(scan)?;
        let recognized = self.reader.read(&rectified.code, &rectified.image.view())?;
        Ok(ProcessedSheet {
            rectified,
            recognized,
        })
    }

    /// Load a scan from disk and process it.
    pub fn process_file(&self, path: &Path) -> Result<ProcessedSheet, SheetError> {
        let scan = image::open(path)?.to_luma8();
        log::debug!(
            "{}: {}x{} scan",
            path.display(),
            scan.width(),
            scan.height()
        );
        self.process_sheet(&scan)
    }

    /// Process every scan; results keep the input order.
    pub fn process_batch<P>(&self, paths: &[P]) -> Vec<Result<ProcessedSheet, SheetError>>
    where
        P: AsRef<Path> + Sync,
    {
        #[cfg(feature = "rayon")]
        let results = paths
            .par_iter()
            .map(|p| self.process_file(p.as_ref()))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let results = paths.iter().map(|p| self.process_file(p.as_ref())).collect();
        results
    }

    /// Fold per-sheet results into the answer table and the read report.
    ///
    /// Failed sheets are excluded from the table; a repeated sheet code keeps
    /// the first sheet.
    pub fn collect<P: AsRef<Path>>(
        &self,
        sources: &[P],
        results: Vec<Result<ProcessedSheet, SheetError>>,
    ) -> ReadOutcome {
        let mut answers = AnswerTable::new(self.layout.column_names());
        let mut report = ReadReport::default();

        for (source, result) in sources.iter().zip(results) {
            let source = source.as_ref().display().to_string();
            match result {
                Ok(sheet) => {
                    let code = sheet.code().to_string();
                    match answers.insert_row(code.clone(), sheet.recognized.answers()) {
                        Ok(()) => report.sheets.push(SheetRecord {
                            source,
                            warnings: sheet.rectified.warnings,
                            sheet: sheet.recognized,
                        }),
                        Err(err @ TableError::DuplicateRow(_)) => {
                            log::warn!("{source}: {err}; keeping the first sheet");
                            report.failures.push(SheetFailure {
                                source,
                                code: Some(code),
                                error: err.to_string(),
                            });
                        }
                        Err(err) => {
                            log::error!("{source}: {err}");
                            report.failures.push(SheetFailure {
                                source,
                                code: Some(code),
                                error: err.to_string(),
                            });
                        }
                    }
                }
                Err(err) => {
                    log::error!("{source}: {err}");
                    report.failures.push(SheetFailure {
                        code: err.code().map(str::to_string),
                        source,
                        error: err.to_string(),
                    });
                }
            }
        }

        log::info!(
            "{} sheets read, {} excluded",
            report.sheets.len(),
            report.failures.len()
        );
        ReadOutcome { answers, report }
    }
}

/// Run the `read` stage of a config: scans → answer table and report on disk.
pub fn run_read(
    config: &SheetSetConfig,
    model: Option<Arc<dyn PatchModel>>,
) -> Result<ReadOutcome, PipelineError> {
    let layout = Arc::new(LayoutReference::load_json(&config.layout_path)?);
    let pipeline = SheetPipeline::new(layout, &config.params, model)?;

    let results = pipeline.process_batch(&config.scans);
    let outcome = pipeline.collect(&config.scans, results);

    outcome.answers.write_json(config.answers_path())?;
    outcome.report.write_json(config.report_path())?;
    Ok(outcome)
}
