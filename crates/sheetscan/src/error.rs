use crate::core::{JsonIoError, LayoutLoadError};
use crate::grading::ConfigurationError;
use crate::reader::ClassifyError;
use crate::recovery::RecoveryError;

/// Set-level failures: nothing is produced.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("layout: {0}")]
    Layout(#[from] LayoutLoadError),
    #[error(transparent)]
    Io(#[from] JsonIoError),
    #[error(transparent)]
    Classifier(#[from] ClassifyError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Sheet-level failures: the sheet is excluded, the batch continues.
#[derive(thiserror::Error, Debug)]
pub enum SheetError {
    #[cfg(feature = "image")]
    #[error("cannot load scan: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

impl SheetError {
    /// Sheet code, when it was known before the failure.
    pub fn code(&self) -> Option<&str> {
        match self {
            SheetError::Recovery(err) => err.code(),
            _ => None,
        }
    }
}
