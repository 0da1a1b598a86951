/// Sheet-level recovery failures. A sheet that fails here is excluded from
/// extraction and scoring; other sheets are unaffected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("no anchors detected")]
    NoAnchors,
    #[error("ambiguous anchors: {unrecognized} unrecognized payloads")]
    AmbiguousAnchors { unrecognized: usize },
    #[error("insufficient anchors: {found} resolved, at least 2 needed")]
    InsufficientAnchors { found: usize, code: Option<String> },
    #[error("conflicting sheet codes in anchors: {codes:?}")]
    ConflictingCodes { codes: Vec<String> },
    #[error("anchor correspondences are degenerate")]
    DegenerateCorrespondences { code: String },
    #[error("scan is {got_width}x{got_height}, canvas is {width}x{height}")]
    ScanSize {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
}

impl RecoveryError {
    /// Sheet code, when the anchors carried one before the failure.
    pub fn code(&self) -> Option<&str> {
        match self {
            RecoveryError::InsufficientAnchors { code, .. } => code.as_deref(),
            RecoveryError::DegenerateCorrespondences { code } => Some(code),
            _ => None,
        }
    }
}
