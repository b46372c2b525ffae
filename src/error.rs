//! Error taxonomy for the segmentation stages

use thiserror::Error;

/// Failure of a pipeline stage. Any error aborts the whole run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    /// Missing or malformed required fields, or an empty dataset
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Population too small for the requested stage
    #[error("insufficient data for {stage}: need at least {required} customers, got {actual}")]
    InsufficientData {
        stage: &'static str,
        required: usize,
        actual: usize,
    },

    /// Invalid cluster-count range or other bad parameter
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The k-means primitive rejected the data or parameters
    #[error("clustering failed: {0}")]
    Clustering(String),
}

pub type SegmentationResult<T> = std::result::Result<T, SegmentationError>;
