use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrnuError {
    #[error("Image encoding error: {0}")]
    ImageSave(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Reference policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    #[error("No usable reference residuals ({attempted} file(s) attempted, all failed)")]
    NoUsableResiduals { attempted: usize },

    #[error(
        "Test residual ({test_height}x{test_width}) is smaller than the fingerprint ({fingerprint_height}x{fingerprint_width})"
    )]
    ShapeMismatch {
        test_height: usize,
        test_width: usize,
        fingerprint_height: usize,
        fingerprint_width: usize,
    },

    #[error("Report serialization error: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl PrnuError {
    /// Per-file failures the fingerprint builder may skip over.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PrnuError::Decode { .. } | PrnuError::DegenerateInput(_) | PrnuError::Io(_)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Insufficient reference files: found {found}, need at least {required} {extension} images")]
    InsufficientReferences {
        found: usize,
        required: usize,
        extension: String,
    },

    #[error("Invalid file extension (not {expected}): {}", path.display())]
    InvalidExtension { path: PathBuf, expected: String },
}

pub type Result<T> = std::result::Result<T, PrnuError>;
