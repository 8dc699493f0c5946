//! Error types for mastering runs

use rm_core::CoreError;
use thiserror::Error;

use crate::events::Stage;

/// Failure class of a mastering run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, unreadable or undecodable input
    Input,
    /// Parameters out of range or inconsistent
    Parameter,
    /// Encoding, writing, tagging or hashing the output
    Export,
    /// A stage could not rebuild its buffer
    Processing,
    /// Stopped between stages on request
    Cancelled,
}

/// Mastering errors
#[derive(Error, Debug)]
pub enum MasterError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Failed to write output file: {0}")]
    Write(String),

    #[error("Stage {stage} failed: {source}")]
    Processing {
        stage: Stage,
        #[source]
        source: CoreError,
    },

    #[error("Job cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer shape rejected while loading
    #[error("Buffer error: {0}")]
    Buffer(#[from] CoreError),
}

impl MasterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound(_) | Self::Decode(_) | Self::Buffer(_) => ErrorKind::Input,
            Self::InvalidParameter(_) => ErrorKind::Parameter,
            Self::UnsupportedFormat(_) | Self::Encode(_) | Self::Write(_) | Self::Io(_) => {
                ErrorKind::Export
            }
            Self::Processing { .. } => ErrorKind::Processing,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Attribute a buffer error raised after loading to `stage`
    pub fn processing(stage: Stage) -> impl FnOnce(CoreError) -> Self {
        move |source| Self::Processing { stage, source }
    }
}

/// Result type for mastering operations
pub type MasterResult<T> = Result<T, MasterError>;
