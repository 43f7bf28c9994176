//! Error taxonomy for the Leq(M) loudness engine

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum LeqmError {
    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("channel count mismatch: expected {expected}, got {got}")]
    ChannelCountMismatch { expected: usize, got: usize },

    #[error("decoder failure: {0}")]
    DecoderFailure(String),

    #[error("insufficient data: zero frames decoded")]
    InsufficientData,

    #[error("numeric failure: {0}")]
    NumericFailure(String),

    #[error("cancelled by user")]
    CancelledByUser,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type LeqmResult<T> = Result<T, LeqmError>;

impl LeqmError {
    /// Process exit code per the external interface's exit-code table.
    pub fn exit_code(&self) -> i32 {
        match self {
            LeqmError::UnsupportedSampleRate(_) | LeqmError::ChannelCountMismatch { .. } => 1,
            LeqmError::DecoderFailure(_) => 2,
            LeqmError::InsufficientData
            | LeqmError::NumericFailure(_)
            | LeqmError::CancelledByUser
            | LeqmError::Io(_) => 3,
        }
    }

    /// Short machine-readable kind string for the `{"error": {"kind": ...}}` record.
    pub fn kind(&self) -> &'static str {
        match self {
            LeqmError::UnsupportedSampleRate(_) => "UnsupportedSampleRate",
            LeqmError::ChannelCountMismatch { .. } => "ChannelCountMismatch",
            LeqmError::DecoderFailure(_) => "DecoderFailure",
            LeqmError::InsufficientData => "InsufficientData",
            LeqmError::NumericFailure(_) => "NumericFailure",
            LeqmError::CancelledByUser => "CancelledByUser",
            LeqmError::Io(_) => "Io",
        }
    }
}
