//! Error types for core buffer handling

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannels(usize),

    #[error("Channel length mismatch: channel 0 has {expected} frames, channel {channel} has {actual}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
