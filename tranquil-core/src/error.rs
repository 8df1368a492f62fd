//! Error types for DSP construction.

use thiserror::Error;

/// Result type for synthesis primitives.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors raised while building buffers or primitives.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthError {
    /// The host cannot provide what the synthesizer needs (bad rate, no memory).
    #[error("unsupported audio environment: {reason}")]
    UnsupportedAudioEnvironment {
        /// What was missing.
        reason: String,
    },

    /// Requested buffer length is not a positive, finite number of seconds.
    #[error("invalid buffer duration: {seconds} seconds")]
    InvalidDuration {
        /// The rejected duration.
        seconds: f32,
    },
}

impl SynthError {
    /// Creates an unsupported-environment error.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedAudioEnvironment { reason: reason.into() }
    }
}
