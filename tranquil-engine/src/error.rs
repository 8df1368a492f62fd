//! Error types for the engine.
//!
//! Public playback operations never return these; they are absorbed, logged,
//! and reflected as "not playing". Construction helpers and config loading
//! return them so hosts can decide what to show.

use thiserror::Error;
use tranquil_core::SynthError;

use crate::graph::GraphId;

/// Result type for engine construction and configuration.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while building or driving audio graphs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No audio output capability; raised once, never retried.
    #[error("unsupported audio environment: {reason}")]
    UnsupportedAudioEnvironment {
        /// What was missing.
        reason: String,
    },

    /// A node could not be created mid-build; the partial graph was torn down.
    #[error("failed to build graph for '{sound}': {reason}")]
    GraphConstructionFailure {
        /// Sound id being built.
        sound: String,
        /// Underlying cause.
        reason: String,
    },

    /// A transient fired for a graph that is no longer active. Indicates a
    /// lifecycle bug; never audible.
    #[error("transient scheduled for stale graph {graph}")]
    StaleScheduleFired {
        /// Graph the event was scheduled for.
        graph: GraphId,
    },

    /// Sound identifier outside the preset list.
    #[error("unknown sound id '{id}'")]
    UnknownSound {
        /// The rejected identifier.
        id: String,
    },

    /// Invalid configuration value.
    #[error("invalid config '{field}': {message}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Audio device / stream error.
    #[cfg(feature = "realtime")]
    #[error("audio device error: {0}")]
    Device(String),
}

impl EngineError {
    /// Creates an unsupported-environment error.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedAudioEnvironment { reason: reason.into() }
    }

    /// Creates a graph construction error.
    pub fn construction(sound: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GraphConstructionFailure { sound: sound.into(), reason: reason.into() }
    }

    /// Creates an invalid config error.
    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig { field, message: message.into() }
    }

    /// True when the failure means "no audio here, stop trying".
    pub fn is_environment(&self) -> bool {
        matches!(self, Self::UnsupportedAudioEnvironment { .. })
    }

    /// Lift a synthesis error raised while building `sound`.
    pub fn from_synth(sound: impl Into<String>, err: SynthError) -> Self {
        match err {
            SynthError::UnsupportedAudioEnvironment { reason } => Self::UnsupportedAudioEnvironment { reason },
            other => Self::construction(sound, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synth_errors_map_by_kind() {
        let env = EngineError::from_synth("forest", SynthError::unsupported("no memory"));
        assert!(env.is_environment());

        let build = EngineError::from_synth("forest", SynthError::InvalidDuration { seconds: 0.0 });
        assert!(matches!(build, EngineError::GraphConstructionFailure { ref sound, .. } if sound == "forest"));
        assert!(build.to_string().contains("forest"));
    }
}
