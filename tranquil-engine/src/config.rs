//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! Volumes are clamped on use, never rejected. Frequencies and durations are
//! validated.

use serde::Deserialize;
use tranquil_core::dsp::clamp01;

use crate::error::{EngineError, EngineResult};

/// Shortest noise loop accepted from a config file. Shorter loops repeat
/// often enough for the seam to become audible.
pub const MIN_NOISE_SECONDS: f32 = 2.0;

/// Ambient (soundscape) engine settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmbientConfig {
    /// Length of each generated noise loop, at least [`MIN_NOISE_SECONDS`].
    pub noise_seconds: f32,
    /// Pause between tearing down the old graph and building the new one.
    pub settle_ms: u64,
    /// Initial master volume in [0, 1].
    pub volume: f32,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self { noise_seconds: 2.0, settle_ms: 100, volume: 0.5 }
    }
}

impl AmbientConfig {
    /// # Errors
    /// `InvalidConfig` for a noise loop shorter than [`MIN_NOISE_SECONDS`].
    pub fn validate(&self) -> EngineResult<()> {
        if !self.noise_seconds.is_finite() || self.noise_seconds < MIN_NOISE_SECONDS {
            return Err(EngineError::invalid_config(
                "ambient.noise_seconds",
                format!("must be at least {MIN_NOISE_SECONDS} seconds"),
            ));
        }
        Ok(())
    }

    pub fn settle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.settle_ms)
    }
}

/// Binaural beat settings, fixed for the life of an engine.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinauralConfig {
    /// Left-ear carrier in Hz.
    pub base_frequency: f32,
    /// Right ear plays `base_frequency + beat_frequency`.
    pub beat_frequency: f32,
    pub volume: f32,
    pub fade_in_seconds: f32,
    pub fade_out_seconds: f32,
}

impl Default for BinauralConfig {
    fn default() -> Self {
        Self {
            base_frequency: 200.0,
            beat_frequency: 10.0,
            volume: 0.3,
            fade_in_seconds: 2.0,
            fade_out_seconds: 2.0,
        }
    }
}

impl BinauralConfig {
    /// # Errors
    /// `InvalidConfig` for non-finite/non-positive frequencies or negative fades.
    pub fn validate(&self) -> EngineResult<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        let non_negative = |v: f32| v.is_finite() && v >= 0.0;
        if !positive(self.base_frequency) {
            return Err(EngineError::invalid_config("binaural.base_frequency", "must be a positive frequency"));
        }
        if !non_negative(self.beat_frequency) {
            return Err(EngineError::invalid_config("binaural.beat_frequency", "must be zero or positive"));
        }
        if !non_negative(self.fade_in_seconds) {
            return Err(EngineError::invalid_config("binaural.fade_in_seconds", "must be zero or positive"));
        }
        if !non_negative(self.fade_out_seconds) {
            return Err(EngineError::invalid_config("binaural.fade_out_seconds", "must be zero or positive"));
        }
        Ok(())
    }

    /// Volume clamped to [0, 1].
    pub fn clamped_volume(&self) -> f32 {
        clamp01(self.volume)
    }
}

/// Top-level file layout: `[ambient]` and `[binaural]` tables.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Output sample rate used when no device dictates one.
    pub sample_rate: Option<u32>,
    pub ambient: AmbientConfig,
    pub binaural: BinauralConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// `ConfigParse` for malformed TOML, `InvalidConfig` for rejected values.
    pub fn from_toml(text: &str) -> EngineResult<Self> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// `InvalidConfig` when any section is invalid.
    pub fn validate(&self) -> EngineResult<()> {
        if self.sample_rate == Some(0) {
            return Err(EngineError::invalid_config("sample_rate", "must be positive"));
        }
        self.ambient.validate()?;
        self.binaural.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = EngineConfig::from_toml("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.binaural.base_frequency, 200.0);
        assert_eq!(cfg.ambient.settle().as_millis(), 100);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = EngineConfig::from_toml(
            "sample_rate = 44100\n[binaural]\nbeat_frequency = 6.0\nvolume = 4.0\n",
        )
        .unwrap();
        assert_eq!(cfg.sample_rate, Some(44_100));
        assert_eq!(cfg.binaural.beat_frequency, 6.0);
        assert_eq!(cfg.binaural.fade_in_seconds, 2.0);
        assert_eq!(cfg.binaural.clamped_volume(), 1.0);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = EngineConfig::from_toml("[binaural]\nbase_frequency = -5.0\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { field: "binaural.base_frequency", .. }));

        let err = EngineConfig::from_toml("[ambient]\nnoise_seconds = 0.0\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { field: "ambient.noise_seconds", .. }));

        assert!(matches!(
            EngineConfig::from_toml("[ambient]\nnoise_seconds = 1.5\n"),
            Err(EngineError::InvalidConfig { field: "ambient.noise_seconds", .. })
        ));
        let cfg = EngineConfig::from_toml("[ambient]\nnoise_seconds = 2.0\n").unwrap();
        assert_eq!(cfg.ambient.noise_seconds, MIN_NOISE_SECONDS);

        assert!(matches!(
            EngineConfig::from_toml("[ambient]\nbogus = 1\n"),
            Err(EngineError::ConfigParse(_))
        ));
    }
}
