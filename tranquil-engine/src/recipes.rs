//! Soundscape presets.
//!
//! `SoundId` is the wire contract with the UI preset list; the recipe for each
//! id is a plain exhaustive `match`, so adding a sound without a recipe does
//! not compile.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tranquil_core::noise::NoiseKind;

use crate::error::EngineError;
use crate::nodes::Wave;
use crate::shaper::FilterSpec;
use crate::transient::{EventProfile, Pitch};

/// Sound identifiers, spelled exactly as the UI spells them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundId {
    /// Silence; has no recipe.
    #[default]
    None,
    LightRain,
    Forest,
    OceanWaves,
    BusyCafe,
    AmbientPiano,
    WhiteNoise,
    GentleWind,
}

impl SoundId {
    /// Every id, `None` first, in preset-list order.
    pub const ALL: [SoundId; 8] = [
        Self::None,
        Self::LightRain,
        Self::Forest,
        Self::OceanWaves,
        Self::BusyCafe,
        Self::AmbientPiano,
        Self::WhiteNoise,
        Self::GentleWind,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LightRain => "light-rain",
            Self::Forest => "forest",
            Self::OceanWaves => "ocean-waves",
            Self::BusyCafe => "busy-cafe",
            Self::AmbientPiano => "ambient-piano",
            Self::WhiteNoise => "white-noise",
            Self::GentleWind => "gentle-wind",
        }
    }

    /// Human readable name for menus.
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::LightRain => "Light Rain",
            Self::Forest => "Forest",
            Self::OceanWaves => "Ocean Waves",
            Self::BusyCafe => "Busy Cafe",
            Self::AmbientPiano => "Ambient Piano",
            Self::WhiteNoise => "White Noise",
            Self::GentleWind => "Gentle Wind",
        }
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    /// What to build for this sound; `None` for silence.
    pub const fn recipe(self) -> Option<Recipe> {
        match self {
            Self::None => None,
            Self::LightRain => Some(Recipe {
                body: TextureSpec::plain(NoiseKind::White, FilterSpec::BandPass { center_hz: 1_200.0, q: 0.6 }, 0.35),
                layer: None,
                transient: None,
            }),
            Self::Forest => Some(Recipe {
                body: TextureSpec::plain(NoiseKind::PinkBrown, FilterSpec::LowPass { cutoff_hz: 400.0 }, 0.25),
                layer: None,
                transient: Some(BIRD_CHIRP),
            }),
            Self::OceanWaves => Some(Recipe {
                body: TextureSpec::plain(NoiseKind::PinkBrown, FilterSpec::LowPass { cutoff_hz: 500.0 }, 0.2),
                layer: Some(TextureSpec {
                    noise: NoiseKind::PinkBrown,
                    filter: FilterSpec::BandPass { center_hz: 800.0, q: 0.5 },
                    gain: 0.3,
                    swell: Some(SwellSpec { rate_hz: 0.08, floor: 0.1 }),
                }),
                transient: None,
            }),
            Self::BusyCafe => Some(Recipe {
                body: TextureSpec::plain(NoiseKind::PinkBrown, FilterSpec::BandPass { center_hz: 600.0, q: 0.7 }, 0.3),
                layer: None,
                transient: Some(CUP_CLINK),
            }),
            Self::AmbientPiano => Some(Recipe {
                body: TextureSpec::plain(NoiseKind::PinkBrown, FilterSpec::LowPass { cutoff_hz: 300.0 }, 0.05),
                layer: None,
                transient: Some(PIANO_NOTE),
            }),
            Self::WhiteNoise => Some(Recipe {
                body: TextureSpec::plain(NoiseKind::White, FilterSpec::LowPass { cutoff_hz: 12_000.0 }, 0.15),
                layer: None,
                transient: None,
            }),
            Self::GentleWind => Some(Recipe {
                body: TextureSpec {
                    noise: NoiseKind::PinkBrown,
                    filter: FilterSpec::LowPass { cutoff_hz: 350.0 },
                    gain: 0.35,
                    swell: Some(SwellSpec { rate_hz: 0.15, floor: 0.35 }),
                },
                layer: None,
                transient: None,
            }),
        }
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| EngineError::UnknownSound { id: s.to_owned() })
    }
}

/// Amplitude swell applied to a texture.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SwellSpec {
    pub rate_hz: f32,
    /// Lowest gain reached in a trough, in [0, 1].
    pub floor: f32,
}

/// One shaped noise layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureSpec {
    pub noise: NoiseKind,
    pub filter: FilterSpec,
    pub gain: f32,
    pub swell: Option<SwellSpec>,
}

impl TextureSpec {
    const fn plain(noise: NoiseKind, filter: FilterSpec, gain: f32) -> Self {
        Self { noise, filter, gain, swell: None }
    }
}

/// Everything the composer needs to build one soundscape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Recipe {
    pub body: TextureSpec,
    pub layer: Option<TextureSpec>,
    pub transient: Option<EventProfile>,
}

impl Recipe {
    pub fn textures(&self) -> impl Iterator<Item = &TextureSpec> {
        core::iter::once(&self.body).chain(self.layer.as_ref())
    }
}

/// C major pentatonic, C4 to E5.
const PENTATONIC: &[f32] = &[261.63, 293.66, 329.63, 392.00, 440.00, 523.25, 587.33, 659.25];

pub const BIRD_CHIRP: EventProfile = EventProfile {
    name: "bird-chirp",
    min_interval_ms: 3_000,
    max_interval_ms: 8_000,
    pitch: Pitch::Range { lo_hz: 2_000.0, hi_hz: 4_500.0 },
    glide: 1.4,
    wave: Wave::Sine,
    attack_s: 0.01,
    min_decay_s: 0.15,
    max_decay_s: 0.4,
    gain: 0.08,
};

pub const CUP_CLINK: EventProfile = EventProfile {
    name: "cup-clink",
    min_interval_ms: 4_000,
    max_interval_ms: 10_000,
    pitch: Pitch::Range { lo_hz: 2_500.0, hi_hz: 4_000.0 },
    glide: 1.0,
    wave: Wave::Sine,
    attack_s: 0.002,
    min_decay_s: 0.15,
    max_decay_s: 0.3,
    gain: 0.06,
};

pub const PIANO_NOTE: EventProfile = EventProfile {
    name: "piano-note",
    min_interval_ms: 2_500,
    max_interval_ms: 6_000,
    pitch: Pitch::Scale(PENTATONIC),
    glide: 1.0,
    wave: Wave::Tri,
    attack_s: 0.01,
    min_decay_s: 1.5,
    max_decay_s: 2.5,
    gain: 0.12,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for id in SoundId::ALL {
            assert_eq!(id.as_str().parse::<SoundId>().unwrap(), id);
            assert_eq!(id.to_string(), id.as_str());
        }
        let err = "thunderstorm".parse::<SoundId>().unwrap_err();
        assert!(matches!(err, EngineError::UnknownSound { ref id } if id == "thunderstorm"));
        assert!("Forest".parse::<SoundId>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        #[derive(Deserialize, Serialize)]
        struct Preset {
            sound: SoundId,
        }
        let p: Preset = toml::from_str("sound = \"ocean-waves\"").unwrap();
        assert_eq!(p.sound, SoundId::OceanWaves);
        assert_eq!(toml::to_string(&Preset { sound: SoundId::BusyCafe }).unwrap().trim(), "sound = \"busy-cafe\"");
    }

    #[test]
    fn only_none_lacks_a_recipe() {
        for id in SoundId::ALL {
            assert_eq!(id.recipe().is_none(), id.is_none(), "{id}");
        }
    }

    #[test]
    fn transient_profiles_match_sounds() {
        let profile = |id: SoundId| id.recipe().and_then(|r| r.transient).map(|p| p.name);
        assert_eq!(profile(SoundId::Forest), Some("bird-chirp"));
        assert_eq!(profile(SoundId::BusyCafe), Some("cup-clink"));
        assert_eq!(profile(SoundId::AmbientPiano), Some("piano-note"));
        assert_eq!(profile(SoundId::LightRain), None);

        for p in [BIRD_CHIRP, CUP_CLINK, PIANO_NOTE] {
            assert!(p.min_interval_ms <= p.max_interval_ms);
            assert!(p.min_decay_s >= 0.15 && p.max_decay_s <= 2.5);
        }
        assert!(PIANO_NOTE.min_decay_s > CUP_CLINK.max_decay_s);
    }

    #[test]
    fn swells_are_sub_audio() {
        for id in [SoundId::OceanWaves, SoundId::GentleWind] {
            let recipe = id.recipe().unwrap();
            let swell = recipe.textures().find_map(|t| t.swell).unwrap();
            assert!((0.06..=0.15).contains(&swell.rate_hz));
        }
    }
}
