//! Tranquil Engine: procedural ambient soundscapes and binaural beats.
//!
//! Crate layout:
//! - [`graph`]     : `Generator` trait, `AudioGraph` handle and its counters
//! - [`nodes`]     : oscillators, LFO, loop player, transient voices
//! - [`mixer`]     : the shared output sink (`Mixer`) and the `Bus` trait
//! - [`shaper`]    : noise buffer + filter + gain = texture
//! - [`transient`] : cancellable probabilistic event scheduler
//! - [`recipes`]   : `SoundId` and the recipe behind each sound
//! - [`composer`]  : builds, starts and tears down soundscape graphs
//! - [`lifecycle`] : `AmbientEngine`, the play/stop/change facade
//! - [`binaural`]  : `BinauralEngine`, two carriers behind a faded master gain
//! - [`config`]    : serde/TOML configuration
//! - `device`      : cpal output (feature `realtime`)
//!
//! Nothing allocates on the render path once a graph is built. Ambient and
//! binaural engines share one mixer and never touch each other's state.

pub mod binaural;
pub mod composer;
pub mod config;
#[cfg(feature = "realtime")]
pub mod device;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod mixer;
pub mod nodes;
pub mod recipes;
pub mod shaper;
pub mod transient;

// Re-export the collaborator-facing surface.
pub use binaural::{BinauralEngine, BinauralState};
pub use config::{AmbientConfig, BinauralConfig, EngineConfig};
#[cfg(feature = "realtime")]
pub use device::{list_output_devices, DeviceOutput, DeviceRequest};
pub use error::{EngineError, EngineResult};
pub use graph::{EngineStats, Frame, GraphId};
pub use lifecycle::{AmbientEngine, Phase, PlaybackState};
pub use mixer::Mixer;
pub use recipes::SoundId;
