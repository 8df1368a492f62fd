//! Tranquil Core: DSP primitives for procedural soundscapes.
//!
//! Features
//! - `fast-math`: enable approximations (polys/rationals) for tanh/trig
//! - `libm`     : use `libm` for transcendental math (bit-stable across targets)
//!
//! Modules
//! - [`dsp`]       : math backend, utils (clamping, smoothing coefficients, fast trig)
//! - [`envelopes`] : gain ramps, tone-burst envelope, slew limiter
//! - [`filters`]   : TPT state-variable filter
//! - [`noise`]     : white and pink/brown noise buffers
//! - [`error`]     : construction errors
//!
//! Design
//! - No allocation on the per-sample path; buffers are built up front
//! - Clear separation between math helpers and filter/envelope building blocks

pub mod dsp;
pub mod envelopes;
pub mod error;
pub mod filters;
pub mod noise;

pub use error::{SynthError, SynthResult};

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        clamp, clamp01, fast_sin, kill_denormals, one_pole_coeff_ms, seconds_to_frames,
        soft_clip, wrap_phase01, TAU,
    };
    pub use crate::envelopes::{LinearRamp, SlewLimiter, ToneEnvelope};
    pub use crate::error::{SynthError, SynthResult};
    pub use crate::filters::{SvfMode, SvfTpt, Q_BUTTERWORTH};
    pub use crate::noise::{NoiseBuffer, NoiseKind};
}
