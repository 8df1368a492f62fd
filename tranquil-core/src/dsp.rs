//! Scalar math shared by the noise, filter and envelope code.
//!
//! Transcendentals go through one private backend (`std` or, with the `libm`
//! feature, `libm`) so every target computes the same curves. The `fast-math`
//! feature swaps the oscillator sine and the saturator for cheap polynomial
//! and rational forms.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "libm")] {
        #[inline] fn backend_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn backend_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] fn backend_tanh(x: f32) -> f32 { libm::tanhf(x) }
        #[inline] fn backend_tan(x: f32) -> f32 { libm::tanf(x) }
    } else {
        #[inline] fn backend_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn backend_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn backend_tanh(x: f32) -> f32 { x.tanh() }
        #[inline] fn backend_tan(x: f32) -> f32 { x.tan() }
    }
}

/// One full cycle in radians.
pub const TAU: f32 = 2.0 * PI;

/// Magnitudes below this are flushed to zero in filter state.
pub const DENORMAL_FLOOR: f32 = 1.0e-20;

/// -60 dB, where an exponential decay counts as silent.
pub const SILENCE_FLOOR: f32 = 1.0e-3;

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    x.max(lo).min(hi)
}

/// Clamp a user-facing gain into [0, 1]. NaN maps to 0.
#[inline]
pub fn clamp01(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { clamp(x, 0.0, 1.0) }
}

/// Phase folded into [0, 1).
#[inline]
pub fn wrap_phase01(p: f32) -> f32 {
    let w = p - p.floor();
    if w >= 1.0 { 0.0 } else { w }
}

#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < DENORMAL_FLOOR { 0.0 } else { x }
}

/// Seconds to whole frames at `sr`. Negative and non-finite durations give 0.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn seconds_to_frames(seconds: f32, sr: f32) -> u64 {
    if seconds.is_finite() && seconds > 0.0 { (seconds * sr).round() as u64 } else { 0 }
}

#[inline]
pub fn exp(x: f32) -> f32 {
    backend_exp(x)
}

/// Sine for oscillators. Under `fast-math` the argument is folded into
/// [-π, π] and fed to an odd 5th-order polynomial (error around 1e-3).
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let r = x - (x / TAU).round() * TAU;
            let r2 = r * r;
            r * (0.999_979_313_3 + r2 * (-0.166_624_432_0 + r2 * 0.008_308_978_98))
        } else {
            backend_sin(x)
        }
    }
}

/// Saturating curve bounded to ±1. `fast-math` uses the rational
/// `x (27 + x²) / (27 + 9x²)` instead of `tanh`.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let x2 = x * x;
            clamp(x * (27.0 + x2) / (27.0 + 9.0 * x2), -1.0, 1.0)
        } else {
            backend_tanh(x)
        }
    }
}

/// Pole of a one-pole smoother that covers ~63 % of a step in `t_ms`.
/// Zero or negative times give an instant (pass-through) smoother.
#[inline]
pub fn one_pole_coeff_ms(t_ms: f32, sr: f32) -> f32 {
    if t_ms <= 0.0 {
        return 0.0;
    }
    backend_exp(-1000.0 / (t_ms * sr))
}

/// Per-frame multiplier that brings 1.0 down to [`SILENCE_FLOOR`] in
/// exactly `frames` frames.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn decay_coeff(frames: u64) -> f32 {
    if frames == 0 {
        return 0.0;
    }
    backend_exp(SILENCE_FLOOR.ln() / frames as f32)
}

/// Prewarped integrator gain `tan(π fc / sr)` for the TPT filter, with the
/// cutoff held under Nyquist.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let fc = clamp(cut_hz, 0.0, 0.49 * sr);
    backend_tan(PI * fc / sr)
}
