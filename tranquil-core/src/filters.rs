//! TPT state-variable filter for colouring noise.
//!
//! Zavalishin's trapezoidal SVF (`g = tan(π fc / sr)`, damping `R = 1/(2Q)`).
//! Unlike a direct-form biquad it stays well behaved when a texture is
//! filtered continuously for hours, and the low-pass and band-pass outputs
//! come from the same two integrators.

use crate::dsp::{kill_denormals, tpt_g};

/// Butterworth Q, the neutral choice for plain low-pass shaping.
pub const Q_BUTTERWORTH: f32 = core::f32::consts::FRAC_1_SQRT_2;

/// Which integrator output a texture listens to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    /// Normalised to unity gain at the centre frequency for every Q.
    Bandpass,
}

#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    sr: f32,
    cut: f32,
    g: f32,
    r: f32,
    s1: f32,
    s2: f32,
}

impl SvfTpt {
    /// `cut_hz` is the cutoff (low-pass) or centre (band-pass) frequency.
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let sr = sr.max(1.0);
        let cut = cut_hz.max(0.0);
        Self { sr, cut, g: tpt_g(cut, sr), r: 0.5 / q.max(1e-4), s1: 0.0, s2: 0.0 }
    }

    /// Retune for a new sample rate, keeping cutoff and Q.
    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.g = tpt_g(self.cut, self.sr);
    }

    /// Clear the integrator states.
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    /// One sample in, `(low-pass, band-pass)` out.
    #[inline]
    pub fn tick(&mut self, x: f32) -> (f32, f32) {
        let (g, r) = (self.g, self.r);
        let hp = (x - (2.0 * r + g) * self.s1 - self.s2) / (1.0 + 2.0 * r * g + g * g);
        let bp = g * hp + self.s1;
        self.s1 = kill_denormals(bp + g * hp);
        let lp = g * bp + self.s2;
        self.s2 = kill_denormals(lp + g * bp);
        (lp, 2.0 * r * bp)
    }

    #[inline]
    pub fn process(&mut self, x: f32, mode: SvfMode) -> f32 {
        let (lp, bp) = self.tick(x);
        match mode {
            SvfMode::Lowpass => lp,
            SvfMode::Bandpass => bp,
        }
    }
}
