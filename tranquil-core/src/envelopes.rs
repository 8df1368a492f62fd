//! Envelope generators and gain automation primitives.
//!
//! Provided primitives:
//! - `LinearRamp`    : sample-accurate gain automation (set / ramp / cancel)
//! - `ToneEnvelope`  : one-shot burst envelope, linear attack then exponential decay
//! - `SlewLimiter`   : one-pole smoother for control signals
//!
//! All primitives avoid heap allocations and advance one frame per `next()`.

use crate::dsp::{decay_coeff, SILENCE_FLOOR};

// -------------------------------- Linear ramp ------------------------------------

/// Gain automation evaluated on the audio clock.
///
/// A ramp always starts from the value the parameter holds at the moment it is
/// scheduled, so the output never jumps. Between two ramps the value is held.
#[derive(Copy, Clone, Debug)]
pub struct LinearRamp {
    value: f32,
    start: f32,
    target: f32,
    pos: u64,
    len: u64,
}

impl LinearRamp {
    #[inline]
    pub fn new(value: f32) -> Self {
        Self { value, start: value, target: value, pos: 0, len: 0 }
    }

    /// Jump to `v` immediately, dropping any scheduled ramp.
    #[inline]
    pub fn set(&mut self, v: f32) {
        *self = Self::new(v);
    }

    /// Ramp linearly from the current value to `target` over `frames` frames.
    /// A zero-length ramp is an immediate set.
    #[inline]
    pub fn ramp_to(&mut self, target: f32, frames: u64) {
        if frames == 0 {
            self.set(target);
            return;
        }
        self.start = self.value;
        self.target = target;
        self.pos = 0;
        self.len = frames;
    }

    /// Freeze the parameter at its current value.
    #[inline]
    pub fn cancel(&mut self) {
        let v = self.value;
        self.set(v);
    }

    /// Advance one frame and return the gain for that frame.
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn next(&mut self) -> f32 {
        if self.pos < self.len {
            self.pos += 1;
            let t = self.pos as f32 / self.len as f32;
            self.value = self.start + (self.target - self.start) * t;
            if self.pos == self.len {
                self.value = self.target;
            }
        }
        self.value
    }

    #[inline] pub fn value(&self) -> f32 { self.value }
    #[inline] pub fn is_ramping(&self) -> bool { self.pos < self.len }
}

// ------------------------------- Tone envelope -----------------------------------

/// One-shot envelope for transient tone bursts.
///
/// Rises linearly from 0 to 1 over the attack, then decays exponentially and
/// reaches [`SILENCE_FLOOR`] exactly at the end of the decay, after which it
/// reports `finished()` and outputs 0.
#[derive(Copy, Clone, Debug)]
pub struct ToneEnvelope {
    attack: u64,
    decay: u64,
    pos: u64,
    env: f32,
    k: f32,
}

impl ToneEnvelope {
    /// `attack`/`decay` are lengths in frames.
    #[inline]
    pub fn new(attack: u64, decay: u64) -> Self {
        Self { attack, decay, pos: 0, env: 0.0, k: decay_coeff(decay) }
    }

    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn next(&mut self) -> f32 {
        let total = self.attack + self.decay;
        if self.pos >= total {
            self.env = 0.0;
            return 0.0;
        }
        self.pos += 1;
        if self.pos <= self.attack {
            self.env = self.pos as f32 / self.attack as f32;
        } else {
            if self.pos == self.attack + 1 { self.env = 1.0; }
            self.env *= self.k;
            if self.env < SILENCE_FLOOR * 0.5 { self.env = 0.0; }
        }
        self.env
    }

    #[inline] pub fn finished(&self) -> bool { self.pos >= self.attack + self.decay }
    #[inline] pub fn value(&self) -> f32 { self.env }
    #[inline] pub fn length(&self) -> u64 { self.attack + self.decay }
}

// -------------------------------- Slew Limiter -----------------------------------

/// One-pole slew/smoother: `y += (x - y) * (1 - a)`, `a = exp(-1/(tau*sr))`.
#[derive(Copy, Clone, Debug)]
pub struct SlewLimiter {
    alpha: f32,
    y:     f32,
}

impl SlewLimiter {
    #[inline]
    pub fn new(t_ms: f32, sr: f32) -> Self {
        Self { alpha: crate::dsp::one_pole_coeff_ms(t_ms, sr), y: 0.0 }
    }

    #[inline]
    pub fn reset(&mut self, y0: f32) { self.y = y0; }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += (x - self.y) * (1.0 - self.alpha);
        self.y
    }

    #[inline]
    pub fn value(&self) -> f32 { self.y }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_lands_exactly_and_holds() {
        let mut r = LinearRamp::new(0.0);
        r.ramp_to(0.8, 100);
        let mut prev = 0.0;
        for _ in 0..100 {
            let v = r.next();
            assert!(v >= prev);
            prev = v;
        }
        assert_eq!(r.value(), 0.8);
        assert!(!r.is_ramping());
        assert_eq!(r.next(), 0.8);
    }

    #[test]
    fn ramp_restarts_from_current_value() {
        let mut r = LinearRamp::new(0.0);
        r.ramp_to(1.0, 10);
        for _ in 0..5 { r.next(); }
        let mid = r.value();
        r.cancel();
        assert_eq!(r.next(), mid);
        r.ramp_to(0.0, 10);
        let first = r.next();
        assert!(first < mid && mid - first <= mid / 10.0 + 1e-6);
    }

    #[test]
    fn tone_envelope_attacks_then_decays_to_silence() {
        let mut e = ToneEnvelope::new(48, 4_800);
        let mut peak = 0.0_f32;
        let mut at_peak = 0;
        for i in 0..e.length() {
            let v = e.next();
            if v > peak { peak = v; at_peak = i; }
        }
        assert!((peak - 1.0).abs() < 1e-6);
        assert!(at_peak <= 48);
        assert!(e.value() <= SILENCE_FLOOR * 1.01);
        assert!(e.finished());
        assert_eq!(e.next(), 0.0);
    }

    #[test]
    fn slew_moves_towards_target() {
        let sr = 48000.0;
        let mut s = SlewLimiter::new(50.0, sr);
        for _ in 0..(sr as usize) { s.process(1.0); }
        assert!(s.value() > 0.9);
    }
}
