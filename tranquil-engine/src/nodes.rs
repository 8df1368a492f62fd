//! Building blocks (nodes) for soundscape graphs.
//!
//! Per-sample components; nothing here allocates after construction.
//!
//! Contents:
//! - `Wave`, `Osc`       : basic oscillators (Sine/Tri) with stable phase wrap
//! - `Lfo`               : sub-audio oscillator for swells
//! - `LoopPlayer`        : endless playback of an owned noise buffer
//! - `ToneEvent`         : description of one transient burst
//! - `TransientVoice`    : oscillator + burst envelope rendering a `ToneEvent`

use tranquil_core::dsp::{exp, fast_sin, seconds_to_frames, wrap_phase01, TAU};
use tranquil_core::envelopes::ToneEnvelope;
use tranquil_core::noise::NoiseBuffer;

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wave { Sine, Tri }

#[inline]
fn osc_sample(phase01: f32, wave: Wave) -> f32 {
    match wave {
        Wave::Sine => fast_sin(TAU * phase01),
        Wave::Tri  => 4.0 * (phase01 - 0.5).abs() - 1.0,
    }
}

/// Free-running oscillator. Not anti-aliased; fine for soft tones and LFO duties.
#[derive(Copy, Clone, Debug)]
pub struct Osc {
    phase: f32,   // [0,1)
    freq:  f32,   // Hz
    wave:  Wave,
}

impl Osc {
    #[inline] pub fn new(freq_hz: f32, wave: Wave) -> Self { Self { phase: 0.0, freq: freq_hz.max(0.0), wave } }
    #[inline] pub fn set_freq(&mut self, hz: f32) { self.freq = hz.max(0.0); }
    #[inline] pub fn freq(&self) -> f32 { self.freq }

    /// Return the current sample, then advance one step at `sr`.
    #[inline]
    pub fn next(&mut self, sr: f32) -> f32 {
        let s = osc_sample(self.phase, self.wave);
        self.phase = wrap_phase01(self.phase + self.freq / sr);
        s
    }

    /// Hard-set phase in [0,1).
    #[inline] pub fn set_phase01(&mut self, p: f32) { self.phase = wrap_phase01(p); }
}

/// Sub-audio sine used for slow amplitude swells.
#[derive(Copy, Clone, Debug)]
pub struct Lfo(Osc);
impl Lfo {
    #[inline] pub fn sine(rate_hz: f32) -> Self { Self(Osc::new(rate_hz, Wave::Sine)) }

    /// Next LFO value remapped to **[0,1]**.
    #[inline] pub fn next01(&mut self, sr: f32) -> f32 { (0.5 * (self.0.next(sr) + 1.0)).clamp(0.0, 1.0) }

    #[inline] pub fn set_phase01(&mut self, p: f32) { self.0.set_phase01(p); }
}

/// Loops an owned noise buffer forever, starting at `offset`.
#[derive(Clone, Debug)]
pub struct LoopPlayer {
    buf: NoiseBuffer,
    pos: usize,
}

impl LoopPlayer {
    pub fn new(buf: NoiseBuffer, offset: usize) -> Self {
        let pos = if buf.is_empty() { 0 } else { offset % buf.len() };
        Self { buf, pos }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let samples = self.buf.samples();
        if samples.is_empty() {
            return 0.0;
        }
        let s = samples[self.pos];
        self.pos += 1;
        if self.pos >= samples.len() {
            self.pos = 0;
        }
        s
    }
}

/// One transient burst, fully resolved (pitch, shape, level).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToneEvent {
    pub freq_hz: f32,
    /// Frequency multiplier reached by the end of the burst (1.0 = steady pitch).
    pub glide: f32,
    pub wave: Wave,
    pub attack_s: f32,
    pub decay_s: f32,
    pub gain: f32,
}

/// Renders a [`ToneEvent`]: linear attack, exponential decay to near-silence.
#[derive(Copy, Clone, Debug)]
pub struct TransientVoice {
    osc: Osc,
    env: ToneEnvelope,
    sr: f32,
    gain: f32,
    /// Per-sample frequency multiplier implementing the glide.
    sweep: f32,
}

impl TransientVoice {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(ev: &ToneEvent, sr: f32) -> Self {
        let attack = seconds_to_frames(ev.attack_s, sr);
        let decay = seconds_to_frames(ev.decay_s, sr).max(1);
        let len = (attack + decay) as f32;
        let sweep = if ev.glide > 0.0 && (ev.glide - 1.0).abs() > f32::EPSILON {
            exp(ev.glide.ln() / len)
        } else {
            1.0
        };
        Self {
            osc: Osc::new(ev.freq_hz, ev.wave),
            env: ToneEnvelope::new(attack, decay),
            sr,
            gain: ev.gain,
            sweep,
        }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.env.finished() {
            return 0.0;
        }
        let e = self.env.next();
        let s = self.osc.next(self.sr);
        if self.sweep != 1.0 {
            self.osc.set_freq(self.osc.freq() * self.sweep);
        }
        s * e * self.gain
    }

    #[inline] pub fn finished(&self) -> bool { self.env.finished() }
}
