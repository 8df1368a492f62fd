//! Spectral shaping: turns a noise buffer into a continuously playing texture.
//!
//! The shaper is generic. Cutoffs and gains that make a texture sound like
//! rain or wind belong to the recipes, not to this module.

use tranquil_core::filters::{SvfMode, SvfTpt, Q_BUTTERWORTH};
use tranquil_core::noise::NoiseBuffer;

use crate::graph::Generator;
use crate::nodes::{Lfo, LoopPlayer};

/// Frequency-domain shape applied to a texture.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FilterSpec {
    LowPass { cutoff_hz: f32 },
    BandPass { center_hz: f32, q: f32 },
}

impl FilterSpec {
    fn svf(self, sr: f32) -> (SvfTpt, SvfMode) {
        match self {
            Self::LowPass { cutoff_hz } => (SvfTpt::new(cutoff_hz, Q_BUTTERWORTH, sr), SvfMode::Lowpass),
            Self::BandPass { center_hz, q } => (SvfTpt::new(center_hz, q, sr), SvfMode::Bandpass),
        }
    }
}

/// A looping noise source pushed through one filter and a fixed gain.
#[derive(Clone, Debug)]
pub struct Texture {
    src: LoopPlayer,
    svf: SvfTpt,
    mode: SvfMode,
    gain: f32,
}

/// Wrap `buffer` with `filter` and `gain`. The texture takes ownership of the
/// buffer; dropping the texture discards it.
pub fn shape(buffer: NoiseBuffer, filter: FilterSpec, gain: f32) -> Texture {
    let sr = buffer.sample_rate();
    let (svf, mode) = filter.svf(sr);
    Texture { src: LoopPlayer::new(buffer, 0), svf, mode, gain }
}

impl Generator for Texture {
    fn reset(&mut self, sr: f32) {
        // The buffer was generated at its own rate; a mismatch only shifts
        // the perceived colour, so just retune the filter.
        self.svf.set_sample_rate(sr);
        self.svf.reset();
    }

    #[inline]
    fn next(&mut self) -> f32 {
        self.svf.process(self.src.next(), self.mode) * self.gain
    }
}

/// Texture whose level rises and falls with a sub-audio LFO (waves, gusts).
///
/// Gain follows `floor + (1 - floor) * lfo01`, so it never drops below `floor`.
#[derive(Clone, Debug)]
pub struct Swell {
    texture: Texture,
    lfo: Lfo,
    floor: f32,
    sr: f32,
}

impl Swell {
    pub fn new(texture: Texture, rate_hz: f32, floor: f32) -> Self {
        let mut lfo = Lfo::sine(rate_hz);
        // start in a trough so the layer fades in rather than jumping in
        lfo.set_phase01(0.75);
        Self { texture, lfo, floor: floor.clamp(0.0, 1.0), sr: 48_000.0 }
    }
}

impl Generator for Swell {
    fn reset(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.texture.reset(self.sr);
    }

    #[inline]
    fn next(&mut self) -> f32 {
        let depth = self.floor + (1.0 - self.floor) * self.lfo.next01(self.sr);
        self.texture.next() * depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tranquil_core::noise::NoiseKind;

    const SR: f32 = 48_000.0;

    fn white(seed: u64) -> NoiseBuffer {
        NoiseBuffer::generate_with(NoiseKind::White, 1.0, SR, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    fn rms(g: &mut dyn Generator, n: usize) -> f32 {
        ((0..n).map(|_| { let s = g.next(); s * s }).sum::<f32>() / n as f32).sqrt()
    }

    /// Mean absolute first difference: high for bright signals, low for dark ones.
    fn roughness(g: &mut dyn Generator, n: usize) -> f32 {
        let mut prev = g.next();
        let mut acc = 0.0;
        for _ in 0..n {
            let s = g.next();
            acc += (s - prev).abs();
            prev = s;
        }
        acc / n as f32
    }

    #[test]
    fn lowpass_darkens_and_gain_scales() {
        let mut raw = shape(white(1), FilterSpec::LowPass { cutoff_hz: 20_000.0 }, 1.0);
        let mut dark = shape(white(1), FilterSpec::LowPass { cutoff_hz: 350.0 }, 1.0);
        raw.reset(SR);
        dark.reset(SR);
        let r_raw = roughness(&mut raw, 20_000) / rms(&mut raw, 20_000);
        let r_dark = roughness(&mut dark, 20_000) / rms(&mut dark, 20_000);
        assert!(r_dark < 0.25 * r_raw, "raw={r_raw} dark={r_dark}");

        let mut quiet = shape(white(2), FilterSpec::LowPass { cutoff_hz: 350.0 }, 0.1);
        let mut loud = shape(white(2), FilterSpec::LowPass { cutoff_hz: 350.0 }, 1.0);
        let ratio = rms(&mut quiet, 20_000) / rms(&mut loud, 20_000);
        assert!((ratio - 0.1).abs() < 1e-3, "ratio {ratio}");
    }

    #[test]
    fn bandpass_texture_is_bounded_and_not_silent() {
        let mut rain = shape(white(3), FilterSpec::BandPass { center_hz: 1_200.0, q: 0.6 }, 0.4);
        rain.reset(SR);
        let level = rms(&mut rain, 48_000);
        assert!(level > 0.01 && level < 0.4, "level {level}");
        for _ in 0..96_000 {
            assert!(rain.next().abs() <= 1.0);
        }
    }

    #[test]
    fn swell_modulates_level() {
        let tex = shape(white(4), FilterSpec::LowPass { cutoff_hz: 2_000.0 }, 1.0);
        let mut swell = Swell::new(tex, 0.5, 0.2);
        swell.reset(SR);
        // half-second windows across one 2 s LFO cycle
        let levels: Vec<f32> = (0..4).map(|_| rms(&mut swell, 24_000)).collect();
        let (lo, hi) = levels.iter().fold((f32::MAX, 0.0_f32), |(lo, hi), &l| (lo.min(l), hi.max(l)));
        assert!(hi > 1.8 * lo, "levels {levels:?}");
        assert!(lo > 0.0);
    }
}
