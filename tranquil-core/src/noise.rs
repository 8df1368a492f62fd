//! Noise synthesis: fixed-length looping buffers of white or pink/brown noise.
//!
//! Buffers are long (seconds) so the loop seam is inaudible at noise density;
//! no crossfade is applied. Generation is not deterministic unless the caller
//! supplies a seeded RNG through [`NoiseBuffer::generate_with`].

use rand::Rng;

use crate::dsp::clamp;
use crate::error::{SynthError, SynthResult};

/// Output attenuation applied after summing the pink-noise pole stages.
pub const PINK_ATTENUATION: f32 = 0.11;

/// Noise generation algorithm.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NoiseKind {
    /// Independent uniform samples in [-1, 1].
    White,
    /// White noise through a bank of first-order poles (≈ -3 dB/oct tilt).
    PinkBrown,
}

/// Immutable block of noise samples at a fixed sample rate.
#[derive(Clone, Debug)]
pub struct NoiseBuffer {
    kind: NoiseKind,
    sample_rate: f32,
    samples: Box<[f32]>,
}

impl NoiseBuffer {
    /// Generate `seconds` of noise at `sample_rate` using the thread RNG.
    pub fn generate(kind: NoiseKind, seconds: f32, sample_rate: f32) -> SynthResult<Self> {
        Self::generate_with(kind, seconds, sample_rate, &mut rand::thread_rng())
    }

    /// Generate with a caller-provided RNG.
    ///
    /// # Errors
    /// - [`SynthError::UnsupportedAudioEnvironment`] for a non-positive or
    ///   non-finite sample rate, or when the buffer cannot be allocated.
    /// - [`SynthError::InvalidDuration`] when `seconds` is not positive/finite.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn generate_with<R: Rng + ?Sized>(
        kind: NoiseKind,
        seconds: f32,
        sample_rate: f32,
        rng: &mut R,
    ) -> SynthResult<Self> {
        if !sample_rate.is_finite() || sample_rate < 1.0 {
            return Err(SynthError::unsupported(format!("sample rate {sample_rate} Hz")));
        }
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(SynthError::InvalidDuration { seconds });
        }

        let len = ((seconds * sample_rate).round() as usize).max(1);
        let mut samples: Vec<f32> = Vec::new();
        samples
            .try_reserve_exact(len)
            .map_err(|e| SynthError::unsupported(format!("cannot allocate {len} samples: {e}")))?;

        match kind {
            NoiseKind::White => {
                samples.extend((0..len).map(|_| rng.gen_range(-1.0_f32..=1.0)));
            }
            NoiseKind::PinkBrown => {
                let mut poles = PinkPoles::default();
                samples.extend((0..len).map(|_| poles.next(rng.gen_range(-1.0_f32..=1.0))));
            }
        }

        Ok(Self { kind, sample_rate, samples: samples.into_boxed_slice() })
    }

    #[inline] pub fn kind(&self) -> NoiseKind { self.kind }
    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }
    #[inline] pub fn len(&self) -> usize { self.samples.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.samples.is_empty() }
    #[inline] pub fn samples(&self) -> &[f32] { &self.samples }

    /// Buffer length in seconds.
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate
    }
}

/// Pole accumulators of the multi-stage pink approximation. Lives only while
/// a buffer is being filled.
#[derive(Default)]
struct PinkPoles {
    b: [f32; 7],
}

impl PinkPoles {
    #[inline]
    fn next(&mut self, white: f32) -> f32 {
        let b = &mut self.b;
        b[0] = 0.998_86 * b[0] + white * 0.055_517_9;
        b[1] = 0.993_32 * b[1] + white * 0.075_075_9;
        b[2] = 0.969_00 * b[2] + white * 0.153_852_0;
        b[3] = 0.866_50 * b[3] + white * 0.310_485_6;
        b[4] = 0.550_00 * b[4] + white * 0.532_952_2;
        b[5] = -0.761_6 * b[5] - white * 0.016_898_0;
        let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.536_2;
        b[6] = white * 0.115_926;
        clamp(out * PINK_ATTENUATION, -1.0, 1.0)
    }
}

// ------------------------------------ Tests --------------------------------------
