//! The shared output sink.
//!
//! Both engines attach one bus each and never touch each other's state; the
//! mixer only sums. Whoever owns the device (cpal callback, FFI host, tests)
//! pulls frames with [`Mixer::render`], which is also the audio clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use tranquil_core::dsp::soft_clip;

use crate::error::{EngineError, EngineResult};
use crate::graph::Frame;

/// Something that adds audio into the shared output.
pub trait Bus: Send {
    /// Add `out.len()` frames into `out`. `clock` is the mixer frame index of
    /// `out[0]`.
    fn render(&mut self, clock: u64, out: &mut [Frame]);
}

pub type SharedBus = Arc<Mutex<dyn Bus>>;

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
/// Audio state stays usable: every writer leaves it consistent between frames.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Level above which the output limiter starts bending.
const LIMIT_KNEE: f32 = 0.9;

/// Transparent below the knee, saturates smoothly towards ±1 above it.
#[inline]
fn limit(x: f32) -> f32 {
    let a = x.abs();
    if a <= LIMIT_KNEE {
        return x;
    }
    let room = 1.0 - LIMIT_KNEE;
    (LIMIT_KNEE + room * soft_clip((a - LIMIT_KNEE) / room)).copysign(x)
}

#[derive(Debug)]
enum Capability {
    Available,
    Unavailable(String),
}

struct MixerShared {
    sample_rate: f32,
    capability: Capability,
    buses: Mutex<Vec<SharedBus>>,
    clock: AtomicU64,
}

/// Cloneable handle to the single output sink.
#[derive(Clone)]
pub struct Mixer {
    shared: Arc<MixerShared>,
}

impl core::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mixer")
            .field("sample_rate", &self.shared.sample_rate)
            .field("capability", &self.shared.capability)
            .field("clock", &self.clock())
            .finish()
    }
}

impl Mixer {
    /// Sink running at `sample_rate`. A non-positive or non-finite rate
    /// yields an unavailable sink.
    pub fn new(sample_rate: f32) -> Self {
        let capability = if sample_rate.is_finite() && sample_rate >= 1.0 {
            Capability::Available
        } else {
            Capability::Unavailable(format!("invalid sample rate {sample_rate} Hz"))
        };
        Self::with_capability(sample_rate, capability)
    }

    /// Sink for hosts without audio output; engines attached to it stay silent.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::with_capability(0.0, Capability::Unavailable(reason.into()))
    }

    fn with_capability(sample_rate: f32, capability: Capability) -> Self {
        Self {
            shared: Arc::new(MixerShared {
                sample_rate,
                capability,
                buses: Mutex::new(Vec::new()),
                clock: AtomicU64::new(0),
            }),
        }
    }

    /// # Errors
    /// `UnsupportedAudioEnvironment` when this sink has no audio capability.
    pub fn ensure_available(&self) -> EngineResult<()> {
        match &self.shared.capability {
            Capability::Available => Ok(()),
            Capability::Unavailable(reason) => Err(EngineError::unsupported(reason.clone())),
        }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.shared.sample_rate }

    /// Frames rendered so far (the audio clock).
    #[inline] pub fn clock(&self) -> u64 { self.shared.clock.load(Ordering::Acquire) }

    /// Attach a bus. Attaching to an unavailable sink is refused.
    ///
    /// # Errors
    /// `UnsupportedAudioEnvironment` when the sink has no audio capability.
    pub fn attach(&self, bus: SharedBus) -> EngineResult<()> {
        self.ensure_available()?;
        let mut buses = lock(&self.shared.buses);
        buses.push(bus);
        debug!(buses = buses.len(), "bus attached");
        Ok(())
    }

    /// Detach a previously attached bus (pointer identity).
    pub fn detach(&self, bus: &SharedBus) {
        lock(&self.shared.buses).retain(|b| !Arc::ptr_eq(b, bus));
    }

    /// Render stereo frames: zero `out`, sum every bus, soft-limit, advance
    /// the clock.
    pub fn render(&self, out: &mut [Frame]) {
        out.fill([0.0; 2]);
        if self.ensure_available().is_err() {
            return;
        }
        let clock = self.clock();
        {
            let buses = lock(&self.shared.buses);
            for bus in buses.iter() {
                lock(bus).render(clock, out);
            }
        }
        let mut muted = 0_usize;
        for s in out.iter_mut().flatten() {
            if !s.is_finite() {
                muted += 1;
                *s = 0.0;
            }
            *s = limit(*s);
        }
        if muted > 0 {
            warn!(muted, clock, "non-finite samples from bus, muted");
        }
        self.shared.clock.fetch_add(out.len() as u64, Ordering::AcqRel);
    }

    /// Render into an interleaved buffer with `channels` channels. Mono gets
    /// the L/R average; channels beyond two repeat L/R.
    pub fn render_interleaved(&self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        const CHUNK: usize = 256;
        let mut scratch = [[0.0_f32; 2]; CHUNK];
        for block in out.chunks_mut(channels * CHUNK) {
            let frames = block.len() / channels;
            let scratch = &mut scratch[..frames];
            self.render(scratch);
            for (dst, src) in block.chunks_mut(channels).zip(scratch.iter()) {
                if channels == 1 {
                    dst[0] = 0.5 * (src[0] + src[1]);
                } else {
                    for (c, d) in dst.iter_mut().enumerate() {
                        *d = src[c % 2];
                    }
                }
            }
        }
    }
}
