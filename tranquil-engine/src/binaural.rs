//! Binaural beat generator.
//!
//! Two sine carriers, `base` on the left and `base + beat` on the right, run
//! for the life of the engine once built. Play and pause only move the master
//! gain, and every gain move is a [`LinearRamp`] evaluated on the audio clock.
//! `is_playing` follows what is audible: it drops to `false` on the frame the
//! fade-out lands, not when `pause()` is called.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use tranquil_core::dsp::{clamp01, seconds_to_frames};
use tranquil_core::envelopes::LinearRamp;

use crate::config::BinauralConfig;
use crate::graph::Frame;
use crate::mixer::{lock, Bus, Mixer, SharedBus};
use crate::nodes::{Osc, Wave};

/// Length of a live volume change while playing.
pub const VOLUME_TRANSITION_SECONDS: f32 = 0.1;

struct BinauralBus {
    left: Osc,
    right: Osc,
    sr: f32,
    gain: LinearRamp,
    playing: bool,
    /// Fade-out in flight; `playing` clears when it lands.
    stopping: bool,
}

impl BinauralBus {
    fn new(cfg: &BinauralConfig, sr: f32) -> Self {
        Self {
            left: Osc::new(cfg.base_frequency, Wave::Sine),
            right: Osc::new(cfg.base_frequency + cfg.beat_frequency, Wave::Sine),
            sr,
            gain: LinearRamp::new(0.0),
            playing: false,
            stopping: false,
        }
    }
}

impl Bus for BinauralBus {
    fn render(&mut self, clock: u64, out: &mut [Frame]) {
        for (i, frame) in out.iter_mut().enumerate() {
            let g = self.gain.next();
            frame[0] += self.left.next(self.sr) * g;
            frame[1] += self.right.next(self.sr) * g;
            if self.stopping && !self.gain.is_ramping() {
                self.stopping = false;
                self.playing = false;
                debug!(frame = clock + i as u64, "binaural fade-out complete");
            }
        }
    }
}

/// Snapshot of a binaural engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BinauralState {
    pub base_frequency: f32,
    pub beat_frequency: f32,
    pub volume: f32,
    pub is_playing: bool,
    /// Whether the carriers have been built (first `play()`).
    pub constructed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Unknown,
    Ready,
    Unsupported,
    Disposed,
}

/// Independently controlled binaural stream on the shared mixer.
pub struct BinauralEngine {
    mixer: Mixer,
    config: BinauralConfig,
    volume: f32,
    bus: Option<Arc<Mutex<BinauralBus>>>,
    shared: Option<SharedBus>,
    availability: Availability,
}

impl core::fmt::Debug for BinauralEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BinauralEngine").field("state", &self.state()).finish()
    }
}

impl BinauralEngine {
    /// Nothing touches the mixer until the first `play()`.
    pub fn new(mixer: &Mixer, config: BinauralConfig) -> Self {
        let volume = config.clamped_volume();
        Self { mixer: mixer.clone(), config, volume, bus: None, shared: None, availability: Availability::Unknown }
    }

    /// Build the carriers on first use. `None` once the environment was found
    /// unsupported or the engine was disposed.
    fn bus(&mut self) -> Option<Arc<Mutex<BinauralBus>>> {
        match self.availability {
            Availability::Ready => return self.bus.clone(),
            Availability::Unsupported | Availability::Disposed => return None,
            Availability::Unknown => {}
        }
        let bus = Arc::new(Mutex::new(BinauralBus::new(&self.config, self.mixer.sample_rate())));
        let shared: SharedBus = bus.clone();
        if let Err(err) = self.mixer.attach(shared.clone()) {
            warn!(error = %err, "binaural engine disabled");
            self.availability = Availability::Unsupported;
            return None;
        }
        debug!(
            base = self.config.base_frequency,
            beat = self.config.beat_frequency,
            "binaural carriers built"
        );
        self.availability = Availability::Ready;
        self.bus = Some(bus.clone());
        self.shared = Some(shared);
        Some(bus)
    }

    fn frames(&self, seconds: f32) -> u64 {
        seconds_to_frames(seconds, self.mixer.sample_rate())
    }

    /// Fade in from the current gain to the target volume.
    pub fn play(&mut self) {
        let frames = self.frames(self.config.fade_in_seconds);
        let volume = self.volume;
        let Some(bus) = self.bus() else { return };
        let mut bus = lock(&bus);
        bus.gain.cancel();
        bus.gain.ramp_to(volume, frames);
        bus.stopping = false;
        bus.playing = true;
        debug!(volume, frames, "binaural play");
    }

    /// Fade out to silence. `is_playing` stays `true` until the ramp ends.
    pub fn pause(&mut self) {
        let frames = self.frames(self.config.fade_out_seconds);
        let Some(bus) = self.bus.clone().filter(|_| self.availability == Availability::Ready) else {
            return;
        };
        let mut bus = lock(&bus);
        if !bus.playing {
            return;
        }
        bus.gain.ramp_to(0.0, frames);
        if frames == 0 {
            bus.playing = false;
        } else {
            bus.stopping = true;
        }
        debug!(frames, "binaural pause");
    }

    /// Store a new target volume (clamped to [0, 1]); while playing, the live
    /// gain moves there over [`VOLUME_TRANSITION_SECONDS`].
    pub fn set_volume(&mut self, v: f32) {
        if self.availability == Availability::Disposed {
            return;
        }
        self.volume = clamp01(v);
        let frames = self.frames(VOLUME_TRANSITION_SECONDS);
        if let Some(bus) = &self.bus {
            let mut bus = lock(bus);
            if bus.playing && !bus.stopping {
                bus.gain.ramp_to(self.volume, frames);
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.bus.as_ref().is_some_and(|b| lock(b).playing)
    }

    /// Target volume in [0, 1].
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Master gain as of the last rendered frame.
    pub fn master_gain(&self) -> f32 {
        self.bus.as_ref().map_or(0.0, |b| lock(b).gain.value())
    }

    pub fn state(&self) -> BinauralState {
        BinauralState {
            base_frequency: self.config.base_frequency,
            beat_frequency: self.config.beat_frequency,
            volume: self.volume,
            is_playing: self.is_playing(),
            constructed: self.bus.is_some(),
        }
    }

    /// Detach from the mixer and drop the carriers. Every later call is a no-op.
    pub fn dispose(&mut self) {
        if let Some(shared) = self.shared.take() {
            self.mixer.detach(&shared);
        }
        self.bus = None;
        self.availability = Availability::Disposed;
        debug!("binaural engine disposed");
    }
}

impl Drop for BinauralEngine {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            self.mixer.detach(&shared);
        }
    }
}
