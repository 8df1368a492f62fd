//! The ambient engine: what is playing, and how it changes.
//!
//! `Idle → Building → Playing(sound)`. Every teardown/settle/build sequence
//! runs under one async mutex, so a second request waits for the first one to
//! finish settling instead of racing it. Failures never reach the caller; they
//! are logged and leave the engine idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::composer::{AmbientBus, SoundscapeComposer, SoundscapeHandle};
use crate::config::AmbientConfig;
use crate::error::EngineResult;
use crate::graph::{EngineStats, GraphId, GraphStats};
use crate::mixer::{lock, Mixer, SharedBus};
use crate::recipes::SoundId;
use crate::transient::TransientScheduler;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Tearing down the previous graph, settling, building the next one.
    Building,
    Playing(SoundId),
}

/// Pull-only snapshot of the ambient engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub phase: Phase,
    pub current_sound: SoundId,
    pub is_playing: bool,
    pub volume: f32,
    pub active_graph: Option<GraphId>,
    /// A transient run is attached to the active graph.
    pub transients_pending: bool,
}

struct Control {
    composer: SoundscapeComposer,
    active: Option<SoundscapeHandle>,
}

/// Resets the phase to `Idle` if a build sequence is abandoned midway.
struct BuildingGuard<'a> {
    phase: &'a Mutex<Phase>,
    armed: bool,
}

impl BuildingGuard<'_> {
    fn finish(mut self, phase: Phase) {
        *lock(self.phase) = phase;
        self.armed = false;
    }
}

impl Drop for BuildingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *lock(self.phase) = Phase::Idle;
        }
    }
}

/// Ambient soundscape engine. Owns one bus on the shared mixer.
pub struct AmbientEngine {
    mixer: Mixer,
    bus: Arc<Mutex<AmbientBus>>,
    shared: Option<SharedBus>,
    settle: Duration,
    stats: Arc<GraphStats>,
    control: tokio::sync::Mutex<Control>,
    phase: Mutex<Phase>,
    unsupported: AtomicBool,
    disposed: AtomicBool,
}

impl core::fmt::Debug for AmbientEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AmbientEngine")
            .field("phase", &self.phase())
            .field("volume", &self.volume())
            .field("unsupported", &self.unsupported.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl AmbientEngine {
    /// Attach to `mixer`. When the mixer has no audio capability the engine is
    /// created anyway and every playback call becomes a silent no-op.
    ///
    /// `config` is used as given; validate it first when it comes from a file.
    pub fn new(mixer: &Mixer, config: AmbientConfig) -> Self {
        Self::with_scheduler(mixer, config, TransientScheduler::new())
    }

    /// Same as [`new`](Self::new) with a caller-provided transient scheduler
    /// (e.g. a seeded one).
    pub fn with_scheduler(mixer: &Mixer, config: AmbientConfig, scheduler: TransientScheduler) -> Self {
        let stats = Arc::new(GraphStats::default());
        let sr = mixer.sample_rate();
        let bus = Arc::new(Mutex::new(AmbientBus::new(config.volume, sr, Arc::clone(&stats))));
        let composer = SoundscapeComposer::new(Arc::clone(&bus), sr, config.noise_seconds, Arc::clone(&stats), scheduler);

        let shared: SharedBus = bus.clone();
        let (shared, unsupported) = match mixer.attach(shared.clone()) {
            Ok(()) => (Some(shared), false),
            Err(err) => {
                warn!(error = %err, "ambient engine disabled");
                (None, true)
            }
        };

        Self {
            mixer: mixer.clone(),
            bus,
            shared,
            settle: config.settle(),
            stats,
            control: tokio::sync::Mutex::new(Control { composer, active: None }),
            phase: Mutex::new(Phase::Idle),
            unsupported: AtomicBool::new(unsupported),
            disposed: AtomicBool::new(false),
        }
    }

    fn inert(&self) -> bool {
        self.unsupported.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst)
    }

    /// Play `sound`. `SoundId::None` stops; the sound already playing is left
    /// alone.
    pub async fn play(&self, sound: SoundId) {
        if sound.is_none() {
            return self.stop().await;
        }
        let mut ctl = self.control.lock().await;
        if self.inert() || self.phase() == Phase::Playing(sound) {
            return;
        }
        self.switch(&mut ctl, sound).await;
    }

    /// Stop whatever is playing. Idempotent.
    pub async fn stop(&self) {
        let mut ctl = self.control.lock().await;
        Self::teardown_active(&mut ctl);
        *lock(&self.phase) = Phase::Idle;
    }

    /// Stop, then play `sound`, as one step. Always rebuilds, even when `sound`
    /// is already playing.
    pub async fn change_sound(&self, sound: SoundId) {
        let mut ctl = self.control.lock().await;
        if sound.is_none() {
            Self::teardown_active(&mut ctl);
            *lock(&self.phase) = Phase::Idle;
            return;
        }
        if self.inert() {
            return;
        }
        self.switch(&mut ctl, sound).await;
    }

    /// Teardown, settle, build, start. Caller holds the control lock.
    async fn switch(&self, ctl: &mut Control, sound: SoundId) {
        *lock(&self.phase) = Phase::Building;
        let guard = BuildingGuard { phase: &self.phase, armed: true };
        Self::teardown_active(ctl);

        tokio::time::sleep(self.settle).await;

        match Self::launch(&mut ctl.composer, sound) {
            Ok(handle) => {
                debug!(%sound, graph = %handle.id(), "playing");
                ctl.active = Some(handle);
                guard.finish(Phase::Playing(sound));
            }
            Err(err) => {
                if err.is_environment() {
                    self.unsupported.store(true, Ordering::SeqCst);
                }
                warn!(%sound, error = %err, "sound unavailable");
                guard.finish(Phase::Idle);
            }
        }
    }

    fn launch(composer: &mut SoundscapeComposer, sound: SoundId) -> EngineResult<SoundscapeHandle> {
        let mut handle = composer.build(sound)?;
        if let Err(err) = composer.start(&mut handle) {
            composer.teardown(handle);
            return Err(err);
        }
        Ok(handle)
    }

    fn teardown_active(ctl: &mut Control) {
        if let Some(handle) = ctl.active.take() {
            debug!(sound = %handle.sound(), graph = %handle.id(), "tearing down");
            ctl.composer.teardown(handle);
        }
    }

    /// Set the master volume, clamped to [0, 1]. When idle this only stores
    /// the value for the next `play`.
    pub fn set_volume(&self, v: f32) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        lock(&self.bus).set_volume(v);
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    /// The sound currently playing; `None` while idle or building.
    pub fn current_sound(&self) -> SoundId {
        match self.phase() {
            Phase::Playing(sound) => sound,
            Phase::Idle | Phase::Building => SoundId::None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.phase(), Phase::Playing(_))
    }

    pub fn volume(&self) -> f32 {
        lock(&self.bus).volume()
    }

    /// `true` once the host was found to have no audio output.
    pub fn is_unsupported(&self) -> bool {
        self.unsupported.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    pub fn state(&self) -> PlaybackState {
        let phase = self.phase();
        let transients_pending = self
            .control
            .try_lock()
            .map(|ctl| ctl.active.as_ref().is_some_and(SoundscapeHandle::has_transients))
            .unwrap_or(false);
        PlaybackState {
            phase,
            current_sound: self.current_sound(),
            is_playing: self.is_playing(),
            volume: self.volume(),
            active_graph: lock(&self.bus).active_id(),
            transients_pending,
        }
    }

    /// Tear everything down and leave the mixer. Every later call is a no-op.
    pub async fn dispose(&self) {
        let mut ctl = self.control.lock().await;
        self.disposed.store(true, Ordering::SeqCst);
        Self::teardown_active(&mut ctl);
        *lock(&self.phase) = Phase::Idle;
        if let Some(shared) = &self.shared {
            self.mixer.detach(shared);
        }
        info!("ambient engine disposed");
    }
}

impl Drop for AmbientEngine {
    fn drop(&mut self) {
        Self::teardown_active(self.control.get_mut());
        if let Some(shared) = self.shared.take() {
            self.mixer.detach(&shared);
        }
    }
}
