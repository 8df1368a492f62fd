//! Soundscape assembly.
//!
//! [`SoundscapeComposer::build`] turns a [`SoundId`] recipe into an unstarted
//! [`SoundscapeHandle`]; [`SoundscapeComposer::start`] wires it into the
//! ambient bus and starts its transient run; [`SoundscapeComposer::teardown`]
//! undoes both. The bus holds at most one graph at a time.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use tranquil_core::dsp::clamp01;
use tranquil_core::envelopes::SlewLimiter;
use tranquil_core::noise::NoiseBuffer;

use crate::error::{EngineError, EngineResult};
use crate::graph::{AudioGraph, Frame, GraphId, GraphState, GraphStats};
use crate::mixer::{lock, Bus};
use crate::nodes::ToneEvent;
use crate::recipes::{SoundId, TextureSpec};
use crate::shaper::{shape, Swell};
use crate::transient::{CancelToken, EventProfile, TransientScheduler};

/// Master volume smoothing.
const VOLUME_SLEW_MS: f32 = 30.0;

/// The ambient engine's slot on the mixer: one graph and a master gain.
pub struct AmbientBus {
    graph: Option<AudioGraph>,
    volume: f32,
    gain: SlewLimiter,
    stats: Arc<GraphStats>,
}

impl AmbientBus {
    pub fn new(volume: f32, sample_rate: f32, stats: Arc<GraphStats>) -> Self {
        Self {
            graph: None,
            volume: clamp01(volume),
            gain: SlewLimiter::new(VOLUME_SLEW_MS, sample_rate.max(1.0)),
            stats,
        }
    }

    /// Id of the graph currently producing sound.
    pub fn active_id(&self) -> Option<GraphId> {
        self.graph.as_ref().filter(|g| g.state() == GraphState::Started).map(AudioGraph::id)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Store a new master volume, clamped to [0, 1]. The audible gain follows
    /// smoothly.
    pub fn set_volume(&mut self, v: f32) {
        self.volume = clamp01(v);
    }

    /// Deliver a transient to graph `id`. Refused, counted and logged when `id`
    /// is not the active graph.
    pub fn trigger(&mut self, id: GraphId, event: &ToneEvent) -> bool {
        let delivered = match self.graph.as_mut() {
            Some(g) if g.id() == id => g.trigger(event),
            _ => false,
        };
        if !delivered {
            self.stats.record_stale();
            warn!(error = %EngineError::StaleScheduleFired { graph: id }, "transient blocked");
        }
        delivered
    }
}

impl Bus for AmbientBus {
    fn render(&mut self, _clock: u64, out: &mut [Frame]) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        for frame in out.iter_mut() {
            let s = graph.next() * self.gain.process(self.volume);
            frame[0] += s;
            frame[1] += s;
        }
    }
}

/// A built soundscape: its graph until started, then the bookkeeping needed
/// to tear it down.
#[derive(Debug)]
pub struct SoundscapeHandle {
    sound: SoundId,
    id: GraphId,
    graph: Option<AudioGraph>,
    transient: Option<EventProfile>,
    token: Option<CancelToken>,
}

impl SoundscapeHandle {
    #[inline] pub fn sound(&self) -> SoundId { self.sound }
    #[inline] pub fn id(&self) -> GraphId { self.id }

    /// A transient run is attached and has not been cancelled.
    pub fn has_transients(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

/// Builds, starts and tears down soundscapes on one ambient bus.
pub struct SoundscapeComposer {
    bus: Arc<Mutex<AmbientBus>>,
    sample_rate: f32,
    noise_seconds: f32,
    stats: Arc<GraphStats>,
    scheduler: TransientScheduler,
    next_id: u64,
}

impl SoundscapeComposer {
    pub fn new(
        bus: Arc<Mutex<AmbientBus>>,
        sample_rate: f32,
        noise_seconds: f32,
        stats: Arc<GraphStats>,
        scheduler: TransientScheduler,
    ) -> Self {
        Self { bus, sample_rate, noise_seconds, stats, scheduler, next_id: 0 }
    }

    /// Build every texture of `sound`'s recipe into a fresh graph. Nothing is
    /// audible until [`start`](Self::start).
    ///
    /// # Errors
    /// - `GraphConstructionFailure` when a layer cannot be created (the partial
    ///   graph is stopped before returning) or `sound` has no recipe.
    /// - `UnsupportedAudioEnvironment` when no buffer can be allocated at all.
    pub fn build(&mut self, sound: SoundId) -> EngineResult<SoundscapeHandle> {
        let recipe = sound
            .recipe()
            .ok_or_else(|| EngineError::construction(sound.as_str(), "no recipe"))?;

        self.next_id += 1;
        let id = GraphId(self.next_id);
        let mut graph = AudioGraph::new(id, sound.as_str(), self.sample_rate, Arc::clone(&self.stats));

        for spec in recipe.textures() {
            if let Err(err) = self.add_texture(&mut graph, spec) {
                graph.stop();
                let err = EngineError::from_synth(sound.as_str(), err);
                warn!(%sound, graph = %id, error = %err, "build failed, partial graph torn down");
                return Err(err);
            }
        }
        debug!(%sound, graph = %id, layers = graph.layer_count(), "graph built");

        Ok(SoundscapeHandle { sound, id, graph: Some(graph), transient: recipe.transient, token: None })
    }

    fn add_texture(&self, graph: &mut AudioGraph, spec: &TextureSpec) -> tranquil_core::SynthResult<()> {
        let buffer = NoiseBuffer::generate(spec.noise, self.noise_seconds, self.sample_rate)?;
        let texture = shape(buffer, spec.filter, spec.gain);
        match spec.swell {
            Some(swell) => graph.add_layer(Swell::new(texture, swell.rate_hz, swell.floor)),
            None => graph.add_layer(texture),
        }
        Ok(())
    }

    /// Put the handle's graph on the bus, start it, then start its transient
    /// run (if the recipe has one).
    ///
    /// # Errors
    /// `GraphConstructionFailure` when the handle was already started or the
    /// bus still carries another graph.
    pub fn start(&self, handle: &mut SoundscapeHandle) -> EngineResult<()> {
        let sound = handle.sound.as_str();
        let mut graph = handle
            .graph
            .take()
            .ok_or_else(|| EngineError::construction(sound, "handle was already started"))?;
        {
            let mut bus = lock(&self.bus);
            if let Some(other) = &bus.graph {
                return Err(EngineError::construction(sound, format!("bus still carries graph {}", other.id())));
            }
            graph.start()?;
            bus.gain.reset(0.0);
            bus.graph = Some(graph);
        }

        if let Some(profile) = handle.transient {
            let id = handle.id;
            let guard_bus = Arc::clone(&self.bus);
            let emit_bus = Arc::clone(&self.bus);
            handle.token = Some(self.scheduler.start(
                profile,
                move || lock(&guard_bus).active_id() == Some(id),
                move |ev| lock(&emit_bus).trigger(id, &ev),
            ));
        }
        debug!(sound, graph = %handle.id, "graph started");
        Ok(())
    }

    /// Cancel the handle's transients, then stop and detach its graph.
    pub fn teardown(&self, mut handle: SoundscapeHandle) {
        if let Some(token) = handle.token.take() {
            self.scheduler.cancel(&token);
        }
        let detached = {
            let mut bus = lock(&self.bus);
            if bus.graph.as_ref().is_some_and(|g| g.id() == handle.id) {
                bus.graph.take()
            } else {
                None
            }
        };
        if let Some(mut graph) = detached.or_else(|| handle.graph.take()) {
            graph.stop();
        }
        debug!(sound = %handle.sound, graph = %handle.id, "graph torn down");
    }
}
