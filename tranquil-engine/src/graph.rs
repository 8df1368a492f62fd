//! Audio graph core.
//!
//! This module defines the minimal `Generator` trait and `AudioGraph`, the
//! handle that exclusively owns one playing path (texture layers plus any live
//! transient voices) from generator to output sink.
//!
//! Design goals
//! - No dynamic allocations per sample
//! - A graph has a one-way lifecycle: `Built → Started → Stopped`; a stopped
//!   graph never produces sound again and cannot be restarted
//! - Every start/stop is counted so "at most one live graph" is observable

use core::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::nodes::{ToneEvent, TransientVoice};

/// Stereo frame `[left, right]`.
pub type Frame = [f32; 2];

/// Upper bound on simultaneously sounding transient voices per graph.
pub const MAX_VOICES: usize = 16;

/// Anything that can generate one mono sample at a time.
pub trait Generator {
    /// Called when the node is attached to a graph or the sample rate changes.
    fn reset(&mut self, sr: f32);

    /// Generate the next mono sample. Implementations should assume the sample
    /// rate has been communicated via `reset`.
    fn next(&mut self) -> f32;
}

/// Identity of one graph instance. Ids only grow, so a stale id never matches
/// the active graph again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u64);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GraphState {
    Built,
    Started,
    Stopped,
}

/// Counters shared by every graph an engine creates.
#[derive(Debug, Default)]
pub struct GraphStats {
    live: AtomicUsize,
    peak_live: AtomicUsize,
    built: AtomicU64,
    transients_fired: AtomicU64,
    stale_blocked: AtomicU64,
}

/// Point-in-time copy of [`GraphStats`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Graphs started and not yet stopped.
    pub live_graphs: usize,
    /// Highest `live_graphs` ever observed.
    pub peak_live_graphs: usize,
    pub graphs_built: u64,
    pub transients_fired: u64,
    /// Transient firings refused because their graph was no longer active.
    pub stale_transients_blocked: u64,
}

impl GraphStats {
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            live_graphs: self.live.load(Ordering::SeqCst),
            peak_live_graphs: self.peak_live.load(Ordering::SeqCst),
            graphs_built: self.built.load(Ordering::SeqCst),
            transients_fired: self.transients_fired.load(Ordering::SeqCst),
            stale_transients_blocked: self.stale_blocked.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn record_stale(&self) {
        self.stale_blocked.fetch_add(1, Ordering::SeqCst);
    }

    fn graph_started(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live.fetch_max(live, Ordering::SeqCst);
    }

    fn graph_stopped(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One playing path: texture layers and transient voices summed to mono.
pub struct AudioGraph {
    id: GraphId,
    label: &'static str,
    sr: f32,
    layers: Vec<Box<dyn Generator + Send>>,
    voices: Vec<TransientVoice>,
    state: GraphState,
    stats: Arc<GraphStats>,
}

impl fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioGraph")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("layers", &self.layers.len())
            .field("voices", &self.voices.len())
            .field("state", &self.state)
            .finish()
    }
}

impl AudioGraph {
    pub fn new(id: GraphId, label: &'static str, sr: f32, stats: Arc<GraphStats>) -> Self {
        stats.built.fetch_add(1, Ordering::SeqCst);
        Self {
            id,
            label,
            sr: sr.max(1.0),
            layers: Vec::new(),
            voices: Vec::with_capacity(MAX_VOICES),
            state: GraphState::Built,
            stats,
        }
    }

    /// Wire a layer into the graph. Ignored once the graph has been stopped.
    pub fn add_layer<G: Generator + Send + 'static>(&mut self, mut layer: G) {
        if self.state == GraphState::Stopped {
            return;
        }
        layer.reset(self.sr);
        self.layers.push(Box::new(layer));
    }

    /// Begin producing sound.
    ///
    /// # Errors
    /// Fails with `GraphConstructionFailure` when the graph was already
    /// stopped; a new graph must be built instead.
    pub fn start(&mut self) -> EngineResult<()> {
        match self.state {
            GraphState::Built => {
                self.state = GraphState::Started;
                self.stats.graph_started();
                Ok(())
            }
            GraphState::Started => Ok(()),
            GraphState::Stopped => Err(EngineError::construction(
                self.label,
                format!("graph {} was stopped and cannot restart", self.id),
            )),
        }
    }

    /// Stop and disconnect every node. Idempotent.
    pub fn stop(&mut self) {
        if self.state == GraphState::Started {
            self.stats.graph_stopped();
        }
        self.state = GraphState::Stopped;
        self.layers.clear();
        self.voices.clear();
    }

    /// Add a transient burst. Returns `false` (and plays nothing) unless the
    /// graph is currently started.
    pub fn trigger(&mut self, event: &ToneEvent) -> bool {
        if self.state != GraphState::Started {
            return false;
        }
        if self.voices.len() >= MAX_VOICES {
            // steal the oldest voice
            self.voices.remove(0);
        }
        self.voices.push(TransientVoice::new(event, self.sr));
        self.stats.transients_fired.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Next mono sample; silence unless started.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.state != GraphState::Started {
            return 0.0;
        }
        let mut acc = 0.0;
        for layer in &mut self.layers {
            acc += layer.next();
        }
        let mut any_done = false;
        for v in &mut self.voices {
            acc += v.next();
            any_done |= v.finished();
        }
        if any_done {
            self.voices.retain(|v| !v.finished());
        }
        acc
    }

    #[inline] pub fn id(&self) -> GraphId { self.id }
    #[inline] pub fn state(&self) -> GraphState { self.state }
    #[inline] pub fn layer_count(&self) -> usize { self.layers.len() }
    #[inline] pub fn voice_count(&self) -> usize { self.voices.len() }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.stop();
    }
}
