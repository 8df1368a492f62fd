//! Probabilistic transient events (bird chirps, cup clinks, piano notes).
//!
//! A scheduler run is one tokio task looping "fire, check, sleep a random
//! interval". Two independent things stop it:
//! - the activity guard, re-checked before every reschedule and before every
//!   firing, which turns false once the owning soundscape is no longer active;
//! - the [`CancelToken`], which aborts the task and its pending sleep at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::mixer::lock;
use crate::nodes::{ToneEvent, Wave};

/// How a profile picks the pitch of each event.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Pitch {
    /// Uniform in `[lo_hz, hi_hz]`.
    Range { lo_hz: f32, hi_hz: f32 },
    /// One of a fixed set of notes.
    Scale(&'static [f32]),
}

/// Everything needed to generate a stream of transient events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EventProfile {
    pub name: &'static str,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub pitch: Pitch,
    /// End-of-burst frequency ratio (1.0 = steady).
    pub glide: f32,
    pub wave: Wave,
    pub attack_s: f32,
    pub min_decay_s: f32,
    pub max_decay_s: f32,
    pub gain: f32,
}

impl EventProfile {
    /// Delay before the next event, uniform in `[min_interval_ms, max_interval_ms]`.
    pub fn next_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = self.min_interval_ms.min(self.max_interval_ms);
        let hi = self.min_interval_ms.max(self.max_interval_ms);
        Duration::from_millis(rng.gen_range(lo..=hi))
    }

    /// Draw one concrete event.
    pub fn sample_event<R: Rng + ?Sized>(&self, rng: &mut R) -> ToneEvent {
        let freq_hz = match self.pitch {
            Pitch::Range { lo_hz, hi_hz } if hi_hz > lo_hz => rng.gen_range(lo_hz..=hi_hz),
            Pitch::Range { lo_hz, .. } => lo_hz,
            Pitch::Scale(notes) if !notes.is_empty() => notes[rng.gen_range(0..notes.len())],
            Pitch::Scale(_) => 440.0,
        };
        let decay_s = if self.max_decay_s > self.min_decay_s {
            rng.gen_range(self.min_decay_s..=self.max_decay_s)
        } else {
            self.min_decay_s
        };
        ToneEvent { freq_hz, glide: self.glide, wave: self.wave, attack_s: self.attack_s, decay_s, gain: self.gain }
    }
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    task: Mutex<Option<AbortHandle>>,
}

/// Handle to one scheduler run. Cloning shares the same run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Stop the run and drop its pending timer. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = lock(&self.inner.task).take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn attach(&self, task: AbortHandle) {
        if self.is_cancelled() {
            task.abort();
        } else {
            *lock(&self.inner.task) = Some(task);
        }
    }
}

/// Starts and cancels transient runs on the current tokio runtime.
#[derive(Debug, Default)]
pub struct TransientScheduler {
    seed: Option<u64>,
    runs: AtomicU64,
}

impl TransientScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic event streams (per run: `seed + run index`).
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed), runs: AtomicU64::new(0) }
    }

    /// Fire the first event now, then keep firing at random intervals while
    /// `still_active()` holds and `emit` accepts events.
    ///
    /// `emit` returns `false` when the event could not be delivered; the run
    /// then ends. Outside a tokio runtime no run is started and the returned
    /// token is already cancelled.
    pub fn start<G, E>(&self, profile: EventProfile, still_active: G, mut emit: E) -> CancelToken
    where
        G: Fn() -> bool + Send + 'static,
        E: FnMut(ToneEvent) -> bool + Send + 'static,
    {
        let token = CancelToken::default();
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            warn!(profile = profile.name, "no async runtime; transients disabled");
            token.cancel();
            return token;
        };

        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        let mut rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(run)),
            None => SmallRng::from_entropy(),
        };
        let task_token = token.clone();

        let task = rt.spawn(async move {
            loop {
                if task_token.is_cancelled() || !still_active() {
                    break;
                }
                let ev = profile.sample_event(&mut rng);
                trace!(profile = profile.name, freq = ev.freq_hz, "transient");
                if !emit(ev) {
                    break;
                }
                // the guard decides whether there is a next event at all
                if !still_active() {
                    break;
                }
                tokio::time::sleep(profile.next_interval(&mut rng)).await;
            }
            debug!(profile = profile.name, "transient run finished");
        });
        token.attach(task.abort_handle());
        token
    }

    /// Cancel a run. Same as [`CancelToken::cancel`].
    pub fn cancel(&self, token: &CancelToken) {
        token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    const CHIRP: EventProfile = EventProfile {
        name: "test-chirp",
        min_interval_ms: 3_000,
        max_interval_ms: 8_000,
        pitch: Pitch::Range { lo_hz: 2_000.0, hi_hz: 4_000.0 },
        glide: 1.3,
        wave: Wave::Sine,
        attack_s: 0.01,
        min_decay_s: 0.15,
        max_decay_s: 0.3,
        gain: 0.1,
    };

    fn recorder() -> (Arc<Mutex<Vec<Instant>>>, impl FnMut(ToneEvent) -> bool + Send + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |_ev: ToneEvent| {
            sink.lock().unwrap().push(Instant::now());
            true
        })
    }

    #[test]
    fn events_respect_profile_ranges() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let d = CHIRP.next_interval(&mut rng);
            assert!(d >= Duration::from_millis(3_000) && d <= Duration::from_millis(8_000));
            let ev = CHIRP.sample_event(&mut rng);
            assert!((2_000.0..=4_000.0).contains(&ev.freq_hz));
            assert!((0.15..=0.3).contains(&ev.decay_s));
        }
        const NOTES: &[f32] = &[261.6, 329.6];
        let piano = EventProfile { pitch: Pitch::Scale(NOTES), ..CHIRP };
        for _ in 0..100 {
            assert!(NOTES.contains(&piano.sample_event(&mut rng).freq_hz));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_at_random_intervals() {
        let sched = TransientScheduler::with_seed(1);
        let (log, emit) = recorder();
        let t0 = Instant::now();
        let token = sched.start(CHIRP, || true, emit);

        tokio::time::sleep(Duration::from_secs(60)).await;
        sched.cancel(&token);

        let times = log.lock().unwrap().clone();
        assert!(times.len() >= 60 / 8, "only {} events", times.len());
        assert!(times[0] - t0 < Duration::from_millis(5));
        for w in times.windows(2) {
            let gap = w[1] - w[0];
            assert!(gap >= Duration::from_millis(3_000) && gap <= Duration::from_millis(8_001), "gap {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn guard_is_checked_before_every_reschedule() {
        let sched = TransientScheduler::with_seed(2);
        let (log, emit) = recorder();
        let checks = Arc::new(AtomicUsize::new(0));
        let seen = checks.clone();
        // active for the first five checks only
        let token = sched.start(CHIRP, move || seen.fetch_add(1, Ordering::SeqCst) < 5, emit);

        tokio::time::sleep(Duration::from_secs(120)).await;
        let fired = log.lock().unwrap().len();
        // check #1 before fire 1, #2 before its reschedule, #3 before fire 2,
        // #4 before reschedule, #5 before fire 3, #6 refuses the reschedule
        assert_eq!(fired, 3);
        assert_eq!(checks.load(Ordering::SeqCst), 6);
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_timer() {
        let sched = TransientScheduler::with_seed(3);
        let (log, emit) = recorder();
        let token = sched.start(CHIRP, || true, emit);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(log.lock().unwrap().len(), 1);

        token.cancel();
        token.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_event_ends_the_run() {
        let sched = TransientScheduler::with_seed(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        sched.start(CHIRP, || true, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            false
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn without_runtime_nothing_is_scheduled() {
        let sched = TransientScheduler::new();
        let token = sched.start(CHIRP, || true, |_| panic!("must not fire"));
        assert!(token.is_cancelled());
    }
}
