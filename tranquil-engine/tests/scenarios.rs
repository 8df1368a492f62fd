//! End-to-end behaviour of the two engines on a shared mixer.

use std::sync::Arc;
use std::time::Duration;

use tranquil_engine::{AmbientConfig, AmbientEngine, BinauralConfig, BinauralEngine, Mixer, Phase, SoundId};

const SR: f32 = 8_000.0;

fn ambient(mixer: &Mixer) -> AmbientEngine {
    AmbientEngine::new(mixer, AmbientConfig { noise_seconds: 0.5, ..AmbientConfig::default() })
}

fn render(mixer: &Mixer, frames: usize) -> Vec<[f32; 2]> {
    let mut out = vec![[0.0; 2]; frames];
    mixer.render(&mut out);
    out
}

#[tokio::test(start_paused = true)]
async fn forest_fires_a_transient_within_ten_seconds() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);

    engine.play(SoundId::Forest).await;
    assert_eq!(engine.current_sound(), SoundId::Forest);
    assert!(engine.is_playing());
    assert!(engine.state().transients_pending);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(engine.stats().transients_fired >= 1);
    assert!(render(&mixer, 4_000).iter().any(|f| f[0] != 0.0));
}

#[tokio::test(start_paused = true)]
async fn changing_to_none_silences_transients() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);

    engine.play(SoundId::Forest).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.change_sound(SoundId::None).await;
    assert_eq!(engine.current_sound(), SoundId::None);
    assert!(!engine.is_playing());

    let fired = engine.stats().transients_fired;
    tokio::time::sleep(Duration::from_secs(9)).await;
    let s = engine.stats();
    assert_eq!(s.transients_fired, fired);
    assert_eq!(s.stale_transients_blocked, 0);
    assert_eq!(s.live_graphs, 0);
    assert!(render(&mixer, 1_000).iter().all(|f| *f == [0.0, 0.0]));
}

#[tokio::test(start_paused = true)]
async fn old_recipe_never_fires_into_the_new_one() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);

    engine.change_sound(SoundId::Forest).await;
    engine.change_sound(SoundId::LightRain).await;
    let fired = engine.stats().transients_fired;

    tokio::time::sleep(Duration::from_secs(30)).await;
    let s = engine.stats();
    assert_eq!(engine.current_sound(), SoundId::LightRain);
    assert_eq!(s.transients_fired, fired);
    assert_eq!(s.stale_transients_blocked, 0);
    assert!(!engine.state().transients_pending);
}

#[tokio::test(start_paused = true)]
async fn rapid_switching_never_overlaps_graphs() {
    let mixer = Mixer::new(SR);
    let engine = Arc::new(ambient(&mixer));

    // keep pulling audio while the requests race
    let puller = tokio::spawn({
        let mixer = mixer.clone();
        async move {
            loop {
                render(&mixer, 80);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    });

    tokio::join!(
        engine.play(SoundId::Forest),
        engine.change_sound(SoundId::BusyCafe),
        engine.play(SoundId::AmbientPiano),
        engine.stop(),
        engine.change_sound(SoundId::GentleWind),
        engine.play(SoundId::OceanWaves),
    );
    let mut tasks = Vec::new();
    for sound in SoundId::ALL.into_iter().cycle().take(20) {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move { engine.change_sound(sound).await }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(20)).await;
    puller.abort();

    let s = engine.stats();
    assert_eq!(s.peak_live_graphs, 1);
    assert!(s.live_graphs <= 1);
    assert_eq!(s.stale_transients_blocked, 0);
    assert_eq!(s.live_graphs, usize::from(engine.is_playing()));
}

#[tokio::test(start_paused = true)]
async fn requests_are_applied_in_order() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);
    tokio::join!(
        engine.play(SoundId::Forest),
        engine.change_sound(SoundId::BusyCafe),
        engine.stop(),
        engine.play(SoundId::OceanWaves),
    );
    assert_eq!(engine.phase(), Phase::Playing(SoundId::OceanWaves));
}

#[tokio::test(start_paused = true)]
async fn stop_when_idle_changes_nothing() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);
    let before = engine.state();
    engine.stop().await;
    engine.stop().await;
    assert_eq!(engine.state(), before);
    assert_eq!(engine.stats().graphs_built, 0);
}

#[tokio::test(start_paused = true)]
async fn volumes_are_clamped_on_both_engines() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);
    engine.set_volume(1.5);
    assert_eq!(engine.volume(), 1.0);
    engine.set_volume(-0.2);
    assert_eq!(engine.volume(), 0.0);
    engine.play(SoundId::WhiteNoise).await;
    assert_eq!(engine.volume(), 0.0);

    let mut binaural = BinauralEngine::new(&mixer, BinauralConfig::default());
    binaural.set_volume(7.0);
    assert_eq!(binaural.volume(), 1.0);
    binaural.set_volume(f32::NAN);
    assert_eq!(binaural.volume(), 0.0);
}

fn rms(block: &[[f32; 2]]) -> f32 {
    (block.iter().map(|f| f[0] * f[0]).sum::<f32>() / block.len() as f32).sqrt()
}

#[tokio::test(start_paused = true)]
async fn volume_change_reaches_the_playing_sound() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);
    engine.set_volume(1.0);
    engine.play(SoundId::WhiteNoise).await;

    // let the 30 ms master slew settle before each measurement
    render(&mixer, 2_000);
    let loud = rms(&render(&mixer, 4_000));
    assert!(loud > 0.01, "loud {loud}");

    engine.set_volume(0.25);
    render(&mixer, 2_000);
    let quiet = rms(&render(&mixer, 4_000));
    let ratio = quiet / loud;
    assert!((ratio - 0.25).abs() < 0.05, "ratio {ratio}");

    engine.set_volume(0.0);
    render(&mixer, 2_000);
    let muted = rms(&render(&mixer, 4_000));
    assert!(muted < 1e-3, "muted {muted}");
    assert!(engine.is_playing());
}

/// Gain after every frame while rendering `frames` frames one at a time.
fn gain_trace(mixer: &Mixer, engine: &BinauralEngine, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|_| {
            render(mixer, 1);
            engine.master_gain()
        })
        .collect()
}

#[test]
fn binaural_play_then_pause_has_no_click() {
    let mixer = Mixer::new(SR);
    let cfg = BinauralConfig { volume: 0.4, fade_in_seconds: 1.0, fade_out_seconds: 1.0, ..BinauralConfig::default() };
    let max_step = 0.4 / SR + 1e-6;
    let mut binaural = BinauralEngine::new(&mixer, cfg);

    binaural.play();
    let up = gain_trace(&mixer, &binaural, 2_000);
    binaural.pause();
    let down = gain_trace(&mixer, &binaural, 9_000);

    assert!(up.windows(2).all(|w| w[1] >= w[0] && w[1] - w[0] <= max_step));
    assert!(down.windows(2).all(|w| w[1] <= w[0]));
    let mut prev = *up.last().unwrap_or(&0.0);
    for g in &down {
        assert!((prev - g).abs() <= max_step);
        prev = *g;
    }
    assert_eq!(*down.last().unwrap(), 0.0);
    assert!(!binaural.is_playing());
}

#[test]
fn binaural_reports_playing_until_fade_out_ends() {
    let mixer = Mixer::new(SR);
    let cfg = BinauralConfig { fade_in_seconds: 0.5, fade_out_seconds: 0.5, ..BinauralConfig::default() };
    let mut binaural = BinauralEngine::new(&mixer, cfg);

    binaural.play();
    binaural.pause();
    assert!(binaural.is_playing());
    render(&mixer, 3_999);
    assert!(binaural.is_playing());
    render(&mixer, 1);
    assert!(!binaural.is_playing());
}

#[tokio::test(start_paused = true)]
async fn engines_share_the_mixer_independently() {
    let mixer = Mixer::new(SR);
    let engine = ambient(&mixer);
    let mut binaural = BinauralEngine::new(
        &mixer,
        BinauralConfig { fade_in_seconds: 0.0, fade_out_seconds: 0.0, ..BinauralConfig::default() },
    );

    binaural.play();
    engine.play(SoundId::LightRain).await;
    engine.stop().await;
    assert!(binaural.is_playing());
    let out = render(&mixer, 800);
    // the binaural pair differs between ears; the ambient bus is mono
    assert!(out.iter().any(|f| (f[0] - f[1]).abs() > 1e-3));

    binaural.pause();
    assert!(!binaural.is_playing());
    engine.play(SoundId::WhiteNoise).await;
    assert!(engine.is_playing());
}

#[tokio::test(start_paused = true)]
async fn headless_host_degrades_silently() {
    let mixer = Mixer::unavailable("no audio output");
    let engine = ambient(&mixer);
    let mut binaural = BinauralEngine::new(&mixer, BinauralConfig::default());

    engine.play(SoundId::Forest).await;
    binaural.play();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(!engine.is_playing());
    assert!(!binaural.is_playing());
    assert_eq!(engine.stats().transients_fired, 0);
}
