//! C ABI wrapper for the Tranquil engines.
//!
//! Exposes the two collaborator contracts (start/stop a named sound and
//! read/set its volume; binaural play/pause/volume) plus an interleaved render
//! pull for hosts that own the audio device.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`; the header lives in
//!   `include/tranquil.h`.
//! - Opaque handle type: `TranquilEngine` (heap-allocated; you own/delete it).
//! - Null handles are accepted everywhere and do nothing.
//!
//! Threading
//! - The handle is NOT thread-safe; call every function from one thread.
//! - The handle owns a single-threaded async runtime. Transient events
//!   (chirps, clinks, notes) advance whenever the host calls into the library,
//!   so hosts should render continuously.

use std::ffi::{c_char, CStr};

use tranquil_engine::{AmbientConfig, AmbientEngine, BinauralConfig, BinauralEngine, Mixer, SoundId};

/// Opaque handle: one mixer, both engines, and the runtime driving them.
pub struct TranquilEngine {
    mixer: Mixer,
    ambient: AmbientEngine,
    binaural: BinauralEngine,
    // dropped last, after the engines have cancelled their tasks
    rt: tokio::runtime::Runtime,
}

impl TranquilEngine {
    fn new(sample_rate: f32) -> std::io::Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
        let mixer = Mixer::new(sample_rate);
        let ambient = AmbientEngine::new(&mixer, AmbientConfig::default());
        let binaural = BinauralEngine::new(&mixer, BinauralConfig::default());
        Ok(Self { mixer, ambient, binaural, rt })
    }

    /// Let due timers and transient tasks run.
    fn pump(&self) {
        self.rt.block_on(tokio::task::yield_now());
    }
}

/// # Safety
/// `engine` must be null or a live pointer from [`tranquil_create`].
unsafe fn handle<'a>(engine: *mut TranquilEngine) -> Option<&'a mut TranquilEngine> {
    engine.as_mut()
}

// --- Creation / destruction -------------------------------------------------------

/// Create both engines on a mixer running at `sample_rate`.
/// Returns null when the runtime cannot be created. A non-positive sample rate
/// yields a handle whose every operation is silent.
#[no_mangle]
pub extern "C" fn tranquil_create(sample_rate: f32) -> *mut TranquilEngine {
    match TranquilEngine::new(sample_rate) {
        Ok(e) => Box::into_raw(Box::new(e)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Destroy an engine previously returned by `tranquil_create`.
///
/// # Safety
/// `engine` must be null or a pointer from [`tranquil_create`] not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn tranquil_destroy(engine: *mut TranquilEngine) {
    if engine.is_null() {
        return;
    }
    let mut e = Box::from_raw(engine);
    let TranquilEngine { rt, ambient, binaural, .. } = &mut *e;
    rt.block_on(ambient.dispose());
    binaural.dispose();
}

// --- Ambient ---------------------------------------------------------------------

/// Play the sound named `id` (e.g. `"forest"`; `"none"` stops).
/// Returns `false` for a null/invalid/unknown id, `true` otherwise, even when
/// the host has no audio (playback then stays silent).
///
/// # Safety
/// `engine` as for [`tranquil_destroy`]; `id` must be null or a NUL-terminated
/// string.
#[no_mangle]
pub unsafe extern "C" fn tranquil_play(engine: *mut TranquilEngine, id: *const c_char) -> bool {
    let Some(e) = handle(engine) else { return false };
    if id.is_null() {
        return false;
    }
    let Some(sound) = CStr::from_ptr(id).to_str().ok().and_then(|s| s.parse::<SoundId>().ok()) else {
        return false;
    };
    e.rt.block_on(e.ambient.play(sound));
    true
}

/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_stop(engine: *mut TranquilEngine) {
    if let Some(e) = handle(engine) {
        e.rt.block_on(e.ambient.stop());
    }
}

/// Ambient volume, clamped to [0, 1].
///
/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_set_volume(engine: *mut TranquilEngine, volume: f32) {
    if let Some(e) = handle(engine) {
        e.ambient.set_volume(volume);
    }
}

/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_volume(engine: *mut TranquilEngine) -> f32 {
    handle(engine).map_or(0.0, |e| e.ambient.volume())
}

/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_is_playing(engine: *mut TranquilEngine) -> bool {
    handle(engine).is_some_and(|e| e.ambient.is_playing())
}

// --- Binaural --------------------------------------------------------------------

/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_binaural_play(engine: *mut TranquilEngine) {
    if let Some(e) = handle(engine) {
        e.binaural.play();
    }
}

/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_binaural_pause(engine: *mut TranquilEngine) {
    if let Some(e) = handle(engine) {
        e.binaural.pause();
    }
}

/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_binaural_set_volume(engine: *mut TranquilEngine, volume: f32) {
    if let Some(e) = handle(engine) {
        e.binaural.set_volume(volume);
    }
}

/// Stays `true` until a fade-out has fully completed.
///
/// # Safety
/// `engine` as for [`tranquil_destroy`].
#[no_mangle]
pub unsafe extern "C" fn tranquil_binaural_is_playing(engine: *mut TranquilEngine) -> bool {
    handle(engine).is_some_and(|e| e.binaural.is_playing())
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels`
/// channels. Mono gets the L/R average; channels beyond two repeat L/R.
///
/// Returns the number of frames rendered (0 on error).
///
/// # Safety
/// `engine` as for [`tranquil_destroy`]; `out_interleaved` must point to at
/// least `frames * channels` writable floats.
#[no_mangle]
pub unsafe extern "C" fn tranquil_render_interleaved_f32(
    engine: *mut TranquilEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    let Some(e) = handle(engine) else { return 0 };
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let ch = channels as usize;
    let out = std::slice::from_raw_parts_mut(out_interleaved, frames as usize * ch);
    e.pump();
    e.mixer.render_interleaved(out, ch);
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(e: *mut TranquilEngine, frames: u32) -> Vec<f32> {
        let mut buf = vec![0.0_f32; frames as usize * 2];
        let n = unsafe { tranquil_render_interleaved_f32(e, buf.as_mut_ptr(), frames, 2) };
        assert_eq!(n, frames);
        buf
    }

    #[test]
    fn play_render_stop() {
        let e = tranquil_create(8_000.0);
        assert!(!e.is_null());
        unsafe {
            assert!(tranquil_play(e, c"light-rain".as_ptr()));
            assert!(tranquil_is_playing(e));
            let audio = render(e, 4_000);
            assert!(audio.iter().any(|s| *s != 0.0));
            assert!(audio.iter().all(|s| s.abs() <= 1.0));

            tranquil_stop(e);
            tranquil_stop(e);
            assert!(!tranquil_is_playing(e));
            tranquil_destroy(e);
        }
    }

    #[test]
    fn unknown_ids_and_null_handles_are_rejected() {
        let e = tranquil_create(8_000.0);
        unsafe {
            assert!(!tranquil_play(e, c"thunderstorm".as_ptr()));
            assert!(!tranquil_play(e, std::ptr::null()));
            assert!(!tranquil_play(std::ptr::null_mut(), c"forest".as_ptr()));
            assert_eq!(tranquil_render_interleaved_f32(std::ptr::null_mut(), std::ptr::null_mut(), 8, 2), 0);
            assert!(!tranquil_is_playing(e));
            tranquil_destroy(e);
            tranquil_destroy(std::ptr::null_mut());
        }
    }

    #[test]
    fn volumes_are_clamped() {
        let e = tranquil_create(8_000.0);
        unsafe {
            tranquil_set_volume(e, 3.0);
            assert_eq!(tranquil_volume(e), 1.0);
            tranquil_binaural_set_volume(e, -1.0);
            tranquil_destroy(e);
        }
    }

    #[test]
    fn binaural_fades_out_before_reporting_stopped() {
        let e = tranquil_create(1_000.0);
        unsafe {
            tranquil_binaural_play(e);
            render(e, 2_000);
            tranquil_binaural_pause(e);
            assert!(tranquil_binaural_is_playing(e));
            render(e, 1_000);
            assert!(tranquil_binaural_is_playing(e));
            render(e, 1_000);
            assert!(!tranquil_binaural_is_playing(e));
            tranquil_destroy(e);
        }
    }
}
