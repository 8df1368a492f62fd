//! Realtime output through cpal.
//!
//! The device decides the sample rate, so the mixer is created here and handed
//! to the engines afterwards. The stream callback only pulls from the mixer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::error::{EngineError, EngineResult};
use crate::mixer::Mixer;

fn device_err(e: impl core::fmt::Display) -> EngineError {
    EngineError::Device(e.to_string())
}

/// What to open. Every field falls back to the device default.
#[derive(Clone, Debug, Default)]
pub struct DeviceRequest {
    pub device_name: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Names of the default host's output devices.
///
/// # Errors
/// `Device` when the host cannot enumerate devices.
pub fn list_output_devices() -> EngineResult<Vec<String>> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for dev in host.output_devices().map_err(device_err)? {
        names.push(dev.name().map_err(device_err)?);
    }
    Ok(names)
}

fn pick_device(name: Option<&str>) -> EngineResult<cpal::Device> {
    let host = cpal::default_host();
    info!(host = ?host.id(), "audio host");
    if let Some(name) = name {
        for d in host.output_devices().map_err(device_err)? {
            if d.name().map_err(device_err)? == name {
                return Ok(d);
            }
        }
        return Err(EngineError::Device(format!("requested device not found: {name}")));
    }
    host.default_output_device()
        .ok_or_else(|| EngineError::unsupported("no default output device"))
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> EngineResult<cpal::SupportedStreamConfig> {
    if req_sr.is_none() && req_ch.is_none() {
        return device.default_output_config().map_err(device_err);
    }

    // closest range: sample rate first, then channel count
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs().map_err(device_err)? {
        let ch = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = req_ch.map_or(0, |c| u64::from(ch.abs_diff(c)));
        let sr_pen = match req_sr {
            Some(sr) if (sr_min..=sr_max).contains(&sr) => 0,
            Some(sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            None => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| EngineError::unsupported("no supported output configs"))?;
    let sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(sr))
}

fn build_stream<T>(device: &cpal::Device, cfg: &cpal::StreamConfig, mixer: Mixer) -> EngineResult<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels = usize::from(cfg.channels);
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            cfg,
            move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < out.len() {
                    scratch.resize(out.len(), 0.0);
                }
                let buf = &mut scratch[..out.len()];
                mixer.render_interleaved(buf, channels);
                for (dst, &s) in out.iter_mut().zip(buf.iter()) {
                    *dst = T::from_sample(s);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(device_err)
}

/// An open, playing output stream pulling from its [`Mixer`].
pub struct DeviceOutput {
    mixer: Mixer,
    device_name: String,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl DeviceOutput {
    /// Open the requested device and start pulling.
    ///
    /// # Errors
    /// `UnsupportedAudioEnvironment` when the host has no output device,
    /// `Device` for any other cpal failure.
    #[allow(clippy::cast_precision_loss)]
    pub fn open(req: &DeviceRequest) -> EngineResult<Self> {
        let device = pick_device(req.device_name.as_deref())?;
        let device_name = device.name().map_err(device_err)?;
        let supported = choose_config(&device, req.sample_rate, req.channels)?;
        let sample_format = supported.sample_format();
        let cfg: cpal::StreamConfig = supported.config();

        let mixer = Mixer::new(cfg.sample_rate.0 as f32);
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, mixer.clone())?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, mixer.clone())?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, mixer.clone())?,
            other => return Err(EngineError::Device(format!("unsupported sample format: {other:?}"))),
        };
        stream.play().map_err(device_err)?;
        info!(device = %device_name, rate = cfg.sample_rate.0, channels = cfg.channels, format = ?sample_format, "output stream started");

        Ok(Self { mixer, device_name, sample_rate: cfg.sample_rate.0, channels: cfg.channels, _stream: stream })
    }

    /// The sink both engines attach to.
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
