//! Signal acquisition: live microphone capture and WAV replay.
//!
//! Both sources push mono f32 samples into the SPSC ring producer; the
//! pipeline thread on the other side cuts them into analysis frames.
//!
//! # Real-time constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not block or perform I/O, so it only down-mixes into a scratch
//! buffer it owns and calls the lock-free `push_slice`.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioCapture` must be created and dropped on the same thread;
//! the engine does both inside `spawn_blocking`.

pub mod device;
pub mod wav;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crate::{
    buffering::{AudioProducer, Producer},
    error::{Result, VoxgateError},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{info, warn};

/// Handle to an active microphone stream.
///
/// **Not `Send`**: `cpal::Stream` is bound to its creation thread on Windows/macOS.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag; set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

/// Average interleaved `data` down to mono into `mix`, converting each
/// sample with `to_f32`. Returns the number of frames written.
fn downmix<T: Copy>(data: &[T], channels: usize, mix: &mut Vec<f32>, to_f32: impl Fn(T) -> f32) -> usize {
    let channels = channels.max(1);
    let frames = data.len() / channels;
    mix.resize(frames, 0.0);
    for (out, frame) in mix.iter_mut().zip(data.chunks_exact(channels)) {
        let sum: f32 = frame.iter().map(|s| to_f32(*s)).sum();
        *out = sum / channels as f32;
    }
    frames
}

fn push_or_warn(producer: &mut AudioProducer, samples: &[f32]) {
    let written = producer.push_slice(samples);
    if written < samples.len() {
        warn!(
            dropped = samples.len() - written,
            "ring buffer full: dropping captured samples"
        );
    }
}

impl AudioCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available one.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        mut producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();

        let preferred = preferred_device_name.and_then(|wanted| {
            let found = host.input_devices().ok().and_then(|mut devices| {
                devices.find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            });
            if found.is_none() {
                warn!("preferred input device '{wanted}' not found, falling back");
            }
            found
        });

        let device = match preferred.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| VoxgateError::AudioDevice(e.to_string()))?;
                let fallback = devices.next().ok_or(VoxgateError::NoDefaultInputDevice)?;
                warn!("no default input device, falling back to first available input");
                fallback
            }
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| VoxgateError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let ch = usize::from(channels);

        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let flag = Arc::clone(&running);
        let mut mix: Vec<f32> = Vec::new();
        let on_error = |err: cpal::StreamError| tracing::error!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    if ch == 1 {
                        push_or_warn(&mut producer, data);
                    } else {
                        downmix(data, ch, &mut mix, |s| s);
                        push_or_warn(&mut producer, &mix);
                    }
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    downmix(data, ch, &mut mix, |s| s as f32 / 32768.0);
                    push_or_warn(&mut producer, &mix);
                },
                on_error,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _info| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    downmix(data, ch, &mut mix, |s| (s as f32 - 32768.0) / 32768.0);
                    push_or_warn(&mut producer, &mix);
                },
                on_error,
                None,
            ),
            SampleFormat::U8 => device.build_input_stream(
                &config,
                move |data: &[u8], _info| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    downmix(data, ch, &mut mix, |s| (s as f32 - 128.0) / 128.0);
                    push_or_warn(&mut producer, &mix);
                },
                on_error,
                None,
            ),
            fmt => {
                return Err(VoxgateError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| VoxgateError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| VoxgateError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Stop: signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(VoxgateError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::{create_audio_ring, Consumer};

    #[test]
    fn downmix_averages_channels() {
        let mut mix = Vec::new();
        let frames = downmix(&[1.0f32, 0.0, 0.5, 0.5, -1.0, 1.0], 2, &mut mix, |s| s);
        assert_eq!(frames, 3);
        assert_eq!(mix, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn downmix_converts_integer_formats() {
        let mut mix = Vec::new();
        downmix(&[i16::MIN, 0], 1, &mut mix, |s| s as f32 / 32768.0);
        assert_eq!(mix, vec![-1.0, 0.0]);

        downmix(&[128u8, 255u8], 2, &mut mix, |s| (s as f32 - 128.0) / 128.0);
        assert_eq!(mix.len(), 1);
        assert!((mix[0] - 127.0 / 256.0).abs() < 1e-6);
    }

    #[test]
    fn push_or_warn_reports_through_ring() {
        let (mut producer, mut consumer) = create_audio_ring();
        push_or_warn(&mut producer, &[0.25; 16]);
        let mut out = [0.0f32; 16];
        assert_eq!(consumer.pop_slice(&mut out), 16);
        assert!(out.iter().all(|s| *s == 0.25));
    }
}
