//! WAV file replay, for rehearsing a course without a microphone.

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::buffering::{AudioProducer, Observer, Producer};
use crate::error::{Result, VoxgateError};

/// Samples pushed per feeder iteration (≈ 10 ms at 48 kHz).
const FEED_CHUNK: usize = 480;

/// Decode `path` to mono f32, averaging channels.
///
/// Integer formats are scaled by their full-scale value.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| VoxgateError::Wav(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VoxgateError::Wav(e.to_string()))?,
        hound::SampleFormat::Int => {
            let full_scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VoxgateError::Wav(e.to_string()))?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    debug!(
        path = %path.display(),
        samples = mono.len(),
        sample_rate = spec.sample_rate,
        channels,
        "decoded WAV"
    );
    Ok((mono, spec.sample_rate))
}

/// A decoded file waiting to be fed into a ring buffer.
#[derive(Debug, Clone)]
pub struct WavFrameSource {
    path: PathBuf,
    samples: Vec<f32>,
    sample_rate: u32,
}

impl WavFrameSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (samples, sample_rate) = read_wav_mono(&path)?;
        if sample_rate == 0 {
            return Err(VoxgateError::Wav(format!("{}: zero sample rate", path.display())));
        }
        Ok(Self {
            path,
            samples,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Push the file into `producer` on a background thread.
    ///
    /// With `realtime` the feeder sleeps for each chunk's duration, so the
    /// pipeline sees the same pacing a microphone would give it. Otherwise it
    /// pushes as fast as the ring drains. `exhausted` is raised once the last
    /// sample is in the ring; clearing `running` aborts the feed early.
    pub fn spawn_feeder(
        self,
        mut producer: AudioProducer,
        running: Arc<AtomicBool>,
        exhausted: Arc<AtomicBool>,
        realtime: bool,
    ) -> JoinHandle<()> {
        info!(
            path = %self.path.display(),
            seconds = format_args!("{:.2}", self.duration_secs()),
            realtime,
            "replaying WAV file"
        );
        let chunk_duration = Duration::from_secs_f64(FEED_CHUNK as f64 / self.sample_rate as f64);

        thread::spawn(move || {
            let mut offset = 0;
            while offset < self.samples.len() {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let end = (offset + FEED_CHUNK).min(self.samples.len());
                if producer.vacant_len() < end - offset {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
                offset += producer.push_slice(&self.samples[offset..end]);
                if realtime {
                    thread::sleep(chunk_duration);
                }
            }
            exhausted.store(true, Ordering::SeqCst);
            debug!("WAV feeder finished");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::{create_audio_ring, Consumer};

    type Writer = hound::WavWriter<std::io::BufWriter<std::fs::File>>;

    fn temp_wav(name: &str, spec: hound::WavSpec, write: impl FnOnce(&mut Writer)) -> PathBuf {
        let path = std::env::temp_dir().join(format!("voxgate-{}-{name}.wav", std::process::id()));
        let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
        write(&mut writer);
        writer.finalize().expect("finalize wav");
        path
    }

    #[test]
    fn reads_stereo_int16_as_mono() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = temp_wav("stereo16", spec, |w| {
            for _ in 0..100 {
                w.write_sample(16_384i16).expect("left");
                w.write_sample(0i16).expect("right");
            }
        });

        let (samples, rate) = read_wav_mono(&path).expect("read wav");
        std::fs::remove_file(&path).ok();

        assert_eq!(rate, 22_050);
        assert_eq!(samples.len(), 100);
        assert!(samples.iter().all(|s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn reads_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let path = temp_wav("float", spec, |w| {
            for i in 0..10 {
                w.write_sample(i as f32 / 10.0).expect("sample");
            }
        });

        let (samples, _) = read_wav_mono(&path).expect("read wav");
        std::fs::remove_file(&path).ok();
        assert_eq!(samples.len(), 10);
        assert!((samples[5] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_a_wav_error() {
        let err = read_wav_mono(Path::new("/definitely/not/here.wav"));
        assert!(matches!(err, Err(VoxgateError::Wav(_))));
    }

    #[test]
    fn feeder_delivers_every_sample_then_flags_exhausted() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = temp_wav("feeder", spec, |w| {
            for _ in 0..2_000 {
                w.write_sample(1_000i16).expect("sample");
            }
        });
        let source = WavFrameSource::open(&path).expect("open");
        std::fs::remove_file(&path).ok();

        let (producer, mut consumer) = create_audio_ring();
        let running = Arc::new(AtomicBool::new(true));
        let exhausted = Arc::new(AtomicBool::new(false));
        source
            .spawn_feeder(producer, running, Arc::clone(&exhausted), false)
            .join()
            .expect("feeder thread");

        assert!(exhausted.load(Ordering::SeqCst));
        let mut out = vec![0.0f32; 4_096];
        assert_eq!(consumer.pop_slice(&mut out), 2_000);
    }
}
