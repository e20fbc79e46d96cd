//! `GameEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! GameEngine::new(config)        → config validated, course generated, status = Idle
//!     └─► start_with_source(src) → source open, pipeline spawned, status = Running
//!         ├─► finish crossed     → status = Finished (pipeline keeps ticking)
//!         └─► stop()             → run flag cleared, pipeline joined, status = Stopped
//! ```
//!
//! `start_with_source()`/`stop()` return an error in the wrong state rather
//! than panicking. Every start builds a fresh [`session::Session`] and a fresh
//! run flag, and waits for the previous pipeline thread to exit first, so at
//! most one session ever ticks and publishes at a time.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS (COM / CoreAudio thread affinity).
//! `AudioCapture` is therefore created *inside* the `spawn_blocking` closure so
//! it never crosses a thread boundary. A sync oneshot channel propagates any
//! open errors back to the `start_with_source()` caller.

pub mod pipeline;
pub mod session;

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    audio::{wav::WavFrameSource, AudioCapture},
    buffering::{create_audio_ring, frame::FrameAssembler},
    course::{generate_course, Course, CourseConfig},
    error::{Result, VoxgateError},
    ipc::events::{AvatarEvent, SessionStatus, SessionStatusEvent, VoiceEvent},
    motion::MotionConfig,
    voice::{
        mapping::NoteRange,
        notes::{scale_targets, solfege_scale, Note},
        VoiceConfig,
    },
};

/// Broadcast channel capacity: one second of ticks at the default rate, with headroom.
const BROADCAST_CAP: usize = 256;

/// Upper bound on waiting for a stopped pipeline thread to exit.
const PIPELINE_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything needed to run one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct GameConfig {
    pub voice: VoiceConfig,
    pub course: CourseConfig,
    pub motion: MotionConfig,
    /// Target notes in course order. Default: Do–Re–Mi… C4 to C5.
    pub notes: Vec<Note>,
    /// Analysis frames per second of audio; sets the hop between frames.
    /// Default: 60.
    pub ticks_per_second: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            voice: VoiceConfig::default(),
            course: CourseConfig::default(),
            motion: MotionConfig::default(),
            notes: solfege_scale(),
            ticks_per_second: 60,
        }
    }
}

impl GameConfig {
    /// Check each section plus the constraints that tie them together.
    pub fn validate(&self) -> Result<()> {
        self.voice.validate()?;
        self.course.validate()?;
        self.motion.validate()?;

        if self.course.aperture_size <= 2.0 * self.motion.radius {
            return Err(VoxgateError::config(format!(
                "aperture size {} leaves no room for an avatar of radius {}",
                self.course.aperture_size, self.motion.radius
            )));
        }
        if self.course.height_range.min != self.motion.min_height
            || self.course.height_range.max != self.motion.max_height
        {
            return Err(VoxgateError::config(format!(
                "course heights [{}, {}] differ from avatar heights [{}, {}]",
                self.course.height_range.min,
                self.course.height_range.max,
                self.motion.min_height,
                self.motion.max_height
            )));
        }
        if !(1..=1000).contains(&self.ticks_per_second) {
            return Err(VoxgateError::config(format!(
                "ticks_per_second must lie in [1, 1000], got {}",
                self.ticks_per_second
            )));
        }
        Ok(())
    }

    /// Validate and lay out the course for `notes`.
    pub fn plan(&self) -> Result<CoursePlan> {
        self.validate()?;
        let (note_range, targets) = scale_targets(&self.notes, &self.voice)?;
        let course = generate_course(&targets, &self.course)?;
        Ok(CoursePlan {
            note_range,
            course: Arc::new(course),
        })
    }

    /// Samples between consecutive analysis frames at `sample_rate`.
    pub fn hop_for(&self, sample_rate: u32) -> usize {
        (sample_rate / self.ticks_per_second.max(1)).max(1) as usize
    }
}

/// A generated course together with the pitch span its notes cover.
#[derive(Debug, Clone)]
pub struct CoursePlan {
    pub note_range: NoteRange,
    pub course: Arc<Course>,
}

/// Where the pipeline's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSourceKind {
    /// Live capture; `None` picks the system default input.
    Microphone { preferred_device: Option<String> },
    /// Replay a WAV file. With `realtime` the file is paced like live input,
    /// otherwise it is consumed as fast as the pipeline can analyse it.
    WavFile { path: PathBuf, realtime: bool },
}

/// Keeps the active source alive for as long as the pipeline runs.
enum ActiveSource {
    Microphone(AudioCapture),
    Wav(std::thread::JoinHandle<()>),
}

/// One started pipeline: its private run flag plus an exit signal.
///
/// The pipeline thread holds the matching `Sender` and never sends on it.
/// Dropping it on exit disconnects `exited`.
struct RunHandle {
    running: Arc<AtomicBool>,
    exited: mpsc::Receiver<()>,
}

impl RunHandle {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the run flag and block until the pipeline thread has returned.
    fn shut_down(self) {
        self.running.store(false, Ordering::SeqCst);
        match self.exited.recv_timeout(PIPELINE_EXIT_TIMEOUT) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?PIPELINE_EXIT_TIMEOUT, "pipeline thread did not exit in time");
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        }
    }
}

/// The top-level engine handle.
///
/// `GameEngine` is `Send + Sync`; all mutable fields use interior mutability.
/// Wrap in `Arc<GameEngine>` to share with event-forwarding async tasks.
pub struct GameEngine {
    config: GameConfig,
    plan: CoursePlan,
    /// The current or most recent run; `None` before the first start.
    run: Mutex<Option<RunHandle>>,
    status: Arc<Mutex<SessionStatus>>,
    voice_tx: broadcast::Sender<VoiceEvent>,
    avatar_tx: broadcast::Sender<AvatarEvent>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    /// Monotonically increasing tick sequence counter.
    seq: Arc<AtomicU64>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl GameEngine {
    /// Validate `config` and generate its course. Does not open any source.
    ///
    /// # Errors
    /// `Configuration` for any invalid setting or an empty note list.
    pub fn new(config: GameConfig) -> Result<Self> {
        let plan = config.plan()?;
        info!(
            obstacles = plan.course.len(),
            finish = plan.course.finish_position,
            "course generated"
        );

        let (voice_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (avatar_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Ok(Self {
            config,
            plan,
            run: Mutex::new(None),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            voice_tx,
            avatar_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        })
    }

    /// Start the default microphone.
    pub fn start(&self) -> Result<()> {
        self.start_with_source(FrameSourceKind::Microphone {
            preferred_device: None,
        })
    }

    /// Open `source` and spawn the pipeline.
    ///
    /// Blocks until the source is confirmed open (or fails), then returns.
    /// The pipeline continues running in a background blocking thread.
    ///
    /// # Errors
    /// - `VoxgateError::AlreadyRunning` if already started.
    /// - Device, WAV or `Configuration` errors from opening the source.
    pub fn start_with_source(&self, source: FrameSourceKind) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let (exit_tx, exited) = mpsc::channel::<()>();
        {
            let mut run = self.run.lock();
            if run.as_ref().is_some_and(RunHandle::is_running) {
                return Err(VoxgateError::AlreadyRunning);
            }
            // A drained replay clears its own flag but may still be releasing
            // its source; it must be gone before counters are reset.
            if let Some(previous) = run.take() {
                previous.shut_down();
            }
            *run = Some(RunHandle {
                running: Arc::clone(&running),
                exited,
            });
        }

        self.diagnostics.reset();
        self.seq.store(0, Ordering::SeqCst);
        self.set_status(SessionStatus::Running, None);

        let (producer, consumer) = create_audio_ring();

        // Clone all Arc-wrapped state before moving into the closure.
        let config = self.config.clone();
        let plan = self.plan.clone();
        let pipeline_running = Arc::clone(&running);
        let voice_tx = self.voice_tx.clone();
        let avatar_tx = self.avatar_tx.clone();
        let status_tx = self.status_tx.clone();
        let status = Arc::clone(&self.status);
        let seq = Arc::clone(&self.seq);
        let diagnostics = Arc::clone(&self.diagnostics);

        // Sync oneshot: pipeline thread signals open success/failure.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        tokio::task::spawn_blocking(move || {
            let _exit_tx = exit_tx;
            let running = pipeline_running;
            // ── Open source (must happen on THIS thread; cpal::Stream is !Send) ──
            let exhausted = Arc::new(AtomicBool::new(false));
            let opened = match source {
                FrameSourceKind::Microphone { preferred_device } => AudioCapture::open_with_preference(
                    producer,
                    Arc::clone(&running),
                    preferred_device.as_deref(),
                )
                .map(|capture| (capture.sample_rate, None, ActiveSource::Microphone(capture))),
                FrameSourceKind::WavFile { path, realtime } => {
                    WavFrameSource::open(&path).map(|wav| {
                        let rate = wav.sample_rate();
                        let feeder = wav.spawn_feeder(
                            producer,
                            Arc::clone(&running),
                            Arc::clone(&exhausted),
                            realtime,
                        );
                        (rate, Some(Arc::clone(&exhausted)), ActiveSource::Wav(feeder))
                    })
                }
            };

            let (sample_rate, source_exhausted, active) = match opened {
                Ok(opened) => opened,
                Err(e) => {
                    running.store(false, Ordering::SeqCst);
                    let _ = open_tx.send(Err(e));
                    return;
                }
            };

            // ── Build session (fails fast if the rate cannot be tracked) ──
            let session = match session::Session::from_plan(&config, &plan, sample_rate) {
                Ok(s) => s,
                Err(e) => {
                    running.store(false, Ordering::SeqCst);
                    let _ = open_tx.send(Err(e));
                    release(active);
                    return;
                }
            };
            let hop = config.hop_for(sample_rate);
            info!(sample_rate, hop, "frame source open");
            let _ = open_tx.send(Ok(sample_rate));

            pipeline::run(pipeline::PipelineContext {
                session,
                assembler: FrameAssembler::new(config.voice.frame_size, hop, sample_rate),
                consumer,
                running,
                source_exhausted,
                idle_tick_interval: Duration::from_secs_f64(2.0 * hop as f64 / sample_rate as f64),
                voice_tx,
                avatar_tx,
                status_tx,
                status,
                seq,
                diagnostics,
            });

            // Stream drops here, releasing the audio device on this thread.
            release(active);
        });

        match open_rx.recv() {
            Ok(Ok(_rate)) => {
                info!("engine started");
                Ok(())
            }
            Ok(Err(e)) => {
                running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                // Channel closed before a message was sent; spawn_blocking panicked?
                running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some("pipeline failed to start".into()));
                Err(VoxgateError::Other(anyhow::anyhow!(
                    "pipeline task died unexpectedly"
                )))
            }
        }
    }

    /// Stop the source and the pipeline.
    ///
    /// Returns once the pipeline thread has exited, so no event from this run
    /// is published after `stop()` returns.
    ///
    /// # Errors
    /// - `VoxgateError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        let handle = {
            let mut run = self.run.lock();
            if !run.as_ref().is_some_and(RunHandle::is_running) {
                return Err(VoxgateError::NotRunning);
            }
            run.take()
        };
        if let Some(handle) = handle {
            handle.shut_down();
        }
        self.set_status(SessionStatus::Stopped, None);
        info!("engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run.lock().as_ref().is_some_and(RunHandle::is_running)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The course every session of this engine runs on.
    pub fn course(&self) -> Arc<Course> {
        Arc::clone(&self.plan.course)
    }

    pub fn note_range(&self) -> NoteRange {
        self.plan.note_range
    }

    /// Subscribe to per-frame pitch and volume events.
    pub fn subscribe_voice(&self) -> broadcast::Receiver<VoiceEvent> {
        self.voice_tx.subscribe()
    }

    /// Subscribe to per-tick avatar placement events.
    pub fn subscribe_avatar(&self) -> broadcast::Receiver<AvatarEvent> {
        self.avatar_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn pipeline_diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: SessionStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(SessionStatusEvent {
            status: new_status,
            detail,
        });
    }
}

fn release(source: ActiveSource) {
    match source {
        ActiveSource::Microphone(capture) => capture.stop(),
        ActiveSource::Wav(feeder) => {
            if feeder.join().is_err() {
                warn!("WAV feeder thread panicked");
            }
        }
    }
}
