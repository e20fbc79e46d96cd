//! Blocking pipeline loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Drain ring buffer → FrameAssembler
//! 2. For every complete frame: Session::tick(Some(frame))
//! 3. Broadcast VoiceEvent + AvatarEvent per tick
//! 4. Source stalled longer than the idle interval → Session::tick(None)
//! 5. Finish crossed → status `finished` (ticks continue until stopped)
//! 6. Replay source exhausted and drained → status `stopped`, loop exits
//! ```
//!
//! This entire loop runs in `spawn_blocking`, keeping the Tokio async
//! executor free for event forwarding.

use std::sync::OnceLock;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span};

use crate::{
    buffering::{
        frame::{AudioFrame, FrameAssembler},
        AudioConsumer, Consumer, Observer,
    },
    engine::session::Session,
    ipc::events::{AvatarEvent, SessionStatus, SessionStatusEvent, VoiceEvent},
};

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub frames_in: AtomicUsize,
    pub frames_analysed: AtomicUsize,
    pub ticks: AtomicUsize,
    pub active_ticks: AtomicUsize,
    pub idle_ticks: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.frames_in.store(0, Ordering::Relaxed);
        self.frames_analysed.store(0, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
        self.active_ticks.store(0, Ordering::Relaxed);
        self.idle_ticks.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_analysed: self.frames_analysed.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            active_ticks: self.active_ticks.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Raw samples drained from the ring.
    pub frames_in: usize,
    /// Frames handed to the estimator.
    pub frames_analysed: usize,
    pub ticks: usize,
    /// Ticks where the singer counted as active.
    pub active_ticks: usize,
    /// Ticks run without a frame because the source stalled.
    pub idle_ticks: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub session: Session,
    pub assembler: FrameAssembler,
    pub consumer: AudioConsumer,
    pub running: Arc<AtomicBool>,
    /// Raised by a finite source once its last sample is in the ring.
    /// `None` for live capture.
    pub source_exhausted: Option<Arc<AtomicBool>>,
    /// How long the source may stay silent before a frameless tick runs.
    pub idle_tick_interval: Duration,
    pub voice_tx: broadcast::Sender<VoiceEvent>,
    pub avatar_tx: broadcast::Sender<AvatarEvent>,
    pub status_tx: broadcast::Sender<SessionStatusEvent>,
    pub status: Arc<Mutex<SessionStatus>>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Samples drained from the ring buffer per iteration.
const DRAIN_CHUNK: usize = 1024;

/// Minimum sleep when the ring is empty (avoids busy-wait burning a core).
const DEFAULT_SLEEP_EMPTY_MS: u64 = 2;

/// Ticks between periodic level logs.
const LEVEL_LOG_EVERY: u64 = 60;

/// Run the blocking pipeline until `ctx.running` becomes false or a finite
/// source has been fully consumed.
pub fn run(mut ctx: PipelineContext) {
    let span = info_span!(
        "session",
        sample_rate = ctx.session.sample_rate(),
        frame = ctx.assembler.frame_size(),
        hop = ctx.assembler.hop()
    );
    let _guard = span.enter();
    info!(obstacles = ctx.session.course().len(), "pipeline started");

    let mut raw = vec![0f32; DRAIN_CHUNK];
    let mut last_tick = Instant::now();

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // ── 1. Drain ring buffer ──────────────────────────────────────────
        let n = ctx.consumer.pop_slice(&mut raw);
        if n > 0 {
            ctx.diagnostics.frames_in.fetch_add(n, Ordering::Relaxed);
            ctx.assembler.push(&raw[..n]);
        }

        // ── 2. Tick once per complete frame ───────────────────────────────
        let mut ticked = false;
        while let Some(frame) = ctx.assembler.next_frame() {
            ctx.diagnostics.frames_analysed.fetch_add(1, Ordering::Relaxed);
            tick(&mut ctx, Some(&frame));
            ticked = true;
        }
        if ticked {
            last_tick = Instant::now();
            continue;
        }
        if n > 0 {
            continue;
        }

        // ── 3. Nothing new: finished source, stall, or just early ─────────
        if source_drained(&ctx) {
            info!(
                ticks = ctx.session.ticks(),
                position = ctx.session.avatar().position,
                "frame source exhausted"
            );
            ctx.running.store(false, Ordering::SeqCst);
            set_status(&ctx, SessionStatus::Stopped, Some("frame source exhausted".into()));
            break;
        }
        if last_tick.elapsed() >= ctx.idle_tick_interval {
            tick(&mut ctx, None);
            last_tick = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(empty_sleep_ms()));
    }

    info!(ticks = ctx.session.ticks(), "pipeline stopped");
}

fn source_drained(ctx: &PipelineContext) -> bool {
    match &ctx.source_exhausted {
        // Flag first: once it is set every sample is already in the ring.
        Some(flag) => flag.load(Ordering::SeqCst) && ctx.consumer.is_empty(),
        None => false,
    }
}

fn tick(ctx: &mut PipelineContext, frame: Option<&AudioFrame>) {
    let report = ctx.session.tick(frame);
    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);

    ctx.diagnostics.ticks.fetch_add(1, Ordering::Relaxed);
    if frame.is_none() {
        ctx.diagnostics.idle_ticks.fetch_add(1, Ordering::Relaxed);
    }
    if report.estimation.is_active {
        ctx.diagnostics.active_ticks.fetch_add(1, Ordering::Relaxed);
    }

    if frame.is_some() {
        let _ = ctx
            .voice_tx
            .send(VoiceEvent::new(seq, &report.estimation, report.target));
    }
    let _ = ctx.avatar_tx.send(AvatarEvent::new(seq, &report.avatar));

    if report.crossed_finish {
        set_status(ctx, SessionStatus::Finished, None);
    }

    // Log voice level periodically for diagnostics
    if seq % LEVEL_LOG_EVERY == 0 {
        debug!(
            volume = format_args!("{:.4}", report.estimation.volume),
            pitch = format_args!("{:.3}", report.estimation.pitch),
            hz = format_args!("{:.1}", report.estimation.frequency_hz),
            active = report.estimation.is_active,
            position = format_args!("{:.2}", report.avatar.position),
            height = format_args!("{:.2}", report.avatar.height),
            "voice level check"
        );
    }
}

fn set_status(ctx: &PipelineContext, status: SessionStatus, detail: Option<String>) {
    *ctx.status.lock() = status;
    let _ = ctx.status_tx.send(SessionStatusEvent { status, detail });
}

fn empty_sleep_ms() -> u64 {
    static EMPTY_SLEEP_MS: OnceLock<u64> = OnceLock::new();
    *EMPTY_SLEEP_MS.get_or_init(|| {
        std::env::var("VOXGATE_PIPELINE_EMPTY_SLEEP_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(DEFAULT_SLEEP_EMPTY_MS)
    })
}
