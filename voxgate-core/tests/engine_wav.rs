//! Drive the full engine from a WAV file on disk.

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;
use voxgate_core::{
    FrameSourceKind, GameConfig, GameEngine, Phase, SessionStatus, VoxgateError,
};

const RATE: u32 = 16_000;

fn write_sine_wav(name: &str, freq: f32, seconds: f32) -> PathBuf {
    let path = std::env::temp_dir().join(format!("voxgate-engine-{}-{name}.wav", std::process::id()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
    let total = (seconds * RATE as f32) as usize;
    for i in 0..total {
        let s = 0.5 * (TAU * freq * i as f32 / RATE as f32).sin();
        writer.write_sample((s * i16::MAX as f32) as i16).expect("write sample");
    }
    writer.finalize().expect("finalize");
    path
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wav_replay_runs_until_source_is_exhausted() {
    let config = GameConfig::default();
    let first_note = config.notes[0].frequency_hz;
    let radius = config.motion.radius;
    let engine = GameEngine::new(config).expect("engine");
    let second_front = engine.course().obstacles[1].front_face(radius);

    let path = write_sine_wav("do", first_note, 6.0);
    let mut status_rx = engine.subscribe_status();
    let mut avatar_rx = engine.subscribe_avatar();

    engine
        .start_with_source(FrameSourceKind::WavFile {
            path: path.clone(),
            realtime: false,
        })
        .expect("start");
    assert!(matches!(
        engine.start_with_source(FrameSourceKind::WavFile {
            path: path.clone(),
            realtime: false,
        }),
        Err(VoxgateError::AlreadyRunning)
    ));

    let mut saw_stopped = false;
    while !saw_stopped {
        let ev = tokio::time::timeout(Duration::from_secs(30), status_rx.recv())
            .await
            .expect("status event before timeout")
            .expect("status channel open");
        assert_ne!(ev.status, SessionStatus::Error, "{:?}", ev.detail);
        saw_stopped = ev.status == SessionStatus::Stopped;
    }
    std::fs::remove_file(&path).ok();

    assert_eq!(engine.status(), SessionStatus::Stopped);
    assert!(!engine.is_running());
    assert!(matches!(engine.stop(), Err(VoxgateError::NotRunning)));

    let snap = engine.pipeline_diagnostics_snapshot();
    assert_eq!(snap.frames_in, 6 * RATE as usize);
    assert!(snap.frames_analysed > 300, "{snap:?}");
    assert!(snap.active_ticks > 300, "{snap:?}");

    // Holding Do clears the first wall and stalls against the second.
    let mut last = None;
    loop {
        match avatar_rx.try_recv() {
            Ok(ev) => last = Some(ev),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    let last = last.expect("avatar events");
    assert_eq!(last.phase, Phase::Approaching);
    assert!(last.position > second_front - 1e-9);
    assert!(last.position < second_front + 0.05 + 1e-9);
}

#[tokio::test]
async fn engine_can_restart_after_a_replay() {
    let engine = GameEngine::new(GameConfig::default()).expect("engine");
    let path = write_sine_wav("restart", 440.0, 0.5);

    for _ in 0..2 {
        let mut status_rx = engine.subscribe_status();
        engine
            .start_with_source(FrameSourceKind::WavFile {
                path: path.clone(),
                realtime: false,
            })
            .expect("start");
        loop {
            let ev = tokio::time::timeout(Duration::from_secs(10), status_rx.recv())
                .await
                .expect("status event before timeout")
                .expect("status channel open");
            if ev.status == SessionStatus::Stopped {
                break;
            }
        }
        let snap = engine.pipeline_diagnostics_snapshot();
        assert_eq!(snap.frames_in, RATE as usize / 2);
    }
    std::fs::remove_file(&path).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn immediate_restart_leaves_a_single_pipeline_running() {
    let engine = GameEngine::new(GameConfig::default()).expect("engine");
    let path = write_sine_wav("paced", 261.63, 20.0);
    let source = FrameSourceKind::WavFile {
        path: path.clone(),
        realtime: true,
    };

    engine.start_with_source(source.clone()).expect("first start");
    tokio::time::sleep(Duration::from_millis(300)).await;
    engine.stop().expect("stop");
    assert_eq!(engine.status(), SessionStatus::Stopped);

    // Once stop() returns the old session publishes nothing more.
    let mut avatar_rx = engine.subscribe_avatar();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(avatar_rx.try_recv(), Err(TryRecvError::Empty)));

    engine.start_with_source(source).expect("second start");
    tokio::time::sleep(Duration::from_secs(2)).await;
    let snap = engine.pipeline_diagnostics_snapshot();
    engine.stop().expect("stop again");
    std::fs::remove_file(&path).ok();

    // One paced source delivers about 2 s of audio in 2 s of wall time.
    assert!(snap.frames_in > RATE as usize, "{snap:?}");
    assert!(snap.frames_in < 3 * RATE as usize, "two pipelines fed concurrently: {snap:?}");
}
