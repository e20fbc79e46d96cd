//! Headless host: runs one course from a microphone or a WAV file and
//! prints the avatar's progress.

mod cli;
mod settings;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use voxgate_core::{
    audio::device::list_input_devices, AvatarEvent, Course, FrameSourceKind, GameEngine,
    SessionStatus, SessionStatusEvent, VoiceEvent,
};

use crate::cli::Args;
use crate::settings::{default_settings_path, load_settings, save_settings};

/// Avatar ticks between progress lines in text mode.
const PROGRESS_EVERY: u64 = 30;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum OutputLine {
    Voice(VoiceEvent),
    Avatar(AvatarEvent),
    Status(SessionStatusEvent),
}

fn emit_json(line: &OutputLine) {
    match serde_json::to_string(line) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!("failed to serialise event: {e}"),
    }
}

fn print_course(course: &Course) {
    println!("{} gates, finish at {:.1}", course.len(), course.finish_position);
    for (i, o) in course.obstacles.iter().enumerate() {
        println!(
            "  #{:<2} {:<6} at {:>6.1}  aperture {:.2} ± {:.2}",
            i + 1,
            o.label,
            o.position,
            o.aperture_center,
            o.aperture_size / 2.0
        );
    }
}

/// Number of gates the avatar is already past.
fn gates_cleared(course: &Course, position: f64, radius: f64) -> usize {
    course
        .obstacles
        .iter()
        .filter(|o| position < o.back_face(radius))
        .count()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("voxgate=info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        for d in list_input_devices() {
            let mut tags = Vec::new();
            if d.is_default {
                tags.push("default");
            }
            if d.is_loopback_like {
                tags.push("loopback?");
            }
            if tags.is_empty() {
                println!("{}", d.name);
            } else {
                println!("{} [{}]", d.name, tags.join(", "));
            }
        }
        return Ok(());
    }

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let mut app_settings = load_settings(&settings_path);
    if let Some(device) = args.device.clone() {
        app_settings.preferred_input_device = Some(device);
        app_settings.normalize();
    }
    if args.save_settings {
        save_settings(&settings_path, &app_settings)
            .with_context(|| format!("writing {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    let engine = Arc::new(GameEngine::new(app_settings.game.clone()).context("invalid game settings")?);
    let course = engine.course();
    if args.show_course {
        print_course(&course);
        return Ok(());
    }

    let source = match args.wav.clone() {
        Some(path) => FrameSourceKind::WavFile {
            path,
            realtime: !args.fast,
        },
        None => FrameSourceKind::Microphone {
            preferred_device: app_settings.preferred_input_device.clone(),
        },
    };

    let mut voice_rx = engine.subscribe_voice();
    let mut avatar_rx = engine.subscribe_avatar();
    let mut status_rx = engine.subscribe_status();

    // start_with_source blocks until the source is open.
    let starter = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || starter.start_with_source(source))
        .await
        .context("start task panicked")??;

    let radius = app_settings.game.motion.radius;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            ev = status_rx.recv() => match ev {
                Ok(ev) => {
                    if args.json {
                        emit_json(&OutputLine::Status(ev.clone()));
                    }
                    match ev.status {
                        SessionStatus::Finished => {
                            println!("finished!");
                            if args.exit_on_finish && engine.is_running() {
                                engine.stop()?;
                            }
                        }
                        SessionStatus::Stopped => break,
                        SessionStatus::Error => {
                            anyhow::bail!("engine error: {}", ev.detail.unwrap_or_default());
                        }
                        SessionStatus::Idle | SessionStatus::Running => {}
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            ev = avatar_rx.recv() => match ev {
                Ok(ev) => {
                    if args.json {
                        emit_json(&OutputLine::Avatar(ev));
                    } else if ev.seq % PROGRESS_EVERY == 0 {
                        println!(
                            "pos {:>7.2}  height {:>5.2}  gates {}/{}",
                            ev.position,
                            ev.height,
                            gates_cleared(&course, ev.position, radius),
                            course.len()
                        );
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            ev = voice_rx.recv() => match ev {
                Ok(ev) => {
                    if args.json {
                        emit_json(&OutputLine::Voice(ev));
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                info!("interrupted");
                if engine.is_running() {
                    engine.stop()?;
                }
            }
        }
    }

    let diag = engine.pipeline_diagnostics_snapshot();
    info!(
        ticks = diag.ticks,
        frames = diag.frames_analysed,
        active = diag.active_ticks,
        idle = diag.idle_ticks,
        "session summary"
    );
    Ok(())
}
