//! Sing a synthetic voice through the whole default course.

use std::f32::consts::TAU;

use voxgate_core::{AudioFrame, Course, GameConfig, Phase, Session};

const RATE: u32 = 16_000;
const FRAME: usize = 1024;

fn sung(freq: f32) -> AudioFrame {
    let samples = (0..FRAME)
        .map(|i| 0.4 * (TAU * freq * i as f32 / RATE as f32).sin())
        .collect();
    AudioFrame::new(samples, RATE)
}

/// Index of the first wall the avatar has not yet left behind.
fn next_wall(course: &Course, position: f64, radius: f64) -> Option<usize> {
    course
        .obstacles
        .iter()
        .position(|o| position >= o.back_face(radius))
}

fn config() -> GameConfig {
    let mut config = GameConfig::default();
    config.voice.frame_size = FRAME;
    config
}

#[test]
fn singing_each_note_in_turn_reaches_the_finish_once() {
    let config = config();
    let radius = config.motion.radius;
    let mut session = Session::new(&config, RATE).expect("session");
    let course = session.course().clone();
    assert_eq!(course.len(), 8);
    assert_eq!(course.finish_position, -64.0);

    let mut finishes = 0;
    let mut finished_at = None;
    for tick in 0..5_000 {
        let note = next_wall(&course, session.avatar().position, radius)
            .unwrap_or(config.notes.len() - 1);
        let report = session.tick(Some(&sung(config.notes[note].frequency_hz)));
        if report.crossed_finish {
            finishes += 1;
            finished_at.get_or_insert(tick);
        }
    }

    assert_eq!(finishes, 1, "finish must be reported exactly once");
    assert!(finished_at.is_some());
    let avatar = session.avatar();
    assert_eq!(avatar.phase, Phase::Finished);
    assert!(avatar.position <= course.finish_position);
}

#[test]
fn holding_the_first_note_stalls_at_the_second_wall() {
    let config = config();
    let radius = config.motion.radius;
    let mut session = Session::new(&config, RATE).expect("session");
    let second_front = session.course().obstacles[1].front_face(radius);

    let frame = sung(config.notes[0].frequency_hz);
    for _ in 0..1_000 {
        let report = session.tick(Some(&frame));
        assert!(!report.crossed_finish);
    }

    let avatar = session.avatar();
    assert_eq!(avatar.phase, Phase::Approaching);
    assert!(avatar.position > second_front - 1e-9);
    assert!(avatar.position < second_front + config.motion.forward_speed + 1e-9);
}

#[test]
fn falling_silent_drifts_back_but_not_through_a_cleared_wall() {
    let config = config();
    let radius = config.motion.radius;
    let mut session = Session::new(&config, RATE).expect("session");
    let first = session.course().obstacles[0].clone();

    let frame = sung(config.notes[0].frequency_hz);
    while session.avatar().position >= first.back_face(radius) - 1.0 {
        session.tick(Some(&frame));
    }

    let silence = AudioFrame::new(vec![0.0; FRAME], RATE);
    for _ in 0..500 {
        session.tick(Some(&silence));
    }
    assert!(!session.last_estimation().is_active);
    let floor = first.back_face(radius) - config.motion.retreat_margin;
    let position = session.avatar().position;
    assert!((position - floor).abs() < 1e-9, "expected {floor}, got {position}");
}
