//! Behavioural properties of the simulator on the default course.

use voxgate_core::{
    generate_course, Course, CourseConfig, CourseTarget, MotionConfig, Phase, Simulator,
};

fn course() -> Course {
    let targets: Vec<CourseTarget> = (0..8)
        .map(|i| CourseTarget::new(format!("n{i}"), i as f64 / 7.0))
        .collect();
    generate_course(&targets, &CourseConfig::default()).expect("course")
}

/// Normalised target that lines the avatar up with wall `index`.
fn target_for(course: &Course, motion: &MotionConfig, index: usize) -> f64 {
    let center = course.obstacles[index].aperture_center;
    (center - motion.min_height) / (motion.max_height - motion.min_height)
}

fn next_wall(course: &Course, position: f64, radius: f64) -> Option<usize> {
    course
        .obstacles
        .iter()
        .position(|o| position >= o.back_face(radius))
}

#[test]
fn misaligned_avatar_is_pinned_at_the_front_face() {
    let course = course();
    let motion = MotionConfig::default();
    let mut sim = Simulator::new(motion.clone()).expect("simulator");

    // Wall 0 sits at the bottom; aim for the top and keep pushing.
    for _ in 0..2_000 {
        assert!(!sim.advance(1.0, true, &course));
    }
    let front = course.obstacles[0].front_face(motion.radius);
    let state = sim.state();
    assert!(state.position > front);
    assert!(state.position <= front + motion.forward_speed + 1e-9);
    assert!((state.height - motion.max_height).abs() < 1e-6);
}

#[test]
fn retreat_never_crosses_back_through_a_passed_wall() {
    let course = course();
    let motion = MotionConfig::default();
    let radius = motion.radius;
    let mut sim = Simulator::new(motion.clone()).expect("simulator");

    // Clear the first three walls.
    let cleared = 3;
    while next_wall(&course, sim.state().position, radius).unwrap_or(usize::MAX) < cleared {
        let wall = next_wall(&course, sim.state().position, radius).unwrap_or(0);
        sim.advance(target_for(&course, &motion, wall), true, &course);
    }

    let floor = course.obstacles[cleared - 1].back_face(radius) - motion.retreat_margin;
    let hold = target_for(&course, &motion, cleared);
    for round in 0..400 {
        let moving = round % 3 == 0;
        sim.advance(hold, moving, &course);
        if moving {
            continue;
        }
        let position = sim.state().position;
        assert!(
            position <= floor + 1e-9,
            "round {round}: position {position} retreated past floor {floor}"
        );
    }
}

#[test]
fn reaching_the_finish_is_terminal() {
    let course = course();
    let motion = MotionConfig::default();
    let radius = motion.radius;
    let mut sim = Simulator::new(motion.clone()).expect("simulator");

    let mut crossings = 0;
    for _ in 0..5_000 {
        let wall = next_wall(&course, sim.state().position, radius).unwrap_or(7);
        if sim.advance(target_for(&course, &motion, wall), true, &course) {
            crossings += 1;
        }
    }
    assert_eq!(crossings, 1);
    let finished = sim.state();
    assert_eq!(finished.phase, Phase::Finished);

    // Idle ticks after finishing neither move the avatar nor re-report.
    for _ in 0..100 {
        assert!(!sim.advance(0.0, false, &course));
    }
    let state = sim.state();
    assert_eq!(state.position, finished.position);
    assert!(state.height < finished.height);
}
