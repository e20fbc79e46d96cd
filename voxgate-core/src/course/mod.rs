//! Obstacle course generation.
//!
//! Obstacles sit along a single track axis and are laid out in the direction
//! of travel, which is towards decreasing positions:
//!
//! ```text
//! start ──► obstacle 0 ──► obstacle 1 ──► … ──► obstacle n-1 ──► finish
//!   +5          0             -8                   -8(n-1)        -8n
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxgateError};

/// A labelled target height in [0, 1] for one obstacle's aperture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTarget {
    pub label: String,
    pub height: f64,
}

impl CourseTarget {
    pub fn new(label: impl Into<String>, height: f64) -> Self {
        Self {
            label: label.into(),
            height,
        }
    }
}

/// Inclusive world-space height span the normalised targets are mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightRange {
    pub min: f64,
    pub max: f64,
}

impl HeightRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `min + t·(max − min)`.
    pub fn lerp(&self, t: f64) -> f64 {
        self.min + t * (self.max - self.min)
    }
}

/// A wall with a single square aperture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    pub position: f64,
    pub aperture_center: f64,
    pub aperture_size: f64,
    pub thickness: f64,
    pub label: String,
}

impl Obstacle {
    /// Track position of the face the avatar meets first, widened by `radius`.
    pub fn front_face(&self, radius: f64) -> f64 {
        self.position + self.thickness / 2.0 + radius
    }

    /// Track position of the face the avatar leaves through, widened by `radius`.
    pub fn back_face(&self, radius: f64) -> f64 {
        self.position - self.thickness / 2.0 - radius
    }

    /// Whether an avatar of `radius` centred at `position` touches the wall.
    pub fn overlaps(&self, position: f64, radius: f64) -> bool {
        position <= self.front_face(radius) && position >= self.back_face(radius)
    }

    /// Heights an avatar of `radius` may occupy while inside the wall.
    pub fn passable_heights(&self, radius: f64) -> (f64, f64) {
        let half = self.aperture_size / 2.0;
        (
            self.aperture_center - half + radius,
            self.aperture_center + half - radius,
        )
    }
}

/// Layout parameters for [`generate_course`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CourseConfig {
    /// Distance between consecutive obstacles. Default: 8.
    pub spacing: f64,
    /// Track position of the first obstacle. Default: 0.
    pub first_position: f64,
    /// Side length of each aperture. Default: 1.2.
    pub aperture_size: f64,
    /// Wall thickness along the track. Default: 0.3.
    pub thickness: f64,
    /// World heights that target 0 and target 1 map to. Default: 0.5 to 5.
    pub height_range: HeightRange,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            spacing: 8.0,
            first_position: 0.0,
            aperture_size: 1.2,
            thickness: 0.3,
            height_range: HeightRange::new(0.5, 5.0),
        }
    }
}

impl CourseConfig {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.spacing,
            self.first_position,
            self.aperture_size,
            self.thickness,
            self.height_range.min,
            self.height_range.max,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(VoxgateError::config("course config contains a non-finite value"));
        }
        if self.spacing <= 0.0 {
            return Err(VoxgateError::config(format!(
                "obstacle spacing must be positive, got {}",
                self.spacing
            )));
        }
        if self.aperture_size <= 0.0 {
            return Err(VoxgateError::config(format!(
                "aperture size must be positive, got {}",
                self.aperture_size
            )));
        }
        if self.thickness <= 0.0 {
            return Err(VoxgateError::config(format!(
                "obstacle thickness must be positive, got {}",
                self.thickness
            )));
        }
        if self.height_range.max <= self.height_range.min {
            return Err(VoxgateError::config(format!(
                "height range must be increasing, got [{}, {}]",
                self.height_range.min, self.height_range.max
            )));
        }
        Ok(())
    }
}

/// The generated obstacles plus the finish line, shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub obstacles: Vec<Obstacle>,
    pub finish_position: f64,
}

impl Course {
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

/// Lay out one obstacle per target, `spacing` apart from `first_position`.
///
/// Obstacle `i` sits at `first_position − i·spacing` with its aperture at
/// `height_range.lerp(target.height)`. The finish is one more spacing past
/// the last obstacle.
///
/// # Errors
/// `Configuration` for an empty target list, a non-finite target height or
/// any invalid layout parameter.
pub fn generate_course(targets: &[CourseTarget], config: &CourseConfig) -> Result<Course> {
    config.validate()?;
    if targets.is_empty() {
        return Err(VoxgateError::config("course needs at least one target"));
    }
    if let Some(bad) = targets.iter().find(|t| !t.height.is_finite()) {
        return Err(VoxgateError::config(format!(
            "target '{}' has non-finite height",
            bad.label
        )));
    }

    let obstacles = targets
        .iter()
        .enumerate()
        .map(|(i, target)| Obstacle {
            position: config.first_position - i as f64 * config.spacing,
            aperture_center: config.height_range.lerp(target.height),
            aperture_size: config.aperture_size,
            thickness: config.thickness,
            label: target.label.clone(),
        })
        .collect();

    Ok(Course {
        obstacles,
        finish_position: config.first_position - targets.len() as f64 * config.spacing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn targets(heights: &[f64]) -> Vec<CourseTarget> {
        heights
            .iter()
            .enumerate()
            .map(|(i, h)| CourseTarget::new(format!("n{i}"), *h))
            .collect()
    }

    #[test]
    fn positions_decrease_by_spacing() {
        let course =
            generate_course(&targets(&[0.0, 0.5, 1.0]), &CourseConfig::default()).expect("course");
        let positions: Vec<f64> = course.obstacles.iter().map(|o| o.position).collect();
        assert_eq!(positions, vec![0.0, -8.0, -16.0]);
        assert_eq!(course.finish_position, -24.0);
        assert_eq!(course.obstacles[1].label, "n1");
    }

    #[test]
    fn aperture_heights_follow_height_range() {
        let course =
            generate_course(&targets(&[0.0, 0.5, 1.0]), &CourseConfig::default()).expect("course");
        assert_abs_diff_eq!(course.obstacles[0].aperture_center, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(course.obstacles[1].aperture_center, 2.75, epsilon = 1e-12);
        assert_abs_diff_eq!(course.obstacles[2].aperture_center, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn eight_targets_finish_at_minus_sixty_four() {
        let course = generate_course(&targets(&[0.0; 8]), &CourseConfig::default()).expect("course");
        assert_eq!(course.len(), 8);
        assert_eq!(course.finish_position, -64.0);
    }

    #[test]
    fn rejects_empty_and_malformed_courses() {
        let cfg = CourseConfig::default();
        assert!(generate_course(&[], &cfg).is_err());
        assert!(generate_course(&targets(&[f64::NAN]), &cfg).is_err());

        for bad in [
            CourseConfig { spacing: 0.0, ..CourseConfig::default() },
            CourseConfig { aperture_size: -1.0, ..CourseConfig::default() },
            CourseConfig { thickness: 0.0, ..CourseConfig::default() },
            CourseConfig { first_position: f64::INFINITY, ..CourseConfig::default() },
            CourseConfig { height_range: HeightRange::new(5.0, 0.5), ..CourseConfig::default() },
        ] {
            assert!(
                matches!(generate_course(&targets(&[0.5]), &bad), Err(VoxgateError::Configuration(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn obstacle_geometry_includes_radius() {
        let o = Obstacle {
            position: 0.0,
            aperture_center: 2.0,
            aperture_size: 1.2,
            thickness: 0.3,
            label: "x".into(),
        };
        assert_abs_diff_eq!(o.front_face(0.3), 0.45, epsilon = 1e-12);
        assert_abs_diff_eq!(o.back_face(0.3), -0.45, epsilon = 1e-12);
        assert!(o.overlaps(0.0, 0.3));
        assert!(!o.overlaps(0.46, 0.3));
        let (lo, hi) = o.passable_heights(0.3);
        assert_abs_diff_eq!(lo, 1.7, epsilon = 1e-12);
        assert_abs_diff_eq!(hi, 2.3, epsilon = 1e-12);
    }
}
