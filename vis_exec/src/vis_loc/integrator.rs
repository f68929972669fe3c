//! # Velocity and position integrator
//!
//! Computes the velocity by differencing consecutive camera poses and
//! accumulates it into the world-stabilised position estimate.
//!
//! ## Frames
//!
//! The camera is mounted looking forward, so its axes do not line up with the
//! world frame used by the flight controller. The remap applied here is:
//!
//! - camera depth axis (z) -> world X (forward)
//! - camera lateral axis (x) -> world Y (right)
//! - camera vertical axis (y) -> world Z (down)
//!
//! The horizontal component of each displacement is then rotated by the
//! negated heading reference frozen at the last reset, stabilising the
//! estimate against the heading held when odometry tracking began. The
//! vertical component is integrated directly, heading does not affect it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;

use super::{
    gates::{self, GateDecision, GateReason},
    odometry::CameraPose,
    params::VisLocParams,
    state::EstimatorState,
};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of one integration cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CycleOutcome {
    /// The velocity and position were updated and the pose cached
    Integrated,

    /// The cycle was dropped by the speed sanity gate, no state was mutated
    Discarded(GateReason),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run one integration cycle over the given pose.
///
/// `dt_s` is the time since the previous depth frame, `None` when this is the
/// first frame since a reset. On `Integrated` the pose cache has been updated
/// to `pose`, on `Discarded` it has not.
pub(crate) fn integrate(
    state: &mut EstimatorState,
    pose: &CameraPose,
    dt_s: Option<f64>,
    params: &VisLocParams,
) -> CycleOutcome {
    if let (Some(prev), Some(dt)) = (state.prev_pose.as_ref(), dt_s) {
        // Velocity from consecutive translations, remapped into world axes
        let mut vel_ms = Vector3::new(
            (pose.translation_m.z - prev.translation_m.z) / dt,
            (pose.translation_m.x - prev.translation_m.x) / dt,
            (pose.translation_m.y - prev.translation_m.y) / dt,
        );

        // A low quality pose freezes the estimate rather than moving it
        if let GateDecision::SuppressVelocity(_) = gates::quality_gate(pose.quality, params) {
            vel_ms = Vector3::zeros();
        }

        if let GateDecision::Discard(reason) = gates::speed_gate(vel_ms.norm(), params) {
            return CycleOutcome::Discarded(reason);
        }

        // Rotate the horizontal displacement by the negated heading
        // reference, integrate the vertical directly
        let dx_m = vel_ms.x * dt;
        let dy_m = vel_ms.y * dt;
        let (sin_h, cos_h) = (-state.head_ref_rad).sin_cos();

        state.pos_m.x += dx_m * cos_h - dy_m * sin_h;
        state.pos_m.y += dx_m * sin_h + dy_m * cos_h;
        state.pos_m.z += vel_ms.z * dt;

        state.vel_ms = vel_ms;
    } else {
        // First frame since the reset, nothing to difference against
        state.vel_ms = Vector3::zeros();
    }

    state.prev_pose = Some(pose.clone());
    state.last_frame_time = Some(pose.timestamp);

    CycleOutcome::Integrated
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use nalgebra::UnitQuaternion;

    fn pose_at(translation_m: Vector3<f64>, quality: u8) -> CameraPose {
        CameraPose {
            timestamp: Utc::now(),
            attitude_q: UnitQuaternion::identity(),
            translation_m,
            quality,
        }
    }

    /// Camera-frame axes must land on the expected world axes.
    #[test]
    fn test_axis_remap() {
        let params = VisLocParams::default();
        let mut state = EstimatorState::default();

        // Prime the cache
        assert_eq!(
            integrate(&mut state, &pose_at(Vector3::zeros(), 90), None, &params),
            CycleOutcome::Integrated
        );
        assert_eq!(state.vel_ms, Vector3::zeros());

        // Move 0.1 m along the camera depth axis over 0.1 s
        let pose = pose_at(Vector3::new(0.0, 0.0, 0.1), 90);
        assert_eq!(
            integrate(&mut state, &pose, Some(0.1), &params),
            CycleOutcome::Integrated
        );

        // Depth axis motion becomes world X
        assert!((state.vel_ms.x - 1.0).abs() < 1e-9);
        assert!((state.vel_ms.y).abs() < 1e-9);
        assert!((state.vel_ms.z).abs() < 1e-9);
        assert!((state.pos_m.x - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_integrated_directly() {
        let params = VisLocParams::default();
        let mut state = EstimatorState::default();

        // A non-zero heading reference must not affect vertical motion
        state.head_ref_rad = 1.0;

        integrate(&mut state, &pose_at(Vector3::zeros(), 90), None, &params);

        // Camera vertical axis motion
        let pose = pose_at(Vector3::new(0.0, 0.05, 0.0), 90);
        integrate(&mut state, &pose, Some(0.1), &params);

        assert!((state.pos_m.z - 0.05).abs() < 1e-9);
        assert!((state.pos_m.x).abs() < 1e-9);
        assert!((state.pos_m.y).abs() < 1e-9);
    }

    #[test]
    fn test_heading_rotation() {
        let params = VisLocParams::default();
        let mut state = EstimatorState::default();

        // Heading reference of 90 degrees rotates world X motion onto -Y
        state.head_ref_rad = std::f64::consts::FRAC_PI_2;

        integrate(&mut state, &pose_at(Vector3::zeros(), 90), None, &params);
        integrate(
            &mut state,
            &pose_at(Vector3::new(0.0, 0.0, 0.1), 90),
            Some(0.1),
            &params,
        );

        assert!((state.pos_m.x).abs() < 1e-9);
        assert!((state.pos_m.y + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_low_quality_zeroes_velocity() {
        let params = VisLocParams::default();
        let mut state = EstimatorState::default();

        integrate(&mut state, &pose_at(Vector3::zeros(), 90), None, &params);

        // Large translation but at the minimum quality
        let pose = pose_at(Vector3::new(0.0, 0.0, 0.1), 20);
        assert_eq!(
            integrate(&mut state, &pose, Some(0.1), &params),
            CycleOutcome::Integrated
        );

        assert_eq!(state.vel_ms, Vector3::zeros());
        assert_eq!(state.pos_m, Vector3::zeros());

        // But the pose was still cached
        assert!((state.prev_pose.as_ref().unwrap().translation_m.z - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_implausible_speed_discards_cycle() {
        let params = VisLocParams::default();
        let mut state = EstimatorState::default();

        integrate(&mut state, &pose_at(Vector3::zeros(), 90), None, &params);

        // 3 m/s, over the 2 m/s ceiling
        let pose = pose_at(Vector3::new(0.0, 0.0, 0.3), 90);
        assert!(matches!(
            integrate(&mut state, &pose, Some(0.1), &params),
            CycleOutcome::Discarded(GateReason::Speed { .. })
        ));

        // Nothing was mutated, including the pose cache
        assert_eq!(state.pos_m, Vector3::zeros());
        assert!((state.prev_pose.as_ref().unwrap().translation_m.z).abs() < 1e-9);
    }
}
