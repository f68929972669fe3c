//! # Plausibility gates
//!
//! Each cycle the raw odometry data passes through a set of gates before it
//! is allowed to influence the position estimate. A gate either passes the
//! data, forces a reset of the odometry, discards the cycle, or suppresses
//! the velocity estimate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;

use comms_if::eqpt::ahrs::AhrsSolution;

use super::params::VisLocParams;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The condition which caused a gate to fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateReason {
    /// Angular rate magnitude exceeded the ceiling
    RotationRate { rate_rads: f64 },

    /// Heading deviated too far from the reference captured at the last reset
    HeadingDeviation { dev_rad: f64 },

    /// The odometry provider failed to track the frame
    TrackingFailure,

    /// Pose quality at or below the minimum
    Quality { quality: u8 },

    /// Computed speed implausibly high
    Speed { speed_ms: f64 },
}

/// Verdict of a gate for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// The data is trusted, continue processing
    Pass,

    /// Discard all accumulated state and reconverge from scratch
    Reset(GateReason),

    /// Drop this cycle entirely, keeping accumulated state and caches
    Discard(GateReason),

    /// Keep the cycle but force the velocity estimate to zero
    SuppressVelocity(GateReason),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Gate on the vehicle's angular rate.
///
/// Fast rotation breaks the frame-to-frame correspondence assumption of the
/// odometry, so above the ceiling the only safe action is a full reset.
pub(crate) fn rotation_gate(ahrs: &AhrsSolution, params: &VisLocParams) -> GateDecision {
    let rate_rads = ahrs.ang_rate_mag_rads();

    if rate_rads > params.max_ang_rate_rads {
        GateDecision::Reset(GateReason::RotationRate { rate_rads })
    } else {
        GateDecision::Pass
    }
}

/// Gate on the deviation of the heading from the reference captured at the
/// last reset.
///
/// The horizontal integration is only valid while the heading stays near the
/// frozen reference, past the ceiling the estimate must be rebuilt.
pub(crate) fn heading_gate(
    yaw_rad: f64,
    head_ref_rad: f64,
    params: &VisLocParams,
) -> GateDecision {
    let dev_rad = (head_ref_rad - yaw_rad).abs();

    if dev_rad > params.max_heading_dev_rad {
        GateDecision::Reset(GateReason::HeadingDeviation { dev_rad })
    } else {
        GateDecision::Pass
    }
}

/// Gate on the pose quality reported by the provider.
///
/// A low quality pose is still a pose, so rather than resetting the velocity
/// is zeroed, freezing the estimate until quality recovers.
pub(crate) fn quality_gate(quality: u8, params: &VisLocParams) -> GateDecision {
    if quality <= params.min_quality {
        GateDecision::SuppressVelocity(GateReason::Quality { quality })
    } else {
        GateDecision::Pass
    }
}

/// Gate on the speed computed by differencing consecutive poses.
///
/// An implausible speed indicates a pose jump, the whole cycle is dropped so
/// that neither the estimate nor the pose cache is polluted.
pub(crate) fn speed_gate(speed_ms: f64, params: &VisLocParams) -> GateDecision {
    if speed_ms < params.max_speed_ms {
        GateDecision::Pass
    } else {
        GateDecision::Discard(GateReason::Speed { speed_ms })
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GateReason::RotationRate { rate_rads } => {
                write!(f, "angular rate too high ({:.3} rad/s)", rate_rads)
            }
            GateReason::HeadingDeviation { dev_rad } => {
                write!(f, "heading deviated from reference ({:.4} rad)", dev_rad)
            }
            GateReason::TrackingFailure => write!(f, "odometry tracking failure"),
            GateReason::Quality { quality } => write!(f, "pose quality too low ({}%)", quality),
            GateReason::Speed { speed_ms } => {
                write!(f, "implausible speed ({:.2} m/s)", speed_ms)
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn ahrs_with_rates(pitch: f64, roll: f64, yaw: f64) -> AhrsSolution {
        AhrsSolution {
            timestamp: Utc::now(),
            pitch_rad: 0.0,
            roll_rad: 0.0,
            yaw_rad: 0.0,
            pitch_rate_rads: pitch,
            roll_rate_rads: roll,
            yaw_rate_rads: yaw,
        }
    }

    #[test]
    fn test_rotation_gate() {
        let params = VisLocParams::default();

        assert_eq!(
            rotation_gate(&ahrs_with_rates(0.1, 0.1, 0.1), &params),
            GateDecision::Pass
        );

        // 0.6 rad/s on each axis gives a magnitude just over 1 rad/s
        match rotation_gate(&ahrs_with_rates(0.6, 0.6, 0.6), &params) {
            GateDecision::Reset(GateReason::RotationRate { rate_rads }) => {
                assert!(rate_rads > 1.0)
            }
            other => panic!("Expected Reset, got {:?}", other),
        }
    }

    #[test]
    fn test_heading_gate() {
        let params = VisLocParams::default();

        assert_eq!(heading_gate(0.1, 0.0, &params), GateDecision::Pass);
        assert!(matches!(
            heading_gate(0.5, 0.0, &params),
            GateDecision::Reset(GateReason::HeadingDeviation { .. })
        ));
        // Symmetric in sign
        assert!(matches!(
            heading_gate(-0.5, 0.0, &params),
            GateDecision::Reset(GateReason::HeadingDeviation { .. })
        ));
    }

    #[test]
    fn test_quality_gate() {
        let params = VisLocParams::default();

        assert_eq!(quality_gate(80, &params), GateDecision::Pass);
        assert_eq!(quality_gate(21, &params), GateDecision::Pass);

        // The threshold itself suppresses
        assert!(matches!(
            quality_gate(20, &params),
            GateDecision::SuppressVelocity(GateReason::Quality { quality: 20 })
        ));
        assert!(matches!(
            quality_gate(0, &params),
            GateDecision::SuppressVelocity(_)
        ));
    }

    #[test]
    fn test_speed_gate() {
        let params = VisLocParams::default();

        assert_eq!(speed_gate(1.5, &params), GateDecision::Pass);
        assert!(matches!(
            speed_gate(2.0, &params),
            GateDecision::Discard(GateReason::Speed { .. })
        ));
        assert!(matches!(
            speed_gate(10.0, &params),
            GateDecision::Discard(_)
        ));
    }
}
