//! Internal state of the VisLoc module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::Serialize;

use super::odometry::CameraPose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Accumulated estimator state.
///
/// Mutated only by the integrator and by a reset, which returns everything
/// except the frame rate tracking and warning debounce to its default.
pub(crate) struct EstimatorState {
    /// Accumulated position in the world-stabilised frame, in meters
    pub pos_m: Vector3<f64>,

    /// Velocity in the world-stabilised frame, in meters/second
    pub vel_ms: Vector3<f64>,

    /// Heading reference frozen at the end of the last reconvergence window,
    /// in radians. Includes the camera mounting offset.
    pub head_ref_rad: f64,

    /// Wall clock time at which the current reset began, in seconds
    pub reset_start_s: f64,

    /// Wall clock time of the last logged reset warning, in seconds
    pub last_warn_s: f64,

    /// Quality of the last pose returned by the provider
    pub quality: u8,

    /// Previous pose, retained for velocity differencing
    pub prev_pose: Option<CameraPose>,

    /// Timestamp of the previous depth frame
    pub last_frame_time: Option<DateTime<Utc>>,

    /// Rolling average frame rate over the last status interval, in Hz
    pub fps: f64,

    /// Number of frames accumulated in the current status interval
    pub window_frames: u32,

    /// Sum of instantaneous frame rates over the current status interval
    pub window_rate_sum: f64,

    /// Wall clock time of the last status emission, in seconds
    pub last_tick_s: f64,
}

/// Status report of the VisLoc module, archived once per integrated cycle.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusReport {
    pub time_s: f64,
    pub mode: &'static str,
    pub pos_x_m: f64,
    pub pos_y_m: f64,
    pub pos_z_m: f64,
    pub vel_x_ms: f64,
    pub vel_y_ms: f64,
    pub vel_z_ms: f64,
    pub quality: u8,
    pub fps: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for EstimatorState {
    fn default() -> Self {
        Self {
            pos_m: Vector3::zeros(),
            vel_ms: Vector3::zeros(),
            head_ref_rad: 0.0,
            // Negative infinity so that the first reset always warns and the
            // first status tick fires immediately
            reset_start_s: f64::NEG_INFINITY,
            last_warn_s: f64::NEG_INFINITY,
            quality: 0,
            prev_pose: None,
            last_frame_time: None,
            fps: 0.0,
            window_frames: 0,
            window_rate_sum: 0.0,
            last_tick_s: f64::NEG_INFINITY,
        }
    }
}
