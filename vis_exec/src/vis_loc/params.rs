//! Parameters for the VisLoc module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters controlling the gating and integration behaviour of VisLoc.
///
/// Any value missing from the parameter file takes the default given on the
/// field below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisLocParams {
    /// Maximum angular rate magnitude before the odometry is considered
    /// unreliable and is reset, in radians/second.
    ///
    /// Default: 1.0
    pub max_ang_rate_rads: f64,

    /// Maximum deviation of the heading from the reference captured at the
    /// last reset before the odometry is reset, in radians.
    ///
    /// Default: 0.3927 (22.5 degrees)
    pub max_heading_dev_rad: f64,

    /// Minimum pose quality (0 - 100). At or below this value the velocity
    /// estimate is forced to zero rather than trusting the pose.
    ///
    /// Default: 20
    pub min_quality: u8,

    /// Maximum plausible speed, in meters/second. Cycles producing a higher
    /// speed are discarded outright.
    ///
    /// Default: 2.0
    pub max_speed_ms: f64,

    /// Length of the reconvergence window following a reset, in seconds.
    /// While within the window the position is pinned to zero and the heading
    /// reference tracks the current heading.
    ///
    /// Default: 0.2
    pub grace_window_s: f64,

    /// Minimum time between reset warnings, in seconds. Resets triggered
    /// within this time of the last warned reset are performed silently.
    ///
    /// Default: 0.2
    pub reset_warn_debounce_s: f64,

    /// Minimum time between status telemetry emissions (and detector
    /// dispatches), in seconds.
    ///
    /// Default: 0.25
    pub status_interval_s: f64,

    /// Fixed offset between the camera boresight and the vehicle's zero
    /// heading, in degrees. Added to the heading reference at each reset.
    ///
    /// Default: 0.0
    pub heading_mount_offset_deg: f64,

    /// If true each processing cycle emits a debug log line.
    ///
    /// Default: false
    pub debug_cycle_log: bool,

    /// If true registered detectors are dispatched on the status tick.
    ///
    /// Default: false
    pub enable_detectors: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for VisLocParams {
    fn default() -> Self {
        Self {
            max_ang_rate_rads: 1.0,
            max_heading_dev_rad: 0.3927,
            min_quality: 20,
            max_speed_ms: 2.0,
            grace_window_s: 0.2,
            reset_warn_debounce_s: 0.2,
            status_interval_s: 0.25,
            heading_mount_offset_deg: 0.0,
            debug_cycle_log: false,
            enable_detectors: false,
        }
    }
}
