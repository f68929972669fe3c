//! # Telemetry message definitions
//!
//! Messages output by the visual localisation exec. Two messages are defined:
//!
//! - [`VisPosTm`] - a position-only estimate, emitted once per processed frame
//!   for the flight controller's position fusion.
//! - [`VisStatusTm`] - a fuller status message for monitoring, emitted at a
//!   limited rate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Status flag bit indicating the position estimate is valid.
pub const VIS_STATUS_FLAG_POS_VALID: u32 = 0x01;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position estimate in the world-stabilised frame.
///
/// Emitted once per gate-passing frame outside the reconvergence window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisPosTm {
    /// Timestamp of the depth frame this estimate was derived from, in
    /// microseconds since the unix epoch.
    pub timestamp_us: i64,

    /// Position in meters in the world-stabilised frame.
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

/// Status of the visual localisation subsystem.
///
/// Emitted at a limited rate (default 4 Hz), plus exactly once on disable with
/// non-finite position, zero quality and rate, and cleared flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisStatusTm {
    /// Position in meters in the world-stabilised frame.
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,

    /// Velocity in meters/second in the world-stabilised frame.
    pub vx_ms: f64,
    pub vy_ms: f64,
    pub vz_ms: f64,

    /// Heading reference in degrees.
    pub heading_deg: f64,

    /// Pose quality between 0 and 100, derived from the odometry inlier ratio.
    pub quality: u8,

    /// Rolling average frame rate of the odometry pipeline in Hz.
    pub fps: f64,

    /// Validity flags, see the `VIS_STATUS_FLAG_*` constants.
    pub flags: u32,

    /// Wall clock timestamp in microseconds since the unix epoch.
    pub timestamp_us: i64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Envelope for telemetry published on the TM socket, so that monitors can
/// distinguish packet types from a single subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VisTmMessage {
    /// Per-frame position estimate
    Pos(VisPosTm),

    /// Rate-limited status
    Status(VisStatusTm),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisStatusTm {
    /// True if the position validity flag is set.
    pub fn pos_valid(&self) -> bool {
        self.flags & VIS_STATUS_FLAG_POS_VALID != 0
    }
}
