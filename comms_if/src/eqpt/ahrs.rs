//! # AHRS Equipment Communications Module
//!
//! Wire format for the attitude solution published by the external attitude
//! and heading reference system.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Attitude and body rates of the vehicle.
///
/// Angles are in radians, rates in radians/second. Yaw follows the right hand
/// rule about the world Z+ (up) axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AhrsSolution {
    /// UTC timestamp of the solution
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Pitch angle in radians
    pub pitch_rad: f64,

    /// Roll angle in radians
    pub roll_rad: f64,

    /// Yaw (heading) angle in radians
    pub yaw_rad: f64,

    /// Pitch rate in radians/second
    pub pitch_rate_rads: f64,

    /// Roll rate in radians/second
    pub roll_rate_rads: f64,

    /// Yaw rate in radians/second
    pub yaw_rate_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AhrsSolution {
    /// Magnitude of the angular rate vector in radians/second.
    pub fn ang_rate_mag_rads(&self) -> f64 {
        (self.pitch_rate_rads * self.pitch_rate_rads
            + self.roll_rate_rads * self.roll_rate_rads
            + self.yaw_rate_rads * self.yaw_rate_rads)
            .sqrt()
    }
}
