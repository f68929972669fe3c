//! # Visual odometry provider interface
//!
//! VisLoc does not implement frame-to-frame tracking itself, it drives an
//! external odometry provider through the [`VisualOdometry`] trait and treats
//! the result as opaque. Retry and reset policy live entirely in the caller:
//! a provider reports per-frame failure through its error type and is told to
//! start over via [`VisualOdometry::reset`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::eqpt::vis::DepthImage;
use image::DynamicImage;
use nalgebra::{UnitQuaternion, Vector3};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A rigid transform estimate for a single frame pair, in the camera frame.
#[derive(Debug, Clone)]
pub struct CameraPose {
    /// UTC timestamp of the depth frame this pose was computed from
    pub timestamp: DateTime<Utc>,

    /// Rotation from the provider's start frame into the current camera frame
    pub attitude_q: UnitQuaternion<f64>,

    /// Translation from the provider's start frame origin, in the camera
    /// frame, in meters
    pub translation_m: Vector3<f64>,

    /// Pose quality between 0 and 100, derived from the provider's inlier
    /// ratio
    pub quality: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Failure reported by the odometry provider for a single frame.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OdometryError {
    #[error("The tracker lost lock on the scene")]
    TrackingLost,

    #[error("Not enough features could be extracted from the frame")]
    InsufficientFeatures,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A visual odometry provider.
pub trait VisualOdometry {
    /// Process a single RGB+depth frame pair, returning the pose estimate for
    /// that pair.
    ///
    /// The provider's internal tracking state advances whether or not the
    /// caller uses the result.
    fn process(
        &mut self,
        rgb: &DynamicImage,
        depth: &DepthImage,
    ) -> Result<CameraPose, OdometryError>;

    /// Discard all accumulated tracking state and start again from scratch.
    fn reset(&mut self);
}
