//! # Auxiliary detectors
//!
//! Detectors are consumers of the localisation state which run alongside the
//! estimator, for example obstacle or marker detectors. They are dispatched
//! on the status tick rather than every frame, and a failing detector never
//! takes down the estimator or the other detectors.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vis::DepthImage;
use image::DynamicImage;
use log::warn;
use nalgebra::Vector3;

use super::odometry::CameraPose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Snapshot of the localisation state handed to each detector.
pub struct VisSnapshot<'a> {
    /// Accumulated position in the world-stabilised frame, in meters
    pub pos_m: Vector3<f64>,

    /// Velocity in the world-stabilised frame, in meters/second
    pub vel_ms: Vector3<f64>,

    /// The pose estimate for the current frame
    pub pose: &'a CameraPose,

    /// Pose quality between 0 and 100
    pub quality: u8,

    /// The RGB frame the pose was computed from
    pub rgb: &'a DynamicImage,

    /// The depth frame the pose was computed from
    pub depth: &'a DepthImage,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Failure of a detector for a single dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("{0}")]
    ProcessError(String),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A detector running alongside the estimator.
pub trait Detector {
    /// Name of the detector, used in log messages.
    fn name(&self) -> &'static str;

    /// Process the given snapshot.
    fn process(&mut self, snapshot: &VisSnapshot) -> Result<(), DetectorError>;
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Dispatch the snapshot to each detector in turn.
///
/// A detector returning an error is logged and skipped, the remaining
/// detectors still run.
pub(crate) fn dispatch(detectors: &mut [Box<dyn Detector>], snapshot: &VisSnapshot) {
    for detector in detectors.iter_mut() {
        if let Err(e) = detector.process(snapshot) {
            warn!("Detector {} failed: {}", detector.name(), e);
        }
    }
}
