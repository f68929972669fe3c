//! # Simulated Odometry Provider
//!
//! A scripted [`VisualOdometry`] implementation for testing the exec without
//! a real tracker. The provider advances its translation at a constant
//! camera-frame velocity between depth frame timestamps and reports a fixed
//! quality.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use comms_if::eqpt::vis::DepthImage;
use image::DynamicImage;
use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;

// Internal
use crate::vis_loc::odometry::{CameraPose, OdometryError, VisualOdometry};
use util::time;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the simulated provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SimOdomParams {
    /// Constant velocity in the camera frame, in meters/second
    pub vel_cam_ms: [f64; 3],

    /// Fixed quality reported for every pose (0 - 100)
    pub quality: u8,
}

/// Simulated odometry provider.
pub struct SimOdom {
    params: SimOdomParams,

    /// Accumulated translation in the camera frame
    translation_m: Vector3<f64>,

    /// Timestamp of the last processed depth frame
    last_time: Option<DateTime<Utc>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimOdom {
    /// Create a new provider from already-loaded parameters.
    pub fn new(params: SimOdomParams) -> Self {
        Self {
            params,
            translation_m: Vector3::zeros(),
            last_time: None,
        }
    }

    /// Initialise the provider, loading parameters from the given file.
    pub fn init(params_path: &str) -> Result<Self, util::params::LoadError> {
        Ok(Self::new(util::params::load(params_path)?))
    }
}

impl VisualOdometry for SimOdom {
    fn process(
        &mut self,
        _rgb: &DynamicImage,
        depth: &DepthImage,
    ) -> Result<CameraPose, OdometryError> {
        if let Some(last) = self.last_time {
            if let Some(dt) = time::duration_to_seconds(depth.timestamp - last) {
                if dt > 0.0 {
                    self.translation_m += Vector3::from(self.params.vel_cam_ms) * dt;
                }
            }
        }

        self.last_time = Some(depth.timestamp);

        Ok(CameraPose {
            timestamp: depth.timestamp,
            attitude_q: UnitQuaternion::identity(),
            translation_m: self.translation_m,
            quality: self.params.quality,
        })
    }

    fn reset(&mut self) {
        self.translation_m = Vector3::zeros();
        self.last_time = None;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};
    use image::ImageBuffer;

    fn depth_at(timestamp: DateTime<Utc>) -> DepthImage {
        DepthImage {
            timestamp,
            image: ImageBuffer::from_pixel(4, 4, image::Luma([1000u16])),
        }
    }

    #[test]
    fn test_constant_velocity_track() {
        let mut odom = SimOdom::new(SimOdomParams {
            vel_cam_ms: [0.0, 0.0, 1.0],
            quality: 80,
        });

        let rgb = DynamicImage::new_luma8(4, 4);
        let epoch = Utc.ymd(2021, 3, 14).and_hms(12, 0, 0);

        // First frame establishes the time base without moving
        let pose = odom.process(&rgb, &depth_at(epoch)).unwrap();
        assert_eq!(pose.translation_m, Vector3::zeros());
        assert_eq!(pose.quality, 80);

        let pose = odom
            .process(&rgb, &depth_at(epoch + Duration::milliseconds(100)))
            .unwrap();
        assert!((pose.translation_m.z - 0.1).abs() < 1e-9);

        // Reset returns to the origin
        odom.reset();
        let pose = odom
            .process(&rgb, &depth_at(epoch + Duration::milliseconds(200)))
            .unwrap();
        assert_eq!(pose.translation_m, Vector3::zeros());
    }
}
