//! # Visual Localisation Module (VisLoc)
//!
//! VisLoc turns the raw pose stream of a visual odometry provider into a
//! drift-managed position estimate for the flight controller.
//!
//! Each RGB+depth frame pair is pushed through [`VisLocMgr::step`], which:
//!
//! 1. Gates the cycle on angular rate and heading deviation, resetting the
//!    odometry if either fires.
//! 2. Obtains the frame's pose from the provider, resetting on tracking
//!    failure.
//! 3. Differences consecutive poses into a velocity and integrates it into
//!    the world-stabilised position (see [`integrator`]).
//! 4. Holds the estimate at zero during the reconvergence window following a
//!    reset, tracking the heading reference until the window expires.
//! 5. Emits a position TM for every surviving frame and a status TM at a
//!    limited rate, dispatching registered detectors on the same tick.
//!
//! The module is driven by the caller's clock (`wall_time_s` in
//! [`FrameInput`]), it never reads a clock of its own, which keeps all the
//! timing behaviour deterministic under test.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod attitude;
pub mod detectors;
mod gates;
mod integrator;
pub mod odometry;
mod params;
mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use chrono::Utc;
use log::{debug, info, warn};
use nalgebra::Vector3;

// Internal
use comms_if::{
    eqpt::vis::DepthImage,
    tc::{Tc, TcResponse},
    tm::{VisPosTm, VisStatusTm, VIS_STATUS_FLAG_POS_VALID},
};
use image::DynamicImage;
use util::{archive::Archiver, maths, session::Session, time};

use attitude::AttitudeSource;
use detectors::{Detector, VisSnapshot};
use gates::{GateDecision, GateReason};
use integrator::CycleOutcome;
use odometry::VisualOdometry;
use state::{EstimatorState, StatusReport};

// Exports
pub use params::VisLocParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Visual localisation manager.
pub struct VisLocMgr {
    /// Module parameters
    pub params: VisLocParams,

    /// Camera mounting offset converted to radians at construction
    head_mount_offset_rad: f64,

    /// Current mode of the estimator
    mode: Mode,

    /// Accumulated estimator state
    state: EstimatorState,

    /// The odometry provider, if one is available
    odometry: Option<Box<dyn VisualOdometry>>,

    /// Source of attitude solutions for the gates
    attitude: Box<dyn AttitudeSource>,

    /// Registered auxiliary detectors
    detectors: Vec<Box<dyn Detector>>,

    /// Archiver for the cyclic status report
    arch_status: Archiver,
}

/// Input to a single processing cycle.
pub struct FrameInput<'a> {
    /// The RGB frame
    pub rgb: &'a DynamicImage,

    /// The depth frame
    pub depth: &'a DepthImage,

    /// Wall clock time of this cycle in seconds. Must be monotonic between
    /// calls, the session elapsed time is used in flight.
    pub wall_time_s: f64,
}

/// Telemetry produced by a single processing cycle.
pub struct StepOutput {
    /// Position estimate, produced for every frame surviving the gates
    /// outside the reconvergence window
    pub pos_tm: Option<VisPosTm>,

    /// Status message, produced at a limited rate
    pub status_tm: Option<VisStatusTm>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Mode of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Disabled, frames are ignored
    Idle,

    /// Within the reconvergence window following a reset
    Resetting,

    /// Integrating and publishing estimates
    Running,
}

/// Errors which can occur within VisLoc.
#[derive(Debug, thiserror::Error)]
pub enum VisLocError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("No odometry provider is available")]
    NoOdometryProvider,

    #[error("Could not initialise the status archive: {0}")]
    ArchiveError(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisLocMgr {
    /// Create a new manager from already-loaded parameters.
    pub fn new(
        params: VisLocParams,
        odometry: Option<Box<dyn VisualOdometry>>,
        attitude: Box<dyn AttitudeSource>,
    ) -> Self {
        let head_mount_offset_rad = maths::deg_to_rad(params.heading_mount_offset_deg);

        if params.heading_mount_offset_deg != 0.0 {
            info!(
                "Camera heading mount offset: {} deg",
                params.heading_mount_offset_deg
            );
        }

        Self {
            params,
            head_mount_offset_rad,
            mode: Mode::Idle,
            state: EstimatorState::default(),
            odometry,
            attitude,
            detectors: Vec::new(),
            arch_status: Archiver::default(),
        }
    }

    /// Initialise the manager, loading parameters from the given file.
    pub fn init(
        params_path: &str,
        odometry: Option<Box<dyn VisualOdometry>>,
        attitude: Box<dyn AttitudeSource>,
    ) -> Result<Self, VisLocError> {
        let params: VisLocParams =
            util::params::load(params_path).map_err(VisLocError::ParamLoadError)?;

        Ok(Self::new(params, odometry, attitude))
    }

    /// Initialise the status archive within the given session.
    pub fn init_archives(&mut self, session: &Session) -> Result<(), VisLocError> {
        self.arch_status = Archiver::from_path(session, "vis_loc_status.csv")
            .map_err(|e| VisLocError::ArchiveError(e.to_string()))?;

        Ok(())
    }

    /// Register an auxiliary detector.
    ///
    /// If detectors are disabled in the parameters the detector is dropped.
    pub fn register_detector(&mut self, detector: Box<dyn Detector>) {
        if self.params.enable_detectors {
            info!("Registered detector: {}", detector.name());
            self.detectors.push(detector);
        } else {
            info!(
                "Detectors are disabled, ignoring detector: {}",
                detector.name()
            );
        }
    }

    /// Current mode of the estimator.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True if the estimator is enabled (resetting or running).
    pub fn is_enabled(&self) -> bool {
        self.mode != Mode::Idle
    }

    /// Accumulated position in the world-stabilised frame, in meters.
    pub fn position_m(&self) -> Vector3<f64> {
        self.state.pos_m
    }

    /// Current velocity in the world-stabilised frame, in meters/second.
    pub fn velocity_ms(&self) -> Vector3<f64> {
        self.state.vel_ms
    }

    /// Execute a telecommand.
    ///
    /// Returns the response for the sender and, for a disable, the final
    /// status TM which must be published so consumers mark the estimate
    /// stale.
    pub fn exec_tc(&mut self, tc: &Tc, wall_time_s: f64) -> (TcResponse, Option<VisStatusTm>) {
        match tc {
            Tc::VisionEnable => match self.start(wall_time_s) {
                Ok(()) => (TcResponse::Ok, None),
                Err(e) => {
                    warn!("Cannot enable visual localisation: {}", e);
                    (TcResponse::CannotExecute, None)
                }
            },
            Tc::VisionDisable => (TcResponse::Ok, self.stop()),
            Tc::Heartbeat => (TcResponse::Ok, None),
        }
    }

    /// Enable the estimator.
    ///
    /// Enabling an already enabled estimator has no effect. Fails if no
    /// odometry provider is available.
    pub fn start(&mut self, wall_time_s: f64) -> Result<(), VisLocError> {
        if self.odometry.is_none() {
            return Err(VisLocError::NoOdometryProvider);
        }

        if self.mode != Mode::Idle {
            return Ok(());
        }

        info!("Visual localisation enabled");
        self.begin_reset(wall_time_s);

        Ok(())
    }

    /// Disable the estimator.
    ///
    /// Returns the final status TM to publish, with non-finite position,
    /// zero quality and frame rate, and cleared flags. Disabling an already
    /// idle estimator does nothing and returns `None`.
    pub fn stop(&mut self) -> Option<VisStatusTm> {
        if self.mode == Mode::Idle {
            return None;
        }

        info!("Visual localisation disabled");

        self.mode = Mode::Idle;
        self.state = EstimatorState::default();

        let heading_deg = self
            .attitude
            .read()
            .map(|a| maths::rad_to_deg(a.yaw_rad))
            .unwrap_or(0.0);

        Some(VisStatusTm {
            x_m: f64::NAN,
            y_m: f64::NAN,
            z_m: f64::NAN,
            vx_ms: 0.0,
            vy_ms: 0.0,
            vz_ms: 0.0,
            heading_deg,
            quality: 0,
            fps: 0.0,
            flags: 0,
            timestamp_us: time::timestamp_to_micros(&Utc::now()),
        })
    }

    /// Process one RGB+depth frame pair.
    ///
    /// All per-cycle failures are absorbed here, a gated or failed cycle
    /// simply produces no telemetry.
    pub fn step(&mut self, frame: &FrameInput) -> StepOutput {
        if self.mode == Mode::Idle {
            return StepOutput::none();
        }

        // Attitude is required by the gates, without a solution the cycle
        // cannot be safely processed
        let ahrs = match self.attitude.read() {
            Some(a) => a,
            None => {
                debug!("No attitude solution available, skipping frame");
                return StepOutput::none();
            }
        };

        if self.params.debug_cycle_log {
            debug!(
                "VisLoc cycle at {:.3} s, mode {:?}",
                frame.wall_time_s, self.mode
            );
        }

        // ---- PRE-ODOMETRY GATES ----

        if let GateDecision::Reset(reason) = gates::rotation_gate(&ahrs, &self.params) {
            self.trigger_reset(reason, frame.wall_time_s);
            return StepOutput::none();
        }

        if let GateDecision::Reset(reason) =
            gates::heading_gate(ahrs.yaw_rad, self.state.head_ref_rad, &self.params)
        {
            self.trigger_reset(reason, frame.wall_time_s);
            return StepOutput::none();
        }

        // ---- ODOMETRY ----

        let pose_result = match self.odometry.as_mut() {
            Some(odometry) => odometry.process(frame.rgb, frame.depth),
            None => return StepOutput::none(),
        };

        let pose = match pose_result {
            Ok(p) => p,
            Err(e) => {
                debug!("Odometry provider failed: {}", e);
                self.trigger_reset(GateReason::TrackingFailure, frame.wall_time_s);
                return StepOutput::none();
            }
        };

        self.state.quality = pose.quality;

        // Time since the previous depth frame, `None` for the first frame
        // after a reset. A non-advancing timestamp skips the cycle without
        // touching the pose cache.
        let dt_s = match self.state.last_frame_time {
            Some(last) => match time::duration_to_seconds(pose.timestamp - last) {
                Some(dt) if dt > 0.0 => Some(dt),
                _ => {
                    debug!("Depth frame timestamp did not advance, skipping cycle");
                    return StepOutput::none();
                }
            },
            None => None,
        };

        // ---- INTEGRATION ----

        match integrator::integrate(&mut self.state, &pose, dt_s, &self.params) {
            CycleOutcome::Integrated => (),
            CycleOutcome::Discarded(reason) => {
                debug!("Cycle discarded: {}", reason);
                return StepOutput::none();
            }
        }

        // ---- RECONVERGENCE WINDOW ----

        // While within the window the estimate is pinned to zero and the
        // heading reference tracks the current heading, freezing at whatever
        // value it has when the window expires
        if frame.wall_time_s - self.state.reset_start_s < self.params.grace_window_s {
            self.state.head_ref_rad = ahrs.yaw_rad + self.head_mount_offset_rad;
            self.state.pos_m = Vector3::zeros();
            return StepOutput::none();
        }

        if self.mode == Mode::Resetting {
            info!(
                "Visual odometry reconverged, heading reference {:.2} deg",
                maths::rad_to_deg(self.state.head_ref_rad)
            );
            self.mode = Mode::Running;
        }

        // ---- TELEMETRY ----

        let pos_tm = VisPosTm {
            timestamp_us: time::timestamp_to_micros(&pose.timestamp),
            x_m: self.state.pos_m.x,
            y_m: self.state.pos_m.y,
            z_m: self.state.pos_m.z,
        };

        if let Some(dt) = dt_s {
            self.state.window_frames += 1;
            self.state.window_rate_sum += 1.0 / dt;
        }

        let mut status_tm = None;

        if frame.wall_time_s - self.state.last_tick_s > self.params.status_interval_s {
            self.state.last_tick_s = frame.wall_time_s;

            if self.state.window_frames > 0 {
                self.state.fps = self.state.window_rate_sum / self.state.window_frames as f64;
                self.state.window_frames = 0;
                self.state.window_rate_sum = 0.0;
            }

            status_tm = Some(VisStatusTm {
                x_m: self.state.pos_m.x,
                y_m: self.state.pos_m.y,
                z_m: self.state.pos_m.z,
                vx_ms: self.state.vel_ms.x,
                vy_ms: self.state.vel_ms.y,
                vz_ms: self.state.vel_ms.z,
                heading_deg: maths::rad_to_deg(self.state.head_ref_rad),
                quality: self.state.quality,
                fps: self.state.fps,
                flags: VIS_STATUS_FLAG_POS_VALID,
                timestamp_us: time::timestamp_to_micros(&Utc::now()),
            });

            // Detectors run on the status tick, a failing detector is
            // isolated inside the dispatch
            if self.params.enable_detectors && !self.detectors.is_empty() {
                let snapshot = VisSnapshot {
                    pos_m: self.state.pos_m,
                    vel_ms: self.state.vel_ms,
                    pose: &pose,
                    quality: self.state.quality,
                    rgb: frame.rgb,
                    depth: frame.depth,
                };

                detectors::dispatch(&mut self.detectors, &snapshot);
            }
        }

        // ---- ARCHIVING ----

        if self.arch_status.is_init() {
            let report = StatusReport {
                time_s: frame.wall_time_s,
                mode: self.mode.as_str(),
                pos_x_m: self.state.pos_m.x,
                pos_y_m: self.state.pos_m.y,
                pos_z_m: self.state.pos_m.z,
                vel_x_ms: self.state.vel_ms.x,
                vel_y_ms: self.state.vel_ms.y,
                vel_z_ms: self.state.vel_ms.z,
                quality: self.state.quality,
                fps: self.state.fps,
            };

            if let Err(e) = self.arch_status.serialise(report) {
                warn!("Could not archive VisLoc status: {}", e);
            }
        }

        StepOutput {
            pos_tm: Some(pos_tm),
            status_tm,
        }
    }

    /// Reset the odometry in response to a fired gate.
    ///
    /// The warning is debounced against the last warned reset, so persistent
    /// failures keep producing a warning per debounce period rather than
    /// going silent after the first.
    fn trigger_reset(&mut self, reason: GateReason, wall_time_s: f64) {
        if wall_time_s - self.state.last_warn_s > self.params.reset_warn_debounce_s {
            warn!("Resetting visual odometry: {}", reason);
            self.state.last_warn_s = wall_time_s;
        }

        self.begin_reset(wall_time_s);
    }

    /// Discard all accumulated state and start the reconvergence window.
    fn begin_reset(&mut self, wall_time_s: f64) {
        if let Some(ref mut odometry) = self.odometry {
            odometry.reset();
        }

        // Capture the heading reference immediately so the heading gate does
        // not re-fire against a stale reference, the reconvergence window
        // keeps tracking it until it expires
        if let Some(ahrs) = self.attitude.read() {
            self.state.head_ref_rad = ahrs.yaw_rad + self.head_mount_offset_rad;
        }

        self.state.pos_m = Vector3::zeros();
        self.state.vel_ms = Vector3::zeros();
        self.state.prev_pose = None;
        self.state.last_frame_time = None;
        self.state.reset_start_s = wall_time_s;

        self.mode = Mode::Resetting;
    }
}

impl StepOutput {
    /// An output carrying no telemetry.
    pub fn none() -> Self {
        Self {
            pos_tm: None,
            status_tm: None,
        }
    }
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "IDLE",
            Mode::Resetting => "RESETTING",
            Mode::Running => "RUNNING",
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use comms_if::eqpt::ahrs::AhrsSolution;
    use image::ImageBuffer;
    use nalgebra::UnitQuaternion;
    use odometry::{CameraPose, OdometryError};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Odometry provider fed from a queue of scripted results.
    struct ScriptedOdometry {
        results: Rc<RefCell<VecDeque<Result<CameraPose, OdometryError>>>>,
        resets: Rc<Cell<usize>>,
    }

    impl VisualOdometry for ScriptedOdometry {
        fn process(
            &mut self,
            _rgb: &DynamicImage,
            _depth: &DepthImage,
        ) -> Result<CameraPose, OdometryError> {
            self.results
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(OdometryError::TrackingLost))
        }

        fn reset(&mut self) {
            self.resets.set(self.resets.get() + 1);
        }
    }

    /// Attitude source returning a shared, test-controlled solution.
    struct SharedAttitude(Rc<RefCell<AhrsSolution>>);

    impl AttitudeSource for SharedAttitude {
        fn read(&mut self) -> Option<AhrsSolution> {
            Some(*self.0.borrow())
        }
    }

    /// Detector counting its dispatches, optionally failing each time.
    struct CountingDetector {
        name: &'static str,
        calls: Rc<Cell<usize>>,
        fail: bool,
    }

    impl Detector for CountingDetector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process(&mut self, _snapshot: &VisSnapshot) -> Result<(), detectors::DetectorError> {
            self.calls.set(self.calls.get() + 1);

            if self.fail {
                Err(detectors::DetectorError::ProcessError(
                    "scripted failure".into(),
                ))
            } else {
                Ok(())
            }
        }
    }

    /// Test harness driving a manager with scripted poses and attitude.
    struct Harness {
        mgr: VisLocMgr,
        results: Rc<RefCell<VecDeque<Result<CameraPose, OdometryError>>>>,
        resets: Rc<Cell<usize>>,
        ahrs: Rc<RefCell<AhrsSolution>>,
        rgb: DynamicImage,
        depth: DepthImage,
        epoch: DateTime<Utc>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_params(VisLocParams::default())
        }

        fn with_params(params: VisLocParams) -> Self {
            let epoch = Utc.ymd(2021, 3, 14).and_hms(12, 0, 0);

            let results = Rc::new(RefCell::new(VecDeque::new()));
            let resets = Rc::new(Cell::new(0));
            let ahrs = Rc::new(RefCell::new(AhrsSolution {
                timestamp: epoch,
                pitch_rad: 0.0,
                roll_rad: 0.0,
                yaw_rad: 0.0,
                pitch_rate_rads: 0.0,
                roll_rate_rads: 0.0,
                yaw_rate_rads: 0.0,
            }));

            let odometry = ScriptedOdometry {
                results: results.clone(),
                resets: resets.clone(),
            };

            let mgr = VisLocMgr::new(
                params,
                Some(Box::new(odometry)),
                Box::new(SharedAttitude(ahrs.clone())),
            );

            Self {
                mgr,
                results,
                resets,
                ahrs,
                rgb: DynamicImage::new_luma8(4, 4),
                depth: DepthImage {
                    timestamp: epoch,
                    image: ImageBuffer::from_pixel(4, 4, image::Luma([1000u16])),
                },
                epoch,
            }
        }

        /// Step the manager with a scripted pose at the given wall time. The
        /// pose timestamp is derived from the wall time.
        fn step_pose(&mut self, wall_s: f64, translation_m: Vector3<f64>, quality: u8) -> StepOutput {
            let timestamp = self.epoch + Duration::microseconds((wall_s * 1e6).round() as i64);

            self.results.borrow_mut().push_back(Ok(CameraPose {
                timestamp,
                attitude_q: UnitQuaternion::identity(),
                translation_m,
                quality,
            }));

            self.step(wall_s)
        }

        fn step(&mut self, wall_s: f64) -> StepOutput {
            self.mgr.step(&FrameInput {
                rgb: &self.rgb,
                depth: &self.depth,
                wall_time_s: wall_s,
            })
        }

        /// Run frames with the camera advancing along its depth axis at the
        /// given speed, from frame `first` to `last` inclusive, spaced
        /// `spacing_s` apart.
        fn run_forward(&mut self, first: u32, last: u32, spacing_s: f64, speed_ms: f64, quality: u8) {
            for k in first..=last {
                let t = k as f64 * spacing_s;
                self.step_pose(t, Vector3::new(0.0, 0.0, speed_ms * t), quality);
            }
        }
    }

    #[test]
    fn test_enable_requires_odometry() {
        let mut harness = Harness::new();
        harness.mgr.odometry = None;

        assert!(matches!(
            harness.mgr.start(0.0),
            Err(VisLocError::NoOdometryProvider)
        ));

        let (response, status) = harness.mgr.exec_tc(&Tc::VisionEnable, 0.0);
        assert!(matches!(response, TcResponse::CannotExecute));
        assert!(status.is_none());
        assert_eq!(harness.mgr.mode(), Mode::Idle);
    }

    #[test]
    fn test_idle_ignores_frames() {
        let mut harness = Harness::new();

        let output = harness.step_pose(0.0, Vector3::zeros(), 90);
        assert!(output.pos_tm.is_none());
        assert!(output.status_tm.is_none());
        assert_eq!(harness.mgr.mode(), Mode::Idle);
    }

    #[test]
    fn test_running_after_grace_window() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        assert_eq!(harness.mgr.mode(), Mode::Resetting);

        // Frames within the 0.2 s window produce no telemetry and hold the
        // position at zero
        for k in 1..4 {
            let output = harness.step_pose(k as f64 * 0.05, Vector3::zeros(), 90);
            assert!(output.pos_tm.is_none());
            assert_eq!(harness.mgr.mode(), Mode::Resetting);
            assert_eq!(harness.mgr.position_m(), Vector3::zeros());
        }

        // The frame at 0.2 s is outside the window
        let output = harness.step_pose(0.2, Vector3::zeros(), 90);
        assert!(output.pos_tm.is_some());
        assert_eq!(harness.mgr.mode(), Mode::Running);
    }

    #[test]
    fn test_enable_is_idempotent() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        assert_eq!(harness.resets.get(), 1);

        // A second enable must not restart the reconvergence window
        harness.mgr.start(0.05).unwrap();
        assert_eq!(harness.resets.get(), 1);

        harness.step_pose(0.1, Vector3::zeros(), 90);
        let output = harness.step_pose(0.21, Vector3::zeros(), 90);
        assert!(output.pos_tm.is_some());
        assert_eq!(harness.mgr.mode(), Mode::Running);
    }

    #[test]
    fn test_constant_velocity_integration() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();

        // 1 m/s along the camera depth axis, 20 Hz frames
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        // Frames at 0.20 through 0.40 s integrate, 5 frames of 0.05 m each
        assert_eq!(harness.mgr.mode(), Mode::Running);
        assert!((harness.mgr.position_m().x - 0.25).abs() < 1e-9);
        assert!(harness.mgr.position_m().y.abs() < 1e-9);
        assert!(harness.mgr.position_m().z.abs() < 1e-9);
        assert!((harness.mgr.velocity_ms().x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_heading_stabilised_integration() {
        let mut harness = Harness::new();

        // Vehicle heading 90 degrees, camera depth axis motion must map onto
        // world -Y
        harness.ahrs.borrow_mut().yaw_rad = std::f64::consts::FRAC_PI_2;

        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        assert_eq!(harness.mgr.mode(), Mode::Running);
        assert!(harness.mgr.position_m().x.abs() < 1e-9);
        assert!((harness.mgr.position_m().y + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_gate_resets() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        let resets_before = harness.resets.get();
        assert!(harness.mgr.position_m().x > 0.0);

        // Spin fast enough to break the gate
        harness.ahrs.borrow_mut().yaw_rate_rads = 1.5;
        let output = harness.step_pose(0.45, Vector3::new(0.0, 0.0, 0.45), 90);

        assert!(output.pos_tm.is_none());
        assert_eq!(harness.mgr.mode(), Mode::Resetting);
        assert_eq!(harness.mgr.position_m(), Vector3::zeros());
        assert_eq!(harness.resets.get(), resets_before + 1);
    }

    #[test]
    fn test_heading_gate_resets() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);
        assert_eq!(harness.mgr.mode(), Mode::Running);

        // Yaw away from the frozen reference by more than 0.3927 rad
        harness.ahrs.borrow_mut().yaw_rad = 0.5;
        let output = harness.step_pose(0.45, Vector3::new(0.0, 0.0, 0.45), 90);

        assert!(output.pos_tm.is_none());
        assert_eq!(harness.mgr.mode(), Mode::Resetting);
        assert_eq!(harness.mgr.position_m(), Vector3::zeros());

        // The reference was re-captured at the reset, so the estimator
        // reconverges at the new heading rather than resetting forever
        for k in 10..=13 {
            harness.step_pose(k as f64 * 0.05, Vector3::new(0.0, 0.0, k as f64 * 0.05), 90);
        }
        assert_eq!(harness.mgr.mode(), Mode::Running);
        assert!((harness.mgr.state.head_ref_rad - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tracking_failure_resets() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        let resets_before = harness.resets.get();

        harness
            .results
            .borrow_mut()
            .push_back(Err(OdometryError::TrackingLost));
        let output = harness.step(0.45);

        assert!(output.pos_tm.is_none());
        assert_eq!(harness.mgr.mode(), Mode::Resetting);
        assert_eq!(harness.resets.get(), resets_before + 1);
    }

    #[test]
    fn test_reset_warnings_repeat_under_persistent_loss() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        // One second of tracking loss at 25 Hz. Every cycle resets, but a
        // warning is only eligible once per debounce period, and they must
        // keep coming rather than stopping after the first.
        let mut warn_times = Vec::new();
        for k in 0..25 {
            let t = 0.45 + k as f64 * 0.04;
            harness
                .results
                .borrow_mut()
                .push_back(Err(OdometryError::TrackingLost));
            harness.step(t);

            if warn_times.last() != Some(&harness.mgr.state.last_warn_s) {
                warn_times.push(harness.mgr.state.last_warn_s);
            }
        }

        assert_eq!(harness.mgr.mode(), Mode::Resetting);
        assert!(warn_times.len() >= 4);
        for pair in warn_times.windows(2) {
            assert!(pair[1] - pair[0] > 0.2 - 1e-9);
        }
    }

    #[test]
    fn test_status_heading_is_frozen_reference() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);
        assert_eq!(harness.mgr.mode(), Mode::Running);

        // Drift the live yaw to just inside the gate ceiling, the published
        // heading must stay at the reference frozen when the window expired
        harness.ahrs.borrow_mut().yaw_rad = 0.3;

        let mut status = None;
        for k in 9..=20 {
            let t = k as f64 * 0.05;
            if let Some(tm) = harness
                .step_pose(t, Vector3::new(0.0, 0.0, t), 90)
                .status_tm
            {
                status = Some(tm);
            }
        }

        let status = status.expect("No status TM emitted");
        assert!(status.heading_deg.abs() < 1e-9);
        assert_eq!(harness.mgr.mode(), Mode::Running);
    }

    #[test]
    fn test_speed_gate_discards_cycle() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        let pos_before = harness.mgr.position_m();

        // A pose jump of 0.55 m in 0.05 s, 11 m/s
        let output = harness.step_pose(0.45, Vector3::new(0.0, 0.0, 0.95), 90);
        assert!(output.pos_tm.is_none());
        assert_eq!(harness.mgr.mode(), Mode::Running);
        assert_eq!(harness.mgr.position_m(), pos_before);

        // The pose cache was not polluted by the jump, the next nominal frame
        // integrates against the pre-jump pose
        let output = harness.step_pose(0.5, Vector3::new(0.0, 0.0, 0.5), 90);
        assert!(output.pos_tm.is_some());
        assert!((harness.mgr.position_m().x - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_low_quality_freezes_position() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();

        // Motion is present but quality sits at the threshold throughout
        harness.run_forward(1, 8, 0.05, 1.0, 20);

        assert_eq!(harness.mgr.mode(), Mode::Running);
        assert_eq!(harness.mgr.position_m(), Vector3::zeros());
        assert_eq!(harness.mgr.velocity_ms(), Vector3::zeros());
    }

    #[test]
    fn test_status_rate_limited() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();

        // 50 Hz frames for 1.2 s of session time
        let mut status_times = Vec::new();
        let mut pos_count = 0;

        for k in 1..=60 {
            let t = k as f64 * 0.02;
            let output = harness.step_pose(t, Vector3::new(0.0, 0.0, 0.1 * t), 90);

            if output.pos_tm.is_some() {
                pos_count += 1;
            }
            if output.status_tm.is_some() {
                status_times.push(t);
            }
        }

        // Position TM on every frame outside the window, status at ~4 Hz
        assert!(pos_count >= 50);
        assert!(status_times.len() >= 3 && status_times.len() <= 5);

        for pair in status_times.windows(2) {
            assert!(pair[1] - pair[0] > 0.25 - 1e-9);
        }
    }

    #[test]
    fn test_status_reports_frame_rate() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();

        let mut last_status = None;
        for k in 1..=30 {
            let t = k as f64 * 0.02;
            if let Some(status) = harness.step_pose(t, Vector3::zeros(), 90).status_tm {
                last_status = Some(status);
            }
        }

        // 20 ms frame spacing is 50 Hz
        let status = last_status.expect("No status TM emitted");
        assert!((status.fps - 50.0).abs() < 1.0);
        assert!(status.pos_valid());
    }

    #[test]
    fn test_stop_emits_final_status_once() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        let status = harness.mgr.stop().expect("Expected a final status TM");
        assert!(status.x_m.is_nan());
        assert!(status.y_m.is_nan());
        assert!(status.z_m.is_nan());
        assert_eq!(status.quality, 0);
        assert_eq!(status.fps, 0.0);
        assert!(!status.pos_valid());

        // Stop is idempotent
        assert!(harness.mgr.stop().is_none());
        assert_eq!(harness.mgr.mode(), Mode::Idle);

        // A disable TC while idle responds Ok with no status
        let (response, status) = harness.mgr.exec_tc(&Tc::VisionDisable, 0.5);
        assert!(matches!(response, TcResponse::Ok));
        assert!(status.is_none());
    }

    #[test]
    fn test_non_advancing_timestamp_skipped() {
        let mut harness = Harness::new();
        harness.mgr.start(0.0).unwrap();
        harness.run_forward(1, 8, 0.05, 1.0, 90);

        let pos_before = harness.mgr.position_m();
        let timestamp = harness.epoch + Duration::microseconds(400_000);

        // Same timestamp as the previous frame
        harness.results.borrow_mut().push_back(Ok(CameraPose {
            timestamp,
            attitude_q: UnitQuaternion::identity(),
            translation_m: Vector3::new(0.0, 0.0, 0.45),
            quality: 90,
        }));
        let output = harness.step(0.45);

        assert!(output.pos_tm.is_none());
        assert_eq!(harness.mgr.position_m(), pos_before);
        assert_eq!(harness.mgr.mode(), Mode::Running);
    }

    #[test]
    fn test_detectors_dispatched_and_isolated() {
        let mut params = VisLocParams::default();
        params.enable_detectors = true;

        let mut harness = Harness::with_params(params);

        let failing_calls = Rc::new(Cell::new(0));
        let healthy_calls = Rc::new(Cell::new(0));

        harness.mgr.register_detector(Box::new(CountingDetector {
            name: "failing",
            calls: failing_calls.clone(),
            fail: true,
        }));
        harness.mgr.register_detector(Box::new(CountingDetector {
            name: "healthy",
            calls: healthy_calls.clone(),
            fail: false,
        }));

        harness.mgr.start(0.0).unwrap();

        let mut status_count = 0;
        for k in 1..=30 {
            let t = k as f64 * 0.02;
            if harness
                .step_pose(t, Vector3::zeros(), 90)
                .status_tm
                .is_some()
            {
                status_count += 1;
            }
        }

        // Both detectors ran on every status tick, the failure of the first
        // never stopped the second
        assert!(status_count > 0);
        assert_eq!(failing_calls.get(), status_count);
        assert_eq!(healthy_calls.get(), status_count);
    }

    #[test]
    fn test_detectors_dropped_when_disabled() {
        let mut harness = Harness::new();

        let calls = Rc::new(Cell::new(0));
        harness.mgr.register_detector(Box::new(CountingDetector {
            name: "ignored",
            calls: calls.clone(),
            fail: false,
        }));

        harness.mgr.start(0.0).unwrap();
        for k in 1..=30 {
            harness.step_pose(k as f64 * 0.02, Vector3::zeros(), 90);
        }

        assert_eq!(calls.get(), 0);
    }
}
