//! # MAV Visual Localisation Software Library
//!
//! This library provides the building blocks of the visual localisation
//! exec: the estimator itself ([`vis_loc`]), the network clients which feed
//! it, and the TM server which publishes its output.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod ahrs_client;
pub mod frame_client;
#[cfg(feature = "sim")]
pub mod sim_odom;
pub mod tc_client;
pub mod tm_server;
pub mod vis_loc;
