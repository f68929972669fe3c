//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Telemetry message definitions
pub mod tm;

/// Wire formats for equipment data (frames, attitude solutions)
pub mod eqpt;

/// Network module
pub mod net;
