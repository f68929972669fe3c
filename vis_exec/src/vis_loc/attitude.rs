//! Attitude source interface
//!
//! The gates need the vehicle's attitude and body rates each cycle. In flight
//! these come from the AHRS client, in tests from a scripted source.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::ahrs::AhrsSolution;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Provides the most recent attitude solution.
pub trait AttitudeSource {
    /// Get the latest attitude solution, or `None` if no solution has been
    /// produced yet.
    fn read(&mut self) -> Option<AhrsSolution>;
}
