//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use structopt::StructOpt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the exec by the ground station.
#[derive(Debug, Clone, Serialize, Deserialize, StructOpt)]
pub enum Tc {
    /// Enable the visual localisation subsystem, starting odometry processing.
    #[structopt(name = "vis_enable")]
    VisionEnable,

    /// Disable the visual localisation subsystem. A final invalidity status
    /// telemetry message will be emitted so consumers mark the estimate stale.
    #[structopt(name = "vis_disable")]
    VisionDisable,

    /// Check that the exec is alive, has no other effect.
    #[structopt(name = "heartbeat")]
    Heartbeat,
}

/// Response sent back to the ground station after a TC is received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TcResponse {
    /// The TC was accepted and executed.
    Ok,

    /// The TC was valid but cannot be executed in the current state, for
    /// example enabling vision while the frame source is unavailable.
    CannotExecute,

    /// The TC could not be parsed.
    Invalid,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise this TC into a JSON packet
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tc_json_round_trip() {
        let tc = Tc::VisionEnable;
        let json = tc.to_json().unwrap();
        match Tc::from_json(&json).unwrap() {
            Tc::VisionEnable => (),
            other => panic!("Expected VisionEnable, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_tc_rejected() {
        assert!(Tc::from_json("{not json").is_err());
        assert!(Tc::from_json("\"NotATc\"").is_err());
    }
}
