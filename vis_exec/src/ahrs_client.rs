//! # AHRS Client
//!
//! Subscribes to the attitude solution published by the external AHRS and
//! caches the most recent one, acting as the estimator's
//! [`AttitudeSource`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use comms_if::{
    eqpt::ahrs::AhrsSolution,
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

use crate::vis_loc::attitude::AttitudeSource;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// AHRS client
pub struct AhrsClient {
    socket: MonitoredSocket,

    /// Most recent solution received
    latest: Option<AhrsSolution>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AhrsClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AhrsClient {
    /// Create a new instance of the AHRS client.
    ///
    /// This function will not block until the AHRS connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, AhrsClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, &params.ahrs_endpoint)
            .map_err(AhrsClientError::SocketError)?;

        socket.set_subscribe(&[]).map_err(|e| {
            AhrsClientError::SocketError(MonitoredSocketError::SocketOptionError(
                "set_subscribe".into(),
                e,
            ))
        })?;

        Ok(Self {
            socket,
            latest: None,
        })
    }

    /// Drain all pending solutions from the socket, keeping the most recent.
    fn poll(&mut self) {
        loop {
            match self.socket.recv_string(zmq::DONTWAIT) {
                Ok(Ok(s)) => match serde_json::from_str(&s) {
                    Ok(solution) => self.latest = Some(solution),
                    Err(e) => warn!("Could not parse AHRS solution: {}", e),
                },
                Ok(Err(_)) => warn!("AHRS sent a message which was not valid UTF-8"),
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => {
                    warn!("Could not receive AHRS solution: {}", e);
                    break;
                }
            }
        }
    }
}

impl AttitudeSource for AhrsClient {
    fn read(&mut self) -> Option<AhrsSolution> {
        self.poll();
        self.latest
    }
}
