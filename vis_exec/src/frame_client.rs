//! # Frame Client
//!
//! Subscribes to the RGB+depth frame pairs published by the capture exec.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::convert::TryInto;

use comms_if::{
    eqpt::vis::{CamImage, DepthImage, VisFrameError, VisFramePair},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Frame client
pub struct FrameClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FrameClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the capture exec")]
    NotConnected,

    #[error("Could not receive a message from the capture exec: {0}")]
    RecvError(zmq::Error),

    #[error("The capture exec sent a message which was not valid UTF-8")]
    NonUtf8Message,

    #[error("Could not parse the received frame pair: {0}")]
    FrameParseError(serde_json::Error),

    #[error("Could not decode the received frame pair: {0}")]
    FrameDecodeError(VisFrameError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FrameClient {
    /// Create a new instance of the frame client.
    ///
    /// This function will not block until the capture exec connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, FrameClientError> {
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

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, &params.frame_endpoint)
            .map_err(FrameClientError::SocketError)?;

        // Subscribe to all messages on the endpoint
        socket.set_subscribe(&[]).map_err(|e| {
            FrameClientError::SocketError(MonitoredSocketError::SocketOptionError(
                "set_subscribe".into(),
                e,
            ))
        })?;

        Ok(Self { socket })
    }

    /// Check if the client is connected to the capture exec.
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    /// Receive a single frame pair, or `None` if no pair is pending.
    pub fn receive_frame(&mut self) -> Result<Option<(CamImage, DepthImage)>, FrameClientError> {
        if !self.socket.connected() {
            return Err(FrameClientError::NotConnected);
        }

        let pair_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(FrameClientError::NonUtf8Message),
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(FrameClientError::RecvError(e)),
        };

        let pair: VisFramePair =
            serde_json::from_str(&pair_str).map_err(FrameClientError::FrameParseError)?;

        let rgb: CamImage = pair
            .rgb
            .try_into()
            .map_err(FrameClientError::FrameDecodeError)?;
        let depth: DepthImage = pair
            .depth
            .try_into()
            .map_err(FrameClientError::FrameDecodeError)?;

        Ok(Some((rgb, depth)))
    }
}
