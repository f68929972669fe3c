//! # Telecommand Client

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tc::{Tc, TcResponse},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telecommand client
pub struct TcClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send a response to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the received telecommand: {0}")]
    TcParseError(comms_if::tc::TcParseError),

    #[error("The server sent a message which was not valid UTF-8")]
    NonUtf8Message,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcClient {
    /// Create a new instance of the TC client.
    ///
    /// This function will not block until the server connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TcClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: false,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REP, socket_options, &params.tc_endpoint)
            .map_err(TcClientError::SocketError)?;

        Ok(Self { socket })
    }

    /// Check if the client is connected to the server.
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    /// Receive a single TC from the server.
    ///
    /// Call in a loop until `Ok(None)` is returned, indicating that there are
    /// no more pending TCs right now. After receiving a valid TC a response
    /// must be sent with [`TcClient::send_response`] before receiving again.
    /// If the received message cannot be parsed the `Invalid` response is
    /// sent automatically.
    pub fn receive_tc(&self) -> Result<Option<Tc>, TcClientError> {
        if !self.socket.connected() {
            return Err(TcClientError::NotConnected);
        }

        let tc_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                self.send_response(TcResponse::Invalid)?;
                return Err(TcClientError::NonUtf8Message);
            }
            // No message within the timeout
            Err(zmq::Error::EAGAIN) => return Ok(None),
            // No response is sent if we could not receive
            Err(e) => return Err(TcClientError::RecvError(e)),
        };

        Tc::from_json(&tc_str)
            .map_err(|e| {
                self.send_response(TcResponse::Invalid).ok();

                TcClientError::TcParseError(e)
            })
            .map(Some)
    }

    /// Send the given response back to the server.
    ///
    /// This function must be called after receiving a TC.
    pub fn send_response(&self, response: TcResponse) -> Result<(), TcClientError> {
        if !self.socket.connected() {
            return Err(TcClientError::NotConnected);
        }

        let response_str =
            serde_json::to_string(&response).map_err(TcClientError::SerializationError)?;

        self.socket
            .send(&response_str, 0)
            .map_err(TcClientError::SendError)
    }
}
