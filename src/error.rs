use std::fmt;
use thiserror::Error;

use crate::codec::FrameError;
use crate::frame::Frame;

/// The content of an ERROR frame sent by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// The `message` header, or an empty string when the broker omitted it
    pub message: String,
    /// The frame body as text, if any
    pub body: Option<String>,
    /// The `receipt-id` header, present when the error answers a receipted frame
    pub receipt_id: Option<String>,
}

impl ServerError {
    pub fn from_frame(frame: &Frame) -> Self {
        let body = if frame.body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&frame.body).into_owned())
        };
        Self {
            message: frame.get_header("message").unwrap_or_default().to_string(),
            body,
            receipt_id: frame.get_header("receipt-id").map(str::to_string),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(body) = &self.body {
            write!(f, ": {}", body)?;
        }
        Ok(())
    }
}

/// Errors returned by client operations and pushed to the error stream.
#[derive(Error, Debug)]
pub enum ConnError {
    /// I/O-level error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Protocol-level error
    #[error("protocol error: {0}")]
    Protocol(String),
    /// TLS configuration or handshake error
    #[error("tls error: {0}")]
    Tls(String),
    /// The broker answered CONNECT with an ERROR frame
    #[error("server rejected connection: {0}")]
    ServerRejected(ServerError),
    /// The broker sent an ERROR frame after the handshake
    #[error("server error: {0}")]
    Server(ServerError),
    /// No CONNECTED reply arrived in time
    #[error("timed out waiting for CONNECTED")]
    ConnectTimeout,
    /// Receipt timeout error
    #[error("receipt timeout: no RECEIPT received for '{0}' within timeout")]
    ReceiptTimeout(String),
    /// A confirmed send reused a receipt token that is still being waited on
    #[error("receipt '{0}' is already awaited by another send")]
    DuplicateReceipt(String),
    /// The broker stopped sending heartbeats
    #[error("no data from server within the negotiated heartbeat window")]
    HeartbeatTimeout,
    /// The background reader stopped; the connection is gone
    #[error("connection closed")]
    ConnectionClosed,
    /// DISCONNECT has been initiated; no further frames may be sent
    #[error("disconnect in progress: no frames may be sent after DISCONNECT")]
    Disconnecting,
    /// A message was sent without a destination header
    #[error("message has no destination")]
    MissingDestination,
    /// `unsubscribe` was called with an id this client never registered
    #[error("unknown subscription id '{0}'")]
    UnknownSubscription(String),
}

impl From<FrameError> for ConnError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => ConnError::Io(e),
            FrameError::Protocol(msg) => ConnError::Protocol(msg),
            FrameError::Closed => ConnError::ConnectionClosed,
        }
    }
}
