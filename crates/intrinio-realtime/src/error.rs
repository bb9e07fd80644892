/*
[INPUT]:  Error sources (auth HTTP, socket, serialization, configuration)
[OUTPUT]: Structured error types for control-plane and data-plane failures
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Main error type for the realtime client
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Credential exchange answered with a non-success status
    #[error("Authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },

    /// Auth endpoint could not be reached
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket could not be opened
    #[error("Failed to open socket: {source}")]
    Dial {
        #[source]
        source: WsError,
    },

    /// Provider selector is not one of the supported vendors
    #[error("Invalid provider: {0:?}")]
    InvalidProvider(String),

    /// Failure on an established socket
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    /// Inbound frame is not a JSON object
    #[error("Failed to decode inbound frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// Outbound frame could not be serialized
    #[error("Failed to encode outbound frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background tasks did not stop within the shutdown bound
    #[error("Shutdown did not complete within {duration_ms}ms")]
    ShutdownTimeout { duration_ms: u64 },
}

/// Runtime failures of an open connection
#[derive(Error, Debug)]
pub enum SocketError {
    /// Peer closed the socket with a code other than going-away
    #[error("connection closed unexpectedly (code {code}): {reason}")]
    UnexpectedClose { code: u16, reason: String },

    /// Reading a frame failed
    #[error("read failed: {0}")]
    Read(#[source] WsError),

    /// No frame arrived within the read deadline
    #[error("no frame received for {duration_ms}ms")]
    ReadTimeout { duration_ms: u64 },

    /// Writing a frame failed
    #[error("write failed: {0}")]
    Write(#[source] WsError),

    /// Writing a frame did not finish within the write deadline
    #[error("write did not complete within {duration_ms}ms")]
    WriteTimeout { duration_ms: u64 },

    /// A connection task stopped before shutdown was requested
    #[error("{task} task exited unexpectedly: {reason}")]
    TaskExited { task: &'static str, reason: String },
}

impl RealtimeError {
    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(self, RealtimeError::Auth { .. })
    }

    /// Check if the error ended the connection it was raised on
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RealtimeError::Socket(
                SocketError::UnexpectedClose { .. }
                    | SocketError::Read(_)
                    | SocketError::ReadTimeout { .. }
                    | SocketError::TaskExited { .. }
            )
        )
    }

    pub(crate) fn auth(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        RealtimeError::Auth {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Result type alias for realtime client operations
pub type Result<T> = std::result::Result<T, RealtimeError>;
