/*
[INPUT]:  Timeouts, heartbeat cadence, endpoint overrides
[OUTPUT]: ClientConfig consumed by the client, authenticator and connection
[POS]:    Configuration layer - tunables with production defaults
[UPDATE]: When adding connection options or changing defaults
*/

use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on the credential exchange request
    pub auth_timeout: Duration,
    /// Bound on the socket handshake
    pub connect_timeout: Duration,
    /// Bound on a single frame write
    pub write_timeout: Duration,
    /// Idle bound between two inbound frames
    pub read_timeout: Duration,
    /// Interval between keep-alive messages
    pub heartbeat_interval: Duration,
    /// Bound on how long `disconnect` waits for the send queue to drain
    pub shutdown_timeout: Duration,
    /// Replaces the provider's auth endpoint
    pub auth_url: Option<String>,
    /// Replaces the provider's socket base URL; the token is still placed per provider
    pub socket_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            auth_url: None,
            socket_url: None,
        }
    }
}

impl ClientConfig {
    /// Point both endpoints somewhere else, e.g. a staging or local server.
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        socket_url: impl Into<String>,
    ) -> Self {
        self.auth_url = Some(auth_url.into());
        self.socket_url = Some(socket_url.into());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
