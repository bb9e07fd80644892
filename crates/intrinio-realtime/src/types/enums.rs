/*
[INPUT]:  Provider selectors and connection lifecycle events
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - closed sets shared by every layer
[UPDATE]: When a provider is added or the lifecycle changes
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RealtimeError;

/// Upstream vendor feeding the realtime stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Iex,
    Quodd,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Iex => "iex",
            Provider::Quodd => "quodd",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = RealtimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "iex" => Ok(Provider::Iex),
            "quodd" => Ok(Provider::Quodd),
            _ => Err(RealtimeError::InvalidProvider(value.to_string())),
        }
    }
}

/// Lifecycle of the client's socket.
///
/// `Disconnected -> Connecting -> Connected -> Closing -> Disconnected`. A failed
/// connect goes straight from `Connecting` back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Message kind carried in the `event` field of an IEX (Phoenix) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IexEvent {
    Quote,
    Reply,
    Error,
    Close,
    Other(String),
}

impl From<&str> for IexEvent {
    fn from(value: &str) -> Self {
        match value {
            "quote" => IexEvent::Quote,
            "phx_reply" => IexEvent::Reply,
            "phx_error" => IexEvent::Error,
            "phx_close" => IexEvent::Close,
            other => IexEvent::Other(other.to_string()),
        }
    }
}

/// Message kind carried in the `event` field of a QUODD frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoddEvent {
    Quote,
    Trade,
    Info,
    Other(String),
}

impl From<&str> for QuoddEvent {
    fn from(value: &str) -> Self {
        match value {
            "quote" => QuoddEvent::Quote,
            "trade" => QuoddEvent::Trade,
            "info" => QuoddEvent::Info,
            other => QuoddEvent::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str_is_case_insensitive() {
        assert_eq!("IEX".parse::<Provider>().unwrap(), Provider::Iex);
        assert_eq!(" quodd ".parse::<Provider>().unwrap(), Provider::Quodd);
    }

    #[test]
    fn test_provider_from_str_rejects_unknown() {
        let err = "bats".parse::<Provider>().unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidProvider(ref name) if name == "bats"));
    }

    #[test]
    fn test_provider_serde_lowercase() {
        let json = serde_json::to_string(&Provider::Quodd).unwrap();
        assert_eq!(json, "\"quodd\"");
        let parsed: Provider = serde_json::from_str("\"iex\"").unwrap();
        assert_eq!(parsed, Provider::Iex);
    }

    #[test]
    fn test_event_classification() {
        assert_eq!(IexEvent::from("phx_reply"), IexEvent::Reply);
        assert_eq!(QuoddEvent::from("info"), QuoddEvent::Info);
        assert_eq!(
            QuoddEvent::from("status"),
            QuoddEvent::Other("status".to_string())
        );
    }
}
