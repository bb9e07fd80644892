/*
[INPUT]:  Caller-supplied channel names, credentials and tokens
[OUTPUT]: Validated value types used across the client
[POS]:    Data layer - domain models
[UPDATE]: When channel naming rules or credential handling change
*/

use std::fmt;

/// Reserved channel receiving every IEX security.
pub const LOBBY_CHANNEL: &str = "$lobby";
/// Reserved channel receiving IEX last-price updates for every security.
pub const LOBBY_LAST_PRICE_CHANNEL: &str = "$lobby_last_price";

/// A trimmed, non-empty channel name: a ticker or a broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(String);

impl Channel {
    /// Trims the name, returning `None` when nothing is left.
    pub fn new(name: impl AsRef<str>) -> Option<Self> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the two IEX broadcast channels.
    pub fn is_lobby(&self) -> bool {
        self.0 == LOBBY_CHANNEL || self.0 == LOBBY_LAST_PRICE_CHANNEL
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Username/password pair exchanged for a bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Opaque bearer token, valid for one connect cycle.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(*** {} bytes)", self.0.len())
    }
}
