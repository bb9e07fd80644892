/*
[INPUT]:  Provider, channel names, bearer token, optional endpoint overrides
[OUTPUT]: Auth/socket URLs and join/leave/heartbeat wire frames
[POS]:    Provider layer - stateless per-vendor mapping
[UPDATE]: When a vendor changes endpoints or message formats
*/

use serde_json::Map;
use url::Url;

use crate::error::{RealtimeError, Result};
use crate::types::{Channel, LOBBY_LAST_PRICE_CHANNEL, Provider, Token};
use crate::ws::message::{
    OutboundMessage, PhoenixEvent, PhoenixFrame, QuoddAction, QuoddData, QuoddFrame, QuoddTicker,
};

const IEX_AUTH_URL: &str = "https://realtime.intrinio.com/auth";
const IEX_SOCKET_URL: &str = "wss://realtime.intrinio.com/socket/websocket";
const IEX_PROTOCOL_VERSION: &str = "1.0.0";
const QUODD_AUTH_URL: &str = "https://api.intrinio.com/token?type=QUODD";
const QUODD_SOCKET_URL: &str = "wss://www5.quodd.com/websocket/webStreamer/intrinio";

const IEX_LOBBY_TOPIC: &str = "iex:lobby";
const IEX_LOBBY_LAST_PRICE_TOPIC: &str = "iex:lobby:last_price";
const IEX_SECURITY_TOPIC_PREFIX: &str = "iex:securities:";
const PHOENIX_TOPIC: &str = "phoenix";

/// Endpoints and wire encoding for one provider.
#[derive(Debug, Clone)]
pub struct ProviderAdapter {
    provider: Provider,
    auth_url: Url,
    socket_base_url: Url,
}

impl ProviderAdapter {
    /// Adapter using the provider's production endpoints.
    pub fn new(provider: Provider) -> Result<Self> {
        Self::with_endpoints(provider, None, None)
    }

    /// Adapter with optional replacements for the auth URL and socket base URL.
    pub fn with_endpoints(
        provider: Provider,
        auth_url: Option<&str>,
        socket_url: Option<&str>,
    ) -> Result<Self> {
        let (default_auth, default_socket) = match provider {
            Provider::Iex => (IEX_AUTH_URL, IEX_SOCKET_URL),
            Provider::Quodd => (QUODD_AUTH_URL, QUODD_SOCKET_URL),
        };
        Ok(Self {
            provider,
            auth_url: parse_url(auth_url.unwrap_or(default_auth))?,
            socket_base_url: parse_url(socket_url.unwrap_or(default_socket))?,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Socket URL for `token`: IEX puts it in the query, QUODD in the path.
    pub fn socket_url(&self, token: &Token) -> Result<Url> {
        let mut url = self.socket_base_url.clone();
        match self.provider {
            Provider::Iex => {
                url.query_pairs_mut()
                    .append_pair("vsn", IEX_PROTOCOL_VERSION)
                    .append_pair("token", token.as_str());
            }
            Provider::Quodd => {
                url.path_segments_mut()
                    .map_err(|_| {
                        RealtimeError::Config(format!(
                            "socket URL cannot carry a path token: {}",
                            self.socket_base_url
                        ))
                    })?
                    .pop_if_empty()
                    .push(token.as_str());
            }
        }
        Ok(url)
    }

    pub fn join_message(&self, channel: &Channel) -> OutboundMessage {
        match self.provider {
            Provider::Iex => phoenix(parse_topic(channel), PhoenixEvent::Join),
            Provider::Quodd => quodd(
                QuoddAction::Subscribe,
                QuoddTicker::Symbol(channel.to_string()),
            ),
        }
    }

    pub fn leave_message(&self, channel: &Channel) -> OutboundMessage {
        match self.provider {
            Provider::Iex => phoenix(parse_topic(channel), PhoenixEvent::Leave),
            Provider::Quodd => quodd(
                QuoddAction::Unsubscribe,
                QuoddTicker::Symbol(channel.to_string()),
            ),
        }
    }

    pub fn heartbeat_message(&self) -> OutboundMessage {
        self.heartbeat_message_at(chrono::Utc::now().timestamp())
    }

    /// Heartbeat with an explicit Unix timestamp; only QUODD carries it.
    pub fn heartbeat_message_at(&self, unix_seconds: i64) -> OutboundMessage {
        match self.provider {
            Provider::Iex => phoenix(PHOENIX_TOPIC.to_string(), PhoenixEvent::Heartbeat),
            Provider::Quodd => quodd(
                QuoddAction::Heartbeat,
                QuoddTicker::Timestamp(unix_seconds),
            ),
        }
    }
}

/// IEX topic for a channel.
pub fn parse_topic(channel: &Channel) -> String {
    if !channel.is_lobby() {
        return format!("{IEX_SECURITY_TOPIC_PREFIX}{channel}");
    }
    if channel.as_str() == LOBBY_LAST_PRICE_CHANNEL {
        IEX_LOBBY_LAST_PRICE_TOPIC.to_string()
    } else {
        IEX_LOBBY_TOPIC.to_string()
    }
}

fn phoenix(topic: String, event: PhoenixEvent) -> OutboundMessage {
    OutboundMessage::Phoenix(PhoenixFrame {
        topic,
        event,
        payload: Map::new(),
        reference: None,
    })
}

fn quodd(action: QuoddAction, ticker: QuoddTicker) -> OutboundMessage {
    OutboundMessage::Quodd(QuoddFrame {
        event: action,
        data: QuoddData { ticker, action },
    })
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| RealtimeError::Config(format!("invalid URL {raw:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn channel(name: &str) -> Channel {
        Channel::new(name).expect("channel")
    }

    fn to_value(message: &OutboundMessage) -> Value {
        serde_json::from_str(&message.to_text().expect("serialize")).expect("json")
    }

    #[rstest]
    #[case("$lobby", "iex:lobby")]
    #[case("$lobby_last_price", "iex:lobby:last_price")]
    #[case("AAPL", "iex:securities:AAPL")]
    fn test_parse_topic(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(parse_topic(&channel(name)), expected);
    }

    #[test]
    fn test_production_auth_urls() {
        let iex = ProviderAdapter::new(Provider::Iex).unwrap();
        assert_eq!(iex.auth_url().as_str(), "https://realtime.intrinio.com/auth");

        let quodd = ProviderAdapter::new(Provider::Quodd).unwrap();
        assert_eq!(
            quodd.auth_url().as_str(),
            "https://api.intrinio.com/token?type=QUODD"
        );
    }

    #[test]
    fn test_iex_socket_url_puts_token_in_query() {
        let adapter = ProviderAdapter::new(Provider::Iex).unwrap();
        let url = adapter.socket_url(&Token::new("abc123")).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://realtime.intrinio.com/socket/websocket?vsn=1.0.0&token=abc123"
        );
    }

    #[test]
    fn test_quodd_socket_url_puts_token_in_path() {
        let adapter = ProviderAdapter::new(Provider::Quodd).unwrap();
        let url = adapter.socket_url(&Token::new("abc123")).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://www5.quodd.com/websocket/webStreamer/intrinio/abc123"
        );
    }

    #[test]
    fn test_socket_url_override_keeps_token_placement() {
        let adapter = ProviderAdapter::with_endpoints(
            Provider::Quodd,
            Some("http://127.0.0.1:9000/auth"),
            Some("ws://127.0.0.1:9001/stream/"),
        )
        .unwrap();
        let url = adapter.socket_url(&Token::new("tok")).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9001/stream/tok");
        assert_eq!(adapter.auth_url().as_str(), "http://127.0.0.1:9000/auth");
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let err = ProviderAdapter::with_endpoints(Provider::Iex, Some("not a url"), None)
            .unwrap_err();
        assert!(matches!(err, RealtimeError::Config(_)));
    }

    #[test]
    fn test_iex_join_leave_heartbeat() {
        let adapter = ProviderAdapter::new(Provider::Iex).unwrap();
        assert_eq!(
            to_value(&adapter.join_message(&channel("AAPL"))),
            json!({"topic": "iex:securities:AAPL", "event": "phx_join", "payload": {}, "ref": null})
        );
        assert_eq!(
            to_value(&adapter.leave_message(&channel("$lobby"))),
            json!({"topic": "iex:lobby", "event": "phx_leave", "payload": {}, "ref": null})
        );
        assert_eq!(
            to_value(&adapter.heartbeat_message()),
            json!({"topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": null})
        );
    }

    #[test]
    fn test_quodd_join_leave_heartbeat() {
        let adapter = ProviderAdapter::new(Provider::Quodd).unwrap();
        assert_eq!(
            to_value(&adapter.join_message(&channel("AAPL.NB"))),
            json!({"event": "subscribe", "data": {"ticker": "AAPL.NB", "action": "subscribe"}})
        );
        assert_eq!(
            to_value(&adapter.leave_message(&channel("AAPL.NB"))),
            json!({"event": "unsubscribe", "data": {"ticker": "AAPL.NB", "action": "unsubscribe"}})
        );
        assert_eq!(
            to_value(&adapter.heartbeat_message_at(1_700_000_123)),
            json!({"event": "heartbeat", "data": {"ticker": 1_700_000_123, "action": "heartbeat"}})
        );
    }
}
