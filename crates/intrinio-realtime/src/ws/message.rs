/*
[INPUT]:  Outbound intents (join/leave/heartbeat) and raw inbound frame text
[OUTPUT]: Serializable wire frames and classified InboundRecord values
[POS]:    WebSocket layer - message encoding and classification
[UPDATE]: When a provider's wire format or event names change
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::types::{IexEvent, Provider, QuoddEvent};

const OTHER_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static OTHER_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// A frame queued for the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Phoenix(PhoenixFrame),
    Quodd(QuoddFrame),
}

impl OutboundMessage {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Phoenix(frame) => match frame.event {
                PhoenixEvent::Join => "join",
                PhoenixEvent::Leave => "leave",
                PhoenixEvent::Heartbeat => "heartbeat",
            },
            OutboundMessage::Quodd(frame) => match frame.event {
                QuoddAction::Subscribe => "join",
                QuoddAction::Unsubscribe => "leave",
                QuoddAction::Heartbeat => "heartbeat",
            },
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind() == "heartbeat"
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// IEX frame, Phoenix channel protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoenixFrame {
    pub topic: String,
    pub event: PhoenixEvent,
    pub payload: Map<String, Value>,
    #[serde(rename = "ref")]
    pub reference: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhoenixEvent {
    #[serde(rename = "phx_join")]
    Join,
    #[serde(rename = "phx_leave")]
    Leave,
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

/// QUODD frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoddFrame {
    pub event: QuoddAction,
    pub data: QuoddData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoddData {
    pub ticker: QuoddTicker,
    pub action: QuoddAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoddAction {
    Subscribe,
    Unsubscribe,
    Heartbeat,
}

/// Subscriptions name a security; heartbeats carry a Unix timestamp instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QuoddTicker {
    Symbol(String),
    Timestamp(i64),
}

/// One inbound frame, kept exactly as received.
///
/// The variant and event only classify the frame; field contents are vendor-defined
/// and passed through untouched in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundRecord {
    Iex {
        event: IexEvent,
        topic: Option<String>,
        fields: Map<String, Value>,
    },
    Quodd {
        event: QuoddEvent,
        fields: Map<String, Value>,
    },
    /// Object without a string `event` field.
    Raw(Map<String, Value>),
}

impl InboundRecord {
    /// Decode one text frame. Anything other than a JSON object is an error.
    pub fn decode(provider: Provider, text: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<Map<String, Value>>(text) {
            Ok(fields) => {
                let record = Self::classify(provider, fields);
                if matches!(record, InboundRecord::Raw(_)) {
                    log_other_message_once(text);
                }
                Ok(record)
            }
            Err(err) => {
                log_parse_fail_once(&err, text);
                Err(err)
            }
        }
    }

    pub fn classify(provider: Provider, fields: Map<String, Value>) -> Self {
        let Some(event) = fields.get("event").and_then(Value::as_str) else {
            return InboundRecord::Raw(fields);
        };

        match provider {
            Provider::Iex => InboundRecord::Iex {
                event: IexEvent::from(event),
                topic: fields
                    .get("topic")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                fields,
            },
            Provider::Quodd => InboundRecord::Quodd {
                event: QuoddEvent::from(event),
                fields,
            },
        }
    }

    /// All fields in arrival order.
    pub fn fields(&self) -> &Map<String, Value> {
        match self {
            InboundRecord::Iex { fields, .. }
            | InboundRecord::Quodd { fields, .. }
            | InboundRecord::Raw(fields) => fields,
        }
    }

    pub fn into_fields(self) -> Map<String, Value> {
        match self {
            InboundRecord::Iex { fields, .. }
            | InboundRecord::Quodd { fields, .. }
            | InboundRecord::Raw(fields) => fields,
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.fields().get("event").and_then(Value::as_str)
    }

    /// The record body: `payload` for IEX, `data` for QUODD.
    pub fn body(&self) -> Option<&Value> {
        match self {
            InboundRecord::Iex { fields, .. } => fields.get("payload"),
            InboundRecord::Quodd { fields, .. } => fields.get("data"),
            InboundRecord::Raw(_) => None,
        }
    }
}

fn log_other_message_once(raw: &str) {
    let count = OTHER_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < OTHER_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = OTHER_LOG_LIMIT,
            bytes = raw.len(),
            "ws frame without event"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = OTHER_LOG_LIMIT,
            message = %preview,
            "ws frame without event"
        );
    }
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws frame parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            message = %preview,
            "ws frame parse failed"
        );
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phoenix_frame_serializes_null_ref_and_empty_payload() {
        let message = OutboundMessage::Phoenix(PhoenixFrame {
            topic: "iex:securities:AAPL".to_string(),
            event: PhoenixEvent::Join,
            payload: Map::new(),
            reference: None,
        });
        let value: Value = serde_json::from_str(&message.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"topic": "iex:securities:AAPL", "event": "phx_join", "payload": {}, "ref": null})
        );
        assert_eq!(message.kind(), "join");
    }

    #[test]
    fn test_quodd_heartbeat_ticker_is_numeric() {
        let message = OutboundMessage::Quodd(QuoddFrame {
            event: QuoddAction::Heartbeat,
            data: QuoddData {
                ticker: QuoddTicker::Timestamp(1_700_000_000),
                action: QuoddAction::Heartbeat,
            },
        });
        let value: Value = serde_json::from_str(&message.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "heartbeat", "data": {"ticker": 1_700_000_000, "action": "heartbeat"}})
        );
        assert!(message.is_heartbeat());
    }

    #[test]
    fn test_decode_iex_quote_keeps_fields_in_order() {
        let text = r#"{"topic":"iex:securities:AAPL","payload":{"type":"last","price":150.1},"event":"quote","ref":null}"#;
        let record = InboundRecord::decode(Provider::Iex, text).unwrap();

        match &record {
            InboundRecord::Iex { event, topic, .. } => {
                assert_eq!(*event, IexEvent::Quote);
                assert_eq!(topic.as_deref(), Some("iex:securities:AAPL"));
            }
            other => panic!("unexpected record {other:?}"),
        }
        let keys: Vec<&str> = record.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["topic", "payload", "event", "ref"]);
        assert_eq!(record.body(), Some(&json!({"type": "last", "price": 150.1})));
    }

    #[test]
    fn test_decode_quodd_info() {
        let text = r#"{"event":"info","data":{"message":"unsubscribed AAPL.NB"}}"#;
        let record = InboundRecord::decode(Provider::Quodd, text).unwrap();
        assert!(matches!(
            record,
            InboundRecord::Quodd { event: QuoddEvent::Info, .. }
        ));
        assert_eq!(record.event_name(), Some("info"));
    }

    #[test]
    fn test_decode_without_event_is_raw() {
        let record = InboundRecord::decode(Provider::Quodd, r#"{"status":"ok"}"#).unwrap();
        assert!(matches!(record, InboundRecord::Raw(_)));
        assert!(record.body().is_none());
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(InboundRecord::decode(Provider::Iex, "[1,2,3]").is_err());
        assert!(InboundRecord::decode(Provider::Iex, "not json").is_err());
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("ééé", 3), "é...");
    }
}
