/*
[INPUT]:  Socket URL, outbound frames, raw inbound frames
[OUTPUT]: Running connection tasks and classified inbound records
[POS]:    WebSocket layer - realtime transport
[UPDATE]: When changing wire messages or connection logic
*/

pub(crate) mod connection;
pub mod message;

pub use message::{
    InboundRecord, OutboundMessage, PhoenixEvent, PhoenixFrame, QuoddAction, QuoddData,
    QuoddFrame, QuoddTicker,
};
