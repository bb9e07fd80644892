/*
[INPUT]:  Inbound records from the quote handler
[OUTPUT]: Quote and trade counters
[POS]:    Reporting - per-run tallies
[UPDATE]: When record classification changes
*/

use std::sync::atomic::{AtomicU64, Ordering};

use intrinio_realtime::{IexEvent, InboundRecord, QuoddEvent};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Quote,
    Trade,
    Control,
}

/// IEX quotes with a `last` payload type are trades; QUODD tags trades by event.
pub fn record_kind(record: &InboundRecord) -> RecordKind {
    match record {
        InboundRecord::Iex {
            event: IexEvent::Quote,
            ..
        } => match record.body().and_then(|body| body.get("type")).and_then(Value::as_str) {
            Some("last") => RecordKind::Trade,
            _ => RecordKind::Quote,
        },
        InboundRecord::Quodd {
            event: QuoddEvent::Quote,
            ..
        } => RecordKind::Quote,
        InboundRecord::Quodd {
            event: QuoddEvent::Trade,
            ..
        } => RecordKind::Trade,
        _ => RecordKind::Control,
    }
}

#[derive(Debug, Default)]
pub struct StreamStats {
    quotes: AtomicU64,
    trades: AtomicU64,
    errors: AtomicU64,
}

impl StreamStats {
    pub fn record(&self, record: &InboundRecord) -> RecordKind {
        let kind = record_kind(record);
        match kind {
            RecordKind::Quote => {
                self.quotes.fetch_add(1, Ordering::Relaxed);
            }
            RecordKind::Trade => {
                self.trades.fetch_add(1, Ordering::Relaxed);
            }
            RecordKind::Control => {}
        }
        kind
    }

    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn quotes(&self) -> u64 {
        self.quotes.load(Ordering::Relaxed)
    }

    pub fn trades(&self) -> u64 {
        self.trades.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}
