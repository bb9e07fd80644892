/*
[INPUT]:  Caller callbacks for records and runtime errors
[OUTPUT]: Single-slot handler registry shared with connection tasks
[POS]:    Delivery layer - callback storage and invocation
[UPDATE]: When the fan-out policy changes
*/

use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::error::RealtimeError;
use crate::ws::message::InboundRecord;

/// Callback for inbound records. Runs on the receiver task; a slow handler delays
/// the next read.
pub type QuoteHandler = Arc<dyn Fn(&InboundRecord) + Send + Sync>;
/// Callback for data-plane failures.
pub type ErrorHandler = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

/// One active handler per kind; registering replaces the previous one.
#[derive(Clone, Default)]
pub(crate) struct Handlers {
    quote: Arc<RwLock<Option<QuoteHandler>>>,
    error: Arc<RwLock<Option<ErrorHandler>>>,
}

impl Handlers {
    pub(crate) fn set_quote(&self, handler: QuoteHandler) {
        let mut slot = self.quote.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(handler);
    }

    pub(crate) fn set_error(&self, handler: ErrorHandler) {
        let mut slot = self.error.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(handler);
    }

    pub(crate) fn emit_quote(&self, record: &InboundRecord) {
        let handler = self
            .quote
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(record);
        }
    }

    /// Without a registered handler the error is only logged.
    pub(crate) fn emit_error(&self, error: RealtimeError) {
        let handler = self
            .error
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match handler {
            Some(handler) => handler(&error),
            None => warn!(error = %error, "realtime error dropped, no error handler registered"),
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let quote = self.quote.read().map(|slot| slot.is_some()).unwrap_or(false);
        let error = self.error.read().map(|slot| slot.is_some()).unwrap_or(false);
        f.debug_struct("Handlers")
            .field("quote", &quote)
            .field("error", &error)
            .finish()
    }
}
