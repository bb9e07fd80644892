/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Intrinio realtime client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod provider;
pub mod subscription;
pub mod types;
pub mod ws;

pub use auth::{Authenticator, HttpAuthenticator};
pub use client::RealtimeClient;
pub use config::ClientConfig;
pub use error::{RealtimeError, Result, SocketError};
pub use handler::{ErrorHandler, QuoteHandler};
pub use provider::ProviderAdapter;
pub use subscription::SubscriptionSet;

// Re-export all types
pub use types::*;

pub use ws::{InboundRecord, OutboundMessage};
