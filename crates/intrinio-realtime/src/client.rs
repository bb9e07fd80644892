/*
[INPUT]:  Credentials, provider selector, caller join/leave intents, handlers
[OUTPUT]: Managed realtime connection delivering records to handlers
[POS]:    Client layer - public lifecycle controller
[UPDATE]: When changing connect/disconnect flow or the public surface
*/

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, HttpAuthenticator};
use crate::config::ClientConfig;
use crate::error::{RealtimeError, Result};
use crate::handler::Handlers;
use crate::provider::ProviderAdapter;
use crate::subscription::SubscriptionSet;
use crate::types::{Channel, ConnectionState, Credentials, Provider};
use crate::ws::connection::{Connection, ConnectionContext};
use crate::ws::message::InboundRecord;

/// Streaming client for one provider.
///
/// Control-plane methods take `&mut self`, so connect/disconnect/join/leave are
/// serialized by the borrow checker. Records and runtime errors are delivered to
/// the registered handlers from background tasks.
///
/// The desired channel set outlives connections: every successful `connect`
/// replays it on the new socket.
pub struct RealtimeClient {
    adapter: ProviderAdapter,
    config: ClientConfig,
    authenticator: Arc<dyn Authenticator>,
    subscriptions: SubscriptionSet,
    handlers: Handlers,
    state: Arc<watch::Sender<ConnectionState>>,
    connection: Option<Connection>,
}

impl RealtimeClient {
    /// Create a client from a provider selector such as `"iex"` or `"quodd"`.
    ///
    /// Unknown selectors fail here with [`RealtimeError::InvalidProvider`].
    pub fn new(credentials: Credentials, provider: &str) -> Result<Self> {
        let provider: Provider = provider.parse()?;
        Self::with_config(credentials, provider, ClientConfig::default())
    }

    /// Create a client for a known provider with default configuration.
    pub fn with_provider(credentials: Credentials, provider: Provider) -> Result<Self> {
        Self::with_config(credentials, provider, ClientConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(
        credentials: Credentials,
        provider: Provider,
        config: ClientConfig,
    ) -> Result<Self> {
        validate_config(&config)?;
        let adapter = ProviderAdapter::with_endpoints(
            provider,
            config.auth_url.as_deref(),
            config.socket_url.as_deref(),
        )?;
        let authenticator = HttpAuthenticator::new(
            adapter.auth_url().clone(),
            credentials,
            config.auth_timeout,
        )?;
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            adapter,
            config,
            authenticator: Arc::new(authenticator),
            subscriptions: SubscriptionSet::new(),
            handlers: Handlers::default(),
            state: Arc::new(state),
            connection: None,
        })
    }

    /// Replace the token source, e.g. with a pre-shared token or a test double.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn provider(&self) -> Provider {
        self.adapter.provider()
    }

    /// Authenticate, open the socket and start the background tasks.
    ///
    /// An existing connection is closed first. On success every desired channel
    /// is joined on the new socket.
    pub async fn connect(&mut self) -> Result<()> {
        if let Some(previous) = self.connection.take() {
            info!("closing previous connection before reconnecting");
            if let Err(err) = previous.close(self.config.shutdown_timeout).await {
                warn!(error = %err, "previous connection did not close cleanly");
            }
        }
        self.subscriptions.reset_joined();

        self.state.send_replace(ConnectionState::Connecting);
        info!(provider = %self.adapter.provider(), "realtime connecting");

        match self.open_connection().await {
            Ok(connection) => {
                self.connection = Some(connection);
                info!(provider = %self.adapter.provider(), "realtime connected");
                self.reconcile();
                Ok(())
            }
            Err(err) => {
                self.state.send_replace(ConnectionState::Disconnected);
                warn!(error = %err, "realtime connect failed");
                Err(err)
            }
        }
    }

    /// Drain queued frames, close the socket and stop the background tasks.
    ///
    /// Does nothing when there is no connection; calling it twice is harmless.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(connection) = self.connection.take() else {
            debug!("disconnect requested while not connected");
            return Ok(());
        };

        info!("realtime disconnecting");
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });

        let result = connection.close(self.config.shutdown_timeout).await;
        self.state.send_replace(ConnectionState::Disconnected);
        self.subscriptions.reset_joined();
        info!("realtime disconnected");
        result
    }

    /// Add channels to the desired set and sync the socket.
    pub fn join<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.subscriptions.join(channels);
        self.reconcile();
    }

    /// Remove channels from the desired set and sync the socket.
    pub fn leave<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.subscriptions.leave(channels);
        self.reconcile();
    }

    pub fn leave_all(&mut self) {
        self.subscriptions.leave_all();
        self.reconcile();
    }

    /// Register the record handler, replacing any previous one.
    pub fn on_quote<F>(&self, handler: F)
    where
        F: Fn(&InboundRecord) + Send + Sync + 'static,
    {
        self.handlers.set_quote(Arc::new(handler));
    }

    /// Register the runtime error handler, replacing any previous one.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&RealtimeError) + Send + Sync + 'static,
    {
        self.handlers.set_error(Arc::new(handler));
    }

    pub fn connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Channels the caller wants joined.
    pub fn channels(&self) -> &BTreeSet<Channel> {
        self.subscriptions.desired()
    }

    /// Channels joined on the current socket.
    pub fn joined_channels(&self) -> &BTreeSet<Channel> {
        self.subscriptions.joined()
    }

    async fn open_connection(&self) -> Result<Connection> {
        let token = self.authenticator.fetch_token().await?;
        let url = self.adapter.socket_url(&token)?;
        let ctx = ConnectionContext {
            adapter: self.adapter.clone(),
            config: self.config.clone(),
            handlers: self.handlers.clone(),
            state: self.state.clone(),
        };
        Connection::open(&url, ctx).await
    }

    fn reconcile(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        if connection.is_closing() {
            debug!("connection closing, subscriptions kept for next connect");
            return;
        }

        if self.subscriptions.is_converged() {
            return;
        }
        let messages = self.subscriptions.reconcile(&self.adapter);
        let joins = messages.iter().filter(|message| message.kind() == "join").count();
        let leaves = messages.len() - joins;

        for message in messages {
            if !connection.send(message) {
                warn!("connection closed while queueing subscription frames");
                return;
            }
        }
        info!(joins, leaves, "ws subscriptions queued");
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("provider", &self.adapter.provider())
            .field("state", &self.state())
            .field("channels", &self.subscriptions.desired())
            .field("handlers", &self.handlers)
            .finish()
    }
}

fn validate_config(config: &ClientConfig) -> Result<()> {
    let durations = [
        ("auth_timeout", config.auth_timeout),
        ("connect_timeout", config.connect_timeout),
        ("write_timeout", config.write_timeout),
        ("read_timeout", config.read_timeout),
        ("heartbeat_interval", config.heartbeat_interval),
        ("shutdown_timeout", config.shutdown_timeout),
    ];
    for (name, value) in durations {
        if value.is_zero() {
            return Err(RealtimeError::Config(format!("{name} must be greater than zero")));
        }
    }
    Ok(())
}
