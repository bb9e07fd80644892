/*
[INPUT]:  Socket URL, provider adapter, timeouts, handlers, shared state channel
[OUTPUT]: One open socket driven by dispatcher/receiver/heartbeat tasks
[POS]:    WebSocket layer - per-connect task group and teardown
[UPDATE]: When changing send/receive loops, close classification or shutdown
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{RealtimeError, Result, SocketError};
use crate::handler::Handlers;
use crate::provider::ProviderAdapter;
use crate::types::{ConnectionState, Provider};
use crate::ws::message::InboundRecord;
use crate::ws::message::OutboundMessage;

/// How long the receiver may wait for the peer's close reply once shutdown began.
const CLOSE_HANDSHAKE_GRACE: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSource = SplitStream<WsStream>;

/// Everything the connection tasks share with the client.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionContext {
    pub(crate) adapter: ProviderAdapter,
    pub(crate) config: ClientConfig,
    pub(crate) handlers: Handlers,
    pub(crate) state: Arc<watch::Sender<ConnectionState>>,
}

/// The socket of one connect cycle and the tasks driving it.
///
/// All tasks stop on one cancellation token. The receiver cancels it itself when
/// the socket is lost; `close` cancels it on request and waits for the send
/// queue to drain.
#[derive(Debug)]
pub(crate) struct Connection {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    shutdown: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
    task_aborts: Vec<AbortHandle>,
}

impl Connection {
    /// Dial `url` and start the dispatcher, receiver and heartbeat tasks.
    pub(crate) async fn open(url: &Url, ctx: ConnectionContext) -> Result<Self> {
        let socket = match timeout(ctx.config.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(source)) => return Err(RealtimeError::Dial { source }),
            Err(_) => {
                return Err(RealtimeError::Dial {
                    source: WsError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "socket handshake timed out",
                    )),
                });
            }
        };

        // Published before any task runs so a fast failure cannot be overwritten.
        ctx.state.send_replace(ConnectionState::Connected);

        let (sink, source) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let socket_lost = Arc::new(AtomicBool::new(false));

        let heartbeat = tokio::spawn(run_heartbeat(
            ctx.adapter.clone(),
            outbound_tx.clone(),
            shutdown.clone(),
            ctx.config.heartbeat_interval,
        ));
        let dispatcher = tokio::spawn(run_dispatcher(
            sink,
            outbound_rx,
            shutdown.clone(),
            ctx.handlers.clone(),
            socket_lost.clone(),
            ctx.config.write_timeout,
        ));
        let receiver = tokio::spawn(run_receiver(
            source,
            ctx.clone(),
            shutdown.clone(),
            socket_lost,
        ));

        let task_aborts = vec![
            heartbeat.abort_handle(),
            dispatcher.abort_handle(),
            receiver.abort_handle(),
        ];
        let supervisor = tokio::spawn(supervise(
            shutdown.clone(),
            TaskSet {
                heartbeat,
                dispatcher,
                receiver,
            },
            ctx.handlers.clone(),
            ctx.state.clone(),
        ));

        Ok(Self {
            outbound: outbound_tx,
            shutdown,
            supervisor: Some(supervisor),
            task_aborts,
        })
    }

    /// Queue a frame for the dispatcher. False once the connection is shutting down.
    pub(crate) fn send(&self, message: OutboundMessage) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.outbound.send(message).is_ok()
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop all tasks, draining queued frames first. Bounded by `limit`; on expiry
    /// the tasks are aborted.
    pub(crate) async fn close(mut self, limit: Duration) -> Result<()> {
        self.shutdown.cancel();
        let Some(supervisor) = self.supervisor.take() else {
            return Ok(());
        };
        let supervisor_abort = supervisor.abort_handle();

        match timeout(limit, supervisor).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                warn!(error = %err, "connection supervisor failed");
                Ok(())
            }
            Err(_) => {
                warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "connection did not stop in time, aborting tasks"
                );
                for task in &self.task_aborts {
                    task.abort();
                }
                supervisor_abort.abort();
                Err(RealtimeError::ShutdownTimeout {
                    duration_ms: limit.as_millis() as u64,
                })
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct TaskSet {
    heartbeat: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    receiver: JoinHandle<()>,
}

/// Waits for shutdown or for any task to stop on its own, then joins the rest.
///
/// A task ending before cancellation (e.g. a panicking handler unwinding the
/// receiver) tears the connection down and is reported once as fatal.
async fn supervise(
    shutdown: CancellationToken,
    tasks: TaskSet,
    handlers: Handlers,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let TaskSet {
        mut heartbeat,
        mut dispatcher,
        mut receiver,
    } = tasks;

    let exited = tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        result = &mut receiver => Some(("receiver", result)),
        result = &mut dispatcher => Some(("dispatcher", result)),
        result = &mut heartbeat => Some(("heartbeat", result)),
    };

    let finished = match exited {
        Some((task, result)) => {
            let reason = match result {
                Ok(()) => "stopped before shutdown".to_string(),
                Err(err) => err.to_string(),
            };
            warn!(task, reason = %reason, "connection task exited early");
            mark_closing(&state);
            shutdown.cancel();
            handlers.emit_error(RealtimeError::Socket(SocketError::TaskExited { task, reason }));
            Some(task)
        }
        None => None,
    };

    if finished != Some("heartbeat") {
        if let Err(err) = heartbeat.await {
            warn!(error = %err, "heartbeat task failed");
        }
    }
    if finished != Some("dispatcher") {
        if let Err(err) = dispatcher.await {
            warn!(error = %err, "dispatcher task failed");
        }
    }
    if finished != Some("receiver") {
        let receiver_abort = receiver.abort_handle();
        match timeout(CLOSE_HANDSHAKE_GRACE, receiver).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "receiver task failed"),
            Err(_) => {
                debug!("no close reply from peer, stopping receiver");
                receiver_abort.abort();
            }
        }
    }

    state.send_replace(ConnectionState::Disconnected);
    info!("connection closed");
}

fn mark_closing(state: &watch::Sender<ConnectionState>) {
    state.send_if_modified(|state| {
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Closing;
            true
        } else {
            false
        }
    });
}

async fn run_heartbeat(
    adapter: ProviderAdapter,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    shutdown: CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if outbound.send(adapter.heartbeat_message()).is_err() {
                    break;
                }
                trace!("heartbeat queued");
            }
        }
    }
    debug!("heartbeat stopped");
}

async fn run_dispatcher<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    shutdown: CancellationToken,
    handlers: Handlers,
    socket_lost: Arc<AtomicBool>,
    write_timeout: Duration,
) where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            next = outbound.recv() => match next {
                Some(message) => {
                    write_message(&mut sink, &message, write_timeout, &handlers, &socket_lost)
                        .await;
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    outbound.close();
    let mut drained = 0usize;
    while let Some(message) = outbound.recv().await {
        write_message(&mut sink, &message, write_timeout, &handlers, &socket_lost).await;
        drained += 1;
    }
    debug!(drained, "send queue drained");

    match timeout(write_timeout, sink.close()).await {
        Ok(Ok(())) => debug!("close frame sent"),
        Ok(Err(err)) => debug!(error = %err, "socket already closed"),
        Err(_) => debug!("close frame not flushed in time"),
    }
}

async fn write_message<S>(
    sink: &mut S,
    message: &OutboundMessage,
    write_timeout: Duration,
    handlers: &Handlers,
    socket_lost: &AtomicBool,
) where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let text = match message.to_text() {
        Ok(text) => text,
        Err(err) => {
            handlers.emit_error(RealtimeError::Encode(err));
            return;
        }
    };

    let failure = match timeout(write_timeout, sink.send(WsMessage::text(text))).await {
        Ok(Ok(())) => {
            if message.is_heartbeat() {
                trace!("heartbeat sent");
            } else {
                debug!(kind = message.kind(), "ws frame sent");
            }
            return;
        }
        Ok(Err(err)) => SocketError::Write(err),
        Err(_) => SocketError::WriteTimeout {
            duration_ms: write_timeout.as_millis() as u64,
        },
    };

    // The receiver already reported a lost socket once.
    if socket_lost.load(Ordering::SeqCst) {
        debug!(kind = message.kind(), error = %failure, "write on lost socket skipped");
        return;
    }
    warn!(kind = message.kind(), error = %failure, "ws write failed");
    handlers.emit_error(RealtimeError::Socket(failure));
}

/// Why the read loop stopped.
#[derive(Debug)]
enum ReadOutcome {
    /// Going away, abnormal end of stream, or already closed.
    Expected(&'static str),
    Failed(SocketError),
}

async fn run_receiver(
    mut source: WsSource,
    ctx: ConnectionContext,
    shutdown: CancellationToken,
    socket_lost: Arc<AtomicBool>,
) {
    let provider = ctx.adapter.provider();
    let read_timeout = ctx.config.read_timeout;

    let outcome = loop {
        let next = match timeout(read_timeout, source.next()).await {
            Ok(next) => next,
            Err(_) => {
                break ReadOutcome::Failed(SocketError::ReadTimeout {
                    duration_ms: read_timeout.as_millis() as u64,
                });
            }
        };

        match next {
            Some(Ok(WsMessage::Text(text))) => deliver(provider, text.as_str(), &ctx.handlers),
            Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => deliver(provider, text, &ctx.handlers),
                Err(_) => debug!(bytes = bytes.len(), "ignoring non-utf8 binary frame"),
            },
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
            Some(Ok(WsMessage::Close(frame))) => break classify_close(frame),
            Some(Err(err)) => break classify_error(err),
            None => break ReadOutcome::Expected("stream ended"),
        }
    };

    socket_lost.store(true, Ordering::SeqCst);
    let shutting_down = shutdown.is_cancelled();

    match outcome {
        ReadOutcome::Failed(err) if !shutting_down => {
            warn!(error = %err, "ws connection lost");
            ctx.handlers.emit_error(RealtimeError::Socket(err));
        }
        ReadOutcome::Failed(err) => debug!(error = %err, "read failed during shutdown"),
        ReadOutcome::Expected(reason) if shutting_down => debug!(reason, "ws connection closed"),
        ReadOutcome::Expected(reason) => info!(reason, "ws connection closed by peer"),
    }

    if !shutting_down {
        mark_closing(&ctx.state);
        shutdown.cancel();
    }
}

fn deliver(provider: Provider, text: &str, handlers: &Handlers) {
    match InboundRecord::decode(provider, text) {
        Ok(record) => handlers.emit_quote(&record),
        Err(err) => handlers.emit_error(RealtimeError::Decode(err)),
    }
}

fn classify_close(frame: Option<CloseFrame>) -> ReadOutcome {
    match frame {
        Some(frame) if matches!(frame.code, CloseCode::Away | CloseCode::Abnormal) => {
            ReadOutcome::Expected("going away")
        }
        Some(frame) => ReadOutcome::Failed(SocketError::UnexpectedClose {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().to_string(),
        }),
        None => ReadOutcome::Failed(SocketError::UnexpectedClose {
            code: u16::from(CloseCode::Status),
            reason: "close frame without status".to_string(),
        }),
    }
}

fn classify_error(err: WsError) -> ReadOutcome {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            ReadOutcome::Expected("already closed")
        }
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            ReadOutcome::Expected("reset without closing handshake")
        }
        other => ReadOutcome::Failed(SocketError::Read(other)),
    }
}
