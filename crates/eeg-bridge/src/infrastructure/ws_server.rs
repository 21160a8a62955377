//! WebSocket server: accept loops and per-channel task management.
//!
//! The server binds two listeners:
//!
//! - **frontend**: client applications send request envelopes and receive
//!   one response per request.  Each channel gets its own
//!   [`FrontendSession`].
//! - **backend**: consumers receive [`RelayEvent`](crate::domain::RelayEvent)s
//!   drained from the shared [`BackendRelay`].
//!
//! Every accepted channel runs in its own Tokio task.  The server itself
//! holds no session state: it owns the shared device handle and the relay,
//! nothing else.
//!
//! Shutdown is triggered by a shared `AtomicBool` that is cleared by the
//! Ctrl+C handler in `main.rs`; both accept loops check it every 200 ms.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use eeg_core::DeviceAccess;

use crate::application::{pump, BackendRelay, FrontendSession};
use crate::domain::{BridgeConfig, Response};
use crate::infrastructure::backend_conn::WsRelaySink;

/// How long each `accept()` waits before the loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound, not yet running, bridge server.
pub struct BridgeServer {
    frontend: TcpListener,
    backend: TcpListener,
    device: Arc<dyn DeviceAccess>,
    relay: Arc<BackendRelay>,
}

impl BridgeServer {
    /// Binds both listeners and creates the backend relay.
    ///
    /// Port `0` in either address picks an ephemeral port; read the real one
    /// back with [`frontend_addr`](Self::frontend_addr) /
    /// [`backend_addr`](Self::backend_addr).
    ///
    /// # Errors
    ///
    /// Returns an error if either listener cannot be bound (port in use,
    /// missing permission).
    pub async fn bind(
        config: &BridgeConfig,
        device: Arc<dyn DeviceAccess>,
    ) -> anyhow::Result<Self> {
        let frontend = TcpListener::bind(config.frontend_addr)
            .await
            .with_context(|| {
                format!("failed to bind frontend listener on {}", config.frontend_addr)
            })?;
        let backend = TcpListener::bind(config.backend_addr)
            .await
            .with_context(|| {
                format!("failed to bind backend listener on {}", config.backend_addr)
            })?;

        Ok(Self {
            frontend,
            backend,
            device,
            relay: Arc::new(BackendRelay::new(config.relay_capacity)),
        })
    }

    /// The address frontend clients connect to.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS cannot report the socket address.
    pub fn frontend_addr(&self) -> anyhow::Result<SocketAddr> {
        self.frontend
            .local_addr()
            .context("frontend listener has no local address")
    }

    /// The address backend consumers connect to.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS cannot report the socket address.
    pub fn backend_addr(&self) -> anyhow::Result<SocketAddr> {
        self.backend
            .local_addr()
            .context("backend listener has no local address")
    }

    pub fn relay(&self) -> Arc<BackendRelay> {
        Arc::clone(&self.relay)
    }

    /// Accepts channels on both listeners until `running` is set to `false`.
    ///
    /// Channels already open keep running in their own tasks.
    pub async fn run(self, running: Arc<AtomicBool>) {
        let Self {
            frontend,
            backend,
            device,
            relay,
        } = self;

        let frontend_loop = {
            let relay = Arc::clone(&relay);
            accept_loop("frontend", frontend, Arc::clone(&running), move |stream, peer| {
                handle_frontend_channel(stream, peer, Arc::clone(&device), Arc::clone(&relay))
            })
        };
        let backend_loop = accept_loop("backend", backend, running, move |stream, peer| {
            handle_backend_channel(stream, peer, Arc::clone(&relay))
        });

        tokio::join!(frontend_loop, backend_loop);
    }
}

/// Binds the server described by `config` and runs it until `running` is
/// cleared.
///
/// # Errors
///
/// Returns an error if either listener cannot be bound.
pub async fn run_server(
    config: BridgeConfig,
    device: Arc<dyn DeviceAccess>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let server = BridgeServer::bind(&config, device).await?;
    info!(
        "EEG bridge listening: frontend ws://{}, backend ws://{}",
        server.frontend_addr()?,
        server.backend_addr()?
    );
    server.run(running).await;
    Ok(())
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop<F, Fut>(
    role: &'static str,
    listener: TcpListener,
    running: Arc<AtomicBool>,
    on_accept: F,
) where
    F: Fn(TcpStream, SocketAddr) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping {role} accept loop");
            break;
        }

        // Short timeout so the flag is re-checked even when nobody connects.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("new {role} connection from {peer}");
                tokio::spawn(on_accept(stream, peer));
            }
            Ok(Err(e)) => {
                // Transient (e.g. too many open files); keep serving.
                error!("{role} accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

// ── Frontend channel ──────────────────────────────────────────────────────────

async fn handle_frontend_channel(
    stream: TcpStream,
    peer: SocketAddr,
    device: Arc<dyn DeviceAccess>,
    relay: Arc<BackendRelay>,
) {
    match run_frontend_channel(stream, peer, device, relay).await {
        Ok(()) => info!("frontend channel {peer} closed normally"),
        Err(e) => warn!("frontend channel {peer} closed with error: {e:#}"),
    }
}

/// Serves one frontend channel: one response frame per request frame.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails or a response cannot be
/// written.
async fn run_frontend_channel(
    stream: TcpStream,
    peer: SocketAddr,
    device: Arc<dyn DeviceAccess>,
    relay: Arc<BackendRelay>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer}"))?;

    let mut session = FrontendSession::new(device, relay);
    let id = session.id();
    info!("session {id}: frontend channel established with {peer}");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("session {id}: WebSocket closed");
                break;
            }
            Some(Err(e)) => {
                warn!("session {id}: WebSocket error: {e}");
                break;
            }
            None => {
                debug!("session {id}: stream ended");
                break;
            }
        };

        let response = match ws_msg {
            WsMessage::Text(text) => session.handle_text(&text).await,
            WsMessage::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => session.handle_text(&text).await,
                Err(_) => Response::error("Invalid request: binary frame is not UTF-8 text"),
            },
            WsMessage::Ping(data) => {
                debug!("session {id}: WebSocket ping ({} bytes)", data.len());
                continue;
            }
            WsMessage::Pong(_) => continue,
            WsMessage::Close(_) => {
                debug!("session {id}: Close frame received");
                break;
            }
            WsMessage::Frame(_) => continue,
        };

        let json = serde_json::to_string(&response)
            .with_context(|| format!("session {id}: failed to encode response"))?;
        ws_tx
            .send(WsMessage::Text(json))
            .await
            .with_context(|| format!("session {id}: failed to send response"))?;
    }

    Ok(())
}

// ── Backend channel ───────────────────────────────────────────────────────────

async fn handle_backend_channel(stream: TcpStream, peer: SocketAddr, relay: Arc<BackendRelay>) {
    match run_backend_channel(stream, peer, relay).await {
        Ok(()) => info!("backend channel {peer} closed normally"),
        Err(e) => warn!("backend channel {peer} closed with error: {e:#}"),
    }
}

/// Forwards relay events to one backend channel until either side stops.
///
/// # Errors
///
/// Returns an error if the handshake fails or an event cannot be written.
async fn run_backend_channel(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<BackendRelay>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer}"))?;
    info!("backend channel established with {peer}");

    let (ws_tx, mut ws_rx) = ws_stream.split();
    let mut sink = WsRelaySink::new(ws_tx, peer.to_string());

    tokio::select! {
        result = pump(&relay, &mut sink) => {
            result.context("relay delivery failed")?;
        }
        () = wait_for_close(&mut ws_rx, peer) => {}
    }

    Ok(())
}

/// Reads (and discards) inbound backend frames until the channel closes.
async fn wait_for_close<S>(ws_rx: &mut S, peer: SocketAddr)
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(WsMessage::Close(_)) => break,
            Ok(other) => debug!("backend {peer}: ignoring inbound frame ({} bytes)", other.len()),
            Err(e) => {
                debug!("backend {peer}: read error: {e}");
                break;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::Connector;

    fn loopback_config() -> BridgeConfig {
        BridgeConfig {
            frontend_addr: "127.0.0.1:0".parse().unwrap(),
            backend_addr: "127.0.0.1:0".parse().unwrap(),
            ..BridgeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_on_ephemeral_ports_reports_real_addresses() {
        // Arrange / Act
        let server = BridgeServer::bind(&loopback_config(), Arc::new(Connector::new(Vec::new())))
            .await
            .unwrap();

        // Assert
        let frontend = server.frontend_addr().unwrap();
        let backend = server.backend_addr().unwrap();
        assert_ne!(frontend.port(), 0);
        assert_ne!(backend.port(), 0);
        assert_ne!(frontend, backend);
    }

    #[tokio::test]
    async fn test_relay_uses_configured_capacity() {
        let config = BridgeConfig {
            relay_capacity: 3,
            ..loopback_config()
        };
        let server = BridgeServer::bind(&config, Arc::new(Connector::new(Vec::new())))
            .await
            .unwrap();
        assert_eq!(server.relay().capacity(), 3);
    }

    #[tokio::test]
    async fn test_bind_fails_when_port_is_taken() {
        // Arrange: occupy a port first
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = BridgeConfig {
            frontend_addr: taken.local_addr().unwrap(),
            ..loopback_config()
        };

        // Act
        let result = BridgeServer::bind(&config, Arc::new(Connector::new(Vec::new()))).await;

        // Assert
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_returns_once_flag_is_cleared() {
        let server = BridgeServer::bind(&loopback_config(), Arc::new(Connector::new(Vec::new())))
            .await
            .unwrap();
        let running = Arc::new(AtomicBool::new(false));

        tokio::time::timeout(Duration::from_secs(2), server.run(running))
            .await
            .expect("accept loops must stop when the flag is clear");
    }
}
