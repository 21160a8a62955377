//! Backend channel adapter.
//!
//! Wraps the write half of a backend WebSocket as a [`RelaySink`]: each
//! [`RelayEvent`] becomes one JSON text frame.

use std::fmt;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::application::{RelaySink, SinkError};
use crate::domain::RelayEvent;

/// A [`RelaySink`] writing JSON text frames to any WebSocket message sink.
pub struct WsRelaySink<S> {
    sink: S,
    label: String,
}

impl<S> WsRelaySink<S> {
    /// `label` identifies the peer in error messages.
    pub fn new(sink: S, label: impl Into<String>) -> Self {
        Self {
            sink,
            label: label.into(),
        }
    }
}

#[async_trait]
impl<S> RelaySink for WsRelaySink<S>
where
    S: Sink<WsMessage> + Unpin + Send,
    S::Error: fmt::Display,
{
    async fn deliver(&mut self, event: &RelayEvent) -> Result<(), SinkError> {
        let text = serde_json::to_string(event)
            .map_err(|e| SinkError(format!("cannot encode '{}' event: {e}", event.name())))?;
        self.sink
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| SinkError(format!("backend {}: {e}", self.label)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::io::{duplex, DuplexStream};
    use tokio_tungstenite::{tungstenite::protocol::Role, WebSocketStream};

    /// An in-process WebSocket pair: (server, client).
    async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server_io, client_io) = duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (server, client)
    }

    #[tokio::test]
    async fn test_events_become_json_text_frames() {
        // Arrange
        let (server, mut client) = ws_pair().await;
        let (ws_tx, _ws_rx) = server.split();
        let mut sink = WsRelaySink::new(ws_tx, "test");

        // Act
        sink.deliver(&RelayEvent::DeviceDisconnected).await.unwrap();

        // Assert
        let frame = client.next().await.expect("one frame").unwrap();
        match frame {
            WsMessage::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value, serde_json::json!({"event": "device_disconnected"}));
            }
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delivery_to_a_closed_peer_reports_the_label() {
        // Arrange: drop the client so the write side fails
        let (server, client) = ws_pair().await;
        drop(client);
        let (ws_tx, _ws_rx) = server.split();
        let mut sink = WsRelaySink::new(ws_tx, "10.0.0.7:5000");

        // Act: the first write may still land in the duplex buffer
        let mut result = Ok(());
        for _ in 0..4 {
            result = sink.deliver(&RelayEvent::DeviceDisconnected).await;
            if result.is_err() {
                break;
            }
        }

        // Assert
        let err = result.expect_err("writes to a dropped peer must fail");
        assert!(err.0.contains("10.0.0.7:5000"), "got {}", err.0);
    }
}
