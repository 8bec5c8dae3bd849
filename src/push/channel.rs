//! Persistent WebSocket push channel.
//!
//! ```text
//!             ┌──────────── PushChannel::run ─────────────┐
//! dial ──ok──▶│ inbound Text  ─▶ Reconciler::apply_push_msg│
//!   ▲         │ outbound frame ◀─ PushHandle::submit       │
//!   │         └───────────── closed / error ───────────────┘
//!   └──── fixed reconnect delay ◀──────────┘
//! ```
//!
//! [`PushHandle`] is the frame pipeline's view of the channel: it reports
//! whether the socket is open and accepts at most one queued frame.  The
//! frame's in-flight permit is dropped right after the socket write
//! completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::config::BackendConfig;
use crate::frames::{FrameSink, OutboundFrame};
use crate::telemetry::{lock, SharedReconciler};

// ---------------------------------------------------------------------------
// PushError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push channel connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("push channel connect timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// PushHandle
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PushHandle {
    open: Arc<AtomicBool>,
    frames: mpsc::Sender<OutboundFrame>,
}

impl FrameSink for PushHandle {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.frames.is_closed()
    }

    fn submit(&self, frame: OutboundFrame) -> bool {
        self.frames.try_send(frame).is_ok()
    }
}

// ---------------------------------------------------------------------------
// PushChannel
// ---------------------------------------------------------------------------

/// How a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Shutdown,
}

pub struct PushChannel {
    url: String,
    connect_timeout: Duration,
    reconnect: Duration,
    reconciler: SharedReconciler,
    open: Arc<AtomicBool>,
    frames: mpsc::Receiver<OutboundFrame>,
    /// Cleared once every [`PushHandle`] is gone.
    accepting_frames: bool,
}

/// Create the channel task and the handle the frame pipeline submits to.
pub fn push_channel(
    config: &BackendConfig,
    reconciler: SharedReconciler,
) -> (PushChannel, PushHandle) {
    let open = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel(1);
    let channel = PushChannel {
        url: config.push_url.clone(),
        connect_timeout: config.request_timeout(),
        reconnect: config.push_reconnect(),
        reconciler,
        open: Arc::clone(&open),
        frames: rx,
        accepting_frames: true,
    };
    (channel, PushHandle { open, frames: tx })
}

impl PushChannel {
    /// Dial, serve, and re-dial on the fixed timer until `shutdown` flips
    /// to `true` (or its sender is dropped).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let connected = tokio::select! {
                r = self.connect() => r,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(ws) => {
                    failures = 0;
                    self.set_connected(true);
                    let end = self.serve(ws, &mut shutdown).await;
                    self.set_connected(false);
                    self.discard_queued();
                    if end == SessionEnd::Shutdown {
                        break;
                    }
                }
                Err(e) => {
                    failures += 1;
                    if failures == 1 {
                        log::warn!("push: {} unreachable: {e}", self.url);
                    } else {
                        log::debug!("push: still unreachable ({failures} attempts): {e}");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_connected(false);
        self.discard_queued();
        log::debug!("push: task finished");
    }

    async fn connect(
        &self,
    ) -> Result<
        WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        PushError,
    > {
        let dial = tokio_tungstenite::connect_async(self.url.as_str());
        let (ws, _response) = tokio::time::timeout(self.connect_timeout, dial)
            .await
            .map_err(|_| PushError::Timeout)??;
        log::debug!("push: connected to {}", self.url);
        Ok(ws)
    }

    async fn serve<S>(
        &mut self,
        ws: WebSocketStream<S>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        log::debug!("push: close frame not sent: {e}");
                    }
                    let _ = write.close().await;
                    return SessionEnd::Shutdown;
                }

                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        // Malformed messages are logged and dropped inside.
                        let _ = lock(&self.reconciler).apply_push_message(&text);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        log::debug!("push: server closed: {frame:?}");
                        return SessionEnd::Disconnected;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("push: receive failed: {e}");
                        return SessionEnd::Disconnected;
                    }
                    None => return SessionEnd::Disconnected,
                },

                outbound = self.frames.recv(), if self.accepting_frames => match outbound {
                    Some(OutboundFrame { message, permit }) => {
                        let sent = write.send(Message::text(message)).await;
                        drop(permit);
                        if let Err(e) = sent {
                            log::warn!("push: send failed: {e}");
                            return SessionEnd::Disconnected;
                        }
                    }
                    None => {
                        log::debug!("push: frame source gone; receive only");
                        self.accepting_frames = false;
                    }
                },
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        self.open.store(connected, Ordering::SeqCst);
        lock(&self.reconciler).set_push_connected(connected);
    }

    /// Drop frames queued for a socket that is gone, freeing their permits.
    fn discard_queued(&mut self) {
        while let Ok(frame) = self.frames.try_recv() {
            drop(frame);
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
