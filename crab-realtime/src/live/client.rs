//! Client handle: one outbound connection behind a write mutex

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use shared::realtime::Envelope;
use tokio::sync::Mutex;

use crate::error::TransportError;

/// Write half of a client connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Best-effort close; errors are irrelevant once we give up on a client.
    async fn close(&mut self);
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = SinkExt::close(self).await;
    }
}

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// One subscribed connection
///
/// All writes go through the same mutex, so an initial snapshot and a
/// concurrent broadcast never interleave on the wire.
pub struct ClientHandle {
    id: u64,
    sink: Mutex<Box<dyn FrameSink>>,
    /// A `closed` frame has reached this client
    closed_delivered: AtomicBool,
}

impl ClientHandle {
    pub fn new(sink: impl FrameSink + 'static) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            sink: Mutex::new(Box::new(sink)),
            closed_delivered: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let text = serde_json::to_string(envelope)?;
        self.send_text(text).await?;
        if envelope.is_closed() {
            self.mark_closed_delivered();
        }
        Ok(())
    }

    /// Write an already-encoded frame; transport errors are returned unchanged.
    pub async fn send_text(&self, text: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send_text(text).await
    }

    pub(crate) fn mark_closed_delivered(&self) {
        self.closed_delivered.store(true, Ordering::Release);
    }

    pub fn closed_delivered(&self) -> bool {
        self.closed_delivered.load(Ordering::Acquire)
    }

    pub async fn close(&self) {
        self.sink.lock().await.close().await;
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle").field("id", &self.id).finish()
    }
}
