//! WebSocket endpoints, one per broadcast domain
//!
//! Server → Client only. Inbound frames are read and discarded; the read loop
//! exists to notice the client going away.

pub mod customer_display;
pub mod group_order;
pub mod merchant_orders;
pub mod public_order;

use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use futures::stream::SplitStream;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::live::watchdog::{WatchOutcome, watch};
use crate::live::{ClientHandle, LiveHub};

/// `?token=<JWT>`; browsers cannot send headers on the handshake
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Split an upgraded socket into a client handle and its read half
pub(crate) fn split_client(socket: WebSocket) -> (Arc<ClientHandle>, SplitStream<WebSocket>) {
    let (sink, stream) = socket.split();
    (ClientHandle::new(sink), stream)
}

/// Resolves once the peer closes or the socket fails
pub(crate) async fn wait_for_close(mut stream: SplitStream<WebSocket>) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// Subscribe, optionally push the current state, then hold the connection
/// until the client leaves or the server shuts down.
pub(crate) async fn serve_topic(
    hub: &LiveHub,
    key: &str,
    client: Arc<ClientHandle>,
    read_loop: impl Future<Output = ()>,
    shutdown: &CancellationToken,
    send_initial: bool,
) -> WatchOutcome {
    let domain = hub.topic();
    let subscription = hub.subscribe(key, &client);
    tracing::info!(domain = %domain, key, client_id = client.id(), "Client connected");

    if send_initial {
        for frame in hub.frames_for(key).await {
            if let Err(e) = client.send(&frame).await {
                tracing::debug!(client_id = client.id(), "Initial frame not delivered: {e}");
                subscription.unsubscribe();
                client.close().await;
                return WatchOutcome::Disconnected;
            }
        }
    }

    let outcome = watch(read_loop, shutdown, None).await;

    subscription.unsubscribe();
    client.close().await;
    tracing::info!(domain = %domain, key, client_id = client.id(), ?outcome, "Client disconnected");
    outcome
}
