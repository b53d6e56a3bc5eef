//! Group-order session socket
//!
//! GET /api/group-orders/ws?code=<session code>
//!
//! Open session: `group_order.state` now and on every change, until the
//! session closes (`group_order.closed`) or its deadline passes.
//! Session already closed: one `group_order.closed` and the socket is closed.

use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::realtime::Envelope;
use tokio_util::sync::CancellationToken;

use super::{split_client, wait_for_close};
use crate::live::watchdog::{SessionExpirer, WatchOutcome, expire_session, expiry_deadline, watch};
use crate::live::{ClientHandle, KeyShape, LiveHub, Lookup};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SessionQuery {
    code: String,
}

pub async fn handle_group_order_ws(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let code = KeyShape::TrimmedUpper.normalize(&query.code).into_owned();
    if code.is_empty() {
        return Err(AppError::with_message(ErrorCode::TopicKeyInvalid, "session code is empty"));
    }

    Ok(ws.on_upgrade(move |socket| async move {
        let (client, stream) = split_client(socket);
        serve_group_session(
            &state.hubs.group_order,
            state.session_expirer.as_ref(),
            &code,
            client,
            wait_for_close(stream),
            &state.shutdown,
        )
        .await;
    }))
}

/// How a group-order connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Session was not open at connect time
    NotOpen,
    /// Snapshot query failed at connect time
    Unavailable,
    Watched(WatchOutcome),
}

pub(crate) async fn serve_group_session(
    hub: &LiveHub,
    expirer: &dyn SessionExpirer,
    code: &str,
    client: Arc<ClientHandle>,
    read_loop: impl Future<Output = ()>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let topic = hub.topic();
    let subscription = hub.subscribe(code, &client);

    let deadline = match hub.lookup(code).await {
        Ok(Lookup::Found(snapshot)) => {
            let deadline = expiry_deadline(snapshot.expires_at);
            tracing::info!(code, client_id = client.id(), armed = deadline.is_some(), "Group order client connected");
            for frame in hub.state_frames(snapshot) {
                if let Err(e) = client.send(&frame).await {
                    tracing::debug!(client_id = client.id(), "Initial frame not delivered: {e}");
                    subscription.unsubscribe();
                    client.close().await;
                    return SessionEnd::Watched(WatchOutcome::Disconnected);
                }
            }
            deadline
        }
        Ok(Lookup::Missing { status }) => {
            subscription.unsubscribe();
            tracing::info!(code, status = ?status, "Group order session not open");
            let _ = client.send(&Envelope::closed(topic, status)).await;
            client.close().await;
            return SessionEnd::NotOpen;
        }
        Err(e) => {
            subscription.unsubscribe();
            tracing::error!(code, "Group order snapshot failed: {e}");
            let _ = client.send(&Envelope::error("group order session unavailable")).await;
            client.close().await;
            return SessionEnd::Unavailable;
        }
    };

    let outcome = watch(read_loop, shutdown, deadline).await;
    if outcome == WatchOutcome::Expired {
        expire_session(hub, expirer, &subscription, &client, code).await;
    }

    subscription.unsubscribe();
    client.close().await;
    tracing::info!(code, client_id = client.id(), ?outcome, "Group order client disconnected");
    SessionEnd::Watched(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::domain::SESSION_EXPIRED;
    use crate::live::test_support::{
        FeedControl, MemoryExpirer, ScriptedFeed, StaticProvider, hub_with, recording_client,
    };
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use shared::realtime::{MessageKind, Topic};

    fn group_hub(provider: Arc<StaticProvider>) -> (LiveHub, FeedControl) {
        let (feed, control) = ScriptedFeed::new(Vec::new());
        (hub_with(Topic::GroupOrder, provider, feed), control)
    }

    #[tokio::test]
    async fn closed_session_gets_one_closed_frame() {
        let provider = Arc::new(StaticProvider::default());
        provider.set_missing("AB12", Some("SUBMITTED"));
        let (hub, _control) = group_hub(provider);
        let expirer = MemoryExpirer::default();
        let (client, mut inbox) = recording_client();

        let end = serve_group_session(
            &hub,
            &expirer,
            "AB12",
            client,
            std::future::pending(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(end, SessionEnd::NotOpen);
        let frames = inbox.drain();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is(Topic::GroupOrder, MessageKind::Closed));
        assert_eq!(frames[0].status.as_deref(), Some("SUBMITTED"));
        assert!(inbox.is_closed());
        assert_eq!(hub.registry().topic_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_failure_sends_error_envelope() {
        let provider = Arc::new(StaticProvider::default());
        provider.set_failing("AB12");
        let (hub, _control) = group_hub(provider);
        let expirer = MemoryExpirer::default();
        let (client, mut inbox) = recording_client();

        let end = serve_group_session(
            &hub,
            &expirer,
            "AB12",
            client,
            std::future::pending(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(end, SessionEnd::Unavailable);
        let frames = inbox.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, "error");
        assert!(frames[0].message.is_some());
        assert!(inbox.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn open_session_expires_at_deadline() {
        let expires_at = Utc::now() + ChronoDuration::seconds(30);
        let provider = Arc::new(StaticProvider::default());
        provider.set_session("AB12", json!({ "code": "AB12", "status": "OPEN" }), Some(expires_at));
        let (hub, _control) = group_hub(provider);
        // Storage already considers the session past due when the timer fires
        let expirer = MemoryExpirer::default();
        expirer.open_session("AB12", Utc::now() - ChronoDuration::seconds(1));
        let (client, mut inbox) = recording_client();

        let end = serve_group_session(
            &hub,
            &expirer,
            "AB12",
            client,
            std::future::pending(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(end, SessionEnd::Watched(WatchOutcome::Expired));
        let frames = inbox.drain();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is(Topic::GroupOrder, MessageKind::State));
        assert!(frames[1].is(Topic::GroupOrder, MessageKind::Closed));
        assert_eq!(frames[1].status.as_deref(), Some(SESSION_EXPIRED));
        assert_eq!(expirer.status("AB12").as_deref(), Some(SESSION_EXPIRED));
        assert_eq!(hub.registry().topic_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn session_closed_before_deadline_is_not_reported_expired() {
        let expires_at = Utc::now() + ChronoDuration::seconds(30);
        let provider = Arc::new(StaticProvider::default());
        provider.set_session("AB12", json!({ "code": "AB12", "status": "OPEN" }), Some(expires_at));
        let (hub, mut control) = group_hub(provider.clone());
        let expirer = Arc::new(MemoryExpirer::default());
        let (client, mut inbox) = recording_client();

        let session = {
            let (hub, expirer) = (hub.clone(), expirer.clone());
            tokio::spawn(async move {
                serve_group_session(
                    &hub,
                    expirer.as_ref(),
                    "AB12",
                    client,
                    std::future::pending(),
                    &CancellationToken::new(),
                )
                .await
            })
        };

        assert!(inbox.next().await.is(Topic::GroupOrder, MessageKind::State));
        control.wait_listening().await;

        // Submitted by the host a second later
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        provider.set_missing("AB12", Some("SUBMITTED"));
        control.notify("AB12");

        assert_eq!(session.await.unwrap(), SessionEnd::Watched(WatchOutcome::Expired));
        assert_eq!(expirer.transitions(), 0);
        let frames = inbox.drain();
        assert_eq!(frames, vec![Envelope::closed(Topic::GroupOrder, Some("SUBMITTED".into()))]);
        assert!(inbox.is_closed());
    }

    #[tokio::test]
    async fn failed_initial_state_closes_the_socket() {
        let provider = Arc::new(StaticProvider::default());
        provider.set_session("AB12", json!({ "code": "AB12" }), None);
        let (hub, _control) = group_hub(provider);
        let expirer = MemoryExpirer::default();
        let (client, inbox) = recording_client();
        inbox.break_connection();

        let end = serve_group_session(
            &hub,
            &expirer,
            "AB12",
            client,
            std::future::pending(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(end, SessionEnd::Watched(WatchOutcome::Disconnected));
        assert!(inbox.is_closed());
        assert_eq!(hub.registry().topic_count(), 0);
    }

    #[tokio::test]
    async fn session_without_deadline_waits_for_disconnect() {
        let provider = Arc::new(StaticProvider::default());
        provider.set_session("AB12", json!({ "code": "AB12" }), None);
        let (hub, _control) = group_hub(provider);
        let expirer = MemoryExpirer::default();
        let (client, mut inbox) = recording_client();

        let end = serve_group_session(
            &hub,
            &expirer,
            "AB12",
            client,
            async {},
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(end, SessionEnd::Watched(WatchOutcome::Disconnected));
        assert_eq!(inbox.drain().len(), 1);
        assert_eq!(expirer.transitions(), 0);
    }
}
