//! Session expiry watchdog (group orders)
//!
//! Each group-order connection races three signals: the client going away,
//! server shutdown, and the session's expiry deadline. Only the last one has
//! side effects.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::realtime::{Envelope, Topic};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::ClientHandle;
use super::domain::SESSION_EXPIRED;
use super::hub::LiveHub;
use super::projection::Lookup;
use super::registry::Subscription;
use crate::error::BoxError;

/// Added to the remaining lifetime so the conditional update sees the
/// session as past its expiry.
pub const EXPIRY_GRACE: Duration = Duration::from_secs(1);

/// Marks sessions expired in storage
#[async_trait]
pub trait SessionExpirer: Send + Sync {
    /// OPEN and past expiry → EXPIRED, then notify the group-order channel.
    /// Returns whether this call made the transition.
    async fn expire(&self, code: &str) -> Result<bool, BoxError>;
}

/// Timer length for a session expiring at `expires_at`, `None` unless it is
/// still in the future.
pub fn expiry_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = (expires_at - now).to_std().ok()?;
    if remaining.is_zero() {
        return None;
    }
    Some(remaining + EXPIRY_GRACE)
}

pub fn expiry_deadline(expires_at: Option<DateTime<Utc>>) -> Option<Instant> {
    expires_at
        .and_then(|at| expiry_delay(at, Utc::now()))
        .map(|delay| Instant::now() + delay)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The read loop ended (client closed or socket error)
    Disconnected,
    Cancelled,
    Expired,
}

/// Wait for whichever comes first
pub async fn watch<F>(
    read_loop: F,
    shutdown: &CancellationToken,
    deadline: Option<Instant>,
) -> WatchOutcome
where
    F: Future<Output = ()>,
{
    let expiry = async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = read_loop => WatchOutcome::Disconnected,
        _ = shutdown.cancelled() => WatchOutcome::Cancelled,
        _ = expiry => WatchOutcome::Expired,
    }
}

/// Expiry side effects for one connection
///
/// The connection leaves the registry first, so the broadcast triggered by
/// the notification does not reach it a second time. The direct `closed`
/// frame carries EXPIRED only when this call made the transition; otherwise
/// it carries whatever status storage holds, and is skipped if the listener
/// already delivered a `closed` frame to this client.
pub async fn expire_session(
    hub: &LiveHub,
    expirer: &dyn SessionExpirer,
    subscription: &Subscription,
    client: &ClientHandle,
    code: &str,
) {
    subscription.unsubscribe();

    let status = match expirer.expire(code).await {
        Ok(true) => {
            tracing::info!(code, client_id = client.id(), "Group order session expired");
            Some(SESSION_EXPIRED.to_string())
        }
        result => {
            match result {
                Ok(_) => tracing::debug!(code, "Group order session already closed"),
                Err(e) => tracing::warn!(code, "Failed to expire group order session: {e}"),
            }
            if client.closed_delivered() {
                return;
            }
            match hub.lookup(code).await {
                Ok(Lookup::Missing { status }) => status,
                Ok(Lookup::Found(_)) => {
                    tracing::info!(code, client_id = client.id(), "Group order session still open at deadline");
                    return;
                }
                Err(e) => {
                    tracing::warn!(code, "Group order snapshot failed after deadline: {e}");
                    None
                }
            }
        }
    };

    let closed = Envelope::closed(Topic::GroupOrder, status);
    if let Err(e) = client.send(&closed).await {
        tracing::debug!(client_id = client.id(), "Closed frame not delivered: {e}");
    }
}
