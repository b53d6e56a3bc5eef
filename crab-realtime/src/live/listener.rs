//! Change listener: one long-lived LISTEN connection per domain
//!
//! ```text
//! Idle → Acquiring → Subscribing → Waiting ─┬─ notification → Waiting
//!           ▲                               └─ wait error ──┐
//!           └──────────── release + backoff sleep ◄─────────┘
//! ```
//!
//! Acquire / listen failures sleep for the current backoff delay, which
//! doubles up to a cap and resets after every successful LISTEN.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::hub::LiveHub;
use crate::error::BoxError;

/// Source of dedicated notification connections
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn ChangeConnection>, BoxError>;
}

/// A connection owned exclusively by one listener
#[async_trait]
pub trait ChangeConnection: Send {
    async fn listen(&mut self, channel: &str) -> Result<(), BoxError>;

    /// Block until the next notification and return its payload
    async fn recv(&mut self) -> Result<String, BoxError>;

    async fn release(&mut self);
}

/// Capped exponential backoff
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to sleep now; the following one is doubled (capped)
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    Idle = 0,
    Acquiring = 1,
    Subscribing = 2,
    Waiting = 3,
}

impl ListenerState {
    pub fn name(&self) -> &'static str {
        match self {
            ListenerState::Idle => "idle",
            ListenerState::Acquiring => "acquiring",
            ListenerState::Subscribing => "subscribing",
            ListenerState::Waiting => "listening",
        }
    }
}

/// Listener state readable from other tasks (health endpoint)
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn get(&self) -> ListenerState {
        match self.0.load(Ordering::Relaxed) {
            1 => ListenerState::Acquiring,
            2 => ListenerState::Subscribing,
            3 => ListenerState::Waiting,
            _ => ListenerState::Idle,
        }
    }

    fn set(&self, state: ListenerState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }
}

pub struct ChangeListener {
    hub: LiveHub,
    feed: Arc<dyn ChangeFeed>,
    backoff: Backoff,
}

impl ChangeListener {
    pub fn new(hub: LiveHub, feed: Arc<dyn ChangeFeed>, backoff: Backoff) -> Self {
        Self { hub, feed, backoff }
    }

    /// Runs until the process exits
    pub async fn run(mut self) {
        let channel = self.hub.policy().channel;
        let topic = self.hub.topic();
        tracing::info!(domain = %topic, channel, "Change listener started");

        loop {
            self.set_state(ListenerState::Acquiring);
            let mut conn = match self.feed.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    self.pause(&format!("failed to acquire listen connection: {e}"))
                        .await;
                    continue;
                }
            };

            self.set_state(ListenerState::Subscribing);
            if let Err(e) = conn.listen(channel).await {
                conn.release().await;
                self.pause(&format!("LISTEN {channel} failed: {e}")).await;
                continue;
            }

            self.backoff.reset();
            self.set_state(ListenerState::Waiting);
            tracing::info!(domain = %topic, channel, "Listening for changes");

            let err = loop {
                match conn.recv().await {
                    Ok(payload) => {
                        tracing::debug!(domain = %topic, payload = %payload, "Change notification");
                        self.hub.dispatch(&payload).await;
                    }
                    Err(e) => break e,
                }
            };

            conn.release().await;
            self.pause(&format!("notification stream failed: {err}"))
                .await;
        }
    }

    async fn pause(&mut self, reason: &str) {
        let delay = self.backoff.next_delay();
        tracing::warn!(
            domain = %self.hub.topic(),
            delay_secs = delay.as_secs_f64(),
            "Change listener: {reason}, retrying"
        );
        tokio::time::sleep(delay).await;
    }

    fn set_state(&self, state: ListenerState) {
        self.hub.listener_state_cell().set(state);
    }
}
