//! LiveHub: one broadcast domain wired together
//!
//! Owns the domain's registry and projection provider and starts the domain's
//! change listener the first time anybody subscribes. Cheap to clone; handed to
//! connection handlers and to the listener task alike.

use std::sync::{Arc, Once};

use shared::realtime::{Envelope, Topic};

use super::client::ClientHandle;
use super::domain::{DomainPolicy, Fallback};
use super::listener::{Backoff, ChangeFeed, ChangeListener, ListenerState, StateCell};
use super::projection::{Lookup, ProjectionProvider, Snapshot};
use super::registry::{Subscription, TopicRegistry};
use crate::error::BoxError;

#[derive(Clone)]
pub struct LiveHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    policy: DomainPolicy,
    registry: TopicRegistry,
    provider: Arc<dyn ProjectionProvider>,
    feed: Arc<dyn ChangeFeed>,
    backoff: Backoff,
    listener: Once,
    state: StateCell,
}

impl LiveHub {
    pub fn new(
        policy: DomainPolicy,
        provider: Arc<dyn ProjectionProvider>,
        feed: Arc<dyn ChangeFeed>,
        backoff: Backoff,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: TopicRegistry::new(policy.key_shape),
                policy,
                provider,
                feed,
                backoff,
                listener: Once::new(),
                state: StateCell::default(),
            }),
        }
    }

    pub fn topic(&self) -> Topic {
        self.inner.policy.topic
    }

    pub fn policy(&self) -> &DomainPolicy {
        &self.inner.policy
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.inner.registry
    }

    pub fn listener_state(&self) -> ListenerState {
        self.inner.state.get()
    }

    pub(crate) fn listener_state_cell(&self) -> &StateCell {
        &self.inner.state
    }

    /// Register `client` under `key`, starting the listener if needed
    pub fn subscribe(&self, key: &str, client: &Arc<ClientHandle>) -> Subscription {
        self.ensure_listener();
        self.inner.registry.subscribe(key, client)
    }

    /// Spawn the change listener; later calls do nothing
    ///
    /// Must be called from within a tokio runtime.
    pub fn ensure_listener(&self) {
        self.inner.listener.call_once(|| {
            let listener = ChangeListener::new(
                self.clone(),
                self.inner.feed.clone(),
                self.inner.backoff.clone(),
            );
            tokio::spawn(listener.run());
        });
    }

    /// Current read model for `key`
    pub async fn lookup(&self, key: &str) -> Result<Lookup, BoxError> {
        let key = self.inner.policy.key_shape.normalize(key);
        self.inner.provider.fetch_snapshot(&key).await
    }

    /// Frames describing the current state of `key`
    ///
    /// A snapshot yields `state` (plus the legacy `refresh` echo where the
    /// domain wants it); anything else yields the domain's fallback.
    pub async fn frames_for(&self, key: &str) -> Vec<Envelope> {
        match self.lookup(key).await {
            Ok(Lookup::Found(snapshot)) => self.state_frames(snapshot),
            Ok(Lookup::Missing { status }) => vec![self.fallback(key, status).await],
            Err(e) => {
                tracing::warn!(domain = %self.topic(), key, "Snapshot query failed: {e}");
                vec![self.fallback(key, None).await]
            }
        }
    }

    pub fn state_frames(&self, snapshot: Snapshot) -> Vec<Envelope> {
        let topic = self.topic();
        let updated_at = snapshot.updated_at;
        let mut frames = vec![Envelope::state(topic, snapshot.document, updated_at)];
        if self.inner.policy.legacy_refresh {
            frames.push(Envelope::refresh(topic, updated_at));
        }
        frames
    }

    async fn fallback(&self, key: &str, status: Option<String>) -> Envelope {
        let topic = self.topic();
        match self.inner.policy.fallback {
            Fallback::Closed => Envelope::closed(topic, status),
            Fallback::Refresh => {
                let key = self.inner.policy.key_shape.normalize(key);
                let updated_at = match self.inner.provider.fetch_last_changed(&key).await {
                    Ok(at) => at,
                    Err(e) => {
                        tracing::warn!(domain = %topic, key = %key, "Last-changed query failed: {e}");
                        None
                    }
                };
                Envelope::refresh(topic, updated_at)
            }
        }
    }

    /// Handle one change notification; returns the number of frames delivered
    pub async fn dispatch(&self, payload: &str) -> usize {
        let policy = &self.inner.policy;
        let registry = &self.inner.registry;
        let key = policy.key_shape.normalize(payload);
        if key.is_empty() {
            tracing::debug!(domain = %policy.topic, "Ignoring empty notification payload");
            return 0;
        }

        let Some(key) = policy.key_format.canonical(&key) else {
            tracing::warn!(domain = %policy.topic, payload, "Unexpected notification payload");
            return registry
                .broadcast(payload, &Envelope::refresh(policy.topic, None))
                .await;
        };

        if registry.subscriber_count(&key) == 0 {
            return 0;
        }

        let mut delivered = 0;
        for frame in self.frames_for(&key).await {
            delivered += registry.broadcast(&key, &frame).await;
        }
        delivered
    }
}

impl std::fmt::Debug for LiveHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHub")
            .field("topic", &self.topic())
            .field("topics", &self.inner.registry.topic_count())
            .field("listener", &self.listener_state())
            .finish()
    }
}
