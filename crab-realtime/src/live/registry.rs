//! Topic registry: topic key → subscribed clients
//!
//! One registry per broadcast domain, guarded by a single reader/writer lock.
//! Broadcasts copy the subscriber list under the read lock and write to the
//! sockets with no lock held.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use futures::future::join_all;
use shared::realtime::Envelope;

use super::client::ClientHandle;
use super::domain::KeyShape;

/// key → (client id → client)
type TopicMap = HashMap<String, HashMap<u64, Arc<ClientHandle>>>;

fn read(lock: &RwLock<TopicMap>) -> RwLockReadGuard<'_, TopicMap> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(lock: &RwLock<TopicMap>) -> RwLockWriteGuard<'_, TopicMap> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Remove one client from one key, dropping the key once its set is empty
fn remove_entry(topics: &mut TopicMap, key: &str, client_id: u64) {
    if let Some(set) = topics.get_mut(key) {
        set.remove(&client_id);
        if set.is_empty() {
            topics.remove(key);
        }
    }
}

pub struct TopicRegistry {
    key_shape: KeyShape,
    topics: Arc<RwLock<TopicMap>>,
}

impl TopicRegistry {
    pub fn new(key_shape: KeyShape) -> Self {
        Self {
            key_shape,
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe `client` under `key`
    ///
    /// An empty key (after normalization) is a no-op and yields an inert
    /// subscription. The returned handle unsubscribes on drop.
    pub fn subscribe(&self, key: &str, client: &Arc<ClientHandle>) -> Subscription {
        let key = self.key_shape.normalize(key);
        if key.is_empty() {
            return Subscription {
                topics: Weak::new(),
                key: None,
                client_id: client.id(),
            };
        }

        write(&self.topics)
            .entry(key.to_string())
            .or_default()
            .insert(client.id(), client.clone());

        Subscription {
            topics: Arc::downgrade(&self.topics),
            key: Some(key.into_owned()),
            client_id: client.id(),
        }
    }

    /// Send `envelope` to every subscriber of `key`
    ///
    /// Clients whose write fails are closed and removed from every key.
    /// Returns the number of successful deliveries.
    pub async fn broadcast(&self, key: &str, envelope: &Envelope) -> usize {
        let key = self.key_shape.normalize(key);
        if key.is_empty() {
            return 0;
        }

        let clients: Vec<Arc<ClientHandle>> = {
            let topics = read(&self.topics);
            match topics.get(key.as_ref()) {
                Some(set) => set.values().cloned().collect(),
                None => return 0,
            }
        };

        let text = match serde_json::to_string(envelope) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(key = %key, "Failed to encode frame: {e}");
                return 0;
            }
        };

        let results = join_all(clients.iter().map(|client| client.send_text(text.clone()))).await;

        let closes = envelope.is_closed();
        let mut delivered = 0;
        for (client, result) in clients.iter().zip(results) {
            match result {
                Ok(()) => {
                    if closes {
                        client.mark_closed_delivered();
                    }
                    delivered += 1;
                }
                Err(e) => {
                    tracing::debug!(
                        key = %key,
                        client_id = client.id(),
                        "Dropping client after failed send: {e}"
                    );
                    client.close().await;
                    self.remove_client(client.id());
                }
            }
        }
        delivered
    }

    /// Remove a client from every key it is subscribed to
    pub fn remove_client(&self, client_id: u64) {
        let mut topics = write(&self.topics);
        topics.retain(|_, set| {
            set.remove(&client_id);
            !set.is_empty()
        });
    }

    /// Number of keys with at least one subscriber
    pub fn topic_count(&self) -> usize {
        read(&self.topics).len()
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        let key = self.key_shape.normalize(key);
        read(&self.topics).get(key.as_ref()).map_or(0, HashMap::len)
    }
}

/// Handle returned by [`TopicRegistry::subscribe`]
///
/// `unsubscribe` may be called any number of times; dropping the handle
/// unsubscribes as well.
#[derive(Debug)]
pub struct Subscription {
    topics: Weak<RwLock<TopicMap>>,
    key: Option<String>,
    client_id: u64,
}

impl Subscription {
    /// Normalized key, `None` for an inert subscription
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn unsubscribe(&self) {
        let (Some(key), Some(topics)) = (self.key.as_deref(), self.topics.upgrade()) else {
            return;
        };
        remove_entry(&mut write(&topics), key, self.client_id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
