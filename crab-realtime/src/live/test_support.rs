//! In-memory fakes for the hub's seams (test-only)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::realtime::{Envelope, Topic};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Instant;

use super::client::{ClientHandle, FrameSink};
use super::domain::{DomainPolicy, SESSION_EXPIRED, SESSION_OPEN};
use super::hub::LiveHub;
use super::listener::{Backoff, ChangeConnection, ChangeFeed};
use super::projection::{Lookup, ProjectionProvider, Snapshot};
use super::watchdog::SessionExpirer;
use crate::error::{BoxError, TransportError};

// ── Client transport ────────────────────────────────────────────────

struct RecordingSink {
    tx: UnboundedSender<String>,
    broken: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Receiving side of a recorded client
pub struct Inbox {
    rx: UnboundedReceiver<String>,
    broken: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl Inbox {
    /// Next frame; panics if none arrives
    pub async fn next(&mut self) -> Envelope {
        let text = tokio::time::timeout(Duration::from_secs(600), self.rx.recv())
            .await
            .expect("no frame received")
            .expect("client sink dropped");
        serde_json::from_str(&text).expect("frame is not an envelope")
    }

    /// Every frame received so far
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut frames = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&text).expect("frame is not an envelope"));
        }
        frames
    }

    /// Make every later send fail
    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn recording_client() -> (Arc<ClientHandle>, Inbox) {
    let (tx, rx) = unbounded_channel();
    let broken = Arc::new(AtomicBool::new(false));
    let closed = Arc::new(AtomicBool::new(false));
    let client = ClientHandle::new(RecordingSink {
        tx,
        broken: broken.clone(),
        closed: closed.clone(),
    });
    (client, Inbox { rx, broken, closed })
}

// ── Projection provider ─────────────────────────────────────────────

enum Entry {
    Found(Snapshot),
    Missing(Option<String>),
    Failing,
}

/// Provider answering from a fixed table
///
/// Unknown keys are `Missing` without status. `fetch_last_changed` fails for
/// keys that were never given a timestamp.
#[derive(Default)]
pub struct StaticProvider {
    entries: StdMutex<HashMap<String, Entry>>,
    last_changed: StdMutex<HashMap<String, Option<DateTime<Utc>>>>,
    snapshot_calls: AtomicUsize,
}

impl StaticProvider {
    pub fn set_found(&self, key: &str, document: Value, updated_at: Option<DateTime<Utc>>) {
        self.insert(
            key,
            Entry::Found(Snapshot {
                document,
                updated_at,
                expires_at: None,
            }),
        );
    }

    pub fn set_session(&self, key: &str, document: Value, expires_at: Option<DateTime<Utc>>) {
        self.insert(
            key,
            Entry::Found(Snapshot {
                document,
                updated_at: None,
                expires_at,
            }),
        );
    }

    pub fn set_missing(&self, key: &str, status: Option<&str>) {
        self.insert(key, Entry::Missing(status.map(str::to_string)));
    }

    pub fn set_failing(&self, key: &str) {
        self.insert(key, Entry::Failing);
    }

    pub fn set_last_changed(&self, key: &str, at: Option<DateTime<Utc>>) {
        self.last_changed.lock().unwrap().insert(key.to_string(), at);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    fn insert(&self, key: &str, entry: Entry) {
        self.entries.lock().unwrap().insert(key.to_string(), entry);
    }
}

#[async_trait]
impl ProjectionProvider for StaticProvider {
    async fn fetch_snapshot(&self, key: &str) -> Result<Lookup, BoxError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        match self.entries.lock().unwrap().get(key) {
            Some(Entry::Found(snapshot)) => Ok(Lookup::Found(snapshot.clone())),
            Some(Entry::Missing(status)) => Ok(Lookup::Missing {
                status: status.clone(),
            }),
            Some(Entry::Failing) => Err(format!("snapshot query for {key} failed").into()),
            None => Ok(Lookup::Missing { status: None }),
        }
    }

    async fn fetch_last_changed(&self, key: &str) -> Result<Option<DateTime<Utc>>, BoxError> {
        match self.last_changed.lock().unwrap().get(key) {
            Some(at) => Ok(*at),
            None => Err(format!("last-changed query for {key} failed").into()),
        }
    }
}

// ── Change feed ─────────────────────────────────────────────────────

/// What the next `acquire` does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FailAcquire,
    /// Acquire succeeds, LISTEN fails
    FailListen,
    Serve,
}

/// Feed replaying a script of acquire outcomes, then serving forever
pub struct ScriptedFeed {
    script: StdMutex<VecDeque<Step>>,
    /// `None` ends the current connection with a stream error
    notifications: Arc<Mutex<UnboundedReceiver<Option<String>>>>,
    attempts_tx: UnboundedSender<Instant>,
    listening_tx: UnboundedSender<()>,
    attempts: AtomicUsize,
    released: Arc<AtomicUsize>,
    channels: Arc<StdMutex<Vec<String>>>,
}

/// Test-side handle of a [`ScriptedFeed`]
pub struct FeedControl {
    notify_tx: UnboundedSender<Option<String>>,
    attempts_rx: UnboundedReceiver<Instant>,
    listening_rx: UnboundedReceiver<()>,
}

impl ScriptedFeed {
    pub fn new(script: Vec<Step>) -> (Arc<Self>, FeedControl) {
        let (notify_tx, notify_rx) = unbounded_channel();
        let (attempts_tx, attempts_rx) = unbounded_channel();
        let (listening_tx, listening_rx) = unbounded_channel();
        let feed = Arc::new(Self {
            script: StdMutex::new(script.into()),
            notifications: Arc::new(Mutex::new(notify_rx)),
            attempts_tx,
            listening_tx,
            attempts: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            channels: Arc::new(StdMutex::new(Vec::new())),
        });
        let control = FeedControl {
            notify_tx,
            attempts_rx,
            listening_rx,
        };
        (feed, control)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Channels of every successful LISTEN, in order
    pub fn listened_channels(&self) -> Vec<String> {
        self.channels.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeFeed for ScriptedFeed {
    async fn acquire(&self) -> Result<Box<dyn ChangeConnection>, BoxError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let _ = self.attempts_tx.send(Instant::now());

        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Serve);
        if step == Step::FailAcquire {
            return Err("connection refused".into());
        }
        Ok(Box::new(ScriptedConnection {
            fail_listen: step == Step::FailListen,
            notifications: self.notifications.clone(),
            listening_tx: self.listening_tx.clone(),
            released: self.released.clone(),
            channels: self.channels.clone(),
        }))
    }
}

struct ScriptedConnection {
    fail_listen: bool,
    notifications: Arc<Mutex<UnboundedReceiver<Option<String>>>>,
    listening_tx: UnboundedSender<()>,
    released: Arc<AtomicUsize>,
    channels: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl ChangeConnection for ScriptedConnection {
    async fn listen(&mut self, channel: &str) -> Result<(), BoxError> {
        if self.fail_listen {
            return Err(format!("LISTEN {channel} rejected").into());
        }
        self.channels.lock().unwrap().push(channel.to_string());
        let _ = self.listening_tx.send(());
        Ok(())
    }

    async fn recv(&mut self) -> Result<String, BoxError> {
        match self.notifications.lock().await.recv().await {
            Some(Some(payload)) => Ok(payload),
            Some(None) => Err("connection reset by peer".into()),
            None => Err("notification source gone".into()),
        }
    }

    async fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl FeedControl {
    pub fn notify(&self, payload: &str) {
        let _ = self.notify_tx.send(Some(payload.to_string()));
    }

    /// Fail the current connection's next wait
    pub fn drop_connection(&self) {
        let _ = self.notify_tx.send(None);
    }

    /// Time of the next `acquire` call
    pub async fn next_attempt(&mut self) -> Instant {
        self.attempts_rx.recv().await.expect("feed dropped")
    }

    /// Resolves after the next successful LISTEN
    pub async fn wait_listening(&mut self) {
        self.listening_rx.recv().await.expect("feed dropped");
    }

    /// Let every runnable task finish (paused clock only)
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn hub_with(
    topic: Topic,
    provider: Arc<StaticProvider>,
    feed: Arc<ScriptedFeed>,
) -> LiveHub {
    LiveHub::new(
        DomainPolicy::for_topic(topic),
        provider,
        feed,
        Backoff::default(),
    )
}

// ── Session store ───────────────────────────────────────────────────

/// Session statuses held in memory; `expire` mirrors the conditional update
#[derive(Default)]
pub struct MemoryExpirer {
    sessions: StdMutex<HashMap<String, (String, DateTime<Utc>)>>,
    transitions: AtomicUsize,
}

impl MemoryExpirer {
    pub fn open_session(&self, code: &str, expires_at: DateTime<Utc>) {
        self.sessions
            .lock()
            .unwrap()
            .insert(code.to_string(), (SESSION_OPEN.to_string(), expires_at));
    }

    pub fn status(&self, code: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(code)
            .map(|(status, _)| status.clone())
    }

    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionExpirer for MemoryExpirer {
    async fn expire(&self, code: &str) -> Result<bool, BoxError> {
        tokio::task::yield_now().await;
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(code) {
            Some((status, expires_at)) if status == SESSION_OPEN && *expires_at <= Utc::now() => {
                *status = SESSION_EXPIRED.to_string();
                self.transitions.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
