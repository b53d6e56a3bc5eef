//! Realtime fan-out hub
//!
//! Turns PostgreSQL `NOTIFY` signals into push frames for four independent
//! broadcast domains. Each domain owns one [`LiveHub`].
//!
//! ```text
//! pg_notify(channel, key)
//!       │
//!       ▼
//! ChangeListener (one task per domain, dedicated LISTEN connection)
//!       │ key → ProjectionProvider::fetch_snapshot
//!       ▼
//! LiveHub ── frames (state + legacy refresh | fallback)
//!       │
//!       ▼
//! TopicRegistry: key → {ClientHandle}
//!       │ per-client write mutex
//!       ▼
//! WebSocket clients
//! ```

pub mod client;
pub mod domain;
pub mod hub;
pub mod listener;
pub mod projection;
pub mod registry;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ClientHandle, FrameSink};
pub use domain::{DomainPolicy, Fallback, KeyFormat, KeyShape};
pub use hub::LiveHub;
pub use listener::{Backoff, ChangeConnection, ChangeFeed, ChangeListener, ListenerState, StateCell};
pub use projection::{Lookup, ProjectionProvider, Snapshot};
pub use registry::{Subscription, TopicRegistry};
