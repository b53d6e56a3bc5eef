//! crab-realtime: realtime fan-out hub
//!
//! Long-running service that:
//! - LISTENs on one PostgreSQL channel per broadcast domain
//! - Turns each change signal into a read-model snapshot
//! - Pushes it to every WebSocket client subscribed to the changed key
//!
//! Domains: merchant order boards, customer displays, public order tracking,
//! group-order sessions.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod live;
pub mod state;

pub use config::Config;
pub use error::{BoxError, ServiceError, TransportError};
pub use state::AppState;
