//! Shared types for the order backend
//!
//! Error types, response structures and the realtime push protocol used by
//! the server crates and their test clients.

pub mod error;
pub mod realtime;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use realtime::{Envelope, MessageKind, Topic};
