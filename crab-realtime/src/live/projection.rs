//! Projection provider contract
//!
//! A provider turns a topic key into the current read-model document. The hub
//! only forwards `document`; it never looks inside.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::BoxError;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub document: Value,
    pub updated_at: Option<DateTime<Utc>>,
    /// Group-order sessions only
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Snapshot),
    /// Nothing to show; `status` is set when the row exists but is no longer live
    Missing { status: Option<String> },
}

#[async_trait]
pub trait ProjectionProvider: Send + Sync {
    async fn fetch_snapshot(&self, key: &str) -> Result<Lookup, BoxError>;

    /// Cheap fallback timestamp used when the full snapshot cannot be built
    async fn fetch_last_changed(&self, _key: &str) -> Result<Option<DateTime<Utc>>, BoxError> {
        Ok(None)
    }
}
