use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Topic;

/// Closed set of per-topic message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Full current-state document
    State,
    /// Lightweight "something changed" signal
    Refresh,
    /// The subscription scope is gone (session closed/expired)
    Closed,
}

impl MessageKind {
    pub const fn suffix(&self) -> &'static str {
        match self {
            MessageKind::State => "state",
            MessageKind::Refresh => "refresh",
            MessageKind::Closed => "closed",
        }
    }
}

/// Push frame sent to subscribers
///
/// `data` is forwarded verbatim from the projection; the hub never looks
/// inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    fn of(topic: Topic, kind: MessageKind) -> Self {
        Self {
            kind: format!("{}.{}", topic.prefix(), kind.suffix()),
            data: None,
            status: None,
            updated_at: None,
            message: None,
        }
    }

    pub fn state(topic: Topic, data: Value, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            data: Some(data),
            updated_at,
            ..Self::of(topic, MessageKind::State)
        }
    }

    pub fn refresh(topic: Topic, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            updated_at,
            ..Self::of(topic, MessageKind::Refresh)
        }
    }

    pub fn closed(topic: Topic, status: Option<String>) -> Self {
        Self {
            status,
            ..Self::of(topic, MessageKind::Closed)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            data: None,
            status: None,
            updated_at: None,
            message: Some(message.into()),
        }
    }

    /// True for `<any topic>.closed`
    pub fn is_closed(&self) -> bool {
        self.kind
            .rsplit_once('.')
            .is_some_and(|(_, suffix)| suffix == MessageKind::Closed.suffix())
    }

    /// True when `kind` is `<topic>.<kind>`
    pub fn is(&self, topic: Topic, kind: MessageKind) -> bool {
        self.kind
            .strip_prefix(topic.prefix())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|suffix| suffix == kind.suffix())
    }
}
