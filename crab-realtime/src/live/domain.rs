//! Per-domain behaviour of the hub
//!
//! The four domains share one pipeline and differ only in the knobs below.

use std::borrow::Cow;

use shared::realtime::Topic;

pub const MERCHANT_ORDERS_CHANNEL: &str = "merchant_orders_changed";
pub const CUSTOMER_DISPLAY_CHANNEL: &str = "customer_display_changed";
pub const PUBLIC_ORDER_CHANNEL: &str = "public_order_changed";
pub const GROUP_ORDER_CHANNEL: &str = "group_order_changed";

/// Group-order status written by the expiry watchdog
pub const SESSION_EXPIRED: &str = "EXPIRED";
/// The only group-order status that still accepts subscribers
pub const SESSION_OPEN: &str = "OPEN";

/// How a raw key is normalized before it touches the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    Trimmed,
    /// Session codes: trimmed and upper-cased
    TrimmedUpper,
}

impl KeyShape {
    pub fn normalize<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        let trimmed = raw.trim();
        match self {
            KeyShape::TrimmedUpper if trimmed.chars().any(char::is_lowercase) => {
                Cow::Owned(trimmed.to_uppercase())
            }
            _ => Cow::Borrowed(trimmed),
        }
    }
}

/// Identifier shape a notification payload must have to be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Merchant ids
    Numeric,
    Any,
}

impl KeyFormat {
    /// Registry spelling of `key`, `None` if it has the wrong shape
    ///
    /// Numeric keys are re-rendered from the parsed id, so `042` and `+42`
    /// reach the subscribers of `42`.
    pub fn canonical<'a>(&self, key: &'a str) -> Option<Cow<'a, str>> {
        match self {
            KeyFormat::Numeric => {
                let id = key.parse::<i64>().ok()?;
                let rendered = id.to_string();
                if rendered == key {
                    Some(Cow::Borrowed(key))
                } else {
                    Some(Cow::Owned(rendered))
                }
            }
            KeyFormat::Any if key.is_empty() => None,
            KeyFormat::Any => Some(Cow::Borrowed(key)),
        }
    }
}

/// What subscribers get when no snapshot can be built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// `<topic>.refresh` with the best-effort last-changed timestamp
    Refresh,
    /// `<topic>.closed` with whatever status is known
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct DomainPolicy {
    pub topic: Topic,
    /// `LISTEN` channel, fixed for the process
    pub channel: &'static str,
    pub key_shape: KeyShape,
    pub key_format: KeyFormat,
    /// Echo every state frame with a refresh carrying the same `updatedAt`,
    /// for older clients that still poll.
    pub legacy_refresh: bool,
    pub fallback: Fallback,
}

impl DomainPolicy {
    pub const fn for_topic(topic: Topic) -> Self {
        match topic {
            Topic::MerchantOrders => Self {
                topic,
                channel: MERCHANT_ORDERS_CHANNEL,
                key_shape: KeyShape::Trimmed,
                key_format: KeyFormat::Numeric,
                legacy_refresh: true,
                fallback: Fallback::Refresh,
            },
            Topic::CustomerDisplay => Self {
                topic,
                channel: CUSTOMER_DISPLAY_CHANNEL,
                key_shape: KeyShape::Trimmed,
                key_format: KeyFormat::Numeric,
                legacy_refresh: false,
                fallback: Fallback::Refresh,
            },
            Topic::PublicOrder => Self {
                topic,
                channel: PUBLIC_ORDER_CHANNEL,
                key_shape: KeyShape::Trimmed,
                key_format: KeyFormat::Any,
                legacy_refresh: true,
                fallback: Fallback::Refresh,
            },
            Topic::GroupOrder => Self {
                topic,
                channel: GROUP_ORDER_CHANNEL,
                key_shape: KeyShape::TrimmedUpper,
                key_format: KeyFormat::Any,
                legacy_refresh: false,
                fallback: Fallback::Closed,
            },
        }
    }
}
