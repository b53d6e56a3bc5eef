//! Realtime push protocol
//!
//! Server → Client only. Every frame is a JSON [`Envelope`]; the `type` field
//! is `<topic>.state`, `<topic>.refresh`, `<topic>.closed` or `error`.

mod envelope;

pub use envelope::{Envelope, MessageKind};

use serde::{Deserialize, Serialize};

/// Independent broadcast domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Merchant order board (keyed by merchant id)
    MerchantOrders,
    /// Customer-facing display (keyed by merchant id)
    CustomerDisplay,
    /// Public order tracking (keyed by order number)
    PublicOrder,
    /// Group-order session (keyed by session code)
    GroupOrder,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::MerchantOrders,
        Topic::CustomerDisplay,
        Topic::PublicOrder,
        Topic::GroupOrder,
    ];

    /// Prefix of the envelope `type` field
    pub const fn prefix(&self) -> &'static str {
        match self {
            Topic::MerchantOrders => "merchant_orders",
            Topic::CustomerDisplay => "customer_display",
            Topic::PublicOrder => "public_order",
            Topic::GroupOrder => "group_order",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}
