//! Database access layer
//!
//! One projection provider per broadcast domain, the LISTEN feed and the
//! group-order session expirer. Read-model queries run on the general pool;
//! listener connections are dedicated.

pub mod customer_display;
pub mod feed;
pub mod group_orders;
pub mod merchant_orders;
pub mod public_order;

pub use customer_display::CustomerDisplayProvider;
pub use feed::PgChangeFeed;
pub use group_orders::{GroupOrderProvider, PgSessionExpirer};
pub use merchant_orders::MerchantOrdersProvider;
pub use public_order::PublicOrderProvider;
