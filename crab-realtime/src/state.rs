//! Application state for crab-realtime

use std::sync::Arc;

use shared::realtime::Topic;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::{
    CustomerDisplayProvider, GroupOrderProvider, MerchantOrdersProvider, PgChangeFeed,
    PgSessionExpirer, PublicOrderProvider,
};
use crate::error::BoxError;
use crate::live::watchdog::SessionExpirer;
use crate::live::{Backoff, ChangeFeed, DomainPolicy, LiveHub, ProjectionProvider};

/// One hub per broadcast domain, created once at startup
#[derive(Clone)]
pub struct Hubs {
    pub merchant_orders: LiveHub,
    pub customer_display: LiveHub,
    pub public_order: LiveHub,
    pub group_order: LiveHub,
}

impl Hubs {
    pub fn new(pool: &PgPool, backoff: Backoff) -> Self {
        let feed: Arc<dyn ChangeFeed> = Arc::new(PgChangeFeed::new(pool.clone()));
        let hub = |topic: Topic, provider: Arc<dyn ProjectionProvider>| {
            LiveHub::new(
                DomainPolicy::for_topic(topic),
                provider,
                feed.clone(),
                backoff.clone(),
            )
        };

        Self {
            merchant_orders: hub(
                Topic::MerchantOrders,
                Arc::new(MerchantOrdersProvider::new(pool.clone())),
            ),
            customer_display: hub(
                Topic::CustomerDisplay,
                Arc::new(CustomerDisplayProvider::new(pool.clone())),
            ),
            public_order: hub(
                Topic::PublicOrder,
                Arc::new(PublicOrderProvider::new(pool.clone())),
            ),
            group_order: hub(
                Topic::GroupOrder,
                Arc::new(GroupOrderProvider::new(pool.clone())),
            ),
        }
    }

    pub fn all(&self) -> [&LiveHub; 4] {
        [
            &self.merchant_orders,
            &self.customer_display,
            &self.public_order,
            &self.group_order,
        ]
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL pool for snapshot queries and token checks
    pub pool: PgPool,
    /// JWT secret for merchant / display tokens
    pub jwt_secret: String,
    pub hubs: Hubs,
    pub session_expirer: Arc<dyn SessionExpirer>,
    /// Cancelled on Ctrl-C / SIGTERM; every socket task watches it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub async fn new(config: &Config, shutdown: CancellationToken) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        let backoff = Backoff::new(config.listen_backoff_initial, config.listen_backoff_max);

        Ok(Self {
            hubs: Hubs::new(&pool, backoff),
            session_expirer: Arc::new(PgSessionExpirer::new(pool.clone())),
            jwt_secret: config.jwt_secret.clone(),
            pool,
            shutdown,
        })
    }
}
