//! Customer display projection: the state document pushed to a merchant's
//! customer-facing screen

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::merchant_orders::merchant_id;
use crate::error::BoxError;
use crate::live::{Lookup, ProjectionProvider, Snapshot};

#[derive(sqlx::FromRow)]
struct DisplayState {
    state: serde_json::Value,
    updated_at: DateTime<Utc>,
}

pub struct CustomerDisplayProvider {
    pool: PgPool,
}

impl CustomerDisplayProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectionProvider for CustomerDisplayProvider {
    async fn fetch_snapshot(&self, key: &str) -> Result<Lookup, BoxError> {
        let row: Option<DisplayState> = sqlx::query_as(
            "SELECT state, updated_at FROM customer_display_states WHERE merchant_id = $1",
        )
        .bind(merchant_id(key)?)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Lookup::Found(Snapshot {
                document: row.state,
                updated_at: Some(row.updated_at),
                expires_at: None,
            }),
            None => Lookup::Missing { status: None },
        })
    }

    async fn fetch_last_changed(&self, key: &str) -> Result<Option<DateTime<Utc>>, BoxError> {
        let at: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT updated_at FROM customer_display_states WHERE merchant_id = $1",
        )
        .bind(merchant_id(key)?)
        .fetch_optional(&self.pool)
        .await?;
        Ok(at.map(|(at,)| at))
    }
}
