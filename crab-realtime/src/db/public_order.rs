//! Public order tracking projection, keyed by order number

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;

use crate::error::BoxError;
use crate::live::{Lookup, ProjectionProvider, Snapshot};

#[derive(sqlx::FromRow)]
struct PublicOrder {
    order_number: String,
    status: String,
    merchant_name: String,
    total_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    items: serde_json::Value,
}

/// Result of checking a tracking link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingCheck {
    Valid,
    Mismatch,
    UnknownOrder,
}

impl TrackingCheck {
    fn evaluate(stored: Option<&str>, presented: &str) -> Self {
        match stored {
            None => TrackingCheck::UnknownOrder,
            Some(stored) if !presented.is_empty() && stored == presented => TrackingCheck::Valid,
            Some(_) => TrackingCheck::Mismatch,
        }
    }
}

/// Compare `token` with the order's tracking token
pub async fn verify_tracking_token(
    pool: &PgPool,
    order_number: &str,
    token: &str,
) -> Result<TrackingCheck, BoxError> {
    let stored: Option<(String,)> =
        sqlx::query_as("SELECT tracking_token FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(pool)
            .await?;
    Ok(TrackingCheck::evaluate(
        stored.as_ref().map(|(t,)| t.as_str()),
        token,
    ))
}

pub struct PublicOrderProvider {
    pool: PgPool,
}

impl PublicOrderProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectionProvider for PublicOrderProvider {
    async fn fetch_snapshot(&self, key: &str) -> Result<Lookup, BoxError> {
        let row: Option<PublicOrder> = sqlx::query_as(
            r#"
            SELECT
                o.order_number,
                o.status,
                m.name AS merchant_name,
                o.total_cents,
                o.created_at,
                o.updated_at,
                COALESCE((
                    SELECT jsonb_agg(
                        jsonb_build_object('name', i.name, 'quantity', i.quantity)
                        ORDER BY i.id
                    )
                    FROM order_items i
                    WHERE i.order_id = o.id
                ), '[]'::jsonb) AS items
            FROM orders o
            JOIN merchants m ON m.id = o.merchant_id
            WHERE o.order_number = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(order) = row else {
            return Ok(Lookup::Missing { status: None });
        };

        Ok(Lookup::Found(Snapshot {
            document: json!({
                "orderNumber": order.order_number,
                "status": order.status,
                "merchantName": order.merchant_name,
                "totalCents": order.total_cents,
                "createdAt": order.created_at,
                "items": order.items,
            }),
            updated_at: Some(order.updated_at),
            expires_at: None,
        }))
    }

    async fn fetch_last_changed(&self, key: &str) -> Result<Option<DateTime<Utc>>, BoxError> {
        let at: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT updated_at FROM orders WHERE order_number = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(at.map(|(at,)| at))
    }
}
