//! Merchant order board projection: active orders of one merchant

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;

use crate::error::BoxError;
use crate::live::{Lookup, ProjectionProvider, Snapshot};

/// Statuses shown on the board; everything else is history
pub const ACTIVE_ORDER_STATUSES: [&str; 4] = ["PENDING", "ACCEPTED", "PREPARING", "READY"];

#[derive(sqlx::FromRow)]
struct ActiveOrders {
    orders: serde_json::Value,
    updated_at: Option<DateTime<Utc>>,
}

pub struct MerchantOrdersProvider {
    pool: PgPool,
}

impl MerchantOrdersProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn merchant_id(key: &str) -> Result<i64, BoxError> {
    key.parse()
        .map_err(|_| format!("invalid merchant id: {key}").into())
}

#[async_trait]
impl ProjectionProvider for MerchantOrdersProvider {
    async fn fetch_snapshot(&self, key: &str) -> Result<Lookup, BoxError> {
        let merchant_id = merchant_id(key)?;
        let statuses: Vec<String> = ACTIVE_ORDER_STATUSES.iter().map(|s| s.to_string()).collect();

        let row: ActiveOrders = sqlx::query_as(
            r#"
            SELECT
                COALESCE(
                    jsonb_agg(
                        jsonb_build_object(
                            'id', o.id,
                            'orderNumber', o.order_number,
                            'status', o.status,
                            'customerName', o.customer_name,
                            'totalCents', o.total_cents,
                            'createdAt', o.created_at,
                            'updatedAt', o.updated_at,
                            'items', COALESCE((
                                SELECT jsonb_agg(
                                    jsonb_build_object(
                                        'name', i.name,
                                        'quantity', i.quantity,
                                        'unitPriceCents', i.unit_price_cents
                                    ) ORDER BY i.id
                                )
                                FROM order_items i
                                WHERE i.order_id = o.id
                            ), '[]'::jsonb)
                        ) ORDER BY o.created_at
                    ),
                    '[]'::jsonb
                ) AS orders,
                MAX(o.updated_at) AS updated_at
            FROM orders o
            WHERE o.merchant_id = $1 AND o.status = ANY($2)
            "#,
        )
        .bind(merchant_id)
        .bind(&statuses)
        .fetch_one(&self.pool)
        .await?;

        Ok(Lookup::Found(Snapshot {
            document: json!({
                "merchantId": merchant_id,
                "orders": row.orders,
            }),
            updated_at: row.updated_at,
            expires_at: None,
        }))
    }

    async fn fetch_last_changed(&self, key: &str) -> Result<Option<DateTime<Utc>>, BoxError> {
        let merchant_id = merchant_id(key)?;
        let row: (Option<DateTime<Utc>>,) =
            sqlx::query_as("SELECT MAX(updated_at) FROM orders WHERE merchant_id = $1")
                .bind(merchant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
