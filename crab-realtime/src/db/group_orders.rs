//! Group-order sessions: projection and expiry

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::BoxError;
use crate::live::domain::{GROUP_ORDER_CHANNEL, SESSION_EXPIRED, SESSION_OPEN};
use crate::live::watchdog::SessionExpirer;
use crate::live::{Lookup, ProjectionProvider, Snapshot};

/// Session row with the effective status
///
/// An OPEN session whose deadline has passed reads as EXPIRED even before the
/// watchdog writes it.
#[derive(sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRow {
    code: String,
    merchant_id: i64,
    status: String,
    host_name: String,
    expires_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    participants: serde_json::Value,
}

pub struct GroupOrderProvider {
    pool: PgPool,
}

impl GroupOrderProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_lookup(row: Option<SessionRow>) -> Result<Lookup, BoxError> {
    let Some(row) = row else {
        return Ok(Lookup::Missing { status: None });
    };
    if row.status != SESSION_OPEN {
        return Ok(Lookup::Missing {
            status: Some(row.status),
        });
    }
    Ok(Lookup::Found(Snapshot {
        updated_at: Some(row.updated_at),
        expires_at: row.expires_at,
        document: serde_json::to_value(&row)?,
    }))
}

#[async_trait]
impl ProjectionProvider for GroupOrderProvider {
    async fn fetch_snapshot(&self, key: &str) -> Result<Lookup, BoxError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT
                s.code,
                s.merchant_id,
                CASE
                    WHEN s.status = $2 AND s.expires_at IS NOT NULL AND s.expires_at <= now()
                    THEN $3
                    ELSE s.status
                END AS status,
                s.host_name,
                s.expires_at,
                s.updated_at,
                COALESCE((
                    SELECT jsonb_agg(
                        jsonb_build_object('name', p.name, 'items', p.items)
                        ORDER BY p.joined_at
                    )
                    FROM group_order_participants p
                    WHERE p.session_code = s.code
                ), '[]'::jsonb) AS participants
            FROM group_order_sessions s
            WHERE s.code = $1
            "#,
        )
        .bind(key)
        .bind(SESSION_OPEN)
        .bind(SESSION_EXPIRED)
        .fetch_optional(&self.pool)
        .await?;

        to_lookup(row)
    }
}

/// Conditional OPEN → EXPIRED update plus notification, in one transaction
pub struct PgSessionExpirer {
    pool: PgPool,
}

impl PgSessionExpirer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionExpirer for PgSessionExpirer {
    async fn expire(&self, code: &str) -> Result<bool, BoxError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE group_order_sessions
            SET status = $1, updated_at = now()
            WHERE code = $2 AND status = $3 AND expires_at <= now()
            "#,
        )
        .bind(SESSION_EXPIRED)
        .bind(code)
        .bind(SESSION_OPEN)
        .execute(&mut *tx)
        .await?;

        let expired = result.rows_affected() > 0;
        if expired {
            sqlx::query("SELECT pg_notify($1, $2)")
                .bind(GROUP_ORDER_CHANNEL)
                .bind(code)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(expired)
    }
}
