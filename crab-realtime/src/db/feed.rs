//! LISTEN connections backed by `sqlx::postgres::PgListener`

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgListener;

use crate::error::BoxError;
use crate::live::{ChangeConnection, ChangeFeed};

/// Hands out one dedicated listener connection per call
///
/// Listener connections are detached from the pool's query traffic; snapshot
/// queries never run on them.
#[derive(Clone)]
pub struct PgChangeFeed {
    pool: PgPool,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn acquire(&self) -> Result<Box<dyn ChangeConnection>, BoxError> {
        let listener = PgListener::connect_with(&self.pool).await?;
        Ok(Box::new(PgChangeConnection {
            listener: Some(listener),
        }))
    }
}

pub struct PgChangeConnection {
    listener: Option<PgListener>,
}

impl PgChangeConnection {
    fn listener(&mut self) -> Result<&mut PgListener, BoxError> {
        self.listener
            .as_mut()
            .ok_or_else(|| "listen connection already released".into())
    }
}

#[async_trait]
impl ChangeConnection for PgChangeConnection {
    async fn listen(&mut self, channel: &str) -> Result<(), BoxError> {
        self.listener()?.listen(channel).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String, BoxError> {
        // try_recv reports a lost connection as None instead of silently
        // reconnecting, so the caller can back off.
        match self.listener()?.try_recv().await? {
            Some(notification) => Ok(notification.payload().to_string()),
            None => Err("notification connection lost".into()),
        }
    }

    async fn release(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            if let Err(e) = listener.unlisten_all().await {
                tracing::debug!("UNLISTEN on release failed: {e}");
            }
        }
    }
}
