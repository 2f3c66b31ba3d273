// Notifications are an outbox: the settlement path queues a row and a
// delivery worker elsewhere drains it. Queueing must never fail a payout.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PayoutCompleted,
    PayoutFailed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PayoutCompleted => "payout_completed",
            NotificationKind::PayoutFailed => "payout_failed",
        }
    }
}

/// Fire-and-forget notification port. Callers are expected to swallow and
/// log errors; delivery is never allowed to block or fail money movement.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
        metadata: serde_json::Value,
    ) -> AppResult<()>;
}

/// Postgres outbox implementation
pub struct NotificationOutbox {
    pool: PgPool,
}

impl NotificationOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for NotificationOutbox {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
        metadata: serde_json::Value,
    ) -> AppResult<()> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, body, metadata, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(body)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        info!("Notification queued: {} ({})", id, kind.as_str());
        Ok(())
    }
}
