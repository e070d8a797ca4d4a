//! Notifications repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use super::NotificationsRepository;
use crate::{
    error::{AppError, AppResult},
    models::notification::{NewNotification, Notification, NotificationStats},
};

#[derive(Clone)]
pub struct PgNotificationsRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationsRepository for PgNotificationsRepository {
    async fn insert(&self, n: &NewNotification) -> AppResult<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                notification_type, priority, recipient_id, incident_id, rule_id,
                title, message, read, persistent, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(n.notification_type)
        .bind(n.priority)
        .bind(n.recipient_id)
        .bind(n.incident_id)
        .bind(&n.rule_id)
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.persistent)
        .bind(n.expires_at)
        .bind(n.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_for_user(&self, user_id: i32, unread_only: bool, limit: i64) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1 AND ($2 = FALSE OR read = FALSE)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn stats(&self, user_id: i32) -> AppResult<NotificationStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE read = FALSE) AS unread,
                   COUNT(*) FILTER (WHERE priority = 'low') AS low,
                   COUNT(*) FILTER (WHERE priority = 'medium') AS medium,
                   COUNT(*) FILTER (WHERE priority = 'high') AS high,
                   COUNT(*) FILTER (WHERE priority = 'critical') AS critical
            FROM notifications
            WHERE recipient_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(NotificationStats {
            total: row.get("total"),
            unread: row.get("unread"),
            low: row.get("low"),
            medium: row.get("medium"),
            high: row.get("high"),
            critical: row.get("critical"),
        })
    }

    async fn mark_read(&self, user_id: i32, id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE persistent = FALSE AND expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn record_dispatch(
        &self,
        incident_id: i32,
        rule_id: &str,
        recipient_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO notification_dispatches (incident_id, rule_id, recipient_id, dispatched_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (incident_id, rule_id, recipient_id) DO NOTHING
            "#,
        )
        .bind(incident_id)
        .bind(rule_id)
        .bind(recipient_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
