//! Product-feedback entries with window-based dedupe.

use super::{format_ts, now_ts, Store};
use async_trait::async_trait;
use chrono::Utc;
use meridian_core::{error::MeridianError, traits::FeedbackSink};
use tracing::debug;

impl Store {
    /// Record one feedback item unless the same (user, title) already has an
    /// entry inside the dedupe window. Returns whether a row was written.
    pub async fn record_feedback(
        &self,
        user_id: i64,
        title: &str,
        details: &str,
        dedupe_window: chrono::Duration,
    ) -> Result<bool, MeridianError> {
        let since = format_ts(Utc::now() - dedupe_window);
        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM feedback_entries \
             WHERE user_id = ? AND title = ? AND created_at >= ? LIMIT 1",
        )
        .bind(user_id)
        .bind(title)
        .bind(&since)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("feedback lookup failed: {e}")))?;

        if existing.is_some() {
            debug!("feedback deduped for user {user_id}: {title}");
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO feedback_entries (user_id, title, details, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(title)
        .bind(details)
        .bind(now_ts())
        .execute(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("feedback insert failed: {e}")))?;

        Ok(true)
    }

    /// Total feedback rows for a user.
    pub async fn feedback_count(&self, user_id: i64) -> Result<i64, MeridianError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM feedback_entries WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| MeridianError::Store(format!("feedback count failed: {e}")))?;
        Ok(count)
    }
}

#[async_trait]
impl FeedbackSink for Store {
    async fn record(
        &self,
        user_id: i64,
        title: &str,
        details: &str,
        dedupe_window: chrono::Duration,
    ) -> Result<bool, MeridianError> {
        self.record_feedback(user_id, title, details, dedupe_window)
            .await
    }
}
