//! Validated point measurements.

use std::collections::BTreeMap;

use super::{format_ts, Store};
use chrono::{DateTime, Duration, Utc};
use meridian_core::{
    context::{MetricSummary, CONTEXT_METRIC_TYPES},
    daily::MetricType,
    error::MeridianError,
};

/// How far back a new reading can absorb an existing one.
const UPSERT_WINDOW_BACK: i64 = 3 * 60 * 60;
/// Slack forward of the reading, for clock skew between writers.
const UPSERT_WINDOW_FORWARD: i64 = 60;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl Store {
    /// Insert one validated measurement.
    pub async fn insert_metric(
        &self,
        user_id: i64,
        metric_type: MetricType,
        value: f64,
        taken_at: DateTime<Utc>,
    ) -> Result<i64, MeridianError> {
        let value = metric_type.validate(value)?;
        let result = sqlx::query(
            "INSERT INTO metrics (user_id, metric_type, value_num, taken_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(metric_type.as_str())
        .bind(value)
        .bind(format_ts(taken_at))
        .execute(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("metric insert failed: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a measurement, absorbing any reading of the same type within
    /// the recent window instead of duplicating it. A repeated "weighed in
    /// at 75kg" minutes apart updates the existing row.
    ///
    /// Returns `true` when a new row was inserted, `false` when an existing
    /// row inside the window was updated.
    pub async fn upsert_metric_windowed(
        &self,
        user_id: i64,
        metric_type: MetricType,
        value: f64,
        taken_at: DateTime<Utc>,
    ) -> Result<bool, MeridianError> {
        let value = metric_type.validate(value)?;
        let window_start = format_ts(taken_at - Duration::seconds(UPSERT_WINDOW_BACK));
        let window_end = format_ts(taken_at + Duration::seconds(UPSERT_WINDOW_FORWARD));

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM metrics \
             WHERE user_id = ? AND metric_type = ? AND taken_at >= ? AND taken_at <= ? \
             ORDER BY taken_at DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(metric_type.as_str())
        .bind(&window_start)
        .bind(&window_end)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("metric window lookup failed: {e}")))?;

        match existing {
            Some((id,)) => {
                sqlx::query("UPDATE metrics SET value_num = ?, taken_at = ? WHERE id = ?")
                    .bind(value)
                    .bind(format_ts(taken_at))
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| MeridianError::Store(format!("metric update failed: {e}")))?;
                Ok(false)
            }
            None => {
                self.insert_metric(user_id, metric_type, value, taken_at)
                    .await?;
                Ok(true)
            }
        }
    }

    /// Number of stored readings of one type for a user.
    pub async fn metric_count(
        &self,
        user_id: i64,
        metric_type: MetricType,
    ) -> Result<i64, MeridianError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM metrics WHERE user_id = ? AND metric_type = ?")
                .bind(user_id)
                .bind(metric_type.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| MeridianError::Store(format!("metric count failed: {e}")))?;
        Ok(count)
    }

    /// Seven-day summaries for every context metric type, relative to `now`.
    /// Types with no readings still get a zero-count entry so callers can
    /// detect missing data.
    pub async fn metric_summaries_7d(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<MetricType, MetricSummary>, MeridianError> {
        let since = format_ts(now - Duration::days(7));
        let mut summaries = BTreeMap::new();

        for metric_type in CONTEXT_METRIC_TYPES {
            let (count, avg): (i64, Option<f64>) = sqlx::query_as(
                "SELECT COUNT(*), AVG(value_num) FROM metrics \
                 WHERE user_id = ? AND metric_type = ? AND taken_at >= ?",
            )
            .bind(user_id)
            .bind(metric_type.as_str())
            .bind(&since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MeridianError::Store(format!("metric summary failed: {e}")))?;

            let latest: Option<(f64,)> = sqlx::query_as(
                "SELECT value_num FROM metrics \
                 WHERE user_id = ? AND metric_type = ? AND taken_at >= ? \
                 ORDER BY taken_at DESC, id DESC LIMIT 1",
            )
            .bind(user_id)
            .bind(metric_type.as_str())
            .bind(&since)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MeridianError::Store(format!("metric latest failed: {e}")))?;

            summaries.insert(
                metric_type,
                MetricSummary {
                    count,
                    latest: latest.map(|(v,)| round2(v)),
                    avg_7d: avg.map(round2),
                },
            );
        }

        Ok(summaries)
    }
}
