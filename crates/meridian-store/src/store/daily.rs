//! Merged daily logs.

use super::{format_ts, now_ts, Store};
use chrono::{DateTime, Duration, Utc};
use meridian_core::{
    daily::{DailyAggregate, MetricType},
    error::MeridianError,
};

const DAILY_COLUMNS: &str = "user_id, date, sleep_hours, energy, mood, stress, training_done, \
     nutrition_on_plan, extras_json, events_json, answers_json, unparsed_json";

#[derive(sqlx::FromRow)]
struct DailyLogRow {
    user_id: i64,
    date: String,
    sleep_hours: Option<f64>,
    energy: Option<f64>,
    mood: Option<f64>,
    stress: Option<f64>,
    training_done: Option<bool>,
    nutrition_on_plan: Option<bool>,
    extras_json: String,
    events_json: String,
    answers_json: String,
    unparsed_json: String,
}

impl DailyLogRow {
    fn into_aggregate(self) -> Result<DailyAggregate, MeridianError> {
        Ok(DailyAggregate {
            user_id: self.user_id,
            date: self.date,
            sleep_hours: self.sleep_hours,
            energy: self.energy,
            mood: self.mood,
            stress: self.stress,
            training_done: self.training_done,
            nutrition_on_plan: self.nutrition_on_plan,
            extras: serde_json::from_str(&self.extras_json)?,
            events: serde_json::from_str(&self.events_json)?,
            answers: serde_json::from_str(&self.answers_json)?,
            unparsed: serde_json::from_str(&self.unparsed_json)?,
        })
    }
}

impl Store {
    /// Load one user-day, or a fresh empty aggregate when none exists yet.
    pub async fn get_daily(&self, user_id: i64, date: &str) -> Result<DailyAggregate, MeridianError> {
        let row: Option<DailyLogRow> = sqlx::query_as(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_logs WHERE user_id = ? AND date = ?"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("daily lookup failed: {e}")))?;

        match row {
            Some(row) => row.into_aggregate(),
            None => Ok(DailyAggregate::new(user_id, date)),
        }
    }

    /// Persist a merged aggregate plus its extracted point measurements in
    /// one transaction. Either everything lands or nothing does.
    pub async fn commit_daily(
        &self,
        aggregate: &DailyAggregate,
        measurements: &[(MetricType, f64)],
        taken_at: DateTime<Utc>,
    ) -> Result<(), MeridianError> {
        let extras_json = serde_json::to_string(&aggregate.extras)?;
        let events_json = serde_json::to_string(&aggregate.events)?;
        let answers_json = serde_json::to_string(&aggregate.answers)?;
        let unparsed_json = serde_json::to_string(&aggregate.unparsed)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MeridianError::Store(format!("begin failed: {e}")))?;

        sqlx::query(
            "INSERT INTO daily_logs (user_id, date, sleep_hours, energy, mood, stress, \
             training_done, nutrition_on_plan, extras_json, events_json, answers_json, \
             unparsed_json, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, date) DO UPDATE SET \
             sleep_hours = excluded.sleep_hours, \
             energy = excluded.energy, \
             mood = excluded.mood, \
             stress = excluded.stress, \
             training_done = excluded.training_done, \
             nutrition_on_plan = excluded.nutrition_on_plan, \
             extras_json = excluded.extras_json, \
             events_json = excluded.events_json, \
             answers_json = excluded.answers_json, \
             unparsed_json = excluded.unparsed_json, \
             updated_at = excluded.updated_at",
        )
        .bind(aggregate.user_id)
        .bind(&aggregate.date)
        .bind(aggregate.sleep_hours)
        .bind(aggregate.energy)
        .bind(aggregate.mood)
        .bind(aggregate.stress)
        .bind(aggregate.training_done)
        .bind(aggregate.nutrition_on_plan)
        .bind(&extras_json)
        .bind(&events_json)
        .bind(&answers_json)
        .bind(&unparsed_json)
        .bind(now_ts())
        .execute(&mut *tx)
        .await
        .map_err(|e| MeridianError::Store(format!("daily upsert failed: {e}")))?;

        // Windowed measurement upserts ride the same transaction.
        let window_start = format_ts(taken_at - Duration::hours(3));
        let window_end = format_ts(taken_at + Duration::minutes(1));
        for (metric_type, value) in measurements {
            let value = metric_type.validate(*value)?;

            let existing: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM metrics \
                 WHERE user_id = ? AND metric_type = ? AND taken_at >= ? AND taken_at <= ? \
                 ORDER BY taken_at DESC LIMIT 1",
            )
            .bind(aggregate.user_id)
            .bind(metric_type.as_str())
            .bind(&window_start)
            .bind(&window_end)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| MeridianError::Store(format!("metric window lookup failed: {e}")))?;

            match existing {
                Some((id,)) => {
                    sqlx::query("UPDATE metrics SET value_num = ?, taken_at = ? WHERE id = ?")
                        .bind(value)
                        .bind(format_ts(taken_at))
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| MeridianError::Store(format!("metric update failed: {e}")))?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO metrics (user_id, metric_type, value_num, taken_at) \
                         VALUES (?, ?, ?, ?)",
                    )
                    .bind(aggregate.user_id)
                    .bind(metric_type.as_str())
                    .bind(value)
                    .bind(format_ts(taken_at))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| MeridianError::Store(format!("metric insert failed: {e}")))?;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| MeridianError::Store(format!("commit failed: {e}")))?;

        Ok(())
    }

    /// Daily logs on or after `since_date`, most recent first.
    pub async fn list_daily_since(
        &self,
        user_id: i64,
        since_date: &str,
    ) -> Result<Vec<DailyAggregate>, MeridianError> {
        let rows: Vec<DailyLogRow> = sqlx::query_as(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_logs \
             WHERE user_id = ? AND date >= ? ORDER BY date DESC"
        ))
        .bind(user_id)
        .bind(since_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("daily list failed: {e}")))?;

        rows.into_iter().map(DailyLogRow::into_aggregate).collect()
    }

    /// One-line digest of the last seven days of logs, or `None` when the
    /// user has logged nothing in that window.
    pub async fn daily_rollup_7d(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, MeridianError> {
        let since = (now - Duration::days(7))
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();
        let days = self.list_daily_since(user_id, &since).await?;
        if days.is_empty() {
            return Ok(None);
        }

        let logged = days.len();
        let trained = days
            .iter()
            .filter(|d| d.training_done == Some(true))
            .count();
        let on_plan = days
            .iter()
            .filter(|d| d.nutrition_on_plan == Some(true))
            .count();

        let mut parts = vec![format!("{logged} logged days"), format!("training {trained}")];
        parts.push(format!("nutrition on plan {on_plan}"));
        let sleep: Vec<f64> = days.iter().filter_map(|d| d.sleep_hours).collect();
        if !sleep.is_empty() {
            let avg = sleep.iter().sum::<f64>() / sleep.len() as f64;
            parts.push(format!("avg sleep {:.1}h", avg));
        }
        let energy: Vec<f64> = days.iter().filter_map(|d| d.energy).collect();
        if !energy.is_empty() {
            let avg = energy.iter().sum::<f64>() / energy.len() as f64;
            parts.push(format!("avg energy {:.1}/10", avg));
        }

        Ok(Some(parts.join(", ")))
    }
}
