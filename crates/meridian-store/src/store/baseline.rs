//! Baseline intake storage.

use super::{now_ts, Store};
use meridian_core::{context::BaselineSummary, error::MeridianError};

/// Full baseline intake row. One per user.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct BaselineRecord {
    pub user_id: i64,
    pub primary_goal: Option<String>,
    pub activity_level: Option<String>,
    pub age_years: Option<i64>,
    pub sex_at_birth: Option<String>,
    pub weight_kg: Option<f64>,
    pub waist_cm: Option<f64>,
    pub bp_systolic: Option<i64>,
    pub bp_diastolic: Option<i64>,
    pub resting_hr_bpm: Option<i64>,
    pub sleep_hours: Option<f64>,
    pub energy_1_10: Option<i64>,
    pub mood_1_10: Option<i64>,
    pub stress_1_10: Option<i64>,
    pub sleep_quality_1_10: Option<i64>,
    pub motivation_1_10: Option<i64>,
}

impl BaselineRecord {
    /// Prompt-sized projection for the coaching context.
    pub fn to_summary(&self) -> BaselineSummary {
        BaselineSummary {
            primary_goal: self.primary_goal.clone(),
            activity_level: self.activity_level.clone(),
            sleep_hours: self.sleep_hours,
            stress: self.stress_1_10,
            energy: self.energy_1_10,
            waist_cm: self.waist_cm,
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            resting_hr_bpm: self.resting_hr_bpm,
        }
    }
}

const BASELINE_COLUMNS: &str = "user_id, primary_goal, activity_level, age_years, sex_at_birth, \
     weight_kg, waist_cm, bp_systolic, bp_diastolic, resting_hr_bpm, sleep_hours, \
     energy_1_10, mood_1_10, stress_1_10, sleep_quality_1_10, motivation_1_10";

impl Store {
    /// Insert or update a user's baseline.
    pub async fn upsert_baseline(&self, record: &BaselineRecord) -> Result<(), MeridianError> {
        sqlx::query(
            "INSERT INTO baselines (user_id, primary_goal, activity_level, age_years, \
             sex_at_birth, weight_kg, waist_cm, bp_systolic, bp_diastolic, resting_hr_bpm, \
             sleep_hours, energy_1_10, mood_1_10, stress_1_10, sleep_quality_1_10, \
             motivation_1_10, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
             primary_goal = excluded.primary_goal, \
             activity_level = excluded.activity_level, \
             age_years = excluded.age_years, \
             sex_at_birth = excluded.sex_at_birth, \
             weight_kg = excluded.weight_kg, \
             waist_cm = excluded.waist_cm, \
             bp_systolic = excluded.bp_systolic, \
             bp_diastolic = excluded.bp_diastolic, \
             resting_hr_bpm = excluded.resting_hr_bpm, \
             sleep_hours = excluded.sleep_hours, \
             energy_1_10 = excluded.energy_1_10, \
             mood_1_10 = excluded.mood_1_10, \
             stress_1_10 = excluded.stress_1_10, \
             sleep_quality_1_10 = excluded.sleep_quality_1_10, \
             motivation_1_10 = excluded.motivation_1_10, \
             updated_at = excluded.updated_at",
        )
        .bind(record.user_id)
        .bind(&record.primary_goal)
        .bind(&record.activity_level)
        .bind(record.age_years)
        .bind(&record.sex_at_birth)
        .bind(record.weight_kg)
        .bind(record.waist_cm)
        .bind(record.bp_systolic)
        .bind(record.bp_diastolic)
        .bind(record.resting_hr_bpm)
        .bind(record.sleep_hours)
        .bind(record.energy_1_10)
        .bind(record.mood_1_10)
        .bind(record.stress_1_10)
        .bind(record.sleep_quality_1_10)
        .bind(record.motivation_1_10)
        .bind(now_ts())
        .execute(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("baseline upsert failed: {e}")))?;

        Ok(())
    }

    /// Fetch a user's baseline, if intake has been completed.
    pub async fn get_baseline(&self, user_id: i64) -> Result<Option<BaselineRecord>, MeridianError> {
        let record: Option<BaselineRecord> = sqlx::query_as(&format!(
            "SELECT {BASELINE_COLUMNS} FROM baselines WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("baseline lookup failed: {e}")))?;

        Ok(record)
    }
}
