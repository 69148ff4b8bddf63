use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MeridianError;
use crate::signal::EventType;

/// Default event-log depth per day.
pub const EVENTS_KEPT_DEFAULT: usize = 40;
/// Unparsed raw updates kept per day.
pub const UNPARSED_KEPT: usize = 20;

/// Point-in-time measurement types and their validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    WeightKg,
    WaistCm,
    BpSystolic,
    BpDiastolic,
    RestingHrBpm,
    SleepHours,
    Steps,
    ActiveMinutes,
    #[serde(rename = "energy_1_10")]
    Energy,
    #[serde(rename = "mood_1_10")]
    Mood,
    #[serde(rename = "stress_1_10")]
    Stress,
    #[serde(rename = "sleep_quality_1_10")]
    SleepQuality,
    #[serde(rename = "motivation_1_10")]
    Motivation,
}

impl MetricType {
    pub const ALL: [MetricType; 13] = [
        MetricType::WeightKg,
        MetricType::WaistCm,
        MetricType::BpSystolic,
        MetricType::BpDiastolic,
        MetricType::RestingHrBpm,
        MetricType::SleepHours,
        MetricType::Steps,
        MetricType::ActiveMinutes,
        MetricType::Energy,
        MetricType::Mood,
        MetricType::Stress,
        MetricType::SleepQuality,
        MetricType::Motivation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::WeightKg => "weight_kg",
            MetricType::WaistCm => "waist_cm",
            MetricType::BpSystolic => "bp_systolic",
            MetricType::BpDiastolic => "bp_diastolic",
            MetricType::RestingHrBpm => "resting_hr_bpm",
            MetricType::SleepHours => "sleep_hours",
            MetricType::Steps => "steps",
            MetricType::ActiveMinutes => "active_minutes",
            MetricType::Energy => "energy_1_10",
            MetricType::Mood => "mood_1_10",
            MetricType::Stress => "stress_1_10",
            MetricType::SleepQuality => "sleep_quality_1_10",
            MetricType::Motivation => "motivation_1_10",
        }
    }

    /// Inclusive (min, max) bounds and whether fractional values are allowed.
    fn rules(&self) -> (f64, f64, bool) {
        match self {
            MetricType::WeightKg => (30.0, 350.0, true),
            MetricType::WaistCm => (40.0, 250.0, true),
            MetricType::BpSystolic => (70.0, 240.0, false),
            MetricType::BpDiastolic => (40.0, 150.0, false),
            MetricType::RestingHrBpm => (30.0, 220.0, false),
            MetricType::SleepHours => (0.0, 16.0, true),
            MetricType::Steps => (0.0, 100_000.0, false),
            MetricType::ActiveMinutes => (0.0, 600.0, false),
            MetricType::Energy
            | MetricType::Mood
            | MetricType::Stress
            | MetricType::SleepQuality
            | MetricType::Motivation => (1.0, 10.0, false),
        }
    }

    /// Check a raw value against this type's rules.
    pub fn validate(&self, value: f64) -> Result<f64, MeridianError> {
        let (min, max, allow_fraction) = self.rules();
        if !value.is_finite() {
            return Err(MeridianError::Invalid(format!(
                "{} must be a finite number",
                self.as_str()
            )));
        }
        if value < min || value > max {
            return Err(MeridianError::Invalid(format!(
                "{} must be between {min} and {max}, got {value}",
                self.as_str()
            )));
        }
        if !allow_fraction && value.fract() != 0.0 {
            return Err(MeridianError::Invalid(format!(
                "{} must be a whole number, got {value}",
                self.as_str()
            )));
        }
        Ok(value)
    }

    /// True when `value` would pass validation. Used by the extractor to
    /// drop out-of-range model output without erroring.
    pub fn accepts(&self, value: f64) -> bool {
        self.validate(value).is_ok()
    }
}

impl std::str::FromStr for MetricType {
    type Err = MeridianError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| MeridianError::Invalid(format!("unknown metric type: {s}")))
    }
}

/// A stored point-in-time measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointMeasurement {
    pub id: i64,
    pub metric_type: MetricType,
    pub value: f64,
    /// RFC 3339, UTC.
    pub taken_at: String,
}

/// One entry in a day's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayEvent {
    pub event_type: EventType,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// RFC 3339, UTC.
    pub at: String,
}

/// Named free-text slots on a day. First writer wins; displaced fragments
/// go to the event log instead of overwriting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydration_progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meds_taken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplements_taken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_food_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_details: Option<String>,
}

/// Provenance record for one committed rollup field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntry {
    /// The raw update text the value came from.
    pub source_text: String,
    pub parsed_value: serde_json::Value,
    /// Who wrote it (the extractor, or a named specialist).
    pub specialist: String,
    /// RFC 3339, UTC.
    pub at: String,
}

/// Raw text that matched update hints but failed to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnparsedUpdate {
    pub text: String,
    /// Category names the pre-filter matched.
    pub flags: Vec<String>,
    /// RFC 3339, UTC.
    pub at: String,
}

/// The merged state of one user-day. This is the unit the merger operates
/// on in memory and the store persists in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub user_id: i64,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub mood: Option<f64>,
    #[serde(default)]
    pub stress: Option<f64>,
    /// One-way booleans: once true, later updates cannot clear them.
    #[serde(default)]
    pub training_done: Option<bool>,
    #[serde(default)]
    pub nutrition_on_plan: Option<bool>,
    #[serde(default)]
    pub extras: DayExtras,
    /// Bounded event log, oldest first.
    #[serde(default)]
    pub events: Vec<DayEvent>,
    /// Field name -> provenance for every committed rollup value.
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerEntry>,
    /// Bounded log of updates that matched hints but failed to parse.
    #[serde(default)]
    pub unparsed: Vec<UnparsedUpdate>,
}

impl DailyAggregate {
    pub fn new(user_id: i64, date: impl Into<String>) -> Self {
        DailyAggregate {
            user_id,
            date: date.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_metric_ranges() {
        assert!(MetricType::WeightKg.validate(74.6).is_ok());
        assert!(MetricType::WeightKg.validate(29.9).is_err());
        assert!(MetricType::WeightKg.validate(350.1).is_err());
        assert!(MetricType::SleepHours.validate(0.0).is_ok());
        assert!(MetricType::SleepHours.validate(16.0).is_ok());
        assert!(MetricType::SleepHours.validate(17.0).is_err());
    }

    #[test]
    fn test_integer_only_metrics_reject_fractions() {
        assert!(MetricType::BpSystolic.validate(120.0).is_ok());
        assert!(MetricType::BpSystolic.validate(120.5).is_err());
        assert!(MetricType::Steps.validate(8000.0).is_ok());
        assert!(MetricType::Steps.validate(8000.5).is_err());
        assert!(MetricType::Energy.validate(7.0).is_ok());
        assert!(MetricType::Energy.validate(7.5).is_err());
        assert!(MetricType::Energy.validate(0.0).is_err());
        assert!(MetricType::Energy.validate(11.0).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(MetricType::WeightKg.validate(f64::NAN).is_err());
        assert!(MetricType::WeightKg.validate(f64::INFINITY).is_err());
    }

    #[test]
    fn test_metric_type_string_round_trip() {
        for ty in MetricType::ALL {
            let parsed = MetricType::from_str(ty.as_str()).unwrap();
            assert_eq!(parsed, ty);
        }
        assert!(MetricType::from_str("glucose").is_err());
    }

    #[test]
    fn test_metric_type_serde_names() {
        let json = serde_json::to_string(&MetricType::Energy).unwrap();
        assert_eq!(json, "\"energy_1_10\"");
        let json = serde_json::to_string(&MetricType::BpSystolic).unwrap();
        assert_eq!(json, "\"bp_systolic\"");
    }

    #[test]
    fn test_aggregate_serde_round_trip() {
        let mut agg = DailyAggregate::new(3, "2025-06-01");
        agg.sleep_hours = Some(7.5);
        agg.training_done = Some(true);
        agg.extras.meds_taken = Some("metformin 500mg".to_string());
        agg.answers.insert(
            "sleep_hours".to_string(),
            AnswerEntry {
                source_text: "slept 7.5h".to_string(),
                parsed_value: serde_json::json!(7.5),
                specialist: "signal_extractor".to_string(),
                at: "2025-06-01T08:00:00Z".to_string(),
            },
        );
        let json = serde_json::to_string(&agg).unwrap();
        let back: DailyAggregate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, agg);
    }
}
