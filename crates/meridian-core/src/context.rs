use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::daily::MetricType;

/// Metric types surfaced in the coaching context. A subset of the full
/// table: the ones specialists actually reason over.
pub const CONTEXT_METRIC_TYPES: [MetricType; 9] = [
    MetricType::SleepHours,
    MetricType::BpSystolic,
    MetricType::BpDiastolic,
    MetricType::WeightKg,
    MetricType::Energy,
    MetricType::Mood,
    MetricType::Stress,
    MetricType::Steps,
    MetricType::ActiveMinutes,
];

/// Seven-day summary of one metric type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_7d: Option<f64>,
}

/// The baseline fields specialists see. Intake stores more; this is the
/// prompt-sized projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bp_systolic: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bp_diastolic: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resting_hr_bpm: Option<i64>,
}

/// A recent exchange, trimmed for prompt use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationBrief {
    pub question: String,
    pub answer_summary: String,
    pub created_at: String,
}

/// Everything a specialist gets to know about the user for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoachingContext {
    pub baseline_present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineSummary>,
    /// Seven-day summaries keyed by metric type.
    #[serde(default)]
    pub metrics_7d: BTreeMap<MetricType, MetricSummary>,
    #[serde(default)]
    pub recent_conversations: Vec<ConversationBrief>,
    /// One-line digest of the last week of daily logs, if any exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_rollup_7d: Option<String>,
    /// Context metric types with zero readings in the window.
    #[serde(default)]
    pub missing_data: Vec<String>,
}

impl CoachingContext {
    /// JSON snapshot embedded in specialist prompts.
    pub fn to_prompt_value(&self) -> serde_json::Value {
        serde_json::json!({
            "baseline_present": self.baseline_present,
            "baseline": self.baseline,
            "metrics_7d_summary": self.metrics_7d,
            "daily_rollup_7d": self.daily_rollup_7d,
            "recent_conversations": self.recent_conversations,
            "missing_data": self.missing_data,
        })
    }

    /// Which of `wanted` are missing from this context's window.
    pub fn missing_of(&self, wanted: &[MetricType]) -> Vec<String> {
        wanted
            .iter()
            .filter(|t| self.missing_data.iter().any(|m| m == t.as_str()))
            .map(|t| t.as_str().to_string())
            .collect()
    }
}
