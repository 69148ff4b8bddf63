//! # meridian-providers
//!
//! Model client implementations for Meridian. Every backend speaks
//! structured JSON: requests force a JSON response mode and replies go
//! through the same lenient object parser.

pub mod gemini;
pub mod openai;

use meridian_core::coaching::TaskType;
use meridian_core::error::{MeridianError, ModelErrorKind};

/// System instruction used when the caller does not supply one. Matches the
/// coaching output contract so a bare prompt still yields a usable shape.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Return strict JSON with keys: answer, \
     rationale_bullets, recommended_actions, suggested_questions, safety_flags.";

/// Sampling temperature for all structured-output calls.
pub(crate) const JSON_TEMPERATURE: f64 = 0.3;

/// Model names per task tier.
#[derive(Debug, Clone)]
pub struct ModelTiers {
    pub utility: String,
    pub reasoning: String,
    pub deep_think: String,
}

impl ModelTiers {
    pub fn new(
        utility: impl Into<String>,
        reasoning: impl Into<String>,
        deep_think: impl Into<String>,
    ) -> Self {
        Self {
            utility: utility.into(),
            reasoning: reasoning.into(),
            deep_think: deep_think.into(),
        }
    }

    /// Resolve the concrete model name for a task type.
    pub fn model_for(&self, task_type: TaskType) -> &str {
        match task_type {
            TaskType::Utility => &self.utility,
            TaskType::Reasoning => &self.reasoning,
            TaskType::DeepThink => &self.deep_think,
        }
    }
}

/// Parse a model reply into a JSON object, tolerating prose around it.
///
/// Tries a direct parse first; if that fails or yields a non-object, retries
/// on the slice between the first `{` and the last `}`. Models in JSON mode
/// occasionally wrap the object in markdown fences or commentary.
pub fn parse_json_object(raw: &str) -> Result<serde_json::Value, MeridianError> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        if value.is_object() {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw[start..=end]) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(MeridianError::model(
        ModelErrorKind::Unavailable,
        "invalid JSON response from model",
    ))
}
