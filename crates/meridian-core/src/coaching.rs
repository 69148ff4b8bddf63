use serde::{Deserialize, Serialize};

/// Coaching guidance disclaimer, attached to every response.
pub const DISCLAIMER: &str = "This is coaching guidance, not medical diagnosis.";

/// How much specialist work a question gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoachMode {
    /// Small roster, short answer.
    Quick,
    /// Full roster, synthesized answer.
    Deep,
}

impl CoachMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoachMode::Quick => "quick",
            CoachMode::Deep => "deep",
        }
    }
}

/// Which model tier a call should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Cheap structured-output work (extraction, quick checks).
    Utility,
    /// Standard specialist reasoning.
    Reasoning,
    /// Escalated reasoning for deep-think requests.
    DeepThink,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Utility => "utility",
            TaskType::Reasoning => "reasoning",
            TaskType::DeepThink => "deep_think",
        }
    }

    /// Apply the deep-think escalation: reasoning work is upgraded, utility
    /// work stays cheap.
    pub fn effective(&self, deep_think: bool) -> TaskType {
        match (self, deep_think) {
            (TaskType::Reasoning, true) => TaskType::DeepThink,
            _ => *self,
        }
    }
}

/// One coaching question from a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingRequest {
    pub user_id: i64,
    pub question: String,
    pub mode: CoachMode,
    #[serde(default)]
    pub deep_think: bool,
    /// Free-text steer from the caller (e.g. "focus on sleep").
    #[serde(default)]
    pub context_hint: Option<String>,
    /// Existing chat thread to append to; a new thread is created when absent.
    #[serde(default)]
    pub thread_id: Option<i64>,
}

/// A concrete next step with its sub-steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub title: String,
    pub steps: Vec<String>,
}

/// What one specialist produced during a dispatch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent_id: String,
    pub title: String,
    pub task_type: TaskType,
    pub answer: String,
    pub rationale_bullets: Vec<String>,
    pub recommended_actions: Vec<RecommendedAction>,
    pub suggested_questions: Vec<String>,
    pub safety_flags: Vec<String>,
    /// Metric types the specialist wanted but the context lacked.
    #[serde(default)]
    pub missing_data: Vec<String>,
    /// Capabilities the specialist wanted but the product lacks.
    #[serde(default)]
    pub missing_features: Vec<String>,
}

/// The final synthesized coaching answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingResponse {
    pub answer: String,
    pub rationale_bullets: Vec<String>,
    pub recommended_actions: Vec<RecommendedAction>,
    pub suggested_questions: Vec<String>,
    pub safety_flags: Vec<String>,
    pub disclaimer: String,
    #[serde(default)]
    pub thread_id: Option<i64>,
    /// Per-specialist outputs, in dispatch order.
    #[serde(default)]
    pub agent_trace: Vec<AgentOutput>,
}

impl CoachingResponse {
    /// An empty shell with the standard disclaimer; normalization fills it.
    pub fn empty() -> Self {
        CoachingResponse {
            answer: String::new(),
            rationale_bullets: Vec::new(),
            recommended_actions: Vec::new(),
            suggested_questions: Vec::new(),
            safety_flags: Vec::new(),
            disclaimer: DISCLAIMER.to_string(),
            thread_id: None,
            agent_trace: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_think_upgrades_reasoning_only() {
        assert_eq!(TaskType::Reasoning.effective(true), TaskType::DeepThink);
        assert_eq!(TaskType::Reasoning.effective(false), TaskType::Reasoning);
        assert_eq!(TaskType::Utility.effective(true), TaskType::Utility);
        assert_eq!(TaskType::DeepThink.effective(false), TaskType::DeepThink);
    }

    #[test]
    fn test_mode_serde_round_trip() {
        let json = serde_json::to_string(&CoachMode::Quick).unwrap();
        assert_eq!(json, "\"quick\"");
        let back: CoachMode = serde_json::from_str("\"deep\"").unwrap();
        assert_eq!(back, CoachMode::Deep);
    }

    #[test]
    fn test_task_type_names() {
        assert_eq!(TaskType::DeepThink.as_str(), "deep_think");
        let json = serde_json::to_string(&TaskType::DeepThink).unwrap();
        assert_eq!(json, "\"deep_think\"");
    }

    #[test]
    fn test_request_optional_fields_default() {
        let req: CoachingRequest = serde_json::from_str(
            r#"{"user_id": 7, "question": "How do I sleep better?", "mode": "quick"}"#,
        )
        .unwrap();
        assert!(!req.deep_think);
        assert!(req.context_hint.is_none());
        assert!(req.thread_id.is_none());
    }
}
