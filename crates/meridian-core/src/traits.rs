use crate::{coaching::TaskType, error::MeridianError};
use async_trait::async_trait;

/// Uniform structured-JSON interface over model backends.
///
/// Every backend (OpenAI, Gemini, test mocks) implements this trait;
/// implementations pick the concrete model from the task type.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Human-readable client name.
    fn name(&self) -> &str;

    /// Run one prompt on the tier for `task_type` and return the parsed
    /// JSON object the model produced.
    async fn generate_json(
        &self,
        prompt: &str,
        task_type: TaskType,
        system_instruction: Option<&str>,
    ) -> Result<serde_json::Value, MeridianError>;

    /// Check if the backend is reachable and ready.
    async fn is_available(&self) -> bool;
}

/// Sink for product feedback raised by specialists (missing data, missing
/// capabilities). Implementations deduplicate per (user, title) inside the
/// given window.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// Record one feedback item. Returns `true` when a new entry was
    /// written, `false` when an entry inside the dedupe window absorbed it.
    async fn record(
        &self,
        user_id: i64,
        title: &str,
        details: &str,
        dedupe_window: chrono::Duration,
    ) -> Result<bool, MeridianError>;
}
