//! OpenAI-compatible model client.
//!
//! Calls the chat completions endpoint in JSON mode. Works with OpenAI's
//! API and any compatible endpoint via `base_url`.

use async_trait::async_trait;
use meridian_core::{
    coaching::TaskType,
    config::OpenAiModelConfig,
    error::{MeridianError, ModelErrorKind},
    traits::ModelClient,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{parse_json_object, ModelTiers, DEFAULT_SYSTEM_INSTRUCTION, JSON_TEMPERATURE};

/// OpenAI-compatible model client.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    tiers: ModelTiers,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create from config values.
    pub fn from_config(config: &OpenAiModelConfig, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            tiers: ModelTiers::new(
                config.utility_model.clone(),
                config.reasoning_model.clone(),
                config.deep_think_model.clone(),
            ),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
    pub temperature: f64,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatMessage>,
}

/// Build the two-message JSON-mode conversation.
pub(crate) fn build_request(
    model: &str,
    prompt: &str,
    system_instruction: Option<&str>,
) -> ChatCompletionRequest {
    let system = system_instruction.unwrap_or(DEFAULT_SYSTEM_INSTRUCTION);
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ],
        response_format: ResponseFormat {
            format_type: "json_object".to_string(),
        },
        temperature: JSON_TEMPERATURE,
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_json(
        &self,
        prompt: &str,
        task_type: TaskType,
        system_instruction: Option<&str>,
    ) -> Result<serde_json::Value, MeridianError> {
        let model = self.tiers.model_for(task_type);
        let body = build_request(model, prompt, system_instruction);

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("openai: POST {url} model={model} task={}", task_type.as_str());

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                MeridianError::model(
                    ModelErrorKind::Unavailable,
                    format!("openai request failed: {e}"),
                )
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(MeridianError::Model {
                kind: ModelErrorKind::from_status(status),
                status: Some(status),
                message: format!("openai returned {status}: {text}"),
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await.map_err(|e| {
            MeridianError::model(
                ModelErrorKind::Unavailable,
                format!("openai: failed to parse response: {e}"),
            )
        })?;

        let content = parsed
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone())
            .ok_or_else(|| {
                MeridianError::model(ModelErrorKind::Unavailable, "openai: empty completion")
            })?;

        parse_json_object(&content)
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openai: no API key configured");
            return false;
        }
        // Basic check: try to list models.
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("openai not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> OpenAiClient {
        let config = OpenAiModelConfig {
            api_key: "sk-test".into(),
            ..Default::default()
        };
        OpenAiClient::from_config(&config, 20)
    }

    #[test]
    fn test_openai_client_name() {
        assert_eq!(test_client().name(), "openai");
    }

    #[test]
    fn test_request_forces_json_mode() {
        let body = build_request("gpt-4o", "How did I sleep?", None);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["temperature"], 0.3);
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("rationale_bullets"));
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "How did I sleep?");
    }

    #[test]
    fn test_request_custom_system_instruction() {
        let body = build_request("gpt-4o-mini", "log: ran 5k", Some("Extract events."));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"], "Extract events.");
        assert_eq!(json["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"{\"answer\":\"ok\"}"},"finish_reason":"stop"}],"model":"gpt-4o","usage":{"total_tokens":42}}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let content = resp
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone())
            .unwrap();
        let value = parse_json_object(&content).unwrap();
        assert_eq!(value["answer"], "ok");
    }

    #[test]
    fn test_tier_selection_uses_config_names() {
        let config = OpenAiModelConfig {
            utility_model: "tiny".into(),
            reasoning_model: "mid".into(),
            deep_think_model: "big".into(),
            ..Default::default()
        };
        let client = OpenAiClient::from_config(&config, 20);
        assert_eq!(client.tiers.model_for(TaskType::Utility), "tiny");
        assert_eq!(client.tiers.model_for(TaskType::DeepThink), "big");
    }
}
