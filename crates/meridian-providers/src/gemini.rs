//! Google Gemini model client.
//!
//! Calls the Gemini `generateContent` endpoint with a JSON response MIME
//! type. Auth via URL query param.

use async_trait::async_trait;
use meridian_core::{
    coaching::TaskType,
    config::GeminiModelConfig,
    error::{MeridianError, ModelErrorKind},
    traits::ModelClient,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{parse_json_object, ModelTiers, DEFAULT_SYSTEM_INSTRUCTION, JSON_TEMPERATURE};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini model client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    tiers: ModelTiers,
    timeout: Duration,
}

impl GeminiClient {
    /// Create from config values.
    pub fn from_config(config: &GeminiModelConfig, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
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

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    temperature: f64,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Build the JSON-mode request body.
fn build_request(prompt: &str, system_instruction: Option<&str>) -> GeminiRequest {
    let system = system_instruction.unwrap_or(DEFAULT_SYSTEM_INSTRUCTION);
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: prompt.to_string(),
            }],
        }],
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: system.to_string(),
            }],
        }),
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            temperature: JSON_TEMPERATURE,
        },
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_json(
        &self,
        prompt: &str,
        task_type: TaskType,
        system_instruction: Option<&str>,
    ) -> Result<serde_json::Value, MeridianError> {
        let model = self.tiers.model_for(task_type);
        let body = build_request(prompt, system_instruction);

        let url = format!(
            "{GEMINI_BASE_URL}/models/{model}:generateContent?key={}",
            self.api_key
        );
        debug!(
            "gemini: POST models/{model}:generateContent task={}",
            task_type.as_str()
        );

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                MeridianError::model(
                    ModelErrorKind::Unavailable,
                    format!("gemini request failed: {e}"),
                )
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(MeridianError::Model {
                kind: ModelErrorKind::from_status(status),
                status: Some(status),
                message: format!("gemini returned {status}: {text}"),
            });
        }

        let parsed: GeminiResponse = resp.json().await.map_err(|e| {
            MeridianError::model(
                ModelErrorKind::Unavailable,
                format!("gemini: failed to parse response: {e}"),
            )
        })?;

        let content = parsed
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                MeridianError::model(ModelErrorKind::Unavailable, "gemini: empty candidates")
            })?;

        parse_json_object(&content)
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("gemini: no API key configured");
            return false;
        }
        let url = format!("{GEMINI_BASE_URL}/models?key={}", self.api_key);
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("gemini not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_client_name() {
        let config = GeminiModelConfig {
            api_key: "AIza-test".into(),
            ..Default::default()
        };
        let client = GeminiClient::from_config(&config, 20);
        assert_eq!(client.name(), "gemini");
    }

    #[test]
    fn test_request_serialization() {
        let body = build_request("Did I train today?", Some("Answer as JSON."));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Did I train today?");
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "Answer as JSON."
        );
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(json["generationConfig"]["temperature"], 0.3);
    }

    #[test]
    fn test_request_default_system_instruction() {
        let body = build_request("hello", None);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("strict JSON"));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"has_progress_update\":true}"}]}}],"usageMetadata":{"totalTokenCount":25}}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let content = resp
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .unwrap();
        let value = parse_json_object(&content).unwrap();
        assert_eq!(value["has_progress_update"], true);
    }

    #[test]
    fn test_tier_selection_uses_config_names() {
        let config = GeminiModelConfig {
            utility_model: "flash".into(),
            reasoning_model: "flash".into(),
            deep_think_model: "pro".into(),
            ..Default::default()
        };
        let client = GeminiClient::from_config(&config, 20);
        assert_eq!(client.tiers.model_for(TaskType::Utility), "flash");
        assert_eq!(client.tiers.model_for(TaskType::DeepThink), "pro");
    }
}
