//! Gemini engine implementation.
//!
//! Uses the Generative Language `generateContent` API:
//! - `x-goog-api-key` header authentication
//! - Conversation history as `contents` (role + parts, camelCase)
//! - Tool declarations as `tools[].functionDeclarations`
//! - Tool calls come back as `functionCall` parts; results go back as
//!   `functionResponse` parts inside a user turn
//! - Image generation is the same call against the image model; the payload
//!   arrives as an `inlineData` part

use async_trait::async_trait;
use chatclaw_config::EngineConfig;
use chatclaw_core::engine::{Engine, EngineReply, ToolDefinition};
use chatclaw_core::error::EngineError;
use chatclaw_core::tool::ToolCall;
use chatclaw_core::turn::{Part, Turn};
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini `generateContent` engine.
pub struct GeminiEngine {
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
    client: reqwest::Client,
}

impl GeminiEngine {
    /// Create a new Gemini engine.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            image_model: image_model.into(),
            client,
        }
    }

    /// Create an engine from configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EngineError::AuthenticationFailed("no API key configured".into()))?;
        Ok(Self::new(api_key, &config.model, &config.image_model)
            .with_base_url(&config.base_url))
    }

    /// Use a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// POST a `generateContent` body to the given model and return the
    /// parts of the first candidate.
    async fn generate(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<Part>, EngineError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        debug!(model = %model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(EngineError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(EngineError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| EngineError::ResponseParse(e.to_string()))?;

        let Some(candidate) = api_resp.candidates.into_iter().next() else {
            return Err(EngineError::EmptyResponse);
        };

        Ok(candidate.content.map(|c| c.parts).unwrap_or_default())
    }
}

#[async_trait]
impl Engine for GeminiEngine {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn exchange(
        &self,
        history: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<EngineReply, EngineError> {
        let body = build_exchange_body(history, tools);
        let parts = self.generate(&self.model, &body).await?;
        Ok(reply_from_parts(parts))
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<Part>, EngineError> {
        let body = serde_json::json!({
            "contents": [Turn::user_text(prompt)],
        });
        self.generate(&self.image_model, &body).await
    }
}

/// Build the `generateContent` request body for a tool-calling exchange.
fn build_exchange_body(history: &[Turn], tools: &[ToolDefinition]) -> serde_json::Value {
    let mut body = serde_json::json!({ "contents": history });
    if !tools.is_empty() {
        body["tools"] = serde_json::json!([{ "functionDeclarations": tools }]);
    }
    body
}

/// Fold candidate parts into an [`EngineReply`]: text parts concatenate,
/// functionCall parts become tool calls.
fn reply_from_parts(parts: Vec<Part>) -> EngineReply {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        match part {
            Part::Text { text: t } => text.push_str(&t),
            Part::FunctionCall { function_call } => tool_calls.push(ToolCall {
                name: function_call.name,
                args: function_call.args,
            }),
            _ => {}
        }
    }

    EngineReply {
        text: if text.is_empty() { None } else { Some(text) },
        tool_calls,
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}
