use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::transcript::Role;

/// One turn of request content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: String,
    pub parts: Vec<TurnPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnPart {
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let role = match role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self {
            role: role.to_string(),
            parts: vec![TurnPart { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<JsonOutputConfig<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutputConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

/// Pull the first text part out of a `generateContent` response
pub fn extract_text(response: &Value) -> Option<String> {
    if let Some(text) = response.get("text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Minimal client for the generative-AI `generateContent` REST call
#[derive(Clone)]
pub struct GenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Generate free text from `contents`
    pub async fn generate_text(&self, model: &str, contents: &[Turn]) -> Result<String> {
        self.generate(model, contents, None).await
    }

    /// Generate JSON constrained by `schema` and return the raw JSON text
    pub async fn generate_json(&self, model: &str, contents: &[Turn], schema: &Value) -> Result<String> {
        self.generate(model, contents, Some(schema)).await
    }

    async fn generate(&self, model: &str, contents: &[Turn], schema: Option<&Value>) -> Result<String> {
        if !self.has_credentials() {
            bail!("API key is missing");
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents,
            generation_config: schema.map(|schema| JsonOutputConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };

        debug!("generateContent {} ({} turns)", model, contents.len());

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("generateContent request failed")?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .context("generateContent returned invalid JSON")?;

        if !status.is_success() {
            bail!("generateContent failed with {}: {}", status, payload);
        }

        extract_text(&payload).with_context(|| format!("no text in response: {}", payload))
    }
}
