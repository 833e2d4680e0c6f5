use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::genai::{GenAiClient, Turn};
use super::knowledge::LocalKnowledgeBase;
use super::transcript::{ChatMessage, Role, Transcript};

const CHAT_PERSONA: &str = "You are a specialized agricultural assistant for farmers. Answer questions about manure, crop health, pest control, and processing techniques. Be practical, empathetic, and professional.";

/// Shown when the assistant returns an empty answer
const EMPTY_REPLY: &str = "Something went wrong. Please try again.";

/// Text chat with the remote assistant, falling back to canned answers
pub struct TextChatService {
    client: GenAiClient,
    model: String,
    knowledge: LocalKnowledgeBase,
}

impl TextChatService {
    pub fn new(client: GenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            knowledge: LocalKnowledgeBase::new(),
        }
    }

    /// Reply to `message` given the prior conversation. Never fails.
    pub async fn reply(&self, history: &[ChatMessage], message: &str) -> String {
        let mut contents = Vec::with_capacity(history.len() + 2);
        contents.push(Turn::new(Role::User, CHAT_PERSONA));
        contents.extend(history.iter().map(|m| Turn::new(m.role, m.text.clone())));
        contents.push(Turn::new(Role::User, message));

        match self.client.generate_text(&self.model, &contents).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                warn!("Chat request failed, answering from local knowledge base: {:#}", e);
                self.knowledge.answer(message).to_string()
            }
        }
    }

    /// Append the user's message and the reply to `transcript`
    pub async fn send(&self, transcript: &mut Transcript, message: &str) -> ChatMessage {
        // History is the conversation before this message
        let history = transcript.messages().to_vec();
        transcript.push(ChatMessage::new(Role::User, message));

        let reply = self.reply(&history, message).await;
        transcript.push(ChatMessage::new(Role::Model, reply)).clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropSuggestion {
    pub crop: String,
    pub timing: String,
    pub method: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovScheme {
    pub title: String,
    pub explanation: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub category: String,
    pub amount: f64,
    pub date: String,
    pub description: String,
}

/// JSON schema for an array of objects with the given required string fields
fn string_record_schema(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "STRING" })))
        .collect();

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": fields,
        }
    })
}

/// Structured suggestions (crop rotation, schemes, financial advice)
pub struct SuggestionService {
    client: GenAiClient,
    model: String,
}

impl SuggestionService {
    pub fn new(client: GenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// A 3-month rotation plan; empty on any failure
    pub async fn crop_rotation(&self, location: &str, climate: &str) -> Vec<CropSuggestion> {
        let prompt = format!(
            "Based on the location \"{}\" and current climate \"{}\", suggest a 3-month crop rotation plan. Return strictly valid JSON.",
            location, climate
        );
        let schema = string_record_schema(&["crop", "timing", "method", "reason"]);

        self.records(&prompt, &schema, "crop rotation").await
    }

    /// Active government schemes related to `query`; empty on any failure
    pub async fn schemes(&self, query: &str) -> Vec<GovScheme> {
        let prompt = format!(
            "Find 3-5 current and active government schemes, subsidies, or loans for farmers in India related to: {}. \
             Return the data as a JSON array of objects. Each object MUST have:\n\
             - \"title\": The official name of the scheme.\n\
             - \"explanation\": A 2-3 sentence clear explanation for a farmer.\n\
             - \"url\": A valid official government website link for this specific scheme.",
            query
        );
        let schema = string_record_schema(&["title", "explanation", "url"]);

        self.records(&prompt, &schema, "schemes").await
    }

    /// Free-text advice on the given expenses
    pub async fn financial_advice(&self, expenses: &[Expense]) -> String {
        let expenses_json = serde_json::to_string(expenses).unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "Analyze these farming expenses and provide brief financial advice to improve profitability: {}",
            expenses_json
        );

        match self
            .client
            .generate_text(&self.model, &[Turn::new(Role::User, prompt)])
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!("Financial advice request failed: {:#}", e);
                format!("Unable to generate advice at this time. Error: {}", e)
            }
        }
    }

    async fn records<T: serde::de::DeserializeOwned>(
        &self,
        prompt: &str,
        schema: &Value,
        what: &str,
    ) -> Vec<T> {
        let text = match self
            .client
            .generate_json(&self.model, &[Turn::new(Role::User, prompt)], schema)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!("{} request failed: {:#}", what, e);
                return Vec::new();
            }
        };

        match parse_records(&text) {
            Ok(records) => {
                info!("{}: {} suggestions", what, records.len());
                records
            }
            Err(e) => {
                error!("{} response was not valid JSON: {}", what, e);
                Vec::new()
            }
        }
    }
}

/// Parse a JSON array of records, tolerating a fenced code block around it
pub fn parse_records<T: serde::de::DeserializeOwned>(text: &str) -> serde_json::Result<Vec<T>> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = string_record_schema(&["title", "url"]);
        assert_eq!(schema["type"], "ARRAY");
        assert_eq!(schema["items"]["properties"]["title"]["type"], "STRING");
        assert_eq!(schema["items"]["required"], json!(["title", "url"]));
    }

    #[test]
    fn test_parse_records_plain_and_fenced() {
        let plain = r#"[{"title":"PM-KISAN","explanation":"Income support.","url":"https://pmkisan.gov.in"}]"#;
        let fenced = format!("```json\n{}\n```", plain);

        let a: Vec<GovScheme> = parse_records(plain).unwrap();
        let b: Vec<GovScheme> = parse_records(&fenced).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].title, "PM-KISAN");
    }

    #[test]
    fn test_parse_records_rejects_missing_fields() {
        let result: serde_json::Result<Vec<CropSuggestion>> = parse_records(r#"[{"crop":"Wheat"}]"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reply_falls_back_without_key() {
        let service = TextChatService::new(GenAiClient::new("http://127.0.0.1:9", ""), "m");
        let reply = service.reply(&[], "pest control for cotton").await;
        assert!(reply.contains("neem"));
    }

    #[tokio::test]
    async fn test_send_appends_both_messages() {
        let service = TextChatService::new(GenAiClient::new("http://127.0.0.1:9", ""), "m");
        let mut transcript = Transcript::new();

        let reply = service.send(&mut transcript, "when to harvest?").await;

        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.messages()[1].role, Role::User);
        assert_eq!(reply.role, Role::Model);
        assert!(reply.text.contains("Harvest"));
    }

    #[tokio::test]
    async fn test_suggestions_empty_on_failure() {
        let service = SuggestionService::new(GenAiClient::new("http://127.0.0.1:9", ""), "m");
        assert!(service.crop_rotation("Punjab", "dry").await.is_empty());
        assert!(service.schemes("drip irrigation").await.is_empty());
        assert!(service.financial_advice(&[]).await.starts_with("Unable"));
    }
}
