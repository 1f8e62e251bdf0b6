use crate::{
    config::{ConfigError, OpenAiConfig},
    domain::{ChatPrompt, TextGenerator},
    errors::GenerationError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing;

/// Chat-completions client for the OpenAI HTTP API (or a compatible endpoint).
#[derive(Debug, Clone)]
pub struct OpenAiTextGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiTextGenerator {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_key()?.to_string();
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        tracing::info!(%endpoint, model = %config.model, "Initializing OpenAiTextGenerator");
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            model: config.model.clone(),
        })
    }
}

/// Pulls `error.message` out of an API error body, or returns the body as is.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
            max_tokens: prompt.max_tokens,
            temperature: prompt.temperature,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerationError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_both_roles_and_limits() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: [
                ChatMessage { role: "system", content: "be brief" },
                ChatMessage { role: "user", content: "describe doge" },
            ],
            max_tokens: 150,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "describe doge");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["temperature"], 0.5);
    }

    #[test]
    fn first_choice_content_is_read() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"A dog."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("A dog."));

        let empty: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(empty.choices.is_empty());
    }

    #[test]
    fn api_error_message_is_extracted() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        assert_eq!(error_message(body), "Rate limit reached");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn missing_key_refuses_to_build() {
        let config = OpenAiConfig {
            api_key: None,
            base_url: "https://api.openai.com/v1/".into(),
            model: "gpt-3.5-turbo".into(),
        };
        assert!(OpenAiTextGenerator::new(&config).is_err());

        let config = OpenAiConfig { api_key: Some("sk-test".into()), ..config };
        let generator = OpenAiTextGenerator::new(&config).unwrap();
        assert_eq!(generator.endpoint, "https://api.openai.com/v1/chat/completions");
    }
}
