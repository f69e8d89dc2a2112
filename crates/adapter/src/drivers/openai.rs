use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::LlmError;
use crate::traits::{ChatMessage, ChatModel};

#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Root of an OpenAI compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub vision_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    config: LlmConfig,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, body: Value) -> Result<String, LlmError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Completion request failed with {}: {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyReply)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        mut messages: Vec<ChatMessage>,
        schema: Option<&Value>,
    ) -> Result<String, LlmError> {
        let mut body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
        });
        if let Some(schema) = schema {
            messages.push(ChatMessage::system(format!(
                "Please provide the output in JSON format that complies with the following schema: {}",
                schema
            )));
            body["response_format"] = json!({ "type": "json_object" });
        }
        body["messages"] = serde_json::to_value(&messages)?;

        debug!("Sending {} messages to {}", messages.len(), self.config.model);
        let reply = self.send(body).await?;
        Ok(match schema {
            Some(_) => strip_code_fences(&reply).to_string(),
            None => reply,
        })
    }

    async fn describe_image(&self, image_url: &str, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.config.vision_model,
            "temperature": self.config.temperature,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image_url } }
                ]
            }]
        });
        self.send(body).await
    }
}

/// Models asked for JSON sometimes wrap it in a markdown fence anyway.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) up to the first newline.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
