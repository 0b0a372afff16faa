//! OpenAI-compatible generation backend.
//!
//! Most LLM APIs follow the same `/v1/chat/completions` format, so a single
//! implementation covers OpenAI itself and any compatible endpoint named in
//! the config.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::sessions::{Role, Turn};

use super::prompt::COACH_SYSTEM_PROMPT;
use super::traits::Generator;

pub struct OpenAiCompatibleGenerator {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_history_turns: usize,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleGenerator {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_history_turns: config.max_history_turns,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build the chat completions URL, detecting whether the base already
    /// includes the endpoint path (custom providers sometimes configure the
    /// full route).
    fn chat_completions_url(&self) -> String {
        if self
            .base_url
            .trim_end_matches('/')
            .ends_with("/chat/completions")
        {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn build_messages(&self, turns: &[Turn]) -> Vec<Message> {
        let start = turns.len().saturating_sub(self.max_history_turns);
        let mut messages = Vec::with_capacity(turns.len() - start + 1);
        messages.push(Message {
            role: "system".to_string(),
            content: COACH_SYSTEM_PROMPT.to_string(),
        });
        for turn in &turns[start..] {
            messages.push(Message {
                role: match turn.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: turn.text.clone(),
            });
        }
        messages
    }
}

#[async_trait]
impl Generator for OpenAiCompatibleGenerator {
    async fn generate(&self, turns: &[Turn]) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.build_messages(turns),
            temperature: self.temperature,
        };

        let mut builder = self.client.post(self.chat_completions_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.context("generation request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(anyhow!("generation endpoint returned {status}: {snippet}"));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("invalid generation response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("generation response contained no text"))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
