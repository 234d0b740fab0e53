//! Chat model access
//!
//! The `openai` crate talks to any OpenAI-compatible endpoint; the key and base
//! URL are exported to the environment at start-up (`OPENAI_KEY`,
//! `OPENAI_BASE_URL`), so a client only needs the model name.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: ChatModel trait so routing and replies can run against scripted models
//! - 1.0.0: Initial release

use async_trait::async_trait;
use log::{debug, warn};
use openai::chat::{ChatCompletion, ChatCompletionMessage, ChatCompletionMessageRole};
use serde::{Deserialize, Serialize};

use crate::core::{AssistantError, AssistantResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One completion; provider failures map to `Provider`, empty answers to `MalformedOutput`
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> AssistantResult<String>;
}

#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    model: String,
}

impl OpenAiChatModel {
    pub fn new(model: impl Into<String>) -> Self {
        OpenAiChatModel {
            model: model.into(),
        }
    }

    /// Point the `openai` crate at the configured provider
    pub fn export_credentials(api_key: &str, base_url: &str) {
        std::env::set_var("OPENAI_KEY", api_key);
        std::env::set_var("OPENAI_API_KEY", api_key);
        std::env::set_var("OPENAI_BASE_URL", base_url);
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_wire(message: &ChatMessage) -> ChatCompletionMessage {
        let role = match message.role {
            ChatRole::System => ChatCompletionMessageRole::System,
            ChatRole::User => ChatCompletionMessageRole::User,
            ChatRole::Assistant => ChatCompletionMessageRole::Assistant,
        };
        ChatCompletionMessage {
            role,
            content: Some(message.content.clone()),
            name: None,
            function_call: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> AssistantResult<String> {
        let wire: Vec<ChatCompletionMessage> = messages.iter().map(Self::to_wire).collect();
        debug!(
            "Requesting completion from {} ({} messages, temperature {temperature})",
            self.model,
            wire.len()
        );

        let completion = ChatCompletion::builder(&self.model, wire)
            .temperature(temperature)
            .create()
            .await
            .map_err(|e| {
                warn!("Chat completion failed: {e}");
                AssistantError::Provider(e.to_string())
            })?;

        if let Some(usage) = &completion.usage {
            debug!(
                "Completion usage: {} prompt + {} completion = {} tokens",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AssistantError::MalformedOutput("empty completion".to_string()))
    }
}
