use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use normas_core::config::ModelsConfig;
use normas_core::traits::ChatModel;
use normas_core::ClientError;

use crate::http::ApiClient;

// --- OpenAI-compatible serde structs ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Single-turn completions from `POST {api_base}/chat/completions`.
pub struct OpenAiChatModel {
    api: ApiClient,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(api: ApiClient, config: &ModelsConfig) -> Self {
        Self { api, model: config.chat_model.clone(), temperature: config.temperature }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ClientError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };
        let response: ChatResponse = self.api.post_json("chat/completions", &request).await?;
        if let Some(usage) = &response.usage {
            debug!("Chat completion used {} tokens", usage.total_tokens);
        }
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClientError::Decode("chat response has no message content".to_string()))
    }
}
