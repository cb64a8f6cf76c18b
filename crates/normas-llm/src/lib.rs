//! Embedding and chat clients for OpenAI-compatible HTTP APIs.

pub mod chat;
pub mod embeddings;
pub mod fake;
pub mod http;

use std::env;
use tracing::info;

use normas_core::config::Settings;
use normas_core::traits::{ChatModel, Embedder};
use normas_core::ClientError;

pub use chat::OpenAiChatModel;
pub use embeddings::OpenAiEmbedder;
pub use fake::FakeEmbedder;
pub use http::ApiClient;

/// `APP_USE_FAKE_EMBEDDINGS=1|true` swaps in the hash embedder.
pub fn use_fake_embeddings() -> bool {
    env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn api_key_from_env() -> Result<String, ClientError> {
    env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(ClientError::MissingApiKey)
}

pub fn get_default_embedder(settings: &Settings) -> Result<Box<dyn Embedder>, ClientError> {
    if use_fake_embeddings() {
        info!("Using FakeEmbedder (dim={})", settings.models.embedding_dim);
        return Ok(Box::new(FakeEmbedder::new(settings.models.embedding_dim)));
    }
    let api = ApiClient::new(&settings.models, &api_key_from_env()?)?;
    info!("Using embedding model {}", settings.models.embedding_model);
    Ok(Box::new(OpenAiEmbedder::new(api, &settings.models)))
}

pub fn get_default_chat_model(settings: &Settings) -> Result<Box<dyn ChatModel>, ClientError> {
    let api = ApiClient::new(&settings.models, &api_key_from_env()?)?;
    info!("Using chat model {} (temperature {})", settings.models.chat_model, settings.models.temperature);
    Ok(Box::new(OpenAiChatModel::new(api, &settings.models)))
}
