use async_trait::async_trait;

use crate::error::{ClientError, Result};
use crate::types::ScoredChunk;

/// Turns text into fixed-dimension vectors.
///
/// Implementations must return one vector of length `dim()` per input, in
/// input order, and the same vectors for the same `embedder_id`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-ada-002:d1536`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ClientError>;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ClientError> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| ClientError::Decode("embedding response was empty".to_string()))
    }
}

/// Generates a completion for a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ClientError>;
}

/// Returns the `k` chunks most similar to a query, best first.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;
}
