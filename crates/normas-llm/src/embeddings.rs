use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use normas_core::config::ModelsConfig;
use normas_core::traits::Embedder;
use normas_core::ClientError;

use crate::http::ApiClient;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings from `POST {api_base}/embeddings`.
pub struct OpenAiEmbedder {
    api: ApiClient,
    model: String,
    dim: usize,
    batch_size: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(api: ApiClient, config: &ModelsConfig) -> Self {
        let id = format!("openai:{}:d{}", config.embedding_model, config.embedding_dim);
        Self {
            api,
            model: config.embedding_model.clone(),
            dim: config.embedding_dim,
            batch_size: config.embed_batch_size.max(1),
            id,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClientError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let request = EmbeddingRequest { model: &self.model, input: batch };
            let response: EmbeddingResponse = self.api.post_json("embeddings", &request).await?;
            debug!("Embedded batch of {} texts with {}", batch.len(), self.model);
            out.extend(in_input_order(response.data, batch.len(), self.dim)?);
        }
        Ok(out)
    }
}

/// The service may answer out of order; `index` says where each vector belongs.
fn in_input_order(mut data: Vec<EmbeddingData>, expected: usize, dim: usize) -> Result<Vec<Vec<f32>>, ClientError> {
    if data.len() != expected {
        return Err(ClientError::Decode(format!("expected {} embeddings, got {}", expected, data.len())));
    }
    data.sort_by_key(|d| d.index);
    let mut vectors = Vec::with_capacity(expected);
    for (position, item) in data.into_iter().enumerate() {
        if item.index != position {
            return Err(ClientError::Decode(format!("embedding index {} missing from response", position)));
        }
        if item.embedding.len() != dim {
            return Err(ClientError::DimensionMismatch { expected: dim, actual: item.embedding.len() });
        }
        vectors.push(item.embedding);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, embedding: Vec<f32>) -> EmbeddingData {
        EmbeddingData { index, embedding }
    }

    #[test]
    fn reorders_by_index() {
        let data = vec![item(2, vec![2.0, 2.0]), item(0, vec![0.0, 0.0]), item(1, vec![1.0, 1.0])];
        let vectors = in_input_order(data, 3, 2).expect("ordered");
        assert_eq!(vectors, vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]);
    }

    #[test]
    fn rejects_duplicate_indices() {
        let data = vec![item(0, vec![0.0]), item(0, vec![0.0])];
        assert!(matches!(in_input_order(data, 2, 1), Err(ClientError::Decode(_))));
    }

    #[test]
    fn rejects_wrong_dimension() {
        let data = vec![item(0, vec![0.0, 1.0, 2.0])];
        assert!(matches!(
            in_input_order(data, 1, 2),
            Err(ClientError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
