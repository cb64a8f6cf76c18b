use async_trait::async_trait;
use tracing::{error, info, warn};

use normas_core::config::RetrievalConfig;
use normas_core::traits::{ChatModel, Retriever};
use normas_core::types::QueryResult;
use normas_core::{Error, Result};

use crate::citation::{source_names, CitationNormalizer};
use crate::prompt::{build_context, build_prompt, NOT_FOUND_ANSWER};
use crate::shell::Assistant;

pub const ERROR_ANSWER: &str = "An error occurred while processing your question. Please try again.";

/// Retrieval, prompt, completion, citation: one question at a time.
pub struct QaOrchestrator<R>
where
    R: Retriever,
{
    retriever: R,
    chat: Box<dyn ChatModel>,
    k: usize,
    max_context_chars: usize,
    citations: CitationNormalizer,
}

impl<R> QaOrchestrator<R>
where
    R: Retriever,
{
    pub fn new(retriever: R, chat: Box<dyn ChatModel>, config: &RetrievalConfig) -> Result<Self> {
        let citations = CitationNormalizer::new().map_err(|e| Error::Configuration(format!("citation pattern: {}", e)))?;
        Ok(Self { retriever, chat, k: config.k, max_context_chars: config.max_context_chars, citations })
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Answer `query`, citing the chunks that were placed in the prompt.
    pub async fn try_answer(&self, query: &str) -> Result<QueryResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("question is empty".to_string()));
        }
        let hits = self.retriever.retrieve(query, self.k).await?;
        if hits.is_empty() {
            warn!("No chunks retrieved for query; asking the model with an empty context");
        }
        let (context, used) = build_context(&hits, self.max_context_chars);
        let prompt = build_prompt(&context, query);

        let raw = self.chat.complete(&prompt).await?;
        let raw = raw.trim();
        if raw == NOT_FOUND_ANSWER {
            info!("Answer: information not found");
            return Ok(QueryResult { answer_text: NOT_FOUND_ANSWER.to_string(), source_chunks: used });
        }

        let names = source_names(&used);
        if names.is_empty() {
            warn!("Answer generated but no source file names found in chunk metadata");
        }
        let answer_text = self.citations.normalize(raw, &names);
        Ok(QueryResult { answer_text, source_chunks: used })
    }

    /// Like `try_answer`, but failures become `ERROR_ANSWER`.
    pub async fn answer(&self, query: &str) -> String {
        info!("Processing query: {}", query);
        match self.try_answer(query).await {
            Ok(result) => {
                info!("Answer generated from {} chunks", result.source_chunks.len());
                result.answer_text
            }
            Err(e) => {
                error!("Error processing query: {}", e);
                ERROR_ANSWER.to_string()
            }
        }
    }
}

#[async_trait]
impl<R> Assistant for QaOrchestrator<R>
where
    R: Retriever,
{
    async fn answer(&self, question: &str) -> String {
        QaOrchestrator::answer(self, question).await
    }
}
