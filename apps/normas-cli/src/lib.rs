//! Startup plumbing shared by the `normas` and `normas-indexer` binaries.

use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use normas_core::chunker::split_documents;
use normas_core::config::Settings;
use normas_core::loader::DocumentLoader;
use normas_core::types::Chunk;

/// Logs go to stderr so the interactive transcript on stdout stays clean.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub fn missing_documents_message(docs_dir: &Path) -> String {
    format!("Error: check that directory '{}' exists and contains valid PDF files.", docs_dir.display())
}

/// Load every PDF page under `docs_dir` and split it into chunks.
///
/// `Ok(None)` means no pages were found; the caller decides how to stop.
pub async fn load_chunks(settings: &Settings, docs_dir: &Path) -> anyhow::Result<Option<(usize, Vec<Chunk>)>> {
    let documents = DocumentLoader::new(&settings.loader).load(docs_dir).await?;
    if documents.is_empty() {
        error!("No documents found or loaded from '{}'", docs_dir.display());
        return Ok(None);
    }
    let chunks = split_documents(&documents, settings.chunking.chunk_size, settings.chunking.chunk_overlap)?;
    if chunks.is_empty() {
        warn!("Documents produced no text chunks; an existing index will be used if present");
    }
    info!("Prepared {} chunks from {} pages", chunks.len(), documents.len());
    Ok(Some((documents.len(), chunks)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_names_the_directory() {
        assert_eq!(
            missing_documents_message(Path::new("docs")),
            "Error: check that directory 'docs' exists and contains valid PDF files."
        );
    }

    #[tokio::test]
    async fn missing_directory_yields_no_chunks() {
        let settings = Settings::default();
        let loaded = load_chunks(&settings, Path::new("/nonexistent/normas/docs")).await.expect("load");
        assert!(loaded.is_none());
    }
}
