//! PDF directory loader: one `RawDocument` per page.

use futures::{stream, StreamExt};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::types::{RawDocument, SourceMeta};

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    workers: usize,
    skip_unreadable: bool,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl DocumentLoader {
    pub fn new(config: &LoaderConfig) -> Self {
        Self { workers: config.workers.max(1), skip_unreadable: config.skip_unreadable }
    }

    /// Load every `*.pdf` directly inside `dir`.
    ///
    /// A missing or empty directory yields an empty list. Pages come back sorted
    /// by file path, then page number, whatever order the workers finish in.
    pub async fn load(&self, dir: &Path) -> Result<Vec<RawDocument>> {
        if !dir.is_dir() {
            error!("Document directory not found: {}", dir.display());
            return Ok(vec![]);
        }
        if fs::read_dir(dir)?.next().is_none() {
            warn!("Document directory is empty: {}", dir.display());
            return Ok(vec![]);
        }
        let files = list_pdf_files(dir);
        if files.is_empty() {
            warn!("No .pdf files found under {}", dir.display());
            return Ok(vec![]);
        }

        info!("Loading {} PDF files from {}", files.len(), dir.display());
        let results: Vec<(PathBuf, Result<Vec<RawDocument>>)> = stream::iter(files)
            .map(|path| async move {
                let worker_path = path.clone();
                let pages = match tokio::task::spawn_blocking(move || extract_pages(&worker_path)).await {
                    Ok(pages) => pages,
                    Err(e) => Err(Error::Load { path: path.clone(), reason: format!("parser task failed: {}", e) }),
                };
                (path, pages)
            })
            .buffered(self.workers)
            .collect()
            .await;

        let mut documents = Vec::new();
        for (path, pages) in results {
            match pages {
                Ok(pages) => documents.extend(pages),
                Err(e) if self.skip_unreadable => warn!("Skipping unreadable PDF {}: {}", path.display(), e),
                Err(e) => {
                    error!("Error loading documents: {}", e);
                    return Err(e);
                }
            }
        }
        documents.sort_by(|a, b| {
            a.metadata
                .source_path
                .cmp(&b.metadata.source_path)
                .then(a.metadata.page_number.cmp(&b.metadata.page_number))
        });

        info!("Loaded {} pages", documents.len());
        if documents.is_empty() {
            warn!("No pages were loaded; check the PDF files in {}", dir.display());
        }
        Ok(documents)
    }
}

/// Parse one PDF into per-page documents. Blocking.
pub fn extract_pages(path: &Path) -> Result<Vec<RawDocument>> {
    let load_err = |reason: String| Error::Load { path: path.to_path_buf(), reason };
    let pdf = lopdf::Document::load(path).map_err(|e| load_err(e.to_string()))?;
    let source_path = path.to_string_lossy().to_string();
    let mut pages = Vec::new();
    for page_number in pdf.get_pages().keys() {
        let text = pdf
            .extract_text(&[*page_number])
            .map_err(|e| load_err(format!("page {}: {}", page_number, e)))?;
        pages.push(RawDocument {
            text,
            metadata: SourceMeta { source_path: source_path.clone(), page_number: Some(*page_number) },
        });
    }
    Ok(pages)
}

fn list_pdf_files(root: &Path) -> Vec<PathBuf> {
    let mut pdf_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
        .map(|e| e.path().to_path_buf())
        .collect();
    pdf_files.sort();
    pdf_files
}
