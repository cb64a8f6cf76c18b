use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use normas_core::traits::{Embedder, Retriever};
use normas_core::types::{Chunk, ChunkMeta, SourceMeta};
use normas_core::{ClientError, Error, IndexError};
use normas_llm::FakeEmbedder;
use normas_vector::{IndexOptions, VectorIndex};

/// Fake embedder that counts how many texts it was asked to embed.
struct CountingEmbedder {
    inner: FakeEmbedder,
    embedded: Arc<AtomicUsize>,
}

impl CountingEmbedder {
    fn boxed(dim: usize, embedded: &Arc<AtomicUsize>) -> Box<dyn Embedder> {
        Box::new(Self { inner: FakeEmbedder::new(dim), embedded: embedded.clone() })
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClientError> {
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

fn chunk(id: &str, path: &str, page: Option<u32>, offset: usize, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        metadata: ChunkMeta {
            source: SourceMeta { source_path: path.to_string(), page_number: page },
            start_offset: offset,
        },
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("nbr-5410:0", "docs/nbr-5410.pdf", Some(1), 0, "Electrical installations in low voltage buildings"),
        chunk("nbr-5410:1", "docs/nbr-5410.pdf", Some(2), 0, "Conductor cross section and cable sizing rules"),
        chunk("standard-123:0", "docs/standard-123.pdf", Some(4), 120, "The maximum tolerance is 0.5 mm for welded joints"),
        chunk("iso-9001:0", "docs/iso-9001.pdf", None, 0, "Quality management systems requirements for audits"),
        chunk("iso-9001:1", "docs/iso-9001.pdf", None, 300, "Internal audit programme and management review"),
    ]
}

fn options() -> IndexOptions {
    IndexOptions { batch_size: 2, candidate_multiplier: 10, show_progress: false }
}

fn ids(hits: &[normas_core::types::ScoredChunk]) -> Vec<String> {
    hits.iter().map(|h| h.chunk.id.clone()).collect()
}

#[tokio::test]
async fn build_then_reload_keeps_top_k_ordering() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("lancedb");
    let chunks = corpus();
    let embedded = Arc::new(AtomicUsize::new(0));

    let index = VectorIndex::build_or_load(&chunks, CountingEmbedder::boxed(128, &embedded), &store, options())
        .await
        .expect("build");
    assert_eq!(index.len(), chunks.len());
    assert_eq!(index.dim(), 128);
    assert_eq!(index.embedder_id(), "fake:xxhash:d128");
    assert_eq!(embedded.load(Ordering::SeqCst), chunks.len());

    let first = index.search("maximum tolerance for welded joints", 3).await.expect("search");
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].chunk.id, "standard-123:0");
    assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
    drop(index);

    embedded.store(0, Ordering::SeqCst);
    let reloaded = VectorIndex::build_or_load(&chunks, CountingEmbedder::boxed(128, &embedded), &store, options())
        .await
        .expect("load");
    assert_eq!(embedded.load(Ordering::SeqCst), 0, "loading must not re-embed chunks");
    assert_eq!(reloaded.len(), chunks.len());
    assert_eq!(reloaded.storage_path(), store.as_path());

    let second = reloaded.search("maximum tolerance for welded joints", 3).await.expect("search");
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn hits_carry_source_metadata() {
    let tmp = TempDir::new().unwrap();
    let index = VectorIndex::build_or_load(&corpus(), Box::new(FakeEmbedder::new(256)), tmp.path(), options())
        .await
        .expect("build");

    let hits = index.search("maximum tolerance welded joints", 1).await.expect("search");
    let top = &hits[0];
    assert_eq!(top.chunk.file_name().as_deref(), Some("standard-123.pdf"));
    assert_eq!(top.chunk.page_number(), Some(4));
    assert_eq!(top.chunk.metadata.start_offset, 120);
    assert_eq!(top.ordinal, 2);
    assert!(top.score > 0.3, "score {}", top.score);

    let audits = index.search("internal audit programme", 1).await.expect("search");
    assert_eq!(audits[0].chunk.id, "iso-9001:1");
    assert_eq!(audits[0].chunk.page_number(), None);
}

#[tokio::test]
async fn corrupt_index_is_deleted_and_rebuilt() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("lancedb");
    fs::create_dir_all(store.join("chunks.lance")).unwrap();
    fs::write(store.join("chunks.lance").join("garbage.bin"), b"\x00\x01not lance").unwrap();
    fs::write(store.join("index.faiss"), b"leftover").unwrap();

    let chunks = corpus();
    let embedded = Arc::new(AtomicUsize::new(0));
    let index = VectorIndex::build_or_load(&chunks, CountingEmbedder::boxed(256, &embedded), &store, options())
        .await
        .expect("rebuild");

    assert_eq!(embedded.load(Ordering::SeqCst), chunks.len());
    assert_eq!(index.len(), chunks.len());
    assert!(!store.join("index.faiss").exists(), "old files are removed");
    let hits = index.search("cable sizing", 1).await.expect("search");
    assert_eq!(hits[0].chunk.id, "nbr-5410:1");
}

#[tokio::test]
async fn changed_embedder_forces_rebuild() {
    let tmp = TempDir::new().unwrap();
    let chunks = corpus();
    let embedded = Arc::new(AtomicUsize::new(0));
    VectorIndex::build_or_load(&chunks, CountingEmbedder::boxed(32, &embedded), tmp.path(), options())
        .await
        .expect("build");

    embedded.store(0, Ordering::SeqCst);
    let index = VectorIndex::build_or_load(&chunks, CountingEmbedder::boxed(48, &embedded), tmp.path(), options())
        .await
        .expect("rebuild");
    assert_eq!(index.dim(), 48);
    assert_eq!(embedded.load(Ordering::SeqCst), chunks.len());
    assert_eq!(index.search("quality management", 2).await.expect("search").len(), 2);
}

#[tokio::test]
async fn changed_documents_still_load_existing_index() {
    let tmp = TempDir::new().unwrap();
    let chunks = corpus();
    let embedded = Arc::new(AtomicUsize::new(0));
    VectorIndex::build_or_load(&chunks, CountingEmbedder::boxed(32, &embedded), tmp.path(), options())
        .await
        .expect("build");

    embedded.store(0, Ordering::SeqCst);
    let fewer = &chunks[..2];
    let index = VectorIndex::build_or_load(fewer, CountingEmbedder::boxed(32, &embedded), tmp.path(), options())
        .await
        .expect("load");
    assert_eq!(embedded.load(Ordering::SeqCst), 0);
    assert_eq!(index.len(), chunks.len());
}

#[tokio::test]
async fn forced_rebuild_replaces_contents() {
    let tmp = TempDir::new().unwrap();
    let chunks = corpus();
    VectorIndex::build_or_load(&chunks, Box::new(FakeEmbedder::new(32)), tmp.path(), options())
        .await
        .expect("build");

    let index = VectorIndex::rebuild(&chunks[..2], Box::new(FakeEmbedder::new(32)), tmp.path(), options())
        .await
        .expect("rebuild");
    assert_eq!(index.len(), 2);
    assert_eq!(index.search("quality audits", 10).await.expect("search").len(), 2);
}

#[tokio::test]
async fn empty_chunks_without_index_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let err = VectorIndex::build_or_load(&[], Box::new(FakeEmbedder::new(32)), &tmp.path().join("new"), options())
        .await
        .err()
        .expect("nothing to build");
    assert!(matches!(err, Error::Configuration(_)), "got {err}");
    assert!(tmp.path().join("new").is_dir(), "storage directory is created");
}

#[tokio::test]
async fn empty_chunks_with_corrupt_index_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("junk"), b"junk").unwrap();
    let err = VectorIndex::build_or_load(&[], Box::new(FakeEmbedder::new(32)), tmp.path(), options())
        .await
        .err()
        .expect("nothing to build");
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn query_vector_dimension_is_checked() {
    let tmp = TempDir::new().unwrap();
    let index = VectorIndex::build_or_load(&corpus(), Box::new(FakeEmbedder::new(32)), tmp.path(), options())
        .await
        .expect("build");
    let err = index.search_vector(&[0.1; 16], 3).await.expect_err("wrong dimension");
    assert!(matches!(err, Error::Index(IndexError::DimensionMismatch { expected: 32, actual: 16 })));
}

#[tokio::test]
async fn k_bounds() {
    let tmp = TempDir::new().unwrap();
    let chunks = corpus();
    let index = VectorIndex::build_or_load(&chunks, Box::new(FakeEmbedder::new(32)), tmp.path(), options())
        .await
        .expect("build");
    assert!(index.search("tolerance", 0).await.expect("search").is_empty());
    assert_eq!(index.retrieve("tolerance", 50).await.expect("retrieve").len(), chunks.len());
}

#[tokio::test]
async fn equal_scores_keep_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let chunks = vec![
        chunk("a:0", "docs/a.pdf", Some(1), 0, "grounding electrode resistance"),
        chunk("b:0", "docs/b.pdf", Some(1), 0, "grounding electrode resistance"),
        chunk("c:0", "docs/c.pdf", Some(1), 0, "unrelated paint colour chart"),
        chunk("d:0", "docs/d.pdf", Some(1), 0, "grounding electrode resistance"),
    ];
    let index = VectorIndex::build_or_load(&chunks, Box::new(FakeEmbedder::new(64)), tmp.path(), options())
        .await
        .expect("build");
    let hits = index.search("grounding electrode resistance", 3).await.expect("search");
    assert_eq!(ids(&hits), vec!["a:0", "b:0", "d:0"]);
    let ordinals: Vec<u32> = hits.iter().map(|h| h.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 3]);
}

#[test]
fn fingerprint_tracks_content() {
    let chunks = corpus();
    let mut edited = corpus();
    edited[1].text.push_str(" (amended)");
    assert_eq!(normas_vector::fingerprint(&chunks), normas_vector::fingerprint(&corpus()));
    assert_ne!(normas_vector::fingerprint(&chunks), normas_vector::fingerprint(&edited));
    assert!(Path::new(chunks[0].source_path()).extension().is_some());
}
