use async_trait::async_trait;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use normas_core::config::Settings;
use normas_core::traits::{Embedder, Retriever};
use normas_core::types::{Chunk, ScoredChunk};
use normas_core::{ClientError, Error, IndexError, Result};

use crate::schema::{CHUNKS_TABLE, FORMAT_VERSION, META_TABLE};
use crate::table::{batch_to_hits, chunks_to_record_batch, get_meta, open_db, set_meta, storage, table_exists};

#[derive(Debug, Clone)]
pub struct IndexOptions {
	pub batch_size: usize,
	pub candidate_multiplier: usize,
	pub show_progress: bool,
}

impl Default for IndexOptions {
	fn default() -> Self {
		Self { batch_size: 64, candidate_multiplier: 10, show_progress: true }
	}
}

impl IndexOptions {
	pub fn from_settings(settings: &Settings) -> Self {
		Self {
			batch_size: settings.models.embed_batch_size,
			candidate_multiplier: settings.retrieval.candidate_multiplier,
			show_progress: true,
		}
	}
}

/// Persistent cosine-similarity index over chunk embeddings.
pub struct VectorIndex {
	_db: Connection,
	table: Table,
	embedder: Box<dyn Embedder>,
	storage_path: PathBuf,
	options: IndexOptions,
	len: usize,
	dim: usize,
}

struct Opened {
	db: Connection,
	table: Table,
	len: usize,
	fingerprint: Option<String>,
}

impl VectorIndex {
	/// Load the index persisted under `storage_path`, or build one from `chunks`.
	///
	/// An index that fails validation (corrupt files, different embedder or
	/// dimension, no rows) is deleted and rebuilt from `chunks`.
	pub async fn build_or_load(
		chunks: &[Chunk],
		embedder: Box<dyn Embedder>,
		storage_path: &Path,
		options: IndexOptions,
	) -> Result<Self> {
		fs::create_dir_all(storage_path)?;
		if fs::read_dir(storage_path)?.next().is_some() {
			match open_existing(storage_path, embedder.as_ref()).await {
				Ok(opened) => {
					if !chunks.is_empty() && opened.fingerprint.as_deref() != Some(fingerprint(chunks).as_str()) {
						warn!("Vector index at {} was built from a different document set; run normas-indexer to refresh it", storage_path.display());
					}
					info!("Loaded vector index with {} chunks from {}", opened.len, storage_path.display());
					let dim = embedder.dim();
					return Ok(Self {
						_db: opened.db,
						table: opened.table,
						embedder,
						storage_path: storage_path.to_path_buf(),
						options,
						len: opened.len,
						dim,
					});
				}
				Err(e) => {
					warn!("Vector index at {} is unusable ({}); deleting and rebuilding", storage_path.display(), e);
					fs::remove_dir_all(storage_path)?;
					fs::create_dir_all(storage_path)?;
				}
			}
		}
		Self::build(chunks, embedder, storage_path, options).await
	}

	/// Delete whatever is under `storage_path` and build from `chunks`.
	pub async fn rebuild(
		chunks: &[Chunk],
		embedder: Box<dyn Embedder>,
		storage_path: &Path,
		options: IndexOptions,
	) -> Result<Self> {
		if storage_path.exists() {
			info!("Removing existing vector index at {}", storage_path.display());
			fs::remove_dir_all(storage_path)?;
		}
		fs::create_dir_all(storage_path)?;
		Self::build(chunks, embedder, storage_path, options).await
	}

	async fn build(
		chunks: &[Chunk],
		embedder: Box<dyn Embedder>,
		storage_path: &Path,
		options: IndexOptions,
	) -> Result<Self> {
		if chunks.is_empty() {
			return Err(Error::Configuration("cannot build empty index".to_string()));
		}
		let dim = embedder.dim();
		let batch_size = options.batch_size.max(1);
		info!("Building vector index for {} chunks with {} at {}", chunks.len(), embedder.embedder_id(), storage_path.display());

		let db = open_db(&storage_path.to_string_lossy()).await?;
		let pb = progress_bar(chunks.len(), options.show_progress);
		let mut table: Option<Table> = None;
		for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
			let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
			let vectors = embedder.embed_batch(&texts).await?;
			if vectors.len() != batch.len() {
				return Err(ClientError::Decode(format!("asked for {} embeddings, got {}", batch.len(), vectors.len())).into());
			}
			if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
				return Err(IndexError::DimensionMismatch { expected: dim, actual: bad.len() }.into());
			}
			let rb = chunks_to_record_batch(batch, &vectors, batch_no * batch_size, dim as i32)?;
			let schema = rb.schema();
			let reader = Box::new(arrow_array::RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
			if let Some(t) = &table {
				t.add(reader).execute().await.map_err(storage)?;
			} else {
				table = Some(db.create_table(CHUNKS_TABLE, reader).execute().await.map_err(storage)?);
			}
			pb.inc(batch.len() as u64);
		}
		pb.finish_with_message("vector index built");

		set_meta(&db, META_TABLE, "format_version", FORMAT_VERSION).await?;
		set_meta(&db, META_TABLE, "embedder_id", embedder.embedder_id()).await?;
		set_meta(&db, META_TABLE, "dim", &dim.to_string()).await?;
		set_meta(&db, META_TABLE, "fingerprint", &fingerprint(chunks)).await?;

		let table = table.ok_or_else(|| IndexError::Storage("chunks table was not created".to_string()))?;
		info!("Indexed {} chunks into {}", chunks.len(), storage_path.display());
		Ok(Self {
			_db: db,
			table,
			embedder,
			storage_path: storage_path.to_path_buf(),
			options,
			len: chunks.len(),
			dim,
		})
	}

	/// The `k` chunks closest to `query_text`, best first; ties keep insertion order.
	pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
		if k == 0 {
			return Ok(vec![]);
		}
		let query = self.embedder.embed(query_text).await?;
		self.search_vector(&query, k).await
	}

	pub async fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		if query.len() != self.dim {
			return Err(IndexError::DimensionMismatch { expected: self.dim, actual: query.len() }.into());
		}
		if k == 0 {
			return Ok(vec![]);
		}
		let limit = k.saturating_mul(self.options.candidate_multiplier.max(1));
		let mut stream = self
			.table
			.vector_search(query.to_vec())
			.map_err(storage)?
			.distance_type(DistanceType::Cosine)
			.limit(limit)
			.execute()
			.await
			.map_err(storage)?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(storage)? {
			hits.extend(batch_to_hits(&batch)?);
		}
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then(a.ordinal.cmp(&b.ordinal)));
		hits.truncate(k);
		Ok(hits)
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn embedder_id(&self) -> &str {
		self.embedder.embedder_id()
	}

	pub fn storage_path(&self) -> &Path {
		&self.storage_path
	}
}

#[async_trait]
impl Retriever for VectorIndex {
	async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
		self.search(query, k).await
	}
}

async fn open_existing(storage_path: &Path, embedder: &dyn Embedder) -> std::result::Result<Opened, IndexError> {
	let db = open_db(&storage_path.to_string_lossy()).await?;
	if !table_exists(&db, CHUNKS_TABLE).await? {
		return Err(IndexError::Corrupt(format!("'{}' table not found", CHUNKS_TABLE)));
	}
	let version = required_meta(&db, "format_version").await?;
	if version != FORMAT_VERSION {
		return Err(IndexError::Incompatible(format!("format version {} (expected {})", version, FORMAT_VERSION)));
	}
	let embedder_id = required_meta(&db, "embedder_id").await?;
	if embedder_id != embedder.embedder_id() {
		return Err(IndexError::Incompatible(format!("built with {}, current embedder is {}", embedder_id, embedder.embedder_id())));
	}
	let dim = required_meta(&db, "dim").await?;
	if dim != embedder.dim().to_string() {
		return Err(IndexError::Incompatible(format!("dimension {} (expected {})", dim, embedder.dim())));
	}
	let table = db.open_table(CHUNKS_TABLE).execute().await.map_err(storage)?;
	let len = table.count_rows(None).await.map_err(storage)?;
	if len == 0 {
		return Err(IndexError::Corrupt("index has no rows".to_string()));
	}
	let fingerprint = get_meta(&db, META_TABLE, "fingerprint").await?;
	Ok(Opened { db, table, len, fingerprint })
}

async fn required_meta(db: &Connection, key: &str) -> std::result::Result<String, IndexError> {
	get_meta(db, META_TABLE, key)
		.await?
		.ok_or_else(|| IndexError::Corrupt(format!("meta key '{}' missing", key)))
}

/// blake3 over every chunk's identity and content, in order.
pub fn fingerprint(chunks: &[Chunk]) -> String {
	let mut hasher = blake3::Hasher::new();
	for c in chunks {
		hasher.update(c.id.as_bytes());
		hasher.update(&[0]);
		hasher.update(c.source_path().as_bytes());
		hasher.update(&[0]);
		hasher.update(&c.page_number().unwrap_or(0).to_le_bytes());
		hasher.update(&(c.metadata.start_offset as u64).to_le_bytes());
		hasher.update(c.text.as_bytes());
		hasher.update(&[0xff]);
	}
	hasher.finalize().to_hex().to_string()
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
	if !visible {
		return ProgressBar::hidden();
	}
	let pb = ProgressBar::new(len as u64);
	if let Ok(style) = ProgressStyle::default_bar()
		.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
	{
		pb.set_style(style.progress_chars("#>-"));
	}
	pb
}
