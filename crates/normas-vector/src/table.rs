//! LanceDB connection and housekeeping helpers.
//!
//! Opens databases, converts between chunks and Arrow record batches, and keeps
//! a small key/value `meta` table describing how the index was built.

use arrow_array::types::Float32Type;
use arrow_array::{
	Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
	TimestampMillisecondArray,
};
use arrow_schema::Schema;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::fmt::Display;
use std::sync::Arc;

use normas_core::types::{Chunk, ChunkMeta, ScoredChunk, SourceMeta};
use normas_core::IndexError;

use crate::schema::{build_chunks_schema, build_meta_schema};

pub(crate) fn storage<E: Display>(e: E) -> IndexError {
	IndexError::Storage(e.to_string())
}

pub async fn open_db(uri: &str) -> Result<Connection, IndexError> {
	connect(uri).execute().await.map_err(storage)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool, IndexError> {
	let names = conn.table_names().execute().await.map_err(storage)?;
	Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<(), IndexError> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	// create empty table with 0 rows
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await.map_err(storage)?;
	Ok(())
}

pub async fn set_meta(conn: &Connection, table: &str, key: &str, value: &str) -> Result<(), IndexError> {
	ensure_table(conn, table, build_meta_schema()).await?;
	let t = conn.open_table(table).execute().await.map_err(storage)?;
	let rb = RecordBatch::try_new(
		build_meta_schema(),
		vec![
			Arc::new(StringArray::from(vec![key.to_string()])),
			Arc::new(StringArray::from(vec![value.to_string()])),
			Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
		],
	)
	.map_err(storage)?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
	// key is unique: upsert
	let mut mi = t.merge_insert(&["key"]);
	mi.when_matched_update_all(None).when_not_matched_insert_all();
	mi.execute(reader).await.map_err(storage)?;
	Ok(())
}

pub async fn get_meta(conn: &Connection, table: &str, key: &str) -> Result<Option<String>, IndexError> {
	if !table_exists(conn, table).await? {
		return Ok(None);
	}
	let t = conn.open_table(table).execute().await.map_err(storage)?;
	let mut stream = t
		.query()
		.only_if(format!("key = '{}'", key.replace('\'', "''")))
		.execute()
		.await
		.map_err(storage)?;
	while let Some(batch) = stream.try_next().await.map_err(storage)? {
		if batch.num_rows() == 0 {
			continue;
		}
		let val = string_col(&batch, "value")?;
		return Ok(Some(val.value(0).to_string()));
	}
	Ok(None)
}

/// Arrow batch for `chunks` with their vectors; ordinals start at `first_ordinal`.
pub fn chunks_to_record_batch(
	chunks: &[Chunk],
	vectors: &[Vec<f32>],
	first_ordinal: usize,
	dim: i32,
) -> Result<RecordBatch, IndexError> {
	let mut ids = Vec::with_capacity(chunks.len());
	let mut ordinals = Vec::with_capacity(chunks.len());
	let mut paths = Vec::with_capacity(chunks.len());
	let mut pages = Vec::with_capacity(chunks.len());
	let mut offsets = Vec::with_capacity(chunks.len());
	let mut contents = Vec::with_capacity(chunks.len());
	for (i, chunk) in chunks.iter().enumerate() {
		ids.push(chunk.id.clone());
		ordinals.push((first_ordinal + i) as i32);
		paths.push(chunk.source_path().to_string());
		pages.push(chunk.page_number().map(|p| p as i32));
		offsets.push(chunk.metadata.start_offset as i64);
		contents.push(chunk.text.clone());
	}
	let vectors = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	RecordBatch::try_new(
		build_chunks_schema(dim),
		vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(Int32Array::from(ordinals)),
			Arc::new(StringArray::from(paths)),
			Arc::new(Int32Array::from(pages)),
			Arc::new(Int64Array::from(offsets)),
			Arc::new(StringArray::from(contents)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
		],
	)
	.map_err(storage)
}

/// Read search hits back out of a vector query batch. Score is `1 - _distance`.
pub fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<ScoredChunk>, IndexError> {
	let ids = string_col(batch, "id")?;
	let ordinals = typed_col::<Int32Array>(batch, "ordinal")?;
	let paths = string_col(batch, "source_path")?;
	let pages = typed_col::<Int32Array>(batch, "page_number")?;
	let offsets = typed_col::<Int64Array>(batch, "start_offset")?;
	let contents = string_col(batch, "content")?;
	let distances = typed_col::<Float32Array>(batch, "_distance")?;

	let mut hits = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let page_number = if pages.is_null(i) { None } else { Some(pages.value(i) as u32) };
		let chunk = Chunk {
			id: ids.value(i).to_string(),
			text: contents.value(i).to_string(),
			metadata: ChunkMeta {
				source: SourceMeta { source_path: paths.value(i).to_string(), page_number },
				start_offset: offsets.value(i) as usize,
			},
		};
		hits.push(ScoredChunk { chunk, score: 1.0 - distances.value(i), ordinal: ordinals.value(i) as u32 });
	}
	Ok(hits)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
	typed_col::<StringArray>(batch, name)
}

fn typed_col<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, IndexError> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| IndexError::Corrupt(format!("column '{}' missing or mistyped", name)))
}
