//! SQLite-backed collaborators for the retrieval core.
//!
//! [`SqliteStore`] implements [`VectorIndex`], [`LexicalIndex`] and
//! [`DocumentStore`] over one shared connection. Both searches push the
//! [`PartitionFilter`] into SQL so the candidate pool is drawn only from
//! admitted rows.

pub mod import;
pub mod records;
pub mod stats;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::retrieval::backend::{DocumentStore, LexicalIndex, VectorIndex};
use crate::retrieval::scope::PartitionFilter;
use crate::retrieval::types::{MemoryRecord, Partition};

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

// ── Partition predicate ───────────────────────────────────────────────────────

/// Shared WHERE clause over `memory_records r`.
///
/// ?1 data_source, ?2 since, ?3/?4 personal partition on / user_id,
/// ?5/?6 group partition on / group_id. Queries bind ?7 and ?8 themselves.
const PARTITION_PREDICATE: &str = "r.data_source = ?1 AND r.timestamp >= ?2 AND ( \
     (r.memory_partition = 'personal' AND ?3 AND (?4 IS NULL OR r.user_id = ?4)) OR \
     (r.memory_partition = 'group' AND ?5 AND (?6 IS NULL OR r.group_id = ?6)))";

struct FilterParams<'a> {
    data_source: &'static str,
    since: String,
    personal: bool,
    user_id: Option<&'a str>,
    group: bool,
    group_id: Option<&'a str>,
}

impl<'a> From<&'a PartitionFilter> for FilterParams<'a> {
    fn from(filter: &'a PartitionFilter) -> Self {
        Self {
            data_source: filter.data_source.as_str(),
            since: records::format_timestamp(&filter.since),
            personal: filter.includes(Partition::Personal),
            user_id: filter.user_id.as_deref(),
            group: filter.includes(Partition::Group),
            group_id: filter.group_id.as_deref(),
        }
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self::from_shared(Arc::new(Mutex::new(conn)))
    }

    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Store one record; see [`records::insert_record`].
    pub fn insert(&self, record: &MemoryRecord, embedding: &[f32]) -> Result<bool> {
        records::insert_record(&mut *self.lock()?, record, embedding)
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("database lock poisoned: {e}"))
    }
}

impl VectorIndex for SqliteStore {
    fn search(
        &self,
        vector: &[f32],
        filter: &PartitionFilter,
        limit: usize,
    ) -> Result<Vec<(String, f64)>> {
        let conn = self.lock()?;
        let p = FilterParams::from(filter);
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT r.record_id, 1.0 - vec_distance_cosine(e.embedding, ?7) AS similarity \
             FROM memory_embeddings e \
             JOIN memory_records r ON r.record_id = e.record_id \
             WHERE {PARTITION_PREDICATE} \
             ORDER BY similarity DESC, r.record_id LIMIT ?8"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    p.data_source,
                    p.since,
                    p.personal,
                    p.user_id,
                    p.group,
                    p.group_id,
                    embedding_to_bytes(vector),
                    limit as i64,
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        // Zero-norm vectors have no cosine similarity.
        Ok(rows
            .into_iter()
            .filter_map(|(id, score)| score.map(|s| (id, s)))
            .collect())
    }
}

impl LexicalIndex for SqliteStore {
    fn search(
        &self,
        terms: &[String],
        filter: &PartitionFilter,
        limit: usize,
    ) -> Result<Vec<(String, f64)>> {
        let expression = match_expression(terms);
        if expression.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let p = FilterParams::from(filter);
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT r.record_id, -bm25(memory_records_fts) AS score \
             FROM memory_records_fts \
             JOIN memory_records r ON r.id = memory_records_fts.rowid \
             WHERE memory_records_fts MATCH ?7 AND {PARTITION_PREDICATE} \
             ORDER BY score DESC, r.record_id LIMIT ?8"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    p.data_source,
                    p.since,
                    p.personal,
                    p.user_id,
                    p.group,
                    p.group_id,
                    expression,
                    limit as i64,
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl DocumentStore for SqliteStore {
    fn fetch_records(&self, record_ids: &[String]) -> Result<HashMap<String, MemoryRecord>> {
        records::fetch_records(&*self.lock()?, record_ids)
    }
}

/// FTS5 MATCH expression: any of the quoted terms.
fn match_expression(terms: &[String]) -> String {
    terms
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}
