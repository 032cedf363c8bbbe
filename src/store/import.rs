//! JSONL record import.
//!
//! Each non-blank line is one [`ImportRecord`]. Records are embedded in
//! batches and written through [`SqliteStore::insert`]; ids already present
//! are skipped.

use std::io::BufRead;

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{records::format_timestamp, SqliteStore};
use crate::db::schema;
use crate::embedding::EmbeddingProvider;
use crate::retrieval::types::{DataSource, MemoryRecord, Partition};

/// Records embedded per provider call.
pub const IMPORT_BATCH: usize = 32;

/// One line of an import file.
#[derive(Debug, Deserialize)]
pub struct ImportRecord {
    /// Generated (UUID v7) when absent.
    #[serde(default)]
    pub record_id: Option<String>,
    pub partition: Partition,
    pub data_source: DataSource,
    pub display_text: String,
    #[serde(default)]
    pub subject: Option<String>,
    /// Derived from partition and data source when absent.
    #[serde(default)]
    pub memory_sub_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl ImportRecord {
    pub fn into_record(self) -> MemoryRecord {
        let memory_sub_type = self
            .memory_sub_type
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.data_source.sub_type(self.partition));
        MemoryRecord {
            record_id: self
                .record_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::now_v7().to_string()),
            partition: self.partition,
            data_source: self.data_source,
            display_text: self.display_text,
            subject: self.subject,
            memory_sub_type,
            timestamp: self.timestamp,
            user_id: self.user_id,
            group_id: self.group_id,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportSummary {
    pub imported: u64,
    pub skipped: u64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
}

/// Parse every record from `reader`. Fails on the first malformed line.
pub fn parse_jsonl(reader: impl BufRead) -> Result<Vec<MemoryRecord>> {
    let mut parsed = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ImportRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid record on line {line_no}"))?;
        ensure!(
            !record.display_text.trim().is_empty(),
            "empty display_text on line {line_no}"
        );
        parsed.push(record.into_record());
    }
    Ok(parsed)
}

/// Embed and store `records`, calling `progress` with the running count.
///
/// Records the embedder's model name in `schema_meta` once anything is written.
pub fn import_records(
    store: &SqliteStore,
    embedder: &dyn EmbeddingProvider,
    records: &[MemoryRecord],
    mut progress: impl FnMut(usize),
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut done = 0;

    for batch in records.chunks(IMPORT_BATCH) {
        let texts: Vec<&str> = batch.iter().map(|r| r.display_text.as_str()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .context("failed to embed import batch")?;
        ensure!(
            vectors.len() == batch.len(),
            "embedder returned {} vectors for {} records",
            vectors.len(),
            batch.len()
        );

        for (record, vector) in batch.iter().zip(&vectors) {
            if store.insert(record, vector)? {
                summary.imported += 1;
                let ts = format_timestamp(&record.timestamp);
                if summary.oldest.as_ref().map_or(true, |o| &ts < o) {
                    summary.oldest = Some(ts.clone());
                }
                if summary.newest.as_ref().map_or(true, |n| &ts > n) {
                    summary.newest = Some(ts);
                }
            } else {
                tracing::debug!(record_id = %record.record_id, "record exists, skipped");
                summary.skipped += 1;
            }
        }
        done += batch.len();
        progress(done);
    }

    if summary.imported > 0 {
        schema::set_embedding_model(&*store.lock()?, embedder.model_name())?;
    }
    tracing::info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "import finished"
    );
    Ok(summary)
}
