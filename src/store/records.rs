//! Write path and row decoding for `memory_records`.

use std::collections::HashMap;

use anyhow::{ensure, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::embedding::EMBEDDING_DIM;
use crate::retrieval::lexical::tokenize;
use crate::retrieval::types::MemoryRecord;

/// Columns selected by [`read_record`], in order.
pub(crate) const RECORD_COLUMNS: &str = "record_id, memory_partition, data_source, display_text, \
     subject, memory_sub_type, timestamp, user_id, group_id";

/// Bound on `?` parameters per lookup statement.
const LOOKUP_CHUNK: usize = 500;

/// Insert `record` with its embedding and lexical terms in one transaction.
///
/// Returns `false` without writing anything if the record_id already exists.
pub fn insert_record(conn: &mut Connection, record: &MemoryRecord, embedding: &[f32]) -> Result<bool> {
    ensure!(
        embedding.len() == EMBEDDING_DIM,
        "embedding for {} has {} dimensions, expected {EMBEDDING_DIM}",
        record.record_id,
        embedding.len()
    );
    ensure!(!record.record_id.is_empty(), "record_id must not be empty");

    let tx = conn.transaction()?;
    let exists = tx
        .query_row(
            "SELECT 1 FROM memory_records WHERE record_id = ?1",
            [&record.record_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Ok(false);
    }

    tx.execute(
        "INSERT INTO memory_records (record_id, memory_partition, data_source, display_text, \
         subject, memory_sub_type, timestamp, user_id, group_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.record_id,
            record.partition.as_str(),
            record.data_source.as_str(),
            record.display_text,
            record.subject,
            record.memory_sub_type,
            format_timestamp(&record.timestamp),
            record.user_id,
            record.group_id,
        ],
    )?;
    let id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO memory_records_fts (rowid, terms) VALUES (?1, ?2)",
        params![id, index_terms(record).join(" ")],
    )?;
    tx.execute(
        "INSERT INTO memory_embeddings (record_id, embedding) VALUES (?1, ?2)",
        params![record.record_id, super::embedding_to_bytes(embedding)],
    )?;

    tx.commit()?;
    Ok(true)
}

/// Batched lookup by record_id. Unknown ids are absent from the result.
pub fn fetch_records(conn: &Connection, record_ids: &[String]) -> Result<HashMap<String, MemoryRecord>> {
    let mut found = HashMap::with_capacity(record_ids.len());
    for chunk in record_ids.chunks(LOOKUP_CHUNK) {
        let placeholders = (1..=chunk.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM memory_records WHERE record_id IN ({placeholders})"
        ))?;
        let rows = stmt.query_map(params_from_iter(chunk), read_record)?;
        for record in rows {
            let record = record?;
            found.insert(record.record_id.clone(), record);
        }
    }
    Ok(found)
}

/// Decode a row selected with [`RECORD_COLUMNS`].
pub(crate) fn read_record(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let partition: String = row.get(1)?;
    let data_source: String = row.get(2)?;
    let timestamp: String = row.get(6)?;

    Ok(MemoryRecord {
        record_id: row.get(0)?,
        partition: partition.parse().map_err(|e: String| conversion_error(1, e))?,
        data_source: data_source.parse().map_err(|e: String| conversion_error(2, e))?,
        display_text: row.get(3)?,
        subject: row.get(4)?,
        memory_sub_type: row.get(5)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| conversion_error(6, e.to_string()))?
            .with_timezone(&Utc),
        user_id: row.get(7)?,
        group_id: row.get(8)?,
    })
}

/// Stored timestamp form: fixed-width RFC 3339 UTC with nanoseconds, so text order is time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Lexical terms indexed for a record: display text plus subject.
fn index_terms(record: &MemoryRecord) -> Vec<String> {
    match &record.subject {
        Some(subject) => tokenize(&format!("{subject} {}", record.display_text)),
        None => tokenize(&record.display_text),
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}
