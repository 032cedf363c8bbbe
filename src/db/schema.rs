//! SQL DDL for the memory store.
//!
//! `memory_records` holds one row per record. `memory_records_fts` is an FTS5
//! index over pre-tokenized terms keyed by the record's integer id, and
//! `memory_embeddings` keeps one raw f32 vector per record. All DDL is
//! idempotent.

use rusqlite::{Connection, OptionalExtension};

/// Schema version written by this binary.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memory_records (
    id INTEGER PRIMARY KEY,
    record_id TEXT NOT NULL UNIQUE,
    memory_partition TEXT NOT NULL CHECK(memory_partition IN ('personal','group')),
    data_source TEXT NOT NULL CHECK(data_source IN ('episode','event_log','semantic_fact')),
    display_text TEXT NOT NULL,
    subject TEXT,
    memory_sub_type TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    user_id TEXT,
    group_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_records_source_time ON memory_records(data_source, timestamp);
CREATE INDEX IF NOT EXISTS idx_records_user ON memory_records(user_id);
CREATE INDEX IF NOT EXISTS idx_records_group ON memory_records(group_id);

CREATE VIRTUAL TABLE IF NOT EXISTS memory_records_fts USING fts5(terms);

CREATE TABLE IF NOT EXISTS memory_embeddings (
    record_id TEXT PRIMARY KEY REFERENCES memory_records(record_id) ON DELETE CASCADE,
    embedding BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(meta_value(conn, "schema_version")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Embedding model the stored vectors were produced with, if recorded.
pub fn embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    meta_value(conn, "embedding_model")
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

fn meta_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn creates_all_tables() {
        let conn = conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        for expected in ["memory_records", "memory_records_fts", "memory_embeddings", "schema_meta"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[test]
    fn init_is_idempotent() {
        let conn = conn();
        init_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn embedding_model_round_trips() {
        let conn = conn();
        assert!(embedding_model(&conn).unwrap().is_none());
        set_embedding_model(&conn, "all-MiniLM-L6-v2").unwrap();
        set_embedding_model(&conn, "bge-small").unwrap();
        assert_eq!(embedding_model(&conn).unwrap().as_deref(), Some("bge-small"));
    }
}
