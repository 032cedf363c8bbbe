use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

/// Number of records in one `(data_source, partition)` bucket.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PartitionCount {
    pub data_source: String,
    pub partition: String,
    pub records: u64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
}

/// Record counts per data source and partition, sorted by both.
pub fn partition_counts(conn: &Connection) -> Result<Vec<PartitionCount>> {
    let mut stmt = conn.prepare(
        "SELECT data_source, memory_partition, COUNT(*), MIN(timestamp), MAX(timestamp) \
         FROM memory_records \
         GROUP BY data_source, memory_partition \
         ORDER BY data_source, memory_partition",
    )?;
    let counts = stmt
        .query_map([], |row| {
            Ok(PartitionCount {
                data_source: row.get(0)?,
                partition: row.get(1)?,
                records: row.get::<_, i64>(2)?.max(0) as u64,
                oldest: row.get(3)?,
                newest: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts)
}
