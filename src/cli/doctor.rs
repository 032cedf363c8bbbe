//! CLI `doctor` command: database diagnostics.

use anyhow::{Context, Result};

use recollect::config::RecollectConfig;
use recollect::db;
use recollect::store::stats::partition_counts;

pub fn doctor(config: &RecollectConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `recollect import <FILE>` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;
    let buckets = partition_counts(&conn).context("failed to count records")?;

    println!("recollect health report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!(
        "  Stored:          {}",
        report.embedding_model.as_deref().unwrap_or("(not set)")
    );
    println!("  Configured:      {}", config.embedding.model);
    match &report.embedding_model {
        Some(stored) if stored != &config.embedding.model => {
            println!("  WARNING: model mismatch, vector scores will be meaningless until re-import.")
        }
        Some(_) => println!("  Status:          OK (match)"),
        None => {}
    }
    println!();
    println!("Records:           {}", report.record_count);
    println!("Embeddings:        {}", report.embedding_count);
    if report.record_count != report.embedding_count {
        println!("  WARNING: some records have no embedding.");
    }
    for bucket in &buckets {
        println!(
            "  {:<14} {:<9} {:>8}  {} .. {}",
            bucket.data_source,
            bucket.partition,
            bucket.records,
            bucket.oldest.as_deref().unwrap_or("-"),
            bucket.newest.as_deref().unwrap_or("-"),
        );
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Restore the database from a backup or re-import the source JSONL.");
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
