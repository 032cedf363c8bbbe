//! CLI `import` command: load JSONL records into the database.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use recollect::config::RecollectConfig;
use recollect::db;
use recollect::embedding::{self, EmbeddingProvider};
use recollect::store::import::{import_records, parse_jsonl};
use recollect::store::SqliteStore;

pub async fn import(config: &RecollectConfig, file: &Path) -> Result<()> {
    let reader = std::fs::File::open(file)
        .with_context(|| format!("failed to open import file: {}", file.display()))?;
    let records = parse_jsonl(BufReader::new(reader))
        .with_context(|| format!("failed to parse {}", file.display()))?;

    let store = SqliteStore::new(db::open_database(config.resolved_db_path())?);
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);

    println!("Importing {} records from {}...", records.len(), file.display());
    let progress = super::item_progress(records.len() as u64, "records")?;

    let bar = progress.clone();
    let summary = tokio::task::spawn_blocking(move || {
        import_records(&store, embedder.as_ref(), &records, |done| {
            bar.set_position(done as u64)
        })
    })
    .await??;
    progress.finish_and_clear();

    println!("Import complete:");
    println!("  Imported: {}", summary.imported);
    println!("  Skipped:  {} (already exist)", summary.skipped);
    if let (Some(oldest), Some(newest)) = (&summary.oldest, &summary.newest) {
        println!("  Span:     {oldest} .. {newest}");
    }
    Ok(())
}
