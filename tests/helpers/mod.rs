#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use recollect::config::RetrievalConfig;
use recollect::db;
use recollect::embedding::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};
use recollect::retrieval::backend::{DocumentStore, LexicalIndex, VectorIndex};
use recollect::retrieval::lexical::tokenize;
use recollect::retrieval::normalize::RetrieveRequest;
use recollect::retrieval::scope::PartitionFilter;
use recollect::retrieval::types::{DataSource, MemoryRecord, Partition};
use recollect::retrieval::Retriever;
use recollect::store::SqliteStore;

/// Bag-of-words embedder: each term bumps one hashed dimension.
///
/// The last dimension carries a constant so no text maps to the zero vector.
pub struct HashEmbedder;

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for term in tokenize(text) {
            v[term_slot(&term)] += 1.0;
        }
        v[EMBEDDING_DIM - 1] = 0.1;
        l2_normalize(&mut v);
        Ok(v)
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }
}

fn term_slot(term: &str) -> usize {
    let hash = term
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
    (hash % (EMBEDDING_DIM as u64 - 1)) as usize
}

/// Fresh in-memory store with schema.
pub fn test_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(db::open_memory_database().unwrap()))
}

pub fn record(
    id: &str,
    source: DataSource,
    partition: Partition,
    text: &str,
    days_ago: i64,
) -> MemoryRecord {
    MemoryRecord {
        record_id: id.into(),
        partition,
        data_source: source,
        display_text: text.into(),
        subject: None,
        memory_sub_type: source.sub_type(partition),
        timestamp: Utc::now() - chrono::Duration::days(days_ago),
        user_id: Some("user_001".into()),
        group_id: Some("group_1".into()),
    }
}

/// Insert `records`, embedding each with [`HashEmbedder`].
pub fn seed(store: &SqliteStore, records: &[MemoryRecord]) {
    for r in records {
        let v = HashEmbedder.embed(&r.display_text).unwrap();
        assert!(store.insert(r, &v).unwrap(), "duplicate seed id {}", r.record_id);
    }
}

/// Retriever with the SQLite store behind all three index roles.
pub fn sqlite_retriever(store: Arc<SqliteStore>, config: RetrievalConfig) -> Retriever {
    Retriever::new(
        Arc::new(HashEmbedder),
        store.clone(),
        store.clone(),
        store,
        config,
    )
}

pub fn request(query: &str, mode: &str) -> RetrieveRequest {
    RetrieveRequest {
        query: Some(query.into()),
        retrieval_mode: Some(mode.into()),
        ..Default::default()
    }
}

pub fn ids(result: &recollect::retrieval::assemble::RetrievalResult) -> Vec<String> {
    result.memories.iter().map(|m| m.record_id.clone()).collect()
}

// ── Test doubles ──────────────────────────────────────────────────────────────

/// Index that always fails.
pub struct FailingIndex;

impl VectorIndex for FailingIndex {
    fn search(&self, _: &[f32], _: &PartitionFilter, _: usize) -> anyhow::Result<Vec<(String, f64)>> {
        anyhow::bail!("vector index offline")
    }
}

impl LexicalIndex for FailingIndex {
    fn search(&self, _: &[String], _: &PartitionFilter, _: usize) -> anyhow::Result<Vec<(String, f64)>> {
        anyhow::bail!("lexical index offline")
    }
}

/// Wraps an index and sleeps before every call.
pub struct SlowIndex<I> {
    pub inner: Arc<I>,
    pub delay: Duration,
}

impl<I: VectorIndex> VectorIndex for SlowIndex<I> {
    fn search(&self, v: &[f32], f: &PartitionFilter, limit: usize) -> anyhow::Result<Vec<(String, f64)>> {
        std::thread::sleep(self.delay);
        VectorIndex::search(&*self.inner, v, f, limit)
    }
}

impl<I: LexicalIndex> LexicalIndex for SlowIndex<I> {
    fn search(&self, terms: &[String], f: &PartitionFilter, limit: usize) -> anyhow::Result<Vec<(String, f64)>> {
        std::thread::sleep(self.delay);
        LexicalIndex::search(&*self.inner, terms, f, limit)
    }
}

/// Embedder that sleeps before delegating.
pub struct SlowEmbedder<E> {
    pub inner: Arc<E>,
    pub delay: Duration,
}

impl<E: EmbeddingProvider> EmbeddingProvider for SlowEmbedder<E> {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        std::thread::sleep(self.delay);
        self.inner.embed(text)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Counts every collaborator call it receives.
#[derive(Default)]
pub struct CallCounter {
    pub embeds: AtomicUsize,
    pub vector: AtomicUsize,
    pub lexical: AtomicUsize,
    pub documents: AtomicUsize,
}

impl CallCounter {
    pub fn total(&self) -> usize {
        self.embeds.load(Ordering::SeqCst)
            + self.vector.load(Ordering::SeqCst)
            + self.lexical.load(Ordering::SeqCst)
            + self.documents.load(Ordering::SeqCst)
    }
}

pub struct Counting(pub Arc<CallCounter>);

impl EmbeddingProvider for Counting {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.0.embeds.fetch_add(1, Ordering::SeqCst);
        HashEmbedder.embed(text)
    }

    fn model_name(&self) -> &str {
        "counting"
    }
}

impl VectorIndex for Counting {
    fn search(&self, _: &[f32], _: &PartitionFilter, _: usize) -> anyhow::Result<Vec<(String, f64)>> {
        self.0.vector.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

impl LexicalIndex for Counting {
    fn search(&self, _: &[String], _: &PartitionFilter, _: usize) -> anyhow::Result<Vec<(String, f64)>> {
        self.0.lexical.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

impl DocumentStore for Counting {
    fn fetch_records(&self, _: &[String]) -> anyhow::Result<HashMap<String, MemoryRecord>> {
        self.0.documents.fetch_add(1, Ordering::SeqCst);
        Ok(HashMap::new())
    }
}

/// Retriever whose every collaborator is a [`Counting`] double.
pub fn counting_retriever(counter: &Arc<CallCounter>) -> Retriever {
    let counting = Arc::new(Counting(Arc::clone(counter)));
    Retriever::new(
        counting.clone(),
        counting.clone(),
        counting.clone(),
        counting,
        RetrievalConfig::default(),
    )
}
