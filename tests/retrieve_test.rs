mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use helpers::*;
use recollect::config::RetrievalConfig;
use recollect::embedding::EmbeddingProvider;
use recollect::retrieval::backend::{LexicalIndex, VectorIndex};
use recollect::retrieval::lexical::tokenize;
use recollect::retrieval::normalize::RetrieveRequest;
use recollect::retrieval::scope;
use recollect::retrieval::types::{DataSource, Partition, RetrievalMode};
use recollect::store::SqliteStore;

fn seeded_store() -> Arc<SqliteStore> {
    let store = test_store();
    seed(
        &store,
        &[
            record("ep-g1", DataSource::Episode, Partition::Group, "Team dinner in Beijing, roast duck everywhere", 5),
            record("ep-g2", DataSource::Episode, Partition::Group, "Quarterly planning meeting notes", 10),
            record("ep-p1", DataSource::Episode, Partition::Personal, "I want to visit Beijing again next spring", 2),
            record("ep-p2", DataSource::Episode, Partition::Personal, "Gym schedule on weekdays", 1),
            record("ep-old", DataSource::Episode, Partition::Group, "Beijing trip photos from years ago", 800),
            record("ev-p1", DataSource::EventLog, Partition::Personal, "Booked flight to Beijing", 3),
            record("sf-g1", DataSource::SemanticFact, Partition::Group, "The team prefers Sichuan food", 4),
        ],
    );
    store
}

fn as_set(ids: Vec<String>) -> HashSet<String> {
    ids.into_iter().collect()
}

#[tokio::test]
async fn rrf_ranks_records_found_by_both_signals_first() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());
    let result = retriever.retrieve(&request("beijing", "rrf")).await.unwrap();

    let ids = ids(&result);
    assert_eq!(ids.len(), 4);
    assert_eq!(
        as_set(ids[..2].to_vec()),
        as_set(vec!["ep-g1".into(), "ep-p1".into()])
    );
    assert!(!ids.contains(&"ep-old".to_string()), "outside the default time range");
    assert!(!ids.contains(&"ev-p1".to_string()), "different data source");

    let meta = &result.metadata;
    assert_eq!(meta.retrieval_mode, RetrievalMode::Rrf);
    assert_eq!(meta.embedding_candidates, 4);
    assert_eq!(meta.bm25_candidates, 2);
    assert_eq!(meta.final_count, 4);
    assert!(!meta.degraded);
    assert!(meta.total_latency_ms >= 0.0);
}

#[tokio::test]
async fn result_count_never_exceeds_top_k() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());
    let mut req = request("beijing", "rrf");
    req.top_k = Some(2);

    let result = retriever.retrieve(&req).await.unwrap();
    assert_eq!(result.count, 2);
    assert_eq!(result.memories.len(), 2);
    assert_eq!(result.metadata.final_count, 2);
}

#[tokio::test]
async fn returned_record_ids_are_unique() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());
    for mode in ["embedding", "bm25", "rrf"] {
        let result = retriever.retrieve(&request("beijing duck team", mode)).await.unwrap();
        let ids = ids(&result);
        assert_eq!(as_set(ids.clone()).len(), ids.len(), "duplicates in {mode}");
    }
}

#[tokio::test]
async fn all_scope_is_union_of_personal_and_group() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());
    let scoped = |scope: &str| RetrieveRequest {
        memory_scope: Some(scope.into()),
        top_k: Some(50),
        ..request("beijing gym planning duck", "rrf")
    };

    let all = as_set(ids(&retriever.retrieve(&scoped("all")).await.unwrap()));
    let personal = as_set(ids(&retriever.retrieve(&scoped("personal")).await.unwrap()));
    let group = as_set(ids(&retriever.retrieve(&scoped("group")).await.unwrap()));

    assert_eq!(personal, as_set(vec!["ep-p1".into(), "ep-p2".into()]));
    assert_eq!(group, as_set(vec!["ep-g1".into(), "ep-g2".into()]));
    assert_eq!(all, personal.union(&group).cloned().collect());
}

#[tokio::test]
async fn time_range_filters_old_records() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());

    let mut req = request("beijing", "bm25");
    req.time_range_days = Some(1000);
    let wide = ids(&retriever.retrieve(&req).await.unwrap());
    assert!(wide.contains(&"ep-old".to_string()));

    req.time_range_days = Some(30);
    let result = retriever.retrieve(&req).await.unwrap();
    let cutoff = Utc::now() - Duration::days(30);
    assert!(!ids(&result).contains(&"ep-old".to_string()));
    assert!(result.memories.iter().all(|m| m.timestamp >= cutoff));
}

#[tokio::test]
async fn bm25_mode_preserves_lexical_order() {
    let store = seeded_store();
    let retriever = sqlite_retriever(store.clone(), RetrievalConfig::default());
    let result = retriever.retrieve(&request("beijing duck", "bm25")).await.unwrap();

    let filter = scope::resolve("episode", "all", None, None, 365, Utc::now()).unwrap();
    let direct = LexicalIndex::search(&*store, &tokenize("beijing duck"), &filter, 60).unwrap();

    let direct_ids: Vec<String> = direct.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids(&result), direct_ids);
    for (memory, (_, raw)) in result.memories.iter().zip(&direct) {
        assert!((memory.score - raw).abs() < 1e-9);
    }
    assert_eq!(result.metadata.embedding_candidates, 0);
}

#[tokio::test]
async fn embedding_mode_preserves_vector_order() {
    let store = seeded_store();
    let retriever = sqlite_retriever(store.clone(), RetrievalConfig::default());
    let result = retriever.retrieve(&request("roast duck dinner", "embedding")).await.unwrap();

    let filter = scope::resolve("episode", "all", None, None, 365, Utc::now()).unwrap();
    let query = HashEmbedder.embed("roast duck dinner").unwrap();
    let direct = VectorIndex::search(&*store, &query, &filter, 60).unwrap();

    let direct_ids: Vec<String> = direct.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids(&result), direct_ids);
    assert_eq!(ids(&result)[0], "ep-g1");
    assert_eq!(result.metadata.bm25_candidates, 0);
}

#[tokio::test]
async fn data_sources_are_isolated() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());

    let mut req = request("beijing", "rrf");
    req.data_source = Some("event_log".into());
    assert_eq!(ids(&retriever.retrieve(&req).await.unwrap()), vec!["ev-p1"]);

    req.data_source = Some("semantic_memory".into());
    let facts = retriever.retrieve(&req).await.unwrap();
    assert_eq!(ids(&facts), vec!["sf-g1"]);
    assert_eq!(facts.memories[0].memory_sub_type, "semantic_fact");
}

#[tokio::test]
async fn user_constraint_only_narrows_personal_rows() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());
    let mut req = request("beijing", "rrf");
    req.user_id = Some("someone_else".into());

    let ids = as_set(ids(&retriever.retrieve(&req).await.unwrap()));
    assert_eq!(ids, as_set(vec!["ep-g1".into(), "ep-g2".into()]));
}

#[tokio::test]
async fn cjk_queries_match_per_character() {
    let store = test_store();
    seed(
        &store,
        &[
            record("zh-1", DataSource::Episode, Partition::Group, "周末在北京吃了烤鸭", 1),
            record("zh-2", DataSource::Episode, Partition::Group, "上海的天气很好", 1),
        ],
    );
    let retriever = sqlite_retriever(store, RetrievalConfig::default());
    let result = retriever.retrieve(&request("北京烤鸭", "bm25")).await.unwrap();
    assert_eq!(ids(&result), vec!["zh-1"]);
}

#[tokio::test]
async fn enrichment_carries_record_fields() {
    let retriever = sqlite_retriever(seeded_store(), RetrievalConfig::default());
    let mut req = request("gym", "bm25");
    req.memory_scope = Some("personal".into());

    let result = retriever.retrieve(&req).await.unwrap();
    let gym = &result.memories[0];
    assert_eq!(gym.record_id, "ep-p2");
    assert_eq!(gym.display_text, "Gym schedule on weekdays");
    assert_eq!(gym.memory_sub_type, "personal_episode");
    assert_eq!(gym.user_id.as_deref(), Some("user_001"));
}
