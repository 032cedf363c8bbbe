//! Core retrieval type definitions.
//!
//! Defines the request enums ([`RetrievalMode`], [`DataSource`],
//! [`MemoryScope`]), storage [`Partition`]s, the intermediate ranking types
//! ([`CandidateHit`], [`FusedHit`]) and the enriched [`MemoryRecord`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How candidates are produced and ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Vector similarity only.
    Embedding,
    /// BM25 keyword relevance only.
    Bm25,
    /// Reciprocal Rank Fusion of both signals.
    Rrf,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Bm25 => "bm25",
            Self::Rrf => "rrf",
        }
    }

    /// `true` when the vector fetcher participates.
    pub fn uses_vector(&self) -> bool {
        matches!(self, Self::Embedding | Self::Rrf)
    }

    /// `true` when the lexical fetcher participates.
    pub fn uses_lexical(&self) -> bool {
        matches!(self, Self::Bm25 | Self::Rrf)
    }
}

impl std::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "embedding" => Ok(Self::Embedding),
            "bm25" => Ok(Self::Bm25),
            "rrf" => Ok(Self::Rrf),
            _ => Err(format!(
                "unknown retrieval_mode: {s}. Supported: embedding, bm25, rrf"
            )),
        }
    }
}

/// The memory collection a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Condensed episode summaries.
    #[serde(alias = "memcell")]
    Episode,
    /// Atomic facts from the raw event log.
    EventLog,
    /// Distilled semantic statements.
    #[serde(alias = "semantic_memory")]
    SemanticFact,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episode => "episode",
            Self::EventLog => "event_log",
            Self::SemanticFact => "semantic_fact",
        }
    }

    /// Sub-type label used when a record does not carry its own.
    pub fn sub_type(&self, partition: Partition) -> String {
        match partition {
            Partition::Group => self.as_str().to_string(),
            Partition::Personal => format!("personal_{}", self.as_str()),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episode" | "memcell" => Ok(Self::Episode),
            "event_log" => Ok(Self::EventLog),
            "semantic_fact" | "semantic_memory" => Ok(Self::SemanticFact),
            _ => Err(format!(
                "unknown data_source: {s}. Supported: episode, event_log, semantic_fact"
            )),
        }
    }
}

/// Which partitions of a data source are visible to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    All,
    Personal,
    Group,
}

impl MemoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Personal => "personal",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "personal" => Ok(Self::Personal),
            "group" => Ok(Self::Group),
            _ => Err(format!(
                "unknown memory_scope: {s}. Supported: all, personal, group"
            )),
        }
    }
}

/// A storage partition of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Records owned by a single user.
    Personal,
    /// Records shared within a group.
    Group,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(Self::Personal),
            "group" => Ok(Self::Group),
            _ => Err(format!("unknown partition: {s}")),
        }
    }
}

/// Which fetcher produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Vector,
    Lexical,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Lexical => "lexical",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a fetcher's ranked candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateHit {
    pub record_id: String,
    /// 1-based position within the producing list.
    pub source_rank: usize,
    /// Source-native score; not comparable across origins.
    pub raw_score: f64,
    pub origin: Origin,
}

/// A candidate after fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub record_id: String,
    pub fused_score: f64,
    pub origins: BTreeSet<Origin>,
    /// Best raw score seen per origin, kept for diagnostics.
    pub best_raw_scores: BTreeMap<Origin, f64>,
    /// Smallest source rank across contributing lists.
    pub min_rank: usize,
}

/// A stored memory, as returned by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub record_id: String,
    pub partition: Partition,
    pub data_source: DataSource,
    /// The searched and displayed text: episode narrative, atomic fact, or statement.
    pub display_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub memory_sub_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}
