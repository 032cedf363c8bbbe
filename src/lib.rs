//! Hybrid retrieval for conversational-agent memory.
//!
//! recollect answers "which stored memories matter for this query?" over three
//! memory collections (episodes, event-log facts, semantic facts), each split
//! into a personal and a group partition. A query is scored by dense vector
//! similarity, by BM25 keyword relevance, or by both fused with Reciprocal
//! Rank Fusion.
//!
//! # Architecture
//!
//! - **Retrieval core** ([`retrieval`]): normalize → scope → concurrent
//!   vector/lexical fetch → fuse → dedup, truncate and enrich
//! - **Storage** ([`db`], [`store`]): SQLite with FTS5 for BM25 and
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec) for cosine similarity
//! - **Embeddings** ([`embedding`]): local ONNX Runtime, all-MiniLM-L6-v2 (384 dimensions)
//! - **Surfaces**: HTTP JSON ([`http`]) and an MCP tool over stdio ([`tools`], [`server`])
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`error`]: the [`RetrievalError`](error::RetrievalError) taxonomy

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod http;
pub mod retrieval;
pub mod server;
pub mod store;
pub mod tools;
