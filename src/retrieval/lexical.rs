//! Lexical candidate fetcher and the query/index tokenizer.
//!
//! The same [`tokenize`] is used when records are written to the inverted
//! index and when queries are turned into terms, so both sides agree on what
//! a term is.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::RetrievalError;
use crate::retrieval::backend::LexicalIndex;
use crate::retrieval::fetch::{call_with_retry, rank, FetchBudget};
use crate::retrieval::scope::PartitionFilter;
use crate::retrieval::types::{CandidateHit, Origin};

#[derive(Clone)]
pub struct LexicalFetcher {
    index: Arc<dyn LexicalIndex>,
}

impl LexicalFetcher {
    pub fn new(index: Arc<dyn LexicalIndex>) -> Self {
        Self { index }
    }

    /// Ranked BM25 candidates for `query`.
    ///
    /// A query without any usable term yields an empty list; the index is not called.
    pub async fn fetch(
        &self,
        query: String,
        filter: Arc<PartitionFilter>,
        pool: usize,
        budget: FetchBudget,
    ) -> Result<Vec<CandidateHit>, RetrievalError> {
        let terms = tokenize(&query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let index = Arc::clone(&self.index);
        let raw = call_with_retry(Origin::Lexical, budget, move || {
            index.search(&terms, &filter, pool)
        })
        .await?;

        let hits = rank(Origin::Lexical, raw, pool);
        tracing::debug!(candidates = hits.len(), "lexical fetch complete");
        Ok(hits)
    }
}

/// Split text into lower-cased, de-duplicated terms.
///
/// Runs of alphanumeric characters form one term. CJK ideographs, kana and
/// hangul syllables are unsegmented in running text, so each one is its own term.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut seen = HashSet::new();
    let mut current = String::new();

    for c in text.chars() {
        if is_cjk(c) {
            flush(&mut current, &mut seen, &mut terms);
            push_term(c.to_string(), &mut seen, &mut terms);
        } else if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else {
            flush(&mut current, &mut seen, &mut terms);
        }
    }
    flush(&mut current, &mut seen, &mut terms);

    terms
}

fn flush(current: &mut String, seen: &mut HashSet<String>, terms: &mut Vec<String>) {
    if !current.is_empty() {
        push_term(std::mem::take(current), seen, terms);
    }
}

fn push_term(term: String, seen: &mut HashSet<String>, terms: &mut Vec<String>) {
    if seen.insert(term.clone()) {
        terms.push(term);
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'   // hiragana, katakana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}' // hangul syllables
        | '\u{F900}'..='\u{FAFF}' // CJK compatibility ideographs
    )
}
