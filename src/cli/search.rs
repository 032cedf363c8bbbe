use anyhow::Result;

use recollect::config::RecollectConfig;
use recollect::retrieval::normalize::RetrieveRequest;
use recollect::server::build_retriever;

/// Run one retrieval and print the ranked memories.
pub async fn search(config: &RecollectConfig, request: RetrieveRequest) -> Result<()> {
    let retriever = build_retriever(config)?;
    let result = retriever.retrieve(&request).await?;

    if result.memories.is_empty() {
        println!("No memories found.");
        return Ok(());
    }

    let meta = &result.metadata;
    println!(
        "Found {} memories ({} mode, {} vector / {} bm25 candidates, {:.1} ms)",
        result.count,
        meta.retrieval_mode,
        meta.embedding_candidates,
        meta.bm25_candidates,
        meta.total_latency_ms
    );
    if let Some(origin) = meta.failed_origin {
        println!("WARNING: {origin} fetch failed, results are single-source");
    }
    println!();

    for (i, memory) in result.memories.iter().enumerate() {
        println!(
            "  {}. [{}] {} (score: {:.4}, {})",
            i + 1,
            memory.memory_sub_type,
            memory.record_id,
            memory.score,
            memory.timestamp.format("%Y-%m-%d %H:%M"),
        );
        if let Some(subject) = &memory.subject {
            println!("     {subject}");
        }
        println!("     {}", preview(&memory.display_text, 120));
        println!();
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_on_char_boundaries() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("北京烤鸭很好吃", 2), "北京...");
    }
}
