//! Query and record embedding.
//!
//! The vector fetcher only needs [`EmbeddingProvider::embed`]; the importer
//! uses [`EmbeddingProvider::embed_batch`]. Vectors are L2-normalized, so the
//! vector index can rank by cosine similarity.

pub mod local;

use anyhow::Result;

use crate::config::EmbeddingConfig;

/// Dimensionality of stored and query vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Synchronous text embedder. Async callers go through `spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Identifier recorded in the database next to the vectors it produced.
    fn model_name(&self) -> &str;
}

/// Build the provider named in `config.provider`.
///
/// Only `"local"` exists today; it fails if the model files have not been
/// fetched with `recollect model download`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::LocalEmbeddingProvider::new(config)?)),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// Scale `v` to unit length; a zero vector is returned unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_left_alone() {
        let mut v = vec![0.0; 3];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 3]);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "remote".into(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));
    }
}
