//! ONNX Runtime embedder for all-MiniLM-L6-v2.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};
use crate::config::{expand_tilde, EmbeddingConfig};

/// Longest token sequence fed to the model.
const MAX_TOKENS: usize = 256;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model: String,
}

// Session is only touched through the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dir = expand_tilde(&config.cache_dir);
        let model_path = require_file(&dir, MODEL_FILE)?;
        let tokenizer_path = require_file(&dir, TOKENIZER_FILE)?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to configure truncation: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(model = %config.model, dir = %dir.display(), "embedding model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model: config.model.clone(),
        })
    }

    /// Token embeddings for a padded batch, flattened as `[batch, seq, dim]`.
    fn infer(&self, encodings: &[Encoding]) -> Result<(usize, Vec<f32>)> {
        let batch = encodings.len();
        let seq = encodings.first().map_or(0, |e| e.get_ids().len());
        let shape = vec![batch as i64, seq as i64];

        let column = |f: fn(&Encoding) -> &[u32]| -> Vec<i64> {
            encodings
                .iter()
                .flat_map(|e| f(e).iter().map(|&v| i64::from(v)))
                .collect()
        };
        let ids = Tensor::from_array((shape.clone(), column(Encoding::get_ids).into_boxed_slice()))?;
        let mask = Tensor::from_array((
            shape.clone(),
            column(Encoding::get_attention_mask).into_boxed_slice(),
        ))?;
        let segments = Tensor::from_array((shape, vec![0i64; batch * seq].into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("embedding session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => ids,
            "attention_mask" => mask,
            "token_type_ids" => segments,
        })?;

        let hidden = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .unwrap_or_else(|| &outputs[0]);
        let (shape, data) = hidden
            .try_extract_tensor::<f32>()
            .context("failed to read model output")?;
        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected model output shape {dims:?}"
        );
        Ok((dims[1] as usize, data.to_vec()))
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("embedding batch returned no vector")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let (seq, hidden) = self.infer(&encodings)?;
        Ok(encodings
            .iter()
            .enumerate()
            .map(|(b, encoding)| {
                let rows = &hidden[b * seq * EMBEDDING_DIM..(b + 1) * seq * EMBEDDING_DIM];
                let mut pooled = mean_pool(rows, encoding.get_attention_mask());
                l2_normalize(&mut pooled);
                pooled
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Average the token rows whose attention mask is set.
fn mean_pool(rows: &[f32], mask: &[u32]) -> Vec<f32> {
    let mut pooled = vec![0.0f32; EMBEDDING_DIM];
    let mut count = 0usize;
    for (row, _) in rows
        .chunks_exact(EMBEDDING_DIM)
        .zip(mask)
        .filter(|&(_, &m)| m > 0)
    {
        pooled.iter_mut().zip(row).for_each(|(acc, x)| *acc += x);
        count += 1;
    }
    if count > 0 {
        pooled.iter_mut().for_each(|x| *x /= count as f32);
    }
    pooled
}

fn require_file(dir: &Path, name: &str) -> Result<std::path::PathBuf> {
    let path = dir.join(name);
    anyhow::ensure!(
        path.exists(),
        "{} not found. Run `recollect model download` first.",
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_ignores_padding() {
        let mut rows = vec![1.0f32; EMBEDDING_DIM];
        rows.extend(vec![3.0f32; EMBEDDING_DIM]);
        rows.extend(vec![100.0f32; EMBEDDING_DIM]);
        let pooled = mean_pool(&rows, &[1, 1, 0]);
        assert!(pooled.iter().all(|&x| (x - 2.0).abs() < 1e-6));
    }

    #[test]
    fn mean_pool_of_fully_masked_is_zero() {
        let rows = vec![5.0f32; EMBEDDING_DIM];
        assert!(mean_pool(&rows, &[0]).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn missing_model_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            cache_dir: dir.path().to_string_lossy().into_owned(),
            ..EmbeddingConfig::default()
        };
        let err = LocalEmbeddingProvider::new(&config).err().unwrap();
        assert!(err.to_string().contains("recollect model download"));
    }

    #[test]
    #[ignore] // needs model files: cargo test -- --ignored
    fn similar_sentences_are_close() {
        let provider = LocalEmbeddingProvider::new(&EmbeddingConfig::default()).unwrap();
        let a = provider.embed("We flew to Beijing for the food tour").unwrap();
        let b = provider.embed("Trip to Beijing to try local dishes").unwrap();
        let c = provider.embed("Quarterly tax filing deadline").unwrap();
        let dot = |x: &[f32], y: &[f32]| x.iter().zip(y).map(|(p, q)| p * q).sum::<f32>();
        assert_eq!(a.len(), EMBEDDING_DIM);
        assert!(dot(&a, &b) > dot(&a, &c));
    }
}
