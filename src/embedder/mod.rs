/// Embedder trait and shared types for text embedding.
///
/// A provider is constructed once (see [`build_embedder`]) and handed to the
/// index builder and the search engine explicitly.
pub mod download;
pub mod hash;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use thiserror::Error;
use tracing::info;

use crate::config::{ModelConfig, ProviderKind};

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` so index builds can fan out
/// across threads and the provider can be shared behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;

    /// Identity of the underlying model. Indexes built with one identity are
    /// never served to a provider with another.
    fn model_id(&self) -> &str;
}

/// Construct the provider selected by the model configuration.
pub fn build_embedder(model: &ModelConfig) -> Result<Box<dyn Embedder>, EmbedderError> {
    match model.provider {
        ProviderKind::Hash => {
            info!("Using hash embedder ({} dims)", model.dimensions);
            Ok(Box::new(hash::HashEmbedder::new(model.dimensions)))
        }
        ProviderKind::Onnx => {
            let model_dir = model.model_dir.join(&model.name);
            download::download_model_files(&model_dir, &model.repo)
                .map_err(|e| EmbedderError::ModelLoadFailed(format!("{e:#}")))?;
            let embedder = onnx::OnnxEmbedder::new(
                &model_dir,
                &model.name,
                model.dimensions,
                model.max_length,
            )?;
            Ok(Box::new(embedder))
        }
    }
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub(crate) fn l2_normalize(vec: &mut [f32]) {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq > 0.0 {
        let inv = 1.0 / norm_sq.sqrt();
        for v in vec.iter_mut() {
            *v *= inv;
        }
    }
}
