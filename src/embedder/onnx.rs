/// ONNX Runtime embedder using the `ort` crate.
///
/// Runs a sentence-transformer model (default `all-MiniLM-L6-v2`), applies
/// mean pooling with the attention mask, and L2-normalizes the result.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::tokenizer::BertTokenizer;
use super::{Embedder, EmbedderError, l2_normalize};

/// ONNX-backed embedder implementing the `Embedder` trait.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: BertTokenizer,
    dimensions: usize,
    model_id: String,
}

/// Identity recorded in the index: truncation length changes the embeddings,
/// so it is part of the id.
pub fn onnx_model_id(model_name: &str, max_length: usize) -> String {
    format!("{model_name}@{max_length}")
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    ///
    /// `dimensions` must match the model's hidden size; a mismatch surfaces on
    /// the first `embed` call.
    pub fn new(
        model_dir: &Path,
        model_name: &str,
        dimensions: usize,
        max_length: usize,
    ) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime for {model_name}...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        let tokenizer = BertTokenizer::from_model_dir(model_dir, max_length)
            .map_err(|e| EmbedderError::TokenizerError(format!("{e:#}")))?;

        info!(
            "Embedding model {model_name} ready (vocab size: {}, max tokens: {})",
            tokenizer.vocab_size(),
            tokenizer.max_length()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
            model_id: onnx_model_id(model_name, max_length),
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let tokens = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| EmbedderError::TokenizerError(format!("{e:#}")))?;

        let seq_len = tokens.input_ids.len();

        // (shape, data) tuples keep us off ort's ndarray version
        let input_ids_val = Tensor::from_array(([1usize, seq_len], tokens.input_ids))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask_val =
            Tensor::from_array(([1usize, seq_len], tokens.attention_mask.clone())).map_err(
                |e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")),
            )?;
        let token_type_ids_val = Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_val,
                "attention_mask" => attention_mask_val,
                "token_type_ids" => token_type_ids_val,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // Output shape: [1, seq_len, hidden_size]
        let (_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        if hidden_data.len() != seq_len * self.dimensions {
            return Err(EmbedderError::InferenceFailed(format!(
                "model output has {} values, expected {seq_len} x {} (check model.dimensions)",
                hidden_data.len(),
                self.dimensions
            )));
        }

        let mut embedding = mean_pooling(
            hidden_data,
            &tokens.attention_mask,
            seq_len,
            self.dimensions,
        );
        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Mean pooling over hidden states weighted by attention mask.
///
/// `hidden_data` is a flat array with shape `[1, seq_len, hidden_size]`.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum: f32 = 0.0;

    for (t, &mask) in attention_mask.iter().enumerate().take(seq_len) {
        let mask = mask as f32;
        mask_sum += mask;

        let row = &hidden_data[t * hidden_size..(t + 1) * hidden_size];
        for (acc, h) in result.iter_mut().zip(row) {
            *acc += h * mask;
        }
    }

    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }

    result
}
