/// BERT tokenizer wrapper around HuggingFace `tokenizers` crate.
///
/// Produces token ids and attention masks for the ONNX embedder, truncating
/// long table texts to the model's sequence limit.
use std::path::Path;

use anyhow::Result;
use tokenizers::Tokenizer;

pub struct BertTokenizer {
    inner: Tokenizer,
    max_length: usize,
}

/// Output of a tokenization operation.
#[derive(Debug, Clone)]
pub struct TokenizerOutput {
    /// Token IDs (input_ids for the model).
    pub input_ids: Vec<i64>,
    /// Attention mask (1 for real tokens, 0 for padding).
    pub attention_mask: Vec<i64>,
}

impl BertTokenizer {
    /// Load `tokenizer.json` from the model directory.
    pub fn from_model_dir(model_dir: &Path, max_length: usize) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {}",
            model_dir.display()
        );
        anyhow::ensure!(max_length > 2, "max_length must leave room for special tokens");

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        inner
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to configure truncation: {e}"))?;

        // Single-text encoding; padding only matters if batches are encoded together
        inner.with_padding(None);

        Ok(Self { inner, max_length })
    }

    /// Tokenize a single text, returning input IDs and attention mask.
    pub fn tokenize(&self, text: &str) -> Result<TokenizerOutput> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("failed to encode text: {e}"))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        Ok(TokenizerOutput {
            input_ids,
            attention_mask,
        })
    }

    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run with: cargo test tokenizer -- --ignored
    #[test]
    #[ignore]
    fn test_tokenize_with_real_model() {
        let model_dir = Path::new("models/all-MiniLM-L6-v2");
        if !model_dir.join("tokenizer.json").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir, 256).unwrap();
        let output = tokenizer.tokenize("campaign_id budget").unwrap();

        assert_eq!(output.input_ids.len(), output.attention_mask.len());
        // CLS and SEP
        assert!(output.input_ids.len() >= 3);

        let long = "column ".repeat(1000);
        let output = tokenizer.tokenize(&long).unwrap();
        assert_eq!(output.input_ids.len(), 256);
    }

    #[test]
    fn test_tokenizer_missing_file() {
        let result = BertTokenizer::from_model_dir(Path::new("/nonexistent/path"), 256);
        assert!(result.is_err());
    }
}
