/// Mock embedder for tests.
///
/// Hashes the whole input, so only identical texts produce identical
/// vectors. Use [`super::hash::HashEmbedder`] when tests need lexical overlap
/// to translate into similarity.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError, l2_normalize};

pub struct MockEmbedder {
    dimensions: usize,
    model_id: String,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_id: format!("mock-{dimensions}"),
        }
    }

    /// Override the reported model identity, e.g. to simulate a model swap.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        // Signed components so unrelated texts can land on either side of zero
        let mut embedding: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let b = bytes[i % 8].rotate_left((i / 8) as u32 % 8);
                f32::from(b) / 127.5 - 1.0
            })
            .collect();
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

/// Embedder that always fails; exercises provider-failure paths.
pub struct FailingEmbedder {
    pub dimensions: usize,
    /// Only texts containing this fragment fail; `None` fails everything.
    pub fail_on: Option<String>,
}

impl Embedder for FailingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        match &self.fail_on {
            Some(fragment) if !text.contains(fragment.as_str()) => {
                let mut v = vec![1.0; self.dimensions];
                l2_normalize(&mut v);
                Ok(v)
            }
            _ => Err(EmbedderError::InferenceFailed(
                "provider unavailable".to_string(),
            )),
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_embed_dimensions() {
        let embedder = MockEmbedder::new(384);
        let result = embedder.embed("hello world").unwrap();
        assert_eq!(result.len(), 384);
    }

    #[test]
    fn test_mock_embed_deterministic() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed("hello").unwrap();
        let b = embedder.embed("hello").unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[test]
    fn test_mock_embed_different_inputs() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed("hello").unwrap();
        let b = embedder.embed("world").unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[test]
    fn test_mock_embed_normalized() {
        let embedder = MockEmbedder::new(384);
        let vec = embedder.embed("test normalization").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "vector should be approximately unit length, got {norm}"
        );
    }

    #[test]
    fn test_mock_model_id() {
        assert_eq!(MockEmbedder::new(16).model_id(), "mock-16");
        let swapped = MockEmbedder::new(16).with_model_id("other-model");
        assert_eq!(swapped.model_id(), "other-model");
    }

    #[test]
    fn test_failing_embedder_selective() {
        let embedder = FailingEmbedder {
            dimensions: 4,
            fail_on: Some("broken".into()),
        };
        assert!(embedder.embed("fine text").is_ok());
        assert!(embedder.embed("a broken table").is_err());
    }
}
