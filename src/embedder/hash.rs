/// Feature-hashing embedder.
///
/// Each lowercase word token is hashed with FNV-1a into one of `dimensions`
/// buckets with a hash-derived sign, and the resulting bag-of-words vector is
/// L2-normalized. Purely lexical, but deterministic and needs no model files,
/// which makes it the offline fallback and the provider used in tests.
use super::{Embedder, EmbedderError, l2_normalize};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub struct HashEmbedder {
    dimensions: usize,
    model_id: String,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_id: format!("fnv1a-{dimensions}"),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if self.dimensions == 0 {
            return Err(EmbedderError::ModelLoadFailed(
                "hash embedder needs at least one dimension".to_string(),
            ));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }
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

/// Lowercase word tokens. Snake-case identifiers are emitted whole and then
/// once per part, so `campaign_id` also matches a query for "campaign".
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        if word.contains('_') {
            tokens.extend(
                word.split('_')
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );
        }
        if !word.chars().all(|c| c == '_') {
            tokens.push(word);
        }
    }
    tokens
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
