//! Text embedding backends for catalog matching.
//!
//! [`HashingEmbedder`] is always available and needs no model files. With the
//! `onnx` feature, [`OnnxEmbedder`] runs a sentence-transformers model.

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

use crate::types::EmbeddingError;
use std::hash::Hasher;

/// Default dimensionality of the hashing embedder.
pub const HASHING_DIM: usize = 512;

/// Turns texts into fixed-length vectors. Must be deterministic.
pub trait TextEmbedder: Send {
    /// Length of every produced vector.
    fn dim(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.embed_batch(&[text])?;
        if out.len() != 1 {
            return Err(EmbeddingError::BatchSize {
                expected: 1,
                got: out.len(),
            });
        }
        Ok(out.remove(0))
    }

    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Feature-hashing bag of words and bigrams, L2-normalized.
///
/// Texts sharing vocabulary get a high cosine similarity. Repeating a word
/// raises its weight, which is how product names dominate the embedding
/// text.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write(feature.as_bytes());
        let h = hasher.finish();
        let index = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        for token in &tokens {
            let (i, s) = self.bucket(token);
            v[i] += s;
        }
        for pair in tokens.windows(2) {
            let (i, s) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            v[i] += 0.5 * s;
        }

        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIM)
    }
}

impl TextEmbedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}

/// L2-normalize a vector in place.
pub(crate) fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[test]
    fn test_hashing_is_deterministic() {
        let mut a = HashingEmbedder::default();
        let mut b = HashingEmbedder::default();
        assert_eq!(a.embed("red kettle 2L").unwrap(), b.embed("red kettle 2L").unwrap());
    }

    #[test]
    fn test_hashing_unit_length() {
        let mut e = HashingEmbedder::default();
        let v = e.embed("samsung galaxy a15").unwrap();
        assert_eq!(v.len(), HASHING_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_empty_text_is_zero() {
        let mut e = HashingEmbedder::new(16);
        assert!(e.embed("  ,, ").unwrap().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let mut e = HashingEmbedder::default();
        let vs = e
            .embed_batch(&[
                "iphone 15 pro max 256gb",
                "apple iphone 15 pro max 256 gb titane",
                "bosch washing machine 8kg",
            ])
            .unwrap();
        assert_eq!(vs.len(), 3);
        assert!(cosine_similarity(&vs[0], &vs[1]) > cosine_similarity(&vs[0], &vs[2]));
    }
}
