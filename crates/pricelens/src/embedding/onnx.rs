//! Sentence-transformers embeddings via ONNX Runtime.
//!
//! Mean-pooled, L2-normalized output of a MiniLM-style model. The model
//! directory must contain `model.onnx` and `tokenizer.json`.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{normalize, TextEmbedder};
use crate::types::EmbeddingError;

const MAX_TOKENS: usize = 256;
const FALLBACK_DIM: usize = 384;

pub struct OnnxEmbedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

fn model_err(context: &str, e: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::Model(format!("{context}: {e}"))
}

impl OnnxEmbedder {
    /// Load a model from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> Result<Self, EmbeddingError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(EmbeddingError::Model(format!(
                    "{} not found",
                    path.display()
                )));
            }
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| model_err("load ONNX model", e))?;

        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(FALLBACK_DIM);

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| model_err("load tokenizer", e))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| model_err("set truncation", e))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        tracing::info!(dim, model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            session,
            tokenizer,
            dim,
        })
    }
}

impl TextEmbedder for OnnxEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| model_err("tokenize", e))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))
            .map_err(|e| model_err("input tensor", e))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))
            .map_err(|e| model_err("mask tensor", e))?;
        let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
            .map_err(|e| model_err("type tensor", e))?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
            .map_err(|e| model_err("ONNX inference", e))?;

        // [batch_size, seq_len, dim]
        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| model_err("extract output", e))?;
        let dims: &[i64] = output_shape;
        if dims.len() != 3 || dims[0] as usize != batch_size || dims[2] as usize != self.dim {
            return Err(EmbeddingError::Model(format!(
                "unexpected output shape {dims:?}, expected [{batch_size}, {seq_len}, {}]",
                self.dim
            )));
        }
        let actual_seq_len = dims[1] as usize;

        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.dim];
            let mut token_count = 0.0f32;
            for j in 0..actual_seq_len.min(seq_len) {
                let mask_val = attention_mask[i * seq_len + j] as f32;
                if mask_val > 0.0 {
                    let offset = (i * actual_seq_len + j) * self.dim;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += output_data[offset + d] * mask_val;
                    }
                    token_count += mask_val;
                }
            }
            if token_count > 0.0 {
                for p in &mut pooled {
                    *p /= token_count;
                }
            }
            normalize(&mut pooled);
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
