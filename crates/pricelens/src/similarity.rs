//! Vector similarity for catalog matching.

use std::cmp::Ordering;

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Dense product × observation similarity matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    /// Pairwise cosine similarity of every row vector against every column vector.
    pub fn compute(row_vectors: &[Vec<f32>], col_vectors: &[Vec<f32>]) -> Self {
        let rows = row_vectors.len();
        let cols = col_vectors.len();
        let mut data = Vec::with_capacity(rows * cols);
        for r in row_vectors {
            for c in col_vectors {
                data.push(cosine_similarity(r, c));
            }
        }
        Self { rows, cols, data }
    }

    /// Build from precomputed scores. Returns `None` when the shape is wrong.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Option<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != n_cols) {
            return None;
        }
        Some(Self {
            rows: n_rows,
            cols: n_cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    /// Row with the highest score in `col`; ties go to the lowest row.
    pub fn argmax_column(&self, col: usize) -> Option<(usize, f32)> {
        self.ranked_column(col).into_iter().next()
    }

    /// Rows of `col` ordered by descending score, ties by ascending row.
    pub fn ranked_column(&self, col: usize) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = (0..self.rows).map(|r| (r, self.get(r, col))).collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked
    }
}
