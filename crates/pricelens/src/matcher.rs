//! Catalog matching: pair each competitor observation with at most one
//! catalog product.
//!
//! A run embeds both sides, builds the cosine matrix, resolves conflicts so
//! no product is claimed twice, then hands the plan to a [`CatalogStore`]
//! which persists it in one transaction.

use crate::embedding::TextEmbedder;
use crate::similarity::SimilarityMatrix;
use crate::types::{Assignment, CatalogProduct, EmbeddingError, PriceObservation, StoreError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("non-word pattern is valid"));

/// Times the name is repeated in the embedding text.
const NAME_WEIGHT: usize = 3;

/// Read and write access to one catalog backend.
pub trait CatalogStore {
    /// Catalog products of a target group.
    fn target_products(&self, target_id: i64) -> Result<Vec<CatalogProduct>, StoreError>;

    /// Price history of every competitor linked to a target group.
    fn competitor_observations(&self, target_id: i64)
        -> Result<Vec<PriceObservation>, StoreError>;

    /// Persist a plan atomically: upsert its assignments and drop stale
    /// relations for the plan's observations. Returns the rows written.
    fn replace_assignments(&mut self, plan: &MatchPlan) -> Result<usize, StoreError>;
}

/// The outcome of matching, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPlan {
    pub target_id: i64,
    pub assignments: Vec<Assignment>,
    /// Observations left without a product once every product was claimed.
    pub unmatched: Vec<i64>,
    /// Every observation considered by the run.
    pub observation_ids: Vec<i64>,
}

impl MatchPlan {
    pub fn is_empty(&self) -> bool {
        self.observation_ids.is_empty()
    }
}

/// Summary of a persisted matching run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub target_id: i64,
    pub assignments_written: usize,
    pub assignments: Vec<Assignment>,
    pub unmatched: Vec<i64>,
}

#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    #[error("failed to load catalog data: {0}")]
    Store(#[source] StoreError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The plan is kept so the caller can retry [`commit`].
    #[error("failed to persist assignments: {source}")]
    Persistence {
        plan: Box<MatchPlan>,
        source: StoreError,
    },
}

/// Lowercase and replace every non-word, non-space character with a space.
pub fn clean_text(text: &str) -> String {
    NON_WORD.replace_all(&text.to_lowercase(), " ").into_owned()
}

/// `name ×3 + description + price`, the text both sides are embedded from.
pub fn embedding_text(name: &str, description: &str, price: &str) -> String {
    let name = clean_text(name);
    let mut parts = vec![name.as_str(); NAME_WEIGHT];
    let description = clean_text(description);
    parts.push(&description);
    parts.push(price);
    parts.join(" ")
}

/// Conflict-free assignment of columns (observations) to rows (products).
///
/// Observations are served in descending order of their best score, ties by
/// column index. Each takes its highest-scoring unclaimed product; when none
/// is left it gets `None`.
pub fn assign(matrix: &SimilarityMatrix) -> Vec<Option<(usize, f32)>> {
    let mut order: Vec<(usize, f32)> = (0..matrix.cols())
        .filter_map(|c| matrix.argmax_column(c).map(|(_, s)| (c, s)))
        .collect();
    order.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut result = vec![None; matrix.cols()];
    let mut claimed = HashSet::new();
    for (col, _) in order {
        result[col] = matrix
            .ranked_column(col)
            .into_iter()
            .find(|(row, _)| !claimed.contains(row));
        if let Some((row, _)) = result[col] {
            claimed.insert(row);
        }
    }
    result
}

/// Matching engine over a borrowed embedding backend.
pub struct CatalogMatcher<'e> {
    embedder: &'e mut dyn TextEmbedder,
}

impl<'e> CatalogMatcher<'e> {
    pub fn new(embedder: &'e mut dyn TextEmbedder) -> Self {
        Self { embedder }
    }

    /// Compute assignments without touching storage.
    pub fn plan(
        &mut self,
        target_id: i64,
        products: &[CatalogProduct],
        observations: &[PriceObservation],
    ) -> Result<MatchPlan, MatchError> {
        if products.is_empty() || observations.is_empty() {
            tracing::info!(
                target_id,
                products = products.len(),
                observations = observations.len(),
                "nothing to match"
            );
            return Ok(MatchPlan {
                target_id,
                ..Default::default()
            });
        }

        let product_texts: Vec<String> = products
            .iter()
            .map(|p| embedding_text(&p.name, &p.description, &p.price))
            .collect();
        let observation_texts: Vec<String> = observations
            .iter()
            .map(|o| embedding_text(&o.title, &o.description, &o.price_raw))
            .collect();

        let product_vecs = self.embed_all(&product_texts)?;
        let observation_vecs = self.embed_all(&observation_texts)?;
        let matrix = SimilarityMatrix::compute(&product_vecs, &observation_vecs);

        let mut plan = MatchPlan {
            target_id,
            observation_ids: observations.iter().map(|o| o.id).collect(),
            ..Default::default()
        };
        for (col, slot) in assign(&matrix).into_iter().enumerate() {
            let observation_id = observations[col].id;
            match slot {
                Some((row, similarity)) => plan.assignments.push(Assignment {
                    product_id: products[row].id,
                    observation_id,
                    similarity,
                }),
                None => {
                    tracing::debug!(observation_id, "all products claimed, leaving unmatched");
                    plan.unmatched.push(observation_id);
                }
            }
        }
        Ok(plan)
    }

    /// Load a target group, plan, and persist.
    pub fn run<S>(&mut self, store: &mut S, target_id: i64) -> Result<MatchReport, MatchError>
    where
        S: CatalogStore + ?Sized,
    {
        let products = store.target_products(target_id).map_err(MatchError::Store)?;
        let observations = store
            .competitor_observations(target_id)
            .map_err(MatchError::Store)?;
        let plan = self.plan(target_id, &products, &observations)?;
        commit(store, plan)
    }

    fn embed_all(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&refs)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::BatchSize {
                expected: texts.len(),
                got: vectors.len(),
            }
            .into());
        }
        let expected = self.embedder.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(MatchError::DimensionMismatch {
                expected,
                got: bad.len(),
            });
        }
        Ok(vectors)
    }
}

/// Persist a plan. Empty plans write nothing.
pub fn commit<S>(store: &mut S, plan: MatchPlan) -> Result<MatchReport, MatchError>
where
    S: CatalogStore + ?Sized,
{
    if plan.is_empty() {
        return Ok(MatchReport {
            target_id: plan.target_id,
            ..Default::default()
        });
    }
    match store.replace_assignments(&plan) {
        Ok(written) => {
            tracing::info!(
                target_id = plan.target_id,
                written,
                unmatched = plan.unmatched.len(),
                "matching run committed"
            );
            Ok(MatchReport {
                target_id: plan.target_id,
                assignments_written: written,
                assignments: plan.assignments,
                unmatched: plan.unmatched,
            })
        }
        Err(source) => Err(MatchError::Persistence {
            plan: Box::new(plan),
            source,
        }),
    }
}
