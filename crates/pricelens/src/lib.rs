//! PriceLens — heuristic price and title extraction from e-commerce HTML, and
//! one-to-one matching of competitor observations against a product catalog.

pub mod dom;
pub mod embedding;
pub mod extractor;
pub mod grammar;
pub mod matcher;
pub mod normalize;
pub mod scorer;
pub mod similarity;
pub mod types;

pub use dom::{Document, StripSet};
pub use embedding::{HashingEmbedder, TextEmbedder, HASHING_DIM};
#[cfg(feature = "onnx")]
pub use embedding::OnnxEmbedder;
pub use extractor::FieldExtractor;
pub use grammar::{classify, is_price, Notation, MAX_PRICE_CHARS};
pub use matcher::{
    assign, clean_text, commit, embedding_text, CatalogMatcher, CatalogStore, MatchError,
    MatchPlan, MatchReport,
};
pub use normalize::{format_grouped, normalize_price, Currency, NormalizeError, NormalizedPrice};
pub use scorer::{NodeScorer, ProductIndicators};
pub use similarity::{cosine_similarity, SimilarityMatrix};
pub use types::*;
