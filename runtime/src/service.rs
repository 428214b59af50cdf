// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! The extraction and matching service shared by the REST API and the CLI.

use crate::config::Settings;
use crate::renderer::{fetch_html, FetchError, Renderer};
use crate::storage::{NewObservation, SqliteStore};
use pricelens::{
    normalize_price, CatalogMatcher, ExtractionHint, FieldExtractor, FieldHints, FieldRecord,
    HashingEmbedder, HintError, MatchError, MatchReport, PatternReport, StoreError, TextEmbedder,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Errors surfaced to API and CLI callers.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("invalid URL {0:?}: expected an absolute http(s) URL")]
    InvalidUrl(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid {field} hint: {source}")]
    InvalidHint {
        field: &'static str,
        source: HintError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no price found on {0}")]
    NoPrice(String),

    #[error("no match possible: {0}")]
    NoMatch(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidUrl(_) => "E_INVALID_URL",
            EngineError::InvalidQuery(_) => "E_INVALID_QUERY",
            EngineError::InvalidHint { .. } => "E_INVALID_HINT",
            EngineError::Fetch(_) => "E_FETCH_FAILED",
            EngineError::NoPrice(_) => "E_NO_PRICE",
            EngineError::NoMatch(_) => "E_NO_MATCH",
            EngineError::Persistence(_) => "E_PERSISTENCE",
            EngineError::Internal(_) => "E_INTERNAL",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Persistence(e.to_string())
    }
}

impl From<MatchError> for EngineError {
    fn from(e: MatchError) -> Self {
        match e {
            MatchError::Embedding(_) | MatchError::DimensionMismatch { .. } => {
                EngineError::NoMatch(e.to_string())
            }
            MatchError::Store(_) | MatchError::Persistence { .. } => {
                EngineError::Persistence(e.to_string())
            }
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> EngineError {
    EngineError::Internal(format!("worker task failed: {e}"))
}

/// Reject anything but absolute `http`/`https` URLs with a host.
pub fn validate_url(raw: &str) -> Result<url::Url, EngineError> {
    let invalid = || EngineError::InvalidUrl(raw.to_string());
    let parsed = url::Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Parse an optional hint in its JSON wire form. Blank input means no hint.
pub fn parse_hint(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<ExtractionHint>, EngineError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(json) => ExtractionHint::from_json(json)
            .map(Some)
            .map_err(|source| EngineError::InvalidHint { field, source }),
    }
}

/// Drop a trailing "TTC" (tax included) marker from a displayed price.
pub fn strip_tax_marker(price: &str) -> String {
    let trimmed = price.trim();
    trimmed
        .strip_suffix("TTC")
        .map(str::trim_end)
        .unwrap_or(trimmed)
        .to_string()
}

/// Pick the embedding backend for matching runs.
pub fn build_embedder(settings: &Settings) -> Box<dyn TextEmbedder> {
    if let Some(dir) = &settings.model_dir {
        if let Some(embedder) = load_model(dir) {
            return embedder;
        }
    }
    Box::new(HashingEmbedder::default())
}

#[cfg(feature = "onnx")]
fn load_model(dir: &Path) -> Option<Box<dyn TextEmbedder>> {
    match pricelens::OnnxEmbedder::load(dir) {
        Ok(e) => Some(Box::new(e)),
        Err(e) => {
            warn!("ONNX model unavailable ({e}), using hashing embedder");
            None
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn load_model(dir: &Path) -> Option<Box<dyn TextEmbedder>> {
    warn!(
        "model directory {} ignored: built without the onnx feature, using hashing embedder",
        dir.display()
    );
    None
}

/// Extraction and matching entry points.
#[derive(Clone)]
pub struct Engine {
    renderer: Arc<dyn Renderer>,
    extractor: FieldExtractor,
    settings: Arc<Settings>,
}

impl Engine {
    pub fn new(renderer: Arc<dyn Renderer>, settings: Settings) -> Self {
        Self {
            renderer,
            extractor: FieldExtractor::default(),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn open_store(&self) -> Result<SqliteStore, EngineError> {
        Ok(SqliteStore::open(
            &self.settings.db_path,
            &self.settings.table_prefix,
        )?)
    }

    async fn fetch(&self, url: &str) -> Result<String, EngineError> {
        let url = validate_url(url)?;
        Ok(fetch_html(self.renderer.as_ref(), url.as_str(), &self.settings.fetch).await?)
    }

    /// Single-value extraction for one page.
    pub async fn extract_fields(
        &self,
        url: &str,
        hints: FieldHints,
    ) -> Result<FieldRecord, EngineError> {
        let html = self.fetch(url).await?;
        let extractor = self.extractor.clone();
        let record =
            tokio::task::spawn_blocking(move || extractor.extract_fields(&html, &hints))
                .await
                .map_err(join_error)?;
        info!(url, price = ?record.price, "extraction finished");
        Ok(record)
    }

    /// Pattern discovery for one page.
    pub async fn extract_patterns(&self, url: &str) -> Result<PatternReport, EngineError> {
        let html = self.fetch(url).await?;
        let extractor = self.extractor.clone();
        tokio::task::spawn_blocking(move || extractor.extract_patterns(&html))
            .await
            .map_err(join_error)
    }

    /// Match a target group's catalog against its competitors' history.
    pub async fn match_catalog(&self, target_id: i64) -> Result<MatchReport, EngineError> {
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || -> Result<MatchReport, EngineError> {
            let mut store = SqliteStore::open(&settings.db_path, &settings.table_prefix)?;
            let mut embedder = build_embedder(&settings);
            info!(target_id, embedder = embedder.name(), "matching catalog");
            let report = CatalogMatcher::new(embedder.as_mut()).run(&mut store, target_id)?;
            Ok(report)
        })
        .await
        .map_err(join_error)?
    }

    /// Append an extracted record to the price history.
    pub async fn record_observation(
        &self,
        competitor_id: i64,
        url: &str,
        record: &FieldRecord,
    ) -> Result<i64, EngineError> {
        let price = record
            .price
            .clone()
            .ok_or_else(|| EngineError::NoPrice(url.to_string()))?;
        let normalized = match normalize_price(&price) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("storing unnormalized price: {e}");
                None
            }
        };
        let row = NewObservation {
            competitor_id,
            title: record.title.clone().unwrap_or_default(),
            description: record.description.clone().unwrap_or_default(),
            price_raw: price,
            url: url.to_string(),
            amount: normalized.map(|n| n.amount),
            currency: normalized.and_then(|n| n.currency).map(|c| c.code().to_string()),
        };
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || -> Result<i64, EngineError> {
            let store = SqliteStore::open(&settings.db_path, &settings.table_prefix)?;
            Ok(store.insert_observation(&row)?)
        })
        .await
        .map_err(join_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://shop.tn/p/1").is_ok());
        assert!(validate_url(" http://shop.tn ").is_ok());
        for bad in ["", "shop.tn/p/1", "ftp://shop.tn/x", "file:///etc/passwd", "http://"] {
            assert!(
                matches!(validate_url(bad), Err(EngineError::InvalidUrl(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_hint() {
        assert!(parse_hint("price", None).unwrap().is_none());
        assert!(parse_hint("price", Some("  ")).unwrap().is_none());
        let hint = parse_hint("price", Some(r#"{"tag":"span","attributes":{}}"#))
            .unwrap()
            .unwrap();
        assert_eq!(hint.tag, "span");
        let err = parse_hint("stock", Some("{oops")).unwrap_err();
        assert_eq!(err.code(), "E_INVALID_HINT");
        assert!(err.to_string().contains("stock"));
    }

    #[test]
    fn test_strip_tax_marker() {
        assert_eq!(strip_tax_marker("1 299,000 DT TTC"), "1 299,000 DT");
        assert_eq!(strip_tax_marker("99 DT"), "99 DT");
        assert_eq!(strip_tax_marker(" 45,500 DTTTC "), "45,500 DT");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(EngineError::NoPrice("u".into()).code(), "E_NO_PRICE");
        let e: EngineError = MatchError::DimensionMismatch {
            expected: 2,
            got: 3,
        }
        .into();
        assert_eq!(e.code(), "E_NO_MATCH");
        let e: EngineError = StoreError::Backend("locked".into()).into();
        assert_eq!(e.code(), "E_PERSISTENCE");
    }
}
