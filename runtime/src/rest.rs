// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for PriceLens.
//!
//! Thin handlers over [`Engine`]. Errors render as `{"error", "code"}` with
//! an HTTP status derived from the error code.

use crate::service::{parse_hint, strip_tax_marker, Engine, EngineError};
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use pricelens::{FieldHints, FieldRecord, MatchReport, PatternReport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

/// Maximum number of interactions kept in memory.
pub const INTERACTION_LOG_CAPACITY: usize = 200;

/// One extraction request as seen by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub at: DateTime<Utc>,
    pub endpoint: String,
    pub url: String,
    pub price: Option<String>,
    pub error: Option<String>,
}

/// Bounded, most-recent-last log of interactions.
#[derive(Default)]
pub struct InteractionLog {
    entries: Mutex<VecDeque<Interaction>>,
}

impl InteractionLog {
    pub fn push(&self, entry: Interaction) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == INTERACTION_LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<Interaction> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

/// State shared by every handler.
pub struct AppState {
    pub engine: Engine,
    pub interactions: InteractionLog,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            interactions: InteractionLog::default(),
        }
    }

    fn log(&self, endpoint: &str, url: &str, outcome: Result<Option<&str>, &EngineError>) {
        let (price, error) = match outcome {
            Ok(price) => (price.map(str::to_string), None),
            Err(e) => (None, Some(e.code().to_string())),
        };
        self.interactions.push(Interaction {
            at: Utc::now(),
            endpoint: endpoint.to_string(),
            url: url.to_string(),
            price,
            error,
        });
    }
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::InvalidUrl(_)
            | EngineError::InvalidQuery(_)
            | EngineError::InvalidHint { .. } => StatusCode::BAD_REQUEST,
            EngineError::Fetch(_) => StatusCode::BAD_GATEWAY,
            EngineError::NoPrice(_) => StatusCode::NOT_FOUND,
            EngineError::NoMatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Persistence(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string(), "code": self.code() });
        (self.status(), Json(body)).into_response()
    }
}

/// `Query` whose rejection renders as an [`EngineError`] body.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = EngineError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| EngineError::InvalidQuery(rejection.body_text()))
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/extract-patterns", get(extract_patterns))
        .route("/api/extract-price", get(extract_price))
        .route("/api/compare", get(compare))
        .route("/api/interactions", get(interactions))
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server on the given port.
pub async fn start(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// A missing `url` deserializes as empty and fails URL validation.
#[derive(Debug, Deserialize)]
pub struct UrlParams {
    #[serde(default)]
    pub url: String,
}

pub async fn extract_patterns(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<UrlParams>,
) -> Result<Json<PatternReport>, EngineError> {
    let result = match state.engine.extract_patterns(&params.url).await {
        Ok(report) if report.prices.is_empty() => Err(EngineError::NoPrice(params.url.clone())),
        other => other,
    };
    state.log(
        "extract-patterns",
        &params.url,
        result.as_ref().map(|_| None),
    );
    result.map(Json)
}

/// Query parameters of `/api/extract-price`; hints are JSON strings.
#[derive(Debug, Default, Deserialize)]
pub struct PriceParams {
    #[serde(default)]
    pub url: String,
    pub param: Option<String>,
    pub descr_param: Option<String>,
    pub stock_param: Option<String>,
}

pub async fn extract_price(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<PriceParams>,
) -> Result<Json<FieldRecord>, EngineError> {
    let result = price_for(&state, &params).await;
    state.log(
        "extract-price",
        &params.url,
        result.as_ref().map(|r| r.price.as_deref()),
    );
    result.map(Json)
}

async fn price_for(state: &AppState, params: &PriceParams) -> Result<FieldRecord, EngineError> {
    let hints = FieldHints {
        price: parse_hint("price", params.param.as_deref())?,
        description: parse_hint("description", params.descr_param.as_deref())?,
        stock: parse_hint("stock", params.stock_param.as_deref())?,
    };
    let mut record = state.engine.extract_fields(&params.url, hints).await?;
    match record.price.as_deref().map(strip_tax_marker) {
        Some(price) if !price.is_empty() => record.price = Some(price),
        _ => return Err(EngineError::NoPrice(params.url.clone())),
    }
    Ok(record)
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub id_target: i64,
}

pub async fn compare(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<CompareParams>,
) -> Result<Json<MatchReport>, EngineError> {
    state.engine.match_catalog(params.id_target).await.map(Json)
}

async fn interactions(State(state): State<Arc<AppState>>) -> Json<Vec<Interaction>> {
    Json(state.interactions.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::renderer::NoopRenderer;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(dir: &tempfile::TempDir) -> Router {
        let mut settings = Settings::from_lookup(|_| None).unwrap();
        settings.db_path = dir.path().join("rest.db");
        let engine = Engine::new(Arc::new(NoopRenderer), settings);
        router(Arc::new(AppState::new(engine)))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("application/json"), "{content_type}");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn entry(i: usize) -> Interaction {
        Interaction {
            at: Utc::now(),
            endpoint: "extract-price".into(),
            url: format!("https://shop.test/{i}"),
            price: None,
            error: None,
        }
    }

    #[test]
    fn test_interaction_log_is_bounded() {
        let log = InteractionLog::default();
        for i in 0..INTERACTION_LOG_CAPACITY + 5 {
            log.push(entry(i));
        }
        let snap = log.snapshot();
        assert_eq!(snap.len(), INTERACTION_LOG_CAPACITY);
        assert_eq!(snap[0].url, "https://shop.test/5");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(EngineError::InvalidUrl("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(EngineError::NoPrice("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            EngineError::NoMatch("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            EngineError::Persistence("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_missing_url_is_structured_400() {
        let dir = tempfile::tempdir().unwrap();
        for uri in ["/api/extract-price", "/api/extract-patterns", "/api/extract-price?param="] {
            let (status, body) = get(app(&dir), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["code"], "E_INVALID_URL", "{uri}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_bad_target_id_is_structured_400() {
        let dir = tempfile::tempdir().unwrap();
        for uri in ["/api/compare", "/api/compare?id_target=abc"] {
            let (status, body) = get(app(&dir), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["code"], "E_INVALID_QUERY", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_through_router() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(app(&dir), "/api/extract-price?url=https://shop.test/p").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "E_FETCH_FAILED");
    }

    #[tokio::test]
    async fn test_compare_empty_target() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(app(&dir), "/api/compare?id_target=7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assignments_written"], 0);
    }
}
