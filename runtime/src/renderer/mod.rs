// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide), and
//! [`fetch_html`], the bounded navigate → settle → read sequence every
//! extraction goes through.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Get the full page HTML, after scripts have run.
    async fn get_html(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Marker error for a navigation that hit its deadline.
#[derive(thiserror::Error, Debug)]
#[error("navigation timed out after {0}ms")]
pub struct NavigationTimeout(pub u64);

/// A no-op renderer used when Chromium is unavailable.
///
/// Every fetch fails with [`FetchError::Browser`]; matching and recording
/// still work.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

/// Timing budget for one page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Navigation deadline.
    pub nav_timeout_ms: u64,
    /// Pause after navigation so late scripts can fill in prices.
    pub settle_ms: u64,
    /// Wall-clock bound on the whole sequence.
    pub hard_timeout_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            nav_timeout_ms: 30_000,
            settle_ms: 2_000,
            hard_timeout_ms: 45_000,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("fetching {url} timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u64 },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("browser unavailable: {0}")]
    Browser(String),
}

/// Render `url` and return the script-executed DOM as HTML.
///
/// Context creation, navigation, settle delay and HTML read all run under
/// `settings.hard_timeout_ms`. A timeout never yields partial HTML. Once a
/// context exists it is closed on every path, timeouts included.
pub async fn fetch_html(
    renderer: &dyn Renderer,
    url: &str,
    settings: &FetchSettings,
) -> Result<String, FetchError> {
    let deadline =
        tokio::time::Instant::now() + Duration::from_millis(settings.hard_timeout_ms);
    let timed_out = || FetchError::Timeout {
        url: url.to_string(),
        after_ms: settings.hard_timeout_ms,
    };

    let mut ctx = tokio::time::timeout_at(deadline, renderer.new_context())
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| FetchError::Browser(format!("{e:#}")))?;

    let result = match tokio::time::timeout_at(deadline, render(ctx.as_mut(), url, settings)).await
    {
        Ok(result) => result,
        Err(_) => Err(timed_out()),
    };

    if let Err(e) = ctx.close().await {
        tracing::warn!("failed to close browser context: {e:#}");
    }
    result
}

async fn render(
    ctx: &mut dyn RenderContext,
    url: &str,
    settings: &FetchSettings,
) -> Result<String, FetchError> {
    let nav = ctx
        .navigate(url, settings.nav_timeout_ms)
        .await
        .map_err(|e| navigation_error(url, e))?;
    tracing::debug!(url, final_url = %nav.final_url, load_ms = nav.load_time_ms, "page loaded");

    if settings.settle_ms > 0 {
        tokio::time::sleep(Duration::from_millis(settings.settle_ms)).await;
    }

    ctx.get_html().await.map_err(|e| navigation_error(url, e))
}

fn navigation_error(url: &str, e: anyhow::Error) -> FetchError {
    match e.downcast_ref::<NavigationTimeout>() {
        Some(NavigationTimeout(ms)) => FetchError::Timeout {
            url: url.to_string(),
            after_ms: *ms,
        },
        None => FetchError::Navigation {
            url: url.to_string(),
            message: format!("{e:#}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SlowRenderer {
        nav_delay_ms: u64,
        closed: Arc<AtomicUsize>,
    }

    impl SlowRenderer {
        fn new(nav_delay_ms: u64) -> Self {
            Self {
                nav_delay_ms,
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct SlowContext {
        nav_delay_ms: u64,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Renderer for SlowRenderer {
        async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
            Ok(Box::new(SlowContext {
                nav_delay_ms: self.nav_delay_ms,
                closed: Arc::clone(&self.closed),
            }))
        }
        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
        fn active_contexts(&self) -> usize {
            0
        }
    }

    #[async_trait]
    impl RenderContext for SlowContext {
        async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
            if self.nav_delay_ms > timeout_ms {
                return Err(NavigationTimeout(timeout_ms).into());
            }
            tokio::time::sleep(Duration::from_millis(self.nav_delay_ms)).await;
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: self.nav_delay_ms,
            })
        }
        async fn get_html(&self) -> Result<String> {
            Ok("<html><body>ok</body></html>".into())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast() -> FetchSettings {
        FetchSettings {
            nav_timeout_ms: 1_000,
            settle_ms: 0,
            hard_timeout_ms: 2_000,
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_html() {
        let renderer = SlowRenderer::new(1);
        let html = fetch_html(&renderer, "https://a.test/", &fast())
            .await
            .unwrap();
        assert!(html.contains("ok"));
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_timeout_is_typed() {
        let renderer = SlowRenderer::new(5_000);
        let err = fetch_html(&renderer, "https://a.test/", &fast())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { after_ms: 1_000, .. }));
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hard_timeout_wraps_sequence() {
        let settings = FetchSettings {
            nav_timeout_ms: 10_000,
            settle_ms: 0,
            hard_timeout_ms: 20,
        };
        let renderer = SlowRenderer::new(500);
        let err = fetch_html(&renderer, "https://a.test/", &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { after_ms: 20, .. }));
    }

    #[tokio::test]
    async fn test_context_closed_after_hard_timeout() {
        let settings = FetchSettings {
            nav_timeout_ms: 10_000,
            settle_ms: 0,
            hard_timeout_ms: 20,
        };
        let renderer = SlowRenderer::new(500);
        for _ in 0..3 {
            let err = fetch_html(&renderer, "https://a.test/", &settings)
                .await
                .unwrap_err();
            assert!(matches!(err, FetchError::Timeout { .. }));
        }
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_noop_renderer_fails_fast() {
        let err = fetch_html(&NoopRenderer, "https://a.test/", &fast())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Browser(_)));
    }
}
