// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, NavigationTimeout, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Find the Chromium binary path.
///
/// Order: explicit path, `~/.pricelens/chromium/`, then the system `PATH`.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!("configured Chromium path {} does not exist", path.display());
    }

    let local = crate::config::data_dir().join("chromium");
    let candidates = if cfg!(target_os = "macos") {
        vec![
            local.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            local.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            local.join("chrome"),
        ]
    } else {
        vec![local.join("chrome-linux64/chrome"), local.join("chrome")]
    };
    if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
        return Some(found);
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn new(explicit_path: Option<&Path>) -> Result<Self> {
        let chrome_path = find_chromium(explicit_path)
            .context("Chromium not found. Set PRICELENS_CHROMIUM_PATH or install Chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped with the renderer
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => Err(NavigationTimeout(timeout_ms).into()),
        }
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_explicit_path_falls_back() {
        // Only checks that a bogus explicit path is not returned as-is.
        let found = find_chromium(Some(Path::new("/nonexistent/chrome")));
        assert_ne!(found, Some(PathBuf::from("/nonexistent/chrome")));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_renders_script_output() {
        let renderer = ChromiumRenderer::new(None)
            .await
            .expect("failed to create renderer");
        let html = crate::renderer::fetch_html(
            &renderer,
            "data:text/html,<span id='p'></span><script>document.getElementById('p').textContent='99 DT'</script>",
            &crate::renderer::FetchSettings {
                nav_timeout_ms: 10_000,
                settle_ms: 100,
                hard_timeout_ms: 15_000,
            },
        )
        .await
        .expect("fetch failed");
        assert!(html.contains("99 DT"));
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.expect("shutdown failed");
    }
}
