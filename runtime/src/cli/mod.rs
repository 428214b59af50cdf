// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `pricelens` binary.

pub mod doctor;
pub mod extract_cmd;
pub mod init_db;
pub mod match_cmd;
pub mod output;
pub mod serve;

use crate::config::Settings;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::service::Engine;
use std::sync::Arc;
use tracing::{info, warn};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `pricelens=info`, or `debug` with `--verbose`.
pub fn init_tracing() {
    let level = if output::is_verbose() { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "pricelens={level},pricelens_runtime={level}"
        ))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if output::is_json() {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Launch Chromium, or fall back to a renderer that refuses every fetch.
pub async fn launch_renderer(settings: &Settings) -> Arc<dyn Renderer> {
    match ChromiumRenderer::new(settings.chromium_path.as_deref()).await {
        Ok(renderer) => {
            info!("Chromium renderer initialized");
            Arc::new(renderer)
        }
        Err(e) => {
            warn!("Failed to initialize Chromium: {e:#}");
            warn!("Page extraction is disabled; matching still works");
            Arc::new(NoopRenderer)
        }
    }
}

/// Engine with a live browser, for the commands that fetch pages.
pub async fn browser_engine(settings: Settings) -> Engine {
    let renderer = launch_renderer(&settings).await;
    Engine::new(renderer, settings)
}

/// Engine without a browser, for storage-only commands.
pub fn offline_engine(settings: Settings) -> Engine {
    Engine::new(Arc::new(NoopRenderer), settings)
}
