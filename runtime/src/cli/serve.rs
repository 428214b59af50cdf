// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pricelens serve` — run the REST API.

use crate::cli::output::{self, Styled};
use crate::config::Settings;
use crate::rest::{self, AppState};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub async fn run(http_port: Option<u16>) -> Result<()> {
    let settings = Settings::from_env()?.with_http_port(http_port);
    let port = settings.http_port;

    info!("starting PriceLens v{}", env!("CARGO_PKG_VERSION"));
    let engine = super::browser_engine(settings).await;
    let state = Arc::new(AppState::new(engine));

    if !output::is_quiet() {
        let s = Styled::new();
        eprintln!(
            "  {} PriceLens v{} listening on port {port}",
            s.ok_sym(),
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("  {}", s.dim("Press Ctrl-C to stop."));
    }

    tokio::select! {
        result = rest::start(port, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
