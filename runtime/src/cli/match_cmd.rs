// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pricelens match <target-id>` — run one catalog matching pass.

use crate::cli::output::{self, Styled};
use crate::config::Settings;
use anyhow::Result;

pub async fn run(target_id: i64) -> Result<()> {
    let engine = super::offline_engine(Settings::from_env()?);
    let report = engine.match_catalog(target_id).await?;

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }

    let s = Styled::new();
    println!(
        "  {} target {target_id}: {} assignments written, {} unmatched",
        s.ok_sym(),
        report.assignments_written,
        report.unmatched.len()
    );
    if !output::is_quiet() {
        for a in &report.assignments {
            println!(
                "    history #{:<6} -> product #{:<6} {}",
                a.observation_id,
                a.product_id,
                s.dim(&format!("{:.3}", a.similarity))
            );
        }
        for id in &report.unmatched {
            println!("    history #{id:<6} -> {}", s.dim("unmatched"));
        }
    }
    Ok(())
}
