// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pricelens init-db` — create the schema and report table sizes.

use crate::cli::output::{self, Styled};
use crate::config::Settings;
use anyhow::Result;

pub async fn run() -> Result<()> {
    let engine = super::offline_engine(Settings::from_env()?);
    let store = engine.open_store()?;
    let counts = store.table_counts()?;

    if output::is_json() {
        let tables: serde_json::Map<String, serde_json::Value> = counts
            .into_iter()
            .map(|(name, n)| (name, n.into()))
            .collect();
        output::print_json(&serde_json::json!({
            "db": engine.settings().db_path,
            "tables": tables,
        }));
        return Ok(());
    }

    let s = Styled::new();
    println!(
        "  {} schema ready at {}",
        s.ok_sym(),
        engine.settings().db_path.display()
    );
    for (name, n) in counts {
        println!("    {name:<40} {n} rows");
    }
    Ok(())
}
