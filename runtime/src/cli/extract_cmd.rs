// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pricelens extract <url>` and `pricelens patterns <url>`.

use crate::cli::output::{self, Styled};
use crate::config::Settings;
use crate::service::parse_hint;
use anyhow::{bail, Result};
use pricelens::FieldHints;

/// Hint arguments as given on the command line.
#[derive(Debug, Default)]
pub struct HintArgs<'a> {
    pub price: Option<&'a str>,
    pub description: Option<&'a str>,
    pub stock: Option<&'a str>,
}

/// Extract one value per field and optionally record it as an observation.
pub async fn run(url: &str, hints: HintArgs<'_>, record_for: Option<i64>) -> Result<()> {
    let hints = FieldHints {
        price: parse_hint("price", hints.price)?,
        description: parse_hint("description", hints.description)?,
        stock: parse_hint("stock", hints.stock)?,
    };

    let engine = super::browser_engine(Settings::from_env()?).await;
    let record = engine.extract_fields(url, hints).await?;

    let recorded = match record_for {
        Some(competitor_id) => {
            if record.price.is_none() {
                bail!("no price found on {url}; nothing recorded");
            }
            Some(engine.record_observation(competitor_id, url, &record).await?)
        }
        None => None,
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "record": record,
            "id_history": recorded,
        }));
        return Ok(());
    }

    let show = |label: &str, value: &Option<String>| {
        println!("  {label:<12} {}", value.as_deref().unwrap_or("-"));
    };
    show("price", &record.price);
    show("title", &record.title);
    show("description", &record.description);
    show("stock", &record.stock);
    if let Some(id) = recorded {
        if !output::is_quiet() {
            println!("  {} recorded as price_history #{id}", Styled::new().ok_sym());
        }
    }
    Ok(())
}

/// Print every price, description and stock candidate with its reusable hint.
pub async fn run_patterns(url: &str) -> Result<()> {
    let engine = super::browser_engine(Settings::from_env()?).await;
    let report = engine.extract_patterns(url).await?;

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }

    let s = Styled::new();
    println!("Prices ({})", report.prices.len());
    for p in &report.prices {
        println!("  {:<20} {}", p.price, s.dim(&serde_json::to_string(&p.to_hint())?));
    }
    println!("Description ({})", report.description.len());
    for c in &report.description {
        println!("  {:<40.40} {}", c.text_content, s.dim(&serde_json::to_string(&c.to_hint())?));
    }
    println!("Stock ({})", report.stock.len());
    for c in &report.stock {
        println!("  {:<40.40} {}", c.text_content, s.dim(&serde_json::to_string(&c.to_hint())?));
    }
    Ok(())
}
