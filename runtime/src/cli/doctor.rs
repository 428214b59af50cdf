// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use crate::cli::output::{self, Styled};
use crate::config::Settings;
use crate::renderer::chromium::find_chromium;
use crate::service::build_embedder;
use crate::storage::SqliteStore;
use anyhow::Result;

/// Check configuration, Chromium, the database and the embedding backend.
pub async fn run() -> Result<()> {
    let s = Styled::new();
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            println!("{} Configuration invalid: {e}", s.warn_sym());
            println!();
            println!("Status: NOT READY");
            return Ok(());
        }
    };

    let chromium = find_chromium(settings.chromium_path.as_deref());
    let store = SqliteStore::open(&settings.db_path, &settings.table_prefix);
    let embedder = build_embedder(&settings);

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium,
            "database": settings.db_path,
            "database_ok": store.is_ok(),
            "table_prefix": settings.table_prefix,
            "embedder": embedder.name(),
            "http_port": settings.http_port,
            "ready": chromium.is_some() && store.is_ok(),
        }));
        return Ok(());
    }

    println!("PriceLens Doctor");
    println!("================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("{} Chromium found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} Chromium NOT found. Set PRICELENS_CHROMIUM_PATH or install google-chrome.",
            s.warn_sym()
        ),
    }

    match &store {
        Ok(_) => println!("{} Database: {}", s.ok_sym(), settings.db_path.display()),
        Err(e) => println!("{} Database unusable: {e}", s.warn_sym()),
    }

    if settings.table_prefix.is_empty() {
        println!("{} Table prefix: (none)", s.ok_sym());
    } else {
        println!("{} Table prefix: {}", s.ok_sym(), settings.table_prefix);
    }

    println!(
        "{} Embedding backend: {} ({} dimensions)",
        s.ok_sym(),
        embedder.name(),
        embedder.dim()
    );

    match available_memory_mb() {
        Some(mb) if mb >= 512 => println!("{} Available memory: {mb}MB", s.ok_sym()),
        Some(mb) => println!(
            "{} Available memory: {mb}MB (< 512MB, Chromium may struggle)",
            s.warn_sym()
        ),
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    if chromium.is_some() && store.is_ok() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

/// Get available memory in MB (platform-specific).
fn available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = std::process::Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        s.lines()
            .find(|line| line.starts_with("Mem:"))
            .and_then(|line| line.split_whitespace().nth(6))
            .and_then(|v| v.parse().ok())
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
