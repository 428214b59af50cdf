// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration resolved from the environment.
//!
//! Every value has a default under `~/.pricelens/`; environment variables
//! override the defaults and CLI flags override both.

use crate::renderer::FetchSettings;
use std::path::PathBuf;

pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub table_prefix: String,
    pub chromium_path: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub fetch: FetchSettings,
    pub http_port: u16,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid table prefix {0:?}: only letters, digits and '_' are allowed")]
    InvalidPrefix(String),

    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// `~/.pricelens`, or `/tmp/.pricelens` without a home directory.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".pricelens")
}

/// Table prefixes are spliced into SQL, so only `[A-Za-z0-9_]*` passes.
pub fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(ConfigError::InvalidPrefix(prefix.to_string()))
    }
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let number = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(var) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    var,
                    value: raw.clone(),
                }),
                None => Ok(default),
            }
        };

        let table_prefix = get("PRICELENS_TABLE_PREFIX").unwrap_or_default();
        validate_prefix(&table_prefix)?;

        let defaults = FetchSettings::default();
        let fetch = FetchSettings {
            nav_timeout_ms: number("PRICELENS_NAV_TIMEOUT_MS", defaults.nav_timeout_ms)?,
            settle_ms: number("PRICELENS_SETTLE_MS", defaults.settle_ms)?,
            hard_timeout_ms: number("PRICELENS_HARD_TIMEOUT_MS", defaults.hard_timeout_ms)?,
        };

        let http_port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                var: "PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_HTTP_PORT,
        };

        Ok(Self {
            db_path: get("PRICELENS_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir().join("pricelens.db")),
            table_prefix,
            chromium_path: get("PRICELENS_CHROMIUM_PATH").map(PathBuf::from),
            model_dir: get("PRICELENS_MODEL_DIR").map(PathBuf::from),
            fetch,
            http_port,
        })
    }

    /// Apply a `--http-port` flag, if given.
    pub fn with_http_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.http_port = port;
        }
        self
    }
}
