// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output helpers shared by the CLI subcommands.
//!
//! Global flags are published through environment variables by `main` so
//! every module can check them without threading a context around.

use serde::Serialize;

pub const JSON_VAR: &str = "PRICELENS_JSON";
pub const QUIET_VAR: &str = "PRICELENS_QUIET";
pub const VERBOSE_VAR: &str = "PRICELENS_VERBOSE";
pub const NO_COLOR_VAR: &str = "PRICELENS_NO_COLOR";

fn flag(var: &str) -> bool {
    std::env::var(var).map(|v| v == "1").unwrap_or(false)
}

pub fn is_json() -> bool {
    flag(JSON_VAR)
}

pub fn is_quiet() -> bool {
    flag(QUIET_VAR)
}

pub fn is_verbose() -> bool {
    flag(VERBOSE_VAR)
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

/// Status symbols, colored unless disabled.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            color: !flag(NO_COLOR_VAR) && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "[OK]")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "[!!]")
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
