//! Price token grammar.
//!
//! A fragment is a price only when the *whole* trimmed string is one of three
//! notations:
//!
//! 1. amount then a dinar code: `1 234,56 DT`, `19,500 TND`, `45 D.T`
//! 2. optional 2–3 letter code, symbol, amount: `$1,234.56`, `US $145.95`, `€ 100`
//! 3. amount immediately followed by a symbol: `99.99£`
//!
//! An amount is either digit groups of three (`1.234.567`, `1 234`) or a plain
//! digit run, followed by an optional two-digit fraction.

use regex::Regex;
use std::sync::LazyLock;

const AMOUNT: &str = r"(?:\d{1,3}(?:[.,\s]\d{3})+|\d+)(?:[.,]\d{2})?";

static DINAR_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{AMOUNT}\s*(?:DT|TND|D\.T)$")).expect("dinar pattern is valid")
});

static SYMBOL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:[A-Z]{{2,3}}\s+)?[$€£]\s*{AMOUNT}$"))
        .expect("symbol prefix pattern is valid")
});

static SYMBOL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{AMOUNT}[$€£]$")).expect("symbol suffix pattern is valid")
});

/// Fragments longer than this, in characters after trimming, are never prices.
pub const MAX_PRICE_CHARS: usize = 64;

/// The surface notation a price token was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    DinarSuffix,
    SymbolPrefix,
    SymbolSuffix,
}

/// Classify a fragment, or `None` when it is not a price token.
pub fn classify(text: &str) -> Option<Notation> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_PRICE_CHARS {
        return None;
    }
    if DINAR_SUFFIX.is_match(text) {
        Some(Notation::DinarSuffix)
    } else if SYMBOL_PREFIX.is_match(text) {
        Some(Notation::SymbolPrefix)
    } else if SYMBOL_SUFFIX.is_match(text) {
        Some(Notation::SymbolSuffix)
    } else {
        None
    }
}

/// Whether the whole trimmed fragment is a price token.
pub fn is_price(text: &str) -> bool {
    classify(text).is_some()
}
