//! Canonicalize raw price strings into comparable numbers.

use serde::{Deserialize, Serialize};

/// Currencies the grammar can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Tnd,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Tnd => "TND",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    pub fn from_symbol(ch: char) -> Option<Self> {
        match ch {
            '$' => Some(Currency::Usd),
            '\u{20AC}' => Some(Currency::Eur),
            '\u{00A3}' => Some(Currency::Gbp),
            _ => None,
        }
    }

    /// Parse a currency code as it appears in page metadata.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "DT" | "TND" | "D.T" => Some(Currency::Tnd),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }
}

/// A price reduced to a number and an optional currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPrice {
    pub amount: f64,
    pub currency: Option<Currency>,
}

impl NormalizedPrice {
    /// Plain numeric form, `.` as decimal point, no grouping.
    ///
    /// Feeding this back into [`normalize_price`] yields the same amount.
    pub fn canonical(&self) -> String {
        format!("{}", self.amount)
    }
}

/// Errors raised by [`normalize_price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("not a price: {0:?}")]
    NotAPrice(String),
}

const DINAR_SUFFIXES: [&str; 3] = ["D.T", "TND", "DT"];

/// Normalize a raw price string such as `"1 234,56 DT"` or `"$1,234.56"`.
///
/// Separator rules:
/// - `.` and `,` both present: the last one is the decimal separator.
/// - a separator that repeats is grouping.
/// - a lone separator followed by exactly three digits is grouping only for
///   `$`, `€` and `£` amounts; for dinars (millimes) and bare numbers it is
///   the decimal separator.
pub fn normalize_price(raw: &str) -> Result<NormalizedPrice, NormalizeError> {
    let not_a_price = || NormalizeError::NotAPrice(raw.to_string());
    let mut text = raw.trim();
    let mut currency = None;

    for suffix in DINAR_SUFFIXES {
        if let Some(rest) = text.strip_suffix(suffix) {
            text = rest;
            currency = Some(Currency::Tnd);
            break;
        }
    }

    let mut symbol_seen = false;
    let mut residue = String::with_capacity(text.len());
    for ch in text.chars() {
        if let Some(c) = Currency::from_symbol(ch) {
            if currency.is_some() {
                return Err(not_a_price());
            }
            currency = Some(c);
            symbol_seen = true;
        } else if !ch.is_whitespace() {
            residue.push(ch);
        }
    }

    // "US $145.95": the code before the symbol carries no extra information.
    let residue = if symbol_seen {
        residue.trim_start_matches(|c: char| c.is_ascii_uppercase())
    } else {
        residue.as_str()
    };

    let numeric = resolve_separators(residue, symbol_seen).ok_or_else(not_a_price)?;
    let amount: f64 = numeric.parse().map_err(|_| not_a_price())?;
    if !amount.is_finite() {
        return Err(not_a_price());
    }

    Ok(NormalizedPrice { amount, currency })
}

/// Rewrite an amount into a plain `digits[.digits]` literal.
fn resolve_separators(amount: &str, symbol_currency: bool) -> Option<String> {
    let bytes = amount.as_bytes();
    if bytes.is_empty()
        || !bytes[0].is_ascii_digit()
        || !bytes[bytes.len() - 1].is_ascii_digit()
        || !amount.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        || amount.contains("..")
        || amount.contains(",,")
        || amount.contains(".,")
        || amount.contains(",.")
    {
        return None;
    }

    let dots = amount.matches('.').count();
    let commas = amount.matches(',').count();

    let decimal = match (dots, commas) {
        (0, 0) => None,
        (_, 0) | (0, _) => {
            let sep = if dots > 0 { '.' } else { ',' };
            let count = dots + commas;
            let last = amount.rfind(sep)?;
            let trailing = amount.len() - last - 1;
            if count > 1 || (trailing == 3 && symbol_currency) {
                None
            } else {
                Some(last)
            }
        }
        _ => {
            let last_dot = amount.rfind('.')?;
            let last_comma = amount.rfind(',')?;
            let last = last_dot.max(last_comma);
            // The decimal separator must appear exactly once.
            let sep = amount.as_bytes()[last];
            if amount.bytes().filter(|b| *b == sep).count() > 1 {
                return None;
            }
            Some(last)
        }
    };

    let mut out = String::with_capacity(amount.len());
    for (i, ch) in amount.char_indices() {
        if ch.is_ascii_digit() {
            out.push(ch);
        } else if Some(i) == decimal {
            out.push('.');
        }
    }
    Some(out)
}

/// Format an amount the way dinar prices are printed: three decimals, space
/// for thousands, comma for the decimal point (`1234.5` → `"1 234,500"`).
pub fn format_grouped(value: f64) -> String {
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "000"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*ch);
    }

    let sign = if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped},{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_dinar_with_comma_decimal() {
        let p = normalize_price("1 234,56 DT").unwrap();
        assert!(approx(p.amount, 1234.56));
        assert_eq!(p.currency, Some(Currency::Tnd));
    }

    #[test]
    fn test_normalize_dinar_millimes() {
        let p = normalize_price("19,500 TND").unwrap();
        assert!(approx(p.amount, 19.5));
        let p = normalize_price("1 299,000 D.T").unwrap();
        assert!(approx(p.amount, 1299.0));
    }

    #[test]
    fn test_normalize_symbol_prices() {
        let p = normalize_price("$1,234.56").unwrap();
        assert!(approx(p.amount, 1234.56));
        assert_eq!(p.currency, Some(Currency::Usd));

        let p = normalize_price("99.99£").unwrap();
        assert!(approx(p.amount, 99.99));
        assert_eq!(p.currency, Some(Currency::Gbp));

        let p = normalize_price("US $145.95").unwrap();
        assert!(approx(p.amount, 145.95));

        let p = normalize_price("€1.234").unwrap();
        assert!(approx(p.amount, 1234.0));
        assert_eq!(p.currency, Some(Currency::Eur));
    }

    #[test]
    fn test_normalize_mixed_separators() {
        let p = normalize_price("1.234.567,89€").unwrap();
        assert!(approx(p.amount, 1_234_567.89));
        let p = normalize_price("1,234,567.89 $").unwrap();
        assert!(approx(p.amount, 1_234_567.89));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["1 234,56 DT", "$1,234.56", "19,500 DT", "1234.567", "0.5", "42"] {
            let first = normalize_price(raw).unwrap();
            let again = normalize_price(&first.canonical()).unwrap();
            assert!(approx(first.amount, again.amount), "{raw}");
            let third = normalize_price(&again.canonical()).unwrap();
            assert_eq!(again.canonical(), third.canonical());
        }
    }

    #[test]
    fn test_normalize_rejects_non_prices() {
        for raw in ["", "DT", "€", "abc", "NaN", "inf", "1..2", ",5", "5,", "12 DT DT", "$5€"] {
            assert!(
                matches!(normalize_price(raw), Err(NormalizeError::NotAPrice(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("TND"), Some(Currency::Tnd));
        assert_eq!(Currency::from_code(" D.T "), Some(Currency::Tnd));
        assert_eq!(Currency::from_code("JPY"), None);
    }

    #[test]
    fn test_format_grouped() {
        assert_eq!(format_grouped(19.5), "19,500");
        assert_eq!(format_grouped(1234.5), "1 234,500");
        assert_eq!(format_grouped(1_234_567.0), "1 234 567,000");
        assert_eq!(format_grouped(0.0), "0,000");
        assert_eq!(format_grouped(-12.25), "-12,250");
    }
}
