//! Core data types shared by the extraction and matching engines.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Ordered attribute mapping of an element, in source order.
pub type Attributes = IndexMap<String, AttrValue>;

/// Value of an HTML attribute.
///
/// Multi-valued attributes (`class`, `rel`) are split into a `Set`; every
/// other attribute is a `Single` string. Serialized untagged, so a hint can
/// say either `"property": "og:price"` or `"class": ["price", "big"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Single(String),
    Set(Vec<String>),
}

impl AttrValue {
    /// Check whether a raw attribute value satisfies this expected value.
    ///
    /// A `Single` matches the whole raw value or any of its whitespace
    /// tokens. A `Set` matches when every member does.
    pub fn matches(&self, raw: &str) -> bool {
        match self {
            AttrValue::Single(expected) => value_or_token_eq(raw, expected),
            AttrValue::Set(expected) => expected.iter().all(|e| value_or_token_eq(raw, e)),
        }
    }

    /// Whether any member of the value contains `needle` (ASCII case-insensitive).
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        match self {
            AttrValue::Single(v) => v.to_ascii_lowercase().contains(&needle),
            AttrValue::Set(vs) => vs.iter().any(|v| v.to_ascii_lowercase().contains(&needle)),
        }
    }
}

fn value_or_token_eq(raw: &str, expected: &str) -> bool {
    raw == expected || raw.split_whitespace().any(|token| token == expected)
}

/// Which field of a page a hint or candidate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Price,
    Description,
    Stock,
}

impl FieldKind {
    /// Attributes that carry per-instance values and must not end up in a
    /// reusable hint.
    pub fn volatile_attributes(&self) -> &'static [&'static str] {
        const COMMON: &[&str] = &[
            "content",
            "value",
            "data-price",
            "data-value",
            "data-amount",
            "id",
            "data-product",
            "href",
        ];
        const STOCK: &[&str] = &[
            "content",
            "value",
            "data-price",
            "data-value",
            "data-amount",
            "id",
            "data-product",
            "href",
            "class",
            "title",
        ];
        match self {
            FieldKind::Price | FieldKind::Description => COMMON,
            FieldKind::Stock => STOCK,
        }
    }
}

/// Caller-supplied structural template for one field.
///
/// Usually learned from a previous `extract_patterns` call on the same site
/// template. `attributes` may be empty, in which case the hint means "any
/// attribute-less element with this tag".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionHint {
    pub tag: String,
    #[serde(default, deserialize_with = "attributes_from_object_or_string")]
    pub attributes: Attributes,
}

impl ExtractionHint {
    /// Create a hint from a tag and attribute map.
    pub fn new(tag: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            tag: tag.into(),
            attributes,
        }
    }

    /// Parse a hint from its JSON wire form.
    ///
    /// Accepts both `{"tag": "meta", "attributes": {...}}` and the legacy
    /// form where `attributes` is itself a JSON-encoded string.
    pub fn from_json(raw: &str) -> Result<Self, HintError> {
        let hint: ExtractionHint =
            serde_json::from_str(raw).map_err(|e| HintError::Malformed(e.to_string()))?;
        if hint.tag.trim().is_empty() {
            return Err(HintError::MissingTag);
        }
        Ok(hint)
    }

    /// Whether the hint pins down attributes, or only the tag.
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }
}

fn attributes_from_object_or_string<'de, D>(deserializer: D) -> Result<Attributes, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Object(Attributes),
        Encoded(String),
        Null(()),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Object(attrs) => Ok(attrs),
        Wire::Encoded(s) if s.trim().is_empty() => Ok(Attributes::new()),
        Wire::Encoded(s) => serde_json::from_str(&s).map_err(serde::de::Error::custom),
        Wire::Null(()) => Ok(Attributes::new()),
    }
}

/// Optional hints for a single-value extraction call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHints {
    pub price: Option<ExtractionHint>,
    pub description: Option<ExtractionHint>,
    pub stock: Option<ExtractionHint>,
}

/// Result of one single-value extraction call.
///
/// Every field is optional: a page without a stock indicator is a normal
/// outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub price: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub stock: Option<String>,
}

/// Where a price value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Element located by a hint with attributes.
    Hint,
    /// Attribute-less element with the hinted tag.
    HintScan,
    /// `<meta>` price content.
    Metadata,
    /// First grammar match in document order.
    Heuristic,
}

/// A price found in pattern mode, with the structure that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub price: String,
    pub tag: String,
    pub attributes: Attributes,
    pub source: PriceSource,
}

impl PriceCandidate {
    /// Turn the candidate into a hint usable by a later `extract_fields` call.
    pub fn to_hint(&self) -> ExtractionHint {
        ExtractionHint::new(self.tag.clone(), self.attributes.clone())
    }
}

/// A description or stock element found in pattern mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCandidate {
    pub text_content: String,
    pub tag: String,
    pub attributes: Attributes,
}

impl FieldCandidate {
    pub fn to_hint(&self) -> ExtractionHint {
        ExtractionHint::new(self.tag.clone(), self.attributes.clone())
    }
}

/// Everything pattern mode discovered on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub prices: Vec<PriceCandidate>,
    pub description: Vec<FieldCandidate>,
    pub stock: Vec<FieldCandidate>,
}

/// A product in the monitored catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: i64,
    pub target_id: i64,
    pub name: String,
    pub description: String,
    pub price: String,
    pub url: String,
}

/// A competitor price scraped from one page. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub id: i64,
    pub competitor_id: i64,
    pub title: String,
    pub description: String,
    pub price_raw: String,
    pub url: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

/// One product ↔ observation pairing produced by a matching run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub product_id: i64,
    pub observation_id: i64,
    pub similarity: f32,
}

/// Errors raised while reading an extraction hint.
#[derive(thiserror::Error, Debug)]
pub enum HintError {
    #[error("malformed hint JSON: {0}")]
    Malformed(String),

    #[error("hint is missing a tag name")]
    MissingTag,
}

/// Errors from a text embedding backend.
#[derive(thiserror::Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding model error: {0}")]
    Model(String),

    #[error("embedder returned {got} vectors for {expected} inputs")]
    BatchSize { expected: usize, got: usize },
}

/// Errors from a catalog store backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_value_single_matches_token() {
        let v = AttrValue::Single("price".into());
        assert!(v.matches("price"));
        assert!(v.matches("product-price price"));
        assert!(!v.matches("product-price"));
    }

    #[test]
    fn test_attr_value_set_requires_every_member() {
        let v = AttrValue::Set(vec!["price".into(), "big".into()]);
        assert!(v.matches("big price"));
        assert!(!v.matches("price"));
    }

    #[test]
    fn test_hint_from_json_object() {
        let hint = ExtractionHint::from_json(
            r#"{"tag":"meta","attributes":{"property":["product:price:amount"]}}"#,
        )
        .unwrap();
        assert_eq!(hint.tag, "meta");
        assert_eq!(
            hint.attributes.get("property"),
            Some(&AttrValue::Set(vec!["product:price:amount".into()]))
        );
    }

    #[test]
    fn test_hint_from_json_encoded_attributes() {
        let hint = ExtractionHint::from_json(
            r#"{"tag":"span","attributes":"{\"class\": [\"price\"]}"}"#,
        )
        .unwrap();
        assert_eq!(hint.tag, "span");
        assert!(hint.has_attributes());
    }

    #[test]
    fn test_hint_empty_attributes() {
        let hint = ExtractionHint::from_json(r#"{"tag":"span","attributes":"{}"}"#).unwrap();
        assert!(!hint.has_attributes());
        let hint = ExtractionHint::from_json(r#"{"tag":"span"}"#).unwrap();
        assert!(!hint.has_attributes());
    }

    #[test]
    fn test_hint_rejects_malformed() {
        assert!(matches!(
            ExtractionHint::from_json("{not json"),
            Err(HintError::Malformed(_))
        ));
        assert!(matches!(
            ExtractionHint::from_json(r#"{"tag":"  ","attributes":{}}"#),
            Err(HintError::MissingTag)
        ));
    }

    #[test]
    fn test_stock_strips_class_and_title() {
        assert!(FieldKind::Stock.volatile_attributes().contains(&"class"));
        assert!(!FieldKind::Price.volatile_attributes().contains(&"class"));
    }
}
