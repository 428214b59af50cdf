//! Field extraction: fallback chains for price, title, description and
//! stock, plus the pattern discovery mode that proposes reusable hints.

use crate::dom::{self, Document, StripSet};
use crate::grammar;
use crate::normalize::format_grouped;
use crate::scorer::{NodeScorer, ProductIndicators};
use crate::types::{
    ExtractionHint, FieldCandidate, FieldHints, FieldKind, FieldRecord, PatternReport,
    PriceCandidate, PriceSource,
};
use scraper::ElementRef;
use std::sync::Arc;

const PRICE_CURRENCY_PROPERTY: &str = "product:price:currency";
const METADATA_CURRENCY: &str = "DT";

/// Title metadata, most specific first: `(attribute, value)`.
const TITLE_METAS: [(&str, &str); 4] = [
    ("property", "og:title"),
    ("property", "twitter:title"),
    ("name", "twitter:title"),
    ("name", "title"),
];

/// Extracts commercial fields from rendered HTML.
///
/// Stateless apart from the indicator vocabulary, so one extractor can serve
/// any number of pages.
#[derive(Clone, Default)]
pub struct FieldExtractor {
    indicators: Arc<ProductIndicators>,
}

impl FieldExtractor {
    pub fn new(indicators: Arc<ProductIndicators>) -> Self {
        Self { indicators }
    }

    pub fn indicators(&self) -> &ProductIndicators {
        &self.indicators
    }

    /// Single-value mode: one value per field, each field independent.
    pub fn extract_fields(&self, html: &str, hints: &FieldHints) -> FieldRecord {
        let doc = Document::parse(html);
        let price = self
            .price_with_source(&doc, hints.price.as_ref())
            .map(|(price, source)| {
                tracing::debug!(?source, %price, "price resolved");
                price
            });
        let record = FieldRecord {
            price,
            title: self.title(&doc),
            description: hints
                .description
                .as_ref()
                .and_then(|h| hinted_value(&doc, h)),
            stock: hints.stock.as_ref().and_then(|h| hinted_value(&doc, h)),
        };
        tracing::info!(
            price = record.price.is_some(),
            title = record.title.is_some(),
            description = record.description.is_some(),
            stock = record.stock.is_some(),
            "extracted fields"
        );
        record
    }

    /// Run the price chain: hint, hint scan, metadata, heuristic.
    pub fn price_with_source(
        &self,
        doc: &Document,
        hint: Option<&ExtractionHint>,
    ) -> Option<(String, PriceSource)> {
        if let Some(hint) = hint {
            if hint.has_attributes() {
                if let Some(price) = hinted_price(doc, hint) {
                    return Some((price, PriceSource::Hint));
                }
                tracing::debug!(tag = %hint.tag, "price hint matched nothing usable");
            } else if let Some(price) = scan_bare_tag(doc, &hint.tag) {
                return Some((price, PriceSource::HintScan));
            } else {
                tracing::debug!(tag = %hint.tag, "no bare element with a price");
            }
        }

        if let Some(candidate) = metadata_prices(doc).into_iter().next() {
            return Some((candidate.price, PriceSource::Metadata));
        }

        heuristic_prices(doc)
            .into_iter()
            .next()
            .map(|el| (dom::trimmed_text(el, &StripSet::BOILERPLATE), PriceSource::Heuristic))
    }

    /// Title from metadata, then the container's first visible heading.
    pub fn title(&self, doc: &Document) -> Option<String> {
        for (attr, value) in TITLE_METAS {
            if let Some(title) = doc.meta_content(attr, value) {
                return Some(title);
            }
        }

        let container = NodeScorer::new(&self.indicators).find_product_container(doc);
        dom::visible_elements(container, &StripSet::BOILERPLATE)
            .into_iter()
            .find(|el| dom::tag_is(el, "h1"))
            .map(|h1| dom::collapsed_text(h1, &StripSet::BOILERPLATE))
            .filter(|t| !t.is_empty())
    }

    /// Pattern mode: every candidate for each field, with cleaned structure.
    pub fn extract_patterns(&self, html: &str) -> PatternReport {
        let doc = Document::parse(html);

        let mut prices = metadata_prices(&doc);
        for el in heuristic_prices(&doc) {
            if !dom::has_attributes(&el) {
                continue;
            }
            prices.push(PriceCandidate {
                price: dom::trimmed_text(el, &StripSet::BOILERPLATE),
                tag: el.value().name().to_string(),
                attributes: dom::cleaned_attributes(&el, FieldKind::Price),
                source: PriceSource::Heuristic,
            });
        }

        let description = discover(&doc, FieldKind::Description, |el| {
            any_attr_contains(el, "description", None)
        });
        let stock = discover(&doc, FieldKind::Stock, |el| {
            !dom::tag_is(el, "main") && any_attr_contains(el, "stock", Some("stockage"))
        });

        tracing::info!(
            prices = prices.len(),
            description = description.len(),
            stock = stock.len(),
            "discovered patterns"
        );
        PatternReport {
            prices,
            description,
            stock,
        }
    }
}

fn hinted_price(doc: &Document, hint: &ExtractionHint) -> Option<String> {
    let el = doc.find_hinted(hint, &StripSet::NONE)?;
    if let Some(content) = el.value().attr("content") {
        let currency = doc.meta_content("property", PRICE_CURRENCY_PROPERTY);
        if let (Some(currency), Ok(amount)) = (currency, content.trim().parse::<f64>()) {
            if amount.is_finite() {
                return Some(format!("{} {}", format_grouped(amount), currency));
            }
        }
    }
    let text = dom::trimmed_text(el, &StripSet::SCRIPTS);
    if text.is_empty() {
        // Metadata elements have no text; fall back to the raw content.
        el.value()
            .attr("content")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    } else {
        Some(text)
    }
}

/// First attribute-less element with `tag` whose text is a price token.
fn scan_bare_tag(doc: &Document, tag: &str) -> Option<String> {
    doc.elements(&StripSet::SCRIPTS)
        .into_iter()
        .filter(|el| dom::tag_is(el, tag) && !dom::has_attributes(el))
        .map(|el| dom::trimmed_text(el, &StripSet::SCRIPTS))
        .find(|text| grammar::is_price(text))
}

/// `<meta>` elements mentioning a price with a numeric `content`.
fn metadata_prices(doc: &Document) -> Vec<PriceCandidate> {
    let mut out = Vec::new();
    for meta in doc.metas() {
        if !meta.html().to_lowercase().contains("price") {
            continue;
        }
        let Some(content) = meta.value().attr("content") else {
            continue;
        };
        match content.trim().parse::<f64>() {
            Ok(amount) if amount.is_finite() => out.push(PriceCandidate {
                price: format!("{} {}", format_grouped(amount), METADATA_CURRENCY),
                tag: "meta".to_string(),
                attributes: dom::cleaned_attributes(&meta, FieldKind::Price),
                source: PriceSource::Metadata,
            }),
            _ => tracing::debug!(content, "skipping non-numeric price metadata"),
        }
    }
    out
}

/// Visible elements whose whole trimmed text is a price token.
///
/// The measured length never exceeds the trimmed text length, so subtrees
/// over the grammar's limit are skipped without building their text.
fn heuristic_prices(doc: &Document) -> Vec<ElementRef<'_>> {
    dom::measure(doc.root(), &StripSet::BOILERPLATE)
        .into_iter()
        .filter(|m| m.text_len > 0 && m.text_len <= grammar::MAX_PRICE_CHARS)
        .map(|m| m.el)
        .filter(|el| grammar::is_price(&dom::trimmed_text(*el, &StripSet::BOILERPLATE)))
        .collect()
}

/// `content` of the hinted element, else its trimmed text.
fn hinted_value(doc: &Document, hint: &ExtractionHint) -> Option<String> {
    let el = doc.find_hinted(hint, &StripSet::NONE)?;
    let value = match el.value().attr("content") {
        Some(content) => content.trim().to_string(),
        None => dom::trimmed_text(el, &StripSet::SCRIPTS),
    };
    (!value.is_empty()).then_some(value)
}

fn any_attr_contains(el: &ElementRef<'_>, needle: &str, unless: Option<&str>) -> bool {
    el.value().attrs().any(|(_, raw)| {
        let raw = raw.to_lowercase();
        raw.contains(needle) && unless.map_or(true, |u| !raw.contains(u))
    })
}

fn discover<F>(doc: &Document, kind: FieldKind, select: F) -> Vec<FieldCandidate>
where
    F: Fn(&ElementRef<'_>) -> bool,
{
    doc.elements(&StripSet::SCRIPTS)
        .into_iter()
        .filter(|el| select(el))
        .filter_map(|el| {
            let mut text = dom::collapsed_text(el, &StripSet::SCRIPTS);
            if text.is_empty() {
                text = el.value().attr("content").unwrap_or_default().trim().to_string();
            }
            if text.is_empty() {
                return None;
            }
            Some(FieldCandidate {
                text_content: text,
                tag: el.value().name().to_string(),
                attributes: dom::cleaned_attributes(&el, kind),
            })
        })
        .collect()
}
