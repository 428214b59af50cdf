//! Block-element scoring and product container selection.

use crate::dom::{self, Document, StripSet};
use scraper::ElementRef;

/// Tags that can act as a product container.
const CONTAINER_TAGS: [&str; 4] = ["div", "section", "article", "main"];

const INDICATOR_BOOST: f64 = 1.5;
const MAX_LENGTH_FACTOR: f64 = 3.0;

/// Vocabulary of `id`/`class` fragments that mark product content.
#[derive(Debug, Clone)]
pub struct ProductIndicators {
    words: Vec<String>,
}

impl ProductIndicators {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.into().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether `value` contains any indicator, ignoring ASCII case.
    pub fn matches(&self, value: &str) -> bool {
        let value = value.to_ascii_lowercase();
        self.words.iter().any(|w| value.contains(w.as_str()))
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl Default for ProductIndicators {
    fn default() -> Self {
        Self::new(["product", "item", "detail", "main", "content"])
    }
}

/// Weights candidate elements by text mass, nesting depth and naming.
pub struct NodeScorer<'a> {
    indicators: &'a ProductIndicators,
    strip: StripSet,
}

impl<'a> NodeScorer<'a> {
    pub fn new(indicators: &'a ProductIndicators) -> Self {
        Self {
            indicators,
            strip: StripSet::BOILERPLATE,
        }
    }

    /// `boost * min(len / 100, 3) / max(depth, 1)`.
    pub fn weight(&self, el: ElementRef<'_>) -> f64 {
        self.score(el, dom::depth(el), dom::text_len(el, &self.strip))
    }

    fn score(&self, el: ElementRef<'_>, depth: usize, text_len: usize) -> f64 {
        let named = ["id", "class"]
            .iter()
            .filter_map(|name| el.value().attr(name))
            .any(|v| self.indicators.matches(v));
        let boost = if named { INDICATOR_BOOST } else { 1.0 };

        let length_factor = (text_len as f64 / 100.0).min(MAX_LENGTH_FACTOR);
        let depth_factor = depth.max(1) as f64;

        boost * length_factor / depth_factor
    }

    /// The visible block element with the strictly greatest weight.
    ///
    /// Ties keep the earliest element. When nothing scores above zero the
    /// document's root element stands in for the container.
    pub fn find_product_container<'d>(&self, doc: &'d Document) -> ElementRef<'d> {
        let mut best: Option<(ElementRef<'d>, f64)> = None;
        for m in dom::measure(doc.root(), &self.strip) {
            let el = m.el;
            if !CONTAINER_TAGS.iter().any(|t| dom::tag_is(&el, t)) {
                continue;
            }
            let weight = self.score(el, m.depth, m.text_len);
            if weight <= 0.0 {
                continue;
            }
            match best {
                Some((_, w)) if weight <= w => {}
                _ => best = Some((el, weight)),
            }
        }

        match best {
            Some((el, weight)) => {
                tracing::debug!(
                    tag = el.value().name(),
                    weight,
                    "selected product container"
                );
                el
            }
            None => {
                tracing::debug!("no scoring container, using document root");
                doc.root()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(n: usize) -> String {
        "x".repeat(n)
    }

    fn first<'d>(doc: &'d Document, tag: &str) -> ElementRef<'d> {
        doc.elements(&StripSet::NONE)
            .into_iter()
            .find(|e| dom::tag_is(e, tag))
            .unwrap()
    }

    #[test]
    fn test_indicator_boost_is_monotonic() {
        let indicators = ProductIndicators::default();
        let scorer = NodeScorer::new(&indicators);
        let text = filler(150);
        let plain = Document::parse(&format!("<html><body><div>{text}</div></body></html>"));
        let named = Document::parse(&format!(
            r#"<html><body><div class="Product-Detail">{text}</div></body></html>"#
        ));
        let w_plain = scorer.weight(first(&plain, "div"));
        let w_named = scorer.weight(first(&named, "div"));
        assert!(w_named > w_plain);
        assert!((w_named / w_plain - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_length_factor_is_capped() {
        let indicators = ProductIndicators::default();
        let scorer = NodeScorer::new(&indicators);
        let long = Document::parse(&format!("<html><body><div>{}</div></body></html>", filler(900)));
        let capped = Document::parse(&format!("<html><body><div>{}</div></body></html>", filler(300)));
        let a = scorer.weight(first(&long, "div"));
        let b = scorer.weight(first(&capped, "div"));
        assert!((a - b).abs() < 1e-9);
        // html=1, body=2, div=3
        assert!((a - 3.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_boilerplate_text_is_not_counted() {
        let indicators = ProductIndicators::default();
        let scorer = NodeScorer::new(&indicators);
        let doc = Document::parse(&format!(
            "<html><body><div><nav>{}</nav></div></body></html>",
            filler(300)
        ));
        assert_eq!(scorer.weight(first(&doc, "div")), 0.0);
    }

    #[test]
    fn test_container_prefers_named_block() {
        let indicators = ProductIndicators::default();
        let scorer = NodeScorer::new(&indicators);
        let text = filler(200);
        let doc = Document::parse(&format!(
            r#"<html><body>
                <section>{text}</section>
                <section class="product-info">{text}</section>
            </body></html>"#
        ));
        let container = scorer.find_product_container(&doc);
        assert_eq!(container.value().attr("class"), Some("product-info"));
    }

    #[test]
    fn test_container_search_on_wide_page() {
        let indicators = ProductIndicators::default();
        let scorer = NodeScorer::new(&indicators);
        let mut body = String::new();
        for i in 0..3_000 {
            body.push_str(&format!("<div><section><p>row {i} {}</p></section></div>", filler(40)));
        }
        body.push_str(&format!(r#"<div id="product-main">{}</div>"#, filler(400)));
        let doc = Document::parse(&format!("<html><body>{body}</body></html>"));
        assert_eq!(
            scorer.find_product_container(&doc).value().attr("id"),
            Some("product-main")
        );
    }

    #[test]
    fn test_container_tie_keeps_first() {
        let indicators = ProductIndicators::default();
        let scorer = NodeScorer::new(&indicators);
        let text = filler(200);
        let doc = Document::parse(&format!(
            r#"<html><body><article id="a">{text}</article><article id="b">{text}</article></body></html>"#
        ));
        assert_eq!(scorer.find_product_container(&doc).value().attr("id"), Some("a"));
    }

    #[test]
    fn test_container_falls_back_to_root() {
        let indicators = ProductIndicators::default();
        let scorer = NodeScorer::new(&indicators);
        let doc = Document::parse("<html><body><p>tiny</p></body></html>");
        assert!(dom::tag_is(&scorer.find_product_container(&doc), "html"));
    }
}
