//! Read-only document model over a parsed HTML payload.
//!
//! The tree is never mutated. Tag stripping is expressed as a [`StripSet`]
//! view: walking the document with a strip set skips the hidden subtrees and
//! their text, so one parse serves both the pristine metadata lookups and the
//! boilerplate-free heuristic scans.

use crate::types::{AttrValue, Attributes, ExtractionHint, FieldKind};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("meta selector is valid"));

/// Attributes whose values are whitespace-separated token lists.
const MULTI_VALUED: [&str; 2] = ["class", "rel"];

/// A set of tag names hidden from a traversal.
#[derive(Debug, Clone, Copy)]
pub struct StripSet {
    tags: &'static [&'static str],
}

impl StripSet {
    /// Executable and embedded content only.
    pub const SCRIPTS: StripSet = StripSet {
        tags: &["script", "style", "noscript", "iframe"],
    };

    /// Scripts plus page chrome: head, navigation, links, lists and struck
    /// prices.
    pub const BOILERPLATE: StripSet = StripSet {
        tags: &[
            "script", "style", "noscript", "iframe", "head", "footer", "nav", "del", "header",
            "a", "ol", "ul", "li",
        ],
    };

    /// Nothing hidden.
    pub const NONE: StripSet = StripSet { tags: &[] };

    pub fn hides(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// A parsed HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// The `<html>` element.
    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// Every element visible under `strip`, depth-first in document order.
    pub fn elements(&self, strip: &StripSet) -> Vec<ElementRef<'_>> {
        visible_elements(self.root(), strip)
    }

    /// All `<meta>` elements in document order.
    pub fn metas(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.select(&META)
    }

    /// `content` of the first `<meta>` whose `attr` equals `value`.
    ///
    /// Missing element, missing `content` and blank `content` all give `None`.
    pub fn meta_content(&self, attr: &str, value: &str) -> Option<String> {
        self.metas()
            .find(|m| m.value().attr(attr) == Some(value))
            .and_then(|m| m.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }

    /// First element matching a hint's tag and attributes.
    pub fn find_hinted(&self, hint: &ExtractionHint, strip: &StripSet) -> Option<ElementRef<'_>> {
        self.elements(strip)
            .into_iter()
            .find(|el| matches_hint(el, hint))
    }
}

/// Elements under (and including) `root`, skipping hidden subtrees.
pub fn visible_elements<'a>(root: ElementRef<'a>, strip: &StripSet) -> Vec<ElementRef<'a>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(el) = stack.pop() {
        if strip.hides(el.value().name()) {
            continue;
        }
        out.push(el);
        let children: Vec<ElementRef<'a>> = el.children().filter_map(ElementRef::wrap).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Raw text nodes under `root` that survive `strip`. Comments are never text.
pub fn text_nodes<'a>(root: ElementRef<'a>, strip: &StripSet) -> Vec<&'a str> {
    let mut out = Vec::new();
    collect_text(root, strip, &mut out);
    out
}

fn collect_text<'a>(el: ElementRef<'a>, strip: &StripSet, out: &mut Vec<&'a str>) {
    if strip.hides(el.value().name()) {
        return;
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push(&**text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, strip, out);
                }
            }
            _ => {}
        }
    }
}

/// Concatenated visible text, trimmed at both ends.
pub fn trimmed_text(el: ElementRef<'_>, strip: &StripSet) -> String {
    text_nodes(el, strip).concat().trim().to_string()
}

/// Visible text with every whitespace run collapsed to one space.
pub fn collapsed_text(el: ElementRef<'_>, strip: &StripSet) -> String {
    text_nodes(el, strip)
        .concat()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sum of the trimmed lengths of the visible text nodes, in characters.
pub fn text_len(el: ElementRef<'_>, strip: &StripSet) -> usize {
    text_nodes(el, strip)
        .iter()
        .map(|t| t.trim().chars().count())
        .sum()
}

/// A visible element with its depth and [`text_len`], from [`measure`].
#[derive(Debug, Clone, Copy)]
pub struct Measured<'a> {
    pub el: ElementRef<'a>,
    pub depth: usize,
    pub text_len: usize,
}

/// Every visible element under `root`, in document order, with depth and
/// visible text length filled in by a single post-order pass.
pub fn measure<'a>(root: ElementRef<'a>, strip: &StripSet) -> Vec<Measured<'a>> {
    let mut out = Vec::new();
    measure_into(root, depth(root), strip, &mut out);
    out
}

fn measure_into<'a>(
    el: ElementRef<'a>,
    depth: usize,
    strip: &StripSet,
    out: &mut Vec<Measured<'a>>,
) -> usize {
    if strip.hides(el.value().name()) {
        return 0;
    }
    let slot = out.len();
    out.push(Measured {
        el,
        depth,
        text_len: 0,
    });
    let mut len = 0;
    for child in el.children() {
        match child.value() {
            Node::Text(text) => len += text.trim().chars().count(),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    len += measure_into(child_el, depth + 1, strip, out);
                }
            }
            _ => {}
        }
    }
    out[slot].text_len = len;
    len
}

/// Distance from the document node; `<html>` is at depth 1.
pub fn depth(el: ElementRef<'_>) -> usize {
    el.ancestors().count()
}

pub fn tag_is(el: &ElementRef<'_>, tag: &str) -> bool {
    el.value().name().eq_ignore_ascii_case(tag)
}

pub fn has_attributes(el: &ElementRef<'_>) -> bool {
    el.value().attrs().next().is_some()
}

/// Whether `el` carries every hinted attribute with a matching value.
pub fn matches_hint(el: &ElementRef<'_>, hint: &ExtractionHint) -> bool {
    tag_is(el, &hint.tag)
        && hint.attributes.iter().all(|(name, expected)| {
            el.value()
                .attr(name)
                .map(|raw| expected.matches(raw))
                .unwrap_or(false)
        })
}

/// Typed attribute map of an element, in source order.
pub fn attributes(el: &ElementRef<'_>) -> Attributes {
    el.value()
        .attrs()
        .map(|(name, raw)| (name.to_string(), attr_value(name, raw)))
        .collect()
}

/// Attribute map with the per-instance attributes for `kind` removed.
pub fn cleaned_attributes(el: &ElementRef<'_>, kind: FieldKind) -> Attributes {
    let volatile = kind.volatile_attributes();
    el.value()
        .attrs()
        .filter(|(name, _)| !volatile.contains(name))
        .map(|(name, raw)| (name.to_string(), attr_value(name, raw)))
        .collect()
}

fn attr_value(name: &str, raw: &str) -> AttrValue {
    if MULTI_VALUED.contains(&name) {
        AttrValue::Set(raw.split_whitespace().map(str::to_string).collect())
    } else {
        AttrValue::Single(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttrValue;

    const PAGE: &str = r#"
        <html><head><title>T</title><meta property="og:title" content="  Shoe  "></head>
        <body>
          <nav><span>Menu</span></nav>
          <div id="main" class="product main">
            <!-- hidden comment -->
            <h1>Red   Shoe</h1>
            <script>var x = "99 DT";</script>
            <ul><li>item</li></ul>
            <span>99 DT</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_measure_agrees_with_per_element_helpers() {
        let doc = Document::parse(PAGE);
        for strip in [StripSet::NONE, StripSet::SCRIPTS, StripSet::BOILERPLATE] {
            let measured = measure(doc.root(), &strip);
            let elements = doc.elements(&strip);
            assert_eq!(measured.len(), elements.len());
            for (m, el) in measured.iter().zip(elements) {
                assert_eq!(m.el.id(), el.id());
                assert_eq!(m.depth, depth(el));
                assert_eq!(m.text_len, text_len(el, &strip));
            }
        }
    }

    #[test]
    fn test_depth_counts_from_document() {
        let doc = Document::parse(PAGE);
        assert_eq!(depth(doc.root()), 1);
        let body = doc
            .elements(&StripSet::NONE)
            .into_iter()
            .find(|e| tag_is(e, "body"))
            .unwrap();
        assert_eq!(depth(body), 2);
    }

    #[test]
    fn test_strip_view_hides_subtrees() {
        let doc = Document::parse(PAGE);
        let visible = doc.elements(&StripSet::BOILERPLATE);
        assert!(visible.iter().all(|e| !tag_is(e, "li") && !tag_is(e, "nav")));
        assert!(visible.iter().any(|e| tag_is(e, "span")));
        // The same tree still answers pristine lookups.
        assert!(doc.elements(&StripSet::NONE).iter().any(|e| tag_is(e, "li")));
    }

    #[test]
    fn test_text_skips_scripts_and_comments() {
        let doc = Document::parse(PAGE);
        let div = doc
            .elements(&StripSet::NONE)
            .into_iter()
            .find(|e| tag_is(e, "div"))
            .unwrap();
        let text = collapsed_text(div, &StripSet::BOILERPLATE);
        assert_eq!(text, "Red Shoe 99 DT");
        assert!(!text.contains("var x"));
        assert!(!text.contains("hidden comment"));
    }

    #[test]
    fn test_meta_content_trims_and_requires_value() {
        let doc = Document::parse(PAGE);
        assert_eq!(doc.meta_content("property", "og:title").as_deref(), Some("Shoe"));
        assert_eq!(doc.meta_content("property", "twitter:title"), None);
    }

    #[test]
    fn test_attributes_keep_order_and_split_class() {
        let doc = Document::parse(PAGE);
        let div = doc
            .elements(&StripSet::NONE)
            .into_iter()
            .find(|e| tag_is(e, "div"))
            .unwrap();
        let attrs = attributes(&div);
        let keys: Vec<&str> = attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "class"]);
        assert_eq!(
            attrs.get("class"),
            Some(&AttrValue::Set(vec!["product".into(), "main".into()]))
        );
        let cleaned = cleaned_attributes(&div, FieldKind::Price);
        assert!(!cleaned.contains_key("id"));
        assert!(cleaned.contains_key("class"));
    }

    #[test]
    fn test_find_hinted() {
        let doc = Document::parse(PAGE);
        let hint = ExtractionHint::from_json(r#"{"tag":"div","attributes":{"class":["product"]}}"#)
            .unwrap();
        let found = doc.find_hinted(&hint, &StripSet::NONE).unwrap();
        assert_eq!(found.value().attr("id"), Some("main"));

        let miss = ExtractionHint::from_json(r#"{"tag":"div","attributes":{"class":"sidebar"}}"#)
            .unwrap();
        assert!(doc.find_hinted(&miss, &StripSet::NONE).is_none());
    }
}
