//! Parsed-page wrapper over `scraper::Html` with base-URL resolution.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A fetched portal page: the parsed DOM, the raw HTML it came from, and
/// the URL it resolved to (after redirects), used as the base for relative
/// links.
///
/// Query methods take CSS selectors. A selector that fails to parse is
/// treated as matching nothing; the selectors used by this crate's callers
/// are fixed strings, so a parse failure is logged rather than surfaced.
#[derive(Debug)]
pub struct Document {
    html: Html,
    raw: String,
    base: Url,
}

impl Document {
    /// Parses `raw` as a full HTML document with the given base URL.
    pub fn parse(raw: &str, base: Url) -> Self {
        Self {
            html: Html::parse_document(raw),
            raw: raw.to_string(),
            base,
        }
    }

    /// The URL this page was fetched from.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// The raw HTML, as received. Used when preserving pages for diagnosis.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn selector(css: &str) -> Option<Selector> {
        match Selector::parse(css) {
            Ok(sel) => Some(sel),
            Err(e) => {
                tracing::warn!("invalid selector {:?}: {}", css, e);
                None
            }
        }
    }

    /// All elements matching `css`, in document order.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        let Some(sel) = Self::selector(css) else {
            return Vec::new();
        };
        self.html.select(&sel).collect()
    }

    /// Joined, trimmed text of the first element matching `css`.
    /// Returns `None` when nothing matches or the text is empty.
    pub fn first_text(&self, css: &str) -> Option<String> {
        self.select(css).into_iter().find_map(|el| {
            let text = element_text(el);
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        })
    }

    /// Joined, trimmed text of every element matching `css`.
    pub fn all_texts(&self, css: &str) -> Vec<String> {
        self.select(css)
            .into_iter()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// The value of `attr` on the first element matching `css`.
    pub fn first_attr(&self, css: &str, attr: &str) -> Option<String> {
        self.select(css)
            .into_iter()
            .find_map(|el| el.value().attr(attr).map(str::to_string))
    }

    /// The value of `attr` on every element matching `css` that carries it.
    pub fn all_attrs(&self, css: &str, attr: &str) -> Vec<String> {
        self.select(css)
            .into_iter()
            .filter_map(|el| el.value().attr(attr).map(str::to_string))
            .collect()
    }

    /// Every text node on the page, joined with single spaces.
    pub fn body_text(&self) -> String {
        let fragments: Vec<&str> = self
            .html
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        fragments.join(" ")
    }

    /// Whether the raw HTML contains `needle` verbatim.
    pub fn contains(&self, needle: &str) -> bool {
        self.raw.contains(needle)
    }

    /// Resolves `href` against this page's base URL.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        self.base.join(href).ok()
    }
}

/// Whitespace-normalized text content of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    let fragments: Vec<&str> = el.text().map(str::trim).filter(|t| !t.is_empty()).collect();
    fragments.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, Url::parse("https://portal.example/search").unwrap())
    }

    #[test]
    fn first_text_joins_nested_fragments() {
        let d = doc("<table><td id='a'> <b>Hello</b> world </td></table>");
        assert_eq!(d.first_text("td#a"), Some("Hello world".to_string()));
    }

    #[test]
    fn first_text_skips_empty_matches() {
        let d = doc("<p class='x'>   </p><p class='x'>value</p>");
        assert_eq!(d.first_text("p.x"), Some("value".to_string()));
    }

    #[test]
    fn first_attr_reads_attribute() {
        let d = doc("<input name='form_build_id' value='form-abc123'>");
        assert_eq!(
            d.first_attr("input[name='form_build_id']", "value"),
            Some("form-abc123".to_string())
        );
    }

    #[test]
    fn resolve_joins_relative_href() {
        let d = doc("<html></html>");
        let url = d.resolve("?q=node/385&id=7").unwrap();
        assert_eq!(url.as_str(), "https://portal.example/search?q=node/385&id=7");
    }

    #[test]
    fn invalid_selector_matches_nothing() {
        let d = doc("<p>x</p>");
        assert_eq!(d.first_text("p[["), None);
        assert!(d.select("p[[").is_empty());
    }
}
