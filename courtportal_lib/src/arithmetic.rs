//! The search page's arithmetic word-problem CAPTCHA: discovery,
//! parsing, and evaluation.

use courtportal_api::{element_text, Document};
use regex::Regex;
use scraper::ElementRef;

use crate::locate::{first_hit, Locator};

/// `A op B` as matched in label text. Where exactly the expression sits
/// relative to the "Math question" label varies between page renders, so
/// discovery runs a cascade of progressively wider text scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArithmeticChallenge {
    pub a: i64,
    pub op: char,
    pub b: i64,
    /// The label text the expression was parsed out of.
    pub raw_text: String,
}

const EXPRESSION: &str = r"(\d+)\s*([+\-*/xX×÷])\s*(\d+)";

fn expression_re() -> Option<Regex> {
    Regex::new(EXPRESSION).ok()
}

impl ArithmeticChallenge {
    /// Parses the first `number operator number` pattern out of `text`.
    pub fn parse(text: &str) -> Option<Self> {
        let cap = expression_re()?.captures(text)?;
        Self::from_captures(&cap, text)
    }

    fn from_captures(cap: &regex::Captures<'_>, raw_text: &str) -> Option<Self> {
        Some(Self {
            a: cap[1].parse().ok()?,
            op: cap[2].chars().next()?,
            b: cap[3].parse().ok()?,
            raw_text: raw_text.trim().to_string(),
        })
    }

    /// Evaluates the expression the way the portal does: `x`/`X` multiply
    /// and `/` is truncating integer division. `9 / 2` must submit `4`.
    pub fn evaluate(&self) -> i64 {
        match self.op {
            '*' | 'x' | 'X' | '×' => self.a.saturating_mul(self.b),
            '+' => self.a.saturating_add(self.b),
            '-' => self.a.saturating_sub(self.b),
            '/' | '÷' => {
                if self.b == 0 {
                    tracing::warn!("math CAPTCHA divides by zero: {}", self.raw_text);
                    0
                } else {
                    self.a / self.b
                }
            }
            other => {
                tracing::warn!("unrecognized math operator {:?}", other);
                0
            }
        }
    }
}

/// Finds the arithmetic challenge on a search page.
///
/// Tiers, each tried only when the previous one yielded no recognizable
/// expression: the "Math question" label's own text, that text plus the
/// next text node after the label in document order, the label's parent
/// subtree, and the
/// enclosing form-group subtree. A final aggressive tier scans the whole
/// page text for `Math question ... A op B =`.
pub fn find_challenge(doc: &Document) -> Option<ArithmeticChallenge> {
    let re = expression_re()?;
    let tiers: Vec<Locator<'_, String>> = vec![
        Box::new(|| math_label(doc).map(element_text)),
        Box::new(|| {
            let label = math_label(doc)?;
            let mut text = element_text(label);
            if let Some(next) = following_text(label) {
                text.push(' ');
                text.push_str(&next);
            }
            Some(text)
        }),
        Box::new(|| {
            let label = math_label(doc)?;
            ElementRef::wrap(label.parent()?).map(element_text)
        }),
        Box::new(|| form_group_text(math_label(doc)?)),
    ];

    if let Some(text) = first_hit(&tiers, |t| re.is_match(t)) {
        tracing::debug!("raw CAPTCHA label text: {}", text);
        return ArithmeticChallenge::parse(&text);
    }
    aggressive_scan(&doc.body_text())
}

fn math_label<'a>(doc: &'a Document) -> Option<ElementRef<'a>> {
    doc.select("label")
        .into_iter()
        .find(|el| element_text(*el).contains("Math question"))
}

/// First non-empty text after `el` in document order: later siblings at
/// each ancestor level, descending into each one. Covers both a bare text
/// node next to the label and text inside the label container's next block.
fn following_text(el: ElementRef<'_>) -> Option<String> {
    let mut anchor = Some(*el);
    while let Some(node) = anchor {
        for sibling in node.next_siblings() {
            for descendant in sibling.descendants() {
                if let Some(text) = descendant.value().as_text() {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
            }
        }
        anchor = node.parent();
    }
    None
}

fn form_group_text(el: ElementRef<'_>) -> Option<String> {
    for ancestor in el.ancestors() {
        if let Some(element) = ElementRef::wrap(ancestor) {
            let is_form_item = element
                .value()
                .attr("class")
                .map_or(false, |c| c.contains("form-item"));
            if is_form_item {
                return Some(element_text(element));
            }
        }
    }
    None
}

fn aggressive_scan(page_text: &str) -> Option<ArithmeticChallenge> {
    let re =
        Regex::new(r"(?i)Math question[^=]*?(\d+)\s*([+\-*/xX×÷])\s*(\d+)\s*=").ok()?;
    let cap = re.captures(page_text)?;
    tracing::info!("found math question using aggressive page scan");
    let raw = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
    ArithmeticChallenge::from_captures(&cap, raw)
}
