//! Tolerant extraction of a case record from the detail page.
//!
//! The portal's detail markup is inconsistent between case types, so every
//! field is located by a cascade of strategies (see [`crate::locate`]):
//! a known inline-style selector first, then a label-cell sibling walk.

use courtportal_api::{element_text, Document};
use scraper::ElementRef;

use crate::locate::{first_non_empty, Locator};
use crate::record::{CaseRecord, PartyRecord};

/// Placeholder fragment the portal leaves in empty cells when the markup
/// is double-escaped.
const NBSP_LITERAL: &str = "&nbsp;";

/// Extracts the raw record from a detail page. `case_prefix` is the
/// alphabetic prefix of the target case number ("PRMC2400654" -> "PRMC"),
/// used by the second-tier case-number locator. Missing fields come back
/// as empty strings; only the party list has a dedicated fallback pass.
pub fn extract_case(doc: &Document, case_prefix: &str, role_keywords: &[String]) -> CaseRecord {
    let case_number_tiers: Vec<Locator<'_, String>> = vec![
        Box::new(|| doc.first_text("td[style='color: #CC0000; font-size:18px;'] > b")),
        Box::new(|| bold_cell_with_prefix(doc, case_prefix)),
    ];
    let filed_date_tiers: Vec<Locator<'_, String>> = vec![
        Box::new(|| {
            sibling_cell_text(
                doc,
                "Filed Date",
                Some("text-align:left;font-weight:bold;padding-left:5px;"),
            )
        }),
        Box::new(|| sibling_cell_text(doc, "Filed Date", None)),
    ];
    let case_type_tiers: Vec<Locator<'_, String>> = vec![
        Box::new(|| doc.first_text("td[style='text-align: center; overflow-wrap: normal;'] > b")),
        Box::new(|| sibling_cell_text(doc, "Case Type", None)),
    ];
    let status_tiers: Vec<Locator<'_, String>> = vec![
        Box::new(|| {
            sibling_cell_text(
                doc,
                "Status",
                Some("text-align:left;font-weight:bold;padding-left:5px;"),
            )
        }),
        Box::new(|| sibling_cell_text(doc, "Status", None)),
    ];
    let description_tiers: Vec<Locator<'_, String>> =
        vec![Box::new(|| doc.first_text("td[style='text-align: center; font-size:18px;']"))];

    CaseRecord {
        case_number: first_non_empty(&case_number_tiers).unwrap_or_default(),
        filed_date: first_non_empty(&filed_date_tiers).unwrap_or_default(),
        case_type: first_non_empty(&case_type_tiers).unwrap_or_default(),
        status: first_non_empty(&status_tiers).unwrap_or_default(),
        description: first_non_empty(&description_tiers).unwrap_or_default(),
        parties: extract_parties(doc, role_keywords),
    }
}

/// Extracts the party list. Primary strategy: the tree-table name cells
/// (`tree_table-…-cell-1`) with the party type in the next cell. Fallback
/// when that finds nothing: cells whose own text carries a known role
/// keyword, with the name in the preceding cell.
pub fn extract_parties(doc: &Document, role_keywords: &[String]) -> Vec<PartyRecord> {
    let mut parties = Vec::new();

    for name_cell in doc.select("td[id^='tree_table-'][id*='-cell-1']") {
        let Some(name) = last_fragment(name_cell) else {
            continue;
        };
        let Some(type_cell) = next_cell(name_cell) else {
            continue;
        };
        if let Some(party_type) = first_fragment(type_cell) {
            tracing::debug!("found party: {} - {}", name, party_type);
            parties.push(PartyRecord::new(name, party_type));
        }
    }

    if parties.is_empty() {
        tracing::info!("using fallback method for party extraction");
        for type_cell in doc.select("td") {
            let own = own_text(type_cell);
            if !role_keywords.iter().any(|kw| own.contains(kw.as_str())) {
                continue;
            }
            let Some(name_cell) = previous_cell(type_cell) else {
                continue;
            };
            if let Some(name) = last_fragment(name_cell) {
                tracing::debug!("found party (fallback): {} - {}", name, own);
                parties.push(PartyRecord::new(name, own));
            }
        }
    }

    parties
}

fn bold_cell_with_prefix(doc: &Document, case_prefix: &str) -> Option<String> {
    if case_prefix.is_empty() {
        return None;
    }
    doc.select("td > b")
        .into_iter()
        .map(element_text)
        .find(|t| t.contains(case_prefix))
}

/// Text of the first `td` sibling after a cell whose own text contains
/// `label`, optionally constrained to an exact inline style.
fn sibling_cell_text(doc: &Document, label: &str, style: Option<&str>) -> Option<String> {
    for cell in doc.select("td") {
        if !own_text(cell).contains(label) {
            continue;
        }
        let siblings = cell
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td");
        for sibling in siblings {
            if let Some(style) = style {
                if sibling.value().attr("style") != Some(style) {
                    continue;
                }
            }
            let text = element_text(sibling);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Text directly inside an element, not counting descendants. Mirrors how
/// the label cells are matched: an enclosing layout cell contains the
/// label text too, but only in a nested cell.
fn own_text(el: ElementRef<'_>) -> String {
    let fragments: Vec<&str> = el
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    fragments.join(" ")
}

fn next_cell(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "td")
}

fn previous_cell(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "td")
}

fn clean_fragment(raw: &str) -> Option<String> {
    let cleaned = raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');
    if cleaned.is_empty() || cleaned == NBSP_LITERAL {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// The *last* non-placeholder text fragment in a cell. Name cells nest the
/// actual name after indentation spans and placeholder entities.
fn last_fragment(el: ElementRef<'_>) -> Option<String> {
    let fragments: Vec<&str> = el.text().collect();
    fragments.into_iter().rev().find_map(clean_fragment)
}

/// The *first* non-empty fragment in a cell. Type cells put the value
/// first; anything after is decoration.
fn first_fragment(el: ElementRef<'_>) -> Option<String> {
    el.text().find_map(clean_fragment)
}
