//! Pure cleanup functions applied to a raw record before it reaches the sink.

use chrono::NaiveDate;
use regex::Regex;

use crate::record::CaseRecord;

/// Explicit formats tried first, in order.
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%Y-%m-%d"];

/// Normalizes a portal date to `YYYY-MM-DD`.
///
/// Tries the explicit formats, then a permissive `D sep D sep YYYY`
/// pattern with any non-digit separators. An unparseable input is
/// returned unchanged rather than dropped.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    if let Some(date) = loose_date(raw) {
        return date;
    }
    raw.to_string()
}

fn loose_date(raw: &str) -> Option<String> {
    let re = Regex::new(r"(\d{1,2})[^\d](\d{1,2})[^\d](\d{4})").ok()?;
    let cap = re.captures(raw)?;
    let month: u32 = cap[1].parse().ok()?;
    let day: u32 = cap[2].parse().ok()?;
    let year: i32 = cap[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Title-cases a string, but only when the whole input is uniformly
/// upper- or lower-case. Mixed-case input passes through verbatim so
/// proper nouns with embedded capitals ("McDonald") are not mangled.
pub fn to_title_case(raw: &str) -> String {
    let raw = raw.trim();
    if !is_uniform_case(raw) {
        return raw.to_string();
    }
    raw.split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_uniform_case(s: &str) -> bool {
    let mut has_alpha = false;
    let mut all_upper = true;
    let mut all_lower = true;
    for c in s.chars().filter(|c| c.is_alphabetic()) {
        has_alpha = true;
        all_upper &= c.is_uppercase();
        all_lower &= c.is_lowercase();
    }
    has_alpha && (all_upper || all_lower)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Cleans an extracted record in place: trims the case number, normalizes
/// the filed date, title-cases the text fields, and drops parties with an
/// empty name or a judicial officer in the name or role.
pub fn clean_record(record: &mut CaseRecord) {
    record.case_number = record.case_number.trim().to_string();
    record.filed_date = normalize_date(&record.filed_date);
    record.case_type = to_title_case(&record.case_type);
    record.status = to_title_case(&record.status);
    record.description = to_title_case(&record.description);

    record.parties.retain(|p| {
        !p.name.trim().is_empty()
            && !p.name.to_lowercase().contains("judge")
            && !p.party_type.to_lowercase().contains("judge")
    });
    for party in &mut record.parties {
        party.name = to_title_case(&party.name);
        party.party_type = to_title_case(&party.party_type);
    }
}
