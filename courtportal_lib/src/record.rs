//! The case record assembled from a detail page.

use serde::Serialize;

/// One case as extracted from the portal's detail page and cleaned by
/// the normalizer. Fields that could not be located are empty strings;
/// a record is only emitted for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaseRecord {
    pub case_number: String,
    pub filed_date: String,
    pub case_type: String,
    pub status: String,
    pub description: String,
    pub parties: Vec<PartyRecord>,
}

/// A party listed on the case, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartyRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub party_type: String,
}

impl PartyRecord {
    pub fn new(name: impl Into<String>, party_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            party_type: party_type.into(),
        }
    }
}
