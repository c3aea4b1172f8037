use anyhow::Result;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use courtportal_lib::CaseRecord;

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct PartyRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    party_type: String,
}

pub fn print_record(record: &CaseRecord, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        OutputFormat::Table => {
            let fields = vec![
                FieldRow {
                    field: "Case Number",
                    value: record.case_number.clone(),
                },
                FieldRow {
                    field: "Filed Date",
                    value: record.filed_date.clone(),
                },
                FieldRow {
                    field: "Case Type",
                    value: record.case_type.clone(),
                },
                FieldRow {
                    field: "Status",
                    value: record.status.clone(),
                },
                FieldRow {
                    field: "Description",
                    value: record.description.clone(),
                },
            ];
            let mut table = Table::new(fields);
            table.with(Style::sharp());
            println!("{}", table);

            if record.parties.is_empty() {
                println!("No parties listed.");
            } else {
                let parties: Vec<PartyRow> = record
                    .parties
                    .iter()
                    .map(|p| PartyRow {
                        name: p.name.clone(),
                        party_type: p.party_type.clone(),
                    })
                    .collect();
                let mut table = Table::new(parties);
                table.with(Style::sharp());
                println!("{}", table);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtportal_lib::PartyRecord;

    #[test]
    fn json_serialization_uses_type_key_for_parties() {
        let record = CaseRecord {
            case_number: "PRMC2400654".to_string(),
            parties: vec![PartyRecord::new("John Smith", "Petitioner")],
            ..CaseRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["case_number"], "PRMC2400654");
        assert_eq!(json["parties"][0]["type"], "Petitioner");
        assert_eq!(json["parties"][0]["name"], "John Smith");
    }
}
