use serde::{Deserialize, Serialize};

use crate::csv;
use crate::record::HEADER_ROW_COUNT;

/// One row of the codeset lookup table backing CAT field values.
///
/// Columns: 0 = numeric field id, 1 = type, 2 = level, 3 = parent path,
/// 4 = code value, 5 = description.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CodesetEntry {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub parent_path: String,
    pub code: String,
    pub description: String,
}

/// Payload for appending a codeset entry; the field id is auto-numbered
/// when absent.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct NewCodeset {
    pub field: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub parent_path: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CodesetTable {
    pub header_rows: Vec<String>,
    pub entries: Vec<CodesetEntry>,
}

impl CodesetTable {
    /// Parse `codesetvalues.csv` text. Rows without a field id or type are
    /// dropped; the four header lines are preserved verbatim.
    pub fn parse(text: &str) -> Result<Self, String> {
        let lines = csv::split_lines(text);
        if lines.len() < HEADER_ROW_COUNT {
            return Err(format!(
                "expected at least {} header lines, found {}",
                HEADER_ROW_COUNT,
                lines.len()
            ));
        }
        let header_rows: Vec<String> = lines[..HEADER_ROW_COUNT]
            .iter()
            .map(|l| l.to_string())
            .collect();

        let mut entries = Vec::new();
        for line in &lines[HEADER_ROW_COUNT..] {
            let fields = csv::parse_line(line);
            if fields.iter().all(|f| f.is_empty()) {
                continue;
            }
            let get = |i: usize| fields.get(i).cloned().unwrap_or_default();
            let entry = CodesetEntry {
                field: get(0),
                kind: get(1),
                level: get(2),
                parent_path: get(3),
                code: get(4),
                description: get(5),
            };
            if entry.field.is_empty() || entry.kind.is_empty() {
                continue;
            }
            entries.push(entry);
        }

        Ok(CodesetTable {
            header_rows,
            entries,
        })
    }

    pub fn to_csv(&self) -> String {
        let mut out = self.header_rows.clone();
        for e in &self.entries {
            out.push(csv::format_row(&[
                e.field.clone(),
                e.kind.clone(),
                e.level.clone(),
                e.parent_path.clone(),
                e.code.clone(),
                e.description.clone(),
            ]));
        }
        out.join("\n")
    }

    /// Next field id: max existing numeric id + 1. Non-numeric ids are
    /// ignored; an empty table starts at 1.
    pub fn next_field_id(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|e| e.field.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Append an entry, auto-numbering its field id unless one was given.
    /// Returns the id actually used.
    pub fn append(&mut self, new: NewCodeset) -> String {
        let field = new
            .field
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.next_field_id().to_string());
        self.entries.push(CodesetEntry {
            field: field.clone(),
            kind: new.kind,
            level: new.level,
            parent_path: new.parent_path,
            code: new.code,
            description: new.description,
        });
        field
    }

    /// Update the description of the entry with the given field id.
    /// Returns whether a row matched.
    pub fn update_description(&mut self, field_id: &str, description: &str) -> bool {
        let mut updated = false;
        for entry in &mut self.entries {
            if entry.field == field_id {
                entry.description = description.to_string();
                updated = true;
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        [
            "codesets,CHARGES_MANAGER,,",
            "version,1,,",
            "generated,2024,,",
            "field,Type,Level,Parent Path,Code,Description",
            "1,REGION,1,,NORTH,Northern region",
            "2,REGION,1,,SOUTH,Southern region",
            "abc,REGION,1,,WEST,Bad id survives as text",
            ",REGION,1,,EAST,Dropped - no id",
        ]
        .join("\n")
    }

    #[test]
    fn parse_drops_incomplete_rows() {
        let table = CodesetTable::parse(&sample()).unwrap();
        assert_eq!(table.entries.len(), 3);
        assert_eq!(table.entries[0].code, "NORTH");
        assert_eq!(table.entries[2].field, "abc");
    }

    #[test]
    fn auto_numbering_skips_non_numeric_ids() {
        let mut table = CodesetTable::parse(&sample()).unwrap();
        assert_eq!(table.next_field_id(), 3);
        let id = table.append(NewCodeset {
            field: None,
            kind: "REGION".into(),
            level: "1".into(),
            parent_path: String::new(),
            code: "CENTRAL".into(),
            description: "Central region".into(),
        });
        assert_eq!(id, "3");
        assert_eq!(table.entries.last().unwrap().field, "3");
    }

    #[test]
    fn update_description_by_field_id() {
        let mut table = CodesetTable::parse(&sample()).unwrap();
        assert!(table.update_description("2", "South, incl. islands"));
        assert!(!table.update_description("99", "nobody"));
        assert_eq!(table.entries[1].description, "South, incl. islands");
    }

    #[test]
    fn serializes_with_headers_preserved() {
        let mut table = CodesetTable::parse(&sample()).unwrap();
        table.update_description("1", "North, coastal");
        let out = table.to_csv();
        assert!(out.starts_with("codesets,CHARGES_MANAGER,,"));
        // Comma-bearing description is quoted on the way out
        assert!(out.contains(r#""North, coastal""#));
        let reparsed = CodesetTable::parse(&out).unwrap();
        assert_eq!(reparsed.entries[0].description, "North, coastal");
        assert_eq!(reparsed.header_rows, table.header_rows);
    }
}
