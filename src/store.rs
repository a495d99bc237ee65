use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::csv;
use crate::record::{
    COL_LIST_TYPE, COL_LIST_VALUE, HEADER_ROW_COUNT, LABEL_HEADER_ROW, ListTypeState, Record,
};

/// In-memory, row-oriented representation of one configuration file.
///
/// The first four physical lines of the file are kept verbatim in
/// `header_rows` so that serialization reproduces them byte-for-byte;
/// `headers` is the parsed form of the column-name line (header line 3).
/// Data records start at line 4.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ConfigStore {
    pub header_rows: Vec<String>,
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl ConfigStore {
    /// Parse raw CSV text into a store.
    ///
    /// # Errors
    /// Returns a message when the text is shorter than the four mandatory
    /// header lines. Fully-empty data lines are skipped.
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
        let headers = csv::parse_line(&header_rows[LABEL_HEADER_ROW]);

        let mut records = Vec::new();
        for line in &lines[HEADER_ROW_COUNT..] {
            let fields = csv::parse_line(line);
            if fields.iter().all(|f| f.is_empty()) {
                continue;
            }
            let id = format!("row-{}", records.len());
            records.push(Record::new(id, fields));
        }

        Ok(ConfigStore {
            header_rows,
            headers,
            records,
        })
    }

    /// Serialize back to CSV text: verbatim header lines followed by the
    /// data records with standard quoting.
    pub fn to_csv(&self) -> String {
        let mut out: Vec<String> = self.header_rows.clone();
        for record in &self.records {
            out.push(csv::format_row(&record.values));
        }
        out.join("\n")
    }

    /// Column width of the store: headers and the widest record both count.
    pub fn width(&self) -> usize {
        let widest = self.records.iter().map(|r| r.values.len()).max().unwrap_or(0);
        self.headers.len().max(widest)
    }

    /// Pad every record to `width`; never truncates.
    pub fn pad_records(&mut self, width: usize) {
        for record in &mut self.records {
            record.pad_to(width);
        }
    }

    /// Re-derive the list semantics of every CAT field from columns 8/9.
    /// Columns 8/9 are the source of truth; this map is a convenience view.
    pub fn list_type_state(&self) -> HashMap<String, ListTypeState> {
        let mut state = HashMap::new();
        for record in &self.records {
            if record.field_type() != "CAT" || record.field_code().is_empty() {
                continue;
            }
            let raw_type = record.get(COL_LIST_TYPE);
            let list_type = if raw_type.is_empty() { "Fixed" } else { raw_type };
            let values: Vec<String> = record
                .get(COL_LIST_VALUE)
                .split('#')
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .collect();
            state.insert(
                record.field_code().to_string(),
                ListTypeState {
                    list_type: list_type.to_string(),
                    values,
                },
            );
        }
        state
    }

    /// Case-insensitive label existence check (column 3).
    pub fn label_exists(&self, label: &str) -> bool {
        let wanted = label.trim().to_lowercase();
        self.records
            .iter()
            .any(|r| r.label().trim().to_lowercase() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{COL_CUSTOMIZATION, COL_LABEL};

    fn sample_text() -> String {
        let mut row1 = vec!["fieldCode001", "CAT", "DATA_001", "Color"];
        row1.resize(10, "");
        row1[8] = "Fixed";
        row1[9] = "Red#Blue";
        let mut row2 = vec!["fieldCode002", "GEN", "DATA_002", "Notes"];
        row2.resize(27, "");
        vec![
            "module,CHARGES_MANAGER,,".to_string(),
            "version,3,,".to_string(),
            "org,acme,,".to_string(),
            "field_code,field_type,data,label,access_level,message,default,validation,list_type,list_value".to_string(),
            row1.join(","),
            row2.join(","),
        ]
        .join("\n")
    }

    #[test]
    fn parses_headers_and_records() {
        let store = ConfigStore::parse(&sample_text()).unwrap();
        assert_eq!(store.header_rows.len(), 4);
        assert_eq!(store.headers[0], "field_code");
        assert_eq!(store.headers[9], "list_value");
        assert_eq!(store.records.len(), 2);
        assert_eq!(store.records[0].field_code(), "fieldCode001");
        assert_eq!(store.records[0].id, "row-0");
        assert_eq!(store.records[1].label(), "Notes");
    }

    #[test]
    fn rejects_truncated_input() {
        let err = ConfigStore::parse("one\ntwo").unwrap_err();
        assert!(err.contains("header lines"));
    }

    #[test]
    fn skips_fully_empty_lines() {
        let text = format!("{}\n\n,,,\n", sample_text());
        let store = ConfigStore::parse(&text).unwrap();
        assert_eq!(store.records.len(), 2);
    }

    #[test]
    fn round_trips_header_rows_verbatim() {
        let text = sample_text();
        let store = ConfigStore::parse(&text).unwrap();
        let out = store.to_csv();
        let reparsed = ConfigStore::parse(&out).unwrap();
        assert_eq!(store.header_rows, reparsed.header_rows);
        assert_eq!(store.records, reparsed.records);
        assert!(out.starts_with("module,CHARGES_MANAGER,,"));
    }

    #[test]
    fn width_covers_headers_and_widest_record() {
        let store = ConfigStore::parse(&sample_text()).unwrap();
        assert_eq!(store.width(), 27);
        let mut padded = store.clone();
        padded.pad_records(27);
        assert!(padded.records.iter().all(|r| r.values.len() == 27));
    }

    #[test]
    fn derives_list_state_from_cat_columns() {
        let store = ConfigStore::parse(&sample_text()).unwrap();
        let state = store.list_type_state();
        assert_eq!(state.len(), 1);
        let color = &state["fieldCode001"];
        assert_eq!(color.list_type, "Fixed");
        assert_eq!(color.values, vec!["Red", "Blue"]);
    }

    #[test]
    fn label_lookup_is_case_insensitive() {
        let store = ConfigStore::parse(&sample_text()).unwrap();
        assert!(store.label_exists("color"));
        assert!(store.label_exists("  NOTES "));
        assert!(!store.label_exists("Weight"));
    }

    #[test]
    fn serializes_markers_in_place() {
        let mut store = ConfigStore::parse(&sample_text()).unwrap();
        store.records[0].set(COL_CUSTOMIZATION, "CHANGE");
        store.records[0].set(COL_LABEL, "Colour, primary");
        let out = store.to_csv();
        let reparsed = ConfigStore::parse(&out).unwrap();
        assert_eq!(reparsed.records[0].label(), "Colour, primary");
        assert_eq!(reparsed.records[0].customization(), "CHANGE");
    }
}
