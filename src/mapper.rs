use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::MapError;
use crate::record::{
    COL_CUSTOMIZATION, COL_DATA_KEY, COL_FIELD_CODE, COL_FIELD_TYPE, COL_LABEL, FieldType,
    MARK_NEW, Record,
};
use crate::store::ConfigStore;

lazy_static! {
    static ref FIELD_CODE_REGEX: Regex = Regex::new(r"^fieldCode(\d+)$").unwrap();
    static ref LABEL_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_\s-]+$").unwrap();
}

// Transposed rows whose first cell carries one of these markers are system
// rows and never reach the display grid. Compared lower-cased and trimmed.
const HIDDEN_ROW_MARKERS: [&str; 5] = [
    "link setup",
    "update setup",
    "multi_group",
    "hidden",
    "visibility",
];

const MAX_LABEL_LEN: usize = 50;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

/// Binds one display cell to its record-store coordinate. `transposed` is
/// the pure-transpose coordinate: `transposed.row == original.col` and
/// `transposed.col == original.row`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CellMapping {
    pub original: Position,
    pub transposed: Position,
    pub field_code: String,
    pub column_header: String,
    pub field_type: String,
    pub unique_id: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PositionEntry {
    pub original_row: usize,
    pub original_col: usize,
    pub transposed_row: usize,
    pub transposed_col: usize,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MappedCell {
    pub value: String,
    pub mapping: CellMapping,
}

pub type FilteredGrid = Vec<Vec<MappedCell>>;

#[derive(Debug)]
pub struct UpdateOutcome {
    pub store: ConfigStore,
    pub grid: FilteredGrid,
    pub mapping: CellMapping,
}

#[derive(Debug)]
pub struct AddRowOutcome {
    pub store: ConfigStore,
    pub grid: FilteredGrid,
    pub new_field_code: String,
}

/// Bidirectional mapping between record-store coordinates and the
/// transposed, filtered display grid.
///
/// The mapper owns its store snapshot. Every mutation goes through it,
/// clones the affected state (callers holding an earlier returned snapshot
/// are unaffected), and regenerates the full mapping table and the
/// filtered grid, so derived structures can never go stale.
pub struct PositionMapper {
    store: ConfigStore,
    max_columns: usize,
    mappings: HashMap<(String, usize, usize), CellMapping>,
    filtered_index: HashMap<(usize, usize), PositionEntry>,
    grid: FilteredGrid,
}

impl PositionMapper {
    pub fn new(mut store: ConfigStore) -> Self {
        let max_columns = store.width();
        store.pad_records(max_columns);
        let mut mapper = PositionMapper {
            store,
            max_columns,
            mappings: HashMap::new(),
            filtered_index: HashMap::new(),
            grid: Vec::new(),
        };
        mapper.generate_mappings();
        mapper.transpose_with_mapping();
        mapper
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn grid(&self) -> &FilteredGrid {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.max_columns
    }

    fn generate_mappings(&mut self) {
        self.mappings.clear();
        for (row, record) in self.store.records.iter().enumerate() {
            let field_code = record.field_code().to_string();
            let field_type = record.field_type().to_string();
            for col in 0..self.max_columns {
                let mapping = CellMapping {
                    original: Position { row, col },
                    transposed: Position { row: col, col: row },
                    field_code: field_code.clone(),
                    column_header: self
                        .store
                        .headers
                        .get(col)
                        .map(|h| h.to_lowercase())
                        .unwrap_or_default(),
                    field_type: field_type.clone(),
                    unique_id: format!("{}-{}-{}", field_code, row, col),
                };
                self.mappings.insert((field_code.clone(), row, col), mapping);
            }
        }
    }

    fn mapping_for(&self, row: usize, col: usize) -> CellMapping {
        let field_code = self
            .store
            .records
            .get(row)
            .map(|r| r.field_code().to_string())
            .unwrap_or_default();
        if let Some(mapping) = self.mappings.get(&(field_code.clone(), row, col)) {
            return mapping.clone();
        }
        CellMapping {
            original: Position { row, col },
            transposed: Position { row: col, col: row },
            field_code: field_code.clone(),
            column_header: self
                .store
                .headers
                .get(col)
                .map(|h| h.to_lowercase())
                .unwrap_or_default(),
            field_type: self
                .store
                .records
                .get(row)
                .map(|r| r.field_type().to_string())
                .unwrap_or_default(),
            unique_id: format!("{}-{}-{}", field_code, row, col),
        }
    }

    fn should_show_row(cells: &[MappedCell]) -> bool {
        let first = match cells.first() {
            Some(cell) => cell.value.trim().to_lowercase(),
            None => return false,
        };
        if HIDDEN_ROW_MARKERS.contains(&first.as_str()) {
            return false;
        }
        cells.iter().any(|c| !c.value.trim().is_empty())
    }

    /// Rebuild the filtered display grid and the reverse lookup table.
    ///
    /// One transposed row exists per original column; the row for the raw
    /// field-type column is always suppressed (field type travels on the
    /// mapping instead), as are hidden-marker rows and all-empty rows.
    pub fn transpose_with_mapping(&mut self) -> FilteredGrid {
        self.filtered_index.clear();
        let mut filtered: FilteredGrid = Vec::new();

        for t_row in 0..self.max_columns {
            if t_row == COL_FIELD_TYPE {
                continue;
            }
            let cells: Vec<MappedCell> = self
                .store
                .records
                .iter()
                .enumerate()
                .map(|(row, record)| MappedCell {
                    value: record.get(t_row).to_string(),
                    mapping: self.mapping_for(row, t_row),
                })
                .collect();

            if !Self::should_show_row(&cells) {
                continue;
            }

            let f_row = filtered.len();
            for (f_col, cell) in cells.iter().enumerate() {
                self.filtered_index.insert(
                    (f_row, f_col),
                    PositionEntry {
                        original_row: cell.mapping.original.row,
                        original_col: cell.mapping.original.col,
                        transposed_row: t_row,
                        transposed_col: cell.mapping.original.row,
                    },
                );
            }
            filtered.push(cells);
        }

        self.grid = filtered;
        self.grid.clone()
    }

    pub fn get_position_mapping(&self, filtered_row: usize, filtered_col: usize) -> Option<PositionEntry> {
        self.filtered_index.get(&(filtered_row, filtered_col)).copied()
    }

    pub fn validate_position(&self, filtered_row: usize, filtered_col: usize) -> bool {
        self.get_position_mapping(filtered_row, filtered_col).is_some()
    }

    pub fn get_mapping(&self, filtered_row: usize, filtered_col: usize) -> Option<CellMapping> {
        let entry = self.get_position_mapping(filtered_row, filtered_col)?;
        Some(self.mapping_for(entry.original_row, entry.original_col))
    }

    /// Write `new_value` at the record-store coordinate behind a filtered
    /// coordinate, then regenerate every derived structure.
    ///
    /// The store is cloned before mutation; the returned snapshot is the
    /// new state and the resolved mapping lets the caller decide on
    /// secondary effects (customization tagging, list bookkeeping).
    pub fn update_cell(
        &mut self,
        filtered_row: usize,
        filtered_col: usize,
        new_value: &str,
    ) -> Result<UpdateOutcome, MapError> {
        let entry = self
            .get_position_mapping(filtered_row, filtered_col)
            .ok_or(MapError::InvalidPosition {
                row: filtered_row,
                col: filtered_col,
            })?;

        let mapping = self.mapping_for(entry.original_row, entry.original_col);

        let mut records = self.store.records.clone();
        records[entry.original_row].set(entry.original_col, new_value);
        self.store.records = records;

        self.generate_mappings();
        let grid = self.transpose_with_mapping();

        Ok(UpdateOutcome {
            store: self.store.clone(),
            grid,
            mapping,
        })
    }

    /// Controlled direct write by record-store coordinate, used for
    /// secondary-effect columns that may be filtered out of the display
    /// (e.g. the customization marker). Regenerates like `update_cell`.
    pub fn set_original(&mut self, row: usize, col: usize, value: &str) -> Result<(), MapError> {
        if row >= self.store.records.len() {
            return Err(MapError::InvalidPosition { row, col });
        }
        let mut records = self.store.records.clone();
        records[row].set(col, value);
        self.store.records = records;
        if col >= self.max_columns {
            self.max_columns = col + 1;
        }
        self.store.pad_records(self.max_columns);
        self.generate_mappings();
        self.transpose_with_mapping();
        Ok(())
    }

    /// Append a new record with a freshly generated field code.
    ///
    /// Validation happens before any mutation: the field type must be one
    /// of the eight known tags, the label must be non-empty, at most 50
    /// characters of `[A-Za-z0-9_\s-]`, and not already in use
    /// (case-insensitive).
    pub fn add_row(&mut self, field_type: &str, label: &str) -> Result<AddRowOutcome, MapError> {
        let parsed_type = FieldType::parse(field_type)
            .ok_or_else(|| MapError::InvalidFieldType(field_type.to_string()))?;

        let label = label.trim();
        if label.is_empty() {
            return Err(MapError::InvalidLabel("label must not be empty".into()));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(MapError::InvalidLabel(format!(
                "label exceeds {} characters",
                MAX_LABEL_LEN
            )));
        }
        if !LABEL_REGEX.is_match(label) {
            return Err(MapError::InvalidLabel(
                "label may only contain letters, digits, spaces, '_' and '-'".into(),
            ));
        }
        if self.store.label_exists(label) {
            return Err(MapError::DuplicateLabel(label.to_string()));
        }

        let new_field_code = self.next_field_code();
        let suffix = new_field_code.trim_start_matches("fieldCode").to_string();

        let mut record = Record::new(
            format!("row-{}", self.store.records.len()),
            vec![String::new(); self.max_columns],
        );
        record.set(COL_FIELD_CODE, new_field_code.clone());
        record.set(COL_FIELD_TYPE, parsed_type.as_str());
        record.set(COL_DATA_KEY, format!("DATA_FIELD_{}", suffix));
        record.set(COL_LABEL, label);
        if self.max_columns > COL_CUSTOMIZATION {
            record.set(COL_CUSTOMIZATION, MARK_NEW);
        }

        let mut records = self.store.records.clone();
        records.push(record);
        self.store.records = records;
        // A narrow store can have grown past its old width
        self.max_columns = self.max_columns.max(self.store.width());
        self.store.pad_records(self.max_columns);

        self.generate_mappings();
        let grid = self.transpose_with_mapping();

        Ok(AddRowOutcome {
            store: self.store.clone(),
            grid,
            new_field_code,
        })
    }

    // Next code = max numeric suffix over conforming codes + 1, zero-padded
    // to three digits. Non-conforming codes (e.g. row-# fallbacks) are
    // ignored.
    fn next_field_code(&self) -> String {
        let max = self
            .store
            .records
            .iter()
            .filter_map(|r| {
                FIELD_CODE_REGEX
                    .captures(r.field_code())
                    .and_then(|c| c[1].parse::<u64>().ok())
            })
            .max()
            .unwrap_or(0);
        format!("fieldCode{:03}", max + 1)
    }
}
