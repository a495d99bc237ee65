use std::collections::HashMap;

use crate::errors::MapError;
use crate::mapper::{AddRowOutcome, CellMapping, FilteredGrid, PositionMapper};
use crate::record::{COL_CUSTOMIZATION, ListTypeState, MARK_CHANGE, MARK_NEW};
use crate::store::ConfigStore;

/// One editing session over a single org/module configuration.
///
/// The mapping engine stays policy-free; this layer applies the editing
/// conventions that ride on top of a raw cell write: customization
/// tagging and the cached list semantics of CAT fields.
pub struct EditSession {
    pub org_key: String,
    pub module_key: String,
    mapper: PositionMapper,
    list_types: HashMap<String, ListTypeState>,
    dirty: bool,
}

#[derive(Debug)]
pub struct CellEdit {
    pub mapping: CellMapping,
    pub store: ConfigStore,
    pub grid: FilteredGrid,
}

impl EditSession {
    pub fn new(org_key: impl Into<String>, module_key: impl Into<String>, store: ConfigStore) -> Self {
        let mapper = PositionMapper::new(store);
        let list_types = mapper.store().list_type_state();
        EditSession {
            org_key: org_key.into(),
            module_key: module_key.into(),
            mapper,
            list_types,
            dirty: false,
        }
    }

    pub fn grid(&self) -> &FilteredGrid {
        self.mapper.grid()
    }

    pub fn store(&self) -> &ConfigStore {
        self.mapper.store()
    }

    /// Column names from the label header line, used as display headers.
    pub fn display_headers(&self) -> &[String] {
        &self.mapper.store().headers
    }

    pub fn list_types(&self) -> &HashMap<String, ListTypeState> {
        &self.list_types
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn to_csv(&self) -> String {
        self.mapper.store().to_csv()
    }

    /// Apply one display-grid edit with its secondary effects.
    ///
    /// Any edit outside the customization column marks the record `CHANGE`
    /// unless it is still `NEW`; list_type / list_value edits on CAT
    /// fields keep the cached list state in step with columns 8/9.
    pub fn update_cell(
        &mut self,
        filtered_row: usize,
        filtered_col: usize,
        value: &str,
    ) -> Result<CellEdit, MapError> {
        let outcome = self.mapper.update_cell(filtered_row, filtered_col, value)?;
        let mapping = outcome.mapping;

        if mapping.original.col != COL_CUSTOMIZATION {
            let current = self.mapper.store().records[mapping.original.row]
                .customization()
                .to_string();
            if current != MARK_NEW && current != MARK_CHANGE {
                self.mapper
                    .set_original(mapping.original.row, COL_CUSTOMIZATION, MARK_CHANGE)?;
            }
        }

        if mapping.field_type == "CAT" && !mapping.field_code.is_empty() {
            match mapping.column_header.as_str() {
                "list_type" => {
                    let entry = self
                        .list_types
                        .entry(mapping.field_code.clone())
                        .or_insert_with(|| ListTypeState {
                            list_type: "Fixed".into(),
                            values: Vec::new(),
                        });
                    entry.list_type = value.to_string();
                }
                "list_value" => {
                    let entry = self
                        .list_types
                        .entry(mapping.field_code.clone())
                        .or_insert_with(|| ListTypeState {
                            list_type: "Fixed".into(),
                            values: Vec::new(),
                        });
                    entry.values = value
                        .split('#')
                        .filter(|v| !v.is_empty())
                        .map(|v| v.to_string())
                        .collect();
                }
                _ => {}
            }
        }

        self.dirty = true;
        Ok(CellEdit {
            mapping,
            store: self.mapper.store().clone(),
            grid: self.mapper.grid().clone(),
        })
    }

    /// Append a new field row; CAT fields start with an empty Fixed list.
    pub fn add_row(&mut self, field_type: &str, label: &str) -> Result<AddRowOutcome, MapError> {
        let outcome = self.mapper.add_row(field_type, label)?;
        if field_type.trim().eq_ignore_ascii_case("CAT") {
            self.list_types.insert(
                outcome.new_field_code.clone(),
                ListTypeState {
                    list_type: "Fixed".into(),
                    values: Vec::new(),
                },
            );
        }
        self.dirty = true;
        Ok(outcome)
    }
}
