use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::record::{COL_LABEL, COL_LIST_TYPE, COL_LIST_VALUE, COL_CUSTOMIZATION, MARK_NEW, Record};
use crate::storage::Storage;
use crate::store::ConfigStore;

/// Attributes a module accepts from sync events. Entries are the attribute
/// names `fieldType` / `label` / `listType` / `listValues`; custom tables
/// may also authorize whole-row replication by field type tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleSyncConfig {
    pub sync_fields: Vec<String>,
}

impl ModuleSyncConfig {
    pub fn new(fields: &[&str]) -> Self {
        ModuleSyncConfig {
            sync_fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn authorizes(&self, field: &str) -> bool {
        self.sync_fields.iter().any(|f| f == field)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigGroup {
    pub modules: HashMap<String, ModuleSyncConfig>,
}

/// Per-sibling result of a sync pass. One sibling failing never aborts the
/// batch; the caller reports which modules succeeded and which did not.
#[derive(Clone, Debug, Serialize)]
pub struct SyncOutcome {
    pub module_key: String,
    pub success: bool,
    pub changes: usize,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn ok(module_key: &str, changes: usize) -> Self {
        SyncOutcome {
            module_key: module_key.to_string(),
            success: true,
            changes,
            error: None,
        }
    }

    fn failed(module_key: &str, error: impl Into<String>) -> Self {
        SyncOutcome {
            module_key: module_key.to_string(),
            success: false,
            changes: 0,
            error: Some(error.into()),
        }
    }
}

/// A single edited field, as handed over by the editor for the
/// field-level sync variant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSyncData {
    pub field_type: String,
    pub label: String,
    pub customization: String,
    pub data_value: String,
}

/// Propagates configuration edits across the sibling modules of a group.
///
/// Groups are read-only configuration data: each module belongs to at most
/// one group and declares which attributes it accepts. Every sibling write
/// goes through the storage layer's backup-then-write discipline.
pub struct ConfigSyncManager {
    groups: HashMap<String, ConfigGroup>,
    storage: Storage,
}

impl ConfigSyncManager {
    pub fn new(storage: Storage) -> Self {
        ConfigSyncManager {
            groups: default_groups(),
            storage,
        }
    }

    pub fn with_groups(storage: Storage, groups: HashMap<String, ConfigGroup>) -> Self {
        ConfigSyncManager { groups, storage }
    }

    /// Static lookup of the group a module belongs to.
    pub fn get_module_group(&self, module_key: &str) -> Option<(&str, &ConfigGroup, &ModuleSyncConfig)> {
        for (name, group) in &self.groups {
            if let Some(module_config) = group.modules.get(module_key) {
                return Some((name.as_str(), group, module_config));
            }
        }
        None
    }

    /// A sync is worth attempting when at least one sibling configuration
    /// file exists on disk.
    pub fn validate_group_access(&self, org_key: &str, module_key: &str) -> bool {
        let Some((_, group, _)) = self.get_module_group(module_key) else {
            return false;
        };
        group
            .modules
            .keys()
            .filter(|key| key.as_str() != module_key)
            .any(|key| self.storage.config_exists(org_key, key))
    }

    fn siblings<'a>(
        &self,
        group: &'a ConfigGroup,
        module_key: &str,
    ) -> Vec<(&'a String, &'a ModuleSyncConfig)> {
        group
            .modules
            .iter()
            .filter(|(key, _)| key.as_str() != module_key)
            .collect()
    }

    /// Row-level replication: every source record carrying the given
    /// customization marker is pushed into each sibling that authorizes
    /// its field type. Matching sibling rows (by label) are overwritten
    /// whole; unmatched `NEW` rows are appended.
    ///
    /// # Errors
    /// Fails up front when the module has no group, no sibling is
    /// accessible, or the source content does not parse. Per-sibling
    /// failures land in the returned outcome list instead.
    pub fn sync_group_rows(
        &self,
        org_key: &str,
        module_key: &str,
        source_content: &str,
        customization: &str,
    ) -> Result<Vec<SyncOutcome>, String> {
        let (group_name, group, _) = self
            .get_module_group(module_key)
            .ok_or_else(|| format!("Module {} does not belong to a group", module_key))?;
        if !self.validate_group_access(org_key, module_key) {
            return Err("No sibling configuration accessible for group sync".to_string());
        }

        let source = ConfigStore::parse(source_content)
            .map_err(|e| format!("Failed to parse source configuration: {}", e))?;
        let modified: Vec<&Record> = source
            .records
            .iter()
            .filter(|r| r.customization() == customization)
            .collect();
        info!(
            "Group sync ({}): {} modified rows from {}",
            group_name,
            modified.len(),
            module_key
        );

        let mut results = Vec::new();
        for (sibling_key, sibling_config) in self.siblings(group, module_key) {
            results.push(self.sync_rows_into(
                org_key,
                sibling_key,
                sibling_config,
                &modified,
                customization,
            ));
        }
        Ok(results)
    }

    fn sync_rows_into(
        &self,
        org_key: &str,
        sibling_key: &str,
        sibling_config: &ModuleSyncConfig,
        modified: &[&Record],
        customization: &str,
    ) -> SyncOutcome {
        let content = match self.storage.load_config(org_key, sibling_key) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping sibling {}: {}", sibling_key, e);
                return SyncOutcome::failed(sibling_key, e.to_string());
            }
        };
        let mut target = match ConfigStore::parse(&content) {
            Ok(store) => store,
            Err(e) => return SyncOutcome::failed(sibling_key, format!("parse failure: {}", e)),
        };

        let mut changes = 0;
        for source_record in modified {
            if !sibling_config.authorizes(source_record.field_type()) {
                continue;
            }
            let label = source_record.label().to_string();
            let position = target.records.iter().position(|r| r.label() == label);
            match position {
                Some(idx) => {
                    if target.records[idx].values != source_record.values {
                        target.records[idx].values = source_record.values.clone();
                        changes += 1;
                    }
                }
                None if customization == MARK_NEW => {
                    let id = format!("row-{}", target.records.len());
                    target
                        .records
                        .push(Record::new(id, source_record.values.clone()));
                    changes += 1;
                }
                None => {}
            }
        }

        if changes == 0 {
            return SyncOutcome::ok(sibling_key, 0);
        }
        self.persist(org_key, sibling_key, &target.to_csv(), changes)
    }

    /// Field-level variant: overwrite only the columns the sibling
    /// authorizes (`label` → 3, `listType` → 8, `listValues` → 9) on rows
    /// matching the edited field's data key, marking rows that actually
    /// changed. Siblings are persisted only when something changed.
    pub fn sync_field(
        &self,
        org_key: &str,
        module_key: &str,
        source_content: &str,
        field: &FieldSyncData,
    ) -> Result<Vec<SyncOutcome>, String> {
        let (_, group, _) = self
            .get_module_group(module_key)
            .ok_or_else(|| format!("Module {} does not belong to a group", module_key))?;

        let source = ConfigStore::parse(source_content)
            .map_err(|e| format!("Failed to parse source configuration: {}", e))?;
        let source_record = source
            .records
            .iter()
            .find(|r| r.data_key() == field.data_value);
        let source_list_type = source_record.map(|r| r.get(COL_LIST_TYPE)).unwrap_or("");
        let source_list_value = source_record.map(|r| r.get(COL_LIST_VALUE)).unwrap_or("");

        let mut results = Vec::new();
        for (sibling_key, sibling_config) in self.siblings(group, module_key) {
            results.push(self.sync_field_into(
                org_key,
                sibling_key,
                sibling_config,
                field,
                source_list_type,
                source_list_value,
            ));
        }
        Ok(results)
    }

    fn sync_field_into(
        &self,
        org_key: &str,
        sibling_key: &str,
        sibling_config: &ModuleSyncConfig,
        field: &FieldSyncData,
        source_list_type: &str,
        source_list_value: &str,
    ) -> SyncOutcome {
        let content = match self.storage.load_config(org_key, sibling_key) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping sibling {}: {}", sibling_key, e);
                return SyncOutcome::failed(sibling_key, e.to_string());
            }
        };
        let mut target = match ConfigStore::parse(&content) {
            Ok(store) => store,
            Err(e) => return SyncOutcome::failed(sibling_key, format!("parse failure: {}", e)),
        };

        let mut changes = 0;
        for record in &mut target.records {
            if record.data_key() != field.data_value {
                continue;
            }
            let mut modified = false;

            if sibling_config.authorizes("label") && record.label() != field.label {
                record.set(COL_LABEL, field.label.clone());
                modified = true;
            }
            if sibling_config.authorizes("listType")
                && !source_list_type.is_empty()
                && record.get(COL_LIST_TYPE) != source_list_type
            {
                record.set(COL_LIST_TYPE, source_list_type);
                modified = true;
            }
            if sibling_config.authorizes("listValues")
                && !source_list_value.is_empty()
                && record.get(COL_LIST_VALUE) != source_list_value
            {
                record.set(COL_LIST_VALUE, source_list_value);
                modified = true;
            }

            if modified {
                record.set(COL_CUSTOMIZATION, field.customization.clone());
                changes += 1;
            }
        }

        if changes == 0 {
            return SyncOutcome::ok(sibling_key, 0);
        }
        self.persist(org_key, sibling_key, &target.to_csv(), changes)
    }

    fn persist(&self, org_key: &str, sibling_key: &str, content: &str, changes: usize) -> SyncOutcome {
        match self.storage.save_config(org_key, sibling_key, content) {
            Ok(receipts) => match receipts.iter().find(|r| !r.ok()) {
                Some(bad) => SyncOutcome::failed(
                    sibling_key,
                    format!(
                        "write failed at {}: {}",
                        bad.location.display(),
                        bad.error.clone().unwrap_or_default()
                    ),
                ),
                None => {
                    info!("Synced {} change(s) into {}", changes, sibling_key);
                    SyncOutcome::ok(sibling_key, changes)
                }
            },
            Err(e) => SyncOutcome::failed(sibling_key, e.to_string()),
        }
    }
}

fn default_groups() -> HashMap<String, ConfigGroup> {
    let mut groups = HashMap::new();
    groups.insert(
        "CHARGES_GROUP".to_string(),
        ConfigGroup {
            modules: HashMap::from([
                (
                    "CHARGES_MANAGER".to_string(),
                    ModuleSyncConfig::new(&["fieldType", "label", "listType", "listValues"]),
                ),
                (
                    "CHARGES_CONTROLS".to_string(),
                    ModuleSyncConfig::new(&["label", "listType", "listValues"]),
                ),
                (
                    "CHARGES_BALANCE".to_string(),
                    ModuleSyncConfig::new(&["label", "listType", "listValues"]),
                ),
                ("CHARGES_UPDATE".to_string(), ModuleSyncConfig::new(&["label"])),
            ]),
        },
    );
    groups.insert(
        "ASSET_GROUP".to_string(),
        ConfigGroup {
            modules: HashMap::from([
                (
                    "ASSET_MANAGER".to_string(),
                    ModuleSyncConfig::new(&["fieldType", "label", "listType", "listValues"]),
                ),
                (
                    "ASSET_PRODUCTS".to_string(),
                    ModuleSyncConfig::new(&["label", "listType", "listValues"]),
                ),
                ("ASSET_UPDATE".to_string(), ModuleSyncConfig::new(&["label"])),
            ]),
        },
    );
    groups.insert(
        "PRODUCT_GROUP".to_string(),
        ConfigGroup {
            modules: HashMap::from([
                (
                    "PRODUCT_MANAGER".to_string(),
                    ModuleSyncConfig::new(&["fieldType", "label", "listType", "listValues"]),
                ),
                (
                    "PRODUCT_INVENTORY".to_string(),
                    ModuleSyncConfig::new(&["label", "listType", "listValues"]),
                ),
                ("PRODUCT_UPDATE".to_string(), ModuleSyncConfig::new(&["label"])),
            ]),
        },
    );
    groups.insert(
        "LEADS_GROUP".to_string(),
        ConfigGroup {
            modules: HashMap::from([
                (
                    "LEADS_MANAGER".to_string(),
                    ModuleSyncConfig::new(&["fieldType", "label", "listType", "listValues"]),
                ),
                (
                    "LEADS_TRACKER".to_string(),
                    ModuleSyncConfig::new(&["label", "listType", "listValues"]),
                ),
            ]),
        },
    );
    groups
}
