//! End-to-end editing flow: load a configuration from disk, edit it
//! through the display grid, persist it, and propagate the edit to
//! sibling modules of the same group.

use confgrid::record::{COL_CUSTOMIZATION, COL_LIST_TYPE, COL_LIST_VALUE};
use confgrid::session::EditSession;
use confgrid::storage::Storage;
use confgrid::store::ConfigStore;
use confgrid::sync::{ConfigSyncManager, FieldSyncData};
use tempfile::tempdir;

fn header_lines(module_key: &str) -> Vec<String> {
    vec![
        format!("module,{},,", module_key),
        "version,3,,".to_string(),
        "org,acme.example.com,,".to_string(),
        "field_code,field_type,data,label,access_level,message,default,validation,list_type,list_value,multi_group,hidden,link_setup,update_setup,filter,search,sort,mobile,detail,create,edit,select,map,card,report,reserved,customization".to_string(),
    ]
}

fn field_row(code: &str, ftype: &str, data: &str, label: &str, list_type: &str, list_value: &str) -> String {
    let mut cols = vec![
        code.to_string(),
        ftype.to_string(),
        data.to_string(),
        label.to_string(),
    ];
    cols.resize(27, String::new());
    cols[COL_LIST_TYPE] = list_type.to_string();
    cols[COL_LIST_VALUE] = list_value.to_string();
    cols.join(",")
}

fn config_text(module_key: &str, rows: &[String]) -> String {
    let mut lines = header_lines(module_key);
    lines.extend(rows.iter().cloned());
    lines.join("\n")
}

fn find_cell(session: &EditSession, value: &str) -> (usize, usize) {
    for (r, row) in session.grid().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.value == value {
                return (r, c);
            }
        }
    }
    panic!("cell '{}' not found in grid", value);
}

#[test]
fn load_edit_save_round_trip() {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path());

    let text = config_text(
        "CHARGES_MANAGER",
        &[
            field_row("fieldCode001", "CAT", "DATA_001", "Color", "Fixed", "Red#Blue"),
            field_row("fieldCode002", "GEN", "DATA_002", "Remarks", "", ""),
        ],
    );
    storage.save_config("acme", "CHARGES_MANAGER", &text).unwrap();

    let loaded = storage.load_config("acme", "CHARGES_MANAGER").unwrap();
    let store = ConfigStore::parse(&loaded).unwrap();
    let mut session = EditSession::new("acme", "CHARGES_MANAGER", store);

    // Edit the CAT field's value list through its display coordinate
    let (row, col) = find_cell(&session, "Red#Blue");
    let edit = session.update_cell(row, col, "Red#Blue#Green").unwrap();
    assert_eq!(edit.mapping.column_header, "list_value");
    assert_eq!(edit.mapping.field_type, "CAT");
    assert_eq!(session.store().records[0].get(COL_LIST_VALUE), "Red#Blue#Green");
    assert_eq!(session.store().records[0].get(COL_CUSTOMIZATION), "CHANGE");
    assert_eq!(
        session.list_types()["fieldCode001"].values,
        vec!["Red", "Blue", "Green"]
    );

    // Append a row and reject a duplicate label in any case
    let outcome = session.add_row("QTY", "Weight").unwrap();
    assert_eq!(outcome.new_field_code, "fieldCode003");
    assert!(session.add_row("GEN", "color").is_err());

    // Persist and reload: edits survive, headers stay verbatim
    storage
        .save_config("acme", "CHARGES_MANAGER", &session.to_csv())
        .unwrap();
    let reloaded =
        ConfigStore::parse(&storage.load_config("acme", "CHARGES_MANAGER").unwrap()).unwrap();
    assert_eq!(reloaded.header_rows, header_lines("CHARGES_MANAGER"));
    assert_eq!(reloaded.records.len(), 3);
    assert_eq!(reloaded.records[0].get(COL_LIST_VALUE), "Red#Blue#Green");
    assert_eq!(reloaded.records[2].label(), "Weight");
    assert_eq!(reloaded.records[2].customization(), "NEW");

    // The overwrite left a backup of the pre-edit file
    let backups: Vec<_> = std::fs::read_dir(dir.path().join("_backups"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    let backup = ConfigStore::parse(&std::fs::read_to_string(&backups[0]).unwrap()).unwrap();
    assert_eq!(backup.records[0].get(COL_LIST_VALUE), "Red#Blue");
}

#[test]
fn quoted_fields_survive_the_full_cycle() {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path());
    let text = config_text(
        "CHARGES_MANAGER",
        &[field_row("fieldCode001", "GEN", "DATA_001", "Plain", "", "")],
    );
    storage.save_config("acme", "CHARGES_MANAGER", &text).unwrap();

    let store =
        ConfigStore::parse(&storage.load_config("acme", "CHARGES_MANAGER").unwrap()).unwrap();
    let mut session = EditSession::new("acme", "CHARGES_MANAGER", store);
    let (row, col) = find_cell(&session, "Plain");
    session.update_cell(row, col, "Colour, \"primary\"").unwrap();

    storage
        .save_config("acme", "CHARGES_MANAGER", &session.to_csv())
        .unwrap();
    let reloaded =
        ConfigStore::parse(&storage.load_config("acme", "CHARGES_MANAGER").unwrap()).unwrap();
    assert_eq!(reloaded.records[0].label(), "Colour, \"primary\"");
}

#[test]
fn edits_propagate_to_group_siblings() {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path());

    // Source module plus two of its default-group siblings; the balance
    // module is intentionally absent.
    let source_rows = vec![field_row(
        "fieldCode001",
        "CAT",
        "DATA_001",
        "Color",
        "Fixed",
        "Red#Blue",
    )];
    storage
        .save_config("acme", "CHARGES_MANAGER", &config_text("CHARGES_MANAGER", &source_rows))
        .unwrap();
    let sibling_rows = vec![field_row("fieldCode010", "CAT", "DATA_001", "Color", "", "")];
    storage
        .save_config("acme", "CHARGES_CONTROLS", &config_text("CHARGES_CONTROLS", &sibling_rows))
        .unwrap();
    storage
        .save_config("acme", "CHARGES_UPDATE", &config_text("CHARGES_UPDATE", &sibling_rows))
        .unwrap();

    // Operator renames the field and extends its list, then syncs
    let store =
        ConfigStore::parse(&storage.load_config("acme", "CHARGES_MANAGER").unwrap()).unwrap();
    let mut session = EditSession::new("acme", "CHARGES_MANAGER", store);
    let (row, col) = find_cell(&session, "Color");
    session.update_cell(row, col, "Colour").unwrap();
    let (row, col) = find_cell(&session, "Red#Blue");
    session.update_cell(row, col, "Red#Blue#Green").unwrap();

    let manager = ConfigSyncManager::new(storage.clone());
    assert!(manager.validate_group_access("acme", "CHARGES_MANAGER"));

    let results = manager
        .sync_field(
            "acme",
            "CHARGES_MANAGER",
            &session.to_csv(),
            &FieldSyncData {
                field_type: "CAT".to_string(),
                label: "Colour".to_string(),
                customization: "CHANGE".to_string(),
                data_value: "DATA_001".to_string(),
            },
        )
        .unwrap();

    // One outcome per sibling; the missing one fails alone
    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].module_key, "CHARGES_BALANCE");

    // CHARGES_CONTROLS accepts label + list values
    let controls =
        ConfigStore::parse(&storage.load_config("acme", "CHARGES_CONTROLS").unwrap()).unwrap();
    assert_eq!(controls.records[0].label(), "Colour");
    assert_eq!(controls.records[0].get(COL_LIST_TYPE), "Fixed");
    assert_eq!(controls.records[0].get(COL_LIST_VALUE), "Red#Blue#Green");
    assert_eq!(controls.records[0].customization(), "CHANGE");

    // CHARGES_UPDATE accepts the label only
    let update =
        ConfigStore::parse(&storage.load_config("acme", "CHARGES_UPDATE").unwrap()).unwrap();
    assert_eq!(update.records[0].label(), "Colour");
    assert_eq!(update.records[0].get(COL_LIST_VALUE), "");
    assert_eq!(update.records[0].customization(), "CHANGE");
}
