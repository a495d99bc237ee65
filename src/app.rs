#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::cache::SessionCache;
use crate::codeset::{CodesetTable, NewCodeset};
use crate::errors::{MapError, StorageError};
use crate::session::EditSession;
use crate::snapshot;
use crate::storage::Storage;
use crate::store::ConfigStore;
use crate::sync::{ConfigSyncManager, FieldSyncData};

const SESSION_TTL: Duration = Duration::from_secs(300);

pub struct AppState {
    storage: Storage,
    sessions: SessionCache,
    sync: ConfigSyncManager,
}

type ApiError = (StatusCode, Json<Value>);

#[derive(Deserialize)]
struct OrgModuleQuery {
    org_key: String,
    module_key: String,
}

#[derive(Deserialize)]
struct CellUpdateRequest {
    org_key: String,
    module_key: String,
    row: usize,
    col: usize,
    value: String,
}

#[derive(Deserialize)]
struct AddRowRequest {
    org_key: String,
    module_key: String,
    field_type: String,
    label: String,
}

#[derive(Deserialize)]
struct SyncRowsRequest {
    org_key: String,
    module_key: String,
    customization: String,
}

#[derive(Deserialize)]
struct SyncFieldRequest {
    org_key: String,
    module_key: String,
    field_data: FieldSyncData,
}

#[derive(Deserialize)]
struct DescriptionUpdate {
    org_key: String,
    module_key: String,
    description: String,
}

/// Start the configuration editor server.
///
/// # Arguments
/// * `port` - TCP port to listen on
/// * `storage` - Disk layout for configuration and codeset files
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Runs until the process exits
pub async fn run(port: u16, storage: Storage) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState {
        sync: ConfigSyncManager::new(storage.clone()),
        sessions: SessionCache::new(SESSION_TTL),
        storage,
    });

    let app = Router::new()
        .route("/api/config", get(get_config))
        .route("/api/config/cell", post(update_cell))
        .route("/api/config/row", post(add_row))
        .route("/api/config/save", post(save_config))
        .route("/api/config/export", get(export_snapshot))
        .route("/api/config/import", post(import_snapshot))
        .route("/api/codesets", get(get_codesets).post(add_codeset))
        .route("/api/codesets/:field", put(update_codeset))
        .route("/api/sync/rows", post(sync_rows))
        .route("/api/sync/field", post(sync_field))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;

    Ok(())
}

fn fail(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "success": false, "error": message.into() })))
}

fn map_error_status(err: &MapError) -> StatusCode {
    match err {
        MapError::DuplicateLabel(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn storage_error_response(err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound(_) => fail(StatusCode::NOT_FOUND, "Configuration file not found"),
        StorageError::Parse { .. } => fail(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        StorageError::Io(_) => fail(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

// Fetch the live session for an org/module pair, loading and parsing its
// configuration from disk on a cache miss.
fn attach_session(
    state: &AppState,
    org_key: &str,
    module_key: &str,
) -> Result<Arc<tokio::sync::Mutex<EditSession>>, ApiError> {
    state.sessions.get_or_try_insert(org_key, module_key, || {
        let text = state
            .storage
            .load_config(org_key, module_key)
            .map_err(storage_error_response)?;
        let store = ConfigStore::parse(&text).map_err(|reason| {
            error!("Parse failure for {}/{}: {}", org_key, module_key, reason);
            storage_error_response(StorageError::Parse {
                path: state.storage.config_path(org_key, module_key),
                reason,
            })
        })?;
        info!(
            "Loaded configuration for {}/{} ({} records)",
            org_key,
            module_key,
            store.records.len()
        );
        Ok(EditSession::new(org_key, module_key, store))
    })
}

async fn get_config(
    Query(params): Query<OrgModuleQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let session = attach_session(&state, &params.org_key, &params.module_key)?;
    let session = session.lock().await;
    Ok(Json(json!({
        "success": true,
        "headers": session.display_headers(),
        "grid": session.grid(),
        "list_types": session.list_types(),
        "dirty": session.is_dirty(),
    })))
}

async fn update_cell(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CellUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = attach_session(&state, &payload.org_key, &payload.module_key)?;
    let mut session = session.lock().await;
    match session.update_cell(payload.row, payload.col, &payload.value) {
        Ok(edit) => Ok(Json(json!({
            "success": true,
            "mapping": edit.mapping,
            "grid": edit.grid,
            "list_types": session.list_types(),
        }))),
        Err(e) => {
            warn!(
                "Cell update rejected for {}/{} at ({}, {}): {}",
                payload.org_key, payload.module_key, payload.row, payload.col, e
            );
            Err(fail(map_error_status(&e), e.to_string()))
        }
    }
}

async fn add_row(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddRowRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = attach_session(&state, &payload.org_key, &payload.module_key)?;
    let mut session = session.lock().await;
    match session.add_row(&payload.field_type, &payload.label) {
        Ok(outcome) => Ok(Json(json!({
            "success": true,
            "new_field_code": outcome.new_field_code,
            "grid": outcome.grid,
        }))),
        Err(e) => Err(fail(map_error_status(&e), e.to_string())),
    }
}

async fn save_config(
    State(state): State<Arc<AppState>>,
    Json(params): Json<OrgModuleQuery>,
) -> Result<Json<Value>, ApiError> {
    let session = attach_session(&state, &params.org_key, &params.module_key)?;
    let mut session = session.lock().await;
    let content = session.to_csv();
    let receipts = state
        .storage
        .save_config(&params.org_key, &params.module_key, &content)
        .map_err(|e| fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // The primary location must land; a mirror failure is reported but the
    // save still counts.
    if receipts.first().map(|r| r.ok()) != Some(true) {
        let reason = receipts
            .first()
            .and_then(|r| r.error.clone())
            .unwrap_or_else(|| "no location written".to_string());
        return Err(fail(StatusCode::INTERNAL_SERVER_ERROR, reason));
    }

    session.mark_saved();
    drop(session);
    state.sessions.invalidate(&params.org_key, &params.module_key);
    Ok(Json(json!({ "success": true, "receipts": receipts })))
}

async fn export_snapshot(
    Query(params): Query<OrgModuleQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let session = match attach_session(&state, &params.org_key, &params.module_key) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let session = session.lock().await;

    let mut buffer = Vec::new();
    match snapshot::serialize_to_memory(session.store(), &mut buffer) {
        Ok(()) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/gzip")
            .body(axum::body::Body::from(Bytes::from(buffer)))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn import_snapshot(
    Query(params): Query<OrgModuleQuery>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file_data = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("snapshot") {
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }
    if file_data.is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "No snapshot data received"));
    }

    match snapshot::deserialize_from_memory(&file_data) {
        Ok(store) => {
            let session = EditSession::new(&params.org_key, &params.module_key, store);
            state
                .sessions
                .insert(&params.org_key, &params.module_key, session);
            Ok(Json(json!({ "success": true })))
        }
        Err(e) => Err(fail(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Failed to load snapshot: {}", e),
        )),
    }
}

async fn get_codesets(
    Query(params): Query<OrgModuleQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let table = load_codesets(&state, &params.org_key, &params.module_key)?;
    let types: Vec<String> = {
        let mut seen = std::collections::BTreeSet::new();
        table
            .entries
            .iter()
            .filter(|e| seen.insert(e.kind.clone()))
            .map(|e| e.kind.clone())
            .collect()
    };
    let total = table.entries.len();
    Ok(Json(json!({
        "success": true,
        "codesets": table.entries,
        "meta": { "total": total, "types": types },
    })))
}

async fn add_codeset(
    Query(params): Query<OrgModuleQuery>,
    State(state): State<Arc<AppState>>,
    Json(new_codeset): Json<NewCodeset>,
) -> Result<Json<Value>, ApiError> {
    let mut table = load_codesets(&state, &params.org_key, &params.module_key)?;
    let field = table.append(new_codeset);
    persist_codesets(&state, &params.org_key, &params.module_key, &table)?;
    Ok(Json(json!({ "success": true, "field": field })))
}

async fn update_codeset(
    AxumPath(field): AxumPath<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<DescriptionUpdate>,
) -> Result<Json<Value>, ApiError> {
    let mut table = load_codesets(&state, &update.org_key, &update.module_key)?;
    if !table.update_description(&field, &update.description) {
        return Err(fail(
            StatusCode::NOT_FOUND,
            format!("Codeset {} not found", field),
        ));
    }
    persist_codesets(&state, &update.org_key, &update.module_key, &table)?;
    Ok(Json(json!({ "success": true })))
}

fn load_codesets(
    state: &AppState,
    org_key: &str,
    module_key: &str,
) -> Result<CodesetTable, ApiError> {
    let text = state
        .storage
        .load_codesets(org_key, module_key)
        .map_err(storage_error_response)?;
    CodesetTable::parse(&text).map_err(|reason| {
        storage_error_response(StorageError::Parse {
            path: state.storage.codeset_path(org_key, module_key),
            reason,
        })
    })
}

fn persist_codesets(
    state: &AppState,
    org_key: &str,
    module_key: &str,
    table: &CodesetTable,
) -> Result<(), ApiError> {
    let receipt = state
        .storage
        .save_codesets(org_key, module_key, &table.to_csv())
        .map_err(|e| fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !receipt.ok() {
        return Err(fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            receipt.error.unwrap_or_default(),
        ));
    }
    Ok(())
}

// Source content for a sync pass: the live session when one exists (it may
// carry unsaved edits), the on-disk file otherwise.
async fn sync_source_content(
    state: &AppState,
    org_key: &str,
    module_key: &str,
) -> Result<String, ApiError> {
    if let Some(session) = state.sessions.get(org_key, module_key) {
        let session = session.lock().await;
        return Ok(session.to_csv());
    }
    state
        .storage
        .load_config(org_key, module_key)
        .map_err(storage_error_response)
}

async fn sync_rows(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SyncRowsRequest>,
) -> Result<Json<Value>, ApiError> {
    let content = sync_source_content(&state, &payload.org_key, &payload.module_key).await?;
    match state.sync.sync_group_rows(
        &payload.org_key,
        &payload.module_key,
        &content,
        &payload.customization,
    ) {
        Ok(results) => Ok(Json(json!({ "success": true, "results": results }))),
        Err(e) => Err(fail(StatusCode::BAD_REQUEST, e)),
    }
}

async fn sync_field(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SyncFieldRequest>,
) -> Result<Json<Value>, ApiError> {
    let content = sync_source_content(&state, &payload.org_key, &payload.module_key).await?;
    match state.sync.sync_field(
        &payload.org_key,
        &payload.module_key,
        &content,
        &payload.field_data,
    ) {
        Ok(results) => Ok(Json(json!({ "success": true, "results": results }))),
        Err(e) => Err(fail(StatusCode::BAD_REQUEST, e)),
    }
}
