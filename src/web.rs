//! HTTP endpoints for batch uploads.
//!
//! The surface is deliberately small: create an upload from CSV content,
//! inspect it, trigger processing, and delete it (which rolls it back first
//! when it already created records).

use crate::batch;
use crate::errors::AlmonerError;
use crate::rollback;
use crate::rows;
use crate::settings::Settings;
use crate::storage::{self, NewBatchUpload};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
}

impl IntoResponse for AlmonerError {
    fn into_response(self) -> Response {
        let status = match &self {
            AlmonerError::NotFound(_) => StatusCode::NOT_FOUND,
            AlmonerError::InvalidState(_) => StatusCode::CONFLICT,
            AlmonerError::Validation(_) | AlmonerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub name: String,
    pub file_name: String,
    /// Raw CSV text, header row included.
    pub content: String,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchActionRequest {
    pub action: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/batch-uploads", get(list_batches).post(create_batch))
        .route(
            "/batch-uploads/{id}",
            get(get_batch).post(batch_action).delete(delete_batch),
        )
        .route("/batch-uploads/{id}/items", get(list_items))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let state = AppState {
        settings: Arc::new(settings),
        db,
    };
    let router = router(state);

    tracing::info!(%addr, "Batch upload API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}

async fn create_batch(
    State(state): State<AppState>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, AlmonerError> {
    if req.name.trim().is_empty() {
        return Err(AlmonerError::BadRequest("name must not be empty".to_string()));
    }
    let content = req.content.as_bytes();
    if content.len() > state.settings.upload.max_file_bytes {
        return Err(AlmonerError::Validation(format!(
            "CSV file exceeds the {} byte limit",
            state.settings.upload.max_file_bytes
        )));
    }

    let parsed = rows::parse_csv(content, state.settings.upload.max_rows)?;
    let file_hash = hex::encode(Sha256::digest(content));

    let batch = storage::create_batch_with_items(
        &state.db,
        NewBatchUpload {
            name: req.name,
            file_name: req.file_name,
            created_by: req.created_by,
        },
        &parsed.rows,
        &file_hash,
    )
    .await?;

    tracing::info!(batch_id = batch.id, total_items = batch.total_items, "Created batch upload");
    Ok((StatusCode::CREATED, Json(batch)))
}

async fn list_batches(State(state): State<AppState>) -> Result<impl IntoResponse, AlmonerError> {
    let batches = storage::list_batches(&state.db).await?;
    Ok(Json(batches))
}

async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AlmonerError> {
    let batch = storage::get_batch(&state.db, id)
        .await?
        .ok_or_else(|| AlmonerError::NotFound(format!("batch upload {id}")))?;
    Ok(Json(batch))
}

async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AlmonerError> {
    storage::get_batch(&state.db, id)
        .await?
        .ok_or_else(|| AlmonerError::NotFound(format!("batch upload {id}")))?;
    let items = crate::tracker::list_items(&state.db, id).await?;
    Ok(Json(items))
}

async fn batch_action(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<BatchActionRequest>,
) -> Result<impl IntoResponse, AlmonerError> {
    match req.action.as_str() {
        "process" => {
            let batch = batch::process_batch(&state.db, id).await?;
            Ok(Json(batch))
        }
        other => Err(AlmonerError::BadRequest(format!(
            "unknown action '{other}' (expected 'process')"
        ))),
    }
}

/// Rolls the batch back first when it created records; deletes it outright
/// otherwise.
async fn delete_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AlmonerError> {
    let batch = storage::get_batch(&state.db, id)
        .await?
        .ok_or_else(|| AlmonerError::NotFound(format!("batch upload {id}")))?;

    if batch.successful_items > 0 {
        let batch = rollback::rollback(&state.db, id, false).await?;
        return Ok(Json(batch).into_response());
    }

    if batch.status == batch::BatchStatus::Processing.as_str() {
        return Err(AlmonerError::InvalidState(format!(
            "batch upload {id} is processing and cannot be deleted"
        )));
    }

    storage::delete_batch(&state.db, id).await?;
    tracing::info!(batch_id = id, "Deleted batch upload");
    Ok(StatusCode::NO_CONTENT.into_response())
}
