//! HTTP handlers that run the pipeline.
//!
//! Each run is spawned onto its own task so a dropped client connection
//! cannot abandon an object halfway between staging locations; only the
//! shutdown token stops a run early.

use crate::{
    errors::AppError,
    models::metadata::ObjectMetadata,
    routes::routes::AppState,
    services::{
        observer::{RecordingObserver, TracingObserver, TranscodeEvent},
        pipeline::{Action, TranscodeOutcome},
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

/// Response body of a compress/decompress request.
#[derive(Serialize, Debug)]
pub struct RunResponse {
    #[serde(flatten)]
    pub outcome: TranscodeOutcome,
    pub events: Vec<TranscodeEvent>,
}

fn logical_path(raw: &str) -> String {
    format!("/{}", raw.trim_start_matches('/'))
}

/// `POST /compress/{*path}`
pub async fn compress_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<RunResponse>, AppError> {
    run_action(state, Action::Compress, logical_path(&path)).await
}

/// `POST /decompress/{*path}`
pub async fn decompress_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<RunResponse>, AppError> {
    run_action(state, Action::Decompress, logical_path(&path)).await
}

/// `GET /metadata/{*path}`
pub async fn object_metadata(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<ObjectMetadata>, AppError> {
    let metadata = state.transcoder.metadata(&logical_path(&path)).await?;
    Ok(Json(metadata))
}

async fn run_action(
    state: AppState,
    action: Action,
    path: String,
) -> Result<Json<RunResponse>, AppError> {
    if !state.accepts(&path) {
        return Err(AppError::bad_request(format!(
            "`{}` does not end with `{}`",
            path,
            state.required_extension.as_deref().unwrap_or_default()
        )));
    }

    let task = tokio::spawn(async move {
        let _slot = state
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::new(StatusCode::SERVICE_UNAVAILABLE, "worker pool closed"))?;
        let _guard = state.paths.lock(&path).await;

        let observer = RecordingObserver::forwarding(Arc::new(TracingObserver));
        let outcome = state
            .transcoder
            .run(
                action,
                &path,
                &state.staging,
                state.retention,
                &observer,
                &state.cancel,
            )
            .await?;
        Ok::<_, AppError>(RunResponse {
            outcome,
            events: observer.events(),
        })
    });

    let response = task
        .await
        .map_err(|err| AppError::internal(format!("pipeline task failed: {}", err)))??;
    Ok(Json(response))
}
