use super::AppState;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// Multipart field carrying the uploaded photo
const UPLOAD_FIELD: &str = "file";

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.info.as_ref().clone())
}

pub async fn process_bottle(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Missing multipart field '{UPLOAD_FIELD}'"),
            )
        },
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let span = tracing::info_span!("request", route = super::PROCESS_ROUTE, bytes = upload.len());
    let processor = Arc::clone(&state.processor);
    let outcome = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let mut processor = processor.blocking_lock();
        processor.process_bytes(&upload)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            tracing::info!(timing = %result.timing_summary(), "Processed upload");
            ([(header::CONTENT_TYPE, result.content_type())], result.data).into_response()
        },
        Ok(Err(e)) if e.is_client_error() => {
            tracing::warn!(error = %e, "Rejected upload");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        },
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Processing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        },
        Err(e) => {
            tracing::error!(error = %e, "Processing task aborted");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Processing task failed: {e}"),
            )
        },
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<Option<Bytes>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(|e| e.body_text())?;
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
