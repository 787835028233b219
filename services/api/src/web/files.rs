//! services/api/src/web/files.rs
//!
//! Serves blobs by storage path. The local attachment stores hand out `/files/...`
//! URLs that resolve here.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use backoffice_core::fetch_attachment;
use std::sync::Arc;

use crate::error::{export_error, HttpError};
use crate::web::rest::pdf_response;
use crate::web::state::AppState;

/// GET /files/{path} - A stored blob
#[utoipa::path(
    get,
    path = "/files/{path}",
    params(("path" = String, Path, description = "Storage path, e.g. documenti/BK-1/fattura_ota.pdf")),
    responses(
        (status = 200, description = "The stored PDF", content_type = "application/pdf"),
        (status = 404, description = "File not found")
    )
)]
pub async fn file_handler(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let data = fetch_attachment(state.attachments.as_ref(), &path)
        .await
        .map_err(export_error)?;
    let file_name = path.rsplit('/').next().unwrap_or(path.as_str());
    Ok(pdf_response(file_name, data))
}
