//! services/api/src/web/city_tax.rs
//!
//! Tourist-tax ("imposta di soggiorno") filings: PDFs grouped by property, year and
//! quarter.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use backoffice_core::documents::{self, city_tax_path};
use backoffice_core::domain::{CityTaxFile, PropertyId};
use backoffice_core::{export_range, fetch_attachment, BatchUpload};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::{export_error, port_error, HttpError};
use crate::web::rest::{archive_response, pdf_response, read_multipart, MultipartForm, RangeQuery};
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct YearQuery {
    /// Defaults to the current year.
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct BatchUploadResponse {
    #[schema(value_type = Vec<Object>)]
    pub stored: Vec<CityTaxFile>,
    /// Names of the files refused because they are not PDFs.
    pub rejected: Vec<String>,
}

impl From<BatchUpload> for BatchUploadResponse {
    fn from(batch: BatchUpload) -> Self {
        Self {
            stored: batch.stored,
            rejected: batch.rejected,
        }
    }
}

fn number_field<T: std::str::FromStr>(form: &MultipartForm, name: &str) -> Result<T, HttpError> {
    let raw = form.required(name)?;
    raw.parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid {name} '{raw}'")))
}

/// GET /properties/{property}/city-tax - Filings of one year, most recent upload first
#[utoipa::path(
    get,
    path = "/properties/{property}/city-tax",
    params(
        ("property" = String, Path, description = "omait or cb"),
        YearQuery
    ),
    responses(
        (status = 200, description = "Filings of the year")
    )
)]
pub async fn list_tax_files_handler(
    State(state): State<Arc<AppState>>,
    Path(property): Path<PropertyId>,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let files = state
        .records
        .list_city_tax_files(property, year)
        .await
        .map_err(|e| port_error(e, "Failed to list tax files"))?;
    Ok(Json(files))
}

/// POST /properties/{property}/city-tax - Upload one or more PDFs into a quarter
#[utoipa::path(
    post,
    path = "/properties/{property}/city-tax",
    params(("property" = String, Path, description = "omait or cb")),
    request_body(
        content_type = "multipart/form-data",
        description = "Fields year and quarter (1 to 4), plus one or more files."
    ),
    responses(
        (status = 201, description = "Stored files and the names of refused ones", body = BatchUploadResponse),
        (status = 400, description = "Missing year, invalid quarter or no files")
    )
)]
pub async fn upload_tax_files_handler(
    State(state): State<Arc<AppState>>,
    Path(property): Path<PropertyId>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let form = read_multipart(multipart).await?;
    let year: i32 = number_field(&form, "year")?;
    let quarter: u8 = number_field(&form, "quarter")?;
    if form.files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include at least one file".to_string(),
        ));
    }
    let batch = documents::upload_city_tax_files(
        state.records.as_ref(),
        state.attachments.as_ref(),
        property,
        year,
        quarter,
        form.files,
    )
    .await
    .map_err(|e| port_error(e, "Failed to store tax files"))?;
    Ok((StatusCode::CREATED, Json(BatchUploadResponse::from(batch))))
}

/// GET /city-tax/{file_id}/file - Download one filing
#[utoipa::path(
    get,
    path = "/city-tax/{file_id}/file",
    params(("file_id" = String, Path, description = "Filing id")),
    responses(
        (status = 200, description = "The PDF", content_type = "application/pdf"),
        (status = 404, description = "Unknown filing or file not found")
    )
)]
pub async fn download_tax_file_handler(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let file = state
        .records
        .get_city_tax_file(&file_id)
        .await
        .map_err(|e| port_error(e, "Failed to load tax file"))?;
    let data = fetch_attachment(
        state.attachments.as_ref(),
        &city_tax_path(&file.id, &file.file_name),
    )
    .await
    .map_err(export_error)?;
    Ok(pdf_response(&file.file_name, data))
}

/// DELETE /city-tax/{file_id} - Delete one filing
#[utoipa::path(
    delete,
    path = "/city-tax/{file_id}",
    params(("file_id" = String, Path, description = "Filing id")),
    responses(
        (status = 204, description = "Filing deleted"),
        (status = 404, description = "Unknown filing")
    )
)]
pub async fn delete_tax_file_handler(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    documents::delete_city_tax_file(state.records.as_ref(), state.attachments.as_ref(), &file_id)
        .await
        .map_err(|e| port_error(e, "Failed to delete tax file"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /properties/{property}/city-tax/export - Filings whose quarter starts within a range
#[utoipa::path(
    get,
    path = "/properties/{property}/city-tax/export",
    params(
        ("property" = String, Path, description = "omait or cb"),
        RangeQuery
    ),
    responses(
        (status = 200, description = "Imposta_Soggiorno_<PROP>_<start>_<end>.zip", content_type = "application/zip"),
        (status = 400, description = "Malformed or reversed range"),
        (status = 422, description = "No filings in range")
    )
)]
pub async fn export_tax_files_handler(
    State(state): State<Arc<AppState>>,
    Path(property): Path<PropertyId>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let range = query.range()?;
    let files = state
        .records
        .list_city_tax_files_by_property(property)
        .await
        .map_err(|e| port_error(e, "Failed to list tax files"))?;
    let scope = format!("Imposta_Soggiorno_{}", property.code());
    let export = export_range(&files, range, state.attachments.as_ref(), &scope, |_| {})
        .await
        .map_err(export_error)?;
    Ok(archive_response(export))
}
