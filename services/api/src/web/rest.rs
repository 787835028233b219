//! services/api/src/web/rest.rs
//!
//! Shared request/response plumbing for the REST handlers (multipart uploads, PDF and
//! ZIP download responses, export range parsing) and the master definition for the
//! OpenAPI specification.

use axum::{
    body::Body,
    extract::Multipart,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use backoffice_core::{ArchiveExport, DateRange, Upload};
use bytes::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::error;
use utoipa::{IntoParams, OpenApi};

use crate::error::{filter_error, HttpError};
use crate::web::{auth, bookings, city_tax, files, invoices, overview};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::open_attempt_handler,
        auth::get_attempt_handler,
        auth::close_attempt_handler,
        auth::credentials_handler,
        auth::digit_handler,
        auth::backspace_handler,
        auth::paste_code_handler,
        auth::verify_handler,
        auth::resend_handler,
        auth::abandon_handler,
        auth::session_handler,
        auth::logout_handler,
        overview::overview_handler,
        bookings::list_bookings_handler,
        bookings::create_booking_handler,
        bookings::get_booking_handler,
        bookings::update_booking_handler,
        bookings::delete_booking_handler,
        bookings::upload_document_handler,
        bookings::download_document_handler,
        bookings::delete_document_handler,
        bookings::booking_archive_handler,
        bookings::export_bookings_handler,
        invoices::list_invoices_handler,
        invoices::upload_invoice_handler,
        invoices::download_invoice_handler,
        invoices::delete_invoice_handler,
        invoices::export_invoices_handler,
        city_tax::list_tax_files_handler,
        city_tax::upload_tax_files_handler,
        city_tax::download_tax_file_handler,
        city_tax::delete_tax_file_handler,
        city_tax::export_tax_files_handler,
        files::file_handler,
    ),
    components(
        schemas(
            auth::CredentialsRequest,
            auth::DigitRequest,
            auth::PasteCodeRequest,
            auth::LoginResponse,
            auth::SessionResponse,
            bookings::BookingResponse,
            bookings::DocumentSlotView,
            city_tax::BatchUploadResponse,
        )
    ),
    tags(
        (name = "Back-Office API", description = "Bookings, supplier invoices, tourist-tax filings and their document archives.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Uploads
//=========================================================================================

/// A decoded `multipart/form-data` body: text fields by name plus every file part.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<Upload>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, HttpError> {
        self.text(name)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Field '{name}' is required")))
    }

    /// The first file part; the handlers taking a single document use this.
    pub fn single_file(&mut self) -> Result<Upload, HttpError> {
        if self.files.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            ));
        }
        Ok(self.files.remove(0))
    }
}

pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, HttpError> {
    let mut form = MultipartForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                form.files.push(Upload {
                    file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let value = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read field '{}': {}", name, e),
                    )
                })?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}

//=========================================================================================
// Downloads
//=========================================================================================

/// Inclusive export range, as `YYYY-MM-DD` query parameters.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

impl RangeQuery {
    pub fn range(&self) -> Result<DateRange, HttpError> {
        DateRange::parse(&self.start, &self.end).map_err(filter_error)
    }
}

pub const EXPORT_COMPLETED_HEADER: HeaderName = HeaderName::from_static("x-export-completed");
pub const EXPORT_TOTAL_HEADER: HeaderName = HeaderName::from_static("x-export-total");

/// Offers a finished archive as a download, with the fetch counts as headers.
pub fn archive_response(export: ArchiveExport) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_DISPOSITION, attachment_disposition(&export.file_name)),
        (EXPORT_COMPLETED_HEADER, export.progress.completed.to_string()),
        (EXPORT_TOTAL_HEADER, export.progress.total.to_string()),
    ];
    (headers, Body::from(export.bytes)).into_response()
}

/// Serves a single PDF inline so the browser can preview it.
pub fn pdf_response(file_name: &str, data: Bytes) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", quoted(file_name)),
        ),
    ];
    (headers, Body::from(data)).into_response()
}

fn attachment_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{}\"", quoted(file_name))
}

fn quoted(file_name: &str) -> String {
    file_name.replace(['"', '\\', '\r', '\n'], "_")
}

/// Logs an unexpected failure and hides its detail from the client.
pub fn internal(context: &str, e: impl std::fmt::Debug) -> HttpError {
    error!("{}: {:?}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
}
