//! services/api/src/web/invoices.rs
//!
//! Supplier ("passive") invoice endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use backoffice_core::documents::{self, invoice_path};
use backoffice_core::domain::{InvoiceCategory, NewInvoice};
use backoffice_core::{export_range, fetch_attachment, InvoiceFilter};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

use crate::error::{export_error, port_error, HttpError};
use crate::web::rest::{archive_response, pdf_response, read_multipart, MultipartForm, RangeQuery};
use crate::web::state::AppState;

const EXPORT_SCOPE: &str = "Archivio_Fatture_Passive";

fn new_invoice(form: &MultipartForm) -> Result<NewInvoice, HttpError> {
    let issue_date = form.required("issue_date")?;
    let issue_date = NaiveDate::parse_from_str(issue_date, "%Y-%m-%d").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("Invalid issue_date '{issue_date}', expected YYYY-MM-DD"),
        )
    })?;
    let category = form
        .required("category")?
        .parse::<InvoiceCategory>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(NewInvoice {
        supplier: form.required("supplier")?.to_string(),
        issue_date,
        invoice_number: form.required("invoice_number")?.to_string(),
        category,
        note: form.text("note").map(str::to_string),
    })
}

/// GET /invoices - Supplier invoices, newest issue date first
#[utoipa::path(
    get,
    path = "/invoices",
    params(
        ("search" = Option<String>, Query, description = "Substring of the supplier name"),
        ("year" = Option<i32>, Query, description = "Issue year"),
        ("month" = Option<u32>, Query, description = "Issue month, 1 to 12"),
        ("category" = Option<String>, Query, description = "Invoice category")
    ),
    responses(
        (status = 200, description = "Matching invoices")
    )
)]
pub async fn list_invoices_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<impl IntoResponse, HttpError> {
    let invoices = state
        .records
        .list_invoices()
        .await
        .map_err(|e| port_error(e, "Failed to list invoices"))?;
    Ok(Json(filter.apply(invoices)))
}

/// POST /invoices - Upload a supplier invoice with its PDF
#[utoipa::path(
    post,
    path = "/invoices",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields supplier, issue_date, invoice_number, category, optional note, and one PDF file."
    ),
    responses(
        (status = 201, description = "Invoice stored"),
        (status = 400, description = "Missing or malformed field"),
        (status = 415, description = "Not a PDF")
    )
)]
pub async fn upload_invoice_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut form = read_multipart(multipart).await?;
    let new = new_invoice(&form)?;
    let upload = form.single_file()?;
    let invoice = documents::upload_invoice(
        state.records.as_ref(),
        state.attachments.as_ref(),
        new,
        upload,
    )
    .await
    .map_err(|e| port_error(e, "Failed to store invoice"))?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /invoices/{invoice_id}/file - Download the invoice PDF
#[utoipa::path(
    get,
    path = "/invoices/{invoice_id}/file",
    params(("invoice_id" = String, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "The PDF", content_type = "application/pdf"),
        (status = 404, description = "Unknown invoice or file not found")
    )
)]
pub async fn download_invoice_handler(
    State(state): State<Arc<AppState>>,
    Path(invoice_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let invoice = state
        .records
        .get_invoice(&invoice_id)
        .await
        .map_err(|e| port_error(e, "Failed to load invoice"))?;
    let data = fetch_attachment(
        state.attachments.as_ref(),
        &invoice_path(&invoice.id, &invoice.file_name),
    )
    .await
    .map_err(export_error)?;
    Ok(pdf_response(&format!("{}.pdf", invoice.download_stem()), data))
}

/// DELETE /invoices/{invoice_id} - Delete an invoice and its PDF
#[utoipa::path(
    delete,
    path = "/invoices/{invoice_id}",
    params(("invoice_id" = String, Path, description = "Invoice id")),
    responses(
        (status = 204, description = "Invoice deleted"),
        (status = 404, description = "Unknown invoice")
    )
)]
pub async fn delete_invoice_handler(
    State(state): State<Arc<AppState>>,
    Path(invoice_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    documents::delete_invoice(state.records.as_ref(), state.attachments.as_ref(), &invoice_id)
        .await
        .map_err(|e| port_error(e, "Failed to delete invoice"))?;
    info!("Invoice {} deleted", invoice_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /invoices/export - Every invoice issued within a range, as a ZIP
#[utoipa::path(
    get,
    path = "/invoices/export",
    params(RangeQuery),
    responses(
        (status = 200, description = "Archivio_Fatture_Passive_<start>_<end>.zip", content_type = "application/zip"),
        (status = 400, description = "Malformed or reversed range"),
        (status = 422, description = "No invoices in range")
    )
)]
pub async fn export_invoices_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let range = query.range()?;
    let invoices = state
        .records
        .list_invoices()
        .await
        .map_err(|e| port_error(e, "Failed to list invoices"))?;
    let export = export_range(&invoices, range, state.attachments.as_ref(), EXPORT_SCOPE, |_| {})
        .await
        .map_err(export_error)?;
    Ok(archive_response(export))
}
