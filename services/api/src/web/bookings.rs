//! services/api/src/web/bookings.rs
//!
//! Booking endpoints: listing and filtering per property, manual entry, edits,
//! the five compliance documents of each booking and the two archive exports.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use backoffice_core::documents::{self, booking_document_path};
use backoffice_core::domain::{Booking, BookingUpdate, DocumentSlot, NewBooking, PropertyId};
use backoffice_core::{export_range, export_record, fetch_attachment, BookingFilter};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{export_error, port_error, HttpError};
use crate::web::rest::{archive_response, internal, pdf_response, read_multipart, RangeQuery};
use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DocumentSlotView {
    pub slot: String,
    pub label: String,
    pub present: bool,
    /// Where the browser can open the stored file, when there is one.
    pub url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BookingResponse {
    #[schema(value_type = Object)]
    pub booking: Booking,
    pub documents: Vec<DocumentSlotView>,
}

async fn booking_response(state: &AppState, booking: Booking) -> Result<BookingResponse, HttpError> {
    let mut documents = Vec::with_capacity(DocumentSlot::ALL.len());
    for slot in DocumentSlot::ALL {
        let present = booking.documents.get(*slot);
        let url = if present {
            state
                .attachments
                .download_url(&booking_document_path(&booking.booking_id, *slot))
                .await
                .map_err(|e| internal("Failed to resolve document URL", e))?
        } else {
            None
        };
        documents.push(DocumentSlotView {
            slot: slot.as_str().to_string(),
            label: slot.label(booking.property).to_string(),
            present,
            url,
        });
    }
    Ok(BookingResponse { booking, documents })
}

//=========================================================================================
// Booking Records
//=========================================================================================

/// GET /properties/{property}/bookings - Bookings of a property, ordered by check-in
#[utoipa::path(
    get,
    path = "/properties/{property}/bookings",
    params(
        ("property" = String, Path, description = "omait or cb"),
        ("search" = Option<String>, Query, description = "Substring of the guest's full name"),
        ("year" = Option<i32>, Query, description = "Check-in year"),
        ("month" = Option<u32>, Query, description = "Check-in month, 1 to 12"),
        ("ota" = Option<String>, Query, description = "Booking channel"),
        ("incomplete_only" = Option<bool>, Query, description = "Only bookings missing a document")
    ),
    responses(
        (status = 200, description = "Matching bookings")
    )
)]
pub async fn list_bookings_handler(
    State(state): State<Arc<AppState>>,
    Path(property): Path<PropertyId>,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, HttpError> {
    let bookings = state
        .records
        .list_bookings_by_property(property)
        .await
        .map_err(|e| port_error(e, "Failed to list bookings"))?;
    Ok(Json(filter.apply(bookings)))
}

/// POST /bookings - Enter a booking manually
#[utoipa::path(
    post,
    path = "/bookings",
    request_body(content_type = "application/json", description = "property, first_name, last_name, check_in, check_out, and optionally ota, stay_total, payment_status"),
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Missing name or inconsistent dates")
    )
)]
pub async fn create_booking_handler(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewBooking>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = documents::create_manual_booking(state.records.as_ref(), new)
        .await
        .map_err(|e| port_error(e, "Failed to create booking"))?;
    Ok((StatusCode::CREATED, Json(booking_response(&state, booking).await?)))
}

/// GET /bookings/{booking_id} - A booking with its document slots
#[utoipa::path(
    get,
    path = "/bookings/{booking_id}",
    params(("booking_id" = String, Path, description = "Booking id")),
    responses(
        (status = 200, description = "The booking", body = BookingResponse),
        (status = 404, description = "Unknown booking")
    )
)]
pub async fn get_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = state
        .records
        .get_booking(&booking_id)
        .await
        .map_err(|e| port_error(e, "Failed to load booking"))?;
    Ok(Json(booking_response(&state, booking).await?))
}

/// PATCH /bookings/{booking_id} - Merge-update a booking, including its internal notes
#[utoipa::path(
    patch,
    path = "/bookings/{booking_id}",
    params(("booking_id" = String, Path, description = "Booking id")),
    request_body(content_type = "application/json", description = "Any subset of the editable booking fields"),
    responses(
        (status = 200, description = "The updated booking", body = BookingResponse),
        (status = 400, description = "Blank name or check-out before check-in"),
        (status = 404, description = "Unknown booking")
    )
)]
pub async fn update_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(update): Json<BookingUpdate>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = state
        .records
        .update_booking(&booking_id, &update)
        .await
        .map_err(|e| port_error(e, "Failed to update booking"))?;
    Ok(Json(booking_response(&state, booking).await?))
}

/// DELETE /bookings/{booking_id} - Delete a booking and all of its documents
#[utoipa::path(
    delete,
    path = "/bookings/{booking_id}",
    params(("booking_id" = String, Path, description = "Booking id")),
    responses(
        (status = 204, description = "Booking deleted"),
        (status = 404, description = "Unknown booking")
    )
)]
pub async fn delete_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    documents::delete_booking(state.records.as_ref(), state.attachments.as_ref(), &booking_id)
        .await
        .map_err(|e| port_error(e, "Failed to delete booking"))?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Booking Documents
//=========================================================================================

/// PUT /bookings/{booking_id}/documents/{slot} - Upload the PDF of a slot
#[utoipa::path(
    put,
    path = "/bookings/{booking_id}/documents/{slot}",
    params(
        ("booking_id" = String, Path, description = "Booking id"),
        ("slot" = String, Path, description = "Document slot, e.g. fattura_ota")
    ),
    request_body(content_type = "multipart/form-data", description = "A single PDF file."),
    responses(
        (status = 200, description = "Stored; slot marked present", body = BookingResponse),
        (status = 404, description = "Unknown booking"),
        (status = 415, description = "Not a PDF")
    )
)]
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    Path((booking_id, slot)): Path<(String, DocumentSlot)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let upload = read_multipart(multipart).await?.single_file()?;
    let booking = documents::attach_booking_document(
        state.records.as_ref(),
        state.attachments.as_ref(),
        &booking_id,
        slot,
        upload,
    )
    .await
    .map_err(|e| port_error(e, "Failed to store document"))?;
    info!("Document {} of booking {} uploaded", slot, booking_id);
    Ok(Json(booking_response(&state, booking).await?))
}

/// GET /bookings/{booking_id}/documents/{slot} - Download the PDF of a slot
#[utoipa::path(
    get,
    path = "/bookings/{booking_id}/documents/{slot}",
    params(
        ("booking_id" = String, Path, description = "Booking id"),
        ("slot" = String, Path, description = "Document slot, e.g. fattura_ota")
    ),
    responses(
        (status = 200, description = "The PDF", content_type = "application/pdf"),
        (status = 404, description = "Unknown booking or file not found")
    )
)]
pub async fn download_document_handler(
    State(state): State<Arc<AppState>>,
    Path((booking_id, slot)): Path<(String, DocumentSlot)>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = state
        .records
        .get_booking(&booking_id)
        .await
        .map_err(|e| port_error(e, "Failed to load booking"))?;
    let data = fetch_attachment(
        state.attachments.as_ref(),
        &booking_document_path(&booking_id, slot),
    )
    .await
    .map_err(export_error)?;
    let file_name = format!("{}_{}.pdf", slot.label(booking.property), booking.guest_folder());
    Ok(pdf_response(&file_name, data))
}

/// DELETE /bookings/{booking_id}/documents/{slot} - Remove the PDF of a slot
#[utoipa::path(
    delete,
    path = "/bookings/{booking_id}/documents/{slot}",
    params(
        ("booking_id" = String, Path, description = "Booking id"),
        ("slot" = String, Path, description = "Document slot, e.g. fattura_ota")
    ),
    responses(
        (status = 200, description = "Removed; slot marked absent", body = BookingResponse),
        (status = 404, description = "Unknown booking")
    )
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Path((booking_id, slot)): Path<(String, DocumentSlot)>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = documents::detach_booking_document(
        state.records.as_ref(),
        state.attachments.as_ref(),
        &booking_id,
        slot,
    )
    .await
    .map_err(|e| port_error(e, "Failed to remove document"))?;
    Ok(Json(booking_response(&state, booking).await?))
}

//=========================================================================================
// Archives
//=========================================================================================

/// GET /bookings/{booking_id}/archive - Every document of one booking as a ZIP
#[utoipa::path(
    get,
    path = "/bookings/{booking_id}/archive",
    params(("booking_id" = String, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Scheda_<Guest>.zip", content_type = "application/zip"),
        (status = 404, description = "Unknown booking")
    )
)]
pub async fn booking_archive_handler(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = state
        .records
        .get_booking(&booking_id)
        .await
        .map_err(|e| port_error(e, "Failed to load booking"))?;
    let export = export_record(&booking, state.attachments.as_ref(), "Scheda")
        .await
        .map_err(export_error)?;
    Ok(archive_response(export))
}

/// GET /properties/{property}/bookings/export - Documents of every booking checking in within a range
#[utoipa::path(
    get,
    path = "/properties/{property}/bookings/export",
    params(
        ("property" = String, Path, description = "omait or cb"),
        RangeQuery
    ),
    responses(
        (status = 200, description = "Export_<PROP>_<start>_<end>.zip", content_type = "application/zip"),
        (status = 400, description = "Malformed or reversed range"),
        (status = 422, description = "No bookings in range, or none with documents")
    )
)]
pub async fn export_bookings_handler(
    State(state): State<Arc<AppState>>,
    Path(property): Path<PropertyId>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let range = query.range()?;
    let bookings = state
        .records
        .list_bookings_by_property(property)
        .await
        .map_err(|e| port_error(e, "Failed to list bookings"))?;
    let scope = format!("Export_{}", property.code());
    let export = export_range(&bookings, range, state.attachments.as_ref(), &scope, |_| {})
        .await
        .map_err(export_error)?;
    Ok(archive_response(export))
}
