//! services/api/src/web/overview.rs

use axum::{extract::State, response::IntoResponse, Json};
use backoffice_core::Overview;
use std::sync::Arc;

use crate::error::{port_error, HttpError};
use crate::web::state::AppState;

/// GET /overview - Booking counts per property and the latest supplier invoices
#[utoipa::path(
    get,
    path = "/overview",
    responses(
        (status = 200, description = "Landing-page statistics")
    )
)]
pub async fn overview_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let bookings = state
        .records
        .list_bookings()
        .await
        .map_err(|e| port_error(e, "Failed to list bookings"))?;
    let invoices = state
        .records
        .list_invoices()
        .await
        .map_err(|e| port_error(e, "Failed to list invoices"))?;
    Ok(Json(Overview::compute(&bookings, &invoices)))
}
