pub mod auth;
pub mod bookings;
pub mod city_tax;
pub mod countdown_task;
pub mod files;
pub mod invoices;
pub mod login;
pub mod middleware;
pub mod overview;
pub mod rest;
pub mod state;
pub mod sweep_task;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::require_auth;
use rest::{ApiDoc, EXPORT_COMPLETED_HEADER, EXPORT_TOTAL_HEADER};
use state::AppState;

/// Largest accepted request body; scanned PDFs can be sizeable.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Builds the complete application: public auth routes, the session-protected
/// back-office routes, and the Swagger UI.
pub fn build_router(state: Arc<AppState>, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT])
        .expose_headers([EXPORT_COMPLETED_HEADER, EXPORT_TOTAL_HEADER]);

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/auth/login-attempts", post(auth::open_attempt_handler))
        .route(
            "/auth/login-attempts/{attempt_id}",
            get(auth::get_attempt_handler).delete(auth::close_attempt_handler),
        )
        .route(
            "/auth/login-attempts/{attempt_id}/credentials",
            post(auth::credentials_handler),
        )
        .route(
            "/auth/login-attempts/{attempt_id}/digits/{index}",
            put(auth::digit_handler),
        )
        .route(
            "/auth/login-attempts/{attempt_id}/digits/{index}/backspace",
            post(auth::backspace_handler),
        )
        .route("/auth/login-attempts/{attempt_id}/code", put(auth::paste_code_handler))
        .route("/auth/login-attempts/{attempt_id}/verify", post(auth::verify_handler))
        .route("/auth/login-attempts/{attempt_id}/resend", post(auth::resend_handler))
        .route("/auth/login-attempts/{attempt_id}/abandon", post(auth::abandon_handler))
        .route("/auth/session", get(auth::session_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (active session required)
    let protected_routes = Router::new()
        .route("/overview", get(overview::overview_handler))
        .route(
            "/properties/{property}/bookings",
            get(bookings::list_bookings_handler),
        )
        .route(
            "/properties/{property}/bookings/export",
            get(bookings::export_bookings_handler),
        )
        .route("/bookings", post(bookings::create_booking_handler))
        .route(
            "/bookings/{booking_id}",
            get(bookings::get_booking_handler)
                .patch(bookings::update_booking_handler)
                .delete(bookings::delete_booking_handler),
        )
        .route(
            "/bookings/{booking_id}/documents/{slot}",
            put(bookings::upload_document_handler)
                .get(bookings::download_document_handler)
                .delete(bookings::delete_document_handler),
        )
        .route("/bookings/{booking_id}/archive", get(bookings::booking_archive_handler))
        .route(
            "/invoices",
            get(invoices::list_invoices_handler).post(invoices::upload_invoice_handler),
        )
        .route("/invoices/export", get(invoices::export_invoices_handler))
        .route("/invoices/{invoice_id}", delete(invoices::delete_invoice_handler))
        .route("/invoices/{invoice_id}/file", get(invoices::download_invoice_handler))
        .route(
            "/properties/{property}/city-tax",
            get(city_tax::list_tax_files_handler).post(city_tax::upload_tax_files_handler),
        )
        .route(
            "/properties/{property}/city-tax/export",
            get(city_tax::export_tax_files_handler),
        )
        .route("/city-tax/{file_id}", delete(city_tax::delete_tax_file_handler))
        .route("/city-tax/{file_id}/file", get(city_tax::download_tax_file_handler))
        .route("/files/{*path}", get(files::file_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
