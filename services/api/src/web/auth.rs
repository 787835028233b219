//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: the two-step login attempt (credentials, then a
//! six-digit code under a one-minute countdown), the session probe and logout.
//!
//! Every login action answers with the attempt's full view. Rejections use a 401,
//! 409 or 503 status but still carry the view, whose `error` field the screen shows.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use backoffice_core::{LoginStage, LoginView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{login_status, HttpError};
use crate::web::login::{LoginFlow, LoginOutcome};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DigitRequest {
    /// The typed character(s); only the last digit is kept.
    pub value: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasteCodeRequest {
    pub code: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub attempt_id: Uuid,
    /// Stage, countdown, digits, focus, pending flags and the visible error.
    #[schema(value_type = Object)]
    pub login: LoginView,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
}

fn respond(attempt_id: Uuid, outcome: LoginOutcome) -> (StatusCode, Json<LoginResponse>) {
    let (status, login) = match outcome {
        Ok(view) => (StatusCode::OK, view),
        Err((failure, view)) => (login_status(failure), view),
    };
    (status, Json(LoginResponse { attempt_id, login }))
}

async fn find_flow(state: &AppState, attempt_id: Uuid) -> Result<Arc<LoginFlow>, HttpError> {
    state
        .logins
        .get(attempt_id)
        .await
        .ok_or((StatusCode::NOT_FOUND, "Login attempt not found".to_string()))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login-attempts - Open a login screen
#[utoipa::path(
    post,
    path = "/auth/login-attempts",
    responses(
        (status = 201, description = "Login attempt opened", body = LoginResponse)
    )
)]
pub async fn open_attempt_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (attempt_id, flow) = state.logins.open(&state).await;
    let login = flow.view().await;
    (StatusCode::CREATED, Json(LoginResponse { attempt_id, login }))
}

/// GET /auth/login-attempts/{attempt_id} - Current state of a login screen
#[utoipa::path(
    get,
    path = "/auth/login-attempts/{attempt_id}",
    params(("attempt_id" = Uuid, Path, description = "Login attempt id")),
    responses(
        (status = 200, description = "Login attempt state", body = LoginResponse),
        (status = 404, description = "Unknown attempt")
    )
)]
pub async fn get_attempt_handler(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    Ok(respond(attempt_id, Ok(flow.view().await)))
}

/// DELETE /auth/login-attempts/{attempt_id} - Close a login screen
#[utoipa::path(
    delete,
    path = "/auth/login-attempts/{attempt_id}",
    params(("attempt_id" = Uuid, Path, description = "Login attempt id")),
    responses(
        (status = 204, description = "Attempt closed"),
        (status = 404, description = "Unknown attempt")
    )
)]
pub async fn close_attempt_handler(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    if !state.logins.close(attempt_id).await {
        return Err((StatusCode::NOT_FOUND, "Login attempt not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/login-attempts/{attempt_id}/credentials - Submit username and password
#[utoipa::path(
    post,
    path = "/auth/login-attempts/{attempt_id}/credentials",
    params(("attempt_id" = Uuid, Path, description = "Login attempt id")),
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Credentials accepted; code stage started", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = LoginResponse),
        (status = 409, description = "Not possible at this stage", body = LoginResponse)
    )
)]
pub async fn credentials_handler(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    let outcome = flow.submit_credentials(&req.username, &req.password).await;
    Ok(respond(attempt_id, outcome))
}

/// PUT /auth/login-attempts/{attempt_id}/digits/{index} - Type into one code field
#[utoipa::path(
    put,
    path = "/auth/login-attempts/{attempt_id}/digits/{index}",
    params(
        ("attempt_id" = Uuid, Path, description = "Login attempt id"),
        ("index" = usize, Path, description = "Code field, 0 to 5")
    ),
    request_body = DigitRequest,
    responses(
        (status = 200, description = "Updated code fields", body = LoginResponse)
    )
)]
pub async fn digit_handler(
    State(state): State<Arc<AppState>>,
    Path((attempt_id, index)): Path<(Uuid, usize)>,
    Json(req): Json<DigitRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    let view = flow.edit_code(|a| a.enter_digit(index, &req.value)).await;
    Ok(respond(attempt_id, Ok(view)))
}

/// POST /auth/login-attempts/{attempt_id}/digits/{index}/backspace - Backspace in a code field
#[utoipa::path(
    post,
    path = "/auth/login-attempts/{attempt_id}/digits/{index}/backspace",
    params(
        ("attempt_id" = Uuid, Path, description = "Login attempt id"),
        ("index" = usize, Path, description = "Code field, 0 to 5")
    ),
    responses(
        (status = 200, description = "Updated code fields", body = LoginResponse)
    )
)]
pub async fn backspace_handler(
    State(state): State<Arc<AppState>>,
    Path((attempt_id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    let view = flow.edit_code(|a| a.backspace(index)).await;
    Ok(respond(attempt_id, Ok(view)))
}

/// PUT /auth/login-attempts/{attempt_id}/code - Paste a whole code
#[utoipa::path(
    put,
    path = "/auth/login-attempts/{attempt_id}/code",
    params(("attempt_id" = Uuid, Path, description = "Login attempt id")),
    request_body = PasteCodeRequest,
    responses(
        (status = 200, description = "Updated code fields", body = LoginResponse)
    )
)]
pub async fn paste_code_handler(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<PasteCodeRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    let view = flow.edit_code(|a| a.fill_code(&req.code)).await;
    Ok(respond(attempt_id, Ok(view)))
}

/// POST /auth/login-attempts/{attempt_id}/verify - Submit the entered code
#[utoipa::path(
    post,
    path = "/auth/login-attempts/{attempt_id}/verify",
    params(("attempt_id" = Uuid, Path, description = "Login attempt id")),
    responses(
        (status = 200, description = "Authenticated; session established", body = LoginResponse),
        (status = 401, description = "Invalid or expired code", body = LoginResponse),
        (status = 409, description = "Not possible at this stage", body = LoginResponse),
        (status = 503, description = "Code accepted but the session could not be stored", body = LoginResponse)
    )
)]
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    let outcome = flow.submit_code().await;
    if flow.stage().await == LoginStage::Authenticated {
        state.logins.close(attempt_id).await;
    }
    Ok(respond(attempt_id, outcome))
}

/// POST /auth/login-attempts/{attempt_id}/resend - Request a new code once the countdown ran out
#[utoipa::path(
    post,
    path = "/auth/login-attempts/{attempt_id}/resend",
    params(("attempt_id" = Uuid, Path, description = "Login attempt id")),
    responses(
        (status = 200, description = "New code issued; countdown restarted", body = LoginResponse),
        (status = 409, description = "Resend not available yet", body = LoginResponse)
    )
)]
pub async fn resend_handler(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    Ok(respond(attempt_id, flow.resend_code().await))
}

/// POST /auth/login-attempts/{attempt_id}/abandon - Go back to the credentials form
#[utoipa::path(
    post,
    path = "/auth/login-attempts/{attempt_id}/abandon",
    params(("attempt_id" = Uuid, Path, description = "Login attempt id")),
    responses(
        (status = 200, description = "Back at the credentials stage", body = LoginResponse),
        (status = 409, description = "Not in the code stage", body = LoginResponse)
    )
)]
pub async fn abandon_handler(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let flow = find_flow(&state, attempt_id).await?;
    Ok(respond(attempt_id, flow.abandon().await))
}

/// GET /auth/session - Whether a persisted session exists
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session state", body = SessionResponse)
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let authenticated = state.sessions.is_active().await.map_err(|e| {
        error!("Failed to read session state: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read session".to_string())
    })?;
    Ok(Json(SessionResponse { authenticated }))
}

/// POST /auth/logout - Clear the persisted session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    state.sessions.clear().await.map_err(|e| {
        error!("Failed to clear session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;
    state.logins.close_all().await;
    info!("Session cleared");
    Ok(StatusCode::NO_CONTENT)
}
