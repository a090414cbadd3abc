// src/handlers/check_logs.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedActor,
        rbac::{RequireRole, SecurityDesk},
    },
    models::{
        check_log::{
            CheckInPayload, CheckInReceipt, CheckLogDetail, CheckLogListQuery, CheckLogStats,
            CheckOutPayload,
        },
        page::Paginated,
    },
};

// POST /api/checklogs/checkin
#[utoipa::path(
    post,
    path = "/api/checklogs/checkin",
    tag = "Check-in",
    request_body = CheckInPayload,
    responses(
        (status = 201, description = "Entrada registrada", body = CheckInReceipt),
        (status = 400, description = "Nem passId nem appointmentId"),
        (status = 404, description = "Passe não encontrado"),
        (status = 409, description = "Passe inativo ou visitante já dentro")
    ),
    security(("api_jwt" = []))
)]
pub async fn check_in(
    State(app_state): State<AppState>,
    guard: RequireRole<SecurityDesk>,
    Json(payload): Json<CheckInPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let receipt = app_state.check_log_service.check_in(guard.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// PATCH /api/checklogs/checkout/{id}
#[utoipa::path(
    patch,
    path = "/api/checklogs/checkout/{id}",
    tag = "Check-in",
    request_body = CheckOutPayload,
    params(
        ("id" = Uuid, Path, description = "ID do Registro")
    ),
    responses(
        (status = 200, description = "Saída registrada", body = CheckLogDetail),
        (status = 404, description = "Registro não encontrado"),
        (status = 409, description = "Saída já registrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn check_out(
    State(app_state): State<AppState>,
    guard: RequireRole<SecurityDesk>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CheckOutPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let log = app_state
        .check_log_service
        .check_out(guard.actor(), id, payload.notes)
        .await?;
    Ok((StatusCode::OK, Json(log)))
}

// GET /api/checklogs
#[utoipa::path(
    get,
    path = "/api/checklogs",
    tag = "Check-in",
    params(CheckLogListQuery),
    responses(
        (status = 200, description = "Lista paginada", body = Paginated<CheckLogDetail>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_check_logs(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
    Query(query): Query<CheckLogListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.check_log_service.list(query).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/checklogs/current
#[utoipa::path(
    get,
    path = "/api/checklogs/current",
    tag = "Check-in",
    responses(
        (status = 200, description = "Visitantes dentro do prédio", body = [CheckLogDetail])
    ),
    security(("api_jwt" = []))
)]
pub async fn current_visitors(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
) -> Result<impl IntoResponse, AppError> {
    let logs = app_state.check_log_service.current().await?;
    Ok((StatusCode::OK, Json(logs)))
}

// GET /api/checklogs/stats
#[utoipa::path(
    get,
    path = "/api/checklogs/stats",
    tag = "Check-in",
    responses(
        (status = 200, description = "Indicadores do dia", body = CheckLogStats)
    ),
    security(("api_jwt" = []))
)]
pub async fn check_log_stats(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state
        .check_log_service
        .stats(Utc::now().date_naive())
        .await?;
    Ok((StatusCode::OK, Json(stats)))
}

// GET /api/checklogs/visitor/{visitor_id}
#[utoipa::path(
    get,
    path = "/api/checklogs/visitor/{visitor_id}",
    tag = "Check-in",
    params(
        ("visitor_id" = Uuid, Path, description = "ID do Visitante")
    ),
    responses(
        (status = 200, description = "Histórico de entradas do visitante", body = [CheckLogDetail])
    ),
    security(("api_jwt" = []))
)]
pub async fn visitor_history(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
    Path(visitor_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let logs = app_state.check_log_service.visitor_history(visitor_id).await?;
    Ok((StatusCode::OK, Json(logs)))
}

// GET /api/checklogs/{id}
#[utoipa::path(
    get,
    path = "/api/checklogs/{id}",
    tag = "Check-in",
    params(
        ("id" = Uuid, Path, description = "ID do Registro")
    ),
    responses(
        (status = 200, description = "Registro com visitante e passe", body = CheckLogDetail),
        (status = 404, description = "Registro não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_check_log(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let log = app_state.check_log_service.get(id).await?;
    Ok((StatusCode::OK, Json(log)))
}
