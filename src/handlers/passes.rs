// src/handlers/passes.rs

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
        rbac::{AdminOnly, RequireRole, SecurityDesk},
    },
    models::{
        page::{Page, Paginated},
        pass::{
            ExpiredPasses, IssuePassPayload, IssuedPass, PassDetail, PassListQuery, PassStats,
            VerificationResult,
        },
    },
    services::verification_service::{VerificationInput, VerifyPassPayload},
};

// GET /api/passes/verify/{value}
#[utoipa::path(
    get,
    path = "/api/passes/verify/{value}",
    tag = "Passes",
    params(
        ("value" = String, Path, description = "Número do passe ou ID do agendamento")
    ),
    responses(
        (status = 200, description = "Passe válido", body = VerificationResult),
        (status = 404, description = "Passe não encontrado"),
        (status = 409, description = "Passe revogado ou expirado"),
        (status = 422, description = "Fora da janela de validade ou visitante bloqueado")
    )
)]
pub async fn verify_by_path(
    State(app_state): State<AppState>,
    Path(value): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = app_state
        .verification_service
        .verify(&VerificationInput::Text(value))
        .await?;
    Ok((StatusCode::OK, Json(result)))
}

// POST /api/passes/verify
#[utoipa::path(
    post,
    path = "/api/passes/verify",
    tag = "Passes",
    request_body = VerifyPassPayload,
    responses(
        (status = 200, description = "Passe válido", body = VerificationResult),
        (status = 400, description = "Nenhum valor utilizável no corpo")
    )
)]
pub async fn verify_by_body(
    State(app_state): State<AppState>,
    Json(payload): Json<VerifyPassPayload>,
) -> Result<impl IntoResponse, AppError> {
    let input = payload
        .into_input()
        .ok_or(AppError::InvalidVerificationInput)?;
    let result = app_state.verification_service.verify(&input).await?;
    Ok((StatusCode::OK, Json(result)))
}

// POST /api/passes
#[utoipa::path(
    post,
    path = "/api/passes",
    tag = "Passes",
    request_body = IssuePassPayload,
    responses(
        (status = 201, description = "Passe emitido (ou o ativo existente, com created = false)", body = IssuedPass),
        (status = 400, description = "Visitante, anfitrião ou janela ausentes"),
        (status = 422, description = "Visitante bloqueado")
    ),
    security(("api_jwt" = []))
)]
pub async fn issue_pass(
    State(app_state): State<AppState>,
    guard: RequireRole<SecurityDesk>,
    Json(payload): Json<IssuePassPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let issued = app_state.pass_service.issue(guard.actor(), payload).await?;
    let status = if issued.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(issued)))
}

// GET /api/passes
#[utoipa::path(
    get,
    path = "/api/passes",
    tag = "Passes",
    params(PassListQuery),
    responses(
        (status = 200, description = "Lista paginada", body = Paginated<PassDetail>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_passes(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
    Query(query): Query<PassListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state
        .pass_service
        .list(query.filter(), Page::new(query.page, query.limit))
        .await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/passes/stats
#[utoipa::path(
    get,
    path = "/api/passes/stats",
    tag = "Passes",
    responses(
        (status = 200, description = "Contagens por status", body = PassStats)
    ),
    security(("api_jwt" = []))
)]
pub async fn pass_stats(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.pass_service.stats().await?;
    Ok((StatusCode::OK, Json(stats)))
}

// GET /api/passes/my
#[utoipa::path(
    get,
    path = "/api/passes/my",
    tag = "Passes",
    responses(
        (status = 200, description = "Passe ativo mais recente do visitante logado, ou null", body = Option<PassDetail>)
    ),
    security(("api_jwt" = []))
)]
pub async fn my_active_pass(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<impl IntoResponse, AppError> {
    let pass = app_state.pass_service.my_active(actor).await?;
    Ok((StatusCode::OK, Json(pass)))
}

// PATCH /api/passes/update-expired
#[utoipa::path(
    patch,
    path = "/api/passes/update-expired",
    tag = "Passes",
    responses(
        (status = 200, description = "Quantidade de passes expirados", body = ExpiredPasses)
    ),
    security(("api_jwt" = []))
)]
pub async fn expire_passes(
    State(app_state): State<AppState>,
    _guard: RequireRole<SecurityDesk>,
) -> Result<impl IntoResponse, AppError> {
    let updated = app_state.pass_service.expire_overdue(Utc::now()).await?;
    Ok((StatusCode::OK, Json(ExpiredPasses { updated })))
}

// GET /api/passes/{id}
#[utoipa::path(
    get,
    path = "/api/passes/{id}",
    tag = "Passes",
    params(
        ("id" = Uuid, Path, description = "ID do Passe")
    ),
    responses(
        (status = 200, description = "Passe com visitante e anfitrião", body = PassDetail),
        (status = 404, description = "Passe não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_pass(
    State(app_state): State<AppState>,
    _actor: AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let pass = app_state.pass_service.get(id).await?;
    Ok((StatusCode::OK, Json(pass)))
}

// PATCH /api/passes/{id}/revoke
#[utoipa::path(
    patch,
    path = "/api/passes/{id}/revoke",
    tag = "Passes",
    params(
        ("id" = Uuid, Path, description = "ID do Passe")
    ),
    responses(
        (status = 200, description = "Passe revogado", body = PassDetail),
        (status = 409, description = "Passe não está ativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn revoke_pass(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let pass = app_state.pass_service.revoke(id).await?;
    Ok((StatusCode::OK, Json(pass)))
}
