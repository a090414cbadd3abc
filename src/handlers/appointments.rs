// src/handlers/appointments.rs

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
        auth::{AuthenticatedActor, MaybeActor},
        rbac::{AppointmentParticipants, Approvers, RequireRole},
    },
    models::{
        appointment::{
            AppointmentCreated, AppointmentDetail, AppointmentListQuery, AppointmentStats,
            ApprovalReceipt, CreateAppointmentPayload, RejectAppointmentPayload,
            UpdateAppointmentPayload,
        },
        page::Paginated,
    },
};

// POST /api/appointments/public
#[utoipa::path(
    post,
    path = "/api/appointments/public",
    tag = "Appointments",
    request_body = CreateAppointmentPayload,
    responses(
        (status = 201, description = "Solicitação registrada (pendente)", body = AppointmentCreated),
        (status = 400, description = "Dados inválidos"),
        (status = 422, description = "Data no passado ou anfitrião inválido")
    )
)]
pub async fn create_public(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateAppointmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let created = app_state.appointment_service.create(None, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// POST /api/appointments
#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "Appointments",
    request_body = CreateAppointmentPayload,
    responses(
        (status = 201, description = "Agendamento criado (pendente)", body = AppointmentCreated),
        (status = 404, description = "Visitante ou anfitrião não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_appointment(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(payload): Json<CreateAppointmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let created = app_state.appointment_service.create(Some(actor), payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/appointments
#[utoipa::path(
    get,
    path = "/api/appointments",
    tag = "Appointments",
    params(AppointmentListQuery),
    responses(
        (status = 200, description = "Lista paginada", body = Paginated<AppointmentDetail>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_appointments(
    State(app_state): State<AppState>,
    guard: RequireRole<Approvers>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.appointment_service.list(guard.actor(), query).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/appointments/stats
#[utoipa::path(
    get,
    path = "/api/appointments/stats",
    tag = "Appointments",
    responses(
        (status = 200, description = "Contagens por status", body = AppointmentStats)
    ),
    security(("api_jwt" = []))
)]
pub async fn appointment_stats(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state
        .appointment_service
        .stats(actor, Utc::now().date_naive())
        .await?;
    Ok((StatusCode::OK, Json(stats)))
}

// GET /api/appointments/my
#[utoipa::path(
    get,
    path = "/api/appointments/my",
    tag = "Appointments",
    responses(
        (status = 200, description = "Agendamentos do visitante logado", body = [AppointmentDetail])
    ),
    security(("api_jwt" = []))
)]
pub async fn my_appointments(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<impl IntoResponse, AppError> {
    let items = app_state.appointment_service.list_mine(actor).await?;
    Ok((StatusCode::OK, Json(items)))
}

// GET /api/appointments/visitor/{visitor_id}
#[utoipa::path(
    get,
    path = "/api/appointments/visitor/{visitor_id}",
    tag = "Appointments",
    params(
        ("visitor_id" = Uuid, Path, description = "ID do Visitante")
    ),
    responses(
        (status = 200, description = "Agendamentos do visitante", body = [AppointmentDetail])
    )
)]
pub async fn appointments_by_visitor(
    State(app_state): State<AppState>,
    MaybeActor(actor): MaybeActor,
    Path(visitor_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let items = app_state
        .appointment_service
        .list_by_visitor(actor, visitor_id)
        .await?;
    Ok((StatusCode::OK, Json(items)))
}

// GET /api/appointments/{id}
#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do Agendamento")
    ),
    responses(
        (status = 200, description = "Agendamento com visitante e anfitrião", body = AppointmentDetail),
        (status = 404, description = "Agendamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_appointment(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.appointment_service.get(actor, id).await?;
    Ok((StatusCode::OK, Json(detail)))
}

// PATCH /api/appointments/{id}
#[utoipa::path(
    patch,
    path = "/api/appointments/{id}",
    tag = "Appointments",
    request_body = UpdateAppointmentPayload,
    params(
        ("id" = Uuid, Path, description = "ID do Agendamento")
    ),
    responses(
        (status = 200, description = "Agendamento alterado", body = AppointmentDetail),
        (status = 409, description = "Agendamento já encerrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_appointment(
    State(app_state): State<AppState>,
    guard: RequireRole<Approvers>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAppointmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let detail = app_state
        .appointment_service
        .update(guard.actor(), id, payload)
        .await?;
    Ok((StatusCode::OK, Json(detail)))
}

// PATCH /api/appointments/{id}/approve
#[utoipa::path(
    patch,
    path = "/api/appointments/{id}/approve",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do Agendamento")
    ),
    responses(
        (status = 200, description = "Aprovado; inclui o resultado das notificações", body = ApprovalReceipt),
        (status = 403, description = "Somente o anfitrião ou admin"),
        (status = 409, description = "Agendamento não está pendente")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_appointment(
    State(app_state): State<AppState>,
    guard: RequireRole<Approvers>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = app_state.appointment_service.approve(guard.actor(), id).await?;
    Ok((StatusCode::OK, Json(receipt)))
}

// PATCH /api/appointments/{id}/reject
#[utoipa::path(
    patch,
    path = "/api/appointments/{id}/reject",
    tag = "Appointments",
    request_body = RejectAppointmentPayload,
    params(
        ("id" = Uuid, Path, description = "ID do Agendamento")
    ),
    responses(
        (status = 200, description = "Recusado", body = AppointmentDetail),
        (status = 409, description = "Agendamento não está pendente")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_appointment(
    State(app_state): State<AppState>,
    guard: RequireRole<Approvers>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RejectAppointmentPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let detail = app_state
        .appointment_service
        .reject(guard.actor(), id, payload)
        .await?;
    Ok((StatusCode::OK, Json(detail)))
}

// PATCH /api/appointments/{id}/cancel
#[utoipa::path(
    patch,
    path = "/api/appointments/{id}/cancel",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do Agendamento")
    ),
    responses(
        (status = 200, description = "Cancelado", body = AppointmentDetail),
        (status = 403, description = "Nem anfitrião, nem admin, nem o próprio visitante")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_appointment(
    State(app_state): State<AppState>,
    guard: RequireRole<AppointmentParticipants>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.appointment_service.cancel(guard.actor(), id).await?;
    Ok((StatusCode::OK, Json(detail)))
}
