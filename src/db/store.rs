// src/db/store.rs
//
// Contrato de persistência usado pelos serviços. `PgStore` é a implementação
// de produção; os testes usam um store em memória com as mesmas restrições
// de unicidade.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        appointment::{
            Appointment, AppointmentChanges, AppointmentFilter, AppointmentStatus, NewAppointment,
            StatusChange,
        },
        check_log::{CheckLog, CheckLogFilter, CheckOut, NewCheckLog},
        page::Page,
        pass::{NewPass, Pass, PassFilter, PassStatus},
        people::{User, Visitor},
    },
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait VisitorStore: Send + Sync {
    async fn find_visitor_by_id(&self, id: Uuid) -> Result<Option<Visitor>, AppError>;

    /// Perfil de visitante vinculado a uma conta de usuário.
    async fn find_visitor_by_user(&self, user_id: Uuid) -> Result<Option<Visitor>, AppError>;

    /// Incrementa `visit_count` e grava `last_visit` de forma atômica.
    async fn record_visit(&self, visitor_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, AppError>;

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, AppError>;

    /// Aplica a transição somente se o status atual estiver em `from`.
    /// Retorna `None` se o agendamento não existe ou está em outro status.
    async fn transition_appointment(
        &self,
        id: Uuid,
        from: &[AppointmentStatus],
        change: StatusChange,
    ) -> Result<Option<Appointment>, AppError>;

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Option<Appointment>, AppError>;

    async fn set_notifications_sent(&self, id: Uuid, sent: bool) -> Result<(), AppError>;

    /// Ordenado por `scheduled_at` decrescente.
    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: Option<Page>,
    ) -> Result<Vec<Appointment>, AppError>;

    async fn count_appointments(&self, filter: &AppointmentFilter) -> Result<i64, AppError>;
}

#[async_trait]
pub trait PassStore: Send + Sync {
    /// Falha com `DuplicatePassNumber` ou `ActivePassExists` quando uma das
    /// restrições de unicidade é violada.
    async fn insert_pass(&self, new: NewPass) -> Result<Pass, AppError>;

    async fn pass_number_exists(&self, pass_number: &str) -> Result<bool, AppError>;

    async fn find_pass_by_id(&self, id: Uuid) -> Result<Option<Pass>, AppError>;

    async fn find_pass_by_number(&self, pass_number: &str) -> Result<Option<Pass>, AppError>;

    async fn find_active_pass_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Pass>, AppError>;

    /// Passe ativo mais recente do visitante.
    async fn find_latest_active_pass_for_visitor(
        &self,
        visitor_id: Uuid,
    ) -> Result<Option<Pass>, AppError>;

    async fn set_pass_artifacts(
        &self,
        id: Uuid,
        qr_code: Option<String>,
        pdf_path: Option<String>,
    ) -> Result<Option<Pass>, AppError>;

    /// `active → revoked`. `None` se o passe não existe ou não está ativo.
    async fn revoke_pass(&self, id: Uuid) -> Result<Option<Pass>, AppError>;

    /// `active → expired` para todo passe com `valid_until < now`.
    async fn expire_passes(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// Ordenado por `created_at` decrescente.
    async fn list_passes(&self, filter: &PassFilter, page: Page) -> Result<Vec<Pass>, AppError>;

    async fn count_passes(
        &self,
        filter: &PassFilter,
    ) -> Result<i64, AppError>;

    async fn count_passes_by_status(&self, status: Option<PassStatus>) -> Result<i64, AppError> {
        self.count_passes(&PassFilter { status, visitor_id: None }).await
    }
}

#[async_trait]
pub trait CheckLogStore: Send + Sync {
    /// Falha com `AlreadyCheckedIn` se já existe sessão aberta para o passe.
    async fn insert_check_log(&self, new: NewCheckLog) -> Result<CheckLog, AppError>;

    async fn find_check_log_by_id(&self, id: Uuid) -> Result<Option<CheckLog>, AppError>;

    async fn find_open_check_log_for_pass(&self, pass_id: Uuid)
    -> Result<Option<CheckLog>, AppError>;

    /// Fecha a sessão somente se ainda estiver aberta; `None` caso contrário.
    /// As notas informadas são anexadas às existentes.
    async fn close_check_log(&self, id: Uuid, checkout: CheckOut)
    -> Result<Option<CheckLog>, AppError>;

    /// Sessões abertas com `check_in_time <= cutoff`, mais antigas primeiro.
    async fn list_open_check_logs_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CheckLog>, AppError>;

    /// Ordenado por `check_in_time` decrescente.
    async fn list_check_logs(
        &self,
        filter: &CheckLogFilter,
        page: Option<Page>,
    ) -> Result<Vec<CheckLog>, AppError>;

    async fn count_check_logs(&self, filter: &CheckLogFilter) -> Result<i64, AppError>;
}

/// O store completo que os serviços recebem.
pub trait EntityStore:
    UserStore + VisitorStore + AppointmentStore + PassStore + CheckLogStore
{
}

impl<T> EntityStore for T where
    T: UserStore + VisitorStore + AppointmentStore + PassStore + CheckLogStore
{
}

/// Concatena notas no formato "antigas novas".
pub fn append_notes(existing: Option<&str>, extra: Option<&str>) -> Option<String> {
    let extra = extra.map(str::trim).filter(|s| !s.is_empty());
    match (existing.filter(|s| !s.is_empty()), extra) {
        (Some(old), Some(new)) => Some(format!("{old} {new}")),
        (Some(old), None) => Some(old.to_string()),
        (None, Some(new)) => Some(new.to_string()),
        (None, None) => None,
    }
}
