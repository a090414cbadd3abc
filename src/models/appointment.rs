// src/models/appointment.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::people::{HostSummary, VisitorSummary};

pub const DEFAULT_DURATION_MINUTES: i32 = 60;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "appointment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Rejected,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Máquina de estados do agendamento.
    ///
    /// `pending → approved | rejected | cancelled` e `approved → cancelled`.
    /// `completed` é marcado fora deste fluxo; `rejected` e `cancelled` são finais.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) | (Approved, Cancelled)
        )
    }

    /// Estados a partir dos quais `target` é alcançável.
    pub fn sources_of(target: AppointmentStatus) -> Vec<AppointmentStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Rejected | AppointmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Registro ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    // Agendamentos "convidado" não têm visitante vinculado
    pub visitor_id: Option<Uuid>,
    pub host_id: Uuid,
    /// Data + hora combinadas em um único instante (UTC).
    pub scheduled_at: DateTime<Utc>,
    #[schema(example = "10:00")]
    pub appointment_time: String,
    #[schema(example = 60)]
    pub duration_minutes: i32,
    #[schema(example = "Reunião de contrato")]
    pub purpose: String,
    #[schema(example = "Sala 3, 2º andar")]
    pub location: String,
    pub status: AppointmentStatus,
    pub approved_by: Option<Uuid>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub visitor_photo: Option<String>,
    pub notifications_sent: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn duration(&self) -> chrono::Duration {
        let minutes = if self.duration_minutes > 0 {
            self.duration_minutes
        } else {
            DEFAULT_DURATION_MINUTES
        };
        chrono::Duration::minutes(minutes as i64)
    }
}

/// Dados para inserir um agendamento já validado.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub visitor_id: Option<Uuid>,
    pub host_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub appointment_time: String,
    pub duration_minutes: i32,
    pub purpose: String,
    pub location: String,
    pub notes: Option<String>,
    pub visitor_photo: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Campos gravados junto com uma transição de status.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// Alterações de conteúdo (nunca de status).
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub appointment_time: Option<String>,
    pub duration_minutes: Option<i32>,
    pub purpose: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub host_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    pub scheduled_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl AppointmentFilter {
    pub fn on_day(mut self, day: NaiveDate) -> Self {
        self.scheduled_between = Some(super::page::day_bounds(day));
        self
    }
}

// --- Payloads ---

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentPayload {
    pub visitor_id: Option<Uuid>,
    /// Nome exibido ao anfitrião quando não há visitante cadastrado.
    #[validate(length(max = 120))]
    pub visitor_name: Option<String>,
    pub host_id: Option<Uuid>,
    /// `YYYY-MM-DD` (com `appointmentTime`) ou data/hora ISO 8601.
    #[schema(example = "2030-05-20")]
    pub appointment_date: String,
    #[schema(example = "10:00")]
    pub appointment_time: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "Duração deve estar entre 1 e 1440 minutos."))]
    pub duration: Option<i32>,
    #[validate(length(max = 500))]
    pub purpose: String,
    #[validate(length(max = 200))]
    pub location: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Caminho da foto já enviada ao armazenamento de arquivos.
    pub visitor_photo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentPayload {
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "Duração deve estar entre 1 e 1440 minutos."))]
    pub duration: Option<i32>,
    #[validate(length(min = 1, max = 500))]
    pub purpose: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectAppointmentPayload {
    #[validate(length(max = 500))]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    /// Dia do agendamento (`YYYY-MM-DD`).
    pub date: Option<NaiveDate>,
    pub host_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// --- Respostas ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub visitor: Option<VisitorSummary>,
    pub host: Option<HostSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentCreated {
    pub appointment: AppointmentDetail,
    pub host_notified: bool,
}

/// Resultado dos efeitos colaterais da aprovação. Nunca altera o status gravado.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStatus {
    pub email_sent: bool,
    pub sms_sent: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReceipt {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(rename = "_notificationStatus")]
    pub notification_status: NotificationStatus,
    /// Número do passe ativo do agendamento, se a emissão automática funcionou.
    pub pass_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub today_appointments: i64,
}

#[cfg(test)]
mod tests {
    use super::AppointmentStatus::*;
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for next in AppointmentStatus::ALL {
            assert!(!Rejected.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn approve_and_reject_only_from_pending() {
        assert_eq!(AppointmentStatus::sources_of(Approved), vec![Pending]);
        assert_eq!(AppointmentStatus::sources_of(Rejected), vec![Pending]);
        assert_eq!(AppointmentStatus::sources_of(Cancelled), vec![Pending, Approved]);
    }

    #[test]
    fn non_positive_duration_falls_back_to_default() {
        let now = Utc::now();
        let appt = Appointment {
            id: Uuid::new_v4(),
            visitor_id: None,
            host_id: Uuid::new_v4(),
            scheduled_at: now,
            appointment_time: "10:00".into(),
            duration_minutes: 0,
            purpose: "p".into(),
            location: "l".into(),
            status: Pending,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            notes: None,
            visitor_photo: None,
            notifications_sent: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(appt.duration(), chrono::Duration::minutes(60));
    }
}
