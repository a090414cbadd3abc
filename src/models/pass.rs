// src/models/pass.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::appointment::Appointment;
use super::people::{HostSummary, VisitorSummary};

/// Folga antes e depois do horário do agendamento.
pub const PASS_BUFFER_MINUTES: i64 = 30;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "pass_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Active,
    Expired,
    Revoked,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Active => "active",
            PassStatus::Expired => "expired",
            PassStatus::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for PassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Janela de validade ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidityWindow {
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl ValidityWindow {
    /// `None` quando `valid_from >= valid_until`.
    pub fn new(valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> Option<Self> {
        (valid_from < valid_until).then_some(Self { valid_from, valid_until })
    }

    /// `[inicio - 30min, inicio + duração + 30min]`
    pub fn for_appointment(appointment: &Appointment) -> Self {
        let buffer = chrono::Duration::minutes(PASS_BUFFER_MINUTES);
        Self {
            valid_from: appointment.scheduled_at - buffer,
            valid_until: appointment.scheduled_at + appointment.duration() + buffer,
        }
    }

    /// Ambos os limites são inclusivos.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.valid_from <= instant && instant <= self.valid_until
    }
}

// --- Registro ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    pub id: Uuid,
    #[schema(example = "VP2510200427")]
    pub pass_number: String,
    pub visitor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    // Passes emitidos automaticamente pelo sistema não têm emissor
    pub issued_by: Option<Uuid>,
    pub host_id: Option<Uuid>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Data URI (PNG) do QR Code.
    pub qr_code: Option<String>,
    pub pdf_path: Option<String>,
    pub status: PassStatus,
    pub access_areas: Vec<String>,
    pub special_instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pass {
    pub fn window(&self) -> ValidityWindow {
        ValidityWindow {
            valid_from: self.valid_from,
            valid_until: self.valid_until,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPass {
    pub pass_number: String,
    pub visitor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub issued_by: Option<Uuid>,
    pub host_id: Option<Uuid>,
    pub window: ValidityWindow,
    pub access_areas: Vec<String>,
    pub special_instructions: String,
}

#[derive(Debug, Clone, Default)]
pub struct PassFilter {
    pub status: Option<PassStatus>,
    pub visitor_id: Option<Uuid>,
}

/// Conteúdo embutido no QR Code do passe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassQrPayload {
    pub pass_number: String,
    pub visitor_id: Uuid,
    pub visitor_name: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub appointment_id: Option<Uuid>,
    pub issued_by: Option<Uuid>,
}

// --- Payloads ---

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuePassPayload {
    pub appointment_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    pub host_id: Option<Uuid>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[validate(length(max = 20, message = "No máximo 20 áreas de acesso."))]
    pub access_areas: Option<Vec<String>>,
    #[validate(length(max = 500, message = "Instruções muito longas."))]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PassListQuery {
    pub status: Option<PassStatus>,
    pub visitor_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PassListQuery {
    pub fn filter(&self) -> PassFilter {
        PassFilter {
            status: self.status,
            visitor_id: self.visitor_id,
        }
    }
}

// --- Respostas ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PassDetail {
    #[serde(flatten)]
    pub pass: Pass,
    pub visitor: Option<VisitorSummary>,
    pub host: Option<HostSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedPass {
    pub pass: PassDetail,
    /// `false` quando o passe já existia para o agendamento.
    pub created: bool,
    pub document_rendered: bool,
    pub email_sent: bool,
    pub sms_sent: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    pub pass: PassDetail,
    /// Foto do agendamento, ou do perfil do visitante, em caminho servível.
    pub visitor_photo: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredPasses {
    pub updated: u64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PassStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
    pub revoked: i64,
}
