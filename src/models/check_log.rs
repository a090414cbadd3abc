// src/models/check_log.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::pass::Pass;
use super::people::VisitorSummary;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub laptop: bool,
    #[serde(default)]
    pub mobile: bool,
    pub other: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckLog {
    pub id: Uuid,
    pub pass_id: Uuid,
    pub visitor_id: Uuid,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub checked_in_by: Uuid,
    pub checked_out_by: Option<Uuid>,
    #[schema(example = "36.5")]
    pub temperature: Option<Decimal>,
    #[schema(value_type = Option<DeviceInfo>)]
    pub device_info: Option<Json<DeviceInfo>>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckLog {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }

    /// Minutos inteiros de permanência; `None` enquanto o visitante está dentro.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.check_out_time
            .map(|out| (out - self.check_in_time).num_minutes())
    }
}

#[derive(Debug, Clone)]
pub struct NewCheckLog {
    pub pass_id: Uuid,
    pub visitor_id: Uuid,
    pub check_in_time: DateTime<Utc>,
    pub checked_in_by: Uuid,
    pub temperature: Option<Decimal>,
    pub device_info: Option<DeviceInfo>,
    pub notes: Option<String>,
    pub location: Option<String>,
}

/// Fechamento de uma sessão (manual ou automático).
#[derive(Debug, Clone)]
pub struct CheckOut {
    pub at: DateTime<Utc>,
    pub by: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Presence {
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Clone, Default)]
pub struct CheckLogFilter {
    pub visitor_id: Option<Uuid>,
    pub presence: Option<Presence>,
    pub checked_in_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub checked_out_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl CheckLogFilter {
    pub fn checked_in_on(mut self, day: NaiveDate) -> Self {
        self.checked_in_between = Some(super::page::day_bounds(day));
        self
    }

    pub fn checked_out_on(mut self, day: NaiveDate) -> Self {
        self.checked_out_between = Some(super::page::day_bounds(day));
        self
    }
}

// --- Payloads ---

/// Faixa aceita para a temperatura medida na portaria (°C).
fn validate_temperature(val: &Decimal) -> Result<(), ValidationError> {
    let (min, max) = (Decimal::new(300, 1), Decimal::new(450, 1));
    if *val < min || *val > max {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &30.0);
        err.add_param("max".into(), &45.0);
        err.message = Some("A temperatura deve estar entre 30.0 e 45.0 °C.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInPayload {
    pub pass_id: Option<Uuid>,
    /// Alternativa a `passId`: usa o passe ativo do agendamento.
    pub appointment_id: Option<Uuid>,
    /// Por padrão, o visitante do passe.
    pub visitor_id: Option<Uuid>,
    #[validate(custom(function = "validate_temperature"))]
    #[schema(value_type = Option<f64>, example = 36.5)]
    pub temperature: Option<Decimal>,
    pub device_info: Option<DeviceInfo>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutPayload {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CheckLogListQuery {
    /// Dia do check-in (`YYYY-MM-DD`).
    pub date: Option<NaiveDate>,
    pub visitor_id: Option<Uuid>,
    /// `checked-in` (ainda dentro) ou `checked-out`.
    pub status: Option<Presence>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// --- Respostas ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckLogDetail {
    #[serde(flatten)]
    pub log: CheckLog,
    pub duration_minutes: Option<i64>,
    pub visitor: Option<VisitorSummary>,
    pub pass: Option<Pass>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInReceipt {
    pub log: CheckLogDetail,
    pub host_emailed: bool,
    pub visitor_sms_sent: bool,
    pub host_sms_sent: bool,
}

#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckLogStats {
    pub currently_inside: i64,
    pub today_check_ins: i64,
    pub today_check_outs: i64,
    pub total_visits: i64,
    pub average_visit_duration: i64,
}
