// src/services/verification_service.rs
//
// Resolve a entrada ambígua da verificação (número do passe, id do
// agendamento ou conteúdo cru de QR Code) e avalia a validade do passe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::pass_service::PassService;
use crate::{
    common::error::AppError,
    db::EntityStore,
    models::{
        appointment::{Appointment, AppointmentStatus},
        pass::{Pass, PassStatus, VerificationResult},
    },
};

// --- Entrada ---

/// Formas aceitas para o identificador a verificar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VerificationInput {
    Text(String),
    Number(serde_json::Number),
    Structured(StructuredReference),
}

/// Referência embrulhada em objeto, como chega de alguns leitores de QR.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructuredReference {
    #[serde(rename = "$oid")]
    pub oid: Option<String>,
    #[serde(rename = "_id")]
    pub id: Option<Box<VerificationInput>>,
    #[serde(rename = "hexString")]
    pub hex_string: Option<String>,
}

/// Corpo de `POST /passes/verify`: `value`, depois `passNumber`, depois `appointmentId`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPassPayload {
    /// Texto, número ou objeto `{ "$oid" | "_id" | "hexString" }`.
    #[schema(value_type = Option<Object>)]
    pub value: Option<VerificationInput>,
    #[schema(value_type = Option<Object>)]
    pub pass_number: Option<VerificationInput>,
    #[schema(value_type = Option<Object>)]
    pub appointment_id: Option<VerificationInput>,
}

impl VerifyPassPayload {
    pub fn into_input(self) -> Option<VerificationInput> {
        self.value.or(self.pass_number).or(self.appointment_id)
    }
}

const OBJECT_PLACEHOLDER: &str = "[object Object]";

impl VerificationInput {
    /// Precedência: texto/número, `$oid`, `_id` (recursivo), `hexString`.
    pub fn normalize(&self) -> Result<String, AppError> {
        let value = match self {
            VerificationInput::Text(s) => s.trim().to_string(),
            VerificationInput::Number(n) => n.to_string(),
            VerificationInput::Structured(r) => {
                if let Some(oid) = r.oid.as_deref().filter(|s| !s.trim().is_empty()) {
                    oid.trim().to_string()
                } else if let Some(inner) = &r.id {
                    inner.normalize()?
                } else if let Some(hex) = r.hex_string.as_deref() {
                    hex.trim().to_string()
                } else {
                    String::new()
                }
            }
        };

        if value.is_empty() || value == OBJECT_PLACEHOLDER {
            return Err(AppError::InvalidVerificationInput);
        }
        Ok(value)
    }
}

// --- Foto ---

/// Caminho servível para uma foto armazenada.
///
/// URLs http(s) passam sem mudança; caminhos absolutos do sistema de arquivos
/// não são servíveis e viram `None`; o resto é ancorado em `/uploads/`.
pub fn normalize_photo_path(raw: Option<&str>) -> Option<String> {
    let rel = raw?.trim();
    if rel.is_empty() {
        return None;
    }
    let lower = rel.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(rel.to_string());
    }

    let bytes = rel.as_bytes();
    let windows_drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes[2] == b'\\';
    if windows_drive || rel.starts_with('\\') || rel.starts_with("/var/") || rel.starts_with("/tmp/") {
        return None;
    }

    if rel.starts_with("/uploads/") {
        Some(rel.to_string())
    } else if rel.starts_with("uploads/") {
        Some(format!("/{rel}"))
    } else {
        Some(format!("/uploads/{}", rel.trim_start_matches('/')))
    }
}

// --- Validade ---

/// Checagens de status e janela, nesta ordem. O bloqueio do visitante é
/// verificado à parte porque exige releitura do cadastro.
pub fn evaluate_validity(pass: &Pass, now: DateTime<Utc>) -> Result<(), AppError> {
    if pass.status != PassStatus::Active {
        return Err(AppError::PassNotActive(pass.status));
    }
    if !pass.window().contains(now) {
        return Err(AppError::PassOutsideValidWindow);
    }
    Ok(())
}

#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn EntityStore>,
    passes: PassService,
}

impl VerificationService {
    pub fn new(store: Arc<dyn EntityStore>, passes: PassService) -> Self {
        Self { store, passes }
    }

    pub async fn verify(&self, input: &VerificationInput) -> Result<VerificationResult, AppError> {
        self.verify_at(input, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        input: &VerificationInput,
        now: DateTime<Utc>,
    ) -> Result<VerificationResult, AppError> {
        // 1. Normaliza
        let value = input.normalize()?;

        // 2. Resolve (agendamento primeiro, depois número do passe)
        let (pass, appointment) = self.resolve(&value).await?;

        // 3. Status e janela
        evaluate_validity(&pass, now)?;

        // 4. Bloqueio relido no momento da verificação
        let visitor = self.store.find_visitor_by_id(pass.visitor_id).await?;
        if visitor.as_ref().is_some_and(|v| v.is_blacklisted) {
            tracing::warn!("Verificação negada: visitante {} bloqueado", pass.visitor_id);
            return Err(AppError::VisitorBlacklisted);
        }

        // 5. Melhor foto disponível
        let appointment = match (appointment, pass.appointment_id) {
            (Some(a), _) => Some(a),
            (None, Some(id)) => self.store.find_appointment_by_id(id).await?,
            (None, None) => None,
        };
        let visitor_photo = appointment
            .as_ref()
            .and_then(|a| normalize_photo_path(a.visitor_photo.as_deref()))
            .or_else(|| normalize_photo_path(visitor.as_ref().and_then(|v| v.photo.as_deref())));

        tracing::info!("✅ Passe {} verificado", pass.pass_number);
        Ok(VerificationResult {
            valid: true,
            pass: self.passes.detail(pass).await?,
            visitor_photo,
        })
    }

    async fn resolve(&self, value: &str) -> Result<(Pass, Option<Appointment>), AppError> {
        if let Ok(id) = Uuid::parse_str(value) {
            if let Some(appointment) = self.store.find_appointment_by_id(id).await? {
                if let Some(pass) = self.pass_for_appointment(&appointment).await {
                    return Ok((pass, Some(appointment)));
                }
            }
        }

        let pass = self
            .store
            .find_pass_by_number(value)
            .await?
            .ok_or(AppError::PassNotFound)?;
        Ok((pass, None))
    }

    /// Passe ativo do agendamento; emite um se o agendamento está aprovado.
    /// Qualquer falha aqui cai para a busca por número.
    async fn pass_for_appointment(&self, appointment: &Appointment) -> Option<Pass> {
        if appointment.status != AppointmentStatus::Approved {
            return match self.store.find_active_pass_for_appointment(appointment.id).await {
                Ok(pass) => pass,
                Err(e) => {
                    tracing::warn!("Falha ao buscar passe do agendamento {}: {}", appointment.id, e);
                    None
                }
            };
        }

        match self.passes.ensure_for_appointment(appointment, None).await {
            Ok((pass, _)) => Some(pass),
            Err(e) => {
                tracing::warn!(
                    "Emissão automática na verificação falhou para {}: {}",
                    appointment.id,
                    e
                );
                None
            }
        }
    }

    /// Busca sem emissão, usada pelo check-in.
    pub async fn find_active_pass_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Pass>, AppError> {
        self.store.find_active_pass_for_appointment(appointment_id).await
    }
}
