use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::{appointment::AppointmentStatus, pass::PassStatus};

/// Classificação estável exposta ao chamador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    BusinessRule,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    // --- Validação ---
    #[error("Um ou mais campos são inválidos.")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("É necessário um visitante para emitir o passe (agendamento, visitorId ou perfil do usuário).")]
    MissingVisitor,

    #[error("É necessário um anfitrião para emitir o passe (hostId ou anfitrião do agendamento).")]
    MissingHost,

    #[error("Informe passId (ou appointmentId) de um passe ativo.")]
    MissingReference,

    #[error("Valor inválido para verificação.")]
    InvalidVerificationInput,

    // --- Não encontrado ---
    #[error("Agendamento não encontrado.")]
    AppointmentNotFound,

    #[error("Passe não encontrado.")]
    PassNotFound,

    #[error("Registro de entrada não encontrado.")]
    LogNotFound,

    #[error("Visitante não encontrado.")]
    VisitorNotFound,

    #[error("Anfitrião não encontrado.")]
    HostNotFound,

    // --- Autorização ---
    #[error("Token de autenticação inválido ou ausente.")]
    InvalidToken,

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    // --- Conflitos de estado ---
    #[error("O visitante já fez check-in com este passe.")]
    AlreadyCheckedIn,

    #[error("O visitante já fez check-out.")]
    AlreadyCheckedOut,

    #[error("Transição inválida: agendamento está '{from}' e não pode passar para '{to}'.")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Agendamento está '{0}' e não pode mais ser alterado.")]
    AppointmentClosed(AppointmentStatus),

    #[error("Passe está '{0}'.")]
    PassNotActive(PassStatus),

    #[error("Número de passe já utilizado.")]
    DuplicatePassNumber,

    #[error("Já existe um passe ativo para este agendamento.")]
    ActivePassExists,

    // --- Regras de negócio ---
    #[error("Passe fora da janela de validade.")]
    PassOutsideValidWindow,

    #[error("Visitante está na lista de bloqueio.")]
    VisitorBlacklisted,

    #[error("A data/hora do agendamento não pode estar no passado.")]
    AppointmentInPast,

    #[error("Agendamentos só podem ser marcados com anfitriões funcionários.")]
    HostNotEmployee,

    #[error("O anfitrião selecionado não está ativo.")]
    HostInactive,

    // --- Internos ---
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        use AppError::*;
        match self {
            ValidationError(_) | InvalidInput(_) | MissingVisitor | MissingHost
            | MissingReference | InvalidVerificationInput => ErrorKind::Validation,

            AppointmentNotFound | PassNotFound | LogNotFound | VisitorNotFound | HostNotFound => {
                ErrorKind::NotFound
            }

            InvalidToken => ErrorKind::Unauthorized,
            Forbidden(_) => ErrorKind::Forbidden,

            AlreadyCheckedIn | AlreadyCheckedOut | InvalidTransition { .. } | AppointmentClosed(_)
            | PassNotActive(_)
            | DuplicatePassNumber | ActivePassExists => ErrorKind::Conflict,

            PassOutsideValidWindow | VisitorBlacklisted | AppointmentInPast | HostNotEmployee
            | HostInactive => ErrorKind::BusinessRule,

            DatabaseError(_) | InternalServerError(_) => ErrorKind::Internal,
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        AppError::Forbidden(reason.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status_code();

        match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(ref errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": self.to_string(),
                    "kind": kind,
                    "details": details,
                }));
                (status, body).into_response()
            }

            // O texto do sqlx/anyhow só vai para o log, nunca para o cliente.
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                tracing::error!("Erro Interno do Servidor: {:?}", self);
                let body = Json(json!({
                    "error": "Ocorreu um erro inesperado.",
                    "kind": kind,
                }));
                (status, body).into_response()
            }

            _ => {
                let body = Json(json!({ "error": self.to_string(), "kind": kind }));
                (status, body).into_response()
            }
        }
    }
}

/// Falha de um colaborador "best-effort" (e-mail, SMS, QR, PDF).
///
/// Nunca vira `AppError`: é capturada no ponto de chamada, registrada no log
/// e reduzida a um flag no resultado.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("envio falhou: {0}")]
    SendFailed(String),

    #[error("tempo esgotado após {0:?}")]
    TimedOut(std::time::Duration),

    #[error("falha ao gerar QR Code: {0}")]
    QrEncoding(String),

    #[error("falha ao gerar documento: {0}")]
    Rendering(String),
}
