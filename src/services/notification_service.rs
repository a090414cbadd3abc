// src/services/notification_service.rs
//
// Envio de e-mail/SMS. Toda chamada é "best-effort": o resultado vira um
// booleano e a falha só aparece no log.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::common::error::DependencyError;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Transporte de mensagens (SMTP, gateway de SMS, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DependencyError>;

    async fn send_sms(&self, to: &str, text: &str) -> Result<(), DependencyError>;
}

/// Implementação padrão: registra as entregas no log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DependencyError> {
        if message.to.trim().is_empty() {
            return Err(DependencyError::SendFailed("destinatário vazio".into()));
        }
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "📧 E-mail enviado"
        );
        Ok(())
    }

    async fn send_sms(&self, to: &str, text: &str) -> Result<(), DependencyError> {
        if to.trim().is_empty() {
            return Err(DependencyError::SendFailed("telefone vazio".into()));
        }
        tracing::info!(to = %to, chars = text.chars().count(), "📱 SMS enviado");
        Ok(())
    }
}

/// Fachada usada pelos serviços: aplica o timeout e reduz o resultado a `bool`.
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    pub async fn email(&self, message: EmailMessage) -> bool {
        let subject = message.subject.clone();
        let outcome = best_effort(self.timeout, self.notifier.send_email(message)).await;
        report("e-mail", &subject, outcome)
    }

    pub async fn sms(&self, to: &str, text: &str) -> bool {
        let outcome = best_effort(self.timeout, self.notifier.send_sms(to, text)).await;
        report("SMS", to, outcome)
    }
}

/// Executa uma chamada externa com limite de tempo. Travamento vira `TimedOut`.
pub async fn best_effort<F, T>(limit: Duration, call: F) -> Result<T, DependencyError>
where
    F: std::future::Future<Output = Result<T, DependencyError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DependencyError::TimedOut(limit)),
    }
}

fn report(channel: &str, target: &str, outcome: Result<(), DependencyError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("⚠️ Falha ao enviar {} ({}): {}", channel, target, e);
            false
        }
    }
}

// =========================================================================
//  MODELOS DE MENSAGEM
// =========================================================================

pub mod templates {
    use chrono::{DateTime, Utc};

    use crate::models::{appointment::Appointment, pass::Pass};

    fn date(instant: DateTime<Utc>) -> String {
        instant.format("%d/%m/%Y").to_string()
    }

    fn date_time(instant: DateTime<Utc>) -> String {
        instant.format("%d/%m/%Y %H:%M").to_string()
    }

    pub fn appointment_request(
        host_name: &str,
        visitor_name: &str,
        appointment: &Appointment,
    ) -> (String, String) {
        let html = format!(
            "<h2>Nova solicitação de visita</h2>\
             <p>Olá {host_name},</p>\
             <p>{visitor_name} solicitou uma visita em {} às {}.</p>\
             <p><strong>Motivo:</strong> {}</p>\
             <p><strong>Local:</strong> {}</p>\
             <p>Acesse o sistema para aprovar ou recusar.</p>",
            date(appointment.scheduled_at),
            appointment.appointment_time,
            appointment.purpose,
            appointment.location,
        );
        ("Nova solicitação de visita".into(), html)
    }

    pub fn appointment_confirmation(
        visitor_name: &str,
        host_name: &str,
        appointment: &Appointment,
        qr_data_uri: Option<&str>,
    ) -> (String, String) {
        let qr = qr_data_uri
            .map(|uri| format!("<p>Apresente este QR Code na recepção:</p><img src=\"{uri}\" alt=\"QR Code\"/>"))
            .unwrap_or_default();
        let html = format!(
            "<h2>Visita confirmada</h2>\
             <p>Olá {visitor_name},</p>\
             <p>Sua visita a {host_name} em {} às {} foi aprovada.</p>\
             <p><strong>Local:</strong> {}</p>\
             {qr}",
            date(appointment.scheduled_at),
            appointment.appointment_time,
            appointment.location,
        );
        ("Confirmação de visita e QR Code".into(), html)
    }

    pub fn appointment_confirmation_sms(host_name: &str, appointment: &Appointment) -> String {
        format!(
            "Visita aprovada: {} às {}, local {}, anfitrião {}.",
            date(appointment.scheduled_at),
            appointment.appointment_time,
            appointment.location,
            host_name,
        )
    }

    pub fn appointment_rejected(
        visitor_name: &str,
        host_name: &str,
        appointment: &Appointment,
    ) -> (String, String) {
        let reason = appointment
            .rejection_reason
            .as_deref()
            .map(|r| format!("<p><strong>Motivo:</strong> {r}</p>"))
            .unwrap_or_default();
        let html = format!(
            "<h2>Visita recusada</h2>\
             <p>Olá {visitor_name},</p>\
             <p>Sua solicitação de visita para {} às {} foi recusada.</p>\
             {reason}\
             <p>Entre em contato com {host_name} para mais informações.</p>",
            date(appointment.scheduled_at),
            appointment.appointment_time,
        );
        ("Visita recusada".into(), html)
    }

    pub fn appointment_cancelled(appointment: &Appointment) -> (String, String) {
        let html = format!(
            "<h2>Visita cancelada</h2>\
             <p>A visita marcada para {} às {} foi cancelada.</p>",
            date(appointment.scheduled_at),
            appointment.appointment_time,
        );
        ("Visita cancelada".into(), html)
    }

    pub fn pass_details(visitor_name: &str, pass: &Pass) -> (String, String) {
        let html = format!(
            "<h2>Seu passe de visitante</h2>\
             <p>Olá {visitor_name},</p>\
             <p>Passe <strong>{}</strong>, válido de {} até {}.</p>\
             <p>O passe em PDF segue em anexo.</p>",
            pass.pass_number,
            date_time(pass.valid_from),
            date_time(pass.valid_until),
        );
        ("Detalhes do seu passe de visitante".into(), html)
    }

    pub fn pass_issued_sms(pass: &Pass) -> String {
        format!(
            "Seu passe {} foi emitido e vale de {} até {}.",
            pass.pass_number,
            date_time(pass.valid_from),
            date_time(pass.valid_until),
        )
    }

    pub fn visitor_checked_in(
        host_name: &str,
        visitor_name: &str,
        at: DateTime<Utc>,
        location: Option<&str>,
    ) -> (String, String) {
        let location = location
            .map(|l| format!("<p><strong>Local:</strong> {l}</p>"))
            .unwrap_or_default();
        let html = format!(
            "<h2>Visitante chegou</h2>\
             <p>Olá {host_name},</p>\
             <p>{visitor_name} fez check-in às {}.</p>\
             {location}",
            date_time(at),
        );
        ("Visitante fez check-in".into(), html)
    }

    pub fn checked_in_visitor_sms(at: DateTime<Utc>) -> String {
        format!("Check-in registrado às {}. Bem-vindo!", date_time(at))
    }

    pub fn checked_in_host_sms(visitor_name: &str, at: DateTime<Utc>) -> String {
        format!("Seu visitante {visitor_name} fez check-in às {}.", date_time(at))
    }
}
