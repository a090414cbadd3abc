// src/services/pass_service.rs

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use super::{
    document_service::{DocumentRenderer, PassDocument},
    notification_service::{Attachment, EmailMessage, NotificationService, best_effort, templates},
    qr_service::{QrEncoder, QrImage},
    verification_service::normalize_photo_path,
};
use crate::{
    common::error::AppError,
    db::EntityStore,
    models::{
        appointment::Appointment,
        auth::Actor,
        page::{Page, Paginated},
        pass::{
            IssuePassPayload, IssuedPass, NewPass, Pass, PassDetail, PassFilter, PassQrPayload,
            PassStats, PassStatus, ValidityWindow,
        },
        people::{HostSummary, Visitor, VisitorSummary},
    },
};

const PASS_NUMBER_PREFIX: &str = "VP";
// Tentativas de inserção quando a restrição de unicidade do número dispara
const MAX_NUMBER_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct PassService {
    store: Arc<dyn EntityStore>,
    qr: Arc<dyn QrEncoder>,
    renderer: Arc<dyn DocumentRenderer>,
    render_timeout: Duration,
    notifications: NotificationService,
}

impl PassService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        qr: Arc<dyn QrEncoder>,
        renderer: Arc<dyn DocumentRenderer>,
        render_timeout: Duration,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            qr,
            renderer,
            render_timeout,
            notifications,
        }
    }

    // =========================================================================
    //  1. EMISSÃO
    // =========================================================================

    /// Emissão explícita (admin/segurança).
    ///
    /// Se o agendamento já tem passe ativo, devolve esse passe com
    /// `created = false` e nenhum efeito colateral.
    pub async fn issue(&self, actor: Actor, payload: IssuePassPayload) -> Result<IssuedPass, AppError> {
        // 1. Agendamento (opcional)
        let appointment = match payload.appointment_id {
            Some(id) => Some(
                self.store
                    .find_appointment_by_id(id)
                    .await?
                    .ok_or(AppError::AppointmentNotFound)?,
            ),
            None => None,
        };

        // 2. Visitante: agendamento > visitorId > perfil do próprio usuário
        let visitor_id = match appointment.as_ref().and_then(|a| a.visitor_id).or(payload.visitor_id) {
            Some(id) => id,
            None => self
                .store
                .find_visitor_by_user(actor.id)
                .await?
                .map(|v| v.id)
                .ok_or(AppError::MissingVisitor)?,
        };

        // 3. Anfitrião: hostId explícito > anfitrião do agendamento
        let host_id = payload
            .host_id
            .or(appointment.as_ref().map(|a| a.host_id))
            .ok_or(AppError::MissingHost)?;

        let visitor = self.load_eligible_visitor(visitor_id).await?;
        self.store
            .find_user_by_id(host_id)
            .await?
            .ok_or(AppError::HostNotFound)?;

        if let Some(appointment) = &appointment {
            if let Some(existing) = self.store.find_active_pass_for_appointment(appointment.id).await? {
                tracing::info!(
                    "Agendamento {} já possui o passe ativo {}",
                    appointment.id,
                    existing.pass_number
                );
                return Ok(IssuedPass {
                    pass: self.detail(existing).await?,
                    created: false,
                    document_rendered: false,
                    email_sent: false,
                    sms_sent: false,
                });
            }
        }

        // 4. Janela de validade
        let window = resolve_window(
            payload.valid_from,
            payload.valid_until,
            appointment.as_ref(),
            Utc::now(),
        )?;

        let new = NewPass {
            pass_number: String::new(),
            visitor_id,
            appointment_id: appointment.as_ref().map(|a| a.id),
            issued_by: Some(actor.id),
            host_id: Some(host_id),
            window,
            access_areas: payload.access_areas.unwrap_or_default(),
            special_instructions: payload.special_instructions.unwrap_or_default(),
        };

        let pass = match self.insert_with_fresh_number(new).await {
            Err(AppError::ActivePassExists) => {
                // Outra requisição venceu a corrida pelo mesmo agendamento
                let existing = self.reread_active(appointment.as_ref()).await?;
                return Ok(IssuedPass {
                    pass: self.detail(existing).await?,
                    created: false,
                    document_rendered: false,
                    email_sent: false,
                    sms_sent: false,
                });
            }
            other => other?,
        };
        tracing::info!("🎫 Passe {} emitido para o visitante {}", pass.pass_number, visitor.id);

        // 5. Efeitos colaterais (best-effort)
        self.deliver(pass, &visitor, appointment.as_ref()).await
    }

    /// Garante um passe ativo para o agendamento (aprovação e verificação).
    /// Retorna o passe e se ele foi criado agora.
    pub async fn ensure_for_appointment(
        &self,
        appointment: &Appointment,
        issued_by: Option<Uuid>,
    ) -> Result<(Pass, bool), AppError> {
        if let Some(existing) = self.store.find_active_pass_for_appointment(appointment.id).await? {
            return Ok((existing, false));
        }

        let visitor_id = appointment.visitor_id.ok_or(AppError::MissingVisitor)?;
        let visitor = self.load_eligible_visitor(visitor_id).await?;

        let new = NewPass {
            pass_number: String::new(),
            visitor_id,
            appointment_id: Some(appointment.id),
            issued_by,
            host_id: Some(appointment.host_id),
            window: ValidityWindow::for_appointment(appointment),
            access_areas: Vec::new(),
            special_instructions: String::new(),
        };

        let pass = match self.insert_with_fresh_number(new).await {
            Ok(pass) => pass,
            Err(AppError::ActivePassExists) => {
                return Ok((self.reread_active(Some(appointment)).await?, false));
            }
            Err(e) => return Err(e),
        };
        tracing::info!(
            "🎫 Passe {} emitido automaticamente para o agendamento {}",
            pass.pass_number,
            appointment.id
        );

        // O QR é best-effort: sem ele o passe continua válido
        let pass = match self.encode_qr(&pass, &visitor) {
            Some(qr) => self.store_artifacts(pass, Some(qr.data_uri), None).await,
            None => pass,
        };

        Ok((pass, true))
    }

    async fn load_eligible_visitor(&self, visitor_id: Uuid) -> Result<Visitor, AppError> {
        let visitor = self
            .store
            .find_visitor_by_id(visitor_id)
            .await?
            .ok_or(AppError::VisitorNotFound)?;

        if visitor.is_blacklisted {
            tracing::warn!("Emissão negada: visitante {} bloqueado", visitor.id);
            return Err(AppError::VisitorBlacklisted);
        }
        Ok(visitor)
    }

    async fn reread_active(&self, appointment: Option<&Appointment>) -> Result<Pass, AppError> {
        let Some(appointment) = appointment else {
            return Err(AppError::ActivePassExists);
        };
        self.store
            .find_active_pass_for_appointment(appointment.id)
            .await?
            .ok_or(AppError::ActivePassExists)
    }

    /// Gera o número e insere; número repetido (corrida rara) tenta de novo.
    async fn insert_with_fresh_number(&self, mut new: NewPass) -> Result<Pass, AppError> {
        let mut attempt = 1;
        loop {
            new.pass_number = self.generate_pass_number(Utc::now()).await?;
            match self.store.insert_pass(new.clone()).await {
                Err(AppError::DuplicatePassNumber) if attempt < MAX_NUMBER_ATTEMPTS => {
                    tracing::warn!("Número {} já usado, gerando outro", new.pass_number);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// `VP` + `aammdd` + 4 dígitos; se o candidato já existe, 5 dígitos.
    pub async fn generate_pass_number(&self, now: DateTime<Utc>) -> Result<String, AppError> {
        let prefix = format!("{PASS_NUMBER_PREFIX}{}", now.format("%y%m%d"));
        let candidate = format!("{prefix}{}", random_digits(4));
        if !self.store.pass_number_exists(&candidate).await? {
            return Ok(candidate);
        }
        Ok(format!("{prefix}{}", random_digits(5)))
    }

    fn encode_qr(&self, pass: &Pass, visitor: &Visitor) -> Option<QrImage> {
        let payload = PassQrPayload {
            pass_number: pass.pass_number.clone(),
            visitor_id: pass.visitor_id,
            visitor_name: visitor.name.clone(),
            valid_from: pass.valid_from,
            valid_until: pass.valid_until,
            appointment_id: pass.appointment_id,
            issued_by: pass.issued_by,
        };
        let json = match serde_json::to_value(&payload) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("⚠️ QR do passe {} não gerado: {}", pass.pass_number, e);
                return None;
            }
        };
        match self.qr.encode(&json) {
            Ok(qr) => Some(qr),
            Err(e) => {
                tracing::warn!("⚠️ QR do passe {} não gerado: {}", pass.pass_number, e);
                None
            }
        }
    }

    /// Grava QR/PDF no passe já inserido. Falha aqui só vai para o log.
    async fn store_artifacts(&self, pass: Pass, qr_code: Option<String>, pdf_path: Option<String>) -> Pass {
        match self.store.set_pass_artifacts(pass.id, qr_code, pdf_path).await {
            Ok(Some(updated)) => updated,
            Ok(None) => pass,
            Err(e) => {
                tracing::warn!("⚠️ Artefatos do passe {} não gravados: {}", pass.pass_number, e);
                pass
            }
        }
    }

    /// QR, PDF, e-mail com o PDF anexado e SMS. Nenhuma falha aqui desfaz o passe.
    async fn deliver(
        &self,
        pass: Pass,
        visitor: &Visitor,
        appointment: Option<&Appointment>,
    ) -> Result<IssuedPass, AppError> {
        let qr = self.encode_qr(&pass, visitor);

        let host = match pass.host_id {
            Some(id) => self.store.find_user_by_id(id).await?,
            None => None,
        };
        let photo = appointment
            .and_then(|a| normalize_photo_path(a.visitor_photo.as_deref()))
            .or_else(|| normalize_photo_path(visitor.photo.as_deref()));

        let document = PassDocument {
            pass_number: pass.pass_number.clone(),
            visitor_name: visitor.name.clone(),
            visitor_email: visitor.email.clone(),
            visitor_phone: visitor.phone.clone(),
            host_name: host.as_ref().map(|h| h.name.clone()),
            host_department: host.as_ref().and_then(|h| h.department.clone()),
            purpose: appointment.map(|a| a.purpose.clone()),
            location: appointment.map(|a| a.location.clone()),
            valid_from: pass.valid_from,
            valid_until: pass.valid_until,
            access_areas: pass.access_areas.clone(),
            special_instructions: pass.special_instructions.clone(),
            photo,
            qr_png: qr.as_ref().map(|q| q.png.clone()),
        };

        let rendered = match best_effort(self.render_timeout, self.renderer.render_pass(document)).await {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                tracing::warn!("⚠️ PDF do passe {} não gerado: {}", pass.pass_number, e);
                None
            }
        };

        let qr_uri = qr.map(|q| q.data_uri);
        let pdf_path = rendered.as_ref().map(|r| r.path.clone());
        let pass = if qr_uri.is_some() || pdf_path.is_some() {
            self.store_artifacts(pass, qr_uri, pdf_path).await
        } else {
            pass
        };

        // Sem documento não há o que enviar por e-mail
        let email_sent = match &rendered {
            Some(rendered) if !visitor.email.trim().is_empty() => {
                let (subject, html) = templates::pass_details(&visitor.name, &pass);
                let message = EmailMessage::new(&visitor.email, subject, html).with_attachment(Attachment {
                    filename: format!("{}.pdf", pass.pass_number),
                    content_type: "application/pdf",
                    bytes: rendered.bytes.clone(),
                });
                self.notifications.email(message).await
            }
            _ => false,
        };

        let sms_sent = if visitor.phone.trim().is_empty() {
            false
        } else {
            self.notifications
                .sms(&visitor.phone, &templates::pass_issued_sms(&pass))
                .await
        };

        Ok(IssuedPass {
            pass: self.detail(pass).await?,
            created: true,
            document_rendered: rendered.is_some(),
            email_sent,
            sms_sent,
        })
    }

    // =========================================================================
    //  2. CONSULTAS
    // =========================================================================

    pub async fn detail(&self, pass: Pass) -> Result<PassDetail, AppError> {
        let visitor = self.store.find_visitor_by_id(pass.visitor_id).await?;
        let host = match pass.host_id {
            Some(id) => self.store.find_user_by_id(id).await?,
            None => None,
        };
        Ok(PassDetail {
            visitor: visitor.as_ref().map(VisitorSummary::from),
            host: host.as_ref().map(HostSummary::from),
            pass,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<PassDetail, AppError> {
        let pass = self
            .store
            .find_pass_by_id(id)
            .await?
            .ok_or(AppError::PassNotFound)?;
        self.detail(pass).await
    }

    pub async fn list(&self, filter: PassFilter, page: Page) -> Result<Paginated<PassDetail>, AppError> {
        let passes = self.store.list_passes(&filter, page).await?;
        let total = self.store.count_passes(&filter).await?;

        let mut items = Vec::with_capacity(passes.len());
        for pass in passes {
            items.push(self.detail(pass).await?);
        }
        Ok(Paginated::new(items, total, page))
    }

    pub async fn stats(&self) -> Result<PassStats, AppError> {
        Ok(PassStats {
            total: self.store.count_passes_by_status(None).await?,
            active: self.store.count_passes_by_status(Some(PassStatus::Active)).await?,
            expired: self.store.count_passes_by_status(Some(PassStatus::Expired)).await?,
            revoked: self.store.count_passes_by_status(Some(PassStatus::Revoked)).await?,
        })
    }

    /// Passe ativo mais recente do perfil de visitante do usuário, se houver.
    pub async fn my_active(&self, actor: Actor) -> Result<Option<PassDetail>, AppError> {
        let Some(visitor) = self.store.find_visitor_by_user(actor.id).await? else {
            return Ok(None);
        };
        match self.store.find_latest_active_pass_for_visitor(visitor.id).await? {
            Some(pass) => Ok(Some(self.detail(pass).await?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    //  3. ADMINISTRAÇÃO
    // =========================================================================

    /// `active → revoked`. Estados finais não mudam.
    pub async fn revoke(&self, id: Uuid) -> Result<PassDetail, AppError> {
        match self.store.revoke_pass(id).await? {
            Some(pass) => {
                tracing::info!("Passe {} revogado", pass.pass_number);
                self.detail(pass).await
            }
            None => {
                let pass = self
                    .store
                    .find_pass_by_id(id)
                    .await?
                    .ok_or(AppError::PassNotFound)?;
                Err(AppError::PassNotActive(pass.status))
            }
        }
    }

    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let expired = self.store.expire_passes(now).await?;
        if expired > 0 {
            tracing::info!("{} passe(s) marcados como expirados", expired);
        }
        Ok(expired)
    }
}

fn random_digits(digits: u32) -> String {
    let upper = 10u32.pow(digits);
    let n = rand::rng().random_range(0..upper);
    format!("{n:0width$}", width = digits as usize)
}

/// Janela explícita tem precedência; sem ela, deriva do agendamento.
fn resolve_window(
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    appointment: Option<&Appointment>,
    now: DateTime<Utc>,
) -> Result<ValidityWindow, AppError> {
    let derived = appointment.map(ValidityWindow::for_appointment);
    let (from, until) = match (valid_from, valid_until, derived) {
        (Some(from), Some(until), _) => (from, until),
        (None, None, Some(w)) => (w.valid_from, w.valid_until),
        (Some(from), None, Some(w)) => (from, w.valid_until),
        (None, Some(until), Some(w)) => (w.valid_from, until),
        (None, Some(until), None) => (now, until),
        (_, None, None) => {
            return Err(AppError::invalid("validUntil é obrigatório quando não há agendamento."));
        }
    };
    ValidityWindow::new(from, until)
        .ok_or_else(|| AppError::invalid("validFrom deve ser anterior a validUntil."))
}
