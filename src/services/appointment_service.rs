// src/services/appointment_service.rs

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;

use super::{
    notification_service::{EmailMessage, NotificationService, templates},
    pass_service::PassService,
    qr_service::QrEncoder,
};
use crate::{
    common::error::AppError,
    db::EntityStore,
    models::{
        appointment::{
            Appointment, AppointmentChanges, AppointmentCreated, AppointmentDetail,
            AppointmentFilter, AppointmentListQuery, AppointmentStats, AppointmentStatus,
            ApprovalReceipt, CreateAppointmentPayload, DEFAULT_DURATION_MINUTES, NewAppointment,
            NotificationStatus, RejectAppointmentPayload, StatusChange, UpdateAppointmentPayload,
        },
        auth::{Actor, Role},
        page::{Page, Paginated},
        pass::ValidityWindow,
        people::{HostSummary, User, Visitor, VisitorSummary},
    },
};

/// Efeitos executados depois que a aprovação já foi gravada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApprovalHook {
    Notify,
    IssuePass,
}

// A ordem importa: o visitante é avisado antes da emissão do passe
const APPROVAL_HOOKS: [ApprovalHook; 2] = [ApprovalHook::Notify, ApprovalHook::IssuePass];

#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn EntityStore>,
    passes: PassService,
    qr: Arc<dyn QrEncoder>,
    notifications: NotificationService,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        passes: PassService,
        qr: Arc<dyn QrEncoder>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            passes,
            qr,
            notifications,
        }
    }

    // =========================================================================
    //  1. CRIAÇÃO E ALTERAÇÃO
    // =========================================================================

    /// Cria um agendamento `pending`. `actor = None` é a criação pública.
    pub async fn create(
        &self,
        actor: Option<Actor>,
        payload: CreateAppointmentPayload,
    ) -> Result<AppointmentCreated, AppError> {
        // 1. Campos obrigatórios
        let host_id = payload.host_id.ok_or_else(|| AppError::invalid("hostId é obrigatório."))?;
        let purpose = required_text("purpose", &payload.purpose)?;
        let location = required_text("location", &payload.location)?;

        // 2. Visitante: o próprio perfil para visitantes logados, senão o id informado
        let visitor = match actor {
            Some(a) if a.role == Role::Visitor => Some(
                self.store
                    .find_visitor_by_user(a.id)
                    .await?
                    .ok_or(AppError::VisitorNotFound)?,
            ),
            _ => match payload.visitor_id {
                Some(id) => Some(
                    self.store
                        .find_visitor_by_id(id)
                        .await?
                        .ok_or(AppError::VisitorNotFound)?,
                ),
                None => None,
            },
        };
        if visitor.as_ref().is_some_and(|v| v.is_blacklisted) {
            return Err(AppError::VisitorBlacklisted);
        }

        // 3. Anfitrião
        let host = self.load_host(host_id).await?;

        // 4. Data/hora no futuro
        let (scheduled_at, appointment_time) =
            build_schedule(&payload.appointment_date, payload.appointment_time.as_deref())?;
        if scheduled_at <= Utc::now() {
            return Err(AppError::AppointmentInPast);
        }

        let appointment = self
            .store
            .create_appointment(NewAppointment {
                visitor_id: visitor.as_ref().map(|v| v.id),
                host_id: host.id,
                scheduled_at,
                appointment_time,
                duration_minutes: payload.duration.unwrap_or(DEFAULT_DURATION_MINUTES),
                purpose,
                location,
                notes: payload.notes.filter(|n| !n.trim().is_empty()),
                visitor_photo: payload.visitor_photo.filter(|p| !p.trim().is_empty()),
                created_by: actor.map(|a| a.id),
            })
            .await?;
        tracing::info!("📅 Agendamento {} criado com o anfitrião {}", appointment.id, host.id);

        // 5. Aviso ao anfitrião (best-effort)
        let visitor_name = visitor
            .as_ref()
            .map(|v| v.name.clone())
            .or(payload.visitor_name)
            .unwrap_or_else(|| "Convidado".to_string());
        let (subject, html) = templates::appointment_request(&host.name, &visitor_name, &appointment);
        let host_notified = self
            .notifications
            .email(EmailMessage::new(&host.email, subject, html))
            .await;

        Ok(AppointmentCreated {
            appointment: AppointmentDetail {
                appointment,
                visitor: visitor.as_ref().map(VisitorSummary::from),
                host: Some(HostSummary::from(&host)),
            },
            host_notified,
        })
    }

    /// Admin ou o anfitrião; apenas enquanto `pending`/`approved`.
    pub async fn update(
        &self,
        actor: Actor,
        id: Uuid,
        payload: UpdateAppointmentPayload,
    ) -> Result<AppointmentDetail, AppError> {
        let appointment = self.find(id).await?;
        self.authorize(actor, &appointment, "somente o anfitrião pode alterar o agendamento")
            .await?;
        if !matches!(
            appointment.status,
            AppointmentStatus::Pending | AppointmentStatus::Approved
        ) {
            return Err(AppError::AppointmentClosed(appointment.status));
        }

        let mut changes = AppointmentChanges {
            duration_minutes: payload.duration,
            purpose: payload.purpose.map(|p| p.trim().to_string()),
            location: payload.location.map(|l| l.trim().to_string()),
            notes: payload.notes,
            ..Default::default()
        };

        if payload.appointment_date.is_some() || payload.appointment_time.is_some() {
            let date = match payload.appointment_date {
                Some(date) => date,
                None => appointment.scheduled_at.format("%Y-%m-%d").to_string(),
            };
            let (scheduled_at, time) = build_schedule(&date, payload.appointment_time.as_deref())?;
            if scheduled_at <= Utc::now() {
                return Err(AppError::AppointmentInPast);
            }
            changes.scheduled_at = Some(scheduled_at);
            changes.appointment_time = Some(time);
        }

        let updated = self
            .store
            .update_appointment(id, changes)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;

        // Remarcação de agendamento aprovado: o passe acompanha a nova janela.
        // Uma verificação entre a revogação e a nova emissão pode emitir o passe
        // ela mesma (já com a janela nova); a emissão abaixo então devolve esse.
        if updated.status == AppointmentStatus::Approved
            && ValidityWindow::for_appointment(&updated) != ValidityWindow::for_appointment(&appointment)
        {
            self.revoke_active_pass(&updated).await;
            if let Err(e) = self.passes.ensure_for_appointment(&updated, Some(actor.id)).await {
                tracing::warn!("⚠️ Passe não reemitido para o agendamento {}: {}", updated.id, e);
            }
        }

        self.detail(updated).await
    }

    // =========================================================================
    //  2. TRANSIÇÕES DE STATUS
    // =========================================================================

    /// `pending → approved`, depois os ganchos pós-gravação.
    pub async fn approve(&self, actor: Actor, id: Uuid) -> Result<ApprovalReceipt, AppError> {
        let appointment = self.find(id).await?;
        self.authorize_decision(actor, &appointment, "somente o anfitrião pode aprovar")?;

        let now = Utc::now();
        let mut approved = self
            .apply_transition(&appointment, AppointmentStatus::Approved, StatusChange {
                status: AppointmentStatus::Approved,
                decided_by: Some(actor.id),
                decided_at: Some(now),
                rejection_reason: None,
            })
            .await?;
        tracing::info!("✅ Agendamento {} aprovado por {}", approved.id, actor.id);

        // A aprovação já está gravada: nada abaixo pode desfazê-la
        let mut notification_status = NotificationStatus::default();
        let mut pass_number = None;
        for hook in APPROVAL_HOOKS {
            match hook {
                ApprovalHook::Notify => {
                    notification_status = self.notify_approval(&approved).await;
                    approved.notifications_sent = notification_status.email_sent;
                }
                ApprovalHook::IssuePass => {
                    pass_number = match self.passes.ensure_for_appointment(&approved, Some(actor.id)).await {
                        Ok((pass, _)) => Some(pass.pass_number),
                        Err(e) => {
                            tracing::warn!("⚠️ Passe não emitido para o agendamento {}: {}", approved.id, e);
                            None
                        }
                    };
                }
            }
        }

        Ok(ApprovalReceipt {
            appointment: approved,
            notification_status,
            pass_number,
        })
    }

    pub async fn reject(
        &self,
        actor: Actor,
        id: Uuid,
        payload: RejectAppointmentPayload,
    ) -> Result<AppointmentDetail, AppError> {
        let appointment = self.find(id).await?;
        self.authorize_decision(actor, &appointment, "somente o anfitrião pode recusar")?;

        let rejected = self
            .apply_transition(&appointment, AppointmentStatus::Rejected, StatusChange {
                status: AppointmentStatus::Rejected,
                decided_by: Some(actor.id),
                decided_at: Some(Utc::now()),
                rejection_reason: payload.rejection_reason.filter(|r| !r.trim().is_empty()),
            })
            .await?;
        tracing::info!("Agendamento {} recusado por {}", rejected.id, actor.id);

        let detail = self.detail(rejected).await?;
        if let Some(visitor) = &detail.visitor {
            let host_name = detail.host.as_ref().map(|h| h.name.as_str()).unwrap_or("o anfitrião");
            let (subject, html) = templates::appointment_rejected(&visitor.name, host_name, &detail.appointment);
            self.notifications
                .email(EmailMessage::new(&visitor.email, subject, html))
                .await;
        }
        Ok(detail)
    }

    /// Anfitrião, admin ou o próprio visitante. Avisa visitante e anfitrião.
    pub async fn cancel(&self, actor: Actor, id: Uuid) -> Result<AppointmentDetail, AppError> {
        let appointment = self.find(id).await?;
        self.authorize(actor, &appointment, "somente o anfitrião ou o visitante podem cancelar")
            .await?;

        let cancelled = self
            .apply_transition(&appointment, AppointmentStatus::Cancelled, StatusChange {
                status: AppointmentStatus::Cancelled,
                decided_by: None,
                decided_at: None,
                rejection_reason: None,
            })
            .await?;
        tracing::info!("Agendamento {} cancelado por {}", cancelled.id, actor.id);
        self.revoke_active_pass(&cancelled).await;

        let detail = self.detail(cancelled).await?;
        let (subject, html) = templates::appointment_cancelled(&detail.appointment);
        let recipients = detail
            .visitor
            .as_ref()
            .map(|v| v.email.clone())
            .into_iter()
            .chain(detail.host.as_ref().map(|h| h.email.clone()));
        for to in recipients {
            self.notifications
                .email(EmailMessage::new(to, subject.clone(), html.clone()))
                .await;
        }
        Ok(detail)
    }

    /// Revoga o passe ativo do agendamento, se houver. Falhas só vão para o log.
    async fn revoke_active_pass(&self, appointment: &Appointment) {
        let active = match self.store.find_active_pass_for_appointment(appointment.id).await {
            Ok(Some(pass)) => pass,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Falha ao buscar passe do agendamento {}: {}", appointment.id, e);
                return;
            }
        };
        if let Err(e) = self.passes.revoke(active.id).await {
            tracing::warn!("⚠️ Passe {} não revogado: {}", active.pass_number, e);
        }
    }

    /// UPDATE condicional; se não aplicou, diz por quê.
    async fn apply_transition(
        &self,
        appointment: &Appointment,
        target: AppointmentStatus,
        change: StatusChange,
    ) -> Result<Appointment, AppError> {
        if !appointment.status.can_transition_to(target) {
            return Err(AppError::InvalidTransition {
                from: appointment.status,
                to: target,
            });
        }

        let sources = AppointmentStatus::sources_of(target);
        match self
            .store
            .transition_appointment(appointment.id, &sources, change)
            .await?
        {
            Some(updated) => Ok(updated),
            // Outra requisição mudou o status entre a leitura e o UPDATE
            None => {
                let current = self.find(appointment.id).await?;
                Err(AppError::InvalidTransition {
                    from: current.status,
                    to: target,
                })
            }
        }
    }

    async fn notify_approval(&self, appointment: &Appointment) -> NotificationStatus {
        let visitor = match appointment.visitor_id {
            Some(id) => self.store.find_visitor_by_id(id).await.ok().flatten(),
            None => None,
        };
        let host = self.store.find_user_by_id(appointment.host_id).await.ok().flatten();
        let host_name = host.as_ref().map(|h| h.name.as_str()).unwrap_or_default();

        let mut email_sent = false;
        let mut sms_sent = false;

        if let Some(visitor) = visitor.as_ref().filter(|v| !v.email.trim().is_empty()) {
            let payload = json!({
                "appointmentId": appointment.id,
                "visitorId": visitor.id,
                "hostId": appointment.host_id,
                "date": appointment.scheduled_at,
            });
            let qr = match self.qr.encode(&payload) {
                Ok(qr) => Some(qr.data_uri),
                Err(e) => {
                    tracing::warn!("⚠️ QR da confirmação {} não gerado: {}", appointment.id, e);
                    None
                }
            };
            let (subject, html) =
                templates::appointment_confirmation(&visitor.name, host_name, appointment, qr.as_deref());
            email_sent = self
                .notifications
                .email(EmailMessage::new(&visitor.email, subject, html))
                .await;
        } else {
            tracing::info!("Agendamento {} sem e-mail de visitante; confirmação não enviada", appointment.id);
        }

        if let Some(visitor) = visitor.as_ref().filter(|v| !v.phone.trim().is_empty()) {
            let text = templates::appointment_confirmation_sms(host_name, appointment);
            sms_sent = self.notifications.sms(&visitor.phone, &text).await;
        }

        if let Err(e) = self
            .store
            .set_notifications_sent(appointment.id, email_sent)
            .await
        {
            tracing::warn!("Falha ao gravar notificationsSent de {}: {}", appointment.id, e);
        }

        NotificationStatus {
            email_sent,
            sms_sent,
            message: if email_sent {
                "Agendamento aprovado e e-mail com QR Code enviado.".to_string()
            } else {
                "Agendamento aprovado, mas o e-mail não foi enviado. Verifique os logs.".to_string()
            },
        }
    }

    // =========================================================================
    //  3. CONSULTAS
    // =========================================================================

    pub async fn get(&self, actor: Actor, id: Uuid) -> Result<AppointmentDetail, AppError> {
        let appointment = self.find(id).await?;
        match actor.role {
            Role::Employee | Role::Visitor => {
                self.authorize(actor, &appointment, "agendamento de outro usuário").await?
            }
            Role::Admin | Role::Security => {}
        }
        self.detail(appointment).await
    }

    pub async fn list(
        &self,
        actor: Actor,
        query: AppointmentListQuery,
    ) -> Result<Paginated<AppointmentDetail>, AppError> {
        let page = Page::new(query.page, query.limit);
        let mut filter = AppointmentFilter {
            status: query.status,
            host_id: query.host_id,
            ..Default::default()
        };
        if let Some(day) = query.date {
            filter = filter.on_day(day);
        }

        match actor.role {
            // Funcionário só enxerga os próprios agendamentos
            Role::Employee => filter.host_id = Some(actor.id),
            Role::Visitor => match self.store.find_visitor_by_user(actor.id).await? {
                Some(visitor) => filter.visitor_id = Some(visitor.id),
                None => return Ok(Paginated::new(Vec::new(), 0, page)),
            },
            Role::Admin | Role::Security => {}
        }

        let appointments = self.store.list_appointments(&filter, Some(page)).await?;
        let total = self.store.count_appointments(&filter).await?;
        Ok(Paginated::new(self.details(appointments).await?, total, page))
    }

    /// Agendamentos do perfil de visitante do usuário logado.
    pub async fn list_mine(&self, actor: Actor) -> Result<Vec<AppointmentDetail>, AppError> {
        let Some(visitor) = self.store.find_visitor_by_user(actor.id).await? else {
            return Ok(Vec::new());
        };
        self.list_for_visitor(visitor.id).await
    }

    /// Rota pública (acompanhamento do pedido); um visitante logado só vê os próprios.
    pub async fn list_by_visitor(
        &self,
        actor: Option<Actor>,
        visitor_id: Uuid,
    ) -> Result<Vec<AppointmentDetail>, AppError> {
        if let Some(actor) = actor.filter(|a| a.role == Role::Visitor) {
            let own = self.store.find_visitor_by_user(actor.id).await?;
            if own.map(|v| v.id) != Some(visitor_id) {
                return Err(AppError::forbidden("agendamentos de outro visitante"));
            }
        }
        self.list_for_visitor(visitor_id).await
    }

    async fn list_for_visitor(&self, visitor_id: Uuid) -> Result<Vec<AppointmentDetail>, AppError> {
        let filter = AppointmentFilter {
            visitor_id: Some(visitor_id),
            ..Default::default()
        };
        let appointments = self.store.list_appointments(&filter, None).await?;
        self.details(appointments).await
    }

    /// Contagens; funcionário vê apenas os próprios.
    pub async fn stats(&self, actor: Actor, today: NaiveDate) -> Result<AppointmentStats, AppError> {
        let base = AppointmentFilter {
            host_id: (actor.role == Role::Employee).then_some(actor.id),
            ..Default::default()
        };
        let with_status = |status| AppointmentFilter {
            status: Some(status),
            ..base.clone()
        };

        Ok(AppointmentStats {
            total: self.store.count_appointments(&base).await?,
            pending: self.store.count_appointments(&with_status(AppointmentStatus::Pending)).await?,
            approved: self.store.count_appointments(&with_status(AppointmentStatus::Approved)).await?,
            rejected: self.store.count_appointments(&with_status(AppointmentStatus::Rejected)).await?,
            today_appointments: self
                .store
                .count_appointments(&with_status(AppointmentStatus::Approved).on_day(today))
                .await?,
        })
    }

    // =========================================================================
    //  4. AUXILIARES
    // =========================================================================

    async fn find(&self, id: Uuid) -> Result<Appointment, AppError> {
        self.store
            .find_appointment_by_id(id)
            .await?
            .ok_or(AppError::AppointmentNotFound)
    }

    async fn load_host(&self, host_id: Uuid) -> Result<User, AppError> {
        let host = self
            .store
            .find_user_by_id(host_id)
            .await?
            .ok_or(AppError::HostNotFound)?;
        if host.role != Role::Employee {
            return Err(AppError::HostNotEmployee);
        }
        if !host.is_active {
            return Err(AppError::HostInactive);
        }
        Ok(host)
    }

    /// Aprovar/recusar: admin ou o anfitrião do agendamento.
    fn authorize_decision(
        &self,
        actor: Actor,
        appointment: &Appointment,
        reason: &str,
    ) -> Result<(), AppError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Employee if appointment.host_id == actor.id => Ok(()),
            _ => Err(AppError::forbidden(reason)),
        }
    }

    /// Admin sempre; funcionário se for o anfitrião; visitante se for o dono.
    async fn authorize(
        &self,
        actor: Actor,
        appointment: &Appointment,
        reason: &str,
    ) -> Result<(), AppError> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Employee => appointment.host_id == actor.id,
            Role::Visitor => {
                let own = self.store.find_visitor_by_user(actor.id).await?;
                own.is_some_and(|v| appointment.visitor_id == Some(v.id))
            }
            Role::Security => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(AppError::forbidden(reason))
        }
    }

    pub async fn detail(&self, appointment: Appointment) -> Result<AppointmentDetail, AppError> {
        let visitor: Option<Visitor> = match appointment.visitor_id {
            Some(id) => self.store.find_visitor_by_id(id).await?,
            None => None,
        };
        let host = self.store.find_user_by_id(appointment.host_id).await?;
        Ok(AppointmentDetail {
            visitor: visitor.as_ref().map(VisitorSummary::from),
            host: host.as_ref().map(HostSummary::from),
            appointment,
        })
    }

    async fn details(&self, appointments: Vec<Appointment>) -> Result<Vec<AppointmentDetail>, AppError> {
        let mut items = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            items.push(self.detail(appointment).await?);
        }
        Ok(items)
    }
}

fn required_text(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid(format!("{field} é obrigatório.")));
    }
    Ok(value.to_string())
}

fn parse_hh_mm(time: &str) -> Option<NaiveTime> {
    let bytes = time.as_bytes();
    let shaped = bytes.len() == 5
        && bytes[2] == b':'
        && bytes.iter().enumerate().all(|(i, b)| i == 2 || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveTime::parse_from_str(time, "%H:%M").ok()
}

/// Combina data e hora em um instante UTC e devolve também o "HH:MM" exibido.
///
/// Aceita `YYYY-MM-DD` + `HH:MM`, data/hora ISO 8601 (com ou sem fuso) ou
/// só a data (meia-noite).
pub fn build_schedule(date: &str, time: Option<&str>) -> Result<(DateTime<Utc>, String), AppError> {
    let date = date.trim();
    let invalid = || {
        AppError::invalid(
            "appointmentDate inválida. Use data/hora ISO ou YYYY-MM-DD com appointmentTime (HH:MM).",
        )
    };
    if date.is_empty() {
        return Err(invalid());
    }

    let time = time.map(str::trim).and_then(parse_hh_mm);
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok();

    let instant = match (day, time) {
        (Some(day), Some(time)) => day.and_time(time).and_utc(),
        _ => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
                dt.with_timezone(&Utc)
            } else if let Some(naive) = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
            {
                naive.and_utc()
            } else if let Some(day) = day {
                day.and_time(NaiveTime::MIN).and_utc()
            } else {
                return Err(invalid());
            }
        }
    };

    let display = match time {
        Some(t) => t.format("%H:%M").to_string(),
        None => instant.format("%H:%M").to_string(),
    };
    Ok((instant, display))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::pass::PassStatus,
        testing::{Harness, at},
    };
    use chrono::{Days, Duration};

    fn tomorrow() -> NaiveDate {
        Utc::now().date_naive().checked_add_days(Days::new(1)).unwrap()
    }

    fn payload(h: &Harness, date: NaiveDate, time: &str) -> CreateAppointmentPayload {
        CreateAppointmentPayload {
            host_id: Some(h.host.id),
            appointment_date: date.format("%Y-%m-%d").to_string(),
            appointment_time: Some(time.to_string()),
            purpose: "Reunião de contrato".into(),
            location: "Sala 3".into(),
            ..Default::default()
        }
    }

    #[test]
    fn schedule_shapes() {
        let (t, shown) = build_schedule("2030-05-20", Some("10:00")).unwrap();
        assert_eq!((t, shown.as_str()), (at(2030, 5, 20, 10, 0), "10:00"));

        let (t, shown) = build_schedule("2030-05-20T14:30:00Z", None).unwrap();
        assert_eq!((t, shown.as_str()), (at(2030, 5, 20, 14, 30), "14:30"));

        let (t, _) = build_schedule("2030-05-20T14:30:00-03:00", None).unwrap();
        assert_eq!(t, at(2030, 5, 20, 17, 30));

        let (t, shown) = build_schedule("2030-05-20", Some("10h")).unwrap();
        assert_eq!((t, shown.as_str()), (at(2030, 5, 20, 0, 0), "00:00"));

        assert!(build_schedule("20/05/2030", Some("10:00")).is_err());
        assert!(build_schedule("", None).is_err());
    }

    #[tokio::test]
    async fn approval_issues_pass_with_buffered_window() {
        let h = Harness::new();
        let created = h
            .appointments
            .create(Some(h.visitor_actor), payload(&h, tomorrow(), "10:00"))
            .await
            .unwrap();
        let appt = created.appointment.appointment;
        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(appt.visitor_id, Some(h.visitor.id));
        assert!(created.host_notified);

        let receipt = h.appointments.approve(h.host_actor, appt.id).await.unwrap();
        assert_eq!(receipt.appointment.status, AppointmentStatus::Approved);
        assert_eq!(receipt.appointment.approved_by, Some(h.host.id));
        assert!(receipt.notification_status.email_sent);
        assert!(receipt.notification_status.sms_sent);
        assert!(receipt.appointment.notifications_sent);

        let passes = h.store.passes();
        assert_eq!(passes.len(), 1);
        let pass = &passes[0];
        let ten = tomorrow().and_hms_opt(10, 0, 0).unwrap().and_utc();
        assert_eq!(pass.status, PassStatus::Active);
        assert_eq!(pass.valid_from, ten - Duration::minutes(30));
        assert_eq!(pass.valid_until, ten + Duration::minutes(90));
        assert_eq!(receipt.pass_number.as_deref(), Some(pass.pass_number.as_str()));
    }

    #[tokio::test]
    async fn failed_notifications_do_not_undo_approval() {
        let h = Harness::with_failing_notifier();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);

        let receipt = h.appointments.approve(h.admin, appt.id).await.unwrap();

        assert!(!receipt.notification_status.email_sent);
        assert!(!receipt.notification_status.sms_sent);
        assert!(receipt.pass_number.is_some());
        let stored = h.store.appointment(appt.id).unwrap();
        assert_eq!(stored.status, AppointmentStatus::Approved);
        assert!(!stored.notifications_sent);
    }

    #[tokio::test]
    async fn approve_and_reject_require_pending() {
        let h = Harness::new();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        h.appointments.approve(h.admin, appt.id).await.unwrap();

        let again = h.appointments.approve(h.admin, appt.id).await.unwrap_err();
        assert!(matches!(
            again,
            AppError::InvalidTransition {
                from: AppointmentStatus::Approved,
                to: AppointmentStatus::Approved
            }
        ));
        let reject = h
            .appointments
            .reject(h.admin, appt.id, RejectAppointmentPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(reject, AppError::InvalidTransition { .. }));
        assert_eq!(h.store.passes().len(), 1);
    }

    #[tokio::test]
    async fn terminal_states_cannot_be_approved() {
        let h = Harness::new();
        let rejected = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        h.appointments
            .reject(h.host_actor, rejected.id, RejectAppointmentPayload {
                rejection_reason: Some("Agenda cheia".into()),
            })
            .await
            .unwrap();
        assert_eq!(
            h.store.appointment(rejected.id).unwrap().rejection_reason.as_deref(),
            Some("Agenda cheia")
        );

        let cancelled = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        h.appointments.cancel(h.visitor_actor, cancelled.id).await.unwrap();

        for id in [rejected.id, cancelled.id] {
            let err = h.appointments.approve(h.admin, id).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { .. }));
        }
        assert!(h.store.passes().is_empty());
    }

    #[tokio::test]
    async fn concurrent_approvals_issue_one_pass() {
        let h = Harness::new();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);

        let a = h.appointments.clone();
        let b = h.appointments.clone();
        let (admin, host) = (h.admin, h.host_actor);
        let (ra, rb) = tokio::join!(a.approve(admin, appt.id), b.approve(host, appt.id));

        assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(h.store.passes().len(), 1);
    }

    #[tokio::test]
    async fn only_the_assigned_host_decides() {
        let h = Harness::new();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        let other_host = h.another_employee();

        let err = h.appointments.approve(other_host, appt.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = h.appointments.approve(h.security, appt.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(h.store.appointment(appt.id).unwrap().status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_rules() {
        let h = Harness::new();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        let stranger = h.another_visitor_actor();

        let err = h.appointments.cancel(stranger, appt.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        h.appointments.approve(h.host_actor, appt.id).await.unwrap();
        let before = h.notifier.emails().len();
        let detail = h.appointments.cancel(h.visitor_actor, appt.id).await.unwrap();
        assert_eq!(detail.appointment.status, AppointmentStatus::Cancelled);
        // visitante e anfitrião
        assert_eq!(h.notifier.emails().len(), before + 2);

        let err = h.appointments.cancel(h.admin, appt.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn cancelling_an_approved_appointment_revokes_its_pass() {
        let h = Harness::new();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        let receipt = h.appointments.approve(h.host_actor, appt.id).await.unwrap();
        assert!(receipt.pass_number.is_some());

        h.appointments.cancel(h.host_actor, appt.id).await.unwrap();

        let passes = h.store.passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].status, PassStatus::Revoked);
        let err = h
            .verifier
            .verify(&crate::services::verification_service::VerificationInput::Text(appt.id.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PassNotFound));
    }

    #[tokio::test]
    async fn creation_rules() {
        let h = Harness::new();

        let mut missing = payload(&h, tomorrow(), "10:00");
        missing.location = "  ".into();
        assert!(matches!(
            h.appointments.create(None, missing).await,
            Err(AppError::InvalidInput(_))
        ));

        let yesterday = Utc::now().date_naive().checked_sub_days(Days::new(1)).unwrap();
        assert!(matches!(
            h.appointments.create(None, payload(&h, yesterday, "10:00")).await,
            Err(AppError::AppointmentInPast)
        ));

        let mut wrong_host = payload(&h, tomorrow(), "10:00");
        wrong_host.host_id = Some(h.security.id);
        assert!(matches!(
            h.appointments.create(None, wrong_host).await,
            Err(AppError::HostNotEmployee)
        ));

        let mut inactive = payload(&h, tomorrow(), "10:00");
        inactive.host_id = Some(h.inactive_employee().id);
        assert!(matches!(
            h.appointments.create(None, inactive).await,
            Err(AppError::HostInactive)
        ));

        let mut banned = payload(&h, tomorrow(), "10:00");
        banned.visitor_id = Some(h.blacklisted_visitor().id);
        assert!(matches!(
            h.appointments.create(Some(h.admin), banned).await,
            Err(AppError::VisitorBlacklisted)
        ));

        // Convidado sem cadastro
        let guest = h.appointments.create(None, payload(&h, tomorrow(), "15:45")).await.unwrap();
        assert_eq!(guest.appointment.appointment.visitor_id, None);
        assert_eq!(guest.appointment.appointment.appointment_time, "15:45");
        assert_eq!(guest.appointment.appointment.duration_minutes, 60);
    }

    #[tokio::test]
    async fn update_revalidates_schedule() {
        let h = Harness::new();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        let next_day = tomorrow().checked_add_days(Days::new(1)).unwrap();

        let updated = h
            .appointments
            .update(h.host_actor, appt.id, UpdateAppointmentPayload {
                appointment_date: Some(next_day.format("%Y-%m-%d").to_string()),
                appointment_time: Some("09:15".into()),
                purpose: Some(" Auditoria ".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.appointment.scheduled_at, next_day.and_hms_opt(9, 15, 0).unwrap().and_utc());
        assert_eq!(updated.appointment.purpose, "Auditoria");

        let err = h
            .appointments
            .update(h.host_actor, appt.id, UpdateAppointmentPayload {
                appointment_date: Some("2001-01-01".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AppointmentInPast));
    }

    #[tokio::test]
    async fn rescheduling_an_approved_appointment_reissues_its_pass() {
        let h = Harness::new();
        let appt = h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        h.appointments.approve(h.host_actor, appt.id).await.unwrap();
        let later = Utc::now().date_naive().checked_add_days(Days::new(3)).unwrap();

        let updated = h
            .appointments
            .update(h.host_actor, appt.id, UpdateAppointmentPayload {
                appointment_date: Some(later.format("%Y-%m-%d").to_string()),
                appointment_time: Some("10:00".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let scheduled_at = updated.appointment.scheduled_at;
        assert_eq!(scheduled_at, later.and_hms_opt(10, 0, 0).unwrap().and_utc());

        let passes = h.store.passes();
        assert_eq!(passes.len(), 2);
        let active: Vec<_> = passes.iter().filter(|p| p.status == PassStatus::Active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].valid_from, scheduled_at - Duration::minutes(30));
        assert_eq!(active[0].valid_until, scheduled_at + Duration::minutes(90));
        assert_eq!(passes.iter().filter(|p| p.status == PassStatus::Revoked).count(), 1);

        // Só o texto muda: o passe fica
        h.appointments
            .update(h.host_actor, appt.id, UpdateAppointmentPayload {
                purpose: Some("Auditoria".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(h.store.passes().len(), 2);
    }

    #[tokio::test]
    async fn employees_only_see_their_own() {
        let h = Harness::new();
        h.pending_appointment(Utc::now() + Duration::hours(4), 60);
        let other = h.another_employee();

        let mine = h.appointments.list(h.host_actor, AppointmentListQuery::default()).await.unwrap();
        assert_eq!(mine.total, 1);
        let theirs = h.appointments.list(other, AppointmentListQuery::default()).await.unwrap();
        assert_eq!(theirs.total, 0);
        let all = h.appointments.list(h.admin, AppointmentListQuery::default()).await.unwrap();
        assert_eq!(all.total, 1);

        let stats = h.appointments.stats(other, Utc::now().date_naive()).await.unwrap();
        assert_eq!(stats.total, 0);
        let stats = h.appointments.stats(h.admin, Utc::now().date_naive()).await.unwrap();
        assert_eq!((stats.total, stats.pending), (1, 1));
    }

    #[tokio::test]
    async fn visitor_listings() {
        let h = Harness::new();
        h.pending_appointment(Utc::now() + Duration::hours(4), 60);

        assert_eq!(h.appointments.list_mine(h.visitor_actor).await.unwrap().len(), 1);
        assert!(h.appointments.list_mine(h.another_visitor_actor()).await.unwrap().is_empty());
        for actor in [None, Some(h.admin), Some(h.visitor_actor)] {
            let listed = h.appointments.list_by_visitor(actor, h.visitor.id).await.unwrap();
            assert_eq!(listed.len(), 1);
        }
        assert!(matches!(
            h.appointments
                .list_by_visitor(Some(h.another_visitor_actor()), h.visitor.id)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }
}
