// src/services/check_log_service.rs

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::{
    notification_service::{EmailMessage, NotificationService, templates},
    verification_service::VerificationService,
};
use crate::{
    common::error::AppError,
    db::EntityStore,
    models::{
        auth::Actor,
        check_log::{
            CheckInPayload, CheckInReceipt, CheckLog, CheckLogDetail, CheckLogFilter,
            CheckLogListQuery, CheckLogStats, CheckOut, NewCheckLog, Presence,
        },
        page::{Page, Paginated},
        pass::{Pass, PassStatus},
        people::VisitorSummary,
    },
};

#[derive(Clone)]
pub struct CheckLogService {
    store: Arc<dyn EntityStore>,
    verifier: VerificationService,
    notifications: NotificationService,
}

impl CheckLogService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        verifier: VerificationService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            verifier,
            notifications,
        }
    }

    // =========================================================================
    //  ENTRADA / SAÍDA
    // =========================================================================

    pub async fn check_in(&self, actor: Actor, payload: CheckInPayload) -> Result<CheckInReceipt, AppError> {
        // 1. Resolve o passe (nunca emite um novo aqui)
        let pass = self.resolve_pass(&payload).await?;

        // 2. Estado do passe
        if pass.status != PassStatus::Active {
            return Err(AppError::PassNotActive(pass.status));
        }
        if self.store.find_open_check_log_for_pass(pass.id).await?.is_some() {
            return Err(AppError::AlreadyCheckedIn);
        }

        // 3. Visitante informado precisa existir
        let visitor_id = match payload.visitor_id {
            Some(id) if id != pass.visitor_id => {
                self.store
                    .find_visitor_by_id(id)
                    .await?
                    .ok_or(AppError::VisitorNotFound)?
                    .id
            }
            _ => pass.visitor_id,
        };

        // 4. Abre a sessão (o índice parcial cobre a corrida entre duas entradas)
        let now = Utc::now();
        let log = self
            .store
            .insert_check_log(NewCheckLog {
                pass_id: pass.id,
                visitor_id,
                check_in_time: now,
                checked_in_by: actor.id,
                temperature: payload.temperature,
                device_info: payload.device_info,
                notes: payload.notes.filter(|n| !n.trim().is_empty()),
                location: payload.location.filter(|l| !l.trim().is_empty()),
            })
            .await?;
        tracing::info!("🚪 Check-in {} do passe {}", log.id, pass.pass_number);

        // 5. Contador de visitas (best-effort)
        if let Err(e) = self.store.record_visit(log.visitor_id, now).await {
            tracing::warn!("Falha ao atualizar visitas de {}: {}", log.visitor_id, e);
        }

        // 6. Avisos
        let (host_emailed, visitor_sms_sent, host_sms_sent) = self.notify_check_in(&log, &pass).await;

        Ok(CheckInReceipt {
            log: self.detail(log).await?,
            host_emailed,
            visitor_sms_sent,
            host_sms_sent,
        })
    }

    async fn resolve_pass(&self, payload: &CheckInPayload) -> Result<Pass, AppError> {
        let found = match (payload.pass_id, payload.appointment_id) {
            (Some(pass_id), _) => self.store.find_pass_by_id(pass_id).await?,
            (None, Some(appointment_id)) => {
                self.verifier
                    .find_active_pass_for_appointment(appointment_id)
                    .await?
            }
            (None, None) => return Err(AppError::MissingReference),
        };
        found.ok_or(AppError::PassNotFound)
    }

    async fn notify_check_in(&self, log: &CheckLog, pass: &Pass) -> (bool, bool, bool) {
        let visitor = self.store.find_visitor_by_id(log.visitor_id).await.ok().flatten();
        let host = match pass.host_id {
            Some(id) => self.store.find_user_by_id(id).await.ok().flatten(),
            None => None,
        };
        let visitor_name = visitor.as_ref().map(|v| v.name.as_str()).unwrap_or("Visitante");

        let mut host_emailed = false;
        let mut host_sms_sent = false;
        if let Some(host) = &host {
            let (subject, html) =
                templates::visitor_checked_in(&host.name, visitor_name, log.check_in_time, log.location.as_deref());
            host_emailed = self
                .notifications
                .email(EmailMessage::new(&host.email, subject, html))
                .await;
            if !host.phone.trim().is_empty() {
                host_sms_sent = self
                    .notifications
                    .sms(&host.phone, &templates::checked_in_host_sms(visitor_name, log.check_in_time))
                    .await;
            }
        }

        let mut visitor_sms_sent = false;
        if let Some(visitor) = visitor.as_ref().filter(|v| !v.phone.trim().is_empty()) {
            visitor_sms_sent = self
                .notifications
                .sms(&visitor.phone, &templates::checked_in_visitor_sms(log.check_in_time))
                .await;
        }

        (host_emailed, visitor_sms_sent, host_sms_sent)
    }

    pub async fn check_out(
        &self,
        actor: Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<CheckLogDetail, AppError> {
        let log = self
            .store
            .find_check_log_by_id(id)
            .await?
            .ok_or(AppError::LogNotFound)?;
        if !log.is_open() {
            return Err(AppError::AlreadyCheckedOut);
        }

        let closed = self
            .store
            .close_check_log(id, CheckOut {
                at: Utc::now(),
                by: Some(actor.id),
                notes,
            })
            .await?
            // Fechada por outra requisição (ou pela varredura) neste intervalo
            .ok_or(AppError::AlreadyCheckedOut)?;
        tracing::info!("Check-out {} registrado por {}", closed.id, actor.id);

        self.detail(closed).await
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    pub async fn get(&self, id: Uuid) -> Result<CheckLogDetail, AppError> {
        let log = self
            .store
            .find_check_log_by_id(id)
            .await?
            .ok_or(AppError::LogNotFound)?;
        self.detail(log).await
    }

    pub async fn list(&self, query: CheckLogListQuery) -> Result<Paginated<CheckLogDetail>, AppError> {
        let page = Page::new(query.page, query.limit);
        let mut filter = CheckLogFilter {
            visitor_id: query.visitor_id,
            presence: query.status,
            ..Default::default()
        };
        if let Some(day) = query.date {
            filter = filter.checked_in_on(day);
        }

        let logs = self.store.list_check_logs(&filter, Some(page)).await?;
        let total = self.store.count_check_logs(&filter).await?;
        Ok(Paginated::new(self.details(logs).await?, total, page))
    }

    /// Sessões abertas.
    pub async fn current(&self) -> Result<Vec<CheckLogDetail>, AppError> {
        let filter = CheckLogFilter {
            presence: Some(Presence::CheckedIn),
            ..Default::default()
        };
        let logs = self.store.list_check_logs(&filter, None).await?;
        self.details(logs).await
    }

    pub async fn visitor_history(&self, visitor_id: Uuid) -> Result<Vec<CheckLogDetail>, AppError> {
        let filter = CheckLogFilter {
            visitor_id: Some(visitor_id),
            ..Default::default()
        };
        let logs = self.store.list_check_logs(&filter, None).await?;
        self.details(logs).await
    }

    /// A média considera apenas as sessões encerradas no dia.
    pub async fn stats(&self, today: NaiveDate) -> Result<CheckLogStats, AppError> {
        let inside = CheckLogFilter {
            presence: Some(Presence::CheckedIn),
            ..Default::default()
        };
        let checked_in_today = CheckLogFilter::default().checked_in_on(today);
        let checked_out_today = CheckLogFilter::default().checked_out_on(today);

        let closed_today = self.store.list_check_logs(&checked_out_today, None).await?;
        let minutes: Vec<i64> = closed_today.iter().filter_map(CheckLog::duration_minutes).collect();
        let average_visit_duration = if minutes.is_empty() {
            0
        } else {
            (minutes.iter().sum::<i64>() as f64 / minutes.len() as f64).round() as i64
        };

        Ok(CheckLogStats {
            currently_inside: self.store.count_check_logs(&inside).await?,
            today_check_ins: self.store.count_check_logs(&checked_in_today).await?,
            today_check_outs: closed_today.len() as i64,
            total_visits: self.store.count_check_logs(&CheckLogFilter::default()).await?,
            average_visit_duration,
        })
    }

    async fn detail(&self, log: CheckLog) -> Result<CheckLogDetail, AppError> {
        let visitor = self.store.find_visitor_by_id(log.visitor_id).await?;
        let pass = self.store.find_pass_by_id(log.pass_id).await?;
        Ok(CheckLogDetail {
            duration_minutes: log.duration_minutes(),
            visitor: visitor.as_ref().map(VisitorSummary::from),
            pass,
            log,
        })
    }

    async fn details(&self, logs: Vec<CheckLog>) -> Result<Vec<CheckLogDetail>, AppError> {
        let mut items = Vec::with_capacity(logs.len());
        for log in logs {
            items.push(self.detail(log).await?);
        }
        Ok(items)
    }
}
