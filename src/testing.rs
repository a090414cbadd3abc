// src/testing.rs
//
// Fixtures compartilhadas pelos testes dos serviços.

use std::{
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    common::error::DependencyError,
    db::MemoryStore,
    models::{
        appointment::{Appointment, AppointmentStatus},
        auth::{Actor, Role},
        check_log::CheckLog,
        pass::{Pass, PassStatus, ValidityWindow},
        people::{User, Visitor},
    },
    services::{
        appointment_service::AppointmentService,
        check_log_service::CheckLogService,
        document_service::{DocumentRenderer, PassDocument, RenderedDocument},
        notification_service::{EmailMessage, NotificationService, Notifier},
        pass_service::PassService,
        qr_service::QrCodeEncoder,
        sweeper::SweepWorker,
        verification_service::VerificationService,
    },
};

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("data de teste válida")
}

// --- Colaboradores falsos ---

#[derive(Default)]
pub struct RecordingNotifier {
    emails: Mutex<Vec<EmailMessage>>,
    sms: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap().clone()
    }

    pub fn sms(&self) -> Vec<(String, String)> {
        self.sms.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DependencyError> {
        self.emails.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_sms(&self, to: &str, text: &str) -> Result<(), DependencyError> {
        self.sms.lock().unwrap().push((to.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_email(&self, _message: EmailMessage) -> Result<(), DependencyError> {
        Err(DependencyError::SendFailed("smtp fora do ar".into()))
    }

    async fn send_sms(&self, _to: &str, _text: &str) -> Result<(), DependencyError> {
        Err(DependencyError::SendFailed("gateway fora do ar".into()))
    }
}

/// Não grava nada em disco.
pub struct StubRenderer;

#[async_trait]
impl DocumentRenderer for StubRenderer {
    async fn render_pass(&self, document: PassDocument) -> Result<RenderedDocument, DependencyError> {
        Ok(RenderedDocument {
            path: format!("/uploads/passes/{}.pdf", document.pass_number),
            bytes: b"%PDF-1.4 stub".to_vec(),
        })
    }
}

pub struct FailingRenderer;

#[async_trait]
impl DocumentRenderer for FailingRenderer {
    async fn render_pass(&self, _document: PassDocument) -> Result<RenderedDocument, DependencyError> {
        Err(DependencyError::Rendering("fonte ausente".into()))
    }
}

/// Nunca termina (escrita em disco travada).
pub struct HangingRenderer;

#[async_trait]
impl DocumentRenderer for HangingRenderer {
    async fn render_pass(&self, _document: PassDocument) -> Result<RenderedDocument, DependencyError> {
        std::future::pending().await
    }
}

// --- Harness ---

/// Store em memória, serviços ligados como em produção e um elenco fixo:
/// um anfitrião, um visitante com conta, segurança e admin.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub passes: PassService,
    pub verifier: VerificationService,
    pub appointments: AppointmentService,
    pub check_logs: CheckLogService,
    pub sweeper: SweepWorker,
    pub host: User,
    pub visitor: Visitor,
    pub host_actor: Actor,
    pub visitor_actor: Actor,
    pub security: Actor,
    pub admin: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Arc::new(StubRenderer), false)
    }

    pub fn with_failing_renderer() -> Self {
        Self::build(Arc::new(FailingRenderer), false)
    }

    pub fn with_hanging_renderer() -> Self {
        Self::build(Arc::new(HangingRenderer), false)
    }

    pub fn with_failing_notifier() -> Self {
        Self::build(Arc::new(StubRenderer), true)
    }

    fn build(renderer: Arc<dyn DocumentRenderer>, failing_notifier: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let recorder = Arc::new(RecordingNotifier::default());

        let notifier: Arc<dyn Notifier> = if failing_notifier {
            Arc::new(FailingNotifier)
        } else {
            recorder.clone()
        };
        let notifications = NotificationService::new(notifier, StdDuration::from_secs(5));
        let qr = Arc::new(QrCodeEncoder);

        let passes = PassService::new(
            store.clone(),
            qr.clone(),
            renderer,
            StdDuration::from_secs(30),
            notifications.clone(),
        );
        let verifier = VerificationService::new(store.clone(), passes.clone());
        let appointments =
            AppointmentService::new(store.clone(), passes.clone(), qr, notifications.clone());
        let check_logs = CheckLogService::new(store.clone(), verifier.clone(), notifications);
        let sweeper = SweepWorker::new(
            store.clone(),
            passes.clone(),
            Duration::minutes(60),
            StdDuration::from_secs(300),
        );

        let host = user("Ana Souza", Role::Employee, true);
        let security = user("Portaria", Role::Security, true);
        let admin = user("Admin", Role::Admin, true);
        let visitor_user = user("Carlos Lima", Role::Visitor, true);
        let visitor = Visitor {
            photo: Some("uploads/visitors/carlos.jpg".into()),
            ..visitor("Carlos Lima", Some(visitor_user.id))
        };
        for u in [&host, &security, &admin, &visitor_user] {
            store.put_user(u.clone());
        }
        store.put_visitor(visitor.clone());

        Self {
            host_actor: actor(&host),
            visitor_actor: actor(&visitor_user),
            security: actor(&security),
            admin: actor(&admin),
            store,
            notifier: recorder,
            passes,
            verifier,
            appointments,
            check_logs,
            sweeper,
            host,
            visitor,
        }
    }

    // --- Agendamentos semeados direto no store ---

    pub fn approved_appointment(&self, start: DateTime<Utc>, duration_minutes: i32) -> Appointment {
        let mut appointment = self.appointment(start, duration_minutes);
        appointment.status = AppointmentStatus::Approved;
        appointment.approved_by = Some(self.host.id);
        appointment.approval_date = Some(Utc::now());
        self.store.put_appointment(appointment.clone());
        appointment
    }

    pub fn pending_appointment(&self, start: DateTime<Utc>, duration_minutes: i32) -> Appointment {
        let appointment = self.appointment(start, duration_minutes);
        self.store.put_appointment(appointment.clone());
        appointment
    }

    pub fn replace_appointment(&self, appointment: Appointment) {
        self.store.put_appointment(appointment);
    }

    fn appointment(&self, start: DateTime<Utc>, duration_minutes: i32) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            visitor_id: Some(self.visitor.id),
            host_id: self.host.id,
            scheduled_at: start,
            appointment_time: start.format("%H:%M").to_string(),
            duration_minutes,
            purpose: "Reunião".into(),
            location: "Sala 1".into(),
            status: AppointmentStatus::Pending,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            notes: None,
            visitor_photo: None,
            notifications_sent: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Passe ativo com a janela padrão do agendamento, sem passar pelo serviço.
    pub fn active_pass_for(&self, appointment: &Appointment) -> Pass {
        let window = ValidityWindow::for_appointment(appointment);
        let now = Utc::now();
        let pass = Pass {
            id: Uuid::new_v4(),
            pass_number: format!("VPT{}", &Uuid::new_v4().simple().to_string()[..9]),
            visitor_id: appointment.visitor_id.unwrap_or(self.visitor.id),
            appointment_id: Some(appointment.id),
            issued_by: Some(self.security.id),
            host_id: Some(appointment.host_id),
            valid_from: window.valid_from,
            valid_until: window.valid_until,
            qr_code: None,
            pdf_path: None,
            status: PassStatus::Active,
            access_areas: Vec::new(),
            special_instructions: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.put_pass(pass.clone());
        pass
    }

    // --- Sessões ---

    pub fn open_log(&self, pass: &Pass, check_in: DateTime<Utc>) -> CheckLog {
        let log = check_log(pass, self.security.id, check_in, None);
        self.store.put_check_log(log.clone());
        log
    }

    pub fn closed_log(&self, pass: &Pass, check_in: DateTime<Utc>, stay: Duration) -> CheckLog {
        let log = check_log(pass, self.security.id, check_in, Some(check_in + stay));
        self.store.put_check_log(log.clone());
        log
    }

    // --- Elenco extra ---

    pub fn blacklist(&self, visitor_id: Uuid) {
        if let Some(mut visitor) = self.store.visitor(visitor_id) {
            visitor.is_blacklisted = true;
            visitor.blacklist_reason = Some("Comportamento inadequado".into());
            self.store.put_visitor(visitor);
        }
    }

    pub fn blacklisted_visitor(&self) -> Visitor {
        let banned = Visitor {
            is_blacklisted: true,
            blacklist_reason: Some("Tentativa de acesso indevido".into()),
            ..visitor("Pedro Alves", None)
        };
        self.store.put_visitor(banned.clone());
        banned
    }

    pub fn another_employee(&self) -> Actor {
        let other = user("Bruno Reis", Role::Employee, true);
        self.store.put_user(other.clone());
        actor(&other)
    }

    pub fn inactive_employee(&self) -> User {
        let inactive = user("Marta Dias", Role::Employee, false);
        self.store.put_user(inactive.clone());
        inactive
    }

    /// Outro visitante com conta e perfil próprios.
    pub fn another_visitor_actor(&self) -> Actor {
        let account = user("Lucia Prado", Role::Visitor, true);
        self.store.put_user(account.clone());
        self.store.put_visitor(visitor("Lucia Prado", Some(account.id)));
        actor(&account)
    }
}

fn actor(user: &User) -> Actor {
    Actor::new(user.id, user.role)
}

fn user(name: &str, role: Role, is_active: bool) -> User {
    let now = Utc::now();
    let login = name.to_lowercase().replace(' ', ".");
    User {
        id: Uuid::new_v4(),
        name: name.into(),
        email: format!("{login}@empresa.com"),
        phone: "+5511988887777".into(),
        role,
        department: (role == Role::Employee).then(|| "Comercial".to_string()),
        is_active,
        created_at: now,
        updated_at: now,
    }
}

fn visitor(name: &str, user_id: Option<Uuid>) -> Visitor {
    let now = Utc::now();
    let login = name.to_lowercase().replace(' ', ".");
    Visitor {
        id: Uuid::new_v4(),
        user_id,
        name: name.into(),
        email: format!("{login}@gmail.com"),
        phone: "+5511999990000".into(),
        company: None,
        photo: None,
        visit_count: 2,
        last_visit: None,
        is_blacklisted: false,
        blacklist_reason: None,
        created_at: now,
        updated_at: now,
    }
}

fn check_log(
    pass: &Pass,
    by: Uuid,
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
) -> CheckLog {
    CheckLog {
        id: Uuid::new_v4(),
        pass_id: pass.id,
        visitor_id: pass.visitor_id,
        check_in_time: check_in,
        check_out_time: check_out,
        checked_in_by: by,
        checked_out_by: check_out.map(|_| by),
        temperature: None,
        device_info: None,
        notes: None,
        location: None,
        created_at: check_in,
        updated_at: check_out.unwrap_or(check_in),
    }
}
