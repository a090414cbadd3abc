// src/db/memory_store.rs
//
// Store em memória para os testes. Reproduz as restrições de unicidade do
// Postgres (número do passe, um passe ativo por agendamento, uma sessão
// aberta por passe) para que os testes de concorrência sejam determinísticos.

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::{
    AppointmentStore, CheckLogStore, PassStore, UserStore, VisitorStore, append_notes,
};
use crate::{
    common::error::AppError,
    models::{
        appointment::{
            Appointment, AppointmentChanges, AppointmentFilter, AppointmentStatus, NewAppointment,
            StatusChange,
        },
        check_log::{CheckLog, CheckLogFilter, CheckOut, NewCheckLog, Presence},
        page::Page,
        pass::{NewPass, Pass, PassFilter, PassStatus},
        people::{User, Visitor},
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    visitors: Vec<Visitor>,
    appointments: Vec<Appointment>,
    passes: Vec<Pass>,
    check_logs: Vec<CheckLog>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    // Quantas inserções de passe seguintes devem falhar com número duplicado
    forced_duplicates: AtomicU32,
    // Simula falha de escrita ao gravar QR/PDF de um passe já inserido
    failing_artifacts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Semeadura direta (fixtures) ---

    pub fn put_user(&self, user: User) {
        self.lock().users.push(user);
    }

    /// Insere ou substitui pelo id.
    pub fn put_visitor(&self, visitor: Visitor) {
        let mut tables = self.lock();
        tables.visitors.retain(|v| v.id != visitor.id);
        tables.visitors.push(visitor);
    }

    /// Insere ou substitui pelo id.
    pub fn put_appointment(&self, appointment: Appointment) {
        let mut tables = self.lock();
        tables.appointments.retain(|a| a.id != appointment.id);
        tables.appointments.push(appointment);
    }

    pub fn put_pass(&self, pass: Pass) {
        self.lock().passes.push(pass);
    }

    pub fn put_check_log(&self, log: CheckLog) {
        self.lock().check_logs.push(log);
    }

    pub fn force_duplicate_pass_numbers(&self, times: u32) {
        self.forced_duplicates.store(times, Ordering::SeqCst);
    }

    pub fn fail_artifact_updates(&self, failing: bool) {
        self.failing_artifacts.store(failing, Ordering::SeqCst);
    }

    // --- Inspeção ---

    pub fn passes(&self) -> Vec<Pass> {
        self.lock().passes.clone()
    }

    pub fn check_logs(&self) -> Vec<CheckLog> {
        self.lock().check_logs.clone()
    }

    pub fn visitor(&self, id: Uuid) -> Option<Visitor> {
        self.lock().visitors.iter().find(|v| v.id == id).cloned()
    }

    pub fn appointment(&self, id: Uuid) -> Option<Appointment> {
        self.lock().appointments.iter().find(|a| a.id == id).cloned()
    }
}

fn in_range(instant: DateTime<Utc>, (from, to): (DateTime<Utc>, DateTime<Utc>)) -> bool {
    from <= instant && instant < to
}

fn appointment_matches(a: &Appointment, f: &AppointmentFilter) -> bool {
    f.status.is_none_or(|s| a.status == s)
        && f.host_id.is_none_or(|h| a.host_id == h)
        && f.visitor_id.is_none_or(|v| a.visitor_id == Some(v))
        && f.scheduled_between.is_none_or(|r| in_range(a.scheduled_at, r))
}

fn pass_matches(p: &Pass, f: &PassFilter) -> bool {
    f.status.is_none_or(|s| p.status == s) && f.visitor_id.is_none_or(|v| p.visitor_id == v)
}

fn log_matches(l: &CheckLog, f: &CheckLogFilter) -> bool {
    let presence = match f.presence {
        Some(Presence::CheckedIn) => l.check_out_time.is_none(),
        Some(Presence::CheckedOut) => l.check_out_time.is_some(),
        None => true,
    };
    presence
        && f.visitor_id.is_none_or(|v| l.visitor_id == v)
        && f.checked_in_between.is_none_or(|r| in_range(l.check_in_time, r))
        && f.checked_out_between
            .is_none_or(|r| l.check_out_time.is_some_and(|out| in_range(out, r)))
}

fn paginate<T>(items: Vec<T>, page: Option<Page>) -> Vec<T> {
    match page {
        Some(page) => items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect(),
        None => items,
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl VisitorStore for MemoryStore {
    async fn find_visitor_by_id(&self, id: Uuid) -> Result<Option<Visitor>, AppError> {
        Ok(self.visitor(id))
    }

    async fn find_visitor_by_user(&self, user_id: Uuid) -> Result<Option<Visitor>, AppError> {
        Ok(self
            .lock()
            .visitors
            .iter()
            .find(|v| v.user_id == Some(user_id))
            .cloned())
    }

    async fn record_visit(&self, visitor_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(v) = self.lock().visitors.iter_mut().find(|v| v.id == visitor_id) {
            v.visit_count += 1;
            v.last_visit = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, AppError> {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            visitor_id: new.visitor_id,
            host_id: new.host_id,
            scheduled_at: new.scheduled_at,
            appointment_time: new.appointment_time,
            duration_minutes: new.duration_minutes,
            purpose: new.purpose,
            location: new.location,
            status: AppointmentStatus::Pending,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            notes: new.notes,
            visitor_photo: new.visitor_photo,
            notifications_sent: false,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        self.lock().appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, AppError> {
        Ok(self.appointment(id))
    }

    async fn transition_appointment(
        &self,
        id: Uuid,
        from: &[AppointmentStatus],
        change: StatusChange,
    ) -> Result<Option<Appointment>, AppError> {
        let mut tables = self.lock();
        let Some(a) = tables
            .appointments
            .iter_mut()
            .find(|a| a.id == id && from.contains(&a.status))
        else {
            return Ok(None);
        };
        a.status = change.status;
        a.approved_by = change.decided_by.or(a.approved_by);
        a.approval_date = change.decided_at.or(a.approval_date);
        a.rejection_reason = change.rejection_reason.or(a.rejection_reason.take());
        a.updated_at = Utc::now();
        Ok(Some(a.clone()))
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Option<Appointment>, AppError> {
        let mut tables = self.lock();
        let Some(a) = tables.appointments.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.scheduled_at {
            a.scheduled_at = v;
        }
        if let Some(v) = changes.appointment_time {
            a.appointment_time = v;
        }
        if let Some(v) = changes.duration_minutes {
            a.duration_minutes = v;
        }
        if let Some(v) = changes.purpose {
            a.purpose = v;
        }
        if let Some(v) = changes.location {
            a.location = v;
        }
        if let Some(v) = changes.notes {
            a.notes = Some(v);
        }
        a.updated_at = Utc::now();
        Ok(Some(a.clone()))
    }

    async fn set_notifications_sent(&self, id: Uuid, sent: bool) -> Result<(), AppError> {
        if let Some(a) = self.lock().appointments.iter_mut().find(|a| a.id == id) {
            a.notifications_sent = sent;
        }
        Ok(())
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: Option<Page>,
    ) -> Result<Vec<Appointment>, AppError> {
        let mut items: Vec<_> = self
            .lock()
            .appointments
            .iter()
            .filter(|a| appointment_matches(a, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(paginate(items, page))
    }

    async fn count_appointments(&self, filter: &AppointmentFilter) -> Result<i64, AppError> {
        Ok(self
            .lock()
            .appointments
            .iter()
            .filter(|a| appointment_matches(a, filter))
            .count() as i64)
    }
}

#[async_trait]
impl PassStore for MemoryStore {
    async fn insert_pass(&self, new: NewPass) -> Result<Pass, AppError> {
        let forced = self
            .forced_duplicates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if forced.is_ok() {
            return Err(AppError::DuplicatePassNumber);
        }

        let mut tables = self.lock();
        if tables.passes.iter().any(|p| p.pass_number == new.pass_number) {
            return Err(AppError::DuplicatePassNumber);
        }
        if let Some(appointment_id) = new.appointment_id {
            let taken = tables.passes.iter().any(|p| {
                p.appointment_id == Some(appointment_id) && p.status == PassStatus::Active
            });
            if taken {
                return Err(AppError::ActivePassExists);
            }
        }

        let now = Utc::now();
        let pass = Pass {
            id: Uuid::new_v4(),
            pass_number: new.pass_number,
            visitor_id: new.visitor_id,
            appointment_id: new.appointment_id,
            issued_by: new.issued_by,
            host_id: new.host_id,
            valid_from: new.window.valid_from,
            valid_until: new.window.valid_until,
            qr_code: None,
            pdf_path: None,
            status: PassStatus::Active,
            access_areas: new.access_areas,
            special_instructions: new.special_instructions,
            created_at: now,
            updated_at: now,
        };
        tables.passes.push(pass.clone());
        Ok(pass)
    }

    async fn pass_number_exists(&self, pass_number: &str) -> Result<bool, AppError> {
        Ok(self.lock().passes.iter().any(|p| p.pass_number == pass_number))
    }

    async fn find_pass_by_id(&self, id: Uuid) -> Result<Option<Pass>, AppError> {
        Ok(self.lock().passes.iter().find(|p| p.id == id).cloned())
    }

    async fn find_pass_by_number(&self, pass_number: &str) -> Result<Option<Pass>, AppError> {
        Ok(self
            .lock()
            .passes
            .iter()
            .find(|p| p.pass_number == pass_number)
            .cloned())
    }

    async fn find_active_pass_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Pass>, AppError> {
        Ok(self
            .lock()
            .passes
            .iter()
            .find(|p| p.appointment_id == Some(appointment_id) && p.status == PassStatus::Active)
            .cloned())
    }

    async fn find_latest_active_pass_for_visitor(
        &self,
        visitor_id: Uuid,
    ) -> Result<Option<Pass>, AppError> {
        Ok(self
            .lock()
            .passes
            .iter()
            .filter(|p| p.visitor_id == visitor_id && p.status == PassStatus::Active)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn set_pass_artifacts(
        &self,
        id: Uuid,
        qr_code: Option<String>,
        pdf_path: Option<String>,
    ) -> Result<Option<Pass>, AppError> {
        if self.failing_artifacts.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        let mut tables = self.lock();
        let Some(p) = tables.passes.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if qr_code.is_some() {
            p.qr_code = qr_code;
        }
        if pdf_path.is_some() {
            p.pdf_path = pdf_path;
        }
        Ok(Some(p.clone()))
    }

    async fn revoke_pass(&self, id: Uuid) -> Result<Option<Pass>, AppError> {
        let mut tables = self.lock();
        let Some(p) = tables
            .passes
            .iter_mut()
            .find(|p| p.id == id && p.status == PassStatus::Active)
        else {
            return Ok(None);
        };
        p.status = PassStatus::Revoked;
        p.updated_at = Utc::now();
        Ok(Some(p.clone()))
    }

    async fn expire_passes(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut expired = 0;
        for p in self.lock().passes.iter_mut() {
            if p.status == PassStatus::Active && p.valid_until < now {
                p.status = PassStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn list_passes(&self, filter: &PassFilter, page: Page) -> Result<Vec<Pass>, AppError> {
        let mut items: Vec<_> = self
            .lock()
            .passes
            .iter()
            .filter(|p| pass_matches(p, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, Some(page)))
    }

    async fn count_passes(&self, filter: &PassFilter) -> Result<i64, AppError> {
        Ok(self
            .lock()
            .passes
            .iter()
            .filter(|p| pass_matches(p, filter))
            .count() as i64)
    }
}

#[async_trait]
impl CheckLogStore for MemoryStore {
    async fn insert_check_log(&self, new: NewCheckLog) -> Result<CheckLog, AppError> {
        let mut tables = self.lock();
        if tables
            .check_logs
            .iter()
            .any(|l| l.pass_id == new.pass_id && l.is_open())
        {
            return Err(AppError::AlreadyCheckedIn);
        }

        let now = Utc::now();
        let log = CheckLog {
            id: Uuid::new_v4(),
            pass_id: new.pass_id,
            visitor_id: new.visitor_id,
            check_in_time: new.check_in_time,
            check_out_time: None,
            checked_in_by: new.checked_in_by,
            checked_out_by: None,
            temperature: new.temperature,
            device_info: new.device_info.map(sqlx::types::Json),
            notes: new.notes,
            location: new.location,
            created_at: now,
            updated_at: now,
        };
        tables.check_logs.push(log.clone());
        Ok(log)
    }

    async fn find_check_log_by_id(&self, id: Uuid) -> Result<Option<CheckLog>, AppError> {
        Ok(self.lock().check_logs.iter().find(|l| l.id == id).cloned())
    }

    async fn find_open_check_log_for_pass(
        &self,
        pass_id: Uuid,
    ) -> Result<Option<CheckLog>, AppError> {
        Ok(self
            .lock()
            .check_logs
            .iter()
            .find(|l| l.pass_id == pass_id && l.is_open())
            .cloned())
    }

    async fn close_check_log(
        &self,
        id: Uuid,
        checkout: CheckOut,
    ) -> Result<Option<CheckLog>, AppError> {
        let mut tables = self.lock();
        let Some(l) = tables
            .check_logs
            .iter_mut()
            .find(|l| l.id == id && l.is_open())
        else {
            return Ok(None);
        };
        l.check_out_time = Some(checkout.at);
        l.checked_out_by = checkout.by;
        l.notes = append_notes(l.notes.as_deref(), checkout.notes.as_deref());
        l.updated_at = Utc::now();
        Ok(Some(l.clone()))
    }

    async fn list_open_check_logs_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CheckLog>, AppError> {
        let mut items: Vec<_> = self
            .lock()
            .check_logs
            .iter()
            .filter(|l| l.is_open() && l.check_in_time <= cutoff)
            .cloned()
            .collect();
        items.sort_by_key(|l| l.check_in_time);
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn list_check_logs(
        &self,
        filter: &CheckLogFilter,
        page: Option<Page>,
    ) -> Result<Vec<CheckLog>, AppError> {
        let mut items: Vec<_> = self
            .lock()
            .check_logs
            .iter()
            .filter(|l| log_matches(l, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.check_in_time.cmp(&a.check_in_time));
        Ok(paginate(items, page))
    }

    async fn count_check_logs(&self, filter: &CheckLogFilter) -> Result<i64, AppError> {
        Ok(self
            .lock()
            .check_logs
            .iter()
            .filter(|l| log_matches(l, filter))
            .count() as i64)
    }
}
