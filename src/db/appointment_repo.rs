// src/db/appointment_repo.rs

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{pg_store::PgStore, store::AppointmentStore};
use crate::{
    common::error::AppError,
    models::{
        appointment::{
            Appointment, AppointmentChanges, AppointmentFilter, AppointmentStatus, NewAppointment,
            StatusChange,
        },
        page::Page,
    },
};

/// Acrescenta os `AND ...` do filtro. A query precisa terminar em `WHERE TRUE`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AppointmentFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(host_id) = filter.host_id {
        qb.push(" AND host_id = ").push_bind(host_id);
    }
    if let Some(visitor_id) = filter.visitor_id {
        qb.push(" AND visitor_id = ").push_bind(visitor_id);
    }
    if let Some((from, to)) = filter.scheduled_between {
        qb.push(" AND scheduled_at >= ")
            .push_bind(from)
            .push(" AND scheduled_at < ")
            .push_bind(to);
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, AppError> {
        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (
                visitor_id, host_id, scheduled_at, appointment_time, duration_minutes,
                purpose, location, notes, visitor_photo, created_by, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending')
            RETURNING *
            "#,
        )
        .bind(new.visitor_id)
        .bind(new.host_id)
        .bind(new.scheduled_at)
        .bind(new.appointment_time)
        .bind(new.duration_minutes)
        .bind(new.purpose)
        .bind(new.location)
        .bind(new.notes)
        .bind(new.visitor_photo)
        .bind(new.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(appointment)
    }

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, AppError> {
        let appointment =
            sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(appointment)
    }

    async fn transition_appointment(
        &self,
        id: Uuid,
        from: &[AppointmentStatus],
        change: StatusChange,
    ) -> Result<Option<Appointment>, AppError> {
        if from.is_empty() {
            return Ok(None);
        }

        // Um único UPDATE condicional: duas aprovações simultâneas não passam ambas.
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE appointments SET status = ");
        qb.push_bind(change.status)
            .push(", approved_by = COALESCE(")
            .push_bind(change.decided_by)
            .push(", approved_by), approval_date = COALESCE(")
            .push_bind(change.decided_at)
            .push(", approval_date), rejection_reason = COALESCE(")
            .push_bind(change.rejection_reason)
            .push(", rejection_reason), updated_at = NOW() WHERE id = ")
            .push_bind(id)
            .push(" AND status IN (");

        let mut statuses = qb.separated(", ");
        for status in from {
            statuses.push_bind(*status);
        }
        statuses.push_unseparated(") RETURNING *");

        let appointment = qb
            .build_query_as::<Appointment>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Option<Appointment>, AppError> {
        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET scheduled_at = COALESCE($2, scheduled_at),
                appointment_time = COALESCE($3, appointment_time),
                duration_minutes = COALESCE($4, duration_minutes),
                purpose = COALESCE($5, purpose),
                location = COALESCE($6, location),
                notes = COALESCE($7, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.scheduled_at)
        .bind(changes.appointment_time)
        .bind(changes.duration_minutes)
        .bind(changes.purpose)
        .bind(changes.location)
        .bind(changes.notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(appointment)
    }

    async fn set_notifications_sent(&self, id: Uuid, sent: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE appointments SET notifications_sent = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(sent)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: Option<Page>,
    ) -> Result<Vec<Appointment>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM appointments WHERE TRUE");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY scheduled_at DESC");
        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(page.limit as i64)
                .push(" OFFSET ")
                .push_bind(page.offset());
        }

        let appointments = qb
            .build_query_as::<Appointment>()
            .fetch_all(&self.pool)
            .await?;

        Ok(appointments)
    }

    async fn count_appointments(&self, filter: &AppointmentFilter) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM appointments WHERE TRUE");
        push_filter(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}
