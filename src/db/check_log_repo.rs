// src/db/check_log_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use super::{
    pg_store::{PgStore, map_unique_violation},
    store::CheckLogStore,
};
use crate::{
    common::error::AppError,
    models::{
        check_log::{CheckLog, CheckLogFilter, CheckOut, NewCheckLog, Presence},
        page::Page,
    },
};

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CheckLogFilter) {
    if let Some(visitor_id) = filter.visitor_id {
        qb.push(" AND visitor_id = ").push_bind(visitor_id);
    }
    match filter.presence {
        Some(Presence::CheckedIn) => {
            qb.push(" AND check_out_time IS NULL");
        }
        Some(Presence::CheckedOut) => {
            qb.push(" AND check_out_time IS NOT NULL");
        }
        None => {}
    }
    if let Some((from, to)) = filter.checked_in_between {
        qb.push(" AND check_in_time >= ")
            .push_bind(from)
            .push(" AND check_in_time < ")
            .push_bind(to);
    }
    if let Some((from, to)) = filter.checked_out_between {
        qb.push(" AND check_out_time >= ")
            .push_bind(from)
            .push(" AND check_out_time < ")
            .push_bind(to);
    }
}

#[async_trait]
impl CheckLogStore for PgStore {
    async fn insert_check_log(&self, new: NewCheckLog) -> Result<CheckLog, AppError> {
        sqlx::query_as::<_, CheckLog>(
            r#"
            INSERT INTO check_logs (
                pass_id, visitor_id, check_in_time, checked_in_by,
                temperature, device_info, notes, location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.pass_id)
        .bind(new.visitor_id)
        .bind(new.check_in_time)
        .bind(new.checked_in_by)
        .bind(new.temperature)
        .bind(new.device_info.map(Json))
        .bind(new.notes)
        .bind(new.location)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn find_check_log_by_id(&self, id: Uuid) -> Result<Option<CheckLog>, AppError> {
        let log = sqlx::query_as::<_, CheckLog>("SELECT * FROM check_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(log)
    }

    async fn find_open_check_log_for_pass(
        &self,
        pass_id: Uuid,
    ) -> Result<Option<CheckLog>, AppError> {
        let log = sqlx::query_as::<_, CheckLog>(
            "SELECT * FROM check_logs WHERE pass_id = $1 AND check_out_time IS NULL",
        )
        .bind(pass_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    async fn close_check_log(
        &self,
        id: Uuid,
        checkout: CheckOut,
    ) -> Result<Option<CheckLog>, AppError> {
        let extra = checkout
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        // O filtro `check_out_time IS NULL` garante que só um fechamento vence
        let log = sqlx::query_as::<_, CheckLog>(
            r#"
            UPDATE check_logs
            SET check_out_time = $2,
                checked_out_by = $3,
                notes = CASE
                    WHEN $4::text IS NULL THEN notes
                    WHEN notes IS NULL OR notes = '' THEN $4
                    ELSE notes || ' ' || $4
                END,
                updated_at = NOW()
            WHERE id = $1 AND check_out_time IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(checkout.at)
        .bind(checkout.by)
        .bind(extra)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    async fn list_open_check_logs_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CheckLog>, AppError> {
        let logs = sqlx::query_as::<_, CheckLog>(
            r#"
            SELECT * FROM check_logs
            WHERE check_out_time IS NULL AND check_in_time <= $1
            ORDER BY check_in_time ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn list_check_logs(
        &self,
        filter: &CheckLogFilter,
        page: Option<Page>,
    ) -> Result<Vec<CheckLog>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM check_logs WHERE TRUE");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY check_in_time DESC");
        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(page.limit as i64)
                .push(" OFFSET ")
                .push_bind(page.offset());
        }

        let logs = qb.build_query_as::<CheckLog>().fetch_all(&self.pool).await?;
        Ok(logs)
    }

    async fn count_check_logs(&self, filter: &CheckLogFilter) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM check_logs WHERE TRUE");
        push_filter(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}
