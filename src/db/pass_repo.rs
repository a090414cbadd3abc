// src/db/pass_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    pg_store::{PgStore, map_unique_violation},
    store::PassStore,
};
use crate::{
    common::error::AppError,
    models::{
        page::Page,
        pass::{NewPass, Pass, PassFilter},
    },
};

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PassFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(visitor_id) = filter.visitor_id {
        qb.push(" AND visitor_id = ").push_bind(visitor_id);
    }
}

#[async_trait]
impl PassStore for PgStore {
    async fn insert_pass(&self, new: NewPass) -> Result<Pass, AppError> {
        sqlx::query_as::<_, Pass>(
            r#"
            INSERT INTO passes (
                pass_number, visitor_id, appointment_id, issued_by, host_id,
                valid_from, valid_until, access_areas, special_instructions, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active')
            RETURNING *
            "#,
        )
        .bind(new.pass_number)
        .bind(new.visitor_id)
        .bind(new.appointment_id)
        .bind(new.issued_by)
        .bind(new.host_id)
        .bind(new.window.valid_from)
        .bind(new.window.valid_until)
        .bind(new.access_areas)
        .bind(new.special_instructions)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn pass_number_exists(&self, pass_number: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM passes WHERE pass_number = $1)")
                .bind(pass_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn find_pass_by_id(&self, id: Uuid) -> Result<Option<Pass>, AppError> {
        let pass = sqlx::query_as::<_, Pass>("SELECT * FROM passes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(pass)
    }

    async fn find_pass_by_number(&self, pass_number: &str) -> Result<Option<Pass>, AppError> {
        let pass = sqlx::query_as::<_, Pass>("SELECT * FROM passes WHERE pass_number = $1")
            .bind(pass_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(pass)
    }

    async fn find_active_pass_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Pass>, AppError> {
        let pass = sqlx::query_as::<_, Pass>(
            "SELECT * FROM passes WHERE appointment_id = $1 AND status = 'active'",
        )
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pass)
    }

    async fn find_latest_active_pass_for_visitor(
        &self,
        visitor_id: Uuid,
    ) -> Result<Option<Pass>, AppError> {
        let pass = sqlx::query_as::<_, Pass>(
            r#"
            SELECT * FROM passes
            WHERE visitor_id = $1 AND status = 'active'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(visitor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pass)
    }

    async fn set_pass_artifacts(
        &self,
        id: Uuid,
        qr_code: Option<String>,
        pdf_path: Option<String>,
    ) -> Result<Option<Pass>, AppError> {
        let pass = sqlx::query_as::<_, Pass>(
            r#"
            UPDATE passes
            SET qr_code = COALESCE($2, qr_code),
                pdf_path = COALESCE($3, pdf_path),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(qr_code)
        .bind(pdf_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pass)
    }

    async fn revoke_pass(&self, id: Uuid) -> Result<Option<Pass>, AppError> {
        let pass = sqlx::query_as::<_, Pass>(
            r#"
            UPDATE passes SET status = 'revoked', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pass)
    }

    async fn expire_passes(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE passes SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND valid_until < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_passes(&self, filter: &PassFilter, page: Page) -> Result<Vec<Pass>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM passes WHERE TRUE");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let passes = qb.build_query_as::<Pass>().fetch_all(&self.pool).await?;
        Ok(passes)
    }

    async fn count_passes(&self, filter: &PassFilter) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM passes WHERE TRUE");
        push_filter(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}
