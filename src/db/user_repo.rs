// src/db/user_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    pg_store::PgStore,
    store::{UserStore, VisitorStore},
};
use crate::{
    common::error::AppError,
    models::people::{User, Visitor},
};

#[async_trait]
impl UserStore for PgStore {
    // Busca um usuário pelo seu ID
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl VisitorStore for PgStore {
    async fn find_visitor_by_id(&self, id: Uuid) -> Result<Option<Visitor>, AppError> {
        let visitor = sqlx::query_as::<_, Visitor>("SELECT * FROM visitors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(visitor)
    }

    async fn find_visitor_by_user(&self, user_id: Uuid) -> Result<Option<Visitor>, AppError> {
        let visitor = sqlx::query_as::<_, Visitor>("SELECT * FROM visitors WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(visitor)
    }

    async fn record_visit(&self, visitor_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE visitors
            SET visit_count = visit_count + 1, last_visit = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(visitor_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
