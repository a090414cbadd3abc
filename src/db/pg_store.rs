// src/db/pg_store.rs

use sqlx::PgPool;

use crate::common::error::AppError;

// Nomes das restrições criadas na migração
pub(crate) const PASS_NUMBER_UNIQUE: &str = "passes_pass_number_key";
pub(crate) const ONE_ACTIVE_PASS_PER_APPOINTMENT: &str = "passes_one_active_per_appointment";
pub(crate) const ONE_OPEN_LOG_PER_PASS: &str = "check_logs_one_open_per_pass";

/// Store de produção sobre o pool do Postgres.
///
/// As implementações dos traits ficam nos arquivos `*_repo.rs`, uma tabela
/// por arquivo.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Converte violação de chave única em um erro de domínio; o resto vira
/// `DatabaseError`.
pub(crate) fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(PASS_NUMBER_UNIQUE) => return AppError::DuplicatePassNumber,
                Some(ONE_ACTIVE_PASS_PER_APPOINTMENT) => return AppError::ActivePassExists,
                Some(ONE_OPEN_LOG_PER_PASS) => return AppError::AlreadyCheckedIn,
                _ => {}
            }
        }
    }
    AppError::DatabaseError(e)
}
