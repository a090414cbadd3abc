// src/config.rs

use std::{env, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use axum::extract::FromRef;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    db::{EntityStore, PgStore},
    middleware::auth::TokenDecoder,
    services::{
        appointment_service::AppointmentService,
        check_log_service::CheckLogService,
        document_service::PdfPassRenderer,
        notification_service::{LogNotifier, NotificationService},
        pass_service::PassService,
        qr_service::QrCodeEncoder,
        sweeper::SweepWorker,
        verification_service::VerificationService,
    },
};

/// Configuração lida do ambiente (`.env` incluso).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub auto_checkout_after: chrono::Duration,
    pub auto_checkout_interval: Duration,
    pub notification_timeout: Duration,
    pub render_timeout: Duration,
    pub uploads_dir: PathBuf,
    pub fonts_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Lê as chaves por uma função qualquer (testável sem mexer no ambiente do processo).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} deve ser definida"))
        };

        let auto_checkout_after: u32 = positive(&lookup, "AUTO_CHECKOUT_AFTER_MIN", 60)?;
        let auto_checkout_interval: u32 = positive(&lookup, "AUTO_CHECKOUT_INTERVAL_MIN", 5)?;
        let notification_timeout: u64 = positive(&lookup, "NOTIFICATION_TIMEOUT_SECS", 10)?;
        let render_timeout: u64 = positive(&lookup, "RENDER_TIMEOUT_SECS", 30)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: positive(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            auto_checkout_after: chrono::Duration::minutes(auto_checkout_after.into()),
            auto_checkout_interval: Duration::from_secs(u64::from(auto_checkout_interval) * 60),
            notification_timeout: Duration::from_secs(notification_timeout),
            render_timeout: Duration::from_secs(render_timeout),
            uploads_dir: lookup("UPLOADS_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            fonts_dir: lookup("FONTS_DIR").unwrap_or_else(|| "./fonts".into()).into(),
        })
    }
}

/// Número inteiro maior que zero, com valor padrão quando a chave está ausente.
fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + PartialOrd + Default + Copy,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} inválida: '{raw}'"))?;
    if value <= T::default() {
        bail!("{key} deve ser maior que zero");
    }
    Ok(value)
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub tokens: TokenDecoder,
    pub appointment_service: AppointmentService,
    pub pass_service: PassService,
    pub verification_service: VerificationService,
    pub check_log_service: CheckLogService,
    pub sweeper: SweepWorker,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar no banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store: Arc<dyn EntityStore> = Arc::new(PgStore::new(db_pool.clone()));
        let notifications = NotificationService::new(Arc::new(LogNotifier), settings.notification_timeout);
        let qr = Arc::new(QrCodeEncoder);
        let renderer = Arc::new(PdfPassRenderer::new(&settings.fonts_dir, &settings.uploads_dir));

        let pass_service = PassService::new(
            store.clone(),
            qr.clone(),
            renderer,
            settings.render_timeout,
            notifications.clone(),
        );
        let verification_service = VerificationService::new(store.clone(), pass_service.clone());
        let appointment_service =
            AppointmentService::new(store.clone(), pass_service.clone(), qr, notifications.clone());
        let check_log_service =
            CheckLogService::new(store.clone(), verification_service.clone(), notifications);
        let sweeper = SweepWorker::new(
            store,
            pass_service.clone(),
            settings.auto_checkout_after,
            settings.auto_checkout_interval,
        );

        Ok(Self {
            db_pool,
            tokens: TokenDecoder::new(&settings.jwt_secret),
            appointment_service,
            pass_service,
            verification_service,
            check_log_service,
            sweeper,
        })
    }
}

impl FromRef<AppState> for TokenDecoder {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
