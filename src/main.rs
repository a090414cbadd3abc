//src/main.rs

use axum::{
    Router,
    routing::{get, patch, post},
};
use tokio::{net::TcpListener, sync::watch};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;
#[cfg(test)]
mod testing;

use crate::config::{AppState, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logger: RUST_LOG controla o nível (padrão "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let settings = Settings::from_env()?;
    let app_state = AppState::new(&settings).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Varredura em segundo plano (auto check-out + expiração de passes)
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = app_state.sweeper.clone().spawn(shutdown_rx);

    let app = router(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Para a varredura antes de sair
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!("Varredura terminou com erro: {}", e);
    }
    tracing::info!("Servidor encerrado");
    Ok(())
}

fn router(app_state: AppState) -> Router {
    let appointment_routes = Router::new()
        .route("/public", post(handlers::appointments::create_public))
        .route(
            "/",
            post(handlers::appointments::create_appointment)
                .get(handlers::appointments::list_appointments),
        )
        .route("/stats", get(handlers::appointments::appointment_stats))
        .route("/my", get(handlers::appointments::my_appointments))
        .route("/visitor/{visitor_id}", get(handlers::appointments::appointments_by_visitor))
        .route(
            "/{id}",
            get(handlers::appointments::get_appointment)
                .patch(handlers::appointments::update_appointment),
        )
        .route("/{id}/approve", patch(handlers::appointments::approve_appointment))
        .route("/{id}/reject", patch(handlers::appointments::reject_appointment))
        .route("/{id}/cancel", patch(handlers::appointments::cancel_appointment));

    let pass_routes = Router::new()
        .route("/verify/{value}", get(handlers::passes::verify_by_path))
        .route("/verify", post(handlers::passes::verify_by_body))
        .route(
            "/",
            post(handlers::passes::issue_pass).get(handlers::passes::list_passes),
        )
        .route("/stats", get(handlers::passes::pass_stats))
        .route("/my", get(handlers::passes::my_active_pass))
        .route("/update-expired", patch(handlers::passes::expire_passes))
        .route("/{id}", get(handlers::passes::get_pass))
        .route("/{id}/revoke", patch(handlers::passes::revoke_pass));

    let check_log_routes = Router::new()
        .route("/checkin", post(handlers::check_logs::check_in))
        .route("/checkout/{id}", patch(handlers::check_logs::check_out))
        .route("/", get(handlers::check_logs::list_check_logs))
        .route("/current", get(handlers::check_logs::current_visitors))
        .route("/stats", get(handlers::check_logs::check_log_stats))
        .route("/visitor/{visitor_id}", get(handlers::check_logs::visitor_history))
        .route("/{id}", get(handlers::check_logs::get_check_log));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/appointments", appointment_routes)
        .nest("/api/passes", pass_routes)
        .nest("/api/checklogs", check_log_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .with_state(app_state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao escutar Ctrl-C: {}", e);
        return;
    }
    tracing::info!("Sinal de parada recebido, encerrando...");
}
