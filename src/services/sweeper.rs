// src/services/sweeper.rs
//
// Tarefa periódica: fecha sessões esquecidas abertas e expira passes vencidos.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

use super::pass_service::PassService;
use crate::{common::error::AppError, db::EntityStore, models::check_log::CheckOut};

/// Máximo de sessões fechadas por ciclo; o restante fica para o próximo.
pub const SWEEP_BATCH_LIMIT: i64 = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub examined: usize,
    pub closed: usize,
    /// Já encerradas por outra requisição entre a leitura e o UPDATE.
    pub skipped: usize,
    pub failed: usize,
    pub passes_expired: u64,
}

#[derive(Clone)]
pub struct SweepWorker {
    store: Arc<dyn EntityStore>,
    passes: PassService,
    max_open: chrono::Duration,
    interval: std::time::Duration,
}

impl SweepWorker {
    pub fn new(
        store: Arc<dyn EntityStore>,
        passes: PassService,
        max_open: chrono::Duration,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            store,
            passes,
            max_open,
            interval,
        }
    }

    /// Um ciclo completo. Falhas individuais são contadas, nunca interrompem o lote.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let mut report = SweepReport::default();

        // --- 1. Auto check-out ---
        let cutoff = now - self.max_open;
        let stale = self
            .store
            .list_open_check_logs_before(cutoff, SWEEP_BATCH_LIMIT)
            .await?;
        report.examined = stale.len();

        let note = format!("[auto-checkout after {} min]", self.max_open.num_minutes());
        for log in stale {
            let at = (log.check_in_time + self.max_open).min(now);
            let checkout = CheckOut {
                at,
                by: None,
                notes: Some(note.clone()),
            };
            match self.store.close_check_log(log.id, checkout).await {
                Ok(Some(_)) => report.closed += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("⚠️ Auto check-out falhou para {}: {}", log.id, e);
                }
            }
        }

        // --- 2. Passes vencidos ---
        match self.passes.expire_overdue(now).await {
            Ok(count) => report.passes_expired = count,
            Err(e) => tracing::warn!("⚠️ Expiração de passes falhou: {}", e),
        }

        Ok(report)
    }

    /// Roda a cada `interval` até `shutdown` virar `true` (ou o emissor sumir).
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(
                "🧹 Varredura iniciada (a cada {:?}, limite de {} min)",
                self.interval,
                self.max_open.num_minutes()
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.run_once(Utc::now()).await {
                            Ok(report) if report.examined > 0 || report.passes_expired > 0 => {
                                tracing::info!("Varredura: {:?}", report);
                            }
                            Ok(_) => tracing::debug!("Varredura sem pendências"),
                            Err(e) => tracing::error!("Varredura falhou: {}", e),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Varredura encerrada");
        })
    }
}
