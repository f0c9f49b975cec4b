use crate::usecases::u508_sync_remnants::SyncExecutor;
use contracts::usecases::u508_sync_remnants::{SyncProgress, SyncReport, SyncRequest};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

/// Сводка прогона в лог
pub fn log_report(report: &SyncReport) {
    for account in &report.accounts {
        match &account.error_message {
            Some(message) => warn!(
                "{} ({}): {:?} in {:?}, {}: {}",
                account.label,
                account.account_id,
                account.state,
                account.failed_phase,
                account.error_kind.as_deref().unwrap_or("Error"),
                message
            ),
            None => info!(
                "{} ({}): {:?}, catalog {}, stocks {} ({} non-zero), prices {}, rejected {}",
                account.label,
                account.account_id,
                account.state,
                account.catalog_size,
                account.stock_entries,
                account.non_zero_stock,
                account.price_entries,
                account.rejected_items
            ),
        }
    }
}

pub fn log_progress(progress: &SyncProgress) {
    let finished = progress
        .accounts
        .iter()
        .filter(|a| a.state.is_terminal())
        .count();
    let accounts: Vec<String> = progress
        .accounts
        .iter()
        .map(|a| format!("{} {:?} ({} chunks)", a.account_id, a.state, a.uploaded_chunks))
        .collect();
    info!(
        "Sync {} in progress: {}/{} accounts finished, {} errors [{}]",
        progress.session_id,
        finished,
        progress.accounts.len(),
        progress.total_errors,
        accounts.join(", ")
    );
}

/// Фоновая задача: раз в `every` пишет в лог прогресс идущих прогонов
pub fn spawn_progress_reporter(executor: SyncExecutor, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // первый тик срабатывает сразу
        interval.tick().await;
        loop {
            interval.tick().await;
            for progress in executor.running_progress() {
                log_progress(&progress);
            }
        }
    })
}

/// Периодический запуск синхронизации
pub struct SyncScheduler {
    executor: SyncExecutor,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(executor: SyncExecutor, interval: Duration) -> Self {
        Self { executor, interval }
    }

    /// Запускает цикл синхронизации. Ошибки прогона логируются, цикл продолжается.
    pub async fn run_loop(&self) {
        info!(
            "Sync scheduler started with interval {} seconds",
            self.interval.as_secs()
        );
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        info!("Running scheduled remnants sync...");
        match self.executor.run(SyncRequest::default()).await {
            Ok(report) => {
                log_report(&report);
                if report.has_failures() {
                    warn!(
                        "Scheduled sync {} finished with {} failed accounts",
                        report.session_id,
                        report.failed_accounts().count()
                    );
                }
            }
            Err(e) => error!("Scheduled sync failed: {}", e),
        }
    }
}
