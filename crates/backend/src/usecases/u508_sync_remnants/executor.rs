use super::catalog_fetcher::CatalogFetcher;
use super::error::SyncError;
use super::progress_tracker::ProgressTracker;
use super::reconciler::{non_zero_stock, reconcile};
use super::remnant_source::RemnantSource;
use super::retry::RetryPolicy;
use super::uploader::Uploader;
use crate::shared::marketplaces::MarketplaceClient;
use chrono::Utc;
use contracts::usecases::u508_sync_remnants::{
    AccountConfig, AccountSyncReport, CyclePhase, CycleState, RemnantRecord, SyncProgress,
    SyncReport, SyncRequest, SyncStatus,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Что делать с остальными кабинетами, если один упал
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Кабинеты независимы, ошибки собираются в отчет
    #[default]
    ContinueOnError,
    /// Первая ошибка останавливает прогон, оставшиеся кабинеты остаются Pending
    AbortRun,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub failure_policy: FailurePolicy,
    /// Сколько кабинетов синхронизируется одновременно
    pub account_concurrency: usize,
    /// Сколько пачек одного кабинета может быть в полете
    pub upload_concurrency: usize,
    /// Лимит времени на цикл одного кабинета
    pub account_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::ContinueOnError,
            account_concurrency: 1,
            upload_concurrency: 1,
            account_timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Кабинет вместе с клиентом его маркетплейса
#[derive(Clone)]
pub struct SyncTarget {
    pub account: AccountConfig,
    pub client: Arc<dyn MarketplaceClient>,
}

impl SyncTarget {
    pub fn new(account: AccountConfig, client: Arc<dyn MarketplaceClient>) -> Self {
        Self { account, client }
    }
}

/// Executor для UseCase синхронизации остатков и цен
#[derive(Clone)]
pub struct SyncExecutor {
    source: Arc<dyn RemnantSource>,
    targets: Arc<Vec<SyncTarget>>,
    settings: Arc<SyncSettings>,
    progress_tracker: Arc<ProgressTracker>,
}

fn failed_phase(state: CycleState) -> Option<CyclePhase> {
    match state {
        CycleState::Fetching => Some(CyclePhase::Fetching),
        CycleState::Reconciling => Some(CyclePhase::Reconciling),
        CycleState::Uploading => Some(CyclePhase::Uploading),
        _ => None,
    }
}

impl SyncExecutor {
    pub fn new(
        source: Arc<dyn RemnantSource>,
        targets: Vec<SyncTarget>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            targets: Arc::new(targets),
            settings: Arc::new(settings),
            progress_tracker: Arc::new(ProgressTracker::new()),
        }
    }

    /// Получить текущий прогресс синхронизации
    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        self.progress_tracker.get_progress(session_id)
    }

    /// Прогресс прогонов, которые еще не завершились
    pub fn running_progress(&self) -> Vec<SyncProgress> {
        self.progress_tracker.running_sessions()
    }

    /// Выбрать кабинеты по фильтру запроса (в порядке конфигурации)
    fn select_targets(&self, request: &SyncRequest) -> Result<Vec<usize>, SyncError> {
        let Some(filter) = &request.account_ids else {
            return Ok((0..self.targets.len()).collect());
        };

        let known: HashSet<&str> = self
            .targets
            .iter()
            .map(|t| t.account.account_id.as_str())
            .collect();
        if let Some(unknown) = filter.iter().find(|id| !known.contains(id.as_str())) {
            return Err(SyncError::InvalidArgument(format!(
                "unknown account '{}'",
                unknown
            )));
        }

        Ok(self
            .targets
            .iter()
            .enumerate()
            .filter(|(_, t)| filter.contains(&t.account.account_id))
            .map(|(index, _)| index)
            .collect())
    }

    /// Выполнить синхронизацию по выбранным кабинетам
    pub async fn run(&self, request: SyncRequest) -> Result<SyncReport, SyncError> {
        let selected = self.select_targets(&request)?;

        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        self.progress_tracker.create_session(session_id.clone());
        for &index in &selected {
            let account = &self.targets[index].account;
            self.progress_tracker.add_account(
                &session_id,
                account.account_id.clone(),
                account.label.clone(),
            );
        }

        tracing::info!(
            "Starting remnants sync for session: {} ({} accounts, dry_run: {})",
            session_id,
            selected.len(),
            request.dry_run
        );

        let remnants = match self.source.fetch_remnants().await {
            Ok(remnants) => Arc::new(remnants),
            Err(e) => {
                let error = SyncError::from(e);
                tracing::error!("Remnants are unavailable, sync aborted: {}", error);
                self.progress_tracker
                    .add_error(&session_id, error.kind().as_str(), error.to_string());
                self.progress_tracker
                    .complete_session(&session_id, SyncStatus::Failed);
                return Err(error);
            }
        };

        let accounts = self
            .run_accounts(&session_id, &selected, remnants.clone(), request.dry_run)
            .await;

        let report = SyncReport {
            session_id: session_id.clone(),
            started_at,
            finished_at: Utc::now(),
            dry_run: request.dry_run,
            remnant_count: remnants.len(),
            accounts,
        };

        let failed = report.failed_accounts().count();
        let status = if failed == 0 {
            SyncStatus::Completed
        } else if failed == report.accounts.len() {
            SyncStatus::Failed
        } else {
            SyncStatus::CompletedWithErrors
        };
        self.progress_tracker.complete_session(&session_id, status);

        tracing::info!(
            "Sync completed for session: {} ({} accounts, {} failed)",
            session_id,
            report.accounts.len(),
            failed
        );
        Ok(report)
    }

    /// Кабинеты запускаются по порядку, одновременно не больше `account_concurrency`
    async fn run_accounts(
        &self,
        session_id: &str,
        selected: &[usize],
        remnants: Arc<Vec<RemnantRecord>>,
        dry_run: bool,
    ) -> Vec<AccountSyncReport> {
        let semaphore = Arc::new(Semaphore::new(self.settings.account_concurrency.max(1)));
        let abort = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(selected.len());
        let mut reports: Vec<Option<AccountSyncReport>> = vec![None; selected.len()];

        for (slot, &index) in selected.iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if abort.load(Ordering::SeqCst) {
                break;
            }

            let executor = self.clone();
            let session_id = session_id.to_string();
            let remnants = remnants.clone();
            let abort = abort.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let report = executor
                    .run_account(&session_id, index, remnants, dry_run)
                    .await;
                if report.state == CycleState::Failed
                    && executor.settings.failure_policy == FailurePolicy::AbortRun
                {
                    abort.store(true, Ordering::SeqCst);
                }
                report
            });
            handles.push((slot, index, handle));
        }

        for (slot, index, handle) in handles {
            match handle.await {
                Ok(report) => reports[slot] = Some(report),
                Err(e) => {
                    let account = &self.targets[index].account;
                    tracing::error!("Account {}: sync task failed: {}", account.account_id, e);
                    let mut report = self.pending_report(index);
                    report.state = CycleState::Failed;
                    report.error_message = Some(format!("sync task failed: {}", e));
                    reports[slot] = Some(report);
                }
            }
        }

        selected
            .iter()
            .zip(reports)
            .map(|(&index, report)| {
                report.unwrap_or_else(|| {
                    tracing::warn!(
                        "Account {}: skipped after a failure in this run",
                        self.targets[index].account.account_id
                    );
                    self.pending_report(index)
                })
            })
            .collect()
    }

    fn pending_report(&self, index: usize) -> AccountSyncReport {
        let account = &self.targets[index].account;
        AccountSyncReport::pending(
            account.account_id.clone(),
            account.label.clone(),
            account.marketplace,
        )
    }

    /// Цикл одного кабинета: каталог -> сверка -> выгрузка
    async fn run_account(
        &self,
        session_id: &str,
        index: usize,
        remnants: Arc<Vec<RemnantRecord>>,
        dry_run: bool,
    ) -> AccountSyncReport {
        let target = &self.targets[index];
        let mut report = self.pending_report(index);
        report.started_at = Some(Utc::now());

        let result = match self.settings.account_timeout {
            Some(limit) => {
                match tokio::time::timeout(
                    limit,
                    self.cycle(session_id, target, &remnants, dry_run, &mut report),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout {
                        seconds: limit.as_secs(),
                    }),
                }
            }
            None => {
                self.cycle(session_id, target, &remnants, dry_run, &mut report)
                    .await
            }
        };

        let account_id = &target.account.account_id;
        match result {
            Ok(()) => {
                self.transition(session_id, account_id, &mut report, CycleState::Done);
            }
            Err(e) => {
                report.failed_phase = failed_phase(report.state);
                report.state = CycleState::Failed;
                report.error_kind = Some(e.kind().to_string());
                report.error_message = Some(e.to_string());
                tracing::error!(
                    "Account {} ({}) failed during {:?}: {}",
                    account_id,
                    target.account.label,
                    report.failed_phase,
                    e
                );
                self.progress_tracker.fail_account(
                    session_id,
                    account_id,
                    e.kind().as_str(),
                    e.to_string(),
                );
            }
        }

        report.finished_at = Some(Utc::now());
        report
    }

    async fn cycle(
        &self,
        session_id: &str,
        target: &SyncTarget,
        remnants: &[RemnantRecord],
        dry_run: bool,
        report: &mut AccountSyncReport,
    ) -> Result<(), SyncError> {
        let account = &target.account;
        tracing::info!(
            "Account {} ({}): syncing {} remnant rows with {}",
            account.account_id,
            account.label,
            remnants.len(),
            target.client.marketplace()
        );

        self.transition(session_id, &account.account_id, report, CycleState::Fetching);
        let fetcher = CatalogFetcher::new(target.client.clone(), self.settings.retry.clone());
        let catalog = fetcher.fetch_all_offer_ids(account).await?;
        report.catalog_size = catalog.len();

        self.transition(session_id, &account.account_id, report, CycleState::Reconciling);
        let reconciliation = reconcile(remnants, &catalog, account)?;
        report.stock_entries = reconciliation.stock_entries.len();
        report.non_zero_stock = non_zero_stock(&reconciliation.stock_entries).len();
        report.price_entries = reconciliation.price_entries.len();

        self.transition(session_id, &account.account_id, report, CycleState::Uploading);
        if dry_run {
            tracing::info!(
                "Account {}: dry run, skipping upload of {} stocks and {} prices",
                account.account_id,
                report.stock_entries,
                report.price_entries
            );
            return Ok(());
        }

        let uploader = Uploader::new(
            target.client.clone(),
            self.settings.retry.clone(),
            self.settings.upload_concurrency,
        );

        let stocks = uploader
            .upload_stocks(account, &reconciliation.stock_entries)
            .await?;
        report.stock_chunks = stocks.chunks;
        report.rejected_items += stocks.rejected.len();
        self.progress_tracker
            .add_uploaded_chunks(session_id, &account.account_id, stocks.chunks);

        let prices = uploader
            .upload_prices(account, &reconciliation.price_entries)
            .await?;
        report.price_chunks = prices.chunks;
        report.rejected_items += prices.rejected.len();
        self.progress_tracker
            .add_uploaded_chunks(session_id, &account.account_id, prices.chunks);

        Ok(())
    }

    fn transition(
        &self,
        session_id: &str,
        account_id: &str,
        report: &mut AccountSyncReport,
        state: CycleState,
    ) {
        tracing::info!("Account {}: {:?} -> {:?}", account_id, report.state, state);
        report.state = state;
        self.progress_tracker.set_state(session_id, account_id, state);
    }
}
