#![allow(
    clippy::useless_format,
    clippy::type_complexity,
    clippy::too_many_arguments,
    clippy::derivable_impls
)]

pub mod shared;
pub mod system;
pub mod usecases;

use contracts::usecases::u508_sync_remnants::SyncRequest;
use shared::marketplaces::build_client;
use std::sync::Arc;
use usecases::u508_sync_remnants::{SpreadsheetRemnantSource, SyncExecutor, SyncTarget};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    system::tracing::initialize()?;

    let config = shared::config::load_config()?;
    let accounts = config.resolve_accounts()?;
    let timeout = config.http_timeout();

    let source = SpreadsheetRemnantSource::new(
        config.remnant_location()?,
        config.spreadsheet_layout(),
        timeout,
    )?;

    let mut targets = Vec::with_capacity(accounts.len());
    for account in accounts {
        tracing::info!(
            "Account {} ({}) configured for {}",
            account.account_id,
            account.label,
            account.marketplace
        );
        let client = build_client(account.marketplace, timeout)?;
        targets.push(SyncTarget::new(account, client));
    }

    let executor = SyncExecutor::new(Arc::new(source), targets, config.sync_settings());
    let reporter = config
        .progress_interval()
        .map(|every| system::scheduler::spawn_progress_reporter(executor.clone(), every));

    if let Some(interval) = config.interval() {
        system::scheduler::SyncScheduler::new(executor, interval)
            .run_loop()
            .await;
        return Ok(());
    }

    let result = executor.run(SyncRequest::default()).await;
    if let Some(reporter) = reporter {
        reporter.abort();
    }
    let report = result?;
    system::scheduler::log_report(&report);

    if report.has_failures() {
        anyhow::bail!(
            "sync finished with {} failed accounts",
            report.failed_accounts().count()
        );
    }
    Ok(())
}
