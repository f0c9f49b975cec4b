//! Выгрузка остатков и цен пачками.

use super::batcher::chunk;
use super::error::SyncError;
use super::retry::RetryPolicy;
use crate::shared::marketplaces::{Ack, MarketplaceClient, MarketplaceError, RejectedItem};
use async_trait::async_trait;
use contracts::usecases::u508_sync_remnants::{AccountConfig, PriceEntry, StockEntry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Итог выгрузки одного вида записей
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub chunks: usize,
    pub entries: usize,
    pub rejected: Vec<RejectedItem>,
}

impl UploadSummary {
    fn record(&mut self, entries: usize, ack: Ack) {
        self.chunks += 1;
        self.entries += entries;
        self.rejected.extend(ack.rejected);
    }
}

/// Вид выгружаемых записей
#[async_trait]
trait Payload: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    async fn send(
        client: &dyn MarketplaceClient,
        account: &AccountConfig,
        batch: &[Self],
    ) -> Result<Ack, MarketplaceError>;
}

#[async_trait]
impl Payload for StockEntry {
    const KIND: &'static str = "stocks";

    async fn send(
        client: &dyn MarketplaceClient,
        account: &AccountConfig,
        batch: &[Self],
    ) -> Result<Ack, MarketplaceError> {
        client.update_stocks(account, batch).await
    }
}

#[async_trait]
impl Payload for PriceEntry {
    const KIND: &'static str = "prices";

    async fn send(
        client: &dyn MarketplaceClient,
        account: &AccountConfig,
        batch: &[Self],
    ) -> Result<Ack, MarketplaceError> {
        client.update_prices(account, batch).await
    }
}

async fn send_chunk<P: Payload>(
    client: &dyn MarketplaceClient,
    retry: &RetryPolicy,
    account: &AccountConfig,
    batch: &[P],
    label: &str,
) -> Result<Ack, MarketplaceError> {
    tracing::debug!(
        "Account {}: uploading {} ({} entries)",
        account.account_id,
        label,
        batch.len()
    );
    let ack = retry.run(label, || P::send(client, account, batch)).await?;
    for item in &ack.rejected {
        tracing::warn!(
            "Account {}: {} rejected offer {}: {}",
            account.account_id,
            P::KIND,
            item.offer_id.as_deref().unwrap_or("<unknown>"),
            item.message
        );
    }
    Ok(ack)
}

pub struct Uploader {
    client: Arc<dyn MarketplaceClient>,
    retry: RetryPolicy,
    /// Сколько пачек может быть в полете одновременно (1 = строго по очереди)
    concurrency: usize,
}

impl Uploader {
    pub fn new(client: Arc<dyn MarketplaceClient>, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            client,
            retry,
            concurrency,
        }
    }

    pub async fn upload_stocks(
        &self,
        account: &AccountConfig,
        entries: &[StockEntry],
    ) -> Result<UploadSummary, SyncError> {
        self.upload(account, entries, account.stock_batch_size).await
    }

    pub async fn upload_prices(
        &self,
        account: &AccountConfig,
        entries: &[PriceEntry],
    ) -> Result<UploadSummary, SyncError> {
        self.upload(account, entries, account.price_batch_size).await
    }

    async fn upload<P: Payload>(
        &self,
        account: &AccountConfig,
        entries: &[P],
        batch_size: usize,
    ) -> Result<UploadSummary, SyncError> {
        let chunks = chunk(entries, batch_size)?;
        let total = entries.len().div_ceil(batch_size);

        let summary = if self.concurrency <= 1 {
            let mut summary = UploadSummary::default();
            for (index, batch) in chunks.enumerate() {
                let label = format!("{} chunk {}/{}", P::KIND, index + 1, total);
                let ack =
                    send_chunk(self.client.as_ref(), &self.retry, account, batch, &label).await?;
                summary.record(batch.len(), ack);
            }
            summary
        } else {
            self.upload_concurrent(account, chunks, total).await?
        };

        tracing::info!(
            "Account {}: uploaded {} {} in {} chunks ({} rejected)",
            account.account_id,
            summary.entries,
            P::KIND,
            summary.chunks,
            summary.rejected.len()
        );
        Ok(summary)
    }

    /// Пачки отправляются по порядку, в полете не больше `concurrency`.
    /// После первой ошибки новые пачки не отправляются, уже отправленные дожидаются.
    /// Задачи живут в `JoinSet`: если выгрузку бросили (таймаут кабинета), они отменяются.
    async fn upload_concurrent<P: Payload>(
        &self,
        account: &AccountConfig,
        chunks: std::slice::Chunks<'_, P>,
        total: usize,
    ) -> Result<UploadSummary, SyncError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for (index, batch) in chunks.enumerate() {
            let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                MarketplaceError::Transport {
                    endpoint: P::KIND.to_string(),
                    message: e.to_string(),
                }
            })?;
            if failed.load(Ordering::SeqCst) {
                tracing::warn!(
                    "Account {}: {} upload failed, skipping remaining chunks from {}/{}",
                    account.account_id,
                    P::KIND,
                    index + 1,
                    total
                );
                break;
            }

            let client = self.client.clone();
            let retry = self.retry.clone();
            let account = account.clone();
            let batch = batch.to_vec();
            let failed = failed.clone();
            let label = format!("{} chunk {}/{}", P::KIND, index + 1, total);

            tasks.spawn(async move {
                let _permit = permit;
                let result = send_chunk(client.as_ref(), &retry, &account, &batch, &label).await;
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                (index, result.map(|ack| (batch.len(), ack)))
            });
        }

        let mut finished = Vec::new();
        let mut first_error: Option<(usize, MarketplaceError)> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(done))) => finished.push((index, done)),
                Ok((index, Err(e))) => {
                    if first_error.as_ref().map_or(true, |(first, _)| index < *first) {
                        first_error = Some((index, e));
                    }
                }
                Err(e) => {
                    tracing::error!("Account {}: upload task failed: {}", account.account_id, e);
                    first_error.get_or_insert((
                        usize::MAX,
                        MarketplaceError::Transport {
                            endpoint: P::KIND.to_string(),
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }

        if let Some((_, e)) = first_error {
            return Err(e.into());
        }

        finished.sort_by_key(|(index, _)| *index);
        let mut summary = UploadSummary::default();
        for (_, (entries, ack)) in finished {
            summary.record(entries, ack);
        }
        Ok(summary)
    }
}
