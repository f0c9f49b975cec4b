//! Полный снимок каталога предложений кабинета.

use super::error::SyncError;
use super::retry::RetryPolicy;
use crate::shared::marketplaces::{MarketplaceClient, MarketplaceError};
use contracts::usecases::u508_sync_remnants::{AccountConfig, OfferId, PaginationStrategy};
use std::collections::HashSet;
use std::sync::Arc;

/// Артикулы каталога в порядке получения, без повторов
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    offer_ids: Vec<OfferId>,
    index: HashSet<OfferId>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить артикул. Повторы игнорируются, возвращает true для нового.
    pub fn insert(&mut self, offer_id: OfferId) -> bool {
        if self.index.contains(&offer_id) {
            return false;
        }
        self.index.insert(offer_id.clone());
        self.offer_ids.push(offer_id);
        true
    }

    pub fn contains(&self, offer_id: &str) -> bool {
        self.index.contains(offer_id)
    }

    pub fn len(&self) -> usize {
        self.offer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offer_ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OfferId> {
        self.offer_ids.iter()
    }
}

impl<S: Into<OfferId>> FromIterator<S> for CatalogSnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut snapshot = CatalogSnapshot::new();
        for offer_id in iter {
            snapshot.insert(offer_id.into());
        }
        snapshot
    }
}

pub struct CatalogFetcher {
    client: Arc<dyn MarketplaceClient>,
    retry: RetryPolicy,
}

impl CatalogFetcher {
    pub fn new(client: Arc<dyn MarketplaceClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Получить все артикулы кабинета, проходя страницы до конца.
    ///
    /// Повтор уже виденного курсора считается зацикливанием API и прерывает обход.
    pub async fn fetch_all_offer_ids(
        &self,
        account: &AccountConfig,
    ) -> Result<CatalogSnapshot, SyncError> {
        if account.page_limit == 0 {
            return Err(SyncError::InvalidArgument(
                "page limit must be greater than zero".to_string(),
            ));
        }

        let mut snapshot = CatalogSnapshot::new();
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut cursor = String::new();
        let mut received: u64 = 0;
        let mut page_number = 0;

        loop {
            page_number += 1;
            let page = self
                .retry
                .run("list offers", || {
                    self.client
                        .list_offer_ids(account, &cursor, account.page_limit)
                })
                .await?;

            let page_len = page.offer_ids.len();
            received += page_len as u64;
            for offer_id in page.offer_ids {
                snapshot.insert(offer_id);
            }

            tracing::debug!(
                "Account {}: catalog page {} returned {} offers (received {}, total {:?})",
                account.account_id,
                page_number,
                page_len,
                received,
                page.total
            );

            if page_len == 0 {
                break;
            }

            if account.pagination_strategy == PaginationStrategy::OffsetCount {
                let total = page.total.ok_or_else(|| MarketplaceError::Decode {
                    endpoint: "list offers".to_string(),
                    message: "page has no total count".to_string(),
                })?;
                if received >= total {
                    break;
                }
            }

            let next = match page.next_cursor {
                Some(next) if !next.is_empty() => next,
                _ => break,
            };

            if next == cursor || !seen_cursors.insert(next.clone()) {
                tracing::error!(
                    "Account {}: page cursor did not change, stopping to prevent infinite loop",
                    account.account_id
                );
                return Err(SyncError::PaginationStalled {
                    account_id: account.account_id.clone(),
                    cursor: next,
                });
            }
            cursor = next;
        }

        tracing::info!(
            "Account {}: catalog contains {} offers ({} pages)",
            account.account_id,
            snapshot.len(),
            page_number
        );
        Ok(snapshot)
    }
}
