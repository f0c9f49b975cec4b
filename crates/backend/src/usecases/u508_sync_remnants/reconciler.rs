//! Сверка прайса остатков с каталогом маркетплейса.
//!
//! Каждый артикул каталога получает ровно одну запись остатка: найденные в
//! прайсе идут в порядке прайса, остальные обнуляются в порядке каталога.

use super::catalog_fetcher::CatalogSnapshot;
use super::error::SyncError;
use super::mappers::{map_price, map_quantity, MappingError};
use chrono::{DateTime, SubsecRound, Utc};
use contracts::usecases::u508_sync_remnants::{
    AccountConfig, PriceEntry, RemnantRecord, StockEntry,
};
use std::collections::HashSet;

/// Результат сверки для одного кабинета
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub stock_entries: Vec<StockEntry>,
    pub price_entries: Vec<PriceEntry>,
}

/// Сверка с отметкой времени "сейчас"
pub fn reconcile(
    remnants: &[RemnantRecord],
    catalog: &CatalogSnapshot,
    account: &AccountConfig,
) -> Result<Reconciliation, SyncError> {
    reconcile_at(remnants, catalog, account, Utc::now())
}

/// Сверка с заданной отметкой времени (одна на весь цикл, с точностью до секунды)
pub fn reconcile_at(
    remnants: &[RemnantRecord],
    catalog: &CatalogSnapshot,
    account: &AccountConfig,
    observed_at: DateTime<Utc>,
) -> Result<Reconciliation, SyncError> {
    let observed_at = observed_at.trunc_subsecs(0);
    let mut matched: HashSet<&str> = HashSet::with_capacity(catalog.len());
    let mut stock_entries = Vec::with_capacity(catalog.len());
    let mut price_entries = Vec::new();

    for remnant in remnants {
        if !catalog.contains(&remnant.code) {
            continue;
        }

        let price_minor_units = map_price(&remnant.price_text)
            .and_then(|price| {
                price
                    .checked_mul(100)
                    .ok_or_else(|| MappingError::InvalidPrice(remnant.price_text.clone()))
            })
            .map_err(|source| SyncError::Mapping {
                code: remnant.code.clone(),
                source,
            })?;
        price_entries.push(PriceEntry {
            offer_id: remnant.code.clone(),
            price_minor_units,
            currency: account.currency.clone(),
        });

        if matched.contains(remnant.code.as_str()) {
            tracing::debug!(
                "Duplicate remnant code {}: stock already taken from the first row",
                remnant.code
            );
            continue;
        }

        let quantity =
            map_quantity(&remnant.quantity_descriptor).map_err(|source| SyncError::Mapping {
                code: remnant.code.clone(),
                source,
            })?;
        matched.insert(remnant.code.as_str());
        stock_entries.push(StockEntry {
            offer_id: remnant.code.clone(),
            quantity,
            warehouse_id: account.warehouse_id.clone(),
            observed_at,
        });
    }

    let matched_count = stock_entries.len();
    for offer_id in catalog.iter() {
        if matched.contains(offer_id.as_str()) {
            continue;
        }
        stock_entries.push(StockEntry {
            offer_id: offer_id.clone(),
            quantity: 0,
            warehouse_id: account.warehouse_id.clone(),
            observed_at,
        });
    }

    tracing::info!(
        "Account {}: {} offers matched, {} zeroed, {} prices",
        account.account_id,
        matched_count,
        stock_entries.len() - matched_count,
        price_entries.len()
    );

    Ok(Reconciliation {
        stock_entries,
        price_entries,
    })
}

/// Записи с ненулевым остатком (для отчета)
pub fn non_zero_stock(entries: &[StockEntry]) -> Vec<StockEntry> {
    entries.iter().filter(|e| e.quantity > 0).cloned().collect()
}
