use super::progress::{CyclePhase, CycleState};
use crate::enums::MarketplaceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Итог синхронизации по всем кабинетам
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Количество строк в прайсе остатков
    pub remnant_count: usize,
    pub accounts: Vec<AccountSyncReport>,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.accounts
            .iter()
            .any(|a| a.state == CycleState::Failed)
    }

    pub fn failed_accounts(&self) -> impl Iterator<Item = &AccountSyncReport> {
        self.accounts
            .iter()
            .filter(|a| a.state == CycleState::Failed)
    }
}

/// Итог цикла одного кабинета
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSyncReport {
    pub account_id: String,
    pub label: String,
    pub marketplace: MarketplaceType,
    pub state: CycleState,
    /// Фаза, на которой цикл упал
    pub failed_phase: Option<CyclePhase>,
    /// Стабильное имя вида ошибки ("AuthError", "InvalidQuantityError", ...)
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub catalog_size: usize,
    pub stock_entries: usize,
    /// Остатки с ненулевым количеством (только для отчета, повторно не выгружаются)
    pub non_zero_stock: usize,
    pub price_entries: usize,
    pub stock_chunks: usize,
    pub price_chunks: usize,
    /// Позиции, отклоненные маркетплейсом при выгрузке
    pub rejected_items: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AccountSyncReport {
    pub fn pending(account_id: String, label: String, marketplace: MarketplaceType) -> Self {
        Self {
            account_id,
            label,
            marketplace,
            state: CycleState::Pending,
            failed_phase: None,
            error_kind: None,
            error_message: None,
            catalog_size: 0,
            stock_entries: 0,
            non_zero_stock: 0,
            price_entries: 0,
            stock_chunks: 0,
            price_chunks: 0,
            rejected_items: 0,
            started_at: None,
            finished_at: None,
        }
    }
}
