use crate::enums::MarketplaceType;
use serde::{Deserialize, Serialize};

/// Способ постраничного получения каталога
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Непрозрачный токен следующей страницы (Яндекс Маркет)
    CursorToken,
    /// Курсор last_id + общее количество total (Ozon)
    OffsetCount,
}

/// Настройки одного кабинета (кампании) маркетплейса
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Client-Id для Ozon, ID кампании для Яндекс Маркета
    pub account_id: String,
    /// Отображаемое имя ("Yandex FBS")
    pub label: String,
    pub marketplace: MarketplaceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    pub stock_batch_size: usize,
    pub price_batch_size: usize,
    pub page_limit: u32,
    pub pagination_strategy: PaginationStrategy,
    pub currency: String,
    /// Api-Key / Bearer token. Берется только из окружения.
    #[serde(skip)]
    pub token: String,
}

impl AccountConfig {
    /// Настройки с лимитами по умолчанию для маркетплейса
    pub fn new(marketplace: MarketplaceType, account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        let (pagination_strategy, page_limit, stock_batch_size, price_batch_size) =
            match marketplace {
                MarketplaceType::Ozon => (PaginationStrategy::OffsetCount, 1000, 100, 1000),
                MarketplaceType::YandexMarket => (PaginationStrategy::CursorToken, 200, 2000, 500),
            };

        Self {
            label: format!("{} {}", marketplace.display_name(), account_id),
            account_id,
            marketplace,
            warehouse_id: None,
            stock_batch_size,
            price_batch_size,
            page_limit,
            pagination_strategy,
            currency: marketplace.default_currency().to_string(),
            token: String::new(),
        }
    }

    pub fn with_warehouse(mut self, warehouse_id: impl Into<String>) -> Self {
        self.warehouse_id = Some(warehouse_id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("account_id", &self.account_id)
            .field("label", &self.label)
            .field("marketplace", &self.marketplace)
            .field("warehouse_id", &self.warehouse_id)
            .field("stock_batch_size", &self.stock_batch_size)
            .field("price_batch_size", &self.price_batch_size)
            .field("page_limit", &self.page_limit)
            .field("pagination_strategy", &self.pagination_strategy)
            .field("currency", &self.currency)
            .field("token", &"****")
            .finish()
    }
}
