pub mod error;
pub mod ozon;
pub(crate) mod transport;
pub mod yandex_market;

pub use error::MarketplaceError;

use async_trait::async_trait;
use contracts::enums::MarketplaceType;
use contracts::usecases::u508_sync_remnants::{AccountConfig, PriceEntry, StockEntry};
use std::sync::Arc;
use std::time::Duration;

/// Одна страница каталога предложений
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferPage {
    pub offer_ids: Vec<String>,
    /// Курсор следующей страницы (пустой или None = страниц больше нет для CursorToken)
    pub next_cursor: Option<String>,
    /// Общее количество предложений в каталоге, если API его сообщает
    pub total: Option<u64>,
}

/// Позиция, которую маркетплейс отказался принять
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedItem {
    pub offer_id: Option<String>,
    pub message: String,
}

/// Подтверждение приема пачки
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub rejected: Vec<RejectedItem>,
}

/// Трейт для клиентов маркетплейсов: каталог предложений и выгрузка остатков/цен
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    fn marketplace(&self) -> MarketplaceType;

    /// Получить страницу артикулов каталога
    async fn list_offer_ids(
        &self,
        account: &AccountConfig,
        cursor: &str,
        limit: u32,
    ) -> Result<OfferPage, MarketplaceError>;

    /// Обновить остатки (одна пачка)
    async fn update_stocks(
        &self,
        account: &AccountConfig,
        batch: &[StockEntry],
    ) -> Result<Ack, MarketplaceError>;

    /// Обновить цены (одна пачка)
    async fn update_prices(
        &self,
        account: &AccountConfig,
        batch: &[PriceEntry],
    ) -> Result<Ack, MarketplaceError>;
}

/// Создать клиента для маркетплейса
pub fn build_client(
    marketplace: MarketplaceType,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn MarketplaceClient>> {
    let client: Arc<dyn MarketplaceClient> = match marketplace {
        MarketplaceType::Ozon => Arc::new(ozon::OzonClient::new(timeout)?),
        MarketplaceType::YandexMarket => Arc::new(yandex_market::YandexMarketClient::new(timeout)?),
    };
    Ok(client)
}
