//! Фейковые маркетплейс и прайс для тестов движка синхронизации.

use super::remnant_source::{RemnantSource, RemnantSourceError};
use crate::shared::marketplaces::{
    Ack, MarketplaceClient, MarketplaceError, OfferPage, RejectedItem,
};
use async_trait::async_trait;
use contracts::enums::MarketplaceType;
use contracts::usecases::u508_sync_remnants::{
    AccountConfig, PriceEntry, RemnantRecord, StockEntry,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub fn transport_error() -> MarketplaceError {
    MarketplaceError::Transport {
        endpoint: "fake".into(),
        message: "connection reset".into(),
    }
}

pub fn auth_error() -> MarketplaceError {
    MarketplaceError::Auth {
        endpoint: "fake".into(),
        status: 401,
        body: "invalid token".into(),
    }
}

/// Маркетплейс со сценарием: страницы каталога по курсору, очереди ошибок, журнал вызовов
pub struct FakeMarketplaceClient {
    marketplace: MarketplaceType,
    pages: HashMap<String, OfferPage>,
    list_delay: Duration,
    upload_delay: Duration,
    list_failures: Mutex<VecDeque<MarketplaceError>>,
    stock_failures: Mutex<VecDeque<MarketplaceError>>,
    price_failures: Mutex<VecDeque<MarketplaceError>>,
    reject_offer: Option<String>,
    pub list_calls: Mutex<Vec<String>>,
    pub stock_batches: Mutex<Vec<Vec<StockEntry>>>,
    pub price_batches: Mutex<Vec<Vec<PriceEntry>>>,
    /// Порядок вызовов выгрузки: "stocks" / "prices"
    pub upload_log: Mutex<Vec<&'static str>>,
}

impl FakeMarketplaceClient {
    pub fn new(marketplace: MarketplaceType) -> Self {
        Self {
            marketplace,
            pages: HashMap::new(),
            list_delay: Duration::ZERO,
            upload_delay: Duration::ZERO,
            list_failures: Mutex::new(VecDeque::new()),
            stock_failures: Mutex::new(VecDeque::new()),
            price_failures: Mutex::new(VecDeque::new()),
            reject_offer: None,
            list_calls: Mutex::new(Vec::new()),
            stock_batches: Mutex::new(Vec::new()),
            price_batches: Mutex::new(Vec::new()),
            upload_log: Mutex::new(Vec::new()),
        }
    }

    /// Весь каталог одной страницей
    pub fn with_catalog(self, offer_ids: &[&str]) -> Self {
        let total = offer_ids.len() as u64;
        self.with_page("", offer_ids, None, Some(total))
    }

    pub fn with_page(
        mut self,
        cursor: &str,
        offer_ids: &[&str],
        next_cursor: Option<&str>,
        total: Option<u64>,
    ) -> Self {
        self.pages.insert(
            cursor.to_string(),
            OfferPage {
                offer_ids: offer_ids.iter().map(|id| id.to_string()).collect(),
                next_cursor: next_cursor.map(str::to_string),
                total,
            },
        );
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Задержка перед записью каждой пачки остатков
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub fn fail_list(self, error: MarketplaceError) -> Self {
        self.list_failures.lock().unwrap().push_back(error);
        self
    }

    pub fn fail_stocks(self, error: MarketplaceError) -> Self {
        self.stock_failures.lock().unwrap().push_back(error);
        self
    }

    pub fn fail_prices(self, error: MarketplaceError) -> Self {
        self.price_failures.lock().unwrap().push_back(error);
        self
    }

    pub fn reject(mut self, offer_id: &str) -> Self {
        self.reject_offer = Some(offer_id.to_string());
        self
    }

    fn ack_for<'a>(&self, offer_ids: impl Iterator<Item = &'a str>) -> Ack {
        let rejected = offer_ids
            .filter(|id| self.reject_offer.as_deref() == Some(*id))
            .map(|id| RejectedItem {
                offer_id: Some(id.to_string()),
                message: "rejected by fake".into(),
            })
            .collect();
        Ack { rejected }
    }
}

#[async_trait]
impl MarketplaceClient for FakeMarketplaceClient {
    fn marketplace(&self) -> MarketplaceType {
        self.marketplace
    }

    async fn list_offer_ids(
        &self,
        _account: &AccountConfig,
        cursor: &str,
        _limit: u32,
    ) -> Result<OfferPage, MarketplaceError> {
        self.list_calls.lock().unwrap().push(cursor.to_string());
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        if let Some(error) = self.list_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.pages.get(cursor).cloned().unwrap_or_default())
    }

    async fn update_stocks(
        &self,
        _account: &AccountConfig,
        batch: &[StockEntry],
    ) -> Result<Ack, MarketplaceError> {
        self.upload_log.lock().unwrap().push("stocks");
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        if let Some(error) = self.stock_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.stock_batches.lock().unwrap().push(batch.to_vec());
        Ok(self.ack_for(batch.iter().map(|e| e.offer_id.as_str())))
    }

    async fn update_prices(
        &self,
        _account: &AccountConfig,
        batch: &[PriceEntry],
    ) -> Result<Ack, MarketplaceError> {
        self.upload_log.lock().unwrap().push("prices");
        if let Some(error) = self.price_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.price_batches.lock().unwrap().push(batch.to_vec());
        Ok(self.ack_for(batch.iter().map(|e| e.offer_id.as_str())))
    }
}

/// Прайс с заранее заданными строками
pub struct StaticRemnantSource {
    records: Vec<RemnantRecord>,
    fail: bool,
    pub calls: Mutex<u32>,
}

impl StaticRemnantSource {
    pub fn new(records: Vec<RemnantRecord>) -> Self {
        Self {
            records,
            fail: false,
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            fail: true,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl RemnantSource for StaticRemnantSource {
    async fn fetch_remnants(&self) -> Result<Vec<RemnantRecord>, RemnantSourceError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(RemnantSourceError::Download("supplier unreachable".into()));
        }
        Ok(self.records.clone())
    }
}
