use super::transport::ApiTransport;
use super::{Ack, MarketplaceClient, MarketplaceError, OfferPage, RejectedItem};
use async_trait::async_trait;
use chrono::SecondsFormat;
use contracts::enums::MarketplaceType;
use contracts::usecases::u508_sync_remnants::{AccountConfig, PriceEntry, StockEntry};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.partner.market.yandex.ru";

/// HTTP-клиент для работы с Yandex Market Partner API (уровень кампании)
pub struct YandexMarketClient {
    transport: ApiTransport,
    base_url: String,
}

impl YandexMarketClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            transport: ApiTransport::new("Yandex Market", timeout)?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn campaign_url(&self, account: &AccountConfig, path: &str) -> String {
        format!("{}/campaigns/{}/{}", self.base_url, account.account_id, path)
    }

    fn authorize(
        &self,
        account: &AccountConfig,
        request: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", &account.token))
            .header("Accept", "application/json")
    }
}

#[async_trait]
impl MarketplaceClient for YandexMarketClient {
    fn marketplace(&self) -> MarketplaceType {
        MarketplaceType::YandexMarket
    }

    /// GET /campaigns/{campaignId}/offer-mapping-entries
    async fn list_offer_ids(
        &self,
        account: &AccountConfig,
        cursor: &str,
        limit: u32,
    ) -> Result<OfferPage, MarketplaceError> {
        #[derive(Serialize)]
        struct YandexListQueryParams<'a> {
            limit: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            page_token: Option<&'a str>,
        }

        let url = self.campaign_url(account, "offer-mapping-entries");
        let query = YandexListQueryParams {
            limit,
            page_token: Some(cursor).filter(|c| !c.is_empty()),
        };
        let request = self.authorize(account, self.transport.client().get(&url).query(&query));
        let response: YandexOfferMappingResponse = self.transport.send(&url, request).await?;

        let result = response.result;
        tracing::debug!(
            "Yandex Market offer mappings: {} items, nextPageToken: {:?}, total: {:?}",
            result.offer_mapping_entries.len(),
            result.paging.next_page_token,
            result.paging.total
        );

        Ok(OfferPage {
            offer_ids: result
                .offer_mapping_entries
                .into_iter()
                .map(|entry| entry.offer.shop_sku)
                .collect(),
            next_cursor: result.paging.next_page_token.filter(|t| !t.is_empty()),
            total: result.paging.total,
        })
    }

    /// PUT /campaigns/{campaignId}/offers/stocks
    async fn update_stocks(
        &self,
        account: &AccountConfig,
        batch: &[StockEntry],
    ) -> Result<Ack, MarketplaceError> {
        let request_body = YandexStocksRequest {
            skus: batch
                .iter()
                .map(|entry| YandexSkuStock {
                    sku: entry.offer_id.clone(),
                    warehouse_id: entry.warehouse_id.clone(),
                    items: vec![YandexStockItem {
                        count: entry.quantity,
                        item_type: "FIT".to_string(),
                        updated_at: entry
                            .observed_at
                            .to_rfc3339_opts(SecondsFormat::Secs, true),
                    }],
                })
                .collect(),
        };

        let url = self.campaign_url(account, "offers/stocks");
        let request = self.authorize(account, self.transport.client().put(&url).json(&request_body));
        let response: YandexStatusResponse = self.transport.send(&url, request).await?;
        Ok(response.into_ack())
    }

    /// POST /campaigns/{campaignId}/offer-prices/updates
    async fn update_prices(
        &self,
        account: &AccountConfig,
        batch: &[PriceEntry],
    ) -> Result<Ack, MarketplaceError> {
        let request_body = YandexPricesRequest {
            offers: batch
                .iter()
                .map(|entry| YandexOfferPrice {
                    id: entry.offer_id.clone(),
                    price: YandexPriceValue {
                        value: entry.major_units(),
                        currency_id: entry.currency.clone(),
                    },
                })
                .collect(),
        };

        let url = self.campaign_url(account, "offer-prices/updates");
        let request = self.authorize(account, self.transport.client().post(&url).json(&request_body));
        let response: YandexStatusResponse = self.transport.send(&url, request).await?;
        Ok(response.into_ack())
    }
}

// ============================================================================
// Request/Response structures для Yandex Market API
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexOfferMappingResponse {
    pub result: YandexOfferMappingResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexOfferMappingResult {
    #[serde(rename = "offerMappingEntries", default)]
    pub offer_mapping_entries: Vec<YandexOfferMappingEntry>,
    #[serde(default)]
    pub paging: YandexPaging,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexOfferMappingEntry {
    pub offer: YandexShopOffer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexShopOffer {
    #[serde(rename = "shopSku")]
    pub shop_sku: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YandexPaging {
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexStocksRequest {
    pub skus: Vec<YandexSkuStock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexSkuStock {
    pub sku: String,
    #[serde(rename = "warehouseId", skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    pub items: Vec<YandexStockItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexStockItem {
    pub count: u32,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexPricesRequest {
    pub offers: Vec<YandexOfferPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexOfferPrice {
    pub id: String,
    pub price: YandexPriceValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexPriceValue {
    pub value: f64,
    #[serde(rename = "currencyId")]
    pub currency_id: String,
}

/// Ответ на изменяющие запросы: {"status": "OK"} или {"status": "ERROR", "errors": [...]}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub errors: Vec<YandexApiError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl YandexStatusResponse {
    fn into_ack(self) -> Ack {
        Ack {
            rejected: self
                .errors
                .into_iter()
                .map(|e| RejectedItem {
                    offer_id: None,
                    message: format!("{}: {}", e.code, e.message),
                })
                .collect(),
        }
    }
}
