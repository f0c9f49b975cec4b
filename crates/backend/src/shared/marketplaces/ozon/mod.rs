use super::transport::ApiTransport;
use super::{Ack, MarketplaceClient, MarketplaceError, OfferPage, RejectedItem};
use async_trait::async_trait;
use contracts::enums::MarketplaceType;
use contracts::usecases::u508_sync_remnants::{AccountConfig, PriceEntry, StockEntry};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api-seller.ozon.ru";

/// HTTP-клиент для работы с OZON Seller API
pub struct OzonClient {
    transport: ApiTransport,
    base_url: String,
}

impl OzonClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            transport: ApiTransport::new("OZON", timeout)?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn post<B: Serialize>(
        &self,
        account: &AccountConfig,
        path: &str,
        body: &B,
    ) -> (String, reqwest::RequestBuilder) {
        let url = format!("{}{}", self.base_url, path);
        let request = self
            .transport
            .client()
            .post(&url)
            .header("Client-Id", &account.account_id)
            .header("Api-Key", &account.token)
            .json(body);
        (url, request)
    }
}

#[async_trait]
impl MarketplaceClient for OzonClient {
    fn marketplace(&self) -> MarketplaceType {
        MarketplaceType::Ozon
    }

    /// POST /v2/product/list
    async fn list_offer_ids(
        &self,
        account: &AccountConfig,
        cursor: &str,
        limit: u32,
    ) -> Result<OfferPage, MarketplaceError> {
        let request_body = OzonProductListRequest {
            filter: OzonProductListFilter {
                visibility: "ALL".to_string(),
            },
            last_id: cursor.to_string(),
            limit,
        };

        let (url, request) = self.post(account, "/v2/product/list", &request_body);
        let response: OzonProductListResponse = self.transport.send(&url, request).await?;

        tracing::debug!(
            "OZON product list: {} items, total: {}, last_id: {:?}",
            response.result.items.len(),
            response.result.total,
            response.result.last_id
        );

        Ok(OfferPage {
            offer_ids: response
                .result
                .items
                .into_iter()
                .map(|item| item.offer_id)
                .collect(),
            next_cursor: Some(response.result.last_id).filter(|id| !id.is_empty()),
            total: Some(response.result.total),
        })
    }

    /// POST /v1/product/import/stocks
    async fn update_stocks(
        &self,
        account: &AccountConfig,
        batch: &[StockEntry],
    ) -> Result<Ack, MarketplaceError> {
        let request_body = OzonStocksRequest {
            stocks: batch
                .iter()
                .map(|entry| OzonStockItem {
                    offer_id: entry.offer_id.clone(),
                    stock: entry.quantity,
                    warehouse_id: entry.warehouse_id.clone(),
                })
                .collect(),
        };

        let (url, request) = self.post(account, "/v1/product/import/stocks", &request_body);
        let response: OzonImportResponse = self.transport.send(&url, request).await?;
        Ok(response.into_ack())
    }

    /// POST /v1/product/import/prices
    async fn update_prices(
        &self,
        account: &AccountConfig,
        batch: &[PriceEntry],
    ) -> Result<Ack, MarketplaceError> {
        let request_body = OzonPricesRequest {
            prices: batch
                .iter()
                .map(|entry| OzonPriceItem {
                    auto_action_enabled: "UNKNOWN".to_string(),
                    currency_code: entry.currency.clone(),
                    offer_id: entry.offer_id.clone(),
                    old_price: "0".to_string(),
                    price: entry.major_units_string(),
                })
                .collect(),
        };

        let (url, request) = self.post(account, "/v1/product/import/prices", &request_body);
        let response: OzonImportResponse = self.transport.send(&url, request).await?;
        Ok(response.into_ack())
    }
}

// ============================================================================
// Request/Response structures для OZON API
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonProductListRequest {
    pub filter: OzonProductListFilter,
    pub last_id: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonProductListFilter {
    pub visibility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonProductListResponse {
    pub result: OzonProductListResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonProductListResult {
    #[serde(default)]
    pub items: Vec<OzonProductItem>,
    pub total: u64,
    #[serde(default)]
    pub last_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonProductItem {
    pub offer_id: String,
    #[serde(default)]
    pub product_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonStocksRequest {
    pub stocks: Vec<OzonStockItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonStockItem {
    pub offer_id: String,
    pub stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonPricesRequest {
    pub prices: Vec<OzonPriceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonPriceItem {
    pub auto_action_enabled: String,
    pub currency_code: String,
    pub offer_id: String,
    pub old_price: String,
    pub price: String,
}

/// Ответ /v1/product/import/stocks и /v1/product/import/prices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonImportResponse {
    #[serde(default)]
    pub result: Vec<OzonImportResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonImportResult {
    #[serde(default)]
    pub offer_id: String,
    #[serde(default)]
    pub updated: bool,
    #[serde(default)]
    pub errors: Vec<OzonImportError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonImportError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl OzonImportResponse {
    fn into_ack(self) -> Ack {
        let rejected = self
            .result
            .into_iter()
            .filter(|r| !r.updated)
            .map(|r| {
                let message = if r.errors.is_empty() {
                    "not updated".to_string()
                } else {
                    r.errors
                        .iter()
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .collect::<Vec<_>>()
                        .join("; ")
                };
                RejectedItem {
                    offer_id: Some(r.offer_id),
                    message,
                }
            })
            .collect();
        Ack { rejected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn account() -> AccountConfig {
        AccountConfig::new(MarketplaceType::Ozon, "client-1").with_token("api-key")
    }

    fn client_for(server: &MockServer) -> OzonClient {
        OzonClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_list_offer_ids_sends_last_id_and_reads_total() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/product/list"))
            .and(header("Client-Id", "client-1"))
            .and(header("Api-Key", "api-key"))
            .and(body_json(serde_json::json!({
                "filter": { "visibility": "ALL" },
                "last_id": "",
                "limit": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {
                    "items": [
                        { "offer_id": "A", "product_id": 1 },
                        { "offer_id": "B", "product_id": 2 }
                    ],
                    "total": 2,
                    "last_id": "bnVsbA"
                }
            })))
            .mount(&server)
            .await;

        let page = client_for(&server)
            .list_offer_ids(&account(), "", 1000)
            .await
            .unwrap();

        assert_eq!(page.offer_ids, vec!["A", "B"]);
        assert_eq!(page.total, Some(2));
        assert_eq!(page.next_cursor.as_deref(), Some("bnVsbA"));
    }

    #[tokio::test]
    async fn test_update_prices_converts_to_rubles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/product/import/prices"))
            .and(body_json(serde_json::json!({
                "prices": [{
                    "auto_action_enabled": "UNKNOWN",
                    "currency_code": "RUB",
                    "offer_id": "A",
                    "old_price": "0",
                    "price": "5990"
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [{ "offer_id": "A", "updated": true, "errors": [] }]
            })))
            .mount(&server)
            .await;

        let ack = client_for(&server)
            .update_prices(
                &account(),
                &[PriceEntry {
                    offer_id: "A".into(),
                    price_minor_units: 599000,
                    currency: "RUB".into(),
                }],
            )
            .await
            .unwrap();
        assert!(ack.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_update_stocks_reports_rejected_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/product/import/stocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [
                    { "offer_id": "A", "updated": true, "errors": [] },
                    { "offer_id": "B", "updated": false, "errors": [
                        { "code": "NOT_FOUND", "message": "product not found" }
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let observed_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let batch = vec![
            StockEntry {
                offer_id: "A".into(),
                quantity: 100,
                warehouse_id: None,
                observed_at,
            },
            StockEntry {
                offer_id: "B".into(),
                quantity: 0,
                warehouse_id: None,
                observed_at,
            },
        ];

        let ack = client_for(&server)
            .update_stocks(&account(), &batch)
            .await
            .unwrap();
        assert_eq!(ack.rejected.len(), 1);
        assert_eq!(ack.rejected[0].offer_id.as_deref(), Some("B"));
        assert!(ack.rejected[0].message.contains("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_forbidden_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/product/list"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .list_offer_ids(&account(), "", 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketplaceError::Auth { status: 403, .. }));
    }
}
