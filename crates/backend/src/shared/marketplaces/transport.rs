use super::error::MarketplaceError;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Обертка над reqwest::Client: отправка, классификация статуса, разбор JSON, логирование
pub(crate) struct ApiTransport {
    client: reqwest::Client,
    api_name: &'static str,
}

impl ApiTransport {
    pub fn new(api_name: &'static str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_name })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Выполнить запрос и разобрать JSON-ответ
    pub async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, MarketplaceError> {
        tracing::debug!("{} API request: {}", self.api_name, endpoint);

        let response = request
            .send()
            .await
            .map_err(|e| MarketplaceError::from_reqwest(endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                "{} API request {} failed with status {}: {}",
                self.api_name,
                endpoint,
                status,
                preview(&body)
            );
            return Err(MarketplaceError::from_status(
                endpoint,
                status.as_u16(),
                retry_after,
                body,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketplaceError::from_reqwest(endpoint, &e))?;
        tracing::debug!("{} API response preview: {}", self.api_name, preview(&body));

        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::error!("Failed to parse {} API response. Error: {}", self.api_name, e);
            MarketplaceError::Decode {
                endpoint: endpoint.to_string(),
                message: format!("{}. Response: {}", e, preview(&body)),
            }
        })
    }
}

/// Первые 500 символов тела ответа для логов
pub(crate) fn preview(body: &str) -> String {
    let head: String = body.chars().take(500).collect();
    if head.len() < body.len() {
        format!("{}...", head)
    } else {
        head
    }
}
