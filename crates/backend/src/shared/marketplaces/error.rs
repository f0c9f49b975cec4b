use std::time::Duration;
use thiserror::Error;

/// Ошибки обращения к API маркетплейса
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// Таймаут, обрыв соединения и прочие сетевые сбои
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// HTTP 429
    #[error("rate limited by {endpoint} (retry after {retry_after:?})")]
    RateLimited {
        endpoint: String,
        retry_after: Option<Duration>,
    },

    /// HTTP 401 / 403
    #[error("authorization rejected by {endpoint} (HTTP {status}): {body}")]
    Auth {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Любой другой ответ не 2xx
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Ответ пришел, но не разбирается
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl MarketplaceError {
    /// Классификация неуспешного HTTP-статуса
    pub fn from_status(
        endpoint: impl Into<String>,
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    ) -> Self {
        let endpoint = endpoint.into();
        match status {
            401 | 403 => MarketplaceError::Auth {
                endpoint,
                status,
                body,
            },
            429 => MarketplaceError::RateLimited {
                endpoint,
                retry_after,
            },
            _ => MarketplaceError::Http {
                endpoint,
                status,
                body,
            },
        }
    }

    pub fn from_reqwest(endpoint: impl Into<String>, err: &reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if err.is_decode() {
            return MarketplaceError::Decode {
                endpoint,
                message: err.to_string(),
            };
        }

        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        MarketplaceError::Transport { endpoint, message }
    }

    /// Имеет ли смысл повторить запрос
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketplaceError::Transport { .. } | MarketplaceError::RateLimited { .. }
        )
    }

    /// Задержка, которую попросил сервер
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MarketplaceError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
