use super::mappers::MappingError;
use super::remnant_source::RemnantSourceError;
use crate::shared::marketplaces::MarketplaceError;
use std::fmt;
use thiserror::Error;

/// Ошибки синхронизации остатков и цен
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),

    #[error(transparent)]
    Remnants(#[from] RemnantSourceError),

    #[error("remnant '{code}': {source}")]
    Mapping {
        code: String,
        #[source]
        source: MappingError,
    },

    /// Маркетплейс вернул уже встречавшийся курсор
    #[error("pagination stalled for account {account_id}: cursor '{cursor}' returned twice")]
    PaginationStalled { account_id: String, cursor: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("account cycle timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Стабильные имена видов ошибок для отчета
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    Transport,
    RateLimit,
    Auth,
    Http,
    Decode,
    PaginationStalled,
    InvalidQuantity,
    InvalidPrice,
    Download,
    Parse,
    InvalidArgument,
    Timeout,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::Transport => "TransportError",
            SyncErrorKind::RateLimit => "RateLimitError",
            SyncErrorKind::Auth => "AuthError",
            SyncErrorKind::Http => "HttpError",
            SyncErrorKind::Decode => "DecodeError",
            SyncErrorKind::PaginationStalled => "PaginationStalledError",
            SyncErrorKind::InvalidQuantity => "InvalidQuantityError",
            SyncErrorKind::InvalidPrice => "InvalidPriceError",
            SyncErrorKind::Download => "DownloadError",
            SyncErrorKind::Parse => "ParseError",
            SyncErrorKind::InvalidArgument => "InvalidArgumentError",
            SyncErrorKind::Timeout => "TimeoutError",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::Marketplace(e) => match e {
                MarketplaceError::Transport { .. } => SyncErrorKind::Transport,
                MarketplaceError::RateLimited { .. } => SyncErrorKind::RateLimit,
                MarketplaceError::Auth { .. } => SyncErrorKind::Auth,
                MarketplaceError::Http { .. } => SyncErrorKind::Http,
                MarketplaceError::Decode { .. } => SyncErrorKind::Decode,
            },
            SyncError::Remnants(e) => match e {
                RemnantSourceError::Download(_) => SyncErrorKind::Download,
                RemnantSourceError::Parse { .. } => SyncErrorKind::Parse,
            },
            SyncError::Mapping { source, .. } => match source {
                MappingError::InvalidQuantity(_) => SyncErrorKind::InvalidQuantity,
                MappingError::InvalidPrice(_) => SyncErrorKind::InvalidPrice,
            },
            SyncError::PaginationStalled { .. } => SyncErrorKind::PaginationStalled,
            SyncError::InvalidArgument(_) => SyncErrorKind::InvalidArgument,
            SyncError::Timeout { .. } => SyncErrorKind::Timeout,
        }
    }
}
