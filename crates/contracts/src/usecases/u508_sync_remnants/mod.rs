pub mod account;
pub mod entries;
pub mod progress;
pub mod remnant;
pub mod request;
pub mod response;

pub use account::{AccountConfig, PaginationStrategy};
pub use entries::{OfferId, PriceEntry, StockEntry};
pub use progress::{
    AccountProgress, CyclePhase, CycleState, SyncErrorEntry, SyncProgress, SyncStatus,
};
pub use remnant::RemnantRecord;
pub use request::SyncRequest;
pub use response::{AccountSyncReport, SyncReport};
