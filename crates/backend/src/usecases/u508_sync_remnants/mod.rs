pub mod batcher;
pub mod catalog_fetcher;
pub mod error;
pub mod executor;
pub mod mappers;
pub mod progress_tracker;
pub mod reconciler;
pub mod remnant_source;
pub mod retry;
pub mod uploader;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{SyncError, SyncErrorKind};
pub use executor::{FailurePolicy, SyncExecutor, SyncSettings, SyncTarget};
pub use remnant_source::{
    RemnantLocation, RemnantSource, SpreadsheetLayout, SpreadsheetRemnantSource,
};
pub use retry::RetryPolicy;
