use thiserror::Error;

use crate::store::StoreKind;

/// A page could not be retrieved. Recovered per store.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("{url} returned no content")]
    EmptyBody { url: String },
    #[error("fetch of {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
}

/// The page did not look like a product listing at all. Recovered per store.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no product containers found on {store} page")]
    NoProductContainers { store: StoreKind },
}

/// Why a raw pair was dropped before entering the batch. Recovered per record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("empty item name")]
    EmptyName,
    #[error("unparsable price {text:?}")]
    UnparsablePrice { text: String },
}

/// Durable store read or write failed. Recovered per record.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Run-level failure; the only error that aborts a crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("no products collected from any of {stores} stores")]
    Systemic { stores: usize },
}
