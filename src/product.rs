use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::store::StoreKind;

/// One accepted observation from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub store: StoreKind,
    pub item_name: String,
    pub price_text: String,
    pub price_value: Decimal,
}

impl ProductRecord {
    pub fn key(&self) -> ProductKey {
        ProductKey::new(self.store, &self.item_name)
    }
}

/// Everything one run collected, in crawl order.
#[derive(Debug, Clone)]
pub struct CrawlBatch {
    pub crawl_timestamp: DateTime<Utc>,
    pub records: Vec<ProductRecord>,
}

impl CrawlBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn for_store(&self, store: StoreKind) -> impl Iterator<Item = &ProductRecord> {
        self.records.iter().filter(move |r| r.store == store)
    }
}

/// Hex SHA-256 of `"{store}_{item_name}"`. Case-sensitive: a renamed
/// product on the retailer's side becomes a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey(String);

impl ProductKey {
    pub fn new(store: StoreKind, item_name: &str) -> Self {
        let digest = Sha256::digest(format!("{}_{}", store.display_name(), item_name).as_bytes());
        ProductKey(format!("{:x}", digest))
    }

    /// Wrap a key read back from storage.
    pub fn from_stored(raw: String) -> Self {
        ProductKey(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable state for one distinct product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedProduct {
    pub key: ProductKey,
    pub store: StoreKind,
    pub item_name: String,
    pub price: Decimal,
    pub price_text: String,
    pub created_at: DateTime<Utc>,
    pub last_crawl_at: DateTime<Utc>,
}
