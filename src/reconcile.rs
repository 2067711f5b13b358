use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::error::SinkError;
use crate::product::{CrawlBatch, PersistedProduct, ProductKey, ProductRecord};

/// Point read / point upsert over the durable product store.
pub trait ProductSink {
    fn read_by_key(&self, key: &ProductKey) -> Result<Option<PersistedProduct>, SinkError>;
    fn upsert(&self, product: &PersistedProduct) -> Result<(), SinkError>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl ReconcileStats {
    pub fn processed(&self) -> usize {
        self.created + self.updated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Created,
    Updated,
}

/// The state `record` should leave behind given what is stored now.
/// Key, store, name and `created_at` never change once a product exists.
pub fn plan_upsert(
    record: &ProductRecord,
    existing: Option<PersistedProduct>,
    crawled_at: DateTime<Utc>,
) -> PersistedProduct {
    match existing {
        Some(existing) => PersistedProduct {
            price: record.price_value,
            price_text: record.price_text.clone(),
            last_crawl_at: crawled_at,
            ..existing
        },
        None => PersistedProduct {
            key: record.key(),
            store: record.store,
            item_name: record.item_name.clone(),
            price: record.price_value,
            price_text: record.price_text.clone(),
            created_at: crawled_at,
            last_crawl_at: crawled_at,
        },
    }
}

/// Apply every record in the batch as an upsert. A failed read or write is
/// logged and counted; the remaining records are still applied.
pub fn reconcile<S: ProductSink + ?Sized>(batch: &CrawlBatch, sink: &S) -> ReconcileStats {
    info!("Reconciling {} products...", batch.len());
    let mut stats = ReconcileStats::default();

    for record in &batch.records {
        match reconcile_one(record, batch.crawl_timestamp, sink) {
            Ok(Change::Created) => {
                stats.created += 1;
                debug!("Created: {} from {} [{}]", record.item_name, record.store, record.key());
            }
            Ok(Change::Updated) => {
                stats.updated += 1;
                debug!("Updated: {} from {} [{}]", record.item_name, record.store, record.key());
            }
            Err(e) => {
                stats.failed += 1;
                error!("Error upserting product '{}': {}", record.item_name, e);
            }
        }
    }

    info!(
        "Processed {} products: {} new, {} updated, {} failed",
        stats.processed(),
        stats.created,
        stats.updated,
        stats.failed
    );
    stats
}

fn reconcile_one<S: ProductSink + ?Sized>(
    record: &ProductRecord,
    crawled_at: DateTime<Utc>,
    sink: &S,
) -> Result<Change, SinkError> {
    let existing = sink.read_by_key(&record.key())?;
    let change = if existing.is_some() {
        Change::Updated
    } else {
        Change::Created
    };
    sink.upsert(&plan_upsert(record, existing, crawled_at))?;
    Ok(change)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};

    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::StoreKind;

    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub rows: RefCell<BTreeMap<ProductKey, PersistedProduct>>,
        pub broken: HashSet<String>,
    }

    impl ProductSink for MemorySink {
        fn read_by_key(&self, key: &ProductKey) -> Result<Option<PersistedProduct>, SinkError> {
            Ok(self.rows.borrow().get(key).cloned())
        }

        fn upsert(&self, product: &PersistedProduct) -> Result<(), SinkError> {
            if self.broken.contains(&product.item_name) {
                return Err(SinkError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
            }
            self.rows.borrow_mut().insert(product.key.clone(), product.clone());
            Ok(())
        }
    }

    pub(crate) fn record(store: StoreKind, name: &str, cents: i64) -> ProductRecord {
        let price_value = Decimal::new(cents, 2);
        ProductRecord {
            store,
            item_name: name.to_string(),
            price_text: format!("${}", price_value),
            price_value,
        }
    }

    pub(crate) fn batch(at: DateTime<Utc>, records: Vec<ProductRecord>) -> CrawlBatch {
        CrawlBatch {
            crawl_timestamp: at,
            records,
        }
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    const FREE_RANGE: &str = "Free Range Eggs 12 Pack";

    #[test]
    fn first_sighting_creates() {
        let sink = MemorySink::default();
        let stats = reconcile(&batch(t(0), vec![record(StoreKind::Woolworths, FREE_RANGE, 899)]), &sink);

        assert_eq!(stats, ReconcileStats { created: 1, updated: 0, failed: 0 });
        let rows = sink.rows.borrow();
        let row = rows.values().next().unwrap();
        assert_eq!(row.key, ProductKey::new(StoreKind::Woolworths, FREE_RANGE));
        assert_eq!(row.price, Decimal::new(899, 2));
        assert_eq!(row.created_at, t(0));
        assert_eq!(row.last_crawl_at, t(0));
    }

    #[test]
    fn later_crawl_updates_price_keeps_created_at() {
        let sink = MemorySink::default();
        reconcile(&batch(t(0), vec![record(StoreKind::Woolworths, FREE_RANGE, 899)]), &sink);
        let stats = reconcile(&batch(t(1), vec![record(StoreKind::Woolworths, FREE_RANGE, 949)]), &sink);

        assert_eq!(stats.updated, 1);
        let rows = sink.rows.borrow();
        assert_eq!(rows.len(), 1);
        let row = rows.values().next().unwrap();
        assert_eq!(row.price, Decimal::new(949, 2));
        assert_eq!(row.price_text, "$9.49");
        assert_eq!(row.last_crawl_at, t(1));
        assert_eq!(row.created_at, t(0));
    }

    #[test]
    fn same_batch_twice_is_idempotent() {
        let sink = MemorySink::default();
        let b = batch(
            t(0),
            vec![
                record(StoreKind::Woolworths, FREE_RANGE, 899),
                record(StoreKind::PakNSave, FREE_RANGE, 850),
            ],
        );
        reconcile(&b, &sink);
        let before = sink.rows.borrow().clone();
        let stats = reconcile(&b, &sink);

        assert_eq!(stats, ReconcileStats { created: 0, updated: 2, failed: 0 });
        assert_eq!(*sink.rows.borrow(), before);
    }

    #[test]
    fn duplicate_key_in_batch_last_wins() {
        let sink = MemorySink::default();
        let stats = reconcile(
            &batch(
                t(0),
                vec![
                    record(StoreKind::PakNSave, FREE_RANGE, 800),
                    record(StoreKind::PakNSave, FREE_RANGE, 820),
                ],
            ),
            &sink,
        );

        assert_eq!(stats, ReconcileStats { created: 1, updated: 1, failed: 0 });
        let rows = sink.rows.borrow();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.values().next().unwrap().price, Decimal::new(820, 2));
    }

    #[test]
    fn failed_write_does_not_stop_batch() {
        let sink = MemorySink {
            broken: HashSet::from(["Barn Eggs 6pk".to_string()]),
            ..MemorySink::default()
        };
        let stats = reconcile(
            &batch(
                t(0),
                vec![
                    record(StoreKind::Woolworths, "Barn Eggs 6pk", 450),
                    record(StoreKind::Woolworths, FREE_RANGE, 899),
                ],
            ),
            &sink,
        );

        assert_eq!(stats, ReconcileStats { created: 1, updated: 0, failed: 1 });
        assert_eq!(sink.rows.borrow().len(), 1);
    }

    #[test]
    fn plan_keeps_identity_fields() {
        let existing = plan_upsert(&record(StoreKind::Woolworths, FREE_RANGE, 899), None, t(0));
        let next = plan_upsert(&record(StoreKind::Woolworths, FREE_RANGE, 100), Some(existing.clone()), t(5));
        assert_eq!(next.key, existing.key);
        assert_eq!(next.item_name, existing.item_name);
        assert_eq!(next.created_at, t(0));
        assert_eq!(next.last_crawl_at, t(5));
        assert_eq!(next.price, Decimal::new(100, 2));
    }
}
