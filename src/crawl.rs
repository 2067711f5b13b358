use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::{CrawlError, FetchError};
use crate::extract;
use crate::fetch::PageFetcher;
use crate::normalize::normalize;
use crate::product::{CrawlBatch, ProductRecord};
use crate::store::StoreKind;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Minimum pause between two store fetches.
    pub delay: Duration,
    pub fetch_timeout: Duration,
    /// Stores not started by this instant are skipped.
    pub deadline: Option<Instant>,
}

/// Visit each store in order and collect one batch.
///
/// A store that cannot be fetched or parsed contributes nothing and the run
/// moves on. The run only fails when every store came back empty.
pub async fn crawl<F: PageFetcher>(
    fetcher: &F,
    stores: &[StoreKind],
    opts: &CrawlOptions,
) -> Result<CrawlBatch, CrawlError> {
    let crawl_timestamp = Utc::now();
    info!("Starting crawl of {} stores...", stores.len());

    let pb = ProgressBar::new(stores.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:30} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut records = Vec::new();
    for (i, &store) in stores.iter().enumerate() {
        if i > 0 && !opts.delay.is_zero() {
            tokio::time::sleep(opts.delay).await;
        }
        // No fetch starts past the deadline.
        if opts.deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Run deadline reached, skipping {} remaining store(s)", stores.len() - i);
            break;
        }

        pb.set_message(store.display_name());
        records.extend(crawl_store(fetcher, store, opts.fetch_timeout).await);
        pb.inc(1);
    }
    pb.finish_and_clear();

    if records.is_empty() {
        return Err(CrawlError::Systemic {
            stores: stores.len(),
        });
    }

    info!("Total products found: {}", records.len());
    Ok(CrawlBatch {
        crawl_timestamp,
        records,
    })
}

/// fetch → extract → normalize for one store. Never fails; problems are
/// logged and yield fewer records.
async fn crawl_store<F: PageFetcher>(
    fetcher: &F,
    store: StoreKind,
    fetch_timeout: Duration,
) -> Vec<ProductRecord> {
    info!("Starting {} crawl...", store);
    let url = store.listing_url();

    let html = match fetch_with_timeout(fetcher, url, fetch_timeout).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Error crawling {}: {}", store, e);
            return Vec::new();
        }
    };

    let raw = match extract::extract(store, &html) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("{}. The page structure may have changed.", e);
            return Vec::new();
        }
    };
    if raw.is_empty() {
        info!("No matching products listed on {}", store);
    }

    let mut skipped = 0;
    let records: Vec<ProductRecord> = raw
        .iter()
        .filter_map(|pair| match normalize(store, pair) {
            Ok(record) => {
                info!("Found: {} - {}", record.item_name, record.price_text);
                Some(record)
            }
            Err(reason) => {
                skipped += 1;
                warn!("Skipping {:?} from {}: {}", pair.name, store, reason);
                None
            }
        })
        .collect();

    info!(
        "{} crawl completed. Found {} products ({} skipped).",
        store,
        records.len(),
        skipped
    );
    records
}

async fn fetch_with_timeout<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    limit: Duration,
) -> Result<String, FetchError> {
    tokio::time::timeout(limit, fetcher.fetch(url))
        .await
        .unwrap_or_else(|_| {
            Err(FetchError::Timeout {
                url: url.to_string(),
                secs: limit.as_secs(),
            })
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;

    /// Serves fixture pages by URL; unknown URLs fail like a dead network.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pages: HashMap<&'static str, String>,
        stall: Option<Duration>,
        pub calls: Mutex<Vec<(String, Instant)>>,
    }

    impl FakeFetcher {
        pub(crate) fn with_page(mut self, store: StoreKind, fixture: &str) -> Self {
            let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
            self.pages.insert(store.listing_url(), html);
            self
        }
    }

    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push((url.to_string(), Instant::now()));
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Request {
                url: url.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    pub(crate) fn opts() -> CrawlOptions {
        CrawlOptions {
            delay: Duration::ZERO,
            fetch_timeout: Duration::from_secs(5),
            deadline: None,
        }
    }

    #[tokio::test]
    async fn collects_both_stores_in_order() {
        let fetcher = FakeFetcher::default()
            .with_page(StoreKind::Woolworths, "woolworths")
            .with_page(StoreKind::PakNSave, "paknsave");

        let batch = crawl(&fetcher, &StoreKind::ALL, &opts()).await.unwrap();

        assert_eq!(batch.for_store(StoreKind::Woolworths).count(), 4);
        assert_eq!(batch.for_store(StoreKind::PakNSave).count(), 2);
        assert_eq!(batch.records[0].store, StoreKind::Woolworths);
        assert_eq!(batch.records.last().unwrap().store, StoreKind::PakNSave);

        let pams = batch
            .records
            .iter()
            .find(|r| r.item_name.starts_with("Pams"))
            .unwrap();
        assert_eq!(pams.item_name, "Pams Free Range Eggs Size 7 12pk");
        assert_eq!(pams.price_value, Decimal::new(949, 2));
    }

    #[tokio::test]
    async fn failed_store_does_not_stop_others() {
        let fetcher = FakeFetcher::default().with_page(StoreKind::PakNSave, "paknsave");

        let batch = crawl(&fetcher, &StoreKind::ALL, &opts()).await.unwrap();

        assert_eq!(batch.for_store(StoreKind::Woolworths).count(), 0);
        assert_eq!(batch.len(), 2);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unrecognized_layout_counts_as_zero() {
        let fetcher = FakeFetcher::default()
            .with_page(StoreKind::Woolworths, "unrecognized")
            .with_page(StoreKind::PakNSave, "paknsave");

        let batch = crawl(&fetcher, &StoreKind::ALL, &opts()).await.unwrap();
        assert!(batch.records.iter().all(|r| r.store == StoreKind::PakNSave));
    }

    #[tokio::test]
    async fn nothing_anywhere_is_systemic() {
        let fetcher = FakeFetcher::default().with_page(StoreKind::PakNSave, "unrecognized");

        let err = crawl(&fetcher, &StoreKind::ALL, &opts()).await.unwrap_err();
        assert!(matches!(err, CrawlError::Systemic { stores: 2 }));
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let fetcher = FakeFetcher {
            stall: Some(Duration::from_secs(5)),
            ..FakeFetcher::default()
        }
        .with_page(StoreKind::Woolworths, "woolworths");
        let opts = CrawlOptions {
            fetch_timeout: Duration::from_millis(20),
            ..opts()
        };

        let err = fetch_with_timeout(&fetcher, StoreKind::Woolworths.listing_url(), opts.fetch_timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn delay_between_stores() {
        let fetcher = FakeFetcher::default()
            .with_page(StoreKind::Woolworths, "woolworths")
            .with_page(StoreKind::PakNSave, "paknsave");
        let opts = CrawlOptions {
            delay: Duration::from_millis(60),
            ..opts()
        };

        crawl(&fetcher, &StoreKind::ALL, &opts).await.unwrap();

        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].1.duration_since(calls[0].1) >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn past_deadline_skips_remaining_stores() {
        let fetcher = FakeFetcher::default()
            .with_page(StoreKind::Woolworths, "woolworths")
            .with_page(StoreKind::PakNSave, "paknsave");
        let opts = CrawlOptions {
            deadline: Some(Instant::now()),
            ..opts()
        };

        let err = crawl(&fetcher, &StoreKind::ALL, &opts).await.unwrap_err();
        assert!(matches!(err, CrawlError::Systemic { .. }));
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deadline_passing_during_delay_skips_next_store() {
        let fetcher = FakeFetcher::default()
            .with_page(StoreKind::Woolworths, "woolworths")
            .with_page(StoreKind::PakNSave, "paknsave");
        let opts = CrawlOptions {
            delay: Duration::from_millis(150),
            deadline: Some(Instant::now() + Duration::from_millis(50)),
            ..opts()
        };

        let batch = crawl(&fetcher, &StoreKind::ALL, &opts).await.unwrap();

        assert_eq!(batch.len(), 4);
        assert_eq!(batch.for_store(StoreKind::PakNSave).count(), 0);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }
}
