use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::product::CrawlBatch;
use crate::store::StoreKind;

#[derive(Serialize)]
struct Snapshot<'a> {
    crawl_timestamp: DateTime<Utc>,
    total_products: usize,
    products: Vec<SnapshotEntry<'a>>,
}

#[derive(Serialize)]
struct SnapshotEntry<'a> {
    store: StoreKind,
    item_name: &'a str,
    price_text: &'a str,
}

/// `egg_prices_YYYYMMDD_HHMMSS.json` in `dir`, stamped with the crawl time.
pub fn default_path(dir: &Path, crawl_timestamp: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "egg_prices_{}.json",
        crawl_timestamp.format("%Y%m%d_%H%M%S")
    ))
}

/// Write the batch, unchanged and in crawl order, as pretty JSON.
pub fn write_snapshot(batch: &CrawlBatch, path: &Path) -> Result<()> {
    let snapshot = Snapshot {
        crawl_timestamp: batch.crawl_timestamp,
        total_products: batch.len(),
        products: batch
            .records
            .iter()
            .map(|r| SnapshotEntry {
                store: r.store,
                item_name: &r.item_name,
                price_text: &r.price_text,
            })
            .collect(),
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write snapshot {:?}", path))?;

    info!("Results saved to {}", path.display());
    Ok(())
}
