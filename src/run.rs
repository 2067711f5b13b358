use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::crawl::{crawl, CrawlOptions};
use crate::fetch::PageFetcher;
use crate::product::CrawlBatch;
use crate::reconcile::{reconcile, ProductSink, ReconcileStats};
use crate::snapshot;
use crate::store::StoreKind;

/// Outcome of one full crawl.
#[derive(Debug)]
pub struct RunReport {
    pub batch: CrawlBatch,
    pub snapshot_path: PathBuf,
    /// `None` when no sink was given.
    pub reconciled: Option<ReconcileStats>,
}

/// Crawl every store, write the snapshot, then reconcile into `sink`.
///
/// A systemic crawl failure returns before anything is written. Without an
/// explicit `snapshot` path the file lands in `snapshot_dir` under the crawl
/// timestamp.
pub async fn run<F, S>(
    fetcher: &F,
    sink: Option<&S>,
    snapshot: Option<PathBuf>,
    snapshot_dir: &Path,
    opts: &CrawlOptions,
) -> Result<RunReport>
where
    F: PageFetcher,
    S: ProductSink + ?Sized,
{
    let batch = crawl(fetcher, &StoreKind::ALL, opts).await?;

    let snapshot_path =
        snapshot.unwrap_or_else(|| snapshot::default_path(snapshot_dir, batch.crawl_timestamp));
    snapshot::write_snapshot(&batch, &snapshot_path)?;

    let reconciled = sink.map(|sink| reconcile(&batch, sink));

    Ok(RunReport {
        batch,
        snapshot_path,
        reconciled,
    })
}
