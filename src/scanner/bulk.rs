//! Bulk analysis
//!
//! Fans a batch of targets out over the [`SiteAnalyzer`], one task per
//! target. A failure (or panic) in one task never affects its siblings, and
//! results come back in input order.

use crate::scanner::analyzer::{ScanResult, SiteAnalyzer};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

/// Targets beyond this many are dropped; callers chunk larger lists themselves
pub const MAX_BULK_URLS: usize = 20;

/// Analyzes up to [`MAX_BULK_URLS`] targets concurrently
pub async fn analyze_bulk(analyzer: &SiteAnalyzer, urls: &[String]) -> Vec<ScanResult> {
    analyze_bulk_with_progress(analyzer, urls, |_, _| {}).await
}

/// Like [`analyze_bulk`], calling `on_progress(finished, total)` as each target completes
///
/// # Returns
///
/// One result per accepted target, in input order
pub async fn analyze_bulk_with_progress<F>(
    analyzer: &SiteAnalyzer,
    urls: &[String],
    mut on_progress: F,
) -> Vec<ScanResult>
where
    F: FnMut(usize, usize),
{
    let batch = &urls[..urls.len().min(MAX_BULK_URLS)];
    if urls.len() > batch.len() {
        warn!(
            "Bulk analysis truncated from {} to {} targets",
            urls.len(),
            batch.len()
        );
    }
    info!("Analyzing {} targets", batch.len());

    let mut running: FuturesUnordered<_> = batch
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let analyzer = analyzer.clone();
            let url = url.clone();
            let handle = tokio::spawn(async move { analyzer.analyze(&url).await });
            async move { (index, handle.await) }
        })
        .collect();

    let mut slots: Vec<Option<ScanResult>> = vec![None; batch.len()];
    let mut finished = 0;

    while let Some((index, joined)) = running.next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("Analysis task for {} died: {}", batch[index], e);
                ScanResult::failed(batch[index].clone(), format!("Chyba: {}", e))
            }
        };
        slots[index] = Some(result);
        finished += 1;
        on_progress(finished, batch.len());
    }

    let complete = slots.iter().flatten().filter(|r| r.is_complete()).count();
    info!(
        "Bulk analysis finished: {} complete, {} failed",
        complete,
        batch.len() - complete
    );

    slots
        .into_iter()
        .zip(batch)
        .map(|(slot, url)| slot.unwrap_or_else(|| ScanResult::failed(url.clone(), "Chyba")))
        .collect()
}
