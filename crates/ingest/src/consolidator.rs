//! Dataset consolidator — merges normalized batches from every supplied
//! source into one dataset, applying the requested date and platform
//! filters and scanning for data-quality anomalies.

use crate::normalizer::NormalizedBatch;
use adpulse_core::{
    AnomalyKind, ConsolidatedDataset, DataAnomaly, DateRange, Platform, UnavailableSource,
};
use std::collections::HashSet;
use tracing::info;

/// Accumulates normalized batches and failed sources, then builds the
/// consolidated dataset. No source is required; zero sources build an
/// empty dataset that downstream stages answer with explicit
/// insufficient-data markers.
#[derive(Debug, Default)]
pub struct Consolidator {
    batches: Vec<NormalizedBatch>,
    unavailable: Vec<UnavailableSource>,
}

impl Consolidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&mut self, batch: NormalizedBatch) {
        self.batches.push(batch);
    }

    pub fn add_unavailable(&mut self, platform: Platform, reason: impl Into<String>) {
        self.unavailable.push(UnavailableSource {
            platform,
            reason: reason.into(),
        });
    }

    /// Merge everything accumulated so far into one dataset.
    ///
    /// Records outside `range` are excluded; batches for platforms outside
    /// `platforms` (when given) are skipped entirely. Duplicate rows are
    /// kept; overlapping re-uploads sum into the aggregates downstream.
    pub fn build(
        self,
        range: Option<DateRange>,
        platforms: Option<&[Platform]>,
    ) -> ConsolidatedDataset {
        let mut dataset = ConsolidatedDataset {
            unavailable_sources: self.unavailable,
            ..Default::default()
        };

        for batch in self.batches {
            if platforms.is_some_and(|wanted| !wanted.contains(&batch.platform)) {
                continue;
            }
            dataset.malformed_cells += batch.malformed_cells;
            dataset.dropped_rows += batch.dropped_rows;
            if batch.malformed_cells > 0 {
                dataset.anomalies.push(DataAnomaly {
                    kind: AnomalyKind::MalformedCells,
                    subject: batch.platform.to_string(),
                    detail: format!(
                        "{} cells failed numeric coercion and were zeroed",
                        batch.malformed_cells
                    ),
                });
            }

            let kept = batch
                .records
                .into_iter()
                .filter(|r| range.is_none_or(|range| range.contains(r.date)));
            for record in kept {
                *dataset.records_by_source.entry(record.platform).or_insert(0) += 1;
                dataset.records.push(record);
            }
        }

        scan_anomalies(&mut dataset);

        info!(
            records = dataset.records.len(),
            sources = dataset.records_by_source.len(),
            unavailable = dataset.unavailable_sources.len(),
            malformed_cells = dataset.malformed_cells,
            "Dataset consolidated"
        );
        dataset
    }
}

/// Flag campaigns reporting more clicks than impressions. Tolerated, never
/// corrected; the caller sees the note alongside the metrics.
fn scan_anomalies(dataset: &mut ConsolidatedDataset) {
    let mut flagged: HashSet<(Platform, String)> = HashSet::new();
    for record in &dataset.records {
        if record.clicks > record.impressions {
            let key = (record.platform, record.campaign_name.clone());
            if flagged.insert(key) {
                dataset.anomalies.push(DataAnomaly {
                    kind: AnomalyKind::ClicksExceedImpressions,
                    subject: format!("{}/{}", record.platform, record.campaign_name),
                    detail: format!(
                        "clicks {} exceed impressions {} on {}",
                        record.clicks, record.impressions, record.date
                    ),
                });
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
