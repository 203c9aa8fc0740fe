//! Analysis pipeline — one invocation takes raw sources through
//! normalization, consolidation, metrics, funnel analysis, and
//! recommendation into a single superset report.
//!
//! Every stage is a pure in-memory transform; only the optional fetch path
//! touches I/O. Concurrent runs share nothing.

pub mod report;

pub use report::{AnalysisReport, SummaryMetrics};

use adpulse_analytics::{FunnelAnalyzer, MetricsEngine, SegmentDimensions};
use adpulse_core::{AnalysisConfig, DateRange, Platform, UnavailableSource};
use adpulse_ingest::fetch::{SourceHub, SourceOutcome};
use adpulse_ingest::normalizer::{RawRow, RecordNormalizer};
use adpulse_ingest::Consolidator;
use adpulse_insights::{ActionPlanComposer, RecommendationEngine};
use tracing::{info, warn};

/// Raw rows from one source, tagged with the platform that produced them.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub platform: Platform,
    pub rows: Vec<RawRow>,
}

/// Everything one analysis run consumes.
#[derive(Debug, Default)]
pub struct SourceSet {
    pub sources: Vec<RawSource>,
    pub unavailable: Vec<UnavailableSource>,
    pub date_range: Option<DateRange>,
    /// Device/duration breakdowns for funnel cause attribution, when the
    /// caller has them.
    pub segment_dimensions: Option<SegmentDimensions>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, platform: Platform, rows: Vec<RawRow>) -> &mut Self {
        self.sources.push(RawSource { platform, rows });
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_segment_dimensions(mut self, dimensions: SegmentDimensions) -> Self {
        self.segment_dimensions = Some(dimensions);
        self
    }

    /// Fold fetch outcomes in: successful sources become raw inputs, failed
    /// ones are carried as unavailable.
    pub fn extend_from_outcomes(&mut self, outcomes: Vec<SourceOutcome>) {
        for outcome in outcomes {
            match outcome {
                SourceOutcome::Rows { platform, rows } => {
                    self.sources.push(RawSource { platform, rows });
                }
                SourceOutcome::Unavailable { platform, reason } => {
                    self.unavailable.push(UnavailableSource { platform, reason });
                }
            }
        }
    }
}

/// The full consolidation → metrics → funnel → recommendation → plan run.
pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline over already-fetched sources. Pure and synchronous;
    /// a source whose schema cannot be normalized degrades to unavailable
    /// while the rest proceed.
    pub fn run(&self, input: SourceSet) -> AnalysisReport {
        let normalizer = RecordNormalizer::new();
        let mut consolidator = Consolidator::new();

        for source in input.sources {
            match normalizer.normalize(source.platform, &source.rows) {
                Ok(batch) => consolidator.add_batch(batch),
                Err(e) => {
                    warn!(platform = %source.platform, error = %e, "Source rejected at normalization");
                    consolidator.add_unavailable(source.platform, e.to_string());
                }
            }
        }
        for unavailable in input.unavailable {
            consolidator.add_unavailable(unavailable.platform, unavailable.reason);
        }

        let dataset = consolidator.build(
            input.date_range,
            self.config.platforms_requested.as_deref(),
        );

        let metrics = MetricsEngine::new(&self.config).analyze(&dataset);
        let funnel = FunnelAnalyzer::new(&self.config.funnel)
            .analyze(&dataset, input.segment_dimensions.as_ref());
        let recommendations =
            RecommendationEngine::new(&self.config).generate(&metrics, &funnel);
        let action_plan =
            ActionPlanComposer::new(&self.config).compose(&recommendations, &metrics);

        info!(
            records = dataset.len(),
            recommendations = recommendations.len(),
            "Analysis run complete"
        );

        AnalysisReport::assemble(
            input.date_range,
            dataset,
            metrics,
            funnel,
            recommendations,
            action_plan,
        )
    }

    /// Fetch every requested source concurrently, then run. A missing date
    /// range is auto-detected by probing 30- and 90-day windows; failed
    /// sources surface in the report instead of aborting the run.
    pub async fn fetch_and_run(
        &self,
        hub: &SourceHub,
        range: Option<DateRange>,
    ) -> AnalysisReport {
        let range = match range {
            Some(range) => Some(range),
            None => {
                let today = chrono::Utc::now().date_naive();
                hub.detect_date_range(today).await
            }
        };

        let outcomes = hub
            .fetch_all(range, self.config.platforms_requested.as_deref())
            .await;

        let mut input = SourceSet::new();
        input.date_range = range;
        input.extend_from_outcomes(outcomes);
        self.run(input)
    }
}
