//! Performance analytics — campaign/platform metrics with guarded ratios,
//! comparative rankings, and the ad-click-to-conversion funnel.

pub mod engine;
pub mod funnel;

pub use engine::{
    CampaignMetrics, CampaignRankings, MetricRanking, MetricsEngine, MetricsOutcome,
    MetricsReport, OverallMetrics, PlatformMetrics, RankedCampaign,
};
pub use funnel::{
    DropOffCause, DropOffRule, FunnelAnalyzer, FunnelOutcome, FunnelReport, FunnelStage,
    SegmentDimensions, StageName, TransitionAnalysis, TransitionContext,
};
