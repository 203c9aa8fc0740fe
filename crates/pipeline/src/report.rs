//! The superset analysis report. One pipeline run produces one report;
//! callers project the slice they need (ad performance, comparisons,
//! recommendations, reallocation) instead of re-running the analysis.

use adpulse_analytics::{FunnelOutcome, MetricsOutcome};
use adpulse_core::{
    AdPulseResult, ConsolidatedDataset, DataAnomaly, DateRange, Platform, UnavailableSource,
};
use adpulse_insights::{ActionPlan, Recommendation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// High-level totals across every consolidated record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_records: usize,
    pub records_by_source: HashMap<Platform, usize>,
    pub total_spend: f64,
    pub total_impressions: f64,
    pub total_clicks: f64,
    pub total_conversions: f64,
    pub total_revenue: Option<f64>,
    pub overall_ctr: Option<f64>,
    pub overall_roas: Option<f64>,
}

/// Everything one analysis run produced, serializable to JSON without loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub date_range: Option<DateRange>,
    pub summary: SummaryMetrics,
    pub metrics: MetricsOutcome,
    pub funnel: FunnelOutcome,
    pub recommendations: Vec<Recommendation>,
    pub action_plan: ActionPlan,
    /// All data-quality notices, dataset and funnel alike.
    pub anomalies: Vec<DataAnomaly>,
    pub malformed_cells: u32,
    pub dropped_rows: u32,
    pub unavailable_sources: Vec<UnavailableSource>,
}

impl AnalysisReport {
    pub(crate) fn assemble(
        date_range: Option<DateRange>,
        dataset: ConsolidatedDataset,
        metrics: MetricsOutcome,
        funnel: FunnelOutcome,
        recommendations: Vec<Recommendation>,
        action_plan: ActionPlan,
    ) -> Self {
        let summary = match metrics.as_ready() {
            Some(report) => SummaryMetrics {
                total_records: report.overall.total_records,
                records_by_source: dataset.records_by_source.clone(),
                total_spend: report.overall.spend,
                total_impressions: report.overall.impressions,
                total_clicks: report.overall.clicks,
                total_conversions: report.overall.conversions,
                total_revenue: report.overall.revenue,
                overall_ctr: report.overall.ctr,
                overall_roas: report.overall.roas,
            },
            None => SummaryMetrics::default(),
        };

        let mut anomalies = dataset.anomalies;
        if let Some(funnel_report) = funnel.as_ready() {
            anomalies.extend(funnel_report.anomalies.iter().cloned());
        }

        Self {
            generated_at: Utc::now(),
            date_range,
            summary,
            metrics,
            funnel,
            recommendations,
            action_plan,
            anomalies,
            malformed_cells: dataset.malformed_cells,
            dropped_rows: dataset.dropped_rows,
            unavailable_sources: dataset.unavailable_sources,
        }
    }

    /// True when no source contributed a single usable record.
    pub fn is_no_data(&self) -> bool {
        self.summary.total_records == 0
    }

    pub fn to_json(&self) -> AdPulseResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> AdPulseResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ─── Projections ────────────────────────────────────────────────────────
    // Thin selections over the one superset result; none re-runs analysis.

    /// Overall metrics, platform comparison, and top/bottom rankings.
    pub fn ad_performance(&self) -> serde_json::Value {
        match self.metrics.as_ready() {
            Some(report) => json!({
                "summary": self.summary,
                "platform_comparison": report.platforms,
                "rankings": report.rankings,
            }),
            None => json!({ "status": "no_data" }),
        }
    }

    /// Per-campaign metrics side by side.
    pub fn campaign_comparison(&self) -> serde_json::Value {
        match self.metrics.as_ready() {
            Some(report) => json!({
                "campaigns": report.campaigns,
                "total_campaigns": report.campaigns.len(),
            }),
            None => json!({ "status": "no_data" }),
        }
    }

    pub fn recommendations_only(&self) -> serde_json::Value {
        json!({ "recommendations": self.recommendations })
    }

    pub fn action_plan_view(&self) -> serde_json::Value {
        json!({
            "action_plan": self.action_plan.items,
            "expected_impact": self.action_plan.expected_impact,
        })
    }

    pub fn budget_reallocation(&self) -> serde_json::Value {
        match &self.action_plan.reallocation {
            Some(table) => json!({ "reallocation": table }),
            None => json!({ "status": "not_computed" }),
        }
    }

    pub fn funnel_view(&self) -> serde_json::Value {
        json!({ "funnel": self.funnel })
    }
}
