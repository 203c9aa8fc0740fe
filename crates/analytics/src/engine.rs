//! Metrics engine — rolls the consolidated dataset up into per-campaign,
//! per-platform, and overall performance metrics, and ranks campaigns for
//! top/bottom-performer views.
//!
//! Every derived ratio is `None` when its denominator is zero. Nothing in
//! this module divides unguarded.

use adpulse_core::{AnalysisConfig, ConsolidatedDataset, Platform, PlatformRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

// ─── Types ──────────────────────────────────────────────────────────────────

/// Aggregate of all records sharing `(platform, campaign_name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignMetrics {
    pub platform: Platform,
    pub campaign_name: String,
    pub records: usize,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    /// Present when any contributing record carried revenue.
    pub revenue: Option<f64>,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub cpm: Option<f64>,
    pub conversion_rate: Option<f64>,
    /// Revenue (or conversions as proxy) per unit of spend.
    pub roas: Option<f64>,
    pub cost_per_conversion: Option<f64>,
}

/// Aggregate across every record of one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMetrics {
    pub platform: Platform,
    pub records: usize,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub sessions: f64,
    pub engaged_sessions: f64,
    pub revenue: Option<f64>,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub conversion_rate: Option<f64>,
    pub roas: Option<f64>,
}

/// Aggregate across every platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub total_records: usize,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub sessions: f64,
    pub engaged_sessions: f64,
    pub revenue: Option<f64>,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub conversion_rate: Option<f64>,
    pub roas: Option<f64>,
}

/// One campaign's position in a ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCampaign {
    pub platform: Platform,
    pub campaign_name: String,
    /// The ranked metric's value; `None` when undefined for the campaign.
    pub value: Option<f64>,
    pub spend: f64,
}

/// Both orderings for one metric. The ascending (bottom-performer) side is
/// restricted to campaigns at or above the configured spend floor so that
/// trivially-funded campaigns cannot dominate the worst list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRanking {
    pub descending: Vec<RankedCampaign>,
    pub ascending: Vec<RankedCampaign>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRankings {
    pub by_roas: MetricRanking,
    pub by_ctr: MetricRanking,
    pub by_conversion_rate: MetricRanking,
    pub by_spend: MetricRanking,
    /// Best five campaigns by ROAS among those above the spend floor.
    pub top_campaigns: Vec<RankedCampaign>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub campaigns: Vec<CampaignMetrics>,
    pub platforms: Vec<PlatformMetrics>,
    pub overall: OverallMetrics,
    pub rankings: CampaignRankings,
}

impl MetricsReport {
    pub fn campaign(&self, platform: Platform, name: &str) -> Option<&CampaignMetrics> {
        self.campaigns
            .iter()
            .find(|c| c.platform == platform && c.campaign_name == name)
    }

    pub fn platform(&self, platform: Platform) -> Option<&PlatformMetrics> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

/// Explicit empty marker: an empty dataset is an answer, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricsOutcome {
    Empty,
    Ready(MetricsReport),
}

impl MetricsOutcome {
    pub fn as_ready(&self) -> Option<&MetricsReport> {
        match self {
            MetricsOutcome::Ready(report) => Some(report),
            MetricsOutcome::Empty => None,
        }
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub struct MetricsEngine {
    min_spend_threshold: f64,
}

impl MetricsEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            min_spend_threshold: config.min_spend_threshold,
        }
    }

    pub fn analyze(&self, dataset: &ConsolidatedDataset) -> MetricsOutcome {
        if dataset.is_empty() {
            return MetricsOutcome::Empty;
        }

        let campaigns = self.campaign_metrics(dataset);
        let platforms = self.platform_metrics(dataset);
        let overall = self.overall_metrics(dataset);
        let rankings = self.rank(&campaigns);

        debug!(
            campaigns = campaigns.len(),
            platforms = platforms.len(),
            "Metrics computed"
        );

        MetricsOutcome::Ready(MetricsReport {
            campaigns,
            platforms,
            overall,
            rankings,
        })
    }

    fn campaign_metrics(&self, dataset: &ConsolidatedDataset) -> Vec<CampaignMetrics> {
        let mut groups: BTreeMap<(Platform, String), Accumulator> = BTreeMap::new();
        for record in &dataset.records {
            if record.campaign_name.is_empty() {
                continue;
            }
            let key = (record.platform, record.campaign_name.clone());
            groups.entry(key).or_default().add(record);
        }

        let mut campaigns = Vec::with_capacity(groups.len());
        for ((platform, campaign_name), acc) in groups {
            campaigns.push(CampaignMetrics {
                platform,
                campaign_name,
                records: acc.records,
                spend: acc.spend,
                impressions: acc.impressions,
                clicks: acc.clicks,
                conversions: acc.conversions,
                revenue: acc.revenue(),
                ctr: ratio(acc.clicks, acc.impressions),
                cpc: ratio(acc.spend, acc.clicks),
                cpm: ratio(acc.spend, acc.impressions).map(|r| r * 1000.0),
                conversion_rate: ratio(acc.conversions, acc.clicks),
                roas: ratio(acc.roas_numerator(), acc.spend),
                cost_per_conversion: ratio(acc.spend, acc.conversions),
            });
        }
        campaigns
    }

    fn platform_metrics(&self, dataset: &ConsolidatedDataset) -> Vec<PlatformMetrics> {
        let mut groups: BTreeMap<Platform, Accumulator> = BTreeMap::new();
        for record in &dataset.records {
            groups.entry(record.platform).or_default().add(record);
        }

        groups
            .into_iter()
            .map(|(platform, acc)| PlatformMetrics {
                platform,
                records: acc.records,
                spend: acc.spend,
                impressions: acc.impressions,
                clicks: acc.clicks,
                conversions: acc.conversions,
                sessions: acc.sessions,
                engaged_sessions: acc.engaged_sessions,
                revenue: acc.revenue(),
                ctr: ratio(acc.clicks, acc.impressions),
                cpc: ratio(acc.spend, acc.clicks),
                conversion_rate: ratio(acc.conversions, acc.clicks),
                roas: ratio(acc.roas_numerator(), acc.spend),
            })
            .collect()
    }

    fn overall_metrics(&self, dataset: &ConsolidatedDataset) -> OverallMetrics {
        let mut acc = Accumulator::default();
        for record in &dataset.records {
            acc.add(record);
        }
        OverallMetrics {
            total_records: acc.records,
            spend: acc.spend,
            impressions: acc.impressions,
            clicks: acc.clicks,
            conversions: acc.conversions,
            sessions: acc.sessions,
            engaged_sessions: acc.engaged_sessions,
            revenue: acc.revenue(),
            ctr: ratio(acc.clicks, acc.impressions),
            cpc: ratio(acc.spend, acc.clicks),
            conversion_rate: ratio(acc.conversions, acc.clicks),
            roas: ratio(acc.roas_numerator(), acc.spend),
        }
    }

    fn rank(&self, campaigns: &[CampaignMetrics]) -> CampaignRankings {
        CampaignRankings {
            by_roas: self.rank_metric(campaigns, |c| c.roas),
            by_ctr: self.rank_metric(campaigns, |c| c.ctr),
            by_conversion_rate: self.rank_metric(campaigns, |c| c.conversion_rate),
            by_spend: self.rank_metric(campaigns, |c| Some(c.spend)),
            top_campaigns: self.top_by_roas(campaigns, 5),
        }
    }

    fn rank_metric(
        &self,
        campaigns: &[CampaignMetrics],
        metric: impl Fn(&CampaignMetrics) -> Option<f64>,
    ) -> MetricRanking {
        let entries: Vec<RankedCampaign> = campaigns
            .iter()
            .map(|c| RankedCampaign {
                platform: c.platform,
                campaign_name: c.campaign_name.clone(),
                value: metric(c),
                spend: c.spend,
            })
            .collect();

        let mut descending = entries.clone();
        descending.sort_by(cmp_value_desc);

        // Bottom-performer view: spend floor keeps noise campaigns out.
        let mut ascending: Vec<RankedCampaign> = entries
            .into_iter()
            .filter(|e| e.spend >= self.min_spend_threshold)
            .collect();
        ascending.sort_by(cmp_value_asc);

        MetricRanking {
            descending,
            ascending,
        }
    }

    fn top_by_roas(&self, campaigns: &[CampaignMetrics], limit: usize) -> Vec<RankedCampaign> {
        let mut top: Vec<RankedCampaign> = campaigns
            .iter()
            .filter(|c| c.spend >= self.min_spend_threshold)
            .map(|c| RankedCampaign {
                platform: c.platform,
                campaign_name: c.campaign_name.clone(),
                value: c.roas,
                spend: c.spend,
            })
            .collect();
        top.sort_by(cmp_value_desc);
        top.truncate(limit);
        top
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Accumulator {
    records: usize,
    spend: f64,
    impressions: f64,
    clicks: f64,
    conversions: f64,
    sessions: f64,
    engaged_sessions: f64,
    revenue_sum: f64,
    has_revenue: bool,
}

impl Accumulator {
    fn add(&mut self, record: &PlatformRecord) {
        self.records += 1;
        self.spend += record.spend;
        self.impressions += record.impressions;
        self.clicks += record.clicks;
        self.conversions += record.conversions;
        self.sessions += record.sessions;
        self.engaged_sessions += record.engaged_sessions;
        if let Some(revenue) = record.revenue {
            self.revenue_sum += revenue;
            self.has_revenue = true;
        }
    }

    fn revenue(&self) -> Option<f64> {
        self.has_revenue.then_some(self.revenue_sum)
    }

    /// Revenue when the source reports it; conversions as the proxy otherwise.
    fn roas_numerator(&self) -> f64 {
        if self.has_revenue {
            self.revenue_sum
        } else {
            self.conversions
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

/// Undefined values sort below every defined value; equal values fall back
/// to spend descending (bigger spend is the more reliable signal), then
/// name for full determinism.
fn cmp_value(a: &RankedCampaign, b: &RankedCampaign) -> Ordering {
    match (a.value, b.value) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_value_desc(a: &RankedCampaign, b: &RankedCampaign) -> Ordering {
    cmp_value(b, a)
        .then_with(|| b.spend.partial_cmp(&a.spend).unwrap_or(Ordering::Equal))
        .then_with(|| a.campaign_name.cmp(&b.campaign_name))
}

fn cmp_value_asc(a: &RankedCampaign, b: &RankedCampaign) -> Ordering {
    cmp_value(a, b)
        .then_with(|| b.spend.partial_cmp(&a.spend).unwrap_or(Ordering::Equal))
        .then_with(|| a.campaign_name.cmp(&b.campaign_name))
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn record(
        platform: Platform,
        campaign: &str,
        spend: f64,
        impressions: f64,
        clicks: f64,
        conversions: f64,
    ) -> PlatformRecord {
        let mut r = PlatformRecord::new(platform, day(1), campaign);
        r.spend = spend;
        r.impressions = impressions;
        r.clicks = clicks;
        r.conversions = conversions;
        r
    }

    fn dataset(records: Vec<PlatformRecord>) -> ConsolidatedDataset {
        ConsolidatedDataset {
            records,
            ..Default::default()
        }
    }

    fn engine() -> MetricsEngine {
        MetricsEngine::new(&AnalysisConfig::default())
    }

    #[test]
    fn test_empty_dataset_is_explicit_marker() {
        let outcome = engine().analyze(&dataset(vec![]));
        assert!(matches!(outcome, MetricsOutcome::Empty));
    }

    #[test]
    fn test_campaign_clicks_sum_to_dataset_total() {
        let ds = dataset(vec![
            record(Platform::PaidSearch, "A", 100.0, 1000.0, 50.0, 5.0),
            record(Platform::PaidSearch, "A", 100.0, 2000.0, 70.0, 7.0),
            record(Platform::PaidSocial, "B", 200.0, 4000.0, 80.0, 2.0),
        ]);
        let outcome = engine().analyze(&ds);
        let report = outcome.as_ready().unwrap();

        let campaign_clicks: f64 = report.campaigns.iter().map(|c| c.clicks).sum();
        let dataset_clicks: f64 = ds.records.iter().map(|r| r.clicks).sum();
        assert_eq!(campaign_clicks, dataset_clicks);
    }

    #[test]
    fn test_duplicate_ingest_doubles_totals_keeps_ratios() {
        let base = vec![
            record(Platform::PaidSearch, "A", 100.0, 1000.0, 50.0, 10.0),
            record(Platform::PaidSocial, "B", 50.0, 500.0, 25.0, 5.0),
        ];
        let mut doubled = base.clone();
        doubled.extend(base.clone());

        let once = engine().analyze(&dataset(base));
        let twice = engine().analyze(&dataset(doubled));
        let once = once.as_ready().unwrap();
        let twice = twice.as_ready().unwrap();

        assert_eq!(twice.overall.spend, once.overall.spend * 2.0);
        assert_eq!(twice.overall.clicks, once.overall.clicks * 2.0);
        assert_eq!(twice.overall.impressions, once.overall.impressions * 2.0);
        assert_eq!(twice.overall.conversions, once.overall.conversions * 2.0);
        assert_eq!(twice.overall.ctr, once.overall.ctr);
        assert_eq!(twice.overall.roas, once.overall.roas);

        let a_once = once.campaign(Platform::PaidSearch, "A").unwrap();
        let a_twice = twice.campaign(Platform::PaidSearch, "A").unwrap();
        assert_eq!(a_twice.spend, a_once.spend * 2.0);
        assert_eq!(a_twice.ctr, a_once.ctr);
        assert_eq!(a_twice.conversion_rate, a_once.conversion_rate);
    }

    #[test]
    fn test_ratios_null_on_zero_denominator() {
        let ds = dataset(vec![record(Platform::PaidSearch, "A", 0.0, 0.0, 0.0, 0.0)]);
        let outcome = engine().analyze(&ds);
        let campaign = &outcome.as_ready().unwrap().campaigns[0];

        assert!(campaign.ctr.is_none());
        assert!(campaign.cpc.is_none());
        assert!(campaign.cpm.is_none());
        assert!(campaign.conversion_rate.is_none());
        assert!(campaign.roas.is_none());
        assert!(campaign.cost_per_conversion.is_none());
    }

    #[test]
    fn test_roas_prefers_revenue_over_conversion_proxy() {
        let mut with_revenue = record(Platform::PaidSocial, "Rev", 100.0, 1000.0, 50.0, 10.0);
        with_revenue.revenue = Some(350.0);
        let proxy_only = record(Platform::PaidSocial, "Proxy", 100.0, 1000.0, 50.0, 10.0);

        let outcome = engine().analyze(&dataset(vec![with_revenue, proxy_only]));
        let report = outcome.as_ready().unwrap();

        let rev = report.campaign(Platform::PaidSocial, "Rev").unwrap();
        let proxy = report.campaign(Platform::PaidSocial, "Proxy").unwrap();
        assert_eq!(rev.roas, Some(3.5));
        assert_eq!(proxy.roas, Some(0.1));
    }

    #[test]
    fn test_ranking_tie_broken_by_spend() {
        // Same ROAS (0.1); the larger spender ranks first.
        let ds = dataset(vec![
            record(Platform::PaidSearch, "Small", 100.0, 1000.0, 50.0, 10.0),
            record(Platform::PaidSearch, "Large", 500.0, 5000.0, 250.0, 50.0),
        ]);
        let outcome = engine().analyze(&ds);
        let rankings = &outcome.as_ready().unwrap().rankings;

        assert_eq!(rankings.by_roas.descending[0].campaign_name, "Large");
        assert_eq!(rankings.by_roas.ascending[0].campaign_name, "Large");
    }

    #[test]
    fn test_bottom_performers_respect_spend_floor() {
        // "Tiny" has the worst ROAS but only $2 of spend.
        let ds = dataset(vec![
            record(Platform::PaidSearch, "Tiny", 2.0, 1000.0, 10.0, 0.0),
            record(Platform::PaidSearch, "Funded", 300.0, 5000.0, 100.0, 30.0),
        ]);
        let outcome = engine().analyze(&ds);
        let rankings = &outcome.as_ready().unwrap().rankings;

        assert!(rankings
            .by_roas
            .ascending
            .iter()
            .all(|c| c.campaign_name != "Tiny"));
        assert!(rankings
            .by_roas
            .descending
            .iter()
            .any(|c| c.campaign_name == "Tiny"));
    }

    #[test]
    fn test_undefined_values_rank_last_descending() {
        let ds = dataset(vec![
            record(Platform::PaidSearch, "NoImpr", 150.0, 0.0, 0.0, 0.0),
            record(Platform::PaidSearch, "Normal", 150.0, 1000.0, 50.0, 5.0),
        ]);
        let outcome = engine().analyze(&ds);
        let rankings = &outcome.as_ready().unwrap().rankings;

        assert_eq!(rankings.by_ctr.descending.last().unwrap().campaign_name, "NoImpr");
        assert_eq!(rankings.by_ctr.ascending[0].campaign_name, "NoImpr");
    }

    #[test]
    fn test_top_campaigns_capped_at_five() {
        let records = (0..8)
            .map(|i| {
                record(
                    Platform::PaidSearch,
                    &format!("C{i}"),
                    200.0,
                    1000.0,
                    50.0,
                    (i + 1) as f64,
                )
            })
            .collect();
        let outcome = engine().analyze(&dataset(records));
        let top = &outcome.as_ready().unwrap().rankings.top_campaigns;
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].campaign_name, "C7");
    }

    #[test]
    fn test_unnamed_records_stay_out_of_campaign_metrics() {
        let mut web = PlatformRecord::new(Platform::WebAnalytics, day(1), "");
        web.sessions = 900.0;
        let ds = dataset(vec![
            web,
            record(Platform::PaidSearch, "A", 100.0, 1000.0, 50.0, 5.0),
        ]);
        let outcome = engine().analyze(&ds);
        let report = outcome.as_ready().unwrap();

        assert_eq!(report.campaigns.len(), 1);
        assert_eq!(report.overall.sessions, 900.0);
        assert_eq!(report.overall.total_records, 2);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(MetricsOutcome::Empty).unwrap();
        assert_eq!(json["status"], "empty");
    }
}
