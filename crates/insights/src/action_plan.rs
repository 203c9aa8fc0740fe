//! Action plan composer — buckets recommendations into execution horizons,
//! attaches concrete steps and time estimates, and computes the budget
//! reallocation table when a monthly budget is supplied.

use crate::recommend::{Priority, Recommendation, RecommendationKind};
use adpulse_analytics::{DropOffCause, MetricsOutcome, MetricsReport};
use adpulse_core::{AnalysisConfig, Platform};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Immediate,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlanItem {
    pub horizon: Horizon,
    /// Absent on portfolio-wide follow-ups that aggregate several
    /// recommendations.
    pub recommendation_id: Option<Uuid>,
    pub kind: RecommendationKind,
    pub title: String,
    pub steps: Vec<String>,
    pub estimated_time: String,
    pub expected_impact: String,
}

/// Baseline performance and the projected lift per horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedImpact {
    pub current_spend: f64,
    pub current_conversions: f64,
    pub current_roas: Option<f64>,
    pub additional_conversions_immediate: f64,
    pub additional_conversions_weekly: f64,
    pub additional_conversions_monthly: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReallocationEntry {
    pub platform: Platform,
    pub campaign_name: String,
    pub current_spend: f64,
    pub proposed_budget: f64,
    pub change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReallocationTable {
    pub total_monthly_budget: f64,
    /// Pool released by the stop candidates, bounded by the increase limit.
    pub freed_budget: f64,
    pub entries: Vec<ReallocationEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionPlan {
    pub items: Vec<ActionPlanItem>,
    pub expected_impact: Option<ExpectedImpact>,
    pub reallocation: Option<ReallocationTable>,
}

impl ActionPlan {
    pub fn items_for(&self, horizon: Horizon) -> impl Iterator<Item = &ActionPlanItem> {
        self.items.iter().filter(move |i| i.horizon == horizon)
    }
}

// ─── Composer ───────────────────────────────────────────────────────────────

pub struct ActionPlanComposer {
    config: AnalysisConfig,
}

impl ActionPlanComposer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn compose(
        &self,
        recommendations: &[Recommendation],
        metrics: &MetricsOutcome,
    ) -> ActionPlan {
        let mut immediate = Vec::new();
        let mut weekly = Vec::new();
        let mut monthly = Vec::new();

        for rec in recommendations {
            match rec.kind {
                RecommendationKind::StopAds => immediate.push(stop_item(rec)),
                RecommendationKind::ScaleAds => {
                    immediate.push(scale_item(rec, self.config.budget_increase_limit))
                }
                RecommendationKind::PlatformShift => weekly.push(shift_item(rec)),
                RecommendationKind::CampaignReview => weekly.push(review_item(rec)),
                RecommendationKind::FunnelFix => {
                    // First-transition drop-off burns ad spend directly and
                    // cannot wait for the weekly pass.
                    if rec.priority == Priority::Urgent {
                        immediate.push(funnel_item(rec, Horizon::Immediate));
                    } else {
                        weekly.push(funnel_item(rec, Horizon::Weekly));
                    }
                }
            }
        }

        let scaled_count = recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::ScaleAds)
            .count();
        if scaled_count > 0 {
            monthly.push(creative_testing_item(scaled_count));
            monthly.push(audience_expansion_item(scaled_count));
        }

        let mut items = immediate;
        items.append(&mut weekly);
        items.append(&mut monthly);

        let expected_impact = metrics.as_ready().map(expected_impact);
        let reallocation = self
            .config
            .total_monthly_budget
            .and_then(|budget| metrics.as_ready().map(|m| (budget, m)))
            .and_then(|(budget, report)| self.reallocate(recommendations, report, budget));

        debug!(
            items = items.len(),
            reallocation = reallocation.is_some(),
            "Action plan composed"
        );

        ActionPlan {
            items,
            expected_impact,
            reallocation,
        }
    }

    /// Move up to `budget_increase_limit`% of each stopped campaign's spend
    /// into the scale candidates, proportioned by their relative ROAS. The
    /// total proposed allocation never exceeds the monthly budget and no
    /// campaign ever lands below zero.
    fn reallocate(
        &self,
        recommendations: &[Recommendation],
        report: &MetricsReport,
        total_monthly_budget: f64,
    ) -> Option<ReallocationTable> {
        let limit = self.config.budget_increase_limit / 100.0;

        let stops: Vec<_> = campaign_refs(recommendations, RecommendationKind::StopAds, report);
        let scales: Vec<_> = campaign_refs(recommendations, RecommendationKind::ScaleAds, report);
        if stops.is_empty() || scales.is_empty() {
            return None;
        }

        let freed_budget: f64 = stops.iter().map(|c| c.spend * limit).sum();
        if freed_budget <= 0.0 {
            return None;
        }

        let roas_total: f64 = scales.iter().filter_map(|c| c.roas).sum();
        let mut entries = Vec::with_capacity(stops.len() + scales.len());
        for stop in &stops {
            let cut = stop.spend * limit;
            entries.push(ReallocationEntry {
                platform: stop.platform,
                campaign_name: stop.campaign_name.clone(),
                current_spend: stop.spend,
                proposed_budget: stop.spend - cut,
                change: -cut,
            });
        }
        for scale in &scales {
            let weight = match (scale.roas, roas_total > 0.0) {
                (Some(roas), true) => roas / roas_total,
                _ => 1.0 / scales.len() as f64,
            };
            let gain = freed_budget * weight;
            entries.push(ReallocationEntry {
                platform: scale.platform,
                campaign_name: scale.campaign_name.clone(),
                current_spend: scale.spend,
                proposed_budget: scale.spend + gain,
                change: gain,
            });
        }

        // Cap at the supplied budget: shrink every allocation by the same
        // factor, which keeps all proposals non-negative.
        let proposed_total: f64 = entries.iter().map(|e| e.proposed_budget).sum();
        if proposed_total > total_monthly_budget {
            let factor = total_monthly_budget / proposed_total;
            for entry in &mut entries {
                entry.proposed_budget *= factor;
                entry.change = entry.proposed_budget - entry.current_spend;
            }
        }

        Some(ReallocationTable {
            total_monthly_budget,
            freed_budget,
            entries,
        })
    }
}

struct CampaignRef {
    platform: Platform,
    campaign_name: String,
    spend: f64,
    roas: Option<f64>,
}

fn campaign_refs(
    recommendations: &[Recommendation],
    kind: RecommendationKind,
    report: &MetricsReport,
) -> Vec<CampaignRef> {
    recommendations
        .iter()
        .filter(|r| r.kind == kind)
        .filter_map(|r| {
            let platform = r.platform?;
            let name = r.campaign_name.as_deref()?;
            let metrics = report.campaign(platform, name)?;
            Some(CampaignRef {
                platform,
                campaign_name: name.to_string(),
                spend: metrics.spend,
                roas: metrics.roas,
            })
        })
        .collect()
}

fn expected_impact(report: &MetricsReport) -> ExpectedImpact {
    let conversions = report.overall.conversions;
    ExpectedImpact {
        current_spend: report.overall.spend,
        current_conversions: conversions,
        current_roas: report.overall.roas,
        additional_conversions_immediate: conversions * 0.20,
        additional_conversions_weekly: conversions * 0.35,
        additional_conversions_monthly: conversions * 0.60,
    }
}

// ─── Item templates ─────────────────────────────────────────────────────────

fn stop_item(rec: &Recommendation) -> ActionPlanItem {
    ActionPlanItem {
        horizon: Horizon::Immediate,
        recommendation_id: Some(rec.id),
        kind: rec.kind,
        title: format!("Pause {}", rec.subject),
        steps: vec![
            "Check conversion tracking on the campaign before acting".to_string(),
            "Pause delivery in the platform's ads manager".to_string(),
            "Annotate the change for the next reporting cycle".to_string(),
        ],
        estimated_time: "15 minutes".to_string(),
        expected_impact: rec.impact_summary.clone(),
    }
}

fn scale_item(rec: &Recommendation, limit_percent: f64) -> ActionPlanItem {
    ActionPlanItem {
        horizon: Horizon::Immediate,
        recommendation_id: Some(rec.id),
        kind: rec.kind,
        title: format!("Increase budget for {}", rec.subject),
        steps: vec![
            format!("Raise the daily budget by up to {limit_percent:.0}%"),
            "Watch delivery and frequency for 48 hours".to_string(),
            "Roll back half the increase if CPA degrades".to_string(),
        ],
        estimated_time: "20 minutes".to_string(),
        expected_impact: rec.impact_summary.clone(),
    }
}

fn shift_item(rec: &Recommendation) -> ActionPlanItem {
    ActionPlanItem {
        horizon: Horizon::Weekly,
        recommendation_id: Some(rec.id),
        kind: rec.kind,
        title: format!("Rebalance spend: {}", rec.subject),
        steps: vec![
            "Compare audience overlap between the two platforms".to_string(),
            "Move the bounded amount in two tranches a few days apart".to_string(),
            "Compare blended ROAS against the pre-shift baseline".to_string(),
        ],
        estimated_time: "2-3 hours".to_string(),
        expected_impact: rec.impact_summary.clone(),
    }
}

fn review_item(rec: &Recommendation) -> ActionPlanItem {
    ActionPlanItem {
        horizon: Horizon::Weekly,
        recommendation_id: Some(rec.id),
        kind: rec.kind,
        title: format!("Review {}", rec.subject),
        steps: vec![
            "Audit targeting against the converting audience profile".to_string(),
            "Consolidate overlapping ad sets".to_string(),
            "Refresh the weakest creatives".to_string(),
        ],
        estimated_time: "4-6 hours".to_string(),
        expected_impact: rec.impact_summary.clone(),
    }
}

fn funnel_item(rec: &Recommendation, horizon: Horizon) -> ActionPlanItem {
    let mut steps = Vec::new();
    for cause in &rec.causes {
        match cause {
            DropOffCause::TargetingMismatch => {
                steps.push("Review search terms / audience definitions feeding the ads".to_string());
                steps.push("Verify landing URLs resolve fast and without redirects".to_string());
            }
            DropOffCause::MobileExperience => {
                steps.push("Walk the landing page on a mid-range mobile device".to_string());
                steps.push("Fix tap targets, form fields, and image weight for mobile".to_string());
            }
            DropOffCause::ContentMismatch => {
                steps.push("Align page content with what the ad promises".to_string());
                steps.push("Move the primary call to action above the fold".to_string());
            }
            DropOffCause::MessageMismatch => {
                steps.push("Match landing headlines to the top ad headlines".to_string());
                steps.push("Test page load time and fix anything over 3 seconds".to_string());
            }
        }
    }
    if steps.is_empty() {
        steps.push("Instrument the transition and segment by device and source".to_string());
        steps.push("Re-run the analysis with segment dimensions supplied".to_string());
    }

    ActionPlanItem {
        horizon,
        recommendation_id: Some(rec.id),
        kind: rec.kind,
        title: format!("Reduce drop-off at {}", rec.subject),
        steps,
        estimated_time: match horizon {
            Horizon::Immediate => "2-4 hours".to_string(),
            _ => "3-6 hours".to_string(),
        },
        expected_impact: rec.impact_summary.clone(),
    }
}

fn creative_testing_item(scaled_count: usize) -> ActionPlanItem {
    ActionPlanItem {
        horizon: Horizon::Monthly,
        recommendation_id: None,
        kind: RecommendationKind::ScaleAds,
        title: format!("Launch creative testing for {scaled_count} scaled campaign(s)"),
        steps: vec![
            "Produce two challenger creatives per scaled campaign".to_string(),
            "Split traffic evenly and run for a full conversion cycle".to_string(),
            "Promote winners; archive fatigued creatives".to_string(),
        ],
        estimated_time: "6-8 hours".to_string(),
        expected_impact: "prevents ad fatigue and protects CTR as spend grows".to_string(),
    }
}

fn audience_expansion_item(scaled_count: usize) -> ActionPlanItem {
    ActionPlanItem {
        horizon: Horizon::Monthly,
        recommendation_id: None,
        kind: RecommendationKind::ScaleAds,
        title: format!("Expand audiences for {scaled_count} scaled campaign(s)"),
        steps: vec![
            "Build lookalikes from recent converters".to_string(),
            "Widen geographic or interest targeting one notch".to_string(),
            "Hold CPA within 15% of the pre-expansion baseline".to_string(),
        ],
        estimated_time: "4-5 hours".to_string(),
        expected_impact: "scales reach while holding acquisition efficiency".to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::RecommendationEngine;
    use adpulse_analytics::{FunnelAnalyzer, FunnelOutcome, MetricsEngine};
    use adpulse_core::{ConsolidatedDataset, PlatformRecord};
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn record(
        platform: Platform,
        campaign: &str,
        spend: f64,
        impressions: f64,
        clicks: f64,
        conversions: f64,
    ) -> PlatformRecord {
        let mut r = PlatformRecord::new(platform, day(), campaign);
        r.spend = spend;
        r.impressions = impressions;
        r.clicks = clicks;
        r.conversions = conversions;
        r
    }

    /// Loser: roas 0, bottom CTR. Winner/Second: roas >= 2 with top CTR.
    fn mixed_records() -> Vec<PlatformRecord> {
        vec![
            record(Platform::PaidSocial, "Loser", 400.0, 40000.0, 200.0, 0.0),
            record(Platform::PaidSocial, "Winner", 200.0, 10000.0, 600.0, 500.0),
            record(Platform::PaidSocial, "Second", 100.0, 5000.0, 300.0, 200.0),
        ]
    }

    fn plan_for(records: Vec<PlatformRecord>, config: &AnalysisConfig) -> ActionPlan {
        let dataset = ConsolidatedDataset {
            records,
            ..Default::default()
        };
        let metrics = MetricsEngine::new(config).analyze(&dataset);
        let funnel = FunnelAnalyzer::new(&config.funnel).analyze(&dataset, None);
        let recs = RecommendationEngine::new(config).generate(&metrics, &funnel);
        ActionPlanComposer::new(config).compose(&recs, &metrics)
    }

    #[test]
    fn test_horizon_buckets() {
        let config = AnalysisConfig::default();
        let plan = plan_for(mixed_records(), &config);

        assert!(plan
            .items_for(Horizon::Immediate)
            .any(|i| i.kind == RecommendationKind::StopAds));
        assert!(plan
            .items_for(Horizon::Immediate)
            .any(|i| i.kind == RecommendationKind::ScaleAds));
        assert!(plan
            .items_for(Horizon::Weekly)
            .any(|i| i.kind == RecommendationKind::CampaignReview));
        assert!(plan
            .items_for(Horizon::Monthly)
            .any(|i| i.title.starts_with("Launch creative testing")));
    }

    #[test]
    fn test_estimated_times_follow_kind() {
        let config = AnalysisConfig::default();
        let plan = plan_for(mixed_records(), &config);

        let pause = plan
            .items
            .iter()
            .find(|i| i.kind == RecommendationKind::StopAds)
            .unwrap();
        assert_eq!(pause.estimated_time, "15 minutes");

        let scale = plan
            .items
            .iter()
            .find(|i| i.kind == RecommendationKind::ScaleAds && i.recommendation_id.is_some())
            .unwrap();
        assert_eq!(scale.estimated_time, "20 minutes");
    }

    #[test]
    fn test_no_reallocation_without_budget() {
        let config = AnalysisConfig::default();
        let plan = plan_for(mixed_records(), &config);
        assert!(plan.reallocation.is_none());
    }

    #[test]
    fn test_reallocation_proportional_to_roas() {
        let mut config = AnalysisConfig::default();
        config.total_monthly_budget = Some(10_000.0);
        let plan = plan_for(mixed_records(), &config);
        let table = plan.reallocation.expect("stop+scale pair present");

        // Loser frees 50% of 400.
        assert!((table.freed_budget - 200.0).abs() < 1e-9);

        let winner = table
            .entries
            .iter()
            .find(|e| e.campaign_name == "Winner")
            .unwrap();
        let second = table
            .entries
            .iter()
            .find(|e| e.campaign_name == "Second")
            .unwrap();
        // Winner roas 2.5, Second roas 2.0 -> 5/9 and 4/9 of the pool.
        assert!((winner.change - 200.0 * 2.5 / 4.5).abs() < 1e-9);
        assert!((second.change - 200.0 * 2.0 / 4.5).abs() < 1e-9);

        let loser = table
            .entries
            .iter()
            .find(|e| e.campaign_name == "Loser")
            .unwrap();
        assert!((loser.proposed_budget - 200.0).abs() < 1e-9);
        assert!((loser.change + 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_reallocation_never_exceeds_budget_or_goes_negative() {
        let mut config = AnalysisConfig::default();
        // Far below current spend; everything must shrink, nothing below 0.
        config.total_monthly_budget = Some(300.0);
        let plan = plan_for(mixed_records(), &config);
        let table = plan.reallocation.unwrap();

        let total: f64 = table.entries.iter().map(|e| e.proposed_budget).sum();
        assert!(total <= 300.0 + 1e-9);
        assert!(table.entries.iter().all(|e| e.proposed_budget >= 0.0));
    }

    #[test]
    fn test_reallocation_skipped_without_scale_candidates() {
        let mut config = AnalysisConfig::default();
        config.total_monthly_budget = Some(5_000.0);
        let plan = plan_for(
            vec![record(Platform::PaidSocial, "OnlyLoser", 400.0, 40000.0, 200.0, 0.0)],
            &config,
        );
        assert!(plan.reallocation.is_none());
    }

    #[test]
    fn test_expected_impact_projection() {
        let config = AnalysisConfig::default();
        let plan = plan_for(mixed_records(), &config);
        let impact = plan.expected_impact.unwrap();

        assert_eq!(impact.current_conversions, 700.0);
        assert!((impact.additional_conversions_immediate - 140.0).abs() < 1e-9);
        assert!((impact.additional_conversions_weekly - 245.0).abs() < 1e-9);
        assert!((impact.additional_conversions_monthly - 420.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_empty_plan() {
        let config = AnalysisConfig::default();
        let plan = ActionPlanComposer::new(&config)
            .compose(&[], &MetricsOutcome::Empty);
        assert!(plan.items.is_empty());
        assert!(plan.expected_impact.is_none());
        assert!(plan.reallocation.is_none());
    }

    #[test]
    fn test_urgent_funnel_fix_lands_immediate() {
        let config = AnalysisConfig::default();
        let mut records = vec![record(
            Platform::PaidSearch,
            "Ads",
            500.0,
            50000.0,
            1000.0,
            600.0,
        )];
        let mut web = PlatformRecord::new(Platform::WebAnalytics, day(), "");
        web.sessions = 150.0;
        web.engaged_sessions = 20.0;
        web.conversions = 5.0;
        records.push(web);

        let plan = plan_for(records, &config);
        let item = plan
            .items_for(Horizon::Immediate)
            .find(|i| i.kind == RecommendationKind::FunnelFix)
            .expect("first-transition fix is immediate");
        assert_eq!(item.estimated_time, "2-4 hours");
        assert!(!item.steps.is_empty());
    }

    #[test]
    fn test_funnel_outcome_unused_when_unavailable() {
        let config = AnalysisConfig::default();
        let dataset = ConsolidatedDataset::default();
        let metrics = MetricsEngine::new(&config).analyze(&dataset);
        let funnel: FunnelOutcome = FunnelOutcome::Unavailable {
            reason: "no web analytics".into(),
        };
        let recs = RecommendationEngine::new(&config).generate(&metrics, &funnel);
        let plan = ActionPlanComposer::new(&config).compose(&recs, &metrics);
        assert!(plan.items.is_empty());
    }
}
