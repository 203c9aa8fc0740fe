//! Recommendation engine — stateless threshold rules over the metrics
//! snapshot and funnel results. Every rule is evaluated independently per
//! campaign; none depends on another rule's output, and a fresh set is
//! produced on every run.

use adpulse_analytics::{
    DropOffCause, FunnelOutcome, MetricsOutcome, MetricsReport, StageName,
};
use adpulse_core::{AnalysisConfig, Platform};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;
use uuid::Uuid;

// ─── Types ──────────────────────────────────────────────────────────────────

/// Variants are ordered by severity so the derived `Ord` sorts directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    StopAds,
    ScaleAds,
    PlatformShift,
    CampaignReview,
    FunnelFix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub kind: RecommendationKind,
    pub priority: Priority,
    /// Campaign name, platform pair, or funnel transition the
    /// recommendation targets.
    pub subject: String,
    pub platform: Option<Platform>,
    pub campaign_name: Option<String>,
    pub rationale: String,
    /// Numeric magnitude used for ordering: spend freed, conversions
    /// gained, or funnel volume lost.
    pub quantified_impact: Option<f64>,
    pub impact_summary: String,
    /// Attached drop-off causes; funnel recommendations only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<DropOffCause>,
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub struct RecommendationEngine {
    config: AnalysisConfig,
}

impl RecommendationEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Evaluate every rule and return the prioritized set, ordered by
    /// priority, then quantified impact, then subject. Identical inputs
    /// always produce identical output.
    pub fn generate(
        &self,
        metrics: &MetricsOutcome,
        funnel: &FunnelOutcome,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if let Some(report) = metrics.as_ready() {
            self.campaign_rules(report, &mut recommendations);
            self.platform_shift_rule(report, &mut recommendations);
        }
        if let Some(report) = funnel.as_ready() {
            self.funnel_rules(report, &mut recommendations);
        }

        recommendations.sort_by(cmp_recommendations);
        debug!(count = recommendations.len(), "Recommendations generated");
        recommendations
    }

    fn campaign_rules(&self, report: &MetricsReport, out: &mut Vec<Recommendation>) {
        for campaign in &report.campaigns {
            let Some(platform) = report.platform(campaign.platform) else {
                continue;
            };
            let avg_ctr = platform.ctr.unwrap_or(0.0);
            let ctr = campaign.ctr.unwrap_or(0.0);

            // The stop and scale bands cannot both hold: roas < 1.0 and
            // roas >= 2.0 are disjoint.
            if let Some(roas) = campaign.roas {
                if campaign.spend >= self.config.min_spend_threshold
                    && roas < 1.0
                    && ctr <= avg_ctr
                {
                    let priority = if roas < 0.3 {
                        Priority::Urgent
                    } else {
                        Priority::High
                    };
                    out.push(Recommendation {
                        id: Uuid::new_v4(),
                        kind: RecommendationKind::StopAds,
                        priority,
                        subject: campaign.campaign_name.clone(),
                        platform: Some(campaign.platform),
                        campaign_name: Some(campaign.campaign_name.clone()),
                        rationale: format!(
                            "ROAS {:.2} with CTR at or below the {} average ({:.4} vs {:.4})",
                            roas, campaign.platform, ctr, avg_ctr
                        ),
                        quantified_impact: Some(campaign.spend),
                        impact_summary: format!(
                            "frees {:.2} in monthly spend with minimal conversion loss",
                            campaign.spend
                        ),
                        causes: Vec::new(),
                    });
                }

                if roas >= 2.0 && ctr >= avg_ctr && avg_ctr > 0.0 {
                    let efficiency = platform
                        .roas
                        .filter(|r| *r > 0.0)
                        .map_or(1.0, |avg| (roas / avg).min(2.0));
                    let gain = campaign.conversions
                        * (self.config.budget_increase_limit / 100.0)
                        * efficiency;
                    out.push(Recommendation {
                        id: Uuid::new_v4(),
                        kind: RecommendationKind::ScaleAds,
                        priority: Priority::Medium,
                        subject: campaign.campaign_name.clone(),
                        platform: Some(campaign.platform),
                        campaign_name: Some(campaign.campaign_name.clone()),
                        rationale: format!(
                            "ROAS {:.2} with above-average CTR ({:.4} vs {:.4})",
                            roas, ctr, avg_ctr
                        ),
                        quantified_impact: Some(gain),
                        impact_summary: format!(
                            "projected +{:.1} conversions from a {:.0}% budget increase",
                            gain, self.config.budget_increase_limit
                        ),
                        causes: Vec::new(),
                    });
                }

                // Early-warning review catches poor returns even below the
                // spend floor, at reduced priority.
                if roas < 0.5 {
                    let priority = if campaign.spend >= self.config.min_spend_threshold {
                        Priority::Medium
                    } else {
                        Priority::Low
                    };
                    out.push(Recommendation {
                        id: Uuid::new_v4(),
                        kind: RecommendationKind::CampaignReview,
                        priority,
                        subject: campaign.campaign_name.clone(),
                        platform: Some(campaign.platform),
                        campaign_name: Some(campaign.campaign_name.clone()),
                        rationale: format!(
                            "ROAS {:.2}: {:.2} spent for {:.1} conversions",
                            roas, campaign.spend, campaign.conversions
                        ),
                        quantified_impact: Some(campaign.spend),
                        impact_summary: "restructure targeting and creatives before scaling spend"
                            .to_string(),
                        causes: Vec::new(),
                    });
                }
            }
        }
    }

    fn platform_shift_rule(&self, report: &MetricsReport, out: &mut Vec<Recommendation>) {
        let mut candidates: Vec<_> = report
            .platforms
            .iter()
            .filter(|p| p.spend > 0.0 && p.roas.is_some())
            .collect();
        if candidates.len() < 2 {
            return;
        }
        candidates.sort_by(|a, b| {
            a.roas
                .partial_cmp(&b.roas)
                .unwrap_or(Ordering::Equal)
        });
        let worst = candidates[0];
        let best = candidates[candidates.len() - 1];
        let (worst_roas, best_roas) = match (worst.roas, best.roas) {
            (Some(w), Some(b)) => (w, b),
            _ => return,
        };

        if best_roas - worst_roas > self.config.platform_shift_margin {
            let shift = worst.spend * self.config.budget_increase_limit / 100.0;
            out.push(Recommendation {
                id: Uuid::new_v4(),
                kind: RecommendationKind::PlatformShift,
                priority: Priority::Medium,
                subject: format!("{} -> {}", worst.platform, best.platform),
                platform: Some(worst.platform),
                campaign_name: None,
                rationale: format!(
                    "{} runs at {:.2} ROAS against {:.2} on {}",
                    best.platform, best_roas, worst_roas, worst.platform
                ),
                quantified_impact: Some(shift * (best_roas - worst_roas)),
                impact_summary: format!(
                    "shift up to {:.2} ({:.0}% of {} spend) toward {}",
                    shift, self.config.budget_increase_limit, worst.platform, best.platform
                ),
                causes: Vec::new(),
            });
        }
    }

    fn funnel_rules(
        &self,
        report: &adpulse_analytics::FunnelReport,
        out: &mut Vec<Recommendation>,
    ) {
        for transition in &report.transitions {
            if !transition.high_drop_off {
                continue;
            }
            // Losing paid clicks before any site engagement wastes spend
            // outright; later transitions waste opportunity.
            let priority = if transition.from == StageName::AdClick {
                Priority::Urgent
            } else {
                Priority::High
            };
            let cause_list = if transition.causes.is_empty() {
                "no attributable cause from the configured rules".to_string()
            } else {
                transition
                    .causes
                    .iter()
                    .map(|c| format!("{c:?}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            out.push(Recommendation {
                id: Uuid::new_v4(),
                kind: RecommendationKind::FunnelFix,
                priority,
                subject: format!("{} -> {}", transition.from, transition.to),
                platform: None,
                campaign_name: None,
                rationale: format!(
                    "{:.0}% drop-off ({:.0} lost); causes: {}",
                    transition.drop_off_rate.unwrap_or(0.0) * 100.0,
                    transition.drop_off_count,
                    cause_list
                ),
                quantified_impact: Some(transition.drop_off_count),
                impact_summary: format!(
                    "recover part of {:.0} lost between {} and {}",
                    transition.drop_off_count, transition.from, transition.to
                ),
                causes: transition.causes.clone(),
            });
        }
    }
}

/// Priority descending, quantified impact descending (undefined last),
/// subject ascending.
fn cmp_recommendations(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.quantified_impact, b.quantified_impact) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.subject.cmp(&b.subject))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
