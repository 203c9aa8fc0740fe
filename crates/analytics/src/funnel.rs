//! Funnel analyzer — joins paid-click volume with web-analytics session,
//! engagement, and conversion counts into the ordered journey funnel,
//! computing stage-to-stage conversion and drop-off and classifying heavy
//! drop-offs with heuristic causes.
//!
//! The cause rules are pluggable and order-insensitive; each one is
//! evaluated independently and several may attach to one transition.

use adpulse_core::{
    AnomalyKind, ConsolidatedDataset, DataAnomaly, FunnelRuleConfig, Platform,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// ─── Types ──────────────────────────────────────────────────────────────────

/// Canonical journey stages, in funnel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    AdClick,
    Session,
    EngagedSession,
    Conversion,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageName::AdClick => "ad_click",
            StageName::Session => "session",
            StageName::EngagedSession => "engaged_session",
            StageName::Conversion => "conversion",
        };
        write!(f, "{name}")
    }
}

/// One funnel stage. `count` is the raw observed volume; `funnel_count` is
/// the monotone view (clamped to the previous stage) used for walk-through
/// reading. A raw count above the previous stage is reported as an anomaly,
/// never silently corrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelStage {
    pub name: StageName,
    pub count: f64,
    pub funnel_count: f64,
    pub conversion_rate_from_previous: Option<f64>,
    pub drop_off_count: Option<f64>,
    pub drop_off_rate: Option<f64>,
}

/// Heuristic causes attachable to a high drop-off transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropOffCause {
    /// Paid clicks never become sessions: targeting or landing delivery.
    TargetingMismatch,
    /// Mobile engagement trails desktop beyond the configured delta.
    MobileExperience,
    /// Median session duration below the configured floor.
    ContentMismatch,
    /// Overall engagement rate below the configured floor.
    MessageMismatch,
}

/// Per-transition analysis, including the unclamped delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionAnalysis {
    pub from: StageName,
    pub to: StageName,
    /// `from.count - to.count` before clamping; negative means the funnel
    /// gained volume between stages (a data anomaly).
    pub raw_delta: f64,
    pub drop_off_count: f64,
    pub drop_off_rate: Option<f64>,
    pub high_drop_off: bool,
    pub causes: Vec<DropOffCause>,
}

/// Supplementary segment dimensions for cause attribution. None of these
/// are derivable from the canonical records, so callers supply them when
/// their analytics export carries device or duration breakdowns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentDimensions {
    pub mobile_engagement_rate: Option<f64>,
    pub desktop_engagement_rate: Option<f64>,
    pub median_session_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelReport {
    pub stages: Vec<FunnelStage>,
    pub transitions: Vec<TransitionAnalysis>,
    /// Transition losing the largest fraction, e.g. `"session -> engaged_session"`.
    pub biggest_drop_off: Option<String>,
    /// End-to-end: conversions per ad click.
    pub overall_conversion_rate: Option<f64>,
    pub anomalies: Vec<DataAnomaly>,
}

/// Funnel analysis needs web-analytics volume; without it the result is an
/// explicit unavailable marker, not a funnel of fabricated zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FunnelOutcome {
    Unavailable { reason: String },
    Ready(FunnelReport),
}

impl FunnelOutcome {
    pub fn as_ready(&self) -> Option<&FunnelReport> {
        match self {
            FunnelOutcome::Ready(report) => Some(report),
            FunnelOutcome::Unavailable { .. } => None,
        }
    }
}

// ─── Cause rules ────────────────────────────────────────────────────────────

/// Everything a cause rule may look at for one flagged transition.
#[derive(Debug, Clone)]
pub struct TransitionContext<'a> {
    pub from: StageName,
    pub to: StageName,
    pub drop_off_rate: f64,
    pub is_first_transition: bool,
    pub overall_engagement_rate: Option<f64>,
    pub dimensions: Option<&'a SegmentDimensions>,
}

/// One independent cause heuristic. Rules never see each other's output.
pub trait DropOffRule: Send + Sync {
    fn evaluate(&self, ctx: &TransitionContext<'_>) -> Option<DropOffCause>;
}

/// Paid clicks evaporating before the first session point at ad targeting
/// or landing-page delivery.
struct TargetingMismatchRule;

impl DropOffRule for TargetingMismatchRule {
    fn evaluate(&self, ctx: &TransitionContext<'_>) -> Option<DropOffCause> {
        ctx.is_first_transition.then_some(DropOffCause::TargetingMismatch)
    }
}

struct MobileExperienceRule {
    engagement_delta: f64,
}

impl DropOffRule for MobileExperienceRule {
    fn evaluate(&self, ctx: &TransitionContext<'_>) -> Option<DropOffCause> {
        let dims = ctx.dimensions?;
        let mobile = dims.mobile_engagement_rate?;
        let desktop = dims.desktop_engagement_rate?;
        (mobile < desktop * (1.0 - self.engagement_delta))
            .then_some(DropOffCause::MobileExperience)
    }
}

struct ContentMismatchRule {
    min_median_session_secs: f64,
}

impl DropOffRule for ContentMismatchRule {
    fn evaluate(&self, ctx: &TransitionContext<'_>) -> Option<DropOffCause> {
        let median = ctx.dimensions?.median_session_secs?;
        (median < self.min_median_session_secs).then_some(DropOffCause::ContentMismatch)
    }
}

/// Sessions arriving but not engaging: the ad promise and the landing page
/// disagree. Scoped to the transition into the engaged-session stage.
struct MessageMismatchRule {
    low_engagement_rate: f64,
}

impl DropOffRule for MessageMismatchRule {
    fn evaluate(&self, ctx: &TransitionContext<'_>) -> Option<DropOffCause> {
        if ctx.to != StageName::EngagedSession {
            return None;
        }
        let engagement = ctx.overall_engagement_rate?;
        (engagement < self.low_engagement_rate).then_some(DropOffCause::MessageMismatch)
    }
}

// ─── Analyzer ───────────────────────────────────────────────────────────────

pub struct FunnelAnalyzer {
    config: FunnelRuleConfig,
    rules: Vec<Box<dyn DropOffRule>>,
}

impl FunnelAnalyzer {
    pub fn new(config: &FunnelRuleConfig) -> Self {
        let rules = Self::default_rules(config);
        Self {
            config: config.clone(),
            rules,
        }
    }

    /// Replace the cause rule set (the default rules are dropped).
    pub fn with_rules(mut self, rules: Vec<Box<dyn DropOffRule>>) -> Self {
        self.rules = rules;
        self
    }

    pub fn default_rules(config: &FunnelRuleConfig) -> Vec<Box<dyn DropOffRule>> {
        vec![
            Box::new(TargetingMismatchRule),
            Box::new(MobileExperienceRule {
                engagement_delta: config.mobile_engagement_delta,
            }),
            Box::new(ContentMismatchRule {
                min_median_session_secs: config.min_median_session_secs,
            }),
            Box::new(MessageMismatchRule {
                low_engagement_rate: config.low_engagement_rate,
            }),
        ]
    }

    pub fn analyze(
        &self,
        dataset: &ConsolidatedDataset,
        dimensions: Option<&SegmentDimensions>,
    ) -> FunnelOutcome {
        if !dataset.has_web_analytics() {
            return FunnelOutcome::Unavailable {
                reason: "no web analytics records in the analyzed range".to_string(),
            };
        }

        let ad_clicks: f64 = dataset
            .records
            .iter()
            .filter(|r| r.platform.is_paid())
            .map(|r| r.clicks)
            .sum();
        let sessions: f64 = dataset
            .records_for(Platform::WebAnalytics)
            .map(|r| r.sessions)
            .sum();
        let engaged_sessions: f64 = dataset
            .records_for(Platform::WebAnalytics)
            .map(|r| r.engaged_sessions)
            .sum();
        // Conversions accrue on both sides of the join: platform-attributed
        // and analytics-observed.
        let conversions: f64 = dataset.records.iter().map(|r| r.conversions).sum();

        let counts = [
            (StageName::AdClick, ad_clicks),
            (StageName::Session, sessions),
            (StageName::EngagedSession, engaged_sessions),
            (StageName::Conversion, conversions),
        ];

        let overall_engagement_rate = ratio(engaged_sessions, sessions);
        let mut stages: Vec<FunnelStage> = Vec::with_capacity(counts.len());
        let mut transitions: Vec<TransitionAnalysis> = Vec::new();
        let mut anomalies: Vec<DataAnomaly> = Vec::new();

        for (i, &(name, count)) in counts.iter().enumerate() {
            if i == 0 {
                stages.push(FunnelStage {
                    name,
                    count,
                    funnel_count: count,
                    conversion_rate_from_previous: None,
                    drop_off_count: None,
                    drop_off_rate: None,
                });
                continue;
            }

            let prev_name = stages[i - 1].name;
            let prev_count = stages[i - 1].count;
            let prev_funnel_count = stages[i - 1].funnel_count;

            let raw_delta = prev_count - count;
            let drop_off_count = raw_delta.max(0.0);
            let drop_off_rate = ratio(drop_off_count, prev_count);
            let funnel_count = count.min(prev_funnel_count);

            if raw_delta < 0.0 {
                anomalies.push(DataAnomaly {
                    kind: AnomalyKind::NegativeDropOff,
                    subject: format!("{prev_name} -> {name}"),
                    detail: format!(
                        "{} count {} exceeds {} count {} (raw delta {})",
                        name, count, prev_name, prev_count, raw_delta
                    ),
                });
            }

            let high_drop_off =
                drop_off_rate.is_some_and(|rate| rate > self.config.high_drop_off_threshold);
            let ctx = TransitionContext {
                from: prev_name,
                to: name,
                drop_off_rate: drop_off_rate.unwrap_or(0.0),
                is_first_transition: i == 1,
                overall_engagement_rate,
                dimensions,
            };
            let causes = if high_drop_off {
                self.rules.iter().filter_map(|r| r.evaluate(&ctx)).collect()
            } else {
                Vec::new()
            };

            transitions.push(TransitionAnalysis {
                from: prev_name,
                to: name,
                raw_delta,
                drop_off_count,
                drop_off_rate,
                high_drop_off,
                causes,
            });
            stages.push(FunnelStage {
                name,
                count,
                funnel_count,
                conversion_rate_from_previous: ratio(count, prev_count),
                drop_off_count: Some(drop_off_count),
                drop_off_rate,
            });
        }

        let biggest_drop_off = transitions
            .iter()
            .filter(|t| t.drop_off_rate.is_some())
            .max_by(|a, b| {
                a.drop_off_rate
                    .partial_cmp(&b.drop_off_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|t| format!("{} -> {}", t.from, t.to));

        debug!(
            ad_clicks,
            sessions,
            engaged_sessions,
            conversions,
            flagged = transitions.iter().filter(|t| t.high_drop_off).count(),
            "Funnel analyzed"
        );

        FunnelOutcome::Ready(FunnelReport {
            stages,
            transitions,
            biggest_drop_off,
            overall_conversion_rate: ratio(conversions, ad_clicks),
            anomalies,
        })
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
