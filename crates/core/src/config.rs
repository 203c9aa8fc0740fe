use crate::types::Platform;
use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ADPULSE__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Thresholds and limits for one analysis run.
///
/// Threaded explicitly through every stage so concurrent requests with
/// different settings stay isolated; there is no module-level state.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Campaigns below this spend are excluded from "bottom performer"
    /// rankings and from the stop rule.
    #[serde(default = "default_min_spend_threshold")]
    pub min_spend_threshold: f64,
    /// Maximum budget change, in percent, any single recommendation may
    /// propose.
    #[serde(default = "default_budget_increase_limit")]
    pub budget_increase_limit: f64,
    /// When set, the action plan includes a concrete reallocation table
    /// bounded by this amount.
    #[serde(default)]
    pub total_monthly_budget: Option<f64>,
    /// Restrict the analysis to a subset of platforms.
    #[serde(default)]
    pub platforms_requested: Option<Vec<Platform>>,
    /// Minimum aggregate-ROAS gap between two platforms before a budget
    /// shift between them is recommended.
    #[serde(default = "default_platform_shift_margin")]
    pub platform_shift_margin: f64,
    #[serde(default)]
    pub funnel: FunnelRuleConfig,
}

/// Thresholds for funnel drop-off classification. The cause-attribution
/// rules are heuristic, so every knob lives here rather than in code.
#[derive(Debug, Clone, Deserialize)]
pub struct FunnelRuleConfig {
    /// Transitions losing more than this fraction are flagged high drop-off.
    #[serde(default = "default_high_drop_off_threshold")]
    pub high_drop_off_threshold: f64,
    /// Mobile engagement below desktop by more than this fraction attaches
    /// the mobile-experience cause.
    #[serde(default = "default_mobile_engagement_delta")]
    pub mobile_engagement_delta: f64,
    /// Median session duration below this floor attaches the
    /// content-mismatch cause.
    #[serde(default = "default_min_median_session_secs")]
    pub min_median_session_secs: f64,
    /// Overall engagement rate below this attaches the message-mismatch
    /// cause on the session-to-engagement transition.
    #[serde(default = "default_low_engagement_rate")]
    pub low_engagement_rate: f64,
}

fn default_min_spend_threshold() -> f64 {
    100.0
}
fn default_budget_increase_limit() -> f64 {
    50.0
}
fn default_platform_shift_margin() -> f64 {
    0.3
}
fn default_high_drop_off_threshold() -> f64 {
    0.70
}
fn default_mobile_engagement_delta() -> f64 {
    0.30
}
fn default_min_median_session_secs() -> f64 {
    30.0
}
fn default_low_engagement_rate() -> f64 {
    0.40
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_spend_threshold: default_min_spend_threshold(),
            budget_increase_limit: default_budget_increase_limit(),
            total_monthly_budget: None,
            platforms_requested: None,
            platform_shift_margin: default_platform_shift_margin(),
            funnel: FunnelRuleConfig::default(),
        }
    }
}

impl Default for FunnelRuleConfig {
    fn default() -> Self {
        Self {
            high_drop_off_threshold: default_high_drop_off_threshold(),
            mobile_engagement_delta: default_mobile_engagement_delta(),
            min_median_session_secs: default_min_median_session_secs(),
            low_engagement_rate: default_low_engagement_rate(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADPULSE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.min_spend_threshold, 100.0);
        assert_eq!(cfg.budget_increase_limit, 50.0);
        assert!(cfg.total_monthly_budget.is_none());
        assert!(cfg.platforms_requested.is_none());
        assert_eq!(cfg.platform_shift_margin, 0.3);
    }

    #[test]
    fn test_funnel_defaults() {
        let cfg = FunnelRuleConfig::default();
        assert_eq!(cfg.high_drop_off_threshold, 0.70);
        assert_eq!(cfg.mobile_engagement_delta, 0.30);
        assert_eq!(cfg.low_engagement_rate, 0.40);
    }
}
