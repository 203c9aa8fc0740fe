use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Advertising or analytics source a record originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    PaidSearch,
    PaidSocial,
    WebAnalytics,
}

impl Platform {
    /// True for sources that buy media (carry spend/impressions/clicks).
    pub fn is_paid(&self) -> bool {
        matches!(self, Platform::PaidSearch | Platform::PaidSocial)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::PaidSearch => "paid_search",
            Platform::PaidSocial => "paid_social",
            Platform::WebAnalytics => "web_analytics",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid_search" | "paid-search" => Ok(Platform::PaidSearch),
            "paid_social" | "paid-social" => Ok(Platform::PaidSocial),
            "web_analytics" | "web-analytics" => Ok(Platform::WebAnalytics),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// One day of advertising or analytics activity after normalization.
///
/// Counts are kept as `f64` because platform exports round, pro-rate, and
/// otherwise fractionalize them. Missing numeric cells normalize to 0;
/// `clicks <= impressions` is deliberately not enforced. Dirty exports
/// violate it, and the violation surfaces as a [`DataAnomaly`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRecord {
    pub platform: Platform,
    pub date: NaiveDate,
    pub campaign_name: String,
    /// Empty when the platform has no ad-group concept.
    #[serde(default)]
    pub ad_group_name: String,
    #[serde(default)]
    pub ad_name: String,
    #[serde(default)]
    pub impressions: f64,
    #[serde(default)]
    pub clicks: f64,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub conversions: f64,
    /// Web-analytics only; 0 on paid records.
    #[serde(default)]
    pub sessions: f64,
    #[serde(default)]
    pub engaged_sessions: f64,
    /// Used as the ROAS numerator when present; conversions otherwise.
    #[serde(default)]
    pub revenue: Option<f64>,
}

impl PlatformRecord {
    pub fn new(platform: Platform, date: NaiveDate, campaign_name: impl Into<String>) -> Self {
        Self {
            platform,
            date,
            campaign_name: campaign_name.into(),
            ad_group_name: String::new(),
            ad_name: String::new(),
            impressions: 0.0,
            clicks: 0.0,
            spend: 0.0,
            conversions: 0.0,
            sessions: 0.0,
            engaged_sessions: 0.0,
            revenue: None,
        }
    }
}

/// Inclusive calendar-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Non-fatal data-quality finding. Recorded in the response, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAnomaly {
    pub kind: AnomalyKind,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    ClicksExceedImpressions,
    NegativeDropOff,
    MalformedCells,
}

/// A source that could not contribute records to this analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableSource {
    pub platform: Platform,
    pub reason: String,
}

/// All usable records from every supplied source, merged into one ordered
/// collection. Duplicate `(platform, date, campaign, ad)` rows are legal:
/// re-uploaded exports overlap, and duplicates sum into the aggregates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidatedDataset {
    pub records: Vec<PlatformRecord>,
    pub records_by_source: HashMap<Platform, usize>,
    pub unavailable_sources: Vec<UnavailableSource>,
    pub anomalies: Vec<DataAnomaly>,
    /// Cells that failed numeric coercion and degraded to 0.
    pub malformed_cells: u32,
    /// Rows dropped because no date could be parsed.
    pub dropped_rows: u32,
}

impl ConsolidatedDataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records_for(&self, platform: Platform) -> impl Iterator<Item = &PlatformRecord> {
        self.records.iter().filter(move |r| r.platform == platform)
    }

    pub fn has_web_analytics(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.platform == Platform::WebAnalytics)
    }

    pub fn has_paid_sources(&self) -> bool {
        self.records.iter().any(|r| r.platform.is_paid())
    }
}
