//! Record normalizer — maps source-specific export headers onto the
//! canonical record schema, coercing cell values and tolerating the
//! formatting noise real platform exports carry.

use adpulse_core::{AdPulseError, AdPulseResult, Platform, PlatformRecord};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One raw export row: header name to cell value.
pub type RawRow = HashMap<String, String>;

/// Canonical columns every source maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    CampaignName,
    AdGroupName,
    AdName,
    Impressions,
    Clicks,
    Spend,
    Conversions,
    Sessions,
    EngagedSessions,
    Revenue,
}

/// Result of normalizing one source.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub platform: Platform,
    pub records: Vec<PlatformRecord>,
    /// Non-empty cells that failed numeric coercion and degraded to 0.
    pub malformed_cells: u32,
    /// Rows dropped because their date cell parsed under no known format.
    pub dropped_rows: u32,
}

/// Stateless normalizer; one synonym table per source platform.
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize raw rows from one source into canonical records.
    ///
    /// Missing metric columns degrade to zero-filled fields. The only hard
    /// failure is a source with no recognizable date column at all.
    pub fn normalize(&self, platform: Platform, rows: &[RawRow]) -> AdPulseResult<NormalizedBatch> {
        if rows.is_empty() {
            return Ok(NormalizedBatch {
                platform,
                records: Vec::new(),
                malformed_cells: 0,
                dropped_rows: 0,
            });
        }

        if lookup(&rows[0], synonyms(platform, Column::Date)).is_none() {
            return Err(AdPulseError::Schema(format!(
                "{platform} source has no date column (headers: {:?})",
                rows[0].keys().collect::<Vec<_>>()
            )));
        }

        let mut records = Vec::with_capacity(rows.len());
        let mut malformed_cells = 0u32;
        let mut dropped_rows = 0u32;

        for row in rows {
            let date_cell = lookup(row, synonyms(platform, Column::Date)).unwrap_or("");
            let Some(date) = parse_date(date_cell) else {
                dropped_rows += 1;
                continue;
            };

            let mut numeric = |column: Column| -> f64 {
                match lookup(row, synonyms(platform, column)) {
                    Some(cell) => match parse_numeric(cell) {
                        Ok(value) => value,
                        Err(()) => {
                            malformed_cells += 1;
                            0.0
                        }
                    },
                    None => 0.0,
                }
            };

            let impressions = numeric(Column::Impressions);
            let clicks = numeric(Column::Clicks);
            let spend = numeric(Column::Spend);
            let conversions = numeric(Column::Conversions);
            let sessions = numeric(Column::Sessions);
            let engaged_sessions = numeric(Column::EngagedSessions);

            let revenue = match lookup(row, synonyms(platform, Column::Revenue)) {
                Some(cell) => match parse_numeric(cell) {
                    Ok(value) => Some(value),
                    Err(()) => {
                        malformed_cells += 1;
                        Some(0.0)
                    }
                },
                None => None,
            };

            records.push(PlatformRecord {
                platform,
                date,
                campaign_name: text(row, synonyms(platform, Column::CampaignName)),
                ad_group_name: text(row, synonyms(platform, Column::AdGroupName)),
                ad_name: text(row, synonyms(platform, Column::AdName)),
                impressions,
                clicks,
                spend,
                conversions,
                sessions,
                engaged_sessions,
                revenue,
            });
        }

        if malformed_cells > 0 || dropped_rows > 0 {
            warn!(
                %platform,
                malformed_cells,
                dropped_rows,
                "Source normalized with degraded cells"
            );
        }
        debug!(%platform, records = records.len(), "Source normalized");

        Ok(NormalizedBatch {
            platform,
            records,
            malformed_cells,
            dropped_rows,
        })
    }
}

/// Header synonyms, lowercase. Matching is case-insensitive on trimmed
/// headers; tables follow the export formats each platform actually ships.
fn synonyms(platform: Platform, column: Column) -> &'static [&'static str] {
    use Column::*;
    match (platform, column) {
        (_, Date) => &["date", "day", "reporting starts", "nth day"],

        (Platform::PaidSearch, CampaignName) => &["campaign", "campaign name"],
        (Platform::PaidSearch, AdGroupName) => &["ad group", "ad group name"],
        (Platform::PaidSearch, AdName) => &["ad name", "ad"],
        (Platform::PaidSearch, Impressions) => &["impr.", "impressions"],
        (Platform::PaidSearch, Clicks) => &["clicks", "interactions"],
        (Platform::PaidSearch, Spend) => &["cost", "spend"],
        (Platform::PaidSearch, Conversions) => &["conversions", "conv."],
        (Platform::PaidSearch, Revenue) => &["conv. value", "total conv. value"],
        (Platform::PaidSearch, Sessions | EngagedSessions) => &[],

        (Platform::PaidSocial, CampaignName) => &["campaign name", "campaign"],
        (Platform::PaidSocial, AdGroupName) => &["ad set name", "adset name", "ad group"],
        (Platform::PaidSocial, AdName) => &["ad name"],
        (Platform::PaidSocial, Impressions) => &["impressions", "impr."],
        (Platform::PaidSocial, Clicks) => &["link clicks", "clicks", "interactions"],
        (Platform::PaidSocial, Spend) => &[
            "amount spent",
            "amount spent (usd)",
            "amount spent (zar)",
            "spend",
            "cost",
        ],
        (Platform::PaidSocial, Conversions) => &["results", "conversions", "purchases"],
        (Platform::PaidSocial, Revenue) => &["purchase value", "conversion value"],
        (Platform::PaidSocial, Sessions | EngagedSessions) => &[],

        (Platform::WebAnalytics, CampaignName) => &["campaign", "session campaign"],
        (Platform::WebAnalytics, AdGroupName | AdName) => &[],
        (Platform::WebAnalytics, Impressions) => &[],
        (Platform::WebAnalytics, Clicks) => &[],
        (Platform::WebAnalytics, Spend) => &[],
        (Platform::WebAnalytics, Conversions) => &["conversions", "key events"],
        (Platform::WebAnalytics, Sessions) => &["sessions"],
        (Platform::WebAnalytics, EngagedSessions) => &["engaged sessions"],
        (Platform::WebAnalytics, Revenue) => &["revenue", "total revenue", "purchase revenue"],
    }
}

fn lookup<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a str> {
    for name in names {
        for (header, value) in row {
            if header.trim().eq_ignore_ascii_case(name) {
                return Some(value.as_str());
            }
        }
    }
    None
}

fn text(row: &RawRow, names: &[&str]) -> String {
    lookup(row, names).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Coerce a cell to a non-negative number.
///
/// Strips thousands separators, currency markers, percent signs, and quote
/// wrapping; `--` and `< 0.01` (placeholder values in ads exports) coerce
/// to 0. Empty cells are 0 without counting as malformed.
fn parse_numeric(cell: &str) -> Result<f64, ()> {
    let mut cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | '%' | '"'))
        .collect();
    for code in ["USD", "ZAR", "EUR", "GBP"] {
        cleaned = cleaned.replace(code, "");
    }
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "--" || cleaned == "-" || cleaned == "< 0.01" {
        return Ok(0.0);
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(()),
    }
}

/// Parse a date cell under ISO-8601 and the locale variants platform
/// exports commonly use.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim().trim_matches('"');
    if cell.is_empty() {
        return None;
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%m/%d/%Y",
        "%d.%m.%Y",
        "%b %d, %Y",
        "%d %b %Y",
        "%Y%m%d",
    ];
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cell, format) {
            return Some(date);
        }
    }
    // Timestamped exports: keep the calendar day.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(cell) {
        return Some(dt.date_naive());
    }
    None
}

// ─── Tests ──────────────────────────────────────────────────────────────────
