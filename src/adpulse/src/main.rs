//! AdPulse — consolidates paid-search, paid-social, and web-analytics
//! exports into one performance analysis with prioritized optimization
//! recommendations.
//!
//! Reads platform CSV exports, runs the analysis pipeline once, and prints
//! the report as JSON on stdout. Logs go to stderr.

use adpulse_core::config::AppConfig;
use adpulse_core::{DateRange, Platform};
use adpulse_ingest::normalizer::RawRow;
use adpulse_pipeline::{AnalysisPipeline, SourceSet};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "adpulse")]
#[command(about = "Cross-platform marketing performance analysis and optimization insights")]
#[command(version)]
struct Cli {
    /// Paid-search export (Google Ads style CSV)
    #[arg(long)]
    paid_search: Option<PathBuf>,

    /// Paid-social export (Meta Ads style CSV)
    #[arg(long)]
    paid_social: Option<PathBuf>,

    /// Web-analytics export (GA4 style CSV)
    #[arg(long)]
    web_analytics: Option<PathBuf>,

    /// Analysis window start (YYYY-MM-DD); omit to analyze everything
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Analysis window end (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Spend floor for bottom-performer and stop rules (overrides config)
    #[arg(long, env = "ADPULSE__ANALYSIS__MIN_SPEND_THRESHOLD")]
    min_spend: Option<f64>,

    /// Maximum budget change any recommendation may propose, in percent
    #[arg(long, env = "ADPULSE__ANALYSIS__BUDGET_INCREASE_LIMIT")]
    budget_increase_limit: Option<f64>,

    /// Total monthly budget; enables the reallocation table
    #[arg(long, env = "ADPULSE__ANALYSIS__TOTAL_MONTHLY_BUDGET")]
    monthly_budget: Option<f64>,

    /// Pretty-print the JSON report
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adpulse=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(min_spend) = cli.min_spend {
        config.analysis.min_spend_threshold = min_spend;
    }
    if let Some(limit) = cli.budget_increase_limit {
        config.analysis.budget_increase_limit = limit;
    }
    if let Some(budget) = cli.monthly_budget {
        config.analysis.total_monthly_budget = Some(budget);
    }

    let mut input = SourceSet::new();
    for (platform, path) in [
        (Platform::PaidSearch, &cli.paid_search),
        (Platform::PaidSocial, &cli.paid_social),
        (Platform::WebAnalytics, &cli.web_analytics),
    ] {
        if let Some(path) = path {
            let rows = load_csv(path)
                .with_context(|| format!("reading {} export {}", platform, path.display()))?;
            info!(%platform, rows = rows.len(), path = %path.display(), "Source loaded");
            input.add_source(platform, rows);
        }
    }

    input.date_range = match (cli.start_date, cli.end_date) {
        (Some(start), Some(end)) => Some(DateRange::new(start, end)),
        (None, None) => None,
        _ => anyhow::bail!("--start-date and --end-date must be given together"),
    };

    let report = AnalysisPipeline::new(config.analysis).run(input);
    if report.is_no_data() {
        warn!("No usable records in any supplied source");
    }

    let json = if cli.pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    println!("{json}");
    Ok(())
}

/// Read a CSV export into raw header/value rows.
fn load_csv(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
