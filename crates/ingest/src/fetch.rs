//! Fetch collaborators — credential routing, per-platform data clients,
//! and the hub that pulls every requested source concurrently while
//! tolerating individual failures.

use crate::normalizer::{RawRow, RecordNormalizer};
use adpulse_core::{AdPulseResult, DateRange, Platform};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opaque handle to the external account whose data gets pulled.
/// Credential acquisition and persistence live outside the pipeline.
#[derive(Debug, Clone)]
pub struct CredentialHandle {
    pub account_id: String,
}

/// Pure routing from requested platforms to a credential bundle.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, requested: &[Platform]) -> AdPulseResult<CredentialHandle>;
}

/// One platform's raw-row source (API client, upload cache, fixture).
#[async_trait]
pub trait DataSourceClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch raw rows for the window, or all available rows when `None`.
    /// The credential handle is present when the hub has a resolver.
    async fn fetch(
        &self,
        range: Option<DateRange>,
        credential: Option<&CredentialHandle>,
    ) -> AdPulseResult<Vec<RawRow>>;
}

/// What one source contributed to an analysis run.
#[derive(Debug)]
pub enum SourceOutcome {
    Rows {
        platform: Platform,
        rows: Vec<RawRow>,
    },
    Unavailable {
        platform: Platform,
        reason: String,
    },
}

/// Owns the registered platform clients and fetches them concurrently.
/// A failed or timed-out source degrades to [`SourceOutcome::Unavailable`];
/// the pipeline proceeds on whatever succeeded.
#[derive(Default)]
pub struct SourceHub {
    clients: Vec<Arc<dyn DataSourceClient>>,
    resolver: Option<Arc<dyn CredentialResolver>>,
}

impl SourceHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client: Arc<dyn DataSourceClient>) {
        debug!(platform = %client.platform(), "Data source registered");
        self.clients.push(client);
    }

    /// Route fetches through a credential resolver. Without one, clients
    /// fetch with no credential handle (uploads, fixtures).
    pub fn with_resolver(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.clients.iter().map(|c| c.platform()).collect()
    }

    /// Fetch every registered source (optionally restricted to a subset),
    /// one task per platform. Credential resolution happens once per call;
    /// a resolution failure marks every requested source unavailable.
    pub async fn fetch_all(
        &self,
        range: Option<DateRange>,
        requested: Option<&[Platform]>,
    ) -> Vec<SourceOutcome> {
        let active: Vec<Arc<dyn DataSourceClient>> = self
            .clients
            .iter()
            .filter(|c| !requested.is_some_and(|wanted| !wanted.contains(&c.platform())))
            .map(Arc::clone)
            .collect();

        let credential = match (&self.resolver, active.is_empty()) {
            (Some(resolver), false) => {
                let platforms: Vec<Platform> = active.iter().map(|c| c.platform()).collect();
                match resolver.resolve(&platforms) {
                    Ok(handle) => {
                        debug!(account_id = %handle.account_id, "Credential resolved");
                        Some(handle)
                    }
                    Err(e) => {
                        warn!(error = %e, "Credential resolution failed; no source can fetch");
                        return active
                            .iter()
                            .map(|c| SourceOutcome::Unavailable {
                                platform: c.platform(),
                                reason: format!("credential resolution failed: {e}"),
                            })
                            .collect();
                    }
                }
            }
            _ => None,
        };

        let mut tasks = tokio::task::JoinSet::new();
        for client in active {
            let credential = credential.clone();
            tasks.spawn(async move {
                let platform = client.platform();
                match client.fetch(range, credential.as_ref()).await {
                    Ok(rows) => {
                        info!(%platform, rows = rows.len(), "Source fetched");
                        SourceOutcome::Rows { platform, rows }
                    }
                    Err(e) => {
                        warn!(%platform, error = %e, "Source unavailable, continuing without it");
                        SourceOutcome::Unavailable {
                            platform,
                            reason: e.to_string(),
                        }
                    }
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Fetch task panicked; source skipped"),
            }
        }
        outcomes
    }

    /// Probe for the widest window with data: last 30 days first, then 90.
    /// The detected range narrows to the min/max record dates actually
    /// observed. `None` when every probe comes back empty.
    pub async fn detect_date_range(&self, today: NaiveDate) -> Option<DateRange> {
        let normalizer = RecordNormalizer::new();
        for window_days in [30i64, 90] {
            let probe = DateRange::new(today - Duration::days(window_days), today);
            let outcomes = self.fetch_all(Some(probe), None).await;

            let mut dates: Vec<NaiveDate> = Vec::new();
            for outcome in outcomes {
                if let SourceOutcome::Rows { platform, rows } = outcome {
                    if let Ok(batch) = normalizer.normalize(platform, &rows) {
                        dates.extend(batch.records.iter().map(|r| r.date));
                    }
                }
            }

            if let (Some(&start), Some(&end)) = (dates.iter().min(), dates.iter().max()) {
                info!(window_days, %start, %end, "Date range auto-detected");
                return Some(DateRange::new(start, end));
            }
        }
        None
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use adpulse_core::AdPulseError;
    use std::collections::HashMap;

    struct FixtureClient {
        platform: Platform,
        dates: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl DataSourceClient for FixtureClient {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn fetch(
            &self,
            range: Option<DateRange>,
            _credential: Option<&CredentialHandle>,
        ) -> AdPulseResult<Vec<RawRow>> {
            if self.fail {
                return Err(AdPulseError::Fetch("simulated outage".into()));
            }
            Ok(self
                .dates
                .iter()
                .filter(|d| {
                    let date = d.parse::<NaiveDate>().unwrap();
                    range.is_none_or(|r| r.contains(date))
                })
                .map(|d| {
                    let mut row = HashMap::new();
                    row.insert("Date".to_string(), d.to_string());
                    row.insert("Clicks".to_string(), "10".to_string());
                    row
                })
                .collect())
        }
    }

    fn hub_with(clients: Vec<FixtureClient>) -> SourceHub {
        let mut hub = SourceHub::new();
        for client in clients {
            hub.register(Arc::new(client));
        }
        hub
    }

    struct SingleAccountResolver;

    impl CredentialResolver for SingleAccountResolver {
        fn resolve(&self, requested: &[Platform]) -> AdPulseResult<CredentialHandle> {
            if requested.is_empty() {
                return Err(AdPulseError::Config("no platforms requested".into()));
            }
            // Paid platforms route to the ads account, analytics to its own.
            let account_id = if requested.iter().all(|p| p.is_paid()) {
                "ads-account".to_string()
            } else {
                "analytics-account".to_string()
            };
            Ok(CredentialHandle { account_id })
        }
    }

    #[test]
    fn test_credential_routing_is_pure() {
        let resolver = SingleAccountResolver;
        let paid = resolver
            .resolve(&[Platform::PaidSearch, Platform::PaidSocial])
            .unwrap();
        assert_eq!(paid.account_id, "ads-account");

        let mixed = resolver
            .resolve(&[Platform::PaidSearch, Platform::WebAnalytics])
            .unwrap();
        assert_eq!(mixed.account_id, "analytics-account");

        assert!(resolver.resolve(&[]).is_err());
    }

    struct FailingResolver;

    impl CredentialResolver for FailingResolver {
        fn resolve(&self, _requested: &[Platform]) -> AdPulseResult<CredentialHandle> {
            Err(AdPulseError::Config("no account for tenant".into()))
        }
    }

    #[tokio::test]
    async fn test_resolver_failure_marks_all_sources_unavailable() {
        let hub = hub_with(vec![
            FixtureClient {
                platform: Platform::PaidSearch,
                dates: vec!["2024-03-05"],
                fail: false,
            },
            FixtureClient {
                platform: Platform::PaidSocial,
                dates: vec!["2024-03-05"],
                fail: false,
            },
        ])
        .with_resolver(Arc::new(FailingResolver));

        let outcomes = hub.fetch_all(None, None).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, SourceOutcome::Unavailable { reason, .. }
                if reason.contains("credential resolution failed"))));
    }

    #[tokio::test]
    async fn test_resolver_success_lets_sources_fetch() {
        let hub = hub_with(vec![FixtureClient {
            platform: Platform::PaidSearch,
            dates: vec!["2024-03-05"],
            fail: false,
        }])
        .with_resolver(Arc::new(SingleAccountResolver));

        let outcomes = hub.fetch_all(None, None).await;
        assert!(matches!(
            outcomes.as_slice(),
            [SourceOutcome::Rows { rows, .. }] if rows.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_tolerated() {
        let hub = hub_with(vec![
            FixtureClient {
                platform: Platform::PaidSearch,
                dates: vec!["2024-03-05"],
                fail: false,
            },
            FixtureClient {
                platform: Platform::PaidSocial,
                dates: vec![],
                fail: true,
            },
        ]);

        let outcomes = hub.fetch_all(None, None).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, SourceOutcome::Rows { platform, .. } if *platform == Platform::PaidSearch)));
        assert!(outcomes.iter().any(|o| matches!(
            o,
            SourceOutcome::Unavailable { platform, .. } if *platform == Platform::PaidSocial
        )));
    }

    #[tokio::test]
    async fn test_requested_subset_respected() {
        let hub = hub_with(vec![
            FixtureClient {
                platform: Platform::PaidSearch,
                dates: vec!["2024-03-05"],
                fail: false,
            },
            FixtureClient {
                platform: Platform::WebAnalytics,
                dates: vec!["2024-03-05"],
                fail: false,
            },
        ]);

        let outcomes = hub.fetch_all(None, Some(&[Platform::WebAnalytics])).await;
        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_detect_range_narrows_to_observed_dates() {
        let hub = hub_with(vec![FixtureClient {
            platform: Platform::PaidSearch,
            dates: vec!["2024-03-03", "2024-03-12"],
            fail: false,
        }]);

        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let range = hub.detect_date_range(today).await.unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
    }

    #[tokio::test]
    async fn test_detect_range_falls_back_to_ninety_days() {
        let hub = hub_with(vec![FixtureClient {
            platform: Platform::PaidSearch,
            dates: vec!["2024-01-15"],
            fail: false,
        }]);

        // 2024-01-15 is outside the 30-day probe but inside the 90-day one.
        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let range = hub.detect_date_range(today).await.unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(range.end, range.start);
    }

    #[tokio::test]
    async fn test_detect_range_none_when_all_probes_empty() {
        let hub = hub_with(vec![FixtureClient {
            platform: Platform::PaidSearch,
            dates: vec![],
            fail: false,
        }]);

        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        assert!(hub.detect_date_range(today).await.is_none());
    }
}
