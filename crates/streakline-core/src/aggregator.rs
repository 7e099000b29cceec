//! Aggregation of one user's snapshot
//!
//! Fetches every upstream concurrently, reconciles the two calendars and
//! writes a single record.

use crate::reconcile::{reconcile, SourceReading};
use crate::sources::search::activity_window_start;
use crate::sources::{CalendarSource, CounterSource};
use crate::store::AnalyticsStore;
use crate::{canonical_username, AnalyticsError, AnalyticsRecord, AnalyticsResult, SourceTag};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub primary_timeout: Duration,
    pub secondary_timeout: Duration,
    /// Limit for the repository listing and the search counters.
    pub counters_timeout: Duration,
    pub include_commit_activity: bool,
    /// Deadline for the whole commit-activity fan-out, on top of the listing.
    pub commit_activity_timeout: Duration,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            primary_timeout: Duration::from_secs(10),
            secondary_timeout: Duration::from_secs(30),
            counters_timeout: Duration::from_secs(60),
            include_commit_activity: false,
            commit_activity_timeout: Duration::from_secs(60),
        }
    }
}

/// Result of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// The record as written.
    pub record: AnalyticsRecord,
    /// Calendar the totals and streaks were taken from.
    pub source: SourceTag,
    pub fallback_reason: Option<String>,
}

pub struct Aggregator {
    primary: Option<Arc<dyn CalendarSource>>,
    secondary: Arc<dyn CalendarSource>,
    counters: Arc<dyn CounterSource>,
    store: Arc<dyn AnalyticsStore>,
    options: AggregatorOptions,
}

impl Aggregator {
    /// Aggregator without a primary calendar; add one with [`Self::with_primary`].
    pub fn new(
        secondary: Arc<dyn CalendarSource>,
        counters: Arc<dyn CounterSource>,
        store: Arc<dyn AnalyticsStore>,
    ) -> Self {
        Self {
            primary: None,
            secondary,
            counters,
            store,
            options: AggregatorOptions::default(),
        }
    }

    pub fn with_primary(mut self, primary: Arc<dyn CalendarSource>) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn refresh(&self, username: &str) -> AnalyticsResult<RefreshOutcome> {
        self.refresh_at(username, Utc::now()).await
    }

    /// Refresh `username` as of `now`.
    ///
    /// Fails with `InvalidInput` before any upstream call, or with
    /// `UpstreamUnavailable` when a required source fails; nothing is written
    /// in either case. A failing primary calendar only causes a fallback.
    pub async fn refresh_at(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<RefreshOutcome> {
        let username = canonical_username(username)?;
        let username = username.as_str();
        let today = now.date_naive();
        let since = activity_window_start(today);
        let opts = &self.options;

        let secondary_tag = self.secondary.tag();
        let primary_fut = async {
            let source = self.primary.as_ref()?;
            let fetched = tokio::time::timeout(opts.primary_timeout, source.fetch_calendar(username))
                .await
                .unwrap_or_else(|_| {
                    Err(AnalyticsError::degraded(
                        source.tag().as_str(),
                        format!("timed out after {:?}", opts.primary_timeout),
                    ))
                });
            Some(fetched.and_then(|calendar| {
                SourceReading::from_calendar(&calendar, source.tag(), today)
            }))
        };

        // Only the listing is required; commit activity is best effort and
        // runs under its own deadline once the listing is in.
        let repos_fut = async {
            let listing = required(
                "repos",
                opts.counters_timeout,
                self.counters.repositories(username),
            )
            .await?;
            let mut counters = listing.counters;
            if opts.include_commit_activity && !listing.repos.is_empty() {
                counters.total_commit_activity = self
                    .counters
                    .commit_activity(&listing.repos, opts.commit_activity_timeout)
                    .await;
            }
            Ok::<_, AnalyticsError>(counters)
        };

        let (repos, activity, secondary, primary) = tokio::join!(
            repos_fut,
            required(
                "search",
                opts.counters_timeout,
                self.counters.activity(username, since)
            ),
            required(
                secondary_tag.as_str(),
                opts.secondary_timeout,
                self.secondary.fetch_calendar(username),
            ),
            primary_fut,
        );

        let repos = repos?;
        let activity = activity?;
        let secondary = SourceReading::from_calendar(&secondary?, secondary_tag, today)
            .map_err(|e| AnalyticsError::unavailable(secondary_tag.as_str(), e))?;

        let reconciliation = reconcile(primary, &secondary);
        debug!(
            username,
            source = %reconciliation.chosen,
            "Reconciled contribution calendars"
        );

        let record = AnalyticsRecord::assemble(
            username,
            repos,
            activity,
            reconciliation.snapshot,
            now,
        );
        let record = self.store.upsert(record).await?;

        info!(
            username,
            total = record.total_contributions,
            current_streak = record.current_streak,
            longest_streak = record.longest_streak,
            source = %reconciliation.chosen,
            "Refreshed analytics"
        );

        Ok(RefreshOutcome {
            record,
            source: reconciliation.chosen,
            fallback_reason: reconciliation.fallback_reason,
        })
    }

    /// Stored record for `username`; `Ok(None)` when none has been written yet.
    pub async fn lookup(&self, username: &str) -> AnalyticsResult<Option<AnalyticsRecord>> {
        let username = canonical_username(username)?;
        self.store.find(&username).await
    }
}

async fn required<T>(
    upstream: &'static str,
    limit: Duration,
    fut: impl Future<Output = AnalyticsResult<T>>,
) -> AnalyticsResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AnalyticsError::unavailable(
            upstream,
            format!("timed out after {:?}", limit),
        )),
    }
}
