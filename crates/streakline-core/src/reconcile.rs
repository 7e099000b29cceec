//! Source reconciliation
//!
//! The scrape is preferred for totals and streaks because it reflects what
//! the profile page shows, but it is never trusted alone: anything absent,
//! failed or implausible falls back to the GraphQL reading. Active weeks
//! always come from GraphQL.

use crate::calendar::normalize;
use crate::streaks;
use crate::{
    AnalyticsError, AnalyticsResult, RawCalendar, ReconciledSnapshot, SourceTag, StreakStats,
};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Totals and streaks derived from one calendar source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceReading {
    pub source: SourceTag,
    pub total_contributions: u64,
    pub streaks: StreakStats,
    /// Number of distinct days the source exposed.
    pub observed_days: usize,
    /// Sum of the per-day counts the source exposed.
    pub observed_total: u64,
}

impl SourceReading {
    /// Normalize a raw calendar and compute its streaks against `today`.
    ///
    /// When the upstream reports no total, the sum of the day counts is used.
    pub fn from_calendar(
        calendar: &RawCalendar,
        source: SourceTag,
        today: NaiveDate,
    ) -> AnalyticsResult<Self> {
        let series = normalize(&calendar.days, source)?;
        let observed_total = series.total();

        Ok(Self {
            source,
            total_contributions: calendar.total_contributions.unwrap_or(observed_total),
            streaks: streaks::calculate(&series, today),
            observed_days: series.len(),
            observed_total,
        })
    }

    /// Why this reading cannot be trusted, if it cannot.
    pub fn implausibility(&self) -> Option<&'static str> {
        if self.observed_days == 0 {
            return Some("no calendar days extracted");
        }
        if self.total_contributions > 0 && self.observed_total == 0 {
            return Some("reported total is positive but every extracted day is zero");
        }
        None
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: ReconciledSnapshot,
    /// Source the totals and streaks were taken from.
    pub chosen: SourceTag,
    /// Set when the primary was skipped.
    pub fallback_reason: Option<String>,
}

/// Pick the values to persist from a primary (scrape) and secondary (API) reading.
///
/// `primary` is `None` when the scrape was not attempted. A failed primary is
/// absorbed here and never turns into an error.
pub fn reconcile(
    primary: Option<AnalyticsResult<SourceReading>>,
    secondary: &SourceReading,
) -> Reconciliation {
    let attempted = primary.is_some();
    let fallback_reason = match primary {
        None => Some("primary source disabled".to_string()),
        Some(Err(err)) => Some(describe_failure(&err)),
        Some(Ok(reading)) => match reading.implausibility() {
            Some(why) => Some(why.to_string()),
            None => {
                debug!(
                    total = reading.total_contributions,
                    "Using scraped totals and streaks"
                );
                return Reconciliation {
                    snapshot: ReconciledSnapshot {
                        total_contributions: reading.total_contributions,
                        current_streak: reading.streaks.current_streak,
                        longest_streak: reading.streaks.longest_streak,
                        active_weeks: secondary.streaks.active_weeks,
                    },
                    chosen: reading.source,
                    fallback_reason: None,
                };
            }
        },
    };

    if let (true, Some(reason)) = (attempted, &fallback_reason) {
        warn!(reason = %reason, "Scrape unusable, falling back to API calendar");
    }

    Reconciliation {
        snapshot: ReconciledSnapshot {
            total_contributions: secondary.total_contributions,
            current_streak: secondary.streaks.current_streak,
            longest_streak: secondary.streaks.longest_streak,
            active_weeks: secondary.streaks.active_weeks,
        },
        chosen: secondary.source,
        fallback_reason,
    }
}

fn describe_failure(err: &AnalyticsError) -> String {
    match err {
        AnalyticsError::UpstreamDegraded { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}
