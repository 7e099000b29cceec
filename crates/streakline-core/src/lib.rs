#![deny(clippy::all)]

mod aggregator;
pub mod calendar;
pub mod classify;
mod error;
pub mod reconcile;
pub mod render;
pub mod sources;
pub mod store;
pub mod streaks;

pub use aggregator::*;
pub use error::{AnalyticsError, AnalyticsResult};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which upstream produced a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Scraped,
    Api,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Scraped => "scraped",
            SourceTag::Api => "api",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single day as reported by an upstream, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDay {
    pub date: String,
    pub count: u64,
}

impl RawDay {
    pub fn new(date: impl Into<String>, count: u64) -> Self {
        Self {
            date: date.into(),
            count,
        }
    }
}

/// Calendar payload returned by a calendar source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCalendar {
    /// Total the upstream reports for the whole window, if it reports one.
    pub total_contributions: Option<u64>,
    pub days: Vec<RawDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySample {
    pub date: NaiveDate,
    pub count: u64,
}

/// Samples in strictly ascending date order, one per date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSeries {
    pub source: SourceTag,
    pub samples: Vec<DailySample>,
}

impl CalendarSeries {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn total(&self) -> u64 {
        self.samples
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.count))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakStats {
    pub longest_streak: u32,
    pub current_streak: u32,
    pub active_weeks: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledSnapshot {
    pub total_contributions: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub active_weeks: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoCounters {
    pub total_repos: u64,
    pub private_repos: u64,
    pub forked_repos: u64,
    pub total_stars: u64,
    pub total_forks: u64,
    pub total_commit_activity: u64,
}

/// Search counts scoped to the trailing year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCounters {
    #[serde(rename = "totalPRs")]
    pub total_prs: u64,
    pub total_issues: u64,
    pub total_reviews: u64,
}

/// The persisted snapshot. One per username; every run replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    pub username: String,

    pub total_repos: u64,
    pub private_repos: u64,
    pub forked_repos: u64,

    pub total_stars: u64,
    pub total_forks: u64,

    pub total_commit_activity: u64,
    #[serde(rename = "totalPRs")]
    pub total_prs: u64,
    pub total_issues: u64,
    pub total_reviews: u64,

    pub total_contributions: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub active_weeks: u32,

    pub last_updated: DateTime<Utc>,
}

impl AnalyticsRecord {
    pub fn assemble(
        username: impl Into<String>,
        repos: RepoCounters,
        activity: ActivityCounters,
        snapshot: ReconciledSnapshot,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.into(),
            total_repos: repos.total_repos,
            private_repos: repos.private_repos,
            forked_repos: repos.forked_repos,
            total_stars: repos.total_stars,
            total_forks: repos.total_forks,
            total_commit_activity: repos.total_commit_activity,
            total_prs: activity.total_prs,
            total_issues: activity.total_issues,
            total_reviews: activity.total_reviews,
            total_contributions: snapshot.total_contributions,
            current_streak: snapshot.current_streak,
            longest_streak: snapshot.longest_streak,
            active_weeks: snapshot.active_weeks,
            last_updated,
        }
    }

    pub fn snapshot(&self) -> ReconciledSnapshot {
        ReconciledSnapshot {
            total_contributions: self.total_contributions,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            active_weeks: self.active_weeks,
        }
    }
}

/// Checks a GitHub login: 1-39 ASCII alphanumerics or single hyphens,
/// not starting or ending with a hyphen.
pub fn validate_username(username: &str) -> AnalyticsResult<&str> {
    let invalid = |why: &str| AnalyticsError::InvalidInput(format!("username {:?}: {}", username, why));

    if username.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if username.len() > 39 {
        return Err(invalid("longer than 39 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(invalid("only ASCII letters, digits and '-' are allowed"));
    }
    if username.starts_with('-') || username.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }
    if username.contains("--") {
        return Err(invalid("must not contain consecutive hyphens"));
    }
    Ok(username)
}

/// Validated login folded to lower case, the key records are stored under.
/// GitHub treats `Alice` and `alice` as the same account.
pub fn canonical_username(username: &str) -> AnalyticsResult<String> {
    validate_username(username).map(str::to_ascii_lowercase)
}
