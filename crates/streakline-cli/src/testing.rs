//! Offline sources for router and scheduler tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use streakline_core::sources::{CalendarSource, CounterSource, RepoListing};
use streakline_core::store::MemoryStore;
use streakline_core::{
    ActivityCounters, Aggregator, AnalyticsRecord, AnalyticsResult, RawCalendar, RawDay,
    ReconciledSnapshot, RepoCounters, SourceTag,
};

pub struct StaticCalendar;

#[async_trait]
impl CalendarSource for StaticCalendar {
    fn tag(&self) -> SourceTag {
        SourceTag::Api
    }

    async fn fetch_calendar(&self, _username: &str) -> AnalyticsResult<RawCalendar> {
        Ok(RawCalendar {
            total_contributions: Some(42),
            days: vec![RawDay::new("2024-06-13", 2), RawDay::new("2024-06-14", 1)],
        })
    }
}

pub struct StaticCounters;

#[async_trait]
impl CounterSource for StaticCounters {
    async fn repositories(&self, _username: &str) -> AnalyticsResult<RepoListing> {
        Ok(RepoListing {
            counters: RepoCounters {
                total_repos: 3,
                ..Default::default()
            },
            repos: Vec::new(),
        })
    }

    async fn activity(&self, _username: &str, _since: NaiveDate) -> AnalyticsResult<ActivityCounters> {
        Ok(ActivityCounters::default())
    }
}

pub fn test_aggregator(store: Arc<MemoryStore>) -> Aggregator {
    Aggregator::new(Arc::new(StaticCalendar), Arc::new(StaticCounters), store)
}

pub fn fixed_record(username: &str) -> AnalyticsRecord {
    AnalyticsRecord::assemble(
        username,
        RepoCounters::default(),
        ActivityCounters {
            total_prs: 4,
            ..Default::default()
        },
        ReconciledSnapshot {
            total_contributions: 1_900,
            current_streak: 4,
            longest_streak: 31,
            active_weeks: 40,
        },
        Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap(),
    )
}
