//! Calendar normalization
//!
//! Turns upstream `(date, count)` pairs into an ascending, one-sample-per-day
//! series. Duplicate dates are summed.

use crate::{AnalyticsError, AnalyticsResult, CalendarSeries, DailySample, RawDay, SourceTag};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> AnalyticsResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| AnalyticsError::InvalidInput(format!("unparsable date {:?}: {}", value, e)))
}

/// Normalize raw days into a sorted, deduplicated series.
///
/// Fails on the first unparsable date; nothing partial is returned.
pub fn normalize(days: &[RawDay], source: SourceTag) -> AnalyticsResult<CalendarSeries> {
    let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();

    for day in days {
        let date = parse_date(&day.date)?;
        let entry = by_date.entry(date).or_insert(0);
        *entry = entry.saturating_add(day.count);
    }

    let samples = by_date
        .into_iter()
        .map(|(date, count)| DailySample { date, count })
        .collect();

    Ok(CalendarSeries { source, samples })
}
