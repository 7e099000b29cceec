//! Streak and activity derivation over a normalized calendar.

use crate::{CalendarSeries, DailySample, StreakStats};
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

/// Compute longest streak, current streak and active weeks.
///
/// `series` must come from [`crate::calendar::normalize`]. Missing dates
/// break a run the same way a zero day does. Samples after `today` never feed the current streak,
/// and a zero count on `today` itself means "not yet", not "broken".
pub fn calculate(series: &CalendarSeries, today: NaiveDate) -> StreakStats {
    if series.is_empty() {
        return StreakStats::default();
    }

    StreakStats {
        longest_streak: longest_streak(&series.samples),
        current_streak: current_streak(&series.samples, today),
        active_weeks: active_weeks(&series.samples),
    }
}

fn longest_streak(samples: &[DailySample]) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;

    for sample in samples {
        if sample.count == 0 {
            run = 0;
        } else if is_next_day(prev, sample.date) {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
        prev = Some(sample.date);
    }

    longest
}

fn is_next_day(prev: Option<NaiveDate>, date: NaiveDate) -> bool {
    prev.and_then(|p| p.succ_opt()) == Some(date)
}

fn current_streak(samples: &[DailySample], today: NaiveDate) -> u32 {
    let in_range = samples.partition_point(|s| s.date <= today);
    let mut days = samples[..in_range].iter().rev().peekable();

    // The day after the last one counted; a zero today is skipped but still
    // pins yesterday as the next expected day.
    let mut expected = match days.peek() {
        Some(latest) if latest.date == today && latest.count == 0 => {
            days.next();
            today.pred_opt()
        }
        Some(latest) => Some(latest.date),
        None => None,
    };

    let mut streak = 0u32;
    for sample in days {
        if sample.count == 0 || Some(sample.date) != expected {
            break;
        }
        streak += 1;
        expected = sample.date.pred_opt();
    }
    streak
}

/// Distinct ISO-8601 weeks (Monday start) with at least one contribution.
fn active_weeks(samples: &[DailySample]) -> u32 {
    samples
        .iter()
        .filter(|s| s.count > 0)
        .map(|s| {
            let week = s.date.iso_week();
            (week.year(), week.week())
        })
        .collect::<HashSet<_>>()
        .len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::normalize;
    use crate::{RawDay, SourceTag};
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    /// Build a series from `(days before today, count)` pairs.
    fn series_rel(days: &[(i64, u64)]) -> CalendarSeries {
        let raw: Vec<RawDay> = days
            .iter()
            .map(|(offset, count)| {
                RawDay::new(
                    (today() - Duration::days(*offset)).format("%Y-%m-%d").to_string(),
                    *count,
                )
            })
            .collect();
        normalize(&raw, SourceTag::Api).unwrap()
    }

    #[test]
    fn test_empty_series_is_all_zero() {
        let stats = calculate(&series_rel(&[]), today());
        assert_eq!(stats, StreakStats::default());
    }

    #[test]
    fn test_reference_scenario() {
        let stats = calculate(
            &series_rel(&[(4, 1), (3, 0), (2, 3), (1, 2), (0, 0)]),
            today(),
        );
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.current_streak, 2);
    }

    #[test]
    fn test_today_zero_does_not_break_streak() {
        let stats = calculate(
            &series_rel(&[(5, 1), (4, 2), (3, 1), (2, 7), (1, 1), (0, 0)]),
            today(),
        );
        assert_eq!(stats.current_streak, 5);
        assert_eq!(stats.longest_streak, 5);
    }

    #[test]
    fn test_today_nonzero_counts() {
        let stats = calculate(&series_rel(&[(2, 0), (1, 4), (0, 1)]), today());
        assert_eq!(stats.current_streak, 2);
    }

    #[test]
    fn test_yesterday_zero_breaks_streak() {
        let stats = calculate(&series_rel(&[(3, 1), (2, 1), (1, 0), (0, 0)]), today());
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 2);
    }

    #[test]
    fn test_single_zero_sample_today() {
        let stats = calculate(&series_rel(&[(0, 0)]), today());
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 0);
        assert_eq!(stats.active_weeks, 0);
    }

    #[test]
    fn test_future_samples_are_skipped_for_current_streak() {
        // Clock skew: upstream already has tomorrow with a zero and the day
        // after with a contribution.
        let stats = calculate(&series_rel(&[(2, 1), (1, 1), (0, 1), (-1, 0), (-2, 9)]), today());
        assert_eq!(stats.current_streak, 3);
    }

    #[test]
    fn test_gap_in_dates_breaks_runs() {
        // Day 3 is missing entirely and must act as a zero day.
        let stats = calculate(&series_rel(&[(5, 1), (4, 1), (2, 1), (1, 1), (0, 1)]), today());
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.current_streak, 3);
    }

    #[test]
    fn test_gap_after_skipped_today_zero_ends_current_streak() {
        let stats = calculate(&series_rel(&[(3, 2), (2, 2), (0, 0)]), today());
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 2);
    }

    #[test]
    fn test_extreme_date_span_is_handled_without_gap_filling() {
        let raw = vec![
            RawDay::new("0001-01-01", 5),
            RawDay::new("2024-06-13", 1),
            RawDay::new("2024-06-14", 1),
            RawDay::new("9999-12-31", 7),
        ];
        let series = normalize(&raw, SourceTag::Scraped).unwrap();
        let stats = calculate(&series, today());
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.active_weeks, 3);
    }

    #[test]
    fn test_series_ending_before_today_anchors_on_latest_sample() {
        let stats = calculate(&series_rel(&[(6, 0), (5, 2), (4, 2)]), today());
        assert_eq!(stats.current_streak, 2);
    }

    #[test]
    fn test_current_not_above_longest_on_fixture() {
        let stats = calculate(
            &series_rel(&[(9, 1), (8, 1), (7, 1), (6, 1), (5, 0), (4, 0), (1, 3), (0, 2)]),
            today(),
        );
        assert_eq!(stats.longest_streak, 4);
        assert_eq!(stats.current_streak, 2);
        assert!(stats.current_streak <= stats.longest_streak);
    }

    #[test]
    fn test_calculate_is_idempotent() {
        let series = series_rel(&[(10, 2), (9, 0), (8, 1), (3, 5), (2, 5), (1, 0), (0, 3)]);
        let first = calculate(&series, today());
        let second = calculate(&series, today());
        assert_eq!(first, second);
    }

    #[test]
    fn test_appending_positive_day_extends_or_starts_streak() {
        let yesterday = today() - Duration::days(1);

        let running = series_rel(&[(3, 1), (2, 1), (1, 1)]);
        let before = calculate(&running, yesterday).current_streak;
        let mut extended = running.clone();
        extended.samples.push(DailySample { date: today(), count: 4 });
        assert_eq!(calculate(&extended, today()).current_streak, before + 1);

        let broken = series_rel(&[(3, 1), (2, 1), (1, 0)]);
        let mut restarted = broken.clone();
        restarted.samples.push(DailySample { date: today(), count: 4 });
        assert_eq!(calculate(&restarted, today()).current_streak, 1);
    }

    #[test]
    fn test_active_weeks_uses_iso_weeks() {
        // 2024-06-10 is a Monday; 2024-06-09 is the Sunday before.
        let raw = vec![
            RawDay::new("2024-06-09", 1),
            RawDay::new("2024-06-10", 1),
            RawDay::new("2024-06-12", 3),
            RawDay::new("2024-06-17", 0),
        ];
        let series = normalize(&raw, SourceTag::Api).unwrap();
        assert_eq!(calculate(&series, today()).active_weeks, 2);
    }

    #[test]
    fn test_active_weeks_across_iso_year_boundary() {
        // 2024-12-30 and 2025-01-02 are both ISO week 2025-W01.
        let raw = vec![RawDay::new("2024-12-30", 1), RawDay::new("2025-01-02", 1)];
        let series = normalize(&raw, SourceTag::Api).unwrap();
        let reference = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        assert_eq!(calculate(&series, reference).active_weeks, 1);
    }
}
