//! Derived display fields for a stored snapshot.

use crate::AnalyticsRecord;
use serde::Serialize;

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ActivityLevel {
    Light,
    Moderate,
    High,
    Extreme,
}

impl ActivityLevel {
    /// Thresholds are inclusive lower bounds on the daily average.
    pub fn from_daily_average(average: f64) -> Self {
        if average >= 10.0 {
            ActivityLevel::Extreme
        } else if average >= 5.0 {
            ActivityLevel::High
        } else if average >= 2.0 {
            ActivityLevel::Moderate
        } else {
            ActivityLevel::Light
        }
    }

    pub fn from_total(total_contributions: u64) -> Self {
        Self::from_daily_average(daily_average(total_contributions))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Light => "Light",
            ActivityLevel::Moderate => "Moderate",
            ActivityLevel::High => "High",
            ActivityLevel::Extreme => "Extreme",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ActivityLevel::Extreme => "#ff6b6b",
            ActivityLevel::High => "#ffa726",
            ActivityLevel::Moderate => "#4ecdc4",
            ActivityLevel::Light => "#8b949e",
        }
    }
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contributions per day over a fixed 365-day year.
pub fn daily_average(total_contributions: u64) -> f64 {
    total_contributions as f64 / DAYS_PER_YEAR
}

/// `1500` -> `1.5k`, `2000000` -> `2M`, `999` -> `999`.
pub fn format_compact(value: u64) -> String {
    if value >= 1_000_000 {
        format!("{}M", one_decimal(value as f64 / 1_000_000.0))
    } else if value >= 1_000 {
        format!("{}k", one_decimal(value as f64 / 1_000.0))
    } else {
        value.to_string()
    }
}

fn one_decimal(value: f64) -> String {
    let formatted = format!("{:.1}", value);
    match formatted.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => formatted,
    }
}

pub fn streak_badge(streak: u32) -> &'static str {
    if streak >= 30 {
        "🔥"
    } else if streak >= 15 {
        "⚡"
    } else if streak >= 7 {
        "🚀"
    } else if streak >= 3 {
        "🌟"
    } else {
        "✨"
    }
}

/// Everything the card renderer needs beyond the raw record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub level: ActivityLevel,
    pub daily_average: f64,
    pub total_display: String,
    pub current_badge: &'static str,
    pub longest_badge: &'static str,
}

impl ActivitySummary {
    pub fn from_record(record: &AnalyticsRecord) -> Self {
        let average = daily_average(record.total_contributions);
        Self {
            level: ActivityLevel::from_daily_average(average),
            daily_average: average,
            total_display: format_compact(record.total_contributions),
            current_badge: streak_badge(record.current_streak),
            longest_badge: streak_badge(record.longest_streak),
        }
    }

    /// Daily average rounded to one decimal, as shown on the card.
    pub fn daily_average_display(&self) -> String {
        format!("{:.1}", self.daily_average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_compact_thousands() {
        assert_eq!(format_compact(1_500), "1.5k");
        assert_eq!(format_compact(1_000), "1k");
        assert_eq!(format_compact(12_340), "12.3k");
    }

    #[test]
    fn test_format_compact_millions() {
        assert_eq!(format_compact(2_000_000), "2M");
        assert_eq!(format_compact(1_260_000), "1.3M");
    }

    #[test]
    fn test_format_compact_small_numbers() {
        assert_eq!(format_compact(999), "999");
        assert_eq!(format_compact(0), "0");
    }

    #[test]
    fn test_activity_level_thresholds_are_inclusive() {
        assert_eq!(ActivityLevel::from_total(3_650), ActivityLevel::Extreme);
        assert_eq!(ActivityLevel::from_total(3_649), ActivityLevel::High);
        assert_eq!(ActivityLevel::from_total(1_825), ActivityLevel::High);
        assert_eq!(ActivityLevel::from_total(1_824), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_total(730), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_total(729), ActivityLevel::Light);
        assert_eq!(ActivityLevel::from_total(0), ActivityLevel::Light);
    }

    #[test]
    fn test_daily_average_is_fixed_year() {
        assert!((daily_average(730) - 2.0).abs() < f64::EPSILON);
        assert_eq!(daily_average(0), 0.0);
    }

    #[test]
    fn test_streak_badge_tiers() {
        assert_eq!(streak_badge(0), "✨");
        assert_eq!(streak_badge(3), "🌟");
        assert_eq!(streak_badge(7), "🚀");
        assert_eq!(streak_badge(15), "⚡");
        assert_eq!(streak_badge(30), "🔥");
        assert_eq!(streak_badge(365), "🔥");
    }

    #[test]
    fn test_summary_from_record() {
        let record = AnalyticsRecord {
            username: "alice".into(),
            total_repos: 0,
            private_repos: 0,
            forked_repos: 0,
            total_stars: 0,
            total_forks: 0,
            total_commit_activity: 0,
            total_prs: 0,
            total_issues: 0,
            total_reviews: 0,
            total_contributions: 1_900,
            current_streak: 4,
            longest_streak: 31,
            active_weeks: 40,
            last_updated: chrono::Utc::now(),
        };
        let summary = ActivitySummary::from_record(&record);
        assert_eq!(summary.level, ActivityLevel::High);
        assert_eq!(summary.total_display, "1.9k");
        assert_eq!(summary.daily_average_display(), "5.2");
        assert_eq!(summary.current_badge, "🌟");
        assert_eq!(summary.longest_badge, "🔥");
    }
}
