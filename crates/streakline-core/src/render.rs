//! SVG stats card.

use crate::classify::ActivitySummary;
use crate::AnalyticsRecord;
use std::fmt::Write as _;

pub const CARD_WIDTH: u32 = 720;
pub const CARD_HEIGHT: u32 = 340;
const MESSAGE_HEIGHT: u32 = 200;

/// Full width of a progress track, in SVG units.
const TRACK_WIDTH: f64 = 160.0;
const TOTAL_FLOOR: u64 = 1_000;
const STREAK_FLOOR: u32 = 30;

const FONT: &str = "Arial, sans-serif";

/// Fraction of the track to fill, 0..=160.
fn bar_width(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    (value / max * 100.0).min(100.0) * TRACK_WIDTH / 100.0
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

struct StatCard<'a> {
    offset: u32,
    title: &'a str,
    value: String,
    badge: &'a str,
    gradient: &'a str,
    icon: &'a str,
    fill: f64,
}

impl StatCard<'_> {
    fn write_to(&self, svg: &mut String) {
        let _ = write!(
            svg,
            r##"
    <g transform="translate({offset}, 0)">
      <rect width="200" height="130" rx="15" fill="#161b22" stroke="#30363d" stroke-width="1.5"/>
      <rect width="200" height="5" fill="url(#{gradient})"/>
      <use xlink:href="#{icon}" x="20" y="35" width="28" height="28"/>
      <text x="56" y="54" fill="#8b949e" font-size="13" font-weight="600" font-family="{font}">{title}</text>
      <text x="100" y="95" text-anchor="middle" fill="#f0f6fc" font-size="34" font-weight="bold" font-family="{font}">{value}</text>
      <text x="185" y="28" text-anchor="end" font-size="14">{badge}</text>
      <rect x="20" y="110" width="{track}" height="8" rx="4" fill="#313244"/>
      <rect x="20" y="110" width="{fill:.1}" height="8" rx="4" fill="url(#{gradient})"/>
    </g>"##,
            offset = self.offset,
            gradient = self.gradient,
            icon = self.icon,
            font = FONT,
            title = self.title,
            value = self.value,
            badge = self.badge,
            track = TRACK_WIDTH,
            fill = self.fill,
        );
    }
}

/// Render the stats card for a stored record.
pub fn render_card(record: &AnalyticsRecord) -> String {
    let summary = ActivitySummary::from_record(record);
    let username = escape_xml(&record.username);
    let level_color = summary.level.color();
    let last_updated = record.last_updated.format("%b %-d, %Y");

    let max_total = record.total_contributions.max(TOTAL_FLOOR) as f64;
    let max_streak = record
        .current_streak
        .max(record.longest_streak)
        .max(STREAK_FLOOR) as f64;

    let cards = [
        StatCard {
            offset: 0,
            title: "Total Contributions",
            value: summary.total_display.clone(),
            badge: "",
            gradient: "contributionGradient",
            icon: "icon-contrib",
            fill: bar_width(record.total_contributions as f64, max_total),
        },
        StatCard {
            offset: 220,
            title: "Current Streak",
            value: record.current_streak.to_string(),
            badge: summary.current_badge,
            gradient: "streakGradient",
            icon: "icon-fire",
            fill: bar_width(record.current_streak as f64, max_streak),
        },
        StatCard {
            offset: 440,
            title: "Longest Streak",
            value: record.longest_streak.to_string(),
            badge: summary.longest_badge,
            gradient: "recordGradient",
            icon: "icon-trophy",
            fill: bar_width(record.longest_streak as f64, max_streak),
        },
    ];

    let mut svg = String::with_capacity(8 * 1024);
    let _ = write!(
        svg,
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
  <defs>
    <linearGradient id="mainGradient" x1="0%" y1="0%" x2="100%" y2="0%">
      <stop offset="0%" stop-color="#238636"/>
      <stop offset="50%" stop-color="#1f6feb"/>
      <stop offset="100%" stop-color="#8957e5"/>
    </linearGradient>
    <linearGradient id="contributionGradient" x1="0%" y1="0%" x2="100%" y2="0%">
      <stop offset="0%" stop-color="#FF416C"/>
      <stop offset="100%" stop-color="#FF4B2B"/>
    </linearGradient>
    <linearGradient id="streakGradient" x1="0%" y1="0%" x2="100%" y2="0%">
      <stop offset="0%" stop-color="#2193b0"/>
      <stop offset="100%" stop-color="#6dd5ed"/>
    </linearGradient>
    <linearGradient id="recordGradient" x1="0%" y1="0%" x2="100%" y2="0%">
      <stop offset="0%" stop-color="#11998e"/>
      <stop offset="100%" stop-color="#38ef7d"/>
    </linearGradient>
    <symbol id="icon-contrib" viewBox="0 0 24 24">
      <path fill="url(#contributionGradient)" d="M12 2C6.48 2 2 6.48 2 12s4.48 10 10 10 10-4.48 10-10S17.52 2 12 2zm-2 15l-5-5 1.41-1.41L10 14.17l7.59-7.59L19 8l-9 9z"/>
    </symbol>
    <symbol id="icon-fire" viewBox="0 0 24 24">
      <path fill="#ff6b3d" d="M12 23c5.52 0 10-4.48 10-10 0-4.84-3.44-8.87-8-9.8v-.2C14 1 12 1 12 1s-2 0-2 2v.2c-4.56.93-8 4.96-8 9.8 0 5.52 4.48 10 10 10z"/>
      <path fill="#ffd166" d="M12 21c4.42 0 8-3.58 8-8 0-3.72-2.56-6.83-6-7.73v-.27C14 3 12 3 12 3s-2 0-2 2v.27c-3.44.9-6 4.01-6 7.73 0 4.42 3.58 8 8 8z"/>
    </symbol>
    <symbol id="icon-trophy" viewBox="0 0 24 24">
      <path fill="url(#recordGradient)" d="M19 5h-2V3H7v2H5c-1.1 0-2 .9-2 2v1c0 2.55 1.92 4.63 4.39 4.94.63 1.5 1.98 2.63 3.61 2.96V19H7v2h10v-2h-4v-3.1c1.63-.33 2.98-1.46 3.61-2.96C19.08 12.63 21 10.55 21 8V7c0-1.1-.9-2-2-2zM5 8V7h2v3.82C5.84 10.4 5 9.3 5 8zm14 0c0 1.3-.84 2.4-2 2.82V7h2v1z"/>
    </symbol>
    <symbol id="icon-calendar" viewBox="0 0 24 24">
      <path fill="#8b949e" d="M19 3h-1V1h-2v2H8V1H6v2H5c-1.1 0-2 .9-2 2v14c0 1.1.9 2 2 2h14c1.1 0 2-.9 2-2V5c0-1.1-.9-2-2-2zm0 16H5V8h14v11z"/>
    </symbol>
    <symbol id="icon-activity" viewBox="0 0 24 24">
      <path fill="{level_color}" d="M12 2C6.48 2 2 6.48 2 12s4.48 10 10 10 10-4.48 10-10S17.52 2 12 2zm-2 15l-5-5 1.41-1.41L10 14.17l7.59-7.59L19 8l-9 9z"/>
    </symbol>
  </defs>
  <rect width="{w}" height="{h}" rx="20" fill="#0d1117"/>
  <g>
    <rect width="{w}" height="80" rx="20" fill="url(#mainGradient)" opacity="0.9"/>
    <rect width="{w}" height="80" rx="20" fill="#161b22" opacity="0.8"/>
    <text x="40" y="52" fill="#f0f6fc" font-size="24" font-weight="bold" font-family="{font}">GitHub Analytics</text>
    <text x="690" y="52" text-anchor="end" fill="#f0f6fc" font-size="16" font-weight="600" font-family="{font}">@{username}</text>
  </g>
  <g transform="translate(40, 110)">"##,
        w = CARD_WIDTH,
        h = CARD_HEIGHT,
        level_color = level_color,
        font = FONT,
        username = username,
    );

    for card in &cards {
        card.write_to(&mut svg);
    }

    let _ = write!(
        svg,
        r##"
  </g>
  <g transform="translate(40, 260)">
    <rect width="640" height="60" rx="12" fill="#161b22" stroke="#30363d" stroke-width="1.5"/>
    <use xlink:href="#icon-activity" x="25" y="18" width="24" height="24"/>
    <text x="55" y="35" fill="#8b949e" font-size="13" font-family="{font}">Activity Level:</text>
    <text x="150" y="35" fill="{level_color}" font-size="15" font-weight="bold" font-family="{font}">{level}</text>
    <g transform="translate(220, 0)">
      <use xlink:href="#icon-calendar" x="25" y="18" width="24" height="24"/>
      <text x="55" y="35" fill="#8b949e" font-size="13" font-family="{font}">Last Updated:</text>
      <text x="150" y="35" fill="#f0f6fc" font-size="13" font-family="{font}">{last_updated}</text>
    </g>
    <g transform="translate(420, 0)">
      <circle cx="37" cy="30" r="14" fill="#2193b0" opacity="0.2"/>
      <text x="37" y="35" text-anchor="middle" fill="#2193b0" font-size="14" font-weight="bold" font-family="{font}">{daily_avg}</text>
      <text x="60" y="35" fill="#8b949e" font-size="13" font-family="{font}">Daily Avg</text>
    </g>
  </g>
  <rect x="10" y="10" width="700" height="320" rx="20" fill="none" stroke="url(#mainGradient)" stroke-width="2" stroke-dasharray="10,5" opacity="0.8"/>
  <circle cx="20" cy="20" r="6" fill="#238636" opacity="0.6"/>
  <circle cx="700" cy="20" r="6" fill="#8957e5" opacity="0.6"/>
  <circle cx="20" cy="320" r="6" fill="#1f6feb" opacity="0.6"/>
  <circle cx="700" cy="320" r="6" fill="#FF416C" opacity="0.6"/>
</svg>
"##,
        font = FONT,
        level_color = level_color,
        level = summary.level,
        last_updated = last_updated,
        daily_avg = summary.daily_average_display(),
    );

    svg
}

fn render_message(message: &str) -> String {
    format!(
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
  <rect width="{w}" height="{h}" rx="15" fill="#0d1117"/>
  <text x="{x}" y="{y}" text-anchor="middle" dominant-baseline="middle" fill="#f85149" font-size="18" font-family="{font}">{message}</text>
</svg>
"##,
        w = CARD_WIDTH,
        h = MESSAGE_HEIGHT,
        x = CARD_WIDTH / 2,
        y = MESSAGE_HEIGHT / 2,
        font = FONT,
        message = escape_xml(message),
    )
}

/// Card shown when a user has no stored snapshot yet.
pub fn render_placeholder() -> String {
    render_message("No analytics data")
}

/// Card shown when the snapshot could not be loaded.
pub fn render_error() -> String {
    render_message("Error generating GitHub stats")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActivityCounters, ReconciledSnapshot, RepoCounters};
    use chrono::{TimeZone, Utc};

    fn record(username: &str, total: u64, current: u32, longest: u32) -> AnalyticsRecord {
        AnalyticsRecord::assemble(
            username,
            RepoCounters::default(),
            ActivityCounters::default(),
            ReconciledSnapshot {
                total_contributions: total,
                current_streak: current,
                longest_streak: longest,
                active_weeks: 0,
            },
            Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_card_shows_derived_fields() {
        let svg = render_card(&record("alice", 1_900, 4, 31));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("@alice"));
        assert!(svg.contains(">1.9k<"));
        assert!(svg.contains(">High<"));
        assert!(svg.contains("#ffa726"));
        assert!(svg.contains(">5.2<"));
        assert!(svg.contains("Mar 5, 2024"));
        assert!(svg.contains("🔥"));
    }

    #[test]
    fn test_card_escapes_username() {
        let svg = render_card(&record("<script>&", 0, 0, 0));
        assert!(svg.contains("@&lt;script&gt;&amp;"));
        assert!(!svg.contains("<script>"));
    }

    #[test]
    fn test_bar_width_is_capped_at_track() {
        assert_eq!(bar_width(500.0, 1_000.0), 80.0);
        assert_eq!(bar_width(5_000.0, 5_000.0), 160.0);
        assert_eq!(bar_width(0.0, 30.0), 0.0);
        assert_eq!(bar_width(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_small_totals_use_floor_scale() {
        // 250 of the 1000 floor fills a quarter of the track.
        let svg = render_card(&record("bob", 250, 0, 0));
        assert!(svg.contains(r#"width="40.0" height="8""#));
    }

    #[test]
    fn test_message_cards() {
        assert!(render_placeholder().contains("No analytics data"));
        assert!(render_error().contains("Error generating GitHub stats"));
    }
}
