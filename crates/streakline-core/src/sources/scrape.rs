//! Best-effort scrape of the public contributions page.
//!
//! Every failure here is `UpstreamDegraded`: the aggregator falls back to the
//! GraphQL calendar instead of aborting.

use super::{describe_status, describe_transport, CalendarSource};
use crate::{AnalyticsError, AnalyticsResult, RawCalendar, RawDay, SourceTag};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const UPSTREAM: &str = "scrape";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<h2\b[^>]*>(.*?)</h2>").expect("valid heading regex"));

static DAY_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(?:rect|td)\b[^>]*\bdata-date="(\d{4}-\d{2}-\d{2})"[^>]*>"#)
        .expect("valid day regex")
});

static COUNT_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bdata-count="(\d+)""#).expect("valid count regex"));

static ID_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bid="([^"]+)""#).expect("valid id regex"));

static TOOLTIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<tool-tip\b[^>]*\bfor="([^"]+)"[^>]*>(.*?)</tool-tip>"#)
        .expect("valid tooltip regex")
});

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*").expect("valid number regex"));

/// Fetches `{web_url}/users/{username}/contributions` with a browser UA.
pub struct ScrapeSource {
    http: reqwest::Client,
    web_url: String,
}

impl ScrapeSource {
    pub fn new(web_url: impl Into<String>, timeout: Duration) -> AnalyticsResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::degraded(UPSTREAM, e))?;

        Ok(Self {
            http,
            web_url: web_url.into(),
        })
    }

    fn contributions_url(&self, username: &str) -> String {
        format!(
            "{}/users/{}/contributions",
            self.web_url.trim_end_matches('/'),
            username
        )
    }
}

#[async_trait]
impl CalendarSource for ScrapeSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Scraped
    }

    async fn fetch_calendar(&self, username: &str) -> AnalyticsResult<RawCalendar> {
        let response = self
            .http
            .get(self.contributions_url(username))
            .send()
            .await
            .map_err(|e| AnalyticsError::degraded(UPSTREAM, describe_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyticsError::degraded(UPSTREAM, describe_status(status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AnalyticsError::degraded(UPSTREAM, describe_transport(&e)))?;

        let calendar = parse_contributions_html(&html);
        debug!(
            username,
            days = calendar.days.len(),
            total = ?calendar.total_contributions,
            "Scraped contribution calendar"
        );
        Ok(calendar)
    }
}

/// Extract the headline total and the per-day cells from the contributions
/// fragment.
///
/// Handles both the legacy SVG layout (`<rect data-date data-count>`) and the
/// table layout, where counts live in `<tool-tip for="{cell id}">` elements.
/// Unrecognized markup yields an empty calendar rather than an error.
pub fn parse_contributions_html(html: &str) -> RawCalendar {
    let tooltips: HashMap<&str, u64> = TOOLTIP_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str();
            let count = parse_tooltip_count(caps.get(2)?.as_str())?;
            Some((id, count))
        })
        .collect();

    let days = DAY_TAG_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let tag = caps.get(0)?.as_str();
            let date = caps.get(1)?.as_str();

            let count = COUNT_ATTR_RE
                .captures(tag)
                .and_then(|c| c[1].parse::<u64>().ok())
                .or_else(|| {
                    ID_ATTR_RE
                        .captures(tag)
                        .and_then(|c| tooltips.get(c.get(1)?.as_str()).copied())
                })
                .unwrap_or(0);

            Some(RawDay::new(date, count))
        })
        .collect();

    RawCalendar {
        total_contributions: parse_heading_total(html),
        days,
    }
}

fn parse_heading_total(html: &str) -> Option<u64> {
    HEADING_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|text| text.contains("contribution"))
        .and_then(|text| {
            if text.trim_start().starts_with("No contributions") {
                Some(0)
            } else {
                first_number(text)
            }
        })
}

fn parse_tooltip_count(text: &str) -> Option<u64> {
    if text.trim_start().starts_with("No contributions") {
        return Some(0);
    }
    first_number(text)
}

fn first_number(text: &str) -> Option<u64> {
    NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}
