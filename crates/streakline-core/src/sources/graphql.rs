//! Contribution calendar from the GitHub GraphQL API.
//!
//! This is the reliable source: it always returns the full trailing-year
//! calendar, so it is the only one trusted for active weeks.

use super::{read_success_body, CalendarSource, GitHubClient};
use crate::{AnalyticsError, AnalyticsResult, RawCalendar, RawDay, SourceTag};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const UPSTREAM: &str = "graphql";

const CALENDAR_QUERY: &str = r#"
query($username: String!) {
  user(login: $username) {
    contributionsCollection {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            date
            contributionCount
          }
        }
      }
    }
  }
}
"#;

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct GraphqlData {
    user: Option<GraphqlUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlUser {
    contributions_collection: ContributionsCollection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: ContributionCalendar,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionCalendar {
    total_contributions: u64,
    weeks: Vec<CalendarWeek>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarWeek {
    contribution_days: Vec<ContributionDay>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionDay {
    date: String,
    contribution_count: u64,
}

/// Parse a GraphQL response body into a raw calendar.
pub fn parse_calendar_response(body: &str) -> AnalyticsResult<RawCalendar> {
    let response: GraphqlResponse = serde_json::from_str(body)
        .map_err(|e| AnalyticsError::unavailable(UPSTREAM, format!("malformed response: {}", e)))?;

    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(AnalyticsError::unavailable(UPSTREAM, messages.join("; ")));
    }

    let user = response
        .data
        .and_then(|d| d.user)
        .ok_or_else(|| AnalyticsError::unavailable(UPSTREAM, "user not found"))?;

    let calendar = user.contributions_collection.contribution_calendar;
    let days = calendar
        .weeks
        .into_iter()
        .flat_map(|w| w.contribution_days)
        .map(|d| RawDay::new(d.date, d.contribution_count))
        .collect();

    Ok(RawCalendar {
        total_contributions: Some(calendar.total_contributions),
        days,
    })
}

#[async_trait]
impl CalendarSource for GitHubClient {
    fn tag(&self) -> SourceTag {
        SourceTag::Api
    }

    async fn fetch_calendar(&self, username: &str) -> AnalyticsResult<RawCalendar> {
        let body = serde_json::json!({
            "query": CALENDAR_QUERY,
            "variables": { "username": username },
        });

        let response = self.post(UPSTREAM, "/graphql")?.json(&body).send().await;
        let text = read_success_body(UPSTREAM, response).await?;
        let calendar = parse_calendar_response(&text)?;

        debug!(
            username,
            days = calendar.days.len(),
            total = ?calendar.total_contributions,
            "Fetched GraphQL contribution calendar"
        );
        Ok(calendar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flattens_weeks_in_order() {
        let body = r#"{
            "data": {
                "user": {
                    "contributionsCollection": {
                        "contributionCalendar": {
                            "totalContributions": 9,
                            "weeks": [
                                { "contributionDays": [
                                    { "date": "2024-06-09", "contributionCount": 0 },
                                    { "date": "2024-06-10", "contributionCount": 4 }
                                ] },
                                { "contributionDays": [
                                    { "date": "2024-06-16", "contributionCount": 5 }
                                ] }
                            ]
                        }
                    }
                }
            }
        }"#;

        let calendar = parse_calendar_response(body).unwrap();
        assert_eq!(calendar.total_contributions, Some(9));
        assert_eq!(
            calendar.days,
            vec![
                RawDay::new("2024-06-09", 0),
                RawDay::new("2024-06-10", 4),
                RawDay::new("2024-06-16", 5),
            ]
        );
    }

    #[test]
    fn test_parse_unknown_user() {
        let body = r#"{ "data": { "user": null }, "errors": [
            { "message": "Could not resolve to a User with the login of 'nobody'." }
        ] }"#;
        let err = parse_calendar_response(body).unwrap_err();
        match err {
            AnalyticsError::UpstreamUnavailable { upstream, reason } => {
                assert_eq!(upstream, "graphql");
                assert!(reason.contains("Could not resolve"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_null_user_without_errors() {
        let err = parse_calendar_response(r#"{ "data": { "user": null } }"#).unwrap_err();
        assert!(err.to_string().contains("user not found"));
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_calendar_response("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, AnalyticsError::UpstreamUnavailable { .. }));
    }
}
