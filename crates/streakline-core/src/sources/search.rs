use super::{read_success_body, GitHubClient};
use crate::{ActivityCounters, AnalyticsError, AnalyticsResult};
use chrono::{Months, NaiveDate};
use serde::Deserialize;

const UPSTREAM: &str = "search";

#[derive(Deserialize)]
struct SearchResponse {
    total_count: u64,
}

/// Start of the trailing one-year window used by the search counters.
pub fn activity_window_start(today: NaiveDate) -> NaiveDate {
    today.checked_sub_months(Months::new(12)).unwrap_or(today)
}

pub fn pull_request_query(username: &str, since: NaiveDate) -> String {
    format!("author:{} type:pr created:>={}", username, since.format("%Y-%m-%d"))
}

pub fn issue_query(username: &str, since: NaiveDate) -> String {
    format!("author:{} type:issue created:>={}", username, since.format("%Y-%m-%d"))
}

pub fn review_query(username: &str, since: NaiveDate) -> String {
    format!("reviewed-by:{} created:>={}", username, since.format("%Y-%m-%d"))
}

/// Run the three search queries concurrently. Any failure fails the whole
/// set: these counters are required.
pub(crate) async fn fetch_activity_counts(
    gh: &GitHubClient,
    username: &str,
    since: NaiveDate,
) -> AnalyticsResult<ActivityCounters> {
    let pr_query = pull_request_query(username, since);
    let issue_query = issue_query(username, since);
    let review_query = review_query(username, since);

    let (total_prs, total_issues, total_reviews) = tokio::try_join!(
        search_total(gh, &pr_query),
        search_total(gh, &issue_query),
        search_total(gh, &review_query),
    )?;

    Ok(ActivityCounters {
        total_prs,
        total_issues,
        total_reviews,
    })
}

async fn search_total(gh: &GitHubClient, query: &str) -> AnalyticsResult<u64> {
    let response = gh
        .get(UPSTREAM, "/search/issues")?
        .query(&[("q", query), ("per_page", "1")])
        .send()
        .await;
    let body = read_success_body(UPSTREAM, response).await?;
    parse_total_count(&body)
}

pub fn parse_total_count(body: &str) -> AnalyticsResult<u64> {
    serde_json::from_str::<SearchResponse>(body)
        .map(|r| r.total_count)
        .map_err(|e| AnalyticsError::unavailable(UPSTREAM, format!("malformed response: {}", e)))
}
