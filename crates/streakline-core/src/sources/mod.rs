//! Upstream sources
//!
//! Calendar sources (GraphQL API, profile scrape) and counter sources
//! (repository listing, issue search) sit behind traits so the aggregator
//! can be driven by fakes in tests.

pub mod graphql;
pub mod repos;
pub mod scrape;
pub mod search;
#[cfg(test)]
pub(crate) mod stub;

use crate::{ActivityCounters, AnalyticsError, AnalyticsResult, RawCalendar, SourceTag};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

pub use repos::{RepoListing, RepoScope, RepoSummary};
pub use scrape::ScrapeSource;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_WEB_URL: &str = "https://github.com";
const API_USER_AGENT: &str = concat!("streakline/", env!("CARGO_PKG_VERSION"));
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

#[async_trait]
pub trait CalendarSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    async fn fetch_calendar(&self, username: &str) -> AnalyticsResult<RawCalendar>;
}

#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Repository listing and tallies. Commit activity is left at zero.
    async fn repositories(&self, username: &str) -> AnalyticsResult<RepoListing>;

    /// Commits across `repos`. Best effort: a failing or slow repository
    /// contributes zero, and anything still running at `deadline` is dropped.
    async fn commit_activity(&self, _repos: &[RepoSummary], _deadline: Duration) -> u64 {
        0
    }

    /// PR, issue and review counts for items created on or after `since`.
    async fn activity(&self, username: &str, since: NaiveDate) -> AnalyticsResult<ActivityCounters>;
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub web_url: String,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub repo_scope: RepoScope,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            repo_scope: RepoScope::default(),
        }
    }
}

/// Token-authenticated client for the GitHub REST and GraphQL APIs.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> AnalyticsResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(API_USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AnalyticsError::unavailable("http client", e))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    pub(crate) fn get(&self, upstream: &'static str, path: &str) -> AnalyticsResult<reqwest::RequestBuilder> {
        let token = self.token(upstream)?;
        Ok(self
            .http
            .get(self.api_url(path))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::AUTHORIZATION, format!("token {}", token)))
    }

    pub(crate) fn post(&self, upstream: &'static str, path: &str) -> AnalyticsResult<reqwest::RequestBuilder> {
        let token = self.token(upstream)?;
        Ok(self
            .http
            .post(self.api_url(path))
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token)))
    }

    fn token(&self, upstream: &'static str) -> AnalyticsResult<&str> {
        self.config
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AnalyticsError::unavailable(upstream, "no GitHub token configured"))
    }
}

#[async_trait]
impl CounterSource for GitHubClient {
    async fn repositories(&self, username: &str) -> AnalyticsResult<RepoListing> {
        repos::fetch_repo_listing(self, username).await
    }

    async fn commit_activity(&self, repos: &[RepoSummary], deadline: Duration) -> u64 {
        repos::fetch_commit_activity(self, repos, deadline).await
    }

    async fn activity(&self, username: &str, since: NaiveDate) -> AnalyticsResult<ActivityCounters> {
        search::fetch_activity_counts(self, username, since).await
    }
}

/// Read a response body, turning transport and HTTP failures into
/// `UpstreamUnavailable` for `upstream`.
pub(crate) async fn read_success_body(
    upstream: &'static str,
    response: Result<reqwest::Response, reqwest::Error>,
) -> AnalyticsResult<String> {
    let response = response.map_err(|e| AnalyticsError::unavailable(upstream, describe_transport(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AnalyticsError::unavailable(upstream, describe_status(status)));
    }

    response
        .text()
        .await
        .map_err(|e| AnalyticsError::unavailable(upstream, describe_transport(&e)))
}

pub(crate) fn describe_transport(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("network error: {}", err)
    }
}

pub(crate) fn describe_status(status: reqwest::StatusCode) -> String {
    match status {
        reqwest::StatusCode::UNAUTHORIZED => "HTTP 401 (token rejected)".to_string(),
        reqwest::StatusCode::FORBIDDEN => "HTTP 403 (forbidden or rate limited)".to_string(),
        reqwest::StatusCode::NOT_FOUND => "HTTP 404 (not found)".to_string(),
        reqwest::StatusCode::TOO_MANY_REQUESTS => "HTTP 429 (rate limited)".to_string(),
        other => format!("HTTP {}", other),
    }
}
