use super::{read_success_body, GitHubClient};
use crate::{AnalyticsError, AnalyticsResult, RepoCounters};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

const UPSTREAM: &str = "repos";
const PER_PAGE: usize = 100;
const MAX_REPO_PAGES: u32 = 10;

/// Which repository listing feeds the repository tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoScope {
    /// `/user/repos`: everything the token can see, private repositories included.
    #[default]
    Authenticated,
    /// `/users/{username}/repos`: public repositories of the named user.
    Public,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub owner: RepoOwner,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
}

impl RepoSummary {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

/// The repositories a user owns or can see, with their tallies.
#[derive(Debug, Clone, Default)]
pub struct RepoListing {
    /// Tallies over `repos`; `total_commit_activity` is left at zero.
    pub counters: RepoCounters,
    pub repos: Vec<RepoSummary>,
}

/// Repository tallies, without commit activity.
pub fn tally(repos: &[RepoSummary]) -> RepoCounters {
    repos.iter().fold(
        RepoCounters {
            total_repos: repos.len() as u64,
            ..Default::default()
        },
        |mut acc, repo| {
            if repo.private {
                acc.private_repos += 1;
            }
            if repo.fork {
                acc.forked_repos += 1;
            }
            acc.total_stars = acc.total_stars.saturating_add(repo.stargazers_count);
            acc.total_forks = acc.total_forks.saturating_add(repo.forks_count);
            acc
        },
    )
}

/// Sum per-repository commit counts. Failed repositories contribute zero.
pub fn sum_commit_activity(results: Vec<(String, AnalyticsResult<u64>)>) -> u64 {
    results.into_iter().fold(0u64, |acc, (repo, result)| match result {
        Ok(count) => acc.saturating_add(count),
        Err(err) => {
            warn!(repo = %repo, error = %err, "Skipping commit activity for repository");
            acc
        }
    })
}

pub(crate) async fn fetch_repo_listing(
    gh: &GitHubClient,
    username: &str,
) -> AnalyticsResult<RepoListing> {
    let repos = list_repositories(gh, username).await?;
    let counters = tally(&repos);

    debug!(
        username,
        repos = counters.total_repos,
        stars = counters.total_stars,
        "Fetched repository counters"
    );
    Ok(RepoListing { counters, repos })
}

async fn list_repositories(gh: &GitHubClient, username: &str) -> AnalyticsResult<Vec<RepoSummary>> {
    let path = match gh.config().repo_scope {
        RepoScope::Authenticated => "/user/repos".to_string(),
        RepoScope::Public => format!("/users/{}/repos", username),
    };

    let mut repos = Vec::new();
    for page in 1..=MAX_REPO_PAGES {
        let response = gh
            .get(UPSTREAM, &path)?
            .query(&[
                ("per_page", PER_PAGE.to_string()),
                ("type", "all".to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await;
        let body = read_success_body(UPSTREAM, response).await?;
        let batch = parse_repo_page(&body)?;

        let last_page = batch.len() < PER_PAGE;
        repos.extend(batch);
        if last_page {
            return Ok(repos);
        }
    }

    warn!(
        username,
        pages = MAX_REPO_PAGES,
        "Repository listing truncated at page limit"
    );
    Ok(repos)
}

pub fn parse_repo_page(body: &str) -> AnalyticsResult<Vec<RepoSummary>> {
    serde_json::from_str(body)
        .map_err(|e| AnalyticsError::unavailable(UPSTREAM, format!("malformed response: {}", e)))
}

/// Sum commits over `repos`, at most `max_concurrent_requests` at a time.
///
/// Each repository gets the client's request timeout. Whatever is still
/// pending when `deadline` elapses is aborted and counts as zero.
pub(crate) async fn fetch_commit_activity(
    gh: &GitHubClient,
    repos: &[RepoSummary],
    deadline: Duration,
) -> u64 {
    let semaphore = Arc::new(Semaphore::new(gh.config().max_concurrent_requests.max(1)));
    let per_repo = gh.config().request_timeout;
    let mut tasks = JoinSet::new();

    for repo in repos.iter().cloned() {
        let gh = gh.clone();
        let sem = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let result = repo_commit_count(&gh, &repo, &sem, per_repo).await;
            (repo.full_name(), result)
        });
    }

    let deadline = Instant::now() + deadline;
    let mut results = Vec::with_capacity(tasks.len());
    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok(done))) => results.push(done),
            Ok(Some(Err(err))) => warn!(error = %err, "Commit activity task failed"),
            Ok(None) => break,
            Err(_) => {
                warn!(
                    pending = tasks.len(),
                    "Commit activity deadline reached, remaining repositories count as zero"
                );
                tasks.abort_all();
                break;
            }
        }
    }

    sum_commit_activity(results)
}

/// Commits authored by the repository owner, capped at one page.
async fn repo_commit_count(
    gh: &GitHubClient,
    repo: &RepoSummary,
    semaphore: &Semaphore,
    limit: Duration,
) -> AnalyticsResult<u64> {
    let full_name = repo.full_name();
    let per_item = |reason: String| AnalyticsError::PerItemFailure {
        item: full_name.clone(),
        reason,
    };

    let _permit = semaphore
        .acquire()
        .await
        .map_err(|e| per_item(e.to_string()))?;

    let request = async {
        let path = format!("/repos/{}/commits", full_name);
        let response = gh
            .get(UPSTREAM, &path)?
            .query(&[
                ("author", repo.owner.login.clone()),
                ("per_page", PER_PAGE.to_string()),
            ])
            .send()
            .await;
        let body = read_success_body(UPSTREAM, response).await?;

        serde_json::from_str::<Vec<serde_json::Value>>(&body)
            .map(|commits| commits.len() as u64)
            .map_err(|e| AnalyticsError::unavailable(UPSTREAM, format!("malformed response: {}", e)))
    };

    match tokio::time::timeout(limit, request).await {
        Ok(result) => result.map_err(|e| per_item(e.to_string())),
        Err(_) => Err(per_item(format!("timed out after {:?}", limit))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::stub::{spawn_github_stub, stub_client};

    const PAGE: &str = r#"[
        {"name": "site", "owner": {"login": "alice"}, "private": false, "fork": false,
         "stargazers_count": 12, "forks_count": 3, "language": "Rust"},
        {"name": "dotfiles", "owner": {"login": "alice"}, "private": true, "fork": false,
         "stargazers_count": 0, "forks_count": 0},
        {"name": "linux", "owner": {"login": "alice"}, "private": false, "fork": true,
         "stargazers_count": 1, "forks_count": 2}
    ]"#;

    #[test]
    fn test_tally_counts_flags_and_sums() {
        let repos = parse_repo_page(PAGE).unwrap();
        let counters = tally(&repos);
        assert_eq!(
            counters,
            RepoCounters {
                total_repos: 3,
                private_repos: 1,
                forked_repos: 1,
                total_stars: 13,
                total_forks: 5,
                total_commit_activity: 0,
            }
        );
    }

    #[test]
    fn test_tally_empty() {
        assert_eq!(tally(&[]), RepoCounters::default());
    }

    #[test]
    fn test_parse_repo_page_defaults_missing_numbers() {
        let repos = parse_repo_page(r#"[{"name": "x", "owner": {"login": "bob"}}]"#).unwrap();
        assert_eq!(repos[0].stargazers_count, 0);
        assert!(!repos[0].private);
        assert_eq!(repos[0].full_name(), "bob/x");
    }

    #[test]
    fn test_parse_repo_page_rejects_error_object() {
        let err = parse_repo_page(r#"{"message": "Bad credentials"}"#).unwrap_err();
        assert!(matches!(err, AnalyticsError::UpstreamUnavailable { upstream: "repos", .. }));
    }

    #[test]
    fn test_sum_commit_activity_skips_failures() {
        let results = vec![
            ("alice/site".to_string(), Ok(40)),
            (
                "alice/empty".to_string(),
                Err(AnalyticsError::PerItemFailure {
                    item: "alice/empty".into(),
                    reason: "HTTP 409 Conflict".into(),
                }),
            ),
            ("alice/linux".to_string(), Ok(2)),
        ];
        assert_eq!(sum_commit_activity(results), 42);
    }

    #[test]
    fn test_repo_scope_serde() {
        assert_eq!(serde_json::to_string(&RepoScope::Public).unwrap(), "\"public\"");
        let scope: RepoScope = serde_json::from_str("\"authenticated\"").unwrap();
        assert_eq!(scope, RepoScope::Authenticated);
    }

    #[tokio::test]
    async fn test_listing_tallies_stub_repositories() {
        let api_url = spawn_github_stub(&["site", "dotfiles"], &[]).await;
        let client = stub_client(api_url, Duration::from_secs(5), 4);

        let listing = fetch_repo_listing(&client, "alice").await.unwrap();
        assert_eq!(listing.counters.total_repos, 2);
        assert_eq!(listing.counters.total_commit_activity, 0);
        assert_eq!(listing.repos[1].full_name(), "alice/dotfiles");
    }

    #[tokio::test]
    async fn test_commit_activity_skips_hanging_repositories() {
        let api_url = spawn_github_stub(&["site", "slow", "dotfiles", "stuck"], &["slow", "stuck"]).await;
        let client = stub_client(api_url, Duration::from_millis(300), 1);
        let listing = fetch_repo_listing(&client, "alice").await.unwrap();

        let started = std::time::Instant::now();
        let total = fetch_commit_activity(&client, &listing.repos, Duration::from_secs(10)).await;

        // Two answering repositories with two commits each.
        assert_eq!(total, 4);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_commit_activity_deadline_aborts_pending_repositories() {
        let api_url = spawn_github_stub(&["a", "b", "c"], &["a", "b", "c"]).await;
        let client = stub_client(api_url, Duration::from_secs(30), 2);
        let listing = fetch_repo_listing(&client, "alice").await.unwrap();

        let started = std::time::Instant::now();
        let total = fetch_commit_activity(&client, &listing.repos, Duration::from_millis(200)).await;

        assert_eq!(total, 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
