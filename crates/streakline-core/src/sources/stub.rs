//! Local stand-in for the GitHub REST API.

use super::{GitHubClient, GitHubConfig};
use axum::{extract::Path, routing::get, Json, Router};
use serde_json::{json, Value};
use std::time::Duration;

/// Serve `repos` (owned by `alice`) from `/user/repos`. Every commits listing
/// answers two commits, except for the repositories named in `hanging`,
/// which never answer. Search queries report three results.
pub(crate) async fn spawn_github_stub(
    repos: &'static [&'static str],
    hanging: &'static [&'static str],
) -> String {
    let app = Router::new()
        .route(
            "/user/repos",
            get(move || async move {
                let page: Vec<Value> = repos
                    .iter()
                    .map(|name| json!({ "name": name, "owner": { "login": "alice" } }))
                    .collect();
                Json(page)
            }),
        )
        .route(
            "/repos/{owner}/{name}/commits",
            get(move |Path((_owner, name)): Path<(String, String)>| async move {
                if hanging.contains(&name.as_str()) {
                    std::future::pending::<()>().await;
                }
                Json(json!([{ "sha": "a" }, { "sha": "b" }]))
            }),
        )
        .route(
            "/search/issues",
            get(|| async { Json(json!({ "total_count": 3, "items": [] })) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub(crate) fn stub_client(
    api_url: String,
    request_timeout: Duration,
    max_concurrent_requests: usize,
) -> GitHubClient {
    GitHubClient::new(GitHubConfig {
        token: Some("test-token".into()),
        api_url,
        request_timeout,
        max_concurrent_requests,
        ..Default::default()
    })
    .unwrap()
}
