use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use streakline_core::sources::{GitHubConfig, RepoScope, DEFAULT_API_URL, DEFAULT_WEB_URL};

const DEFAULT_SCRAPE_TIMEOUT_MS: u64 = 10_000;
const MIN_SCRAPE_TIMEOUT_MS: u64 = 1_000;
const MAX_SCRAPE_TIMEOUT_MS: u64 = 60_000;

const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;
const MIN_API_TIMEOUT_MS: u64 = 1_000;
const MAX_API_TIMEOUT_MS: u64 = 120_000;

const DEFAULT_COUNTERS_TIMEOUT_MS: u64 = 60_000;
const MIN_COUNTERS_TIMEOUT_MS: u64 = 5_000;
const MAX_COUNTERS_TIMEOUT_MS: u64 = 600_000; // 10 minutes

const DEFAULT_COMMIT_ACTIVITY_TIMEOUT_MS: u64 = 60_000;
const MIN_COMMIT_ACTIVITY_TIMEOUT_MS: u64 = 1_000;
const MAX_COMMIT_ACTIVITY_TIMEOUT_MS: u64 = 600_000;

const DEFAULT_REFRESH_INTERVAL_HOURS: u64 = 6;
const MAX_REFRESH_INTERVAL_HOURS: u64 = 168; // 1 week

const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub github_token: Option<String>,
    pub database_path: Option<PathBuf>,
    pub api_url: String,
    pub web_url: String,
    pub host: String,
    pub port: u16,
    /// Users refreshed by `serve` and `schedule`.
    pub users: Vec<String>,
    pub refresh_interval_hours: u64,
    pub scrape_enabled: bool,
    pub scrape_timeout_ms: u64,
    pub api_timeout_ms: u64,
    pub counters_timeout_ms: u64,
    pub commit_activity: bool,
    pub commit_activity_timeout_ms: u64,
    pub repo_scope: RepoScope,
    pub max_concurrent_requests: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            github_token: None,
            database_path: None,
            api_url: DEFAULT_API_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            users: Vec::new(),
            refresh_interval_hours: DEFAULT_REFRESH_INTERVAL_HOURS,
            scrape_enabled: true,
            scrape_timeout_ms: DEFAULT_SCRAPE_TIMEOUT_MS,
            api_timeout_ms: DEFAULT_API_TIMEOUT_MS,
            counters_timeout_ms: DEFAULT_COUNTERS_TIMEOUT_MS,
            commit_activity: false,
            commit_activity_timeout_ms: DEFAULT_COMMIT_ACTIVITY_TIMEOUT_MS,
            repo_scope: RepoScope::default(),
            max_concurrent_requests: 8,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("STREAKLINE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("streakline").join("config.toml"))
    }

    /// Load the config file, falling back to defaults when it is missing or
    /// unparsable, then apply environment overrides.
    pub fn load() -> Self {
        let mut settings: Settings = Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default();
        settings.apply_env();
        settings
    }

    fn apply_env(&mut self) {
        if let Some(token) = env_string("GITHUB_TOKEN") {
            self.github_token = Some(token);
        }
        if let Some(path) = env_string("STREAKLINE_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(url) = env_string("STREAKLINE_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = env_string("STREAKLINE_WEB_URL") {
            self.web_url = url;
        }
        if let Some(host) = env_string("HOST") {
            self.host = host;
        }
        if let Some(port) = env_string("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
    }

    /// Priority: `STREAKLINE_DATABASE` > config file > platform data dir.
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join("streakline"))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("analytics.db")
        })
    }

    pub fn scrape_timeout(&self) -> Duration {
        timeout_from_env(
            "STREAKLINE_SCRAPE_TIMEOUT_MS",
            self.scrape_timeout_ms,
            MIN_SCRAPE_TIMEOUT_MS,
            MAX_SCRAPE_TIMEOUT_MS,
        )
    }

    pub fn api_timeout(&self) -> Duration {
        timeout_from_env(
            "STREAKLINE_API_TIMEOUT_MS",
            self.api_timeout_ms,
            MIN_API_TIMEOUT_MS,
            MAX_API_TIMEOUT_MS,
        )
    }

    pub fn counters_timeout(&self) -> Duration {
        timeout_from_env(
            "STREAKLINE_COUNTERS_TIMEOUT_MS",
            self.counters_timeout_ms,
            MIN_COUNTERS_TIMEOUT_MS,
            MAX_COUNTERS_TIMEOUT_MS,
        )
    }

    pub fn commit_activity_timeout(&self) -> Duration {
        timeout_from_env(
            "STREAKLINE_COMMIT_ACTIVITY_TIMEOUT_MS",
            self.commit_activity_timeout_ms,
            MIN_COMMIT_ACTIVITY_TIMEOUT_MS,
            MAX_COMMIT_ACTIVITY_TIMEOUT_MS,
        )
    }

    pub fn refresh_interval(&self) -> Duration {
        let hours = self
            .refresh_interval_hours
            .clamp(1, MAX_REFRESH_INTERVAL_HOURS);
        Duration::from_secs(hours * 3600)
    }

    pub fn github_config(&self) -> GitHubConfig {
        GitHubConfig {
            token: self.github_token.clone(),
            api_url: self.api_url.clone(),
            web_url: self.web_url.clone(),
            request_timeout: self.api_timeout(),
            max_concurrent_requests: self.max_concurrent_requests.max(1),
            repo_scope: self.repo_scope,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Env var (milliseconds) > configured value, clamped to `[min, max]`.
fn timeout_from_env(var: &str, configured_ms: u64, min_ms: u64, max_ms: u64) -> Duration {
    let timeout_ms = match std::env::var(var) {
        Ok(env_val) => env_val.parse::<u64>().unwrap_or(configured_ms),
        Err(_) => configured_ms,
    };
    Duration::from_millis(timeout_ms.clamp(min_ms, max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.refresh_interval(), Duration::from_secs(6 * 3600));
        assert!(settings.scrape_enabled);
        assert!(!settings.commit_activity);
        assert_eq!(settings.repo_scope, RepoScope::Authenticated);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            users = ["shoybit", "octocat"]
            commit_activity = true
            repo_scope = "public"
            "#,
        )
        .unwrap();
        assert_eq!(settings.users, vec!["shoybit", "octocat"]);
        assert!(settings.commit_activity);
        assert_eq!(settings.repo_scope, RepoScope::Public);
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
    }

    #[test]
    #[serial]
    fn test_commit_activity_timeout_from_toml() {
        env::remove_var("STREAKLINE_COMMIT_ACTIVITY_TIMEOUT_MS");
        let settings: Settings = toml::from_str("commit_activity_timeout_ms = 15000").unwrap();
        assert_eq!(settings.commit_activity_timeout(), Duration::from_secs(15));
        assert_eq!(
            Settings::default().commit_activity_timeout(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_interval_is_clamped() {
        let settings = Settings {
            refresh_interval_hours: 0,
            ..Default::default()
        };
        assert_eq!(settings.refresh_interval(), Duration::from_secs(3600));

        let settings = Settings {
            refresh_interval_hours: 10_000,
            ..Default::default()
        };
        assert_eq!(settings.refresh_interval(), Duration::from_secs(168 * 3600));
    }

    #[test]
    #[serial]
    fn test_scrape_timeout_env_override_and_clamp() {
        let settings = Settings::default();

        env::remove_var("STREAKLINE_SCRAPE_TIMEOUT_MS");
        assert_eq!(settings.scrape_timeout(), Duration::from_millis(10_000));

        env::set_var("STREAKLINE_SCRAPE_TIMEOUT_MS", "2500");
        assert_eq!(settings.scrape_timeout(), Duration::from_millis(2_500));

        env::set_var("STREAKLINE_SCRAPE_TIMEOUT_MS", "5");
        assert_eq!(settings.scrape_timeout(), Duration::from_millis(1_000));

        env::set_var("STREAKLINE_SCRAPE_TIMEOUT_MS", "not-a-number");
        assert_eq!(settings.scrape_timeout(), Duration::from_millis(10_000));

        env::remove_var("STREAKLINE_SCRAPE_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn test_load_applies_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "port = 8080\nhost = \"127.0.0.1\"\n").unwrap();

        env::set_var("STREAKLINE_CONFIG", &config);
        env::set_var("PORT", "9090");
        env::set_var("STREAKLINE_DATABASE", dir.path().join("x.db"));
        env::remove_var("HOST");

        let settings = Settings::load();
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.database_path(), dir.path().join("x.db"));

        env::remove_var("STREAKLINE_CONFIG");
        env::remove_var("PORT");
        env::remove_var("STREAKLINE_DATABASE");
    }

    #[test]
    #[serial]
    fn test_load_falls_back_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "this is = = not toml").unwrap();

        env::set_var("STREAKLINE_CONFIG", &config);
        env::remove_var("PORT");
        let settings = Settings::load();
        assert_eq!(settings.port, DEFAULT_PORT);
        env::remove_var("STREAKLINE_CONFIG");
    }
}
