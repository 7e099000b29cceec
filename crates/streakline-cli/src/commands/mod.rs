pub mod card;

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use streakline_core::classify::ActivitySummary;
use streakline_core::sources::{GitHubClient, ScrapeSource};
use streakline_core::store::{AnalyticsStore, SqliteStore, StoreHandle};
use streakline_core::{Aggregator, AggregatorOptions, AnalyticsRecord, RefreshOutcome};
use tokio::runtime::Runtime;

use crate::settings::Settings;

/// Wire the GitHub sources and `store` into an aggregator.
pub fn build_aggregator(settings: &Settings, store: Arc<dyn AnalyticsStore>) -> Result<Aggregator> {
    let github = Arc::new(
        GitHubClient::new(settings.github_config()).context("Failed to build GitHub client")?,
    );

    let mut aggregator = Aggregator::new(github.clone(), github, store).with_options(
        AggregatorOptions {
            primary_timeout: settings.scrape_timeout(),
            secondary_timeout: settings.api_timeout(),
            counters_timeout: settings.counters_timeout(),
            include_commit_activity: settings.commit_activity,
            commit_activity_timeout: settings.commit_activity_timeout(),
        },
    );

    if settings.scrape_enabled {
        let scrape = ScrapeSource::new(settings.web_url.clone(), settings.scrape_timeout())
            .context("Failed to build scrape client")?;
        aggregator = aggregator.with_primary(Arc::new(scrape));
    }

    Ok(aggregator)
}

pub fn run_update(username: &str, json: bool, no_spinner: bool) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let settings = Settings::load();
    let store = Arc::new(StoreHandle::new(settings.database_path()));
    let aggregator = build_aggregator(&settings, store)?;

    let spinner = if no_spinner || json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner());
        pb.set_message(format!("Fetching GitHub analytics for {}...", username));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    };

    let rt = Runtime::new()?;
    let result = rt.block_on(aggregator.refresh(username));

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let outcome = result.with_context(|| format!("Failed to refresh {}", username))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.record)?);
    } else {
        print_record(&outcome.record);
        print_source_note(&outcome);
    }

    Ok(())
}

pub fn run_show(username: &str, json: bool) -> Result<()> {
    let settings = Settings::load();
    let store = StoreHandle::new(settings.database_path());

    let key = streakline_core::canonical_username(username)?;
    let rt = Runtime::new()?;
    let record = rt
        .block_on(store.find(&key))
        .context("Failed to read analytics database")?;

    match record {
        Some(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
        Some(record) => print_record(&record),
        None => {
            if json {
                println!("{}", serde_json::json!({ "message": "No data found" }));
            } else {
                println!("\n  {}\n", "No data found".yellow());
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

pub fn run_migrate() -> Result<()> {
    let settings = Settings::load();
    let path = settings.database_path();

    let rt = Runtime::new()?;
    let removed = rt.block_on(async {
        let store = SqliteStore::open(&path).await?;
        store.migrate().await
    })
    .with_context(|| format!("Failed to migrate {}", path.display()))?;

    if removed.is_empty() {
        println!("  {}", "No legacy columns to remove.".bright_black());
    } else {
        for column in removed {
            println!("  {} {}", "Removed column".green(), column.bold());
        }
    }

    Ok(())
}

pub fn print_record(record: &AnalyticsRecord) {
    use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

    let summary = ActivitySummary::from_record(record);

    println!(
        "\n  {} {}\n",
        "GitHub Analytics".bold(),
        format!("@{}", record.username).cyan()
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Metric", "Value"]);

    let rows: Vec<(&str, String)> = vec![
        (
            "Total contributions",
            format!("{} ({})", record.total_contributions, summary.total_display),
        ),
        (
            "Current streak",
            format!("{} {}", record.current_streak, summary.current_badge),
        ),
        (
            "Longest streak",
            format!("{} {}", record.longest_streak, summary.longest_badge),
        ),
        ("Active weeks", record.active_weeks.to_string()),
        ("Daily average", summary.daily_average_display()),
        ("Activity level", summary.level.to_string()),
        (
            "Repositories",
            format!(
                "{} ({} private, {} forks)",
                record.total_repos, record.private_repos, record.forked_repos
            ),
        ),
        ("Stars", record.total_stars.to_string()),
        ("Forks", record.total_forks.to_string()),
        ("Commit activity", record.total_commit_activity.to_string()),
        ("Pull requests", record.total_prs.to_string()),
        ("Issues", record.total_issues.to_string()),
        ("Reviews", record.total_reviews.to_string()),
    ];

    for (metric, value) in rows {
        table.add_row(vec![Cell::new(metric), Cell::new(value)]);
    }

    println!("{table}");
    println!(
        "{}",
        format!(
            "  Last updated: {}",
            record.last_updated.format("%Y-%m-%d %H:%M UTC")
        )
        .bright_black()
    );
}

fn print_source_note(outcome: &RefreshOutcome) {
    match &outcome.fallback_reason {
        None => println!(
            "{}",
            format!("  Calendar source: {}", outcome.source).bright_black()
        ),
        Some(reason) => println!(
            "{}",
            format!("  Calendar source: {} (fallback: {})", outcome.source, reason).yellow()
        ),
    }
}
