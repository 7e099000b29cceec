use std::sync::Arc;
use std::time::Duration;

use streakline_core::Aggregator;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub refreshed: usize,
    pub failed: usize,
}

/// Refresh every user concurrently, one task each. Failures are logged and
/// counted; they never stop the other users.
pub async fn refresh_all(aggregator: &Arc<Aggregator>, users: &[String]) -> TickSummary {
    let mut handles = Vec::with_capacity(users.len());
    for username in users {
        let aggregator = Arc::clone(aggregator);
        let username = username.clone();
        let handle = tokio::spawn(async move {
            let result = aggregator.refresh(&username).await;
            (username, result)
        });
        handles.push(handle);
    }

    let mut summary = TickSummary::default();
    for handle in handles {
        match handle.await {
            Ok((_, Ok(_))) => summary.refreshed += 1,
            Ok((username, Err(err))) => {
                warn!(username = %username, error = %err, "Scheduled refresh failed");
                summary.failed += 1;
            }
            Err(err) => {
                error!(error = %err, "Scheduled refresh task panicked");
                summary.failed += 1;
            }
        }
    }

    info!(
        refreshed = summary.refreshed,
        failed = summary.failed,
        "Scheduled refresh finished"
    );
    summary
}

/// Refresh `users` now and then every `interval`. With `once`, stop after
/// the first round.
pub async fn run(aggregator: Arc<Aggregator>, users: Vec<String>, interval: Duration, once: bool) {
    if users.is_empty() {
        warn!("No users configured for scheduled refresh");
        return;
    }

    info!(
        users = users.len(),
        interval_secs = interval.as_secs(),
        "Starting scheduled refresh"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        refresh_all(&aggregator, &users).await;
        if once {
            break;
        }
    }
}
