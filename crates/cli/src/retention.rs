//! Periodic staleness sweep of market state snapshots.

use anyhow::Context;
use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tradestate_core::RetentionConfig;
use tradestate_data::MarketStateRepository;

/// Deletes snapshots not updated within `max_age_secs` and returns the count.
///
/// # Errors
/// Returns an error if the age does not fit a timestamp or the delete fails.
pub async fn sweep_once(repo: &MarketStateRepository, max_age_secs: u64) -> anyhow::Result<u64> {
    let age = i64::try_from(max_age_secs).context("max age out of range")?;
    let age = Duration::try_seconds(age).context("max age out of range")?;
    let cutoff = Utc::now()
        .checked_sub_signed(age)
        .context("max age reaches past the earliest timestamp")?;
    Ok(repo.delete_stale_before(cutoff).await?)
}

/// Spawns the periodic sweep. Returns `None` when the interval is zero.
pub fn spawn_sweeper(repo: MarketStateRepository, config: &RetentionConfig) -> Option<JoinHandle<()>> {
    if config.sweep_interval_secs == 0 {
        tracing::info!("Market state sweep disabled");
        return None;
    }

    let period = std::time::Duration::from_secs(config.sweep_interval_secs);
    let max_age_secs = config.market_state_max_age_secs;
    tracing::info!(
        every_secs = config.sweep_interval_secs,
        max_age_secs,
        "Market state sweep scheduled"
    );

    Some(tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            if let Err(e) = sweep_once(&repo, max_age_secs).await {
                tracing::warn!("Market state sweep failed: {:#}", e);
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradestate_core::ChangeNotifier;
    use tradestate_data::{Database, NewMarketState};

    async fn repo() -> MarketStateRepository {
        let db = Database::in_memory().await.unwrap();
        MarketStateRepository::new(db, ChangeNotifier::default())
    }

    #[tokio::test]
    async fn sweep_once_removes_only_old_rows() {
        let repo = repo().await;
        let now = Utc::now();
        repo.insert(&NewMarketState::new("OLD", 1.0, now - Duration::hours(2)))
            .await
            .unwrap();
        repo.insert(&NewMarketState::new("NEW", 1.0, now)).await.unwrap();

        assert_eq!(sweep_once(&repo, 3600).await.unwrap(), 1);
        assert_eq!(sweep_once(&repo, 3600).await.unwrap(), 0);
        assert!(repo.latest("NEW").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn huge_age_is_rejected() {
        let repo = repo().await;
        assert!(sweep_once(&repo, u64::MAX).await.is_err());
        assert!(sweep_once(&repo, 100_000_000_000_000).await.is_err());
        assert!(sweep_once(&repo, 10_000_000_000_000).await.is_err());
    }

    #[tokio::test]
    async fn sweeper_survives_unrepresentable_age() {
        let config = RetentionConfig {
            market_state_max_age_secs: 100_000_000_000_000,
            sweep_interval_secs: 3600,
        };
        let handle = spawn_sweeper(repo().await, &config).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn zero_interval_disables_sweeper() {
        let config = RetentionConfig {
            market_state_max_age_secs: 60,
            sweep_interval_secs: 0,
        };
        assert!(spawn_sweeper(repo().await, &config).is_none());
    }

    #[tokio::test]
    async fn sweeper_runs_on_first_tick() {
        let repo = repo().await;
        repo.insert(&NewMarketState::new("OLD", 1.0, Utc::now() - Duration::hours(2)))
            .await
            .unwrap();

        let config = RetentionConfig {
            market_state_max_age_secs: 60,
            sweep_interval_secs: 3600,
        };
        let handle = spawn_sweeper(repo.clone(), &config).unwrap();

        let mut swept = false;
        for _ in 0..50 {
            if repo.latest("OLD").await.unwrap().is_none() {
                swept = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(swept);
    }
}
