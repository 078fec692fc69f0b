use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppResult,
    models::UserId,
    services::{Catalog, Ranking},
};

/// A ranked recommendation set kept for paging and playlist creation
#[derive(Debug, Clone)]
pub struct RecommendationRun {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub ranking: Ranking,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: reqwest::Client,
    pub catalog: Arc<Catalog>,
    pub runs: Arc<RwLock<HashMap<Uuid, RecommendationRun>>>,
    run_ttl: chrono::Duration,
}

impl AppState {
    /// Creates state around an already built catalog
    pub fn new(config: Config, catalog: Catalog) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let run_ttl = chrono::Duration::seconds(
            i64::try_from(config.run_ttl_secs)
                .unwrap_or(i64::MAX)
                .min(i64::MAX / 1000),
        );

        Ok(Self {
            run_ttl,
            config: Arc::new(config),
            http_client,
            catalog: Arc::new(catalog),
            runs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn is_expired(&self, run: &RecommendationRun, now: DateTime<Utc>) -> bool {
        now - run.created_at >= self.run_ttl
    }

    /// Stores a run, replacing any earlier run of the same user and sweeping
    /// expired runs of every user
    pub async fn insert_run(&self, run: RecommendationRun) -> Uuid {
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        let mut runs = self.runs.write().await;

        let before = runs.len();
        runs.retain(|_, existing| {
            existing.user_id != run.user_id && !self.is_expired(existing, now)
        });
        if runs.len() < before {
            tracing::debug!(removed = before - runs.len(), "Swept recommendation runs");
        }

        runs.insert(run_id, run);
        run_id
    }

    /// A stored run, unless it has expired
    pub async fn get_run(&self, run_id: &Uuid) -> Option<RecommendationRun> {
        let now = Utc::now();
        self.runs
            .read()
            .await
            .get(run_id)
            .filter(|run| !self.is_expired(run, now))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::features::RawTable;

    fn state(run_ttl_secs: u64) -> AppState {
        let config = Config {
            run_ttl_secs,
            ..Config::default()
        };
        AppState::new(config, Catalog::from_raw(RawTable::default()).unwrap()).unwrap()
    }

    fn run(user: &str, age_secs: i64) -> RecommendationRun {
        RecommendationRun {
            user_id: UserId::from(user),
            created_at: Utc::now() - chrono::Duration::seconds(age_secs),
            ranking: Ranking::default(),
        }
    }

    #[tokio::test]
    async fn test_new_run_replaces_same_user() {
        let state = state(3600);
        let first = state.insert_run(run("daniel", 0)).await;
        let second = state.insert_run(run("daniel", 0)).await;

        assert!(state.get_run(&first).await.is_none());
        assert!(state.get_run(&second).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_runs_are_hidden_and_swept() {
        let state = state(60);
        let stale = state.insert_run(run("ana", 120)).await;
        assert!(state.get_run(&stale).await.is_none());

        let fresh = state.insert_run(run("daniel", 0)).await;
        let runs = state.runs.read().await;
        assert_eq!(runs.len(), 1);
        assert!(runs.contains_key(&fresh));
    }
}
