use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::models::projects::ProjectSummary;
use crate::models::users;

/// In-process read cache for the hot, rarely-changing lookups: the open
/// project board and user rows resolved by the session extractor.
#[derive(Clone)]
pub struct AppCache {
    listings: Cache<String, Arc<Vec<ProjectSummary>>>,
    users: Cache<Uuid, users::Model>,
}

impl AppCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            listings: Cache::builder()
                .time_to_live(config.open_projects_ttl)
                .max_capacity(16)
                .build(),
            users: Cache::builder()
                .time_to_live(config.user_ttl)
                .max_capacity(10_000)
                .build(),
        }
    }

    /// Get the cached open-project listing
    pub async fn open_projects(&self) -> Option<Arc<Vec<ProjectSummary>>> {
        let hit = self.listings.get(&keys::open_projects()).await;
        if hit.is_none() {
            debug!("cache miss: open projects");
        }
        hit
    }

    pub async fn set_open_projects(
        &self,
        projects: Vec<ProjectSummary>,
    ) -> Arc<Vec<ProjectSummary>> {
        let projects = Arc::new(projects);
        self.listings
            .insert(keys::open_projects(), projects.clone())
            .await;
        projects
    }

    /// Drop the open listing; called after any write that can change it.
    pub async fn invalidate_open_projects(&self) {
        self.listings.invalidate(&keys::open_projects()).await;
    }

    pub async fn user(&self, id: Uuid) -> Option<users::Model> {
        self.users.get(&id).await
    }

    pub async fn set_user(&self, user: users::Model) {
        self.users.insert(user.id, user).await;
    }
}

/// Cache key generators
pub mod keys {
    /// Key for the open-project board
    pub fn open_projects() -> String {
        "projects:open".to_string()
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub open_projects_ttl: Duration,
    pub user_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            open_projects_ttl: Duration::from_secs(60), // 1 minute
            user_ttl: Duration::from_secs(300),         // 5 minutes
        }
    }
}

impl CacheConfig {
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            open_projects_ttl: parse_duration_secs(lookup, "CACHE_TTL_OPEN_PROJECTS", 60),
            user_ttl: parse_duration_secs(lookup, "CACHE_TTL_USERS", 300),
        }
    }
}

fn parse_duration_secs<F>(lookup: &F, env_var: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(env_var)
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::projects::ProjectStatus;

    fn summary(title: &str) -> ProjectSummary {
        ProjectSummary {
            id: Uuid::new_v4(),
            title: title.into(),
            budget: 100,
            status: ProjectStatus::Open,
            created_at: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            deadline: 7,
            deadline_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 8),
            client_username: Some("carol".into()),
        }
    }

    #[tokio::test]
    async fn open_listing_round_trips_and_invalidates() {
        let cache = AppCache::new(&CacheConfig::default());
        assert!(cache.open_projects().await.is_none());

        cache.set_open_projects(vec![summary("a"), summary("b")]).await;
        assert_eq!(cache.open_projects().await.unwrap().len(), 2);

        cache.invalidate_open_projects().await;
        assert!(cache.open_projects().await.is_none());
    }

    #[test]
    fn ttl_falls_back_to_default_on_garbage() {
        let config = CacheConfig::from_lookup(&|key: &str| {
            (key == "CACHE_TTL_USERS").then(|| "soon".to_string())
        });
        assert_eq!(config.user_ttl, Duration::from_secs(300));
        assert_eq!(config.open_projects_ttl, Duration::from_secs(60));
    }
}
