//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::counter::CounterService;
use crate::db;
use crate::search::SearchService;
use crate::store::{CounterStore, EntityStore, HealthCheck, MemoryStore, PgStore};

/// Limits applied to search requests.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    /// Used when a request names no limit.
    pub default_limit: i64,
    /// Requested limits are clamped to this.
    pub max_limit: i64,
}

impl SearchLimits {
    /// Resolve a requested limit. Values below 1 are passed through so the
    /// search service can reject them.
    pub fn resolve(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 500,
        }
    }
}

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    search: SearchService,
    counters: CounterService,
    health: Arc<dyn HealthCheck>,
    /// Name of the active backend, reported by `/health`.
    store_kind: &'static str,
    limits: SearchLimits,
}

impl AppState {
    /// Connect to the configured backend and build the services.
    pub async fn new(config: &Config) -> Result<Self> {
        let limits = SearchLimits {
            default_limit: config.search_default_limit,
            max_limit: config.search_max_limit,
        };

        if config.uses_memory_store() {
            info!("using in-memory store");
            return Ok(Self::from_store(Arc::new(MemoryStore::new()), "memory", limits));
        }

        let pool = db::create_pool(config)
            .await
            .context("failed to create database pool")?;
        db::run_migrations(&pool).await?;
        info!("PostgreSQL store ready");

        Ok(Self::from_store(Arc::new(PgStore::new(pool)), "postgres", limits))
    }

    /// Build state over a single store serving both Entities and Counters.
    pub fn from_store<S>(store: Arc<S>, store_kind: &'static str, limits: SearchLimits) -> Self
    where
        S: EntityStore + CounterStore + 'static,
    {
        let entities: Arc<dyn EntityStore> = store.clone();
        let counters: Arc<dyn CounterStore> = store.clone();
        let health: Arc<dyn HealthCheck> = store;

        Self {
            inner: Arc::new(AppStateInner {
                search: SearchService::new(entities),
                counters: CounterService::new(counters),
                health,
                store_kind,
                limits,
            }),
        }
    }

    pub fn search(&self) -> &SearchService {
        &self.inner.search
    }

    pub fn counters(&self) -> &CounterService {
        &self.inner.counters
    }

    pub fn search_limits(&self) -> SearchLimits {
        self.inner.limits
    }

    pub fn store_kind(&self) -> &'static str {
        self.inner.store_kind
    }

    /// Whether the backing store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.health.healthy().await
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_and_clamp() {
        let limits = SearchLimits {
            default_limit: 100,
            max_limit: 500,
        };
        assert_eq!(limits.resolve(None), 100);
        assert_eq!(limits.resolve(Some(20)), 20);
        assert_eq!(limits.resolve(Some(10_000)), 500);
        assert_eq!(limits.resolve(Some(0)), 0);
    }
}
