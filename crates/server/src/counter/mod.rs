//! Sequence counters.
//!
//! A Counter mints identifiers such as `SAMPLE-0042` by substituting an
//! ever-increasing number into its format. Every advance is a single atomic
//! store operation, so concurrent callers always receive distinct values.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::models::{COUNTER_ID_PREFIX, Counter, generate_id};
use crate::store::{CounterStore, StoreError};

/// Placeholder the numeric value replaces.
pub const PLACEHOLDER: &str = "{}";

/// Most values one batch request may reserve.
pub const MAX_BATCH: i64 = 1000;

/// Attempts made for an advance that keeps conflicting.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled for each further one.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(25);

/// Errors from counter operations.
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("counter not found: {0}")]
    NotFound(String),

    #[error("counter '{name}' already exists in workspace {workspace}")]
    Duplicate { workspace: String, name: String },

    #[error("counter {0} is outside the current workspace")]
    OutsideWorkspace(String),

    #[error("concurrent update conflict on counter {0}")]
    Conflict(String),

    #[error("counter {0} would exceed the largest representable value")]
    Overflow(String),

    #[error("format must contain exactly one '{{}}' placeholder: {0:?}")]
    InvalidFormat(String),

    #[error("increment must be positive, got {0}")]
    InvalidIncrement(i64),

    #[error("count must be between 1 and {max}, got {count}")]
    InvalidCount { count: i64, max: i64 },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Store(anyhow::Error),
}

impl CounterError {
    fn from_store(err: StoreError, id: &str) -> Self {
        match err {
            StoreError::NotFound => CounterError::NotFound(id.to_string()),
            StoreError::Conflict => CounterError::Conflict(id.to_string()),
            StoreError::Overflow => CounterError::Overflow(id.to_string()),
            StoreError::Duplicate => {
                CounterError::Store(anyhow::anyhow!("unexpected duplicate on counter {id}"))
            }
            StoreError::Backend(e) => CounterError::Store(e),
        }
    }
}

/// Validated counter format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterFormat(String);

impl CounterFormat {
    /// Accept a format containing exactly one placeholder.
    pub fn parse(format: &str) -> Result<Self, CounterError> {
        if format.matches(PLACEHOLDER).count() != 1 {
            return Err(CounterError::InvalidFormat(format.to_string()));
        }
        Ok(Self(format.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Input for creating a Counter.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCounter {
    #[serde(default)]
    pub workspace: String,
    pub name: String,
    pub format: String,
    /// Starting value; the first `next_value` returns `current + increment`.
    #[serde(alias = "initial")]
    pub current: i64,
    pub increment: i64,
}

/// Counter operations over a store.
#[derive(Clone)]
pub struct CounterService {
    store: Arc<dyn CounterStore>,
}

impl CounterService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Create a Counter and return its identifier.
    pub async fn create(&self, new: NewCounter) -> Result<String, CounterError> {
        let workspace = new.workspace.trim();
        if workspace.is_empty() {
            return Err(CounterError::MissingField("workspace"));
        }
        let name = new.name.trim();
        if name.is_empty() {
            return Err(CounterError::MissingField("name"));
        }
        let format = CounterFormat::parse(&new.format)?;
        if new.increment <= 0 {
            return Err(CounterError::InvalidIncrement(new.increment));
        }

        let counter = Counter {
            id: generate_id(COUNTER_ID_PREFIX),
            workspace: workspace.to_string(),
            name: name.to_string(),
            format: format.as_str().to_string(),
            current: new.current,
            increment: new.increment,
            created: chrono::Utc::now().timestamp(),
        };

        self.store
            .insert_counter(&counter)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate => CounterError::Duplicate {
                    workspace: counter.workspace.clone(),
                    name: counter.name.clone(),
                },
                other => CounterError::from_store(other, &counter.id),
            })?;

        info!(
            counter_id = %counter.id,
            workspace = %counter.workspace,
            name = %counter.name,
            "counter created"
        );
        Ok(counter.id)
    }

    pub async fn get(&self, id: &str) -> Result<Counter, CounterError> {
        self.store
            .get_counter(id)
            .await
            .map_err(|e| CounterError::from_store(e, id))?
            .ok_or_else(|| CounterError::NotFound(id.to_string()))
    }

    /// Fetch a Counter, requiring it to belong to `workspace`.
    pub async fn authorize(&self, id: &str, workspace: &str) -> Result<Counter, CounterError> {
        let counter = self.get(id).await?;
        if counter.workspace != workspace {
            warn!(counter_id = %id, workspace = %workspace, "counter accessed from another workspace");
            return Err(CounterError::OutsideWorkspace(id.to_string()));
        }
        Ok(counter)
    }

    /// Counters in a Workspace, ordered by name.
    pub async fn list(&self, workspace: &str) -> Result<Vec<Counter>, CounterError> {
        self.store
            .list_counters(workspace)
            .await
            .map_err(|e| CounterError::from_store(e, workspace))
    }

    /// Formatted current value. Does not advance the Counter.
    pub async fn current_value(&self, id: &str) -> Result<String, CounterError> {
        Ok(self.get(id).await?.current_value())
    }

    /// Advance by one increment and return the formatted new value.
    pub async fn next_value(&self, id: &str) -> Result<String, CounterError> {
        let counter = self
            .store
            .advance_counter(id, 1)
            .await
            .map_err(|e| CounterError::from_store(e, id))?;
        debug!(counter_id = %id, current = counter.current, "counter advanced");
        Ok(counter.current_value())
    }

    /// Advance by one increment without formatting the new value.
    pub async fn increment(&self, id: &str) -> Result<(), CounterError> {
        let counter = self
            .store
            .advance_counter(id, 1)
            .await
            .map_err(|e| CounterError::from_store(e, id))?;
        debug!(counter_id = %id, current = counter.current, "counter incremented");
        Ok(())
    }

    /// Reserve `count` consecutive values in one atomic advance and return
    /// each of them formatted, in order.
    pub async fn next_values(&self, id: &str, count: i64) -> Result<Vec<String>, CounterError> {
        if !(1..=MAX_BATCH).contains(&count) {
            return Err(CounterError::InvalidCount {
                count,
                max: MAX_BATCH,
            });
        }

        let counter = self
            .store
            .advance_counter(id, count)
            .await
            .map_err(|e| CounterError::from_store(e, id))?;
        debug!(counter_id = %id, count = count, current = counter.current, "counter advanced");

        // Every value between the old and new `current` fits, so none of
        // this can overflow.
        let values = (1..=count)
            .rev()
            .map(|back| counter.render(counter.current - counter.increment * (back - 1)))
            .collect();
        Ok(values)
    }

    /// `next_value`, retrying conflicts with exponential backoff.
    pub async fn next_value_with_retry(&self, id: &str) -> Result<String, CounterError> {
        retry_on_conflict(|| self.next_value(id)).await
    }

    /// `increment`, retrying conflicts with exponential backoff.
    pub async fn increment_with_retry(&self, id: &str) -> Result<(), CounterError> {
        retry_on_conflict(|| self.increment(id)).await
    }

    /// `next_values`, retrying conflicts with exponential backoff.
    pub async fn next_values_with_retry(
        &self,
        id: &str,
        count: i64,
    ) -> Result<Vec<String>, CounterError> {
        retry_on_conflict(|| self.next_values(id, count)).await
    }
}

impl std::fmt::Debug for CounterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterService").finish()
    }
}

/// Run `op`, retrying `Conflict` up to `RETRY_ATTEMPTS` attempts in total.
async fn retry_on_conflict<T, F, Fut>(mut op: F) -> Result<T, CounterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CounterError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(CounterError::Conflict(id)) if attempt < RETRY_ATTEMPTS => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(
                    counter_id = %id,
                    attempt = attempt,
                    delay = ?delay,
                    "counter update conflicted, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
