//! Persistence backends.
//!
//! Search and counters talk to storage only through the traits defined here.
//! `PgStore` is the production backend; `MemoryStore` carries the same
//! semantics in process and backs the test suite and `memory://` runs.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::models::{Counter, Entity, SearchResult};
use crate::query::CompiledFilter;

/// Errors raised by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate record")]
    Duplicate,

    #[error("record not found")]
    NotFound,

    /// Serialization failure or deadlock; the operation may be retried.
    #[error("write conflict")]
    Conflict,

    /// A numeric value would leave its range.
    #[error("numeric overflow")]
    Overflow,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Parameters for a text-relevance search.
#[derive(Debug, Clone)]
pub struct TextQuery {
    /// Workspace to search in.
    pub workspace: String,
    /// Cleaned search terms, each matched as a word prefix.
    pub terms: Vec<String>,
    /// Trimmed raw query, compared against identifiers and names.
    pub raw: String,
    pub limit: u64,
    pub show_archived: bool,
    pub filters: TextFilters,
}

/// Optional restrictions on text-search hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextFilters {
    /// Earliest `created` timestamp, inclusive.
    pub created_from: Option<i64>,
    /// Latest `created` timestamp, inclusive.
    pub created_to: Option<i64>,
    /// Only Entities with at least one origin or product.
    pub has_relationships: bool,
}

impl TextFilters {
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.created_from.is_some_and(|from| entity.created < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| entity.created > to) {
            return false;
        }
        !self.has_relationships || !entity.origins.is_empty() || !entity.products.is_empty()
    }
}

/// Search hit with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub result: SearchResult,
    pub rank: f32,
}

/// Tie-break bucket for results of equal rank; lower sorts first.
///
/// 0: name starts with the query, 1: name contains it,
/// 2: description contains it, 3: anything else.
pub fn match_priority(result: &SearchResult, raw: &str) -> u8 {
    let needle = raw.to_lowercase();
    let name = result.name.to_lowercase();
    if name.starts_with(&needle) {
        0
    } else if name.contains(&needle) {
        1
    } else if result.description.to_lowercase().contains(&needle) {
        2
    } else {
        3
    }
}

/// Liveness check shared by every backend.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Whether the backend can currently serve requests.
    async fn healthy(&self) -> bool;
}

/// Entity storage as seen by search.
#[async_trait]
pub trait EntityStore: HealthCheck {
    /// Store an Entity.
    async fn insert_entity(&self, entity: &Entity) -> Result<(), StoreError>;

    /// Text-relevance search, ordered by descending rank and limited.
    async fn text_search(&self, query: &TextQuery) -> Result<Vec<RankedResult>, StoreError>;

    /// Entities in `workspace` matching `filter`, ordered by name and limited.
    async fn find_matching(
        &self,
        workspace: &str,
        filter: &CompiledFilter,
        limit: u64,
    ) -> Result<Vec<SearchResult>, StoreError>;
}

/// Counter storage.
#[async_trait]
pub trait CounterStore: HealthCheck {
    /// Store a new Counter. `(workspace, name)` must be unused.
    async fn insert_counter(&self, counter: &Counter) -> Result<(), StoreError>;

    async fn get_counter(&self, id: &str) -> Result<Option<Counter>, StoreError>;

    /// Counters in a Workspace, ordered by name.
    async fn list_counters(&self, workspace: &str) -> Result<Vec<Counter>, StoreError>;

    /// Atomically add `steps * increment` to `current` and return the updated
    /// Counter. On overflow the Counter is left unchanged.
    async fn advance_counter(&self, id: &str, steps: i64) -> Result<Counter, StoreError>;
}
