//! In-process store.
//!
//! Mirrors `PgStore` semantics: word-prefix text matching with a weighted
//! rank (name over description), exact identifier hits, and counter advances
//! that are atomic under a single mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    CounterStore, EntityStore, HealthCheck, RankedResult, StoreError, TextQuery, match_priority,
};
use crate::models::{Counter, Entity, SearchResult};
use crate::query::CompiledFilter;

/// Weight of a term hit in an Entity name.
const NAME_WEIGHT: f32 = 1.0;

/// Weight of a term hit in an Entity description.
const DESCRIPTION_WEIGHT: f32 = 0.4;

/// In-memory Entity and Counter store.
#[derive(Default)]
pub struct MemoryStore {
    entities: RwLock<Vec<Entity>>,
    counters: Mutex<HashMap<String, Counter>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "memory store is offline"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entities", &self.entities.read().len())
            .field("counters", &self.counters.lock().len())
            .finish()
    }
}

/// Whether any word of `text` starts with `term` (both lowercased).
fn has_word_prefix(text: &str, term: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| !word.is_empty() && word.starts_with(term))
}

/// Relevance of `entity` for `terms`, or `None` if some term is missing.
fn text_rank(entity: &Entity, terms: &[String]) -> Option<f32> {
    if terms.is_empty() {
        return None;
    }
    let mut rank = 0.0;
    for term in terms {
        let term = term.to_lowercase();
        let in_name = has_word_prefix(&entity.name, &term);
        let in_description = has_word_prefix(&entity.description, &term);
        if !in_name && !in_description {
            return None;
        }
        if in_name {
            rank += NAME_WEIGHT;
        }
        if in_description {
            rank += DESCRIPTION_WEIGHT;
        }
    }
    Some(rank)
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn healthy(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_entity(&self, entity: &Entity) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut entities = self.entities.write();
        if entities.iter().any(|e| e.id == entity.id) {
            return Err(StoreError::Duplicate);
        }
        entities.push(entity.clone());
        Ok(())
    }

    async fn text_search(&self, query: &TextQuery) -> Result<Vec<RankedResult>, StoreError> {
        self.ensure_online()?;
        let entities = self.entities.read();

        let mut hits: Vec<(i64, RankedResult)> = entities
            .iter()
            .filter(|e| e.workspace == query.workspace)
            .filter(|e| query.show_archived || !e.archived)
            .filter(|e| query.filters.matches(e))
            .filter_map(|e| {
                let rank = match text_rank(e, &query.terms) {
                    Some(rank) => rank,
                    None if !query.raw.is_empty() && e.id == query.raw => 0.0,
                    None => return None,
                };
                Some((
                    e.created,
                    RankedResult {
                        result: SearchResult::from(e),
                        rank,
                    },
                ))
            })
            .collect();

        // Same order as the SQL backend, so the limit cuts the same rows.
        hits.sort_by(|(a_created, a), (b_created, b)| {
            b.rank
                .total_cmp(&a.rank)
                .then_with(|| {
                    match_priority(&a.result, &query.raw)
                        .cmp(&match_priority(&b.result, &query.raw))
                })
                .then_with(|| b_created.cmp(a_created))
        });
        hits.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));

        debug!(
            workspace = %query.workspace,
            terms = query.terms.len(),
            hits = hits.len(),
            "memory text search"
        );
        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn find_matching(
        &self,
        workspace: &str,
        filter: &CompiledFilter,
        limit: u64,
    ) -> Result<Vec<SearchResult>, StoreError> {
        self.ensure_online()?;
        let entities = self.entities.read();

        let mut results: Vec<SearchResult> = entities
            .iter()
            .filter(|e| e.workspace == workspace && filter.matches(e))
            .map(SearchResult::from)
            .collect();
        results.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        results.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(results)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn insert_counter(&self, counter: &Counter) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut counters = self.counters.lock();
        let taken = counters.contains_key(&counter.id)
            || counters
                .values()
                .any(|c| c.workspace == counter.workspace && c.name == counter.name);
        if taken {
            return Err(StoreError::Duplicate);
        }
        counters.insert(counter.id.clone(), counter.clone());
        Ok(())
    }

    async fn get_counter(&self, id: &str) -> Result<Option<Counter>, StoreError> {
        self.ensure_online()?;
        Ok(self.counters.lock().get(id).cloned())
    }

    async fn list_counters(&self, workspace: &str) -> Result<Vec<Counter>, StoreError> {
        self.ensure_online()?;
        let mut counters: Vec<Counter> = self
            .counters
            .lock()
            .values()
            .filter(|c| c.workspace == workspace)
            .cloned()
            .collect();
        counters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counters)
    }

    async fn advance_counter(&self, id: &str, steps: i64) -> Result<Counter, StoreError> {
        self.ensure_online()?;
        let mut counters = self.counters.lock();
        let counter = counters.get_mut(id).ok_or(StoreError::NotFound)?;
        let next = counter
            .increment
            .checked_mul(steps)
            .and_then(|delta| counter.current.checked_add(delta))
            .ok_or(StoreError::Overflow)?;
        counter.current = next;
        Ok(counter.clone())
    }
}
