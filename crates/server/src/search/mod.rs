//! Entity search.
//!
//! Two strategies share one entry point:
//! - text mode: relevance search over name and description, plus exact
//!   identifier hits, ranked and tie-broken by where the query appears
//! - builder mode: the query is a serialized `CompiledFilter` applied as a
//!   structured filter, ordered by name
//!
//! Every search is scoped to the caller's Workspace.

pub mod tokens;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::models::SearchResult;
use crate::query::{CompiledFilter, QueryError};
use crate::store::{EntityStore, TextFilters, TextQuery, match_priority};

/// Errors from a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// No active Workspace, or the store could not be reached.
    #[error("search unavailable: {0}")]
    Unavailable(String),

    #[error("limit must be at least 1, got {0}")]
    InvalidLimit(i64),

    #[error("invalid date filter: {0:?}")]
    InvalidDate(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// A search as requested by a caller.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Free text, or a serialized filter when `is_builder` is set.
    pub query: String,
    pub is_builder: bool,
    /// Active Workspace of the caller.
    pub workspace: Option<String>,
    pub limit: i64,
    /// Include archived Entities in text mode.
    pub show_archived: bool,
    /// Extra text-mode restrictions.
    pub filters: SearchFilters,
}

/// Optional text-mode filters as sent by clients.
///
/// Dates are RFC 3339 timestamps or plain `YYYY-MM-DD` dates. The end date
/// covers the whole of its day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub has_relationships: bool,
}

impl SearchFilters {
    /// Resolve the dates into inclusive `created` bounds.
    pub fn resolve(&self) -> Result<TextFilters, SearchError> {
        let created_from = self
            .start_date
            .as_deref()
            .map(|raw| parse_date(raw).map(|dt| dt.timestamp()))
            .transpose()?;
        let created_to = self
            .end_date
            .as_deref()
            .map(|raw| parse_date(raw).map(end_of_day))
            .transpose()?;
        Ok(TextFilters {
            created_from,
            created_to,
            has_relationships: self.has_relationships,
        })
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, SearchError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| SearchError::InvalidDate(raw.to_string()))
}

/// Last second of the UTC day containing `dt`.
fn end_of_day(dt: DateTime<Utc>) -> i64 {
    dt.date_naive().and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399
}

impl SearchRequest {
    /// Text-mode request.
    pub fn text(query: impl Into<String>, workspace: impl Into<String>, limit: i64) -> Self {
        Self {
            query: query.into(),
            is_builder: false,
            workspace: Some(workspace.into()),
            limit,
            show_archived: false,
            filters: SearchFilters::default(),
        }
    }

    /// Builder-mode request over a serialized filter.
    pub fn builder(filter: impl Into<String>, workspace: impl Into<String>, limit: i64) -> Self {
        Self {
            query: filter.into(),
            is_builder: true,
            workspace: Some(workspace.into()),
            limit,
            show_archived: false,
            filters: SearchFilters::default(),
        }
    }
}

/// Search dispatcher over an Entity store.
#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn EntityStore>,
}

impl SearchService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Run a search.
    ///
    /// Empty result sets are successes. Store failures surface as
    /// `Unavailable`; no partial results are returned.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>, SearchError> {
        let workspace = request
            .workspace
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| {
                warn!("search attempted without an active workspace");
                SearchError::Unavailable("no active workspace".to_string())
            })?;

        let limit = u64::try_from(request.limit)
            .ok()
            .filter(|l| *l >= 1)
            .ok_or(SearchError::InvalidLimit(request.limit))?;

        if request.is_builder {
            self.builder_search(workspace, &request.query, limit).await
        } else {
            let filters = request.filters.resolve()?;
            self.text_search(workspace, &request.query, limit, request.show_archived, filters)
                .await
        }
    }

    async fn text_search(
        &self,
        workspace: &str,
        query: &str,
        limit: u64,
        show_archived: bool,
        filters: TextFilters,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let raw = query.trim();
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let text_query = TextQuery {
            workspace: workspace.to_string(),
            terms: tokens::tokenize(raw),
            raw: raw.to_string(),
            limit,
            show_archived,
            filters,
        };

        let mut hits = self.store.text_search(&text_query).await.map_err(|e| {
            error!(error = %e, workspace = %workspace, "text search failed");
            SearchError::Unavailable("search backend failed".to_string())
        })?;

        hits.sort_by(|a, b| {
            b.rank.total_cmp(&a.rank).then_with(|| {
                match_priority(&a.result, raw).cmp(&match_priority(&b.result, raw))
            })
        });
        hits.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        debug!(
            workspace = %workspace,
            terms = text_query.terms.len(),
            returned = hits.len(),
            "text search completed"
        );
        Ok(hits.into_iter().map(|hit| hit.result).collect())
    }

    async fn builder_search(
        &self,
        workspace: &str,
        query: &str,
        limit: u64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let filter = CompiledFilter::from_json_str(query)?;

        let results = self
            .store
            .find_matching(workspace, &filter, limit)
            .await
            .map_err(|e| {
                error!(error = %e, workspace = %workspace, "filter search failed");
                SearchError::Unavailable("search backend failed".to_string())
            })?;

        debug!(workspace = %workspace, returned = results.len(), "filter search completed");
        Ok(results)
    }
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService").finish()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use crate::store::MemoryStore;

    async fn service_with(entities: &[Entity]) -> (SearchService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for entity in entities {
            store.insert_entity(entity).await.unwrap();
        }
        (SearchService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn missing_workspace_is_unavailable() {
        let (service, _) = service_with(&[]).await;
        let mut request = SearchRequest::text("box", "w1", 10);
        request.workspace = None;
        assert!(matches!(
            service.search(request).await,
            Err(SearchError::Unavailable(_))
        ));
        let blank = SearchRequest::text("box", "  ", 10);
        assert!(matches!(
            service.search(blank).await,
            Err(SearchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn non_positive_limit_is_rejected() {
        let (service, _) = service_with(&[]).await;
        assert!(matches!(
            service.search(SearchRequest::text("box", "w1", 0)).await,
            Err(SearchError::InvalidLimit(0))
        ));
        assert!(matches!(
            service.search(SearchRequest::text("box", "w1", -3)).await,
            Err(SearchError::InvalidLimit(-3))
        ));
    }

    #[tokio::test]
    async fn blank_text_query_returns_nothing() {
        let (service, _) = service_with(&[Entity::new("w1", "Box")]).await;
        let results = service.search(SearchRequest::text("   ", "w1", 10)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn equal_rank_prefers_name_prefix() {
        let (service, _) = service_with(&[
            Entity::new("w1", "Cold storage").with_description("box shelf"),
            Entity::new("w1", "Large box"),
            Entity::new("w1", "Box 1"),
        ])
        .await;
        let results = service.search(SearchRequest::text("box", "w1", 10)).await.unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Box 1", "Large box", "Cold storage"]);
    }

    #[test]
    fn date_filters_resolve_to_inclusive_bounds() {
        let filters = SearchFilters {
            start_date: Some("2024-03-01".to_string()),
            end_date: Some("2024-03-02T08:30:00Z".to_string()),
            has_relationships: true,
        };
        let resolved = filters.resolve().unwrap();
        assert_eq!(resolved.created_from, Some(1_709_251_200));
        assert_eq!(resolved.created_to, Some(1_709_423_999));
        assert!(resolved.has_relationships);
    }

    #[test]
    fn unparseable_date_is_rejected() {
        let filters = SearchFilters {
            start_date: Some("last tuesday".to_string()),
            ..SearchFilters::default()
        };
        assert!(matches!(filters.resolve(), Err(SearchError::InvalidDate(_))));
    }

    #[tokio::test]
    async fn tie_break_applies_before_limit() {
        let mut older = Entity::new("w1", "Box 1");
        older.created = 1;
        let mut newer = Entity::new("w1", "Large box");
        newer.created = 2;
        let (service, _) = service_with(&[older, newer]).await;

        let first = service.search(SearchRequest::text("box", "w1", 10)).await.unwrap();
        let top = service.search(SearchRequest::text("box", "w1", 1)).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "Box 1");
        assert_eq!(top[0], first[0]);
    }

    #[tokio::test]
    async fn malformed_builder_query_is_a_query_error() {
        let (service, _) = service_with(&[]).await;
        let result = service
            .search(SearchRequest::builder("{broken", "w1", 10))
            .await;
        assert!(matches!(result, Err(SearchError::Query(_))));
    }

    #[tokio::test]
    async fn store_failure_is_unavailable() {
        let (service, store) = service_with(&[Entity::new("w1", "Box")]).await;
        store.set_offline(true);
        assert!(matches!(
            service.search(SearchRequest::text("box", "w1", 10)).await,
            Err(SearchError::Unavailable(_))
        ));
        assert!(matches!(
            service.search(SearchRequest::builder("{}", "w1", 10)).await,
            Err(SearchError::Unavailable(_))
        ));
    }
}
