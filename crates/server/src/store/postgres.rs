//! PostgreSQL store.
//!
//! Entities are searched through the `search_vector` tsvector column (GIN
//! indexed, name weighted over description). Counters advance with a single
//! `UPDATE ... RETURNING`, so concurrent callers never observe the same value.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::debug;

use super::{
    CounterStore, EntityStore, HealthCheck, RankedResult, StoreError, TextQuery,
};
use crate::models::{Counter, Entity, SearchResult};
use crate::query::sql::escape_like_wildcards;
use crate::query::{CompiledFilter, select_matching};

/// Map a sqlx error onto a store error, keeping context for the rest.
fn classify(err: sqlx::Error, context: &'static str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return StoreError::Duplicate,
            Some("40001") | Some("40P01") => return StoreError::Conflict,
            Some("22003") => return StoreError::Overflow,
            _ => {}
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(context))
}

/// Build a prefix-matching tsquery from cleaned terms: `a:* & b:*`.
pub fn build_tsquery(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("{t}:*"))
        .collect::<Vec<_>>()
        .join(" & ")
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore").finish()
    }
}

/// Ranked search row.
#[derive(sqlx::FromRow)]
struct RankedRow {
    id: String,
    name: String,
    description: String,
    rank: f32,
}

impl From<RankedRow> for RankedResult {
    fn from(row: RankedRow) -> Self {
        Self {
            result: SearchResult {
                id: row.id,
                name: row.name,
                description: row.description,
            },
            rank: row.rank,
        }
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn healthy(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn insert_entity(&self, entity: &Entity) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO entity
                (id, workspace, name, description, projects, origins, products, archived, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.workspace)
        .bind(&entity.name)
        .bind(&entity.description)
        .bind(Json(&entity.projects))
        .bind(Json(&entity.origins))
        .bind(Json(&entity.products))
        .bind(entity.archived)
        .bind(entity.created)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "failed to insert entity"))?;

        debug!(entity_id = %entity.id, workspace = %entity.workspace, "entity inserted");
        Ok(())
    }

    async fn text_search(&self, query: &TextQuery) -> Result<Vec<RankedResult>, StoreError> {
        let ts_query = build_tsquery(&query.terms);
        let needle = escape_like_wildcards(&query.raw.to_lowercase());
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        debug!(
            workspace = %query.workspace,
            ts_query = %ts_query,
            limit = limit,
            "executing text search"
        );

        // Rows of equal rank fall back to where the query appears.
        let rows = sqlx::query_as::<_, RankedRow>(
            r#"
            SELECT
                id,
                name,
                description,
                ts_rank(search_vector, to_tsquery('english', $1)) AS rank
            FROM entity
            WHERE workspace = $2
              AND ($3 OR archived = FALSE)
              AND (($1 <> '' AND search_vector @@ to_tsquery('english', $1)) OR id = $4)
              AND ($7::BIGINT IS NULL OR created >= $7)
              AND ($8::BIGINT IS NULL OR created <= $8)
              AND (NOT $9 OR jsonb_array_length(origins) > 0 OR jsonb_array_length(products) > 0)
            ORDER BY
                rank DESC,
                CASE
                    WHEN LOWER(name) LIKE $5 || '%' THEN 0
                    WHEN LOWER(name) LIKE '%' || $5 || '%' THEN 1
                    WHEN LOWER(description) LIKE '%' || $5 || '%' THEN 2
                    ELSE 3
                END,
                created DESC
            LIMIT $6
            "#,
        )
        .bind(&ts_query)
        .bind(&query.workspace)
        .bind(query.show_archived)
        .bind(&query.raw)
        .bind(&needle)
        .bind(limit)
        .bind(query.filters.created_from)
        .bind(query.filters.created_to)
        .bind(query.filters.has_relationships)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "failed to execute text search"))?;

        debug!(workspace = %query.workspace, returned = rows.len(), "text search completed");
        Ok(rows.into_iter().map(RankedResult::from).collect())
    }

    async fn find_matching(
        &self,
        workspace: &str,
        filter: &CompiledFilter,
        limit: u64,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let sql = select_matching(workspace, filter, limit);
        debug!(workspace = %workspace, sql = %sql, "executing filter search");

        let rows = sqlx::query_as::<_, SearchResult>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, "failed to execute filter search"))?;
        Ok(rows)
    }
}

#[async_trait]
impl CounterStore for PgStore {
    async fn insert_counter(&self, counter: &Counter) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO counter (id, workspace, name, format, current, increment, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&counter.id)
        .bind(&counter.workspace)
        .bind(&counter.name)
        .bind(&counter.format)
        .bind(counter.current)
        .bind(counter.increment)
        .bind(counter.created)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "failed to insert counter"))?;
        Ok(())
    }

    async fn get_counter(&self, id: &str) -> Result<Option<Counter>, StoreError> {
        sqlx::query_as::<_, Counter>(
            r#"
            SELECT id, workspace, name, format, current, increment, created
            FROM counter
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch counter")
        .map_err(StoreError::Backend)
    }

    async fn list_counters(&self, workspace: &str) -> Result<Vec<Counter>, StoreError> {
        sqlx::query_as::<_, Counter>(
            r#"
            SELECT id, workspace, name, format, current, increment, created
            FROM counter
            WHERE workspace = $1
            ORDER BY name
            "#,
        )
        .bind(workspace)
        .fetch_all(&self.pool)
        .await
        .context("failed to list counters")
        .map_err(StoreError::Backend)
    }

    async fn advance_counter(&self, id: &str, steps: i64) -> Result<Counter, StoreError> {
        let updated = sqlx::query_as::<_, Counter>(
            r#"
            UPDATE counter
            SET current = current + increment * $2
            WHERE id = $1
            RETURNING id, workspace, name, format, current, increment, created
            "#,
        )
        .bind(id)
        .bind(steps)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "failed to advance counter"))?;

        updated.ok_or(StoreError::NotFound)
    }
}
