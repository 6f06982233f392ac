#![allow(clippy::unwrap_used, clippy::expect_used)]
//! PostgreSQL store tests.
//!
//! These need a live database and are ignored by default:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/metadatify_test cargo test -- --ignored
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use metadatify_server::config::Config;
use metadatify_server::counter::{CounterService, NewCounter};
use metadatify_server::db;
use metadatify_server::models::{Entity, RelatedItem, generate_id};
use metadatify_server::query::{Rule, RuleGroup, SearchQuery};
use metadatify_server::search::{SearchRequest, SearchService};
use metadatify_server::store::{EntityStore, HealthCheck, PgStore};

async fn store() -> Arc<PgStore> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("DATABASE_URL must be set");
    let pool = db::create_pool(&config).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    Arc::new(PgStore::new(pool))
}

/// A workspace no other test run shares.
fn workspace() -> String {
    generate_id("ws_")
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn pg_store_is_healthy() {
    assert!(store().await.healthy().await);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn pg_text_search_ranks_and_scopes() {
    let store = store().await;
    let ws = workspace();
    let other = workspace();
    for entity in [
        Entity::new(&ws, "Cold storage").with_description("box shelf"),
        Entity::new(&ws, "Box 1"),
        Entity::new(&ws, "Archived box").archived(),
        Entity::new(&other, "Box 2"),
    ] {
        store.insert_entity(&entity).await.unwrap();
    }

    let service = SearchService::new(store);
    let results = service
        .search(SearchRequest::text("box", ws.as_str(), 10))
        .await
        .unwrap();
    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Box 1", "Cold storage"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn pg_builder_search_applies_filter() {
    let store = store().await;
    let ws = workspace();
    for entity in [
        Entity::new(&ws, "Stock 50%")
            .with_project("p_1")
            .with_product(RelatedItem::new("id_child", "Child")),
        Entity::new(&ws, "Stock 5")
            .with_project("p_2"),
        Entity::new(&ws, "Buffer").with_project("p_1"),
    ] {
        store.insert_entity(&entity).await.unwrap();
    }

    let service = SearchService::new(store);
    let group = RuleGroup::and()
        .with_rule(Rule::new("projects", "=", "p_1"))
        .with_rule(Rule::new("name", "contains", "50%"));
    let query = SearchQuery::from_rules(&group).unwrap();
    let results = service
        .search(SearchRequest::builder(query.query_string(), ws.as_str(), 10))
        .await
        .unwrap();
    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Stock 50%"]);

    let group = RuleGroup::and().with_rule(Rule::new("products", "doesNotContain", "id_child"));
    let query = SearchQuery::from_rules(&group).unwrap();
    let results = service
        .search(SearchRequest::builder(query.query_string(), ws.as_str(), 10))
        .await
        .unwrap();
    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Buffer", "Stock 5"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn pg_counter_advances_atomically() {
    let service = Arc::new(CounterService::new(store().await));
    let id = service
        .create(NewCounter {
            workspace: workspace(),
            name: "Samples".to_string(),
            format: "S-{}".to_string(),
            current: 0,
            increment: 1,
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = Arc::clone(&service);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            service.next_value_with_retry(&id).await.unwrap()
        }));
    }
    let mut seen = HashSet::new();
    for handle in handles {
        assert!(seen.insert(handle.await.unwrap()));
    }
    assert_eq!(service.current_value(&id).await.unwrap(), "S-20");
}
