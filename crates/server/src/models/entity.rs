//! Entity records and their search projection.
//!
//! Entities are the metadata records (samples, reagents, files, ...) that
//! searches run over. Only the attributes that queries can reach are
//! modelled here; the rest of the record is owned by the Entity service.

use serde::{Deserialize, Serialize};

use super::{ENTITY_ID_PREFIX, generate_id};

/// Reference from one Entity to another (origin or product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedItem {
    /// Identifier of the related Entity.
    #[serde(rename = "_id")]
    pub id: String,

    /// Display name of the related Entity.
    #[serde(default)]
    pub name: String,
}

impl RelatedItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier (`id_` prefix).
    #[serde(rename = "_id")]
    pub id: String,

    /// Owning Workspace.
    pub workspace: String,

    /// Entity name.
    pub name: String,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Identifiers of the Projects this Entity belongs to.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Entities this one was derived from.
    #[serde(default)]
    pub origins: Vec<RelatedItem>,

    /// Entities derived from this one.
    #[serde(default)]
    pub products: Vec<RelatedItem>,

    /// Archived Entities are hidden from text search by default.
    #[serde(default)]
    pub archived: bool,

    /// Unix timestamp when created.
    pub created: i64,
}

impl Entity {
    /// Create an Entity with a fresh identifier in the given Workspace.
    pub fn new(workspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: generate_id(ENTITY_ID_PREFIX),
            workspace: workspace.into(),
            name: name.into(),
            description: String::new(),
            projects: Vec::new(),
            origins: Vec::new(),
            products: Vec::new(),
            archived: false,
            created: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.projects.push(project.into());
        self
    }

    pub fn with_origin(mut self, origin: RelatedItem) -> Self {
        self.origins.push(origin);
        self
    }

    pub fn with_product(mut self, product: RelatedItem) -> Self {
        self.products.push(product);
        self
    }

    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }
}

/// Read-only projection of a matched Entity (`EntitySummary`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchResult {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&Entity> for SearchResult {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            description: entity.description.clone(),
        }
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn entity_uses_document_id_key() {
        let entity = Entity::new("w1", "Box A").with_id("id_box");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["_id"], "id_box");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn entity_deserializes_with_defaults() {
        let entity: Entity = serde_json::from_str(
            r#"{"_id":"id_1","workspace":"w1","name":"Tube","created":0}"#,
        )
        .unwrap();
        assert!(entity.description.is_empty());
        assert!(entity.projects.is_empty());
        assert!(entity.origins.is_empty());
        assert!(!entity.archived);
    }

    #[test]
    fn summary_projects_name_and_description() {
        let entity = Entity::new("w1", "Plate")
            .with_description("96-well plate")
            .with_project("p_1");
        let summary = SearchResult::from(&entity);
        assert_eq!(summary.id, entity.id);
        assert_eq!(summary.name, "Plate");
        assert_eq!(summary.description, "96-well plate");
    }
}
