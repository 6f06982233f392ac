//! Query translation.
//!
//! Turns the visual query builder's rule tree into a `CompiledFilter` that
//! can be shipped to the search endpoint as a JSON document, rendered to SQL,
//! or evaluated in memory.

pub mod filter;
pub mod sql;
pub mod translate;
pub mod types;

pub use filter::{CompiledFilter, TextOp, TextPredicate};
pub use sql::select_matching;
pub use translate::{translate, translate_rule};
pub use types::{Combinator, Field, FieldKind, Operator, Rule, RuleGroup, RuleNode};

use serde::{Deserialize, Serialize};

/// Errors from translating or parsing a query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("operator '{operator}' is not valid for field '{field}'")]
    InvalidOperator { field: String, operator: String },

    #[error("invalid combinator: {0}")]
    InvalidCombinator(String),

    #[error("malformed filter: {0}")]
    MalformedFilter(String),
}

/// A translated query ready to hand to the search endpoint.
///
/// `is_builder` tells the backend to run the structured strategy rather than
/// text search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: CompiledFilter,
    pub is_builder: bool,
}

impl SearchQuery {
    /// Translate a rule tree into a builder-mode query.
    pub fn from_rules(group: &RuleGroup) -> Result<Self, QueryError> {
        Ok(Self {
            query: translate(group)?,
            is_builder: true,
        })
    }

    /// Serialized filter, the form the `query` parameter carries.
    pub fn query_string(&self) -> String {
        self.query.to_document().to_string()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn search_query_is_builder_mode() {
        let group = RuleGroup::and().with_rule(Rule::new("name", "contains", "Box"));
        let query = SearchQuery::from_rules(&group).unwrap();
        assert!(query.is_builder);
        assert_eq!(
            query.query_string(),
            r#"{"name":{"$contains":"Box"}}"#
        );
    }

    #[test]
    fn query_string_parses_back() {
        let group = RuleGroup::or()
            .with_rule(Rule::new("name", "=", "A"))
            .with_rule(Rule::new("origins", "contains", "id_1"));
        let query = SearchQuery::from_rules(&group).unwrap();
        let parsed = CompiledFilter::from_json_str(&query.query_string()).unwrap();
        assert_eq!(parsed, query.query);
    }

    #[test]
    fn search_query_serializes_camel_case() {
        let query = SearchQuery::from_rules(&RuleGroup::and()).unwrap();
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["isBuilder"], true);
        assert_eq!(json["query"], serde_json::json!({}));
    }
}
