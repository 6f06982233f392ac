//! Compiled filter expressions.
//!
//! A `CompiledFilter` is the translated form of a rule tree. It has a JSON
//! document form that follows the document-store filter dialect the client
//! already speaks:
//!
//! ```json
//! { "$and": [
//!     { "name": { "$contains": "Box" } },
//!     { "products": { "$not": { "$elemMatch": { "_id": "id_42" } } } }
//! ] }
//! ```
//!
//! An empty document matches everything and a top-level array is read as an
//! implicit `$and`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

use super::QueryError;
use super::types::{Field, FieldKind, Operator};
use crate::models::Entity;

/// String comparison applied to a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Equals,
    Contains,
    BeginsWith,
    EndsWith,
}

impl TextOp {
    fn document_key(&self, negated: bool) -> &'static str {
        match (self, negated) {
            (TextOp::Equals, false) => "$eq",
            (TextOp::Equals, true) => "$ne",
            (TextOp::Contains, _) => "$contains",
            (TextOp::BeginsWith, _) => "$beginsWith",
            (TextOp::EndsWith, _) => "$endsWith",
        }
    }

    /// Returns the op and whether the key itself carries negation (`$ne`).
    fn from_document_key(key: &str) -> Option<(Self, bool)> {
        match key {
            "$eq" => Some((TextOp::Equals, false)),
            "$ne" => Some((TextOp::Equals, true)),
            "$contains" => Some((TextOp::Contains, false)),
            "$beginsWith" => Some((TextOp::BeginsWith, false)),
            "$endsWith" => Some((TextOp::EndsWith, false)),
            _ => None,
        }
    }

    /// Evaluate against a single value. Substring ops ignore case.
    pub fn test(&self, candidate: &str, value: &str) -> bool {
        match self {
            TextOp::Equals => candidate == value,
            TextOp::Contains => candidate.to_lowercase().contains(&value.to_lowercase()),
            TextOp::BeginsWith => candidate.to_lowercase().starts_with(&value.to_lowercase()),
            TextOp::EndsWith => candidate.to_lowercase().ends_with(&value.to_lowercase()),
        }
    }
}

/// Predicate on a text or text-list field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPredicate {
    pub op: TextOp,
    pub value: String,
    pub negated: bool,
}

impl TextPredicate {
    /// Build the predicate a rule operator stands for.
    pub fn from_operator(operator: Operator, value: impl Into<String>) -> Self {
        let (op, negated) = match operator {
            Operator::Equals => (TextOp::Equals, false),
            Operator::NotEquals => (TextOp::Equals, true),
            Operator::Contains => (TextOp::Contains, false),
            Operator::BeginsWith => (TextOp::BeginsWith, false),
            Operator::EndsWith => (TextOp::EndsWith, false),
            Operator::DoesNotContain => (TextOp::Contains, true),
            Operator::DoesNotBeginWith => (TextOp::BeginsWith, true),
            Operator::DoesNotEndWith => (TextOp::EndsWith, true),
        };
        Self {
            op,
            value: value.into(),
            negated,
        }
    }
}

/// Translated filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledFilter {
    /// Matches every Entity.
    All,
    And(Vec<CompiledFilter>),
    Or(Vec<CompiledFilter>),
    Not(Box<CompiledFilter>),
    Text {
        field: Field,
        predicate: TextPredicate,
    },
    /// Membership of an Entity id in a relationship list.
    Related {
        field: Field,
        id: String,
        negated: bool,
    },
}

impl CompiledFilter {
    /// Conjunction. Match-all children are dropped; nothing left is match-all.
    pub fn and(children: Vec<CompiledFilter>) -> Self {
        let mut children: Vec<_> = children
            .into_iter()
            .filter(|c| *c != CompiledFilter::All)
            .collect();
        match children.len() {
            0 => CompiledFilter::All,
            1 => children.remove(0),
            _ => CompiledFilter::And(children),
        }
    }

    /// Disjunction. Any match-all child makes the whole match-all.
    pub fn or(mut children: Vec<CompiledFilter>) -> Self {
        if children.is_empty() || children.contains(&CompiledFilter::All) {
            return CompiledFilter::All;
        }
        if children.len() == 1 {
            return children.remove(0);
        }
        CompiledFilter::Or(children)
    }

    /// Negation, folded into leaf predicates where possible.
    pub fn negate(filter: CompiledFilter) -> Self {
        match filter {
            CompiledFilter::Not(inner) => *inner,
            CompiledFilter::Text {
                field,
                mut predicate,
            } => {
                predicate.negated = !predicate.negated;
                CompiledFilter::Text { field, predicate }
            }
            CompiledFilter::Related { field, id, negated } => CompiledFilter::Related {
                field,
                id,
                negated: !negated,
            },
            other => CompiledFilter::Not(Box::new(other)),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, CompiledFilter::All)
    }

    /// Evaluate this filter against an Entity.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            CompiledFilter::All => true,
            CompiledFilter::And(children) => children.iter().all(|c| c.matches(entity)),
            CompiledFilter::Or(children) => children.iter().any(|c| c.matches(entity)),
            CompiledFilter::Not(inner) => !inner.matches(entity),
            CompiledFilter::Text { field, predicate } => {
                let hit = text_values(entity, *field)
                    .iter()
                    .any(|candidate| predicate.op.test(candidate, &predicate.value));
                hit != predicate.negated
            }
            CompiledFilter::Related { field, id, negated } => {
                let related = match field {
                    Field::Origins => &entity.origins,
                    Field::Products => &entity.products,
                    _ => return *negated,
                };
                related.iter().any(|item| item.id == *id) != *negated
            }
        }
    }

    /// JSON document form.
    pub fn to_document(&self) -> Value {
        match self {
            CompiledFilter::All => Value::Object(Map::new()),
            CompiledFilter::And(children) => {
                json!({ "$and": children.iter().map(Self::to_document).collect::<Vec<_>>() })
            }
            CompiledFilter::Or(children) => {
                json!({ "$or": children.iter().map(Self::to_document).collect::<Vec<_>>() })
            }
            CompiledFilter::Not(inner) => json!({ "$nor": [inner.to_document()] }),
            CompiledFilter::Text { field, predicate } => {
                let key = predicate.op.document_key(predicate.negated);
                let mut condition = single(key, Value::String(predicate.value.clone()));
                if predicate.negated && predicate.op != TextOp::Equals {
                    condition = single("$not", condition);
                }
                single(field.as_str(), condition)
            }
            CompiledFilter::Related { field, id, negated } => {
                let mut condition = json!({ "$elemMatch": { "_id": id } });
                if *negated {
                    condition = single("$not", condition);
                }
                single(field.as_str(), condition)
            }
        }
    }

    /// Parse the JSON document form.
    pub fn from_document(document: &Value) -> Result<Self, QueryError> {
        match document {
            Value::Array(items) => Ok(Self::and(parse_list(items)?)),
            Value::Object(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (key, value) in map {
                    parts.push(parse_entry(key, value)?);
                }
                Ok(Self::and(parts))
            }
            other => Err(malformed(format!("expected object or array, got {other}"))),
        }
    }

    /// Parse a serialized filter. A JSON string holding the document is
    /// unwrapped once, since builder-mode clients double-encode it.
    pub fn from_json_str(raw: &str) -> Result<Self, QueryError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
        match value {
            Value::String(inner) => {
                let inner: Value =
                    serde_json::from_str(&inner).map_err(|e| malformed(e.to_string()))?;
                Self::from_document(&inner)
            }
            other => Self::from_document(&other),
        }
    }
}

impl Serialize for CompiledFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CompiledFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        CompiledFilter::from_document(&value).map_err(serde::de::Error::custom)
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn malformed(reason: impl Into<String>) -> QueryError {
    QueryError::MalformedFilter(reason.into())
}

fn text_values(entity: &Entity, field: Field) -> Vec<&str> {
    match field {
        Field::Name => vec![entity.name.as_str()],
        Field::Description => vec![entity.description.as_str()],
        Field::Projects => entity.projects.iter().map(String::as_str).collect(),
        Field::Origins | Field::Products => Vec::new(),
    }
}

fn parse_list(items: &[Value]) -> Result<Vec<CompiledFilter>, QueryError> {
    items.iter().map(CompiledFilter::from_document).collect()
}

fn expect_array<'a>(key: &str, value: &'a Value) -> Result<&'a [Value], QueryError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| malformed(format!("{key} expects an array")))
}

fn parse_entry(key: &str, value: &Value) -> Result<CompiledFilter, QueryError> {
    match key {
        "$and" => Ok(CompiledFilter::and(parse_list(expect_array(key, value)?)?)),
        "$or" => {
            let children = parse_list(expect_array(key, value)?)?;
            if children.is_empty() {
                return Err(malformed("$or expects at least one condition"));
            }
            Ok(CompiledFilter::or(children))
        }
        "$nor" => {
            let children = parse_list(expect_array(key, value)?)?;
            if children.is_empty() {
                return Err(malformed("$nor expects at least one condition"));
            }
            Ok(CompiledFilter::negate(CompiledFilter::or(children)))
        }
        k if k.starts_with('$') => Err(malformed(format!("unknown operator {k}"))),
        field => {
            let field: Field = field.parse()?;
            parse_field_condition(field, value)
        }
    }
}

fn parse_field_condition(field: Field, value: &Value) -> Result<CompiledFilter, QueryError> {
    let conditions = match value {
        // Bare value is shorthand for equality.
        Value::String(s) => return text_condition(field, TextOp::Equals, s, false),
        Value::Object(map) if !map.is_empty() => map,
        _ => {
            return Err(malformed(format!(
                "condition on {field} must be a string or operator object"
            )));
        }
    };

    let mut parts = Vec::with_capacity(conditions.len());
    for (key, operand) in conditions {
        parts.push(parse_operator(field, key, operand, false)?);
    }
    Ok(CompiledFilter::and(parts))
}

fn parse_operator(
    field: Field,
    key: &str,
    operand: &Value,
    negated: bool,
) -> Result<CompiledFilter, QueryError> {
    if key == "$not" {
        let inner = operand
            .as_object()
            .filter(|m| m.len() == 1)
            .ok_or_else(|| malformed("$not expects a single operator"))?;
        let (inner_key, inner_operand) = inner
            .iter()
            .next()
            .ok_or_else(|| malformed("$not expects a single operator"))?;
        return parse_operator(field, inner_key, inner_operand, !negated);
    }

    if key == "$elemMatch" {
        if field.kind() != FieldKind::Relationship {
            return Err(QueryError::InvalidOperator {
                field: field.to_string(),
                operator: key.to_string(),
            });
        }
        let id = operand
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("$elemMatch expects an _id string"))?;
        return Ok(CompiledFilter::Related {
            field,
            id: id.to_string(),
            negated,
        });
    }

    let (op, key_negated) =
        TextOp::from_document_key(key).ok_or_else(|| QueryError::InvalidOperator {
            field: field.to_string(),
            operator: key.to_string(),
        })?;
    let value = operand
        .as_str()
        .ok_or_else(|| malformed(format!("{key} expects a string")))?;
    text_condition(field, op, value, negated != key_negated)
}

fn text_condition(
    field: Field,
    op: TextOp,
    value: &str,
    negated: bool,
) -> Result<CompiledFilter, QueryError> {
    if field.kind() == FieldKind::Relationship {
        return Err(QueryError::InvalidOperator {
            field: field.to_string(),
            operator: op.document_key(negated).to_string(),
        });
    }
    Ok(CompiledFilter::Text {
        field,
        predicate: TextPredicate {
            op,
            value: value.to_string(),
            negated,
        },
    })
}
