//! Rule tree types.
//!
//! The wire form (`Rule`, `RuleGroup`) is what the visual query builder
//! produces: plain strings for field, operator and combinator. The typed
//! form (`Field`, `Operator`, `Combinator`) is what translation works on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::QueryError;

/// Single leaf condition of a rule tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: String,
}

impl Rule {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Child of a rule group: either a leaf or a nested group.
///
/// Groups are tried first because only they carry `rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(RuleGroup),
    Rule(Rule),
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        RuleNode::Rule(rule)
    }
}

impl From<RuleGroup> for RuleNode {
    fn from(group: RuleGroup) -> Self {
        RuleNode::Group(group)
    }
}

/// Ordered, possibly nested collection of rules joined by a combinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    #[serde(default = "default_combinator")]
    pub combinator: String,

    /// Negates the whole group.
    #[serde(default)]
    pub not: bool,

    pub rules: Vec<RuleNode>,
}

fn default_combinator() -> String {
    "and".to_string()
}

impl RuleGroup {
    /// Empty group with the `and` combinator.
    pub fn and() -> Self {
        Self {
            combinator: "and".to_string(),
            not: false,
            rules: Vec::new(),
        }
    }

    /// Empty group with the `or` combinator.
    pub fn or() -> Self {
        Self {
            combinator: "or".to_string(),
            not: false,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn with_group(mut self, group: RuleGroup) -> Self {
        self.rules.push(group.into());
        self
    }

    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }
}

/// Fields a rule may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Description,
    Projects,
    Origins,
    Products,
}

/// How a field is stored on an Entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single string value.
    Text,
    /// Array of strings.
    TextList,
    /// Array of `{ _id, name }` references.
    Relationship,
}

impl Field {
    /// Canonical name, also the Entity attribute and document key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Description => "description",
            Field::Projects => "projects",
            Field::Origins => "origins",
            Field::Products => "products",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Name | Field::Description => FieldKind::Text,
            Field::Projects => FieldKind::TextList,
            Field::Origins | Field::Products => FieldKind::Relationship,
        }
    }

    /// Whether `operator` may be applied to this field.
    pub fn supports(&self, operator: Operator) -> bool {
        match self.kind() {
            FieldKind::Text | FieldKind::TextList => true,
            FieldKind::Relationship => {
                matches!(operator, Operator::Contains | Operator::DoesNotContain)
            }
        }
    }
}

impl FromStr for Field {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Field::Name),
            "description" => Ok(Field::Description),
            "project" | "projects" => Ok(Field::Projects),
            "origins" => Ok(Field::Origins),
            "products" => Ok(Field::Products),
            other => Err(QueryError::InvalidField(other.to_string())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule operators understood by the query builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    BeginsWith,
    EndsWith,
    DoesNotContain,
    DoesNotBeginWith,
    DoesNotEndWith,
}

impl Operator {
    /// Look up an operator by its query-builder name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "=" => Some(Operator::Equals),
            "!=" => Some(Operator::NotEquals),
            "contains" => Some(Operator::Contains),
            "beginsWith" => Some(Operator::BeginsWith),
            "endsWith" => Some(Operator::EndsWith),
            "doesNotContain" => Some(Operator::DoesNotContain),
            "doesNotBeginWith" => Some(Operator::DoesNotBeginWith),
            "doesNotEndWith" => Some(Operator::DoesNotEndWith),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::Contains => "contains",
            Operator::BeginsWith => "beginsWith",
            Operator::EndsWith => "endsWith",
            Operator::DoesNotContain => "doesNotContain",
            Operator::DoesNotBeginWith => "doesNotBeginWith",
            Operator::DoesNotEndWith => "doesNotEndWith",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the children of a group are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl FromStr for Combinator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("and") {
            Ok(Combinator::And)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(Combinator::Or)
        } else {
            Err(QueryError::InvalidCombinator(s.to_string()))
        }
    }
}
