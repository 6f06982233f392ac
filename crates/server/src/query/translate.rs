//! Rule tree to filter translation.

use super::QueryError;
use super::filter::{CompiledFilter, TextPredicate};
use super::types::{Combinator, Field, FieldKind, Operator, Rule, RuleGroup, RuleNode};

/// Translate a rule tree into a `CompiledFilter`.
///
/// Pure and deterministic. A group with no children matches everything,
/// whatever its `not` flag says.
pub fn translate(group: &RuleGroup) -> Result<CompiledFilter, QueryError> {
    let combinator: Combinator = group.combinator.parse()?;

    if group.rules.is_empty() {
        return Ok(CompiledFilter::All);
    }

    let children = group
        .rules
        .iter()
        .map(|node| match node {
            RuleNode::Rule(rule) => translate_rule(rule),
            RuleNode::Group(inner) => translate(inner),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let combined = match combinator {
        Combinator::And => CompiledFilter::and(children),
        Combinator::Or => CompiledFilter::or(children),
    };

    if group.not && !combined.is_match_all() {
        Ok(CompiledFilter::negate(combined))
    } else {
        Ok(combined)
    }
}

/// Translate a single rule.
pub fn translate_rule(rule: &Rule) -> Result<CompiledFilter, QueryError> {
    let field: Field = rule.field.parse()?;
    let operator = Operator::from_name(&rule.operator)
        .filter(|op| field.supports(*op))
        .ok_or_else(|| QueryError::InvalidOperator {
            field: rule.field.clone(),
            operator: rule.operator.clone(),
        })?;

    match field.kind() {
        FieldKind::Relationship => Ok(CompiledFilter::Related {
            field,
            id: rule.value.clone(),
            negated: operator == Operator::DoesNotContain,
        }),
        FieldKind::Text | FieldKind::TextList => Ok(CompiledFilter::Text {
            field,
            predicate: TextPredicate::from_operator(operator, rule.value.clone()),
        }),
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_group_is_match_all() {
        assert!(translate(&RuleGroup::and()).unwrap().is_match_all());
        assert!(translate(&RuleGroup::or().negated()).unwrap().is_match_all());
    }

    #[test]
    fn single_rule_is_unwrapped() {
        let group = RuleGroup::and().with_rule(Rule::new("name", "contains", "Box"));
        assert_eq!(
            translate(&group).unwrap().to_document(),
            json!({ "name": { "$contains": "Box" } })
        );
    }

    #[test]
    fn products_contains_becomes_elem_match() {
        let group = RuleGroup::and().with_rule(Rule::new("products", "contains", "id_7"));
        assert_eq!(
            translate(&group).unwrap().to_document(),
            json!({ "products": { "$elemMatch": { "_id": "id_7" } } })
        );
    }

    #[test]
    fn origins_does_not_contain_is_negated_elem_match() {
        let group = RuleGroup::and().with_rule(Rule::new("origins", "doesNotContain", "id_7"));
        assert_eq!(
            translate(&group).unwrap().to_document(),
            json!({ "origins": { "$not": { "$elemMatch": { "_id": "id_7" } } } })
        );
    }

    #[test]
    fn nested_groups_keep_structure() {
        let group = RuleGroup::or()
            .with_rule(Rule::new("name", "beginsWith", "Box"))
            .with_group(
                RuleGroup::and()
                    .with_rule(Rule::new("description", "!=", "empty"))
                    .with_rule(Rule::new("project", "=", "p_1")),
            );
        assert_eq!(
            translate(&group).unwrap().to_document(),
            json!({ "$or": [
                { "name": { "$beginsWith": "Box" } },
                { "$and": [
                    { "description": { "$ne": "empty" } },
                    { "projects": { "$eq": "p_1" } }
                ] }
            ] })
        );
    }

    #[test]
    fn negated_group_becomes_nor() {
        let group = RuleGroup::and()
            .negated()
            .with_rule(Rule::new("name", "contains", "a"))
            .with_rule(Rule::new("name", "contains", "b"));
        assert_eq!(
            translate(&group).unwrap().to_document(),
            json!({ "$nor": [ { "$and": [
                { "name": { "$contains": "a" } },
                { "name": { "$contains": "b" } }
            ] } ] })
        );
    }

    #[test]
    fn empty_nested_group_inside_or_matches_all() {
        let group = RuleGroup::or()
            .with_rule(Rule::new("name", "=", "x"))
            .with_group(RuleGroup::and());
        assert!(translate(&group).unwrap().is_match_all());
    }

    #[test]
    fn unknown_field_is_invalid() {
        let group = RuleGroup::and().with_rule(Rule::new("owner", "=", "me"));
        assert!(matches!(
            translate(&group),
            Err(QueryError::InvalidField(f)) if f == "owner"
        ));
    }

    #[test]
    fn unsupported_operator_is_invalid() {
        let group = RuleGroup::and().with_rule(Rule::new("origins", "beginsWith", "id_"));
        assert!(matches!(
            translate(&group),
            Err(QueryError::InvalidOperator { .. })
        ));
        let group = RuleGroup::and().with_rule(Rule::new("name", "matches", "x"));
        assert!(matches!(
            translate(&group),
            Err(QueryError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn unknown_combinator_is_invalid() {
        let mut group = RuleGroup::and().with_rule(Rule::new("name", "=", "x"));
        group.combinator = "xor".to_string();
        assert!(matches!(
            translate(&group),
            Err(QueryError::InvalidCombinator(_))
        ));
    }

    #[test]
    fn translation_is_deterministic() {
        let group = RuleGroup::and()
            .with_rule(Rule::new("name", "endsWith", "1"))
            .with_rule(Rule::new("products", "contains", "id_9"));
        assert_eq!(translate(&group).unwrap(), translate(&group).unwrap());
    }
}
