//! SQL rendering of compiled filters using SeaQuery.
//!
//! Generates conditions over the `entity` table:
//! - text fields compare the column directly (`LOWER(..) LIKE` for substring ops)
//! - `projects` is a JSONB string array, matched with `jsonb_array_elements_text`
//! - `origins`/`products` are JSONB object arrays, matched on `->>'_id'`

use sea_query::{
    Alias, Cond, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SimpleExpr,
};

use super::filter::{CompiledFilter, TextOp, TextPredicate};
use super::types::{Field, FieldKind};

/// Table Entities live in.
pub const ENTITY_TABLE: &str = "entity";

impl CompiledFilter {
    /// Render as a SeaQuery condition. `None` for match-all.
    pub fn to_condition(&self) -> Option<Cond> {
        if self.is_match_all() {
            return None;
        }
        Some(Cond::all().add(self.to_expr()))
    }

    fn to_expr(&self) -> SimpleExpr {
        match self {
            CompiledFilter::All => Expr::cust("TRUE"),
            CompiledFilter::And(children) => children
                .iter()
                .fold(Cond::all(), |cond, child| cond.add(child.to_expr()))
                .into(),
            CompiledFilter::Or(children) => children
                .iter()
                .fold(Cond::any(), |cond, child| cond.add(child.to_expr()))
                .into(),
            CompiledFilter::Not(inner) if inner.is_match_all() => Expr::cust("FALSE"),
            CompiledFilter::Not(inner) => Cond::all().add(inner.to_expr()).not().into(),
            CompiledFilter::Text { field, predicate } => text_expr(*field, predicate),
            CompiledFilter::Related { field, id, negated } => related_expr(*field, id, *negated),
        }
    }
}

/// Build the SELECT for Entities in `workspace` matching `filter`, ordered by name.
pub fn select_matching(workspace: &str, filter: &CompiledFilter, limit: u64) -> String {
    let table = Alias::new(ENTITY_TABLE);
    let cond = Cond::all()
        .add(Expr::col((table.clone(), Alias::new("workspace"))).eq(workspace))
        .add_option(filter.to_condition());

    let mut query = Query::select();
    query
        .columns([
            (table.clone(), Alias::new("id")),
            (table.clone(), Alias::new("name")),
            (table.clone(), Alias::new("description")),
        ])
        .from(table.clone())
        .cond_where(cond)
        .order_by((table.clone(), Alias::new("name")), Order::Asc)
        .order_by((table, Alias::new("id")), Order::Asc)
        .limit(limit);

    query.to_string(PostgresQueryBuilder)
}

/// Comparison fragment over `target` with the operand bound as `$1`.
fn comparison(target: &str, op: TextOp, value: &str) -> (String, String) {
    match op {
        TextOp::Equals => (format!("{target} = $1"), value.to_string()),
        TextOp::Contains => (
            format!("LOWER({target}) LIKE $1"),
            format!("%{}%", escape_like_wildcards(&value.to_lowercase())),
        ),
        TextOp::BeginsWith => (
            format!("LOWER({target}) LIKE $1"),
            format!("{}%", escape_like_wildcards(&value.to_lowercase())),
        ),
        TextOp::EndsWith => (
            format!("LOWER({target}) LIKE $1"),
            format!("%{}", escape_like_wildcards(&value.to_lowercase())),
        ),
    }
}

fn text_expr(field: Field, predicate: &TextPredicate) -> SimpleExpr {
    let column = format!("{ENTITY_TABLE}.{}", field.as_str());
    let (sql, operand) = match field.kind() {
        FieldKind::TextList => {
            let (cmp, operand) = comparison("project.value", predicate.op, &predicate.value);
            (
                format!(
                    "EXISTS (SELECT 1 FROM jsonb_array_elements_text({column}) AS project(value) WHERE {cmp})"
                ),
                operand,
            )
        }
        FieldKind::Text | FieldKind::Relationship => {
            comparison(&column, predicate.op, &predicate.value)
        }
    };
    negate_sql(sql, operand, predicate.negated)
}

fn related_expr(field: Field, id: &str, negated: bool) -> SimpleExpr {
    let exists = format!(
        "EXISTS (SELECT 1 FROM jsonb_array_elements({ENTITY_TABLE}.{}) AS related(item) WHERE related.item->>'_id' = $1)",
        field.as_str()
    );
    negate_sql(exists, id.to_string(), negated)
}

fn negate_sql(sql: String, operand: String, negated: bool) -> SimpleExpr {
    if negated {
        Expr::cust_with_values(format!("NOT ({sql})"), [operand])
    } else {
        Expr::cust_with_values(sql, [operand])
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub(crate) fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::types::{Rule, RuleGroup};
    use crate::query::translate;

    fn sql_for(group: RuleGroup) -> String {
        let filter = translate(&group).unwrap();
        select_matching("ws_1", &filter, 50)
    }

    #[test]
    fn match_all_only_scopes_workspace() {
        let sql = sql_for(RuleGroup::and());
        assert!(sql.contains(r#""entity"."workspace" = 'ws_1'"#), "{sql}");
        assert!(!sql.contains("LIKE"), "{sql}");
        assert!(sql.contains("ORDER BY"), "{sql}");
        assert!(sql.contains("LIMIT 50"), "{sql}");
    }

    #[test]
    fn contains_uses_lowercased_like() {
        let sql = sql_for(RuleGroup::and().with_rule(Rule::new("name", "contains", "Box")));
        assert!(sql.contains("LOWER(entity.name) LIKE '%box%'"), "{sql}");
    }

    #[test]
    fn negated_prefix_is_wrapped_in_not() {
        let sql = sql_for(
            RuleGroup::and().with_rule(Rule::new("description", "doesNotBeginWith", "Old")),
        );
        assert!(
            sql.contains("NOT (LOWER(entity.description) LIKE 'old%')"),
            "{sql}"
        );
    }

    #[test]
    fn equality_is_exact() {
        let sql = sql_for(RuleGroup::and().with_rule(Rule::new("name", "=", "Box 1")));
        assert!(sql.contains("entity.name = 'Box 1'"), "{sql}");
    }

    #[test]
    fn project_uses_array_elements() {
        let sql = sql_for(RuleGroup::and().with_rule(Rule::new("project", "=", "p_1")));
        assert!(
            sql.contains("jsonb_array_elements_text(entity.projects)"),
            "{sql}"
        );
        assert!(sql.contains("project.value = 'p_1'"), "{sql}");
    }

    #[test]
    fn relationship_matches_on_id() {
        let sql = sql_for(
            RuleGroup::and().with_rule(Rule::new("products", "doesNotContain", "id_9")),
        );
        assert!(sql.contains("NOT (EXISTS"), "{sql}");
        assert!(sql.contains("jsonb_array_elements(entity.products)"), "{sql}");
        assert!(sql.contains("related.item->>'_id' = 'id_9'"), "{sql}");
    }

    #[test]
    fn or_group_renders_or() {
        let sql = sql_for(
            RuleGroup::or()
                .with_rule(Rule::new("name", "contains", "a"))
                .with_rule(Rule::new("name", "contains", "b")),
        );
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn like_wildcards_in_values_are_escaped() {
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }

    #[test]
    fn values_are_quoted_not_spliced() {
        let sql = sql_for(RuleGroup::and().with_rule(Rule::new("name", "=", "x' OR '1'='1")));
        assert!(!sql.contains("'x' OR '1'='1'"), "{sql}");
    }
}
