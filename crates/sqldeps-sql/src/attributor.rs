//! Column and wildcard attribution
//!
//! Attributes every column reference of a scope to the physical table it
//! reads. References nested inside subqueries are left to the subquery's own
//! scope. Unresolvable references produce warnings and are skipped.

use sqlparser::ast::{
    Expr, GroupByExpr, ObjectName, Query, SelectItem, Visit, Visitor,
};
use sqldeps_core::{ColumnAttribution, Warning};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

use crate::names::{column_ref, ColumnRef};
use crate::scope::{Resolution, ScopeId, ScopeTree};

/// Attributions and warnings of one scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeColumns {
    pub columns: Vec<ColumnAttribution>,
    pub warnings: Vec<Warning>,
}

/// Collects column references outside nested queries
#[derive(Default)]
struct ColumnCollector {
    depth: usize,
    columns: Vec<ColumnRef>,
}

impl Visitor for ColumnCollector {
    type Break = ();

    fn pre_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth -= 1;
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            if let Some(column) = column_ref(expr) {
                self.columns.push(column);
            }
        }
        ControlFlow::Continue(())
    }
}

fn collect<V: Visit>(node: &V) -> Vec<ColumnRef> {
    let mut collector = ColumnCollector::default();
    let _ = node.visit(&mut collector);
    collector.columns
}

/// Attributes the columns of one scope
pub struct ColumnAttributor<'t, 'a> {
    tree: &'t ScopeTree<'a>,
    scope: ScopeId,
}

impl<'t, 'a> ColumnAttributor<'t, 'a> {
    pub fn new(tree: &'t ScopeTree<'a>, scope: ScopeId) -> Self {
        Self { tree, scope }
    }

    pub fn attribute(&self) -> ScopeColumns {
        let mut out = ScopeColumns::default();
        let scope = self.tree.scope(self.scope);
        let select = scope.select;

        for item in &select.projection {
            match item {
                SelectItem::Wildcard(_) => self.unqualified_wildcard(&mut out),
                SelectItem::QualifiedWildcard(name, _) => self.qualified_wildcard(name, &mut out),
                SelectItem::UnnamedExpr(_) | SelectItem::ExprWithAlias { .. } => {
                    for column in collect(item) {
                        self.column(&column, &mut out);
                    }
                }
            }
        }

        let mut direct = collect(&select.from);
        if let Some(selection) = &select.selection {
            direct.extend(collect(selection));
        }
        for column in &direct {
            self.column(column, &mut out);
        }

        // later clauses may name projection aliases
        let aliases: BTreeSet<String> = select
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::ExprWithAlias { alias, .. } => Some(alias.value.to_lowercase()),
                _ => None,
            })
            .collect();

        let mut trailing = Vec::new();
        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                trailing.extend(collect(expr));
            }
        }
        for clause in [&select.having, &select.qualify].into_iter().flatten() {
            trailing.extend(collect(clause));
        }
        if let Some(owner) = scope.owner {
            trailing.extend(collect(&owner.order_by));
        }
        for column in &trailing {
            if !column.is_qualified() && aliases.contains(&column.column.to_lowercase()) {
                continue;
            }
            self.column(column, &mut out);
        }

        out
    }

    fn column(&self, column: &ColumnRef, out: &mut ScopeColumns) {
        match self.tree.resolve(self.scope, column) {
            Resolution::Table(table) => {
                tracing::trace!(%table, column = %column.column, "column attributed");
                out.columns
                    .push(ColumnAttribution::new(table, column.column.clone()));
            }
            Resolution::UnknownQualifier => out.warnings.push(Warning::unresolved_qualifier(
                &column.qualifier_text(),
                &column.column,
            )),
            Resolution::NoTables => out
                .warnings
                .push(Warning::column_without_tables(&column.column)),
            Resolution::Ambiguous(tables) => out
                .warnings
                .push(Warning::column_in_multiple_tables(&column.column, &tables)),
            Resolution::Untraced(sources) => out
                .warnings
                .push(Warning::column_through_derived(&column.column, &sources)),
        }
    }

    /// `*`: every base table in scope
    fn unqualified_wildcard(&self, out: &mut ScopeColumns) {
        let tables = self.tree.scope(self.scope).base_tables();
        if tables.is_empty() {
            out.warnings.push(Warning::star_without_tables());
            return;
        }

        for table in tables {
            out.warnings.push(Warning::star_used(&table));
            out.columns.push(ColumnAttribution::wildcard(table));
        }
    }

    /// `q.*`: resolved like a qualified column
    fn qualified_wildcard(&self, name: &ObjectName, out: &mut ScopeColumns) {
        let reference = ColumnRef {
            qualifier: name.0.iter().map(|ident| ident.value.clone()).collect(),
            column: ColumnAttribution::WILDCARD.to_string(),
        };

        match self.tree.resolve(self.scope, &reference) {
            Resolution::Table(table) => {
                out.warnings.push(Warning::star_used(&table));
                out.columns.push(ColumnAttribution::wildcard(table));
            }
            _ => out
                .warnings
                .push(Warning::unresolved_star_qualifier(&reference.qualifier_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;
    use pretty_assertions::assert_eq;
    use sqldeps_core::WarningCode;
    use sqlparser::ast::Statement;

    fn parse(sql: &str) -> Statement {
        SqlParser::new().parse(sql, None).unwrap().statements.remove(0)
    }

    fn attribute(sql: &str, scope: ScopeId) -> ScopeColumns {
        let statement = parse(sql);
        let tree = ScopeTree::build(&statement);
        ColumnAttributor::new(&tree, scope).attribute()
    }

    fn pairs(result: &ScopeColumns) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = result
            .columns
            .iter()
            .map(|c| (c.table.clone(), c.column.clone()))
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }

    fn pair(table: &str, column: &str) -> (String, String) {
        (table.to_string(), column.to_string())
    }

    #[test]
    fn single_table_unqualified() {
        let result = attribute("SELECT id, amount FROM sales.items WHERE qty > 1", 0);
        assert_eq!(
            pairs(&result),
            vec![
                pair("sales.items", "amount"),
                pair("sales.items", "id"),
                pair("sales.items", "qty"),
            ]
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn aliases_across_joins() {
        let result = attribute(
            "SELECT a.order_id, b.amount FROM sales.orders AS a \
             LEFT JOIN sales.order_items AS b ON a.order_id = b.order_id",
            0,
        );
        assert_eq!(
            pairs(&result),
            vec![
                pair("sales.order_items", "amount"),
                pair("sales.order_items", "order_id"),
                pair("sales.orders", "order_id"),
            ]
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn unqualified_star() {
        let result = attribute("SELECT * FROM sales.orders", 0);
        assert_eq!(pairs(&result), vec![pair("sales.orders", "*")]);
        assert_eq!(result.warnings, vec![Warning::star_used("sales.orders")]);
    }

    #[test]
    fn star_without_tables() {
        let result = attribute("SELECT *", 0);
        assert!(result.columns.is_empty());
        assert_eq!(result.warnings, vec![Warning::star_without_tables()]);
    }

    #[test]
    fn qualified_star() {
        let result = attribute("SELECT o.*, i.amount FROM sales.orders o JOIN sales.items i ON o.id = i.order_id", 0);
        assert!(pairs(&result).contains(&pair("sales.orders", "*")));
        let star_warnings: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.code == WarningCode::SelectStarUsed)
            .collect();
        assert_eq!(star_warnings, vec![&Warning::star_used("sales.orders")]);
    }

    #[test]
    fn unresolved_star_qualifier() {
        let result = attribute("SELECT zz.* FROM sales.orders o", 0);
        assert!(result.columns.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, WarningCode::AmbiguousColumnOrigin);
    }

    #[test]
    fn ambiguous_unqualified_column() {
        let result = attribute("SELECT amount FROM sales.orders, sales.items", 0);
        assert!(result.columns.is_empty());
        assert_eq!(
            result.warnings,
            vec![Warning::column_in_multiple_tables(
                "amount",
                &["sales.items".to_string(), "sales.orders".to_string()]
            )]
        );
    }

    #[test]
    fn derived_alias_hides_outer_alias() {
        let sql = "SELECT x.id FROM sales.orders x \
                   WHERE EXISTS (SELECT x.zzz FROM (SELECT a.id FROM t1 a JOIN t2 b ON a.id = b.id) x)";
        let result = attribute(sql, 1);
        assert!(result.columns.is_empty());
        assert_eq!(
            result.warnings,
            vec![Warning::column_through_derived("zzz", &["x".to_string()])]
        );
    }

    #[test]
    fn unqualified_column_through_opaque_derived_source() {
        let result = attribute("SELECT total FROM (SELECT 1 AS one) d", 0);
        assert!(result.columns.is_empty());
        assert_eq!(
            result.warnings,
            vec![Warning::column_through_derived("total", &["d".to_string()])]
        );
    }

    #[test]
    fn subquery_columns_belong_to_their_scope() {
        let sql = "SELECT o.id FROM sales.orders o WHERE o.id IN (SELECT i.order_id FROM sales.items i)";
        assert_eq!(pairs(&attribute(sql, 0)), vec![pair("sales.orders", "id")]);
        assert_eq!(pairs(&attribute(sql, 1)), vec![pair("sales.items", "order_id")]);
    }

    #[test]
    fn derived_table_columns_reach_base_table() {
        let result = attribute(
            "SELECT a.order_id, a.customer_id FROM (SELECT order_id, customer_id FROM sales.orders) AS a",
            0,
        );
        assert_eq!(
            pairs(&result),
            vec![pair("sales.orders", "customer_id"), pair("sales.orders", "order_id")]
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn projection_aliases_are_not_columns() {
        let result = attribute(
            "SELECT b.kind AS k, COUNT(*) AS n FROM sales.items b GROUP BY k ORDER BY n",
            0,
        );
        assert_eq!(pairs(&result), vec![pair("sales.items", "kind")]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn count_star_is_not_a_wildcard() {
        let result = attribute("SELECT COUNT(*) FROM sales.items", 0);
        assert!(result.columns.is_empty());
        assert!(result.warnings.is_empty());
    }
}
