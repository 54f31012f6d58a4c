//! Condition rendering
//!
//! Renders WHERE, HAVING and JOIN ... ON conditions of a scope into qualified
//! pseudocode:
//!
//! ```text
//! WHERE o.status = 'open' AND EXISTS (SELECT ...)
//!   -> ((sales.orders.status == 'open') AND EXISTS(Operation 1.1))
//! ```
//!
//! Expressions are first classified into a closed set of [`Predicate`]
//! kinds; anything not recognised is rendered verbatim. Rendering needs the
//! labels of the whole statement, so it runs after [`ScopeTree::build`].

use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments,
    JoinConstraint, JoinOperator, Query, Select, TableFactor, TableWithJoins, UnaryOperator,
    Value,
};
use sqldeps_core::{LiteralValue, PseudocodeEntry};

use crate::literals::{call_name, is_verbatim_literal, literal_value};
use crate::names::{column_ref, has_parentheses, ColumnRef};
use crate::scope::{Resolution, ScopeId, ScopeTree};

/// The ON expression of a join, if it has one
pub fn join_condition(operator: &JoinOperator) -> Option<&Expr> {
    let constraint = match operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c) => c,
        _ => return None,
    };

    match constraint {
        JoinConstraint::On(expr) => Some(expr),
        _ => None,
    }
}

/// ON expressions of every join in a select's FROM clause, in order
pub fn join_conditions(select: &Select) -> Vec<&Expr> {
    fn walk<'s>(table: &'s TableWithJoins, out: &mut Vec<&'s Expr>) {
        if let TableFactor::NestedJoin {
            table_with_joins, ..
        } = &table.relation
        {
            walk(table_with_joins, out);
        }
        for join in &table.joins {
            if let TableFactor::NestedJoin {
                table_with_joins, ..
            } = &join.relation
            {
                walk(table_with_joins, out);
            }
            out.extend(join_condition(&join.join_operator));
        }
    }

    let mut out = Vec::new();
    for table in &select.from {
        walk(table, &mut out);
    }
    out
}

/// Recognised predicate shapes
#[derive(Debug)]
enum Predicate<'e> {
    Group(&'e Expr),
    Not(&'e Expr),
    Logical {
        left: &'e Expr,
        op: &'static str,
        right: &'e Expr,
    },
    Comparison {
        left: &'e Expr,
        op: &'static str,
        right: &'e Expr,
    },
    Membership {
        expr: &'e Expr,
        list: &'e [Expr],
        negated: bool,
    },
    SubqueryMembership {
        expr: &'e Expr,
        subquery: &'e Query,
        negated: bool,
    },
    Pattern {
        expr: &'e Expr,
        pattern: &'e Expr,
        keyword: &'static str,
        negated: bool,
    },
    Range {
        expr: &'e Expr,
        low: &'e Expr,
        high: &'e Expr,
        negated: bool,
    },
    Exists {
        subquery: &'e Query,
        negated: bool,
    },
    Verbatim(&'e Expr),
}

impl<'e> Predicate<'e> {
    fn classify(expr: &'e Expr) -> Self {
        match expr {
            Expr::Nested(inner) => Self::Group(inner),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Self::Not(expr),
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => Self::Logical { left, op: "AND", right },
                BinaryOperator::Or => Self::Logical { left, op: "OR", right },
                BinaryOperator::Eq => Self::Comparison { left, op: "==", right },
                BinaryOperator::NotEq => Self::Comparison { left, op: "!=", right },
                BinaryOperator::Gt => Self::Comparison { left, op: ">", right },
                BinaryOperator::GtEq => Self::Comparison { left, op: ">=", right },
                BinaryOperator::Lt => Self::Comparison { left, op: "<", right },
                BinaryOperator::LtEq => Self::Comparison { left, op: "<=", right },
                _ => Self::Verbatim(expr),
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Self::Membership {
                expr,
                list,
                negated: *negated,
            },
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => Self::SubqueryMembership {
                expr,
                subquery,
                negated: *negated,
            },
            Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => Self::Pattern {
                expr,
                pattern,
                keyword: "LIKE",
                negated: *negated,
            },
            Expr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => Self::Pattern {
                expr,
                pattern,
                keyword: "ILIKE",
                negated: *negated,
            },
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => Self::Range {
                expr,
                low,
                high,
                negated: *negated,
            },
            Expr::Exists { subquery, negated } => Self::Exists {
                subquery,
                negated: *negated,
            },
            _ => Self::Verbatim(expr),
        }
    }
}

fn not_prefix(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

/// Renders the conditions of one scope
pub struct ConditionRenderer<'t, 'a> {
    tree: &'t ScopeTree<'a>,
    scope: ScopeId,
}

impl<'t, 'a> ConditionRenderer<'t, 'a> {
    pub fn new(tree: &'t ScopeTree<'a>, scope: ScopeId) -> Self {
        Self { tree, scope }
    }

    /// Pseudocode entry of the scope
    pub fn entry(&self) -> PseudocodeEntry {
        let select = self.tree.scope(self.scope).select;

        PseudocodeEntry {
            join: self.join_text(select),
            where_clause: select
                .selection
                .as_ref()
                .map(|e| self.render(e))
                .unwrap_or_default(),
            having: select
                .having
                .as_ref()
                .map(|e| self.render(e))
                .unwrap_or_default(),
        }
    }

    /// Join conditions, preferring the equalities inside each ON clause
    pub fn join_text(&self, select: &Select) -> String {
        let parts: Vec<String> = join_conditions(select)
            .into_iter()
            .map(|on| {
                let mut equalities = Vec::new();
                collect_equalities(on, &mut equalities);
                if equalities.is_empty() {
                    self.render(on)
                } else {
                    conjoin(equalities.into_iter().map(|eq| self.render(eq)).collect())
                }
            })
            .collect();

        conjoin(parts)
    }

    /// Render a boolean expression
    pub fn render(&self, expr: &Expr) -> String {
        match Predicate::classify(expr) {
            Predicate::Group(inner) => format!("({})", self.render(inner)),
            Predicate::Not(inner) => format!("(NOT {})", self.render(inner)),
            Predicate::Logical { left, op, right } => {
                format!("({} {} {})", self.render(left), op, self.render(right))
            }
            Predicate::Comparison { left, op, right } => {
                format!("({} {} {})", self.operand(left), op, self.operand(right))
            }
            Predicate::Membership {
                expr,
                list,
                negated,
            } => {
                let values: Vec<String> = list.iter().map(|v| self.operand(v)).collect();
                format!(
                    "({} {}IN ({}))",
                    self.operand(expr),
                    not_prefix(negated),
                    values.join(", ")
                )
            }
            Predicate::SubqueryMembership {
                expr,
                subquery,
                negated,
            } => format!(
                "({} {}IN ({}))",
                self.operand(expr),
                not_prefix(negated),
                self.query_ref(subquery)
            ),
            Predicate::Pattern {
                expr,
                pattern,
                keyword,
                negated,
            } => format!(
                "({} {}{} {})",
                self.operand(expr),
                not_prefix(negated),
                keyword,
                self.operand(pattern)
            ),
            Predicate::Range {
                expr,
                low,
                high,
                negated,
            } => format!(
                "({} {}BETWEEN {} AND {})",
                self.operand(expr),
                not_prefix(negated),
                self.operand(low),
                self.operand(high)
            ),
            Predicate::Exists { subquery, negated } => {
                format!("{}EXISTS({})", not_prefix(negated), self.query_ref(subquery))
            }
            Predicate::Verbatim(expr) => self.operand(expr),
        }
    }

    /// `Operation <label>` for a labelled subquery, its SQL text otherwise
    fn query_ref(&self, query: &Query) -> String {
        match self.tree.label_of_query(query) {
            Some(label) => format!("Operation {}", label),
            None => query.to_string(),
        }
    }

    /// Render a value-position expression
    fn operand(&self, expr: &Expr) -> String {
        if let Some(column) = column_ref(expr) {
            return self.column(&column);
        }
        if is_verbatim_literal(expr) {
            return expr.to_string();
        }

        match expr {
            Expr::Value(Value::Number(..)) => literal_value(expr)
                .map(|v| v.to_string())
                .unwrap_or_else(|| expr.to_string()),
            Expr::Value(_) => match literal_value(expr) {
                Some(LiteralValue::Text(text)) => format!("'{}'", text),
                _ => expr.to_string(),
            },
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: inner,
            } => format!("-{}", self.operand(inner)),
            Expr::Nested(inner) => format!("({})", self.operand(inner)),
            Expr::BinaryOp { left, op, right } => match Predicate::classify(expr) {
                Predicate::Verbatim(_) => {
                    format!("{} {} {}", self.operand(left), op, self.operand(right))
                }
                _ => self.render(expr),
            },
            Expr::Function(func) => {
                if !has_parentheses(func) {
                    return func.name.to_string();
                }
                format!("{}({})", func.name, self.call_args(func).join(", "))
            }
            Expr::Extract { field, expr: inner, .. } => {
                format!("EXTRACT({} FROM {})", field, self.operand(inner))
            }
            Expr::Trim { expr: inner, .. } => format!("TRIM({})", self.operand(inner)),
            Expr::Substring {
                expr: inner,
                substring_from,
                substring_for,
                ..
            } => {
                let mut args = vec![self.operand(inner)];
                args.extend(
                    [substring_from, substring_for]
                        .into_iter()
                        .flatten()
                        .map(|bound| self.operand(bound)),
                );
                let name = call_name(expr).unwrap_or_else(|| "SUBSTRING".to_string());
                format!("{}({})", name, args.join(", "))
            }
            Expr::Subquery(query) => self.query_ref(query),
            Expr::InList { .. }
            | Expr::InSubquery { .. }
            | Expr::Like { .. }
            | Expr::ILike { .. }
            | Expr::Between { .. }
            | Expr::Exists { .. } => self.render(expr),
            _ => expr.to_string(),
        }
    }

    /// Rendered call arguments; `*` and named arguments stay as written
    fn call_args(&self, func: &Function) -> Vec<String> {
        match &func.args {
            FunctionArguments::List(list) => list
                .args
                .iter()
                .map(|arg| match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => self.operand(expr),
                    other => other.to_string(),
                })
                .collect(),
            FunctionArguments::Subquery(query) => vec![self.query_ref(query)],
            FunctionArguments::None => Vec::new(),
        }
    }

    /// `qualifiedTable.column`; unresolved qualifiers are kept as written
    fn column(&self, column: &ColumnRef) -> String {
        match self.tree.resolve(self.scope, column) {
            Resolution::Table(table) => format!("{}.{}", table, column.column),
            _ if column.is_qualified() => {
                format!("{}.{}", column.qualifier_text(), column.column)
            }
            _ => column.column.clone(),
        }
    }
}

/// Equality comparisons reachable through AND/OR/NOT and parentheses
fn collect_equalities<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And | BinaryOperator::Or,
            right,
        } => {
            collect_equalities(left, out);
            collect_equalities(right, out);
        }
        Expr::BinaryOp {
            op: BinaryOperator::Eq,
            ..
        } => out.push(expr),
        Expr::Nested(inner)
        | Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: inner,
        } => collect_equalities(inner, out),
        _ => {}
    }
}

/// `a`, or `(a AND b AND ...)` for several parts
fn conjoin(mut parts: Vec<String>) -> String {
    match parts.len() {
        0 => String::new(),
        1 => parts.remove(0),
        _ => format!("({})", parts.join(" AND ")),
    }
}
