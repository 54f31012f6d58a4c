//! Literal filter extraction
//!
//! Finds literal-valued predicates gating a column in a scope's WHERE,
//! HAVING, QUALIFY and JOIN ... ON conditions:
//!
//! ```text
//! b.amount > 100                   -> {op: ">", value: 100}
//! 5 < b.qty                        -> {op: ">", value: 5}
//! SUBSTR(b.code, 1, 3) = 'ABC'     -> {op: "=", value: "ABC", fn: "SUBSTR", fn_args: [1, 3]}
//! b.status IN (UPPER('a'), 'b')    -> {op: "in", values: ["a", "b"], value_fns: ["UPPER", null]}
//! b.d BETWEEN DATE '2024-01-01' AND DATE '2024-12-31'
//! ```
//!
//! Only the boolean structure (AND, OR, NOT, parentheses) is descended;
//! subqueries belong to their own scope.

use sqlparser::ast::{
    BinaryOperator, CastKind, Expr, Function, Select, UnaryOperator, Value,
};
use sqldeps_core::{FilterOp, LiteralCondition, LiteralValue};

use crate::names::{column_ref, function_args, has_parentheses, ColumnRef};
use crate::render::join_conditions;
use crate::scope::{ScopeId, ScopeTree};

/// A literal condition attributed to a table column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCondition {
    pub table: String,
    pub column: String,
    pub condition: LiteralCondition,
}

/// Column side of a predicate: the column plus its outermost wrapper
#[derive(Debug, Clone, PartialEq)]
struct ColumnSide {
    column: ColumnRef,
    function: Option<String>,
    fn_args: Option<Vec<LiteralValue>>,
}

impl ColumnSide {
    fn bare(column: ColumnRef) -> Self {
        Self {
            column,
            function: None,
            fn_args: None,
        }
    }
}

/// Convert a literal expression to a value
///
/// Numbers convert by the presence of a decimal point, strings are kept
/// unquoted. Date/time literals and casts to date/time types are kept as
/// their SQL text (`DATE '2024-01-01'`).
pub fn literal_value(expr: &Expr) -> Option<LiteralValue> {
    match expr {
        Expr::Value(value) => match value {
            Value::Number(text, _) => Some(LiteralValue::from_numeric_text(text)),
            Value::SingleQuotedString(s)
            | Value::DoubleQuotedString(s)
            | Value::NationalStringLiteral(s)
            | Value::EscapedStringLiteral(s) => Some(LiteralValue::Text(s.clone())),
            _ => None,
        },
        Expr::TypedString { .. } => Some(LiteralValue::Text(expr.to_string())),
        Expr::Cast { data_type, .. } if is_temporal(&data_type.to_string()) => {
            Some(LiteralValue::Text(expr.to_string()))
        }
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => literal_value(inner)
            .filter(LiteralValue::is_numeric)
            .map(LiteralValue::negated),
        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            expr: inner,
        } => literal_value(inner).filter(LiteralValue::is_numeric),
        Expr::Nested(inner) => literal_value(inner),
        _ => None,
    }
}

/// Whether a literal expression is kept as verbatim SQL text
pub fn is_verbatim_literal(expr: &Expr) -> bool {
    match expr {
        Expr::TypedString { .. } => true,
        Expr::Cast { data_type, .. } => is_temporal(&data_type.to_string()),
        Expr::Nested(inner) => is_verbatim_literal(inner),
        _ => false,
    }
}

fn is_temporal(type_name: &str) -> bool {
    let upper = type_name.to_uppercase();
    ["DATE", "TIME", "TIMESTAMP"].iter().any(|t| upper.contains(t))
}

/// Display name of a call-like expression (`UPPER`, `EXTRACT`, `SUBSTR`)
pub fn call_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Function(func) => Some(func.name.to_string()),
        Expr::Extract { .. } => Some("EXTRACT".to_string()),
        Expr::Trim { .. } => Some("TRIM".to_string()),
        Expr::Substring { .. } => {
            // SUBSTR and SUBSTRING share a node; keep the spelling used
            let rendered = expr.to_string();
            rendered.split('(').next().map(|name| name.trim().to_string())
        }
        Expr::Cast {
            kind: CastKind::Cast | CastKind::TryCast | CastKind::SafeCast,
            ..
        } => {
            let rendered = expr.to_string();
            rendered.split('(').next().map(|name| name.trim().to_string())
        }
        _ => None,
    }
}

/// Column side of a comparison, looking through wrapping calls
fn column_side(expr: &Expr) -> Option<ColumnSide> {
    if let Some(column) = column_ref(expr) {
        return Some(ColumnSide::bare(column));
    }

    match expr {
        Expr::Nested(inner) => column_side(inner),
        Expr::Function(func) if has_parentheses(func) => function_column_side(func),
        Expr::Extract { expr: inner, .. }
        | Expr::Trim { expr: inner, .. }
        | Expr::Cast { expr: inner, .. } => {
            let found = column_side(inner)?;
            Some(ColumnSide {
                column: found.column,
                function: call_name(expr),
                fn_args: None,
            })
        }
        Expr::Substring {
            expr: inner,
            substring_from,
            substring_for,
            ..
        } => {
            let found = column_side(inner)?;
            let rest: Vec<&Expr> = [substring_from, substring_for]
                .into_iter()
                .flatten()
                .map(|bound| &**bound)
                .collect();
            Some(ColumnSide {
                column: found.column,
                function: call_name(expr),
                fn_args: numeric_args(&rest),
            })
        }
        _ => None,
    }
}

fn function_column_side(func: &Function) -> Option<ColumnSide> {
    let args = function_args(func);
    let (position, found) = args
        .iter()
        .enumerate()
        .find_map(|(i, arg)| column_side(arg).map(|side| (i, side)))?;

    let rest: Vec<&Expr> = args
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != position)
        .map(|(_, arg)| *arg)
        .collect();

    Some(ColumnSide {
        column: found.column,
        function: Some(func.name.to_string()),
        fn_args: numeric_args(&rest),
    })
}

/// Remaining call arguments, when all of them are numeric literals
fn numeric_args(args: &[&Expr]) -> Option<Vec<LiteralValue>> {
    if args.is_empty() {
        return None;
    }
    args.iter()
        .map(|arg| literal_value(arg).filter(LiteralValue::is_numeric))
        .collect()
}

/// Value side: a literal, optionally wrapped by one function (`UPPER('x')`)
fn value_side(expr: &Expr) -> Option<(LiteralValue, Option<String>)> {
    if let Some(value) = literal_value(expr) {
        return Some((value, None));
    }

    match expr {
        Expr::Function(func) if has_parentheses(func) => function_args(func)
            .into_iter()
            .find_map(value_side)
            .map(|(value, _)| (value, Some(func.name.to_string()))),
        Expr::Trim { expr: inner, .. } => {
            value_side(inner).map(|(value, _)| (value, call_name(expr)))
        }
        _ => None,
    }
}

fn comparison_op(op: &BinaryOperator) -> Option<FilterOp> {
    match op {
        BinaryOperator::Eq => Some(FilterOp::Eq),
        BinaryOperator::NotEq => Some(FilterOp::NotEq),
        BinaryOperator::Gt => Some(FilterOp::Gt),
        BinaryOperator::GtEq => Some(FilterOp::GtEq),
        BinaryOperator::Lt => Some(FilterOp::Lt),
        BinaryOperator::LtEq => Some(FilterOp::LtEq),
        _ => None,
    }
}

/// Extracts literal conditions for one scope
pub struct LiteralExtractor<'t, 'a> {
    tree: &'t ScopeTree<'a>,
    scope: ScopeId,
}

impl<'t, 'a> LiteralExtractor<'t, 'a> {
    pub fn new(tree: &'t ScopeTree<'a>, scope: ScopeId) -> Self {
        Self { tree, scope }
    }

    /// All literal conditions of the scope, in document order
    pub fn extract(&self) -> Vec<ColumnCondition> {
        let select: &Select = self.tree.scope(self.scope).select;
        let mut out = Vec::new();

        for on in join_conditions(select) {
            self.predicate(on, &mut out);
        }
        for clause in [&select.selection, &select.having, &select.qualify]
            .into_iter()
            .flatten()
        {
            self.predicate(clause, &mut out);
        }

        out
    }

    fn predicate(&self, expr: &Expr, out: &mut Vec<ColumnCondition>) {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And | BinaryOperator::Or,
                right,
            } => {
                self.predicate(left, out);
                self.predicate(right, out);
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            }
            | Expr::Nested(inner) => self.predicate(inner, out),
            Expr::BinaryOp { left, op, right } => {
                if let Some(op) = comparison_op(op) {
                    self.comparison(left, op, right, out);
                }
            }
            Expr::InList {
                expr: inner,
                list,
                negated,
            } => {
                let Some(side) = column_side(inner) else { return };
                let (values, value_fns): (Vec<_>, Vec<_>) =
                    list.iter().filter_map(value_side).unzip();
                if values.is_empty() {
                    return;
                }
                let op = if *negated { FilterOp::NotIn } else { FilterOp::In };
                self.record(side, LiteralCondition::list(op, values, value_fns), out);
            }
            Expr::Like {
                negated,
                expr: inner,
                pattern,
                ..
            }
            | Expr::ILike {
                negated,
                expr: inner,
                pattern,
                ..
            } => {
                let Some(side) = column_side(inner) else { return };
                let Some((value, value_fn)) = value_side(pattern) else { return };
                let op = if *negated { FilterOp::NotLike } else { FilterOp::Like };
                let condition = LiteralCondition::single(op, value).with_value_fn(value_fn);
                self.record(side, condition, out);
            }
            Expr::Between {
                expr: inner,
                negated: false,
                low,
                high,
            } => {
                let Some(side) = column_side(inner) else { return };
                let low = literal_value(low).unwrap_or_else(|| LiteralValue::Text(low.to_string()));
                let high =
                    literal_value(high).unwrap_or_else(|| LiteralValue::Text(high.to_string()));
                self.record(side, LiteralCondition::between(low, high), out);
            }
            _ => {}
        }
    }

    fn comparison(&self, left: &Expr, op: FilterOp, right: &Expr, out: &mut Vec<ColumnCondition>) {
        let (side, (value, value_fn), op) = match (column_side(left), column_side(right)) {
            (Some(_), Some(_)) => return,
            (Some(side), None) => match value_side(right) {
                Some(value) => (side, value, op),
                None => return,
            },
            (None, Some(side)) => match value_side(left) {
                Some(value) => (side, value, op.flipped()),
                None => return,
            },
            (None, None) => return,
        };

        let condition = LiteralCondition::single(op, value).with_value_fn(value_fn);
        self.record(side, condition, out);
    }

    fn record(&self, side: ColumnSide, condition: LiteralCondition, out: &mut Vec<ColumnCondition>) {
        let Some(table) = self.tree.resolve(self.scope, &side.column).table().map(str::to_string)
        else {
            return;
        };

        tracing::trace!(%table, column = %side.column.column, op = %condition.op, "literal condition");
        out.push(ColumnCondition {
            table,
            column: side.column.column,
            condition: condition.with_function(side.function, side.fn_args),
        });
    }
}
