//! Name helpers over sqlparser AST nodes

use sqlparser::ast::{Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectName};

/// Dotted, unquoted form of an object name (`catalog.schema.table`)
pub fn qualified_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Last part of an object name
pub fn base_name(name: &ObjectName) -> String {
    name.0.last().map(|ident| ident.value.clone()).unwrap_or_default()
}

/// A column reference, `col` or `q1.q2.col`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Qualifier parts, empty for an unqualified reference
    pub qualifier: Vec<String>,

    /// Column name as written
    pub column: String,
}

impl ColumnRef {
    pub fn is_qualified(&self) -> bool {
        !self.qualifier.is_empty()
    }

    /// Qualifier as written (`o`, `sales.orders`)
    pub fn qualifier_text(&self) -> String {
        self.qualifier.join(".")
    }
}

/// Extract a column reference from an identifier expression
pub fn column_ref(expr: &Expr) -> Option<ColumnRef> {
    match expr {
        Expr::Identifier(ident) => Some(ColumnRef {
            qualifier: Vec::new(),
            column: ident.value.clone(),
        }),
        Expr::CompoundIdentifier(parts) => {
            let (column, qualifier) = parts.split_last()?;
            Some(ColumnRef {
                qualifier: qualifier.iter().map(|i| i.value.clone()).collect(),
                column: column.value.clone(),
            })
        }
        _ => None,
    }
}

/// Positional expression arguments of a function call
///
/// Wildcard arguments (`COUNT(*)`) are skipped.
pub fn function_args(func: &Function) -> Vec<&Expr> {
    match &func.args {
        FunctionArguments::List(list) => list
            .args
            .iter()
            .filter_map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Some(expr),
                FunctionArg::Named {
                    arg: FunctionArgExpr::Expr(expr),
                    ..
                } => Some(expr),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether the call was written with parentheses (`UPPER(x)` vs `CURRENT_DATE`)
pub fn has_parentheses(func: &Function) -> bool {
    !matches!(func.args, FunctionArguments::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::ast::Ident;

    #[test]
    fn compound_identifier_splits_qualifier() {
        let expr = Expr::CompoundIdentifier(vec![
            Ident::new("sales"),
            Ident::new("orders"),
            Ident::new("order_id"),
        ]);
        let col = column_ref(&expr).unwrap();
        assert_eq!(col.column, "order_id");
        assert_eq!(col.qualifier_text(), "sales.orders");
        assert!(col.is_qualified());
    }

    #[test]
    fn plain_identifier_is_unqualified() {
        let col = column_ref(&Expr::Identifier(Ident::new("amount"))).unwrap();
        assert!(!col.is_qualified());
        assert_eq!(col.column, "amount");
    }

    #[test]
    fn object_name_parts() {
        let name = ObjectName(vec![Ident::new("sales"), Ident::with_quote('"', "Orders")]);
        assert_eq!(qualified_name(&name), "sales.Orders");
        assert_eq!(base_name(&name), "Orders");
    }
}
