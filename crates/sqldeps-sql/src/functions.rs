//! Function and procedure call detection

use sqlparser::ast::{CastKind, Expr, Statement, Visit, Visitor};
use sqldeps_core::FunctionCall;
use std::ops::ControlFlow;

use crate::literals::call_name;
use crate::names::has_parentheses;

/// Standard SQL and common warehouse functions, uppercase
const BUILTIN_FUNCTIONS: &[&str] = &[
    // Aggregates
    "COUNT", "SUM", "AVG", "MIN", "MAX", "STDDEV", "STDDEV_POP", "STDDEV_SAMP", "VARIANCE",
    "VAR_POP", "VAR_SAMP", "LISTAGG", "STRING_AGG", "ARRAY_AGG", "MEDIAN",
    // Window
    "ROW_NUMBER", "RANK", "DENSE_RANK", "PERCENT_RANK", "CUME_DIST", "NTILE", "LAG", "LEAD",
    "FIRST_VALUE", "LAST_VALUE", "NTH_VALUE",
    // String
    "UPPER", "LOWER", "TRIM", "LTRIM", "RTRIM", "SUBSTR", "SUBSTRING", "LENGTH",
    "CHAR_LENGTH", "CHARACTER_LENGTH", "CONCAT", "REPLACE", "POSITION", "INSTR", "LPAD",
    "RPAD", "LEFT", "RIGHT", "REVERSE", "SPLIT_PART", "INITCAP", "REGEXP_REPLACE",
    "REGEXP_SUBSTR", "OREPLACE", "OTRANSLATE", "INDEX", "STRTOK",
    // Null handling and conditionals
    "COALESCE", "NULLIF", "NVL", "NVL2", "ZEROIFNULL", "NULLIFZERO", "IFNULL", "GREATEST",
    "LEAST", "DECODE", "IFF",
    // Numeric
    "ABS", "ROUND", "CEIL", "CEILING", "FLOOR", "MOD", "POWER", "SQRT", "EXP", "LN", "LOG",
    "SIGN", "TRUNC",
    // Date and time
    "EXTRACT", "DATE_TRUNC", "DATE_PART", "DATEADD", "DATEDIFF", "ADD_MONTHS",
    "MONTHS_BETWEEN", "LAST_DAY", "TO_DATE", "TO_CHAR", "TO_TIMESTAMP", "TO_NUMBER", "NOW",
    // Conversion
    "CAST", "TRY_CAST", "SAFE_CAST",
];

/// `Some(true)` for a known function, `None` when unknown
pub fn builtin_flag(name: &str) -> Option<bool> {
    let upper = name.to_uppercase();
    BUILTIN_FUNCTIONS.contains(&upper.as_str()).then_some(true)
}

#[derive(Default)]
struct CallCollector {
    calls: Vec<FunctionCall>,
}

impl CallCollector {
    fn push(&mut self, name: String) {
        if name.is_empty() {
            return;
        }
        let builtin = builtin_flag(&name);
        self.calls.push(FunctionCall::function(name, builtin));
    }
}

impl Visitor for CallCollector {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        match expr {
            // CURRENT_DATE and friends are keywords, not calls
            Expr::Function(func) if has_parentheses(func) => self.push(func.name.to_string()),
            Expr::Function(_) => {}
            Expr::Cast {
                kind: CastKind::DoubleColon,
                ..
            } => {}
            Expr::Extract { .. } | Expr::Trim { .. } | Expr::Substring { .. } | Expr::Cast { .. } => {
                if let Some(name) = call_name(expr) {
                    self.push(name);
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        if let Statement::Call(func) = statement {
            self.calls.push(FunctionCall::procedure(func.name.to_string()));
        }
        ControlFlow::Continue(())
    }
}

/// Calls made by a statement, in visiting order (may repeat)
pub fn function_calls(statement: &Statement) -> Vec<FunctionCall> {
    let mut collector = CallCollector::default();
    let _ = statement.visit(&mut collector);
    collector.calls
}
