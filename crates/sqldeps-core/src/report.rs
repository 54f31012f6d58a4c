//! Dependency report schema (stable v1)
//!
//! This schema is STABLE. The underscore-prefixed keys are consumed by
//! lineage tooling; breaking changes require a new key, never a rename.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::condition::LiteralCondition;
use crate::diagnostic::Warning;
use crate::table::ColumnAttribution;

/// Rendered filter/join text for one query scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudocodeEntry {
    /// Equality conditions of the scope's JOIN ... ON clauses
    pub join: String,

    /// WHERE condition
    #[serde(rename = "where")]
    pub where_clause: String,

    /// HAVING condition
    pub having: String,
}

impl PseudocodeEntry {
    pub fn is_empty(&self) -> bool {
        self.join.is_empty() && self.where_clause.is_empty() && self.having.is_empty()
    }
}

/// Kind of a detected call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Function,
    Procedure,
}

/// A function or procedure call found in the script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: CallKind,

    /// `true` for a recognised standard function, `null` when unknown
    pub builtin: Option<bool>,
}

impl FunctionCall {
    pub fn function(name: impl Into<String>, builtin: Option<bool>) -> Self {
        Self {
            name: name.into(),
            kind: CallKind::Function,
            builtin,
        }
    }

    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CallKind::Procedure,
            builtin: None,
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Number of statements in the script
    pub statements: usize,

    /// Dialect used to parse the script
    pub dialect: String,
}

/// Dependency report for one SQL script
///
/// All collections are ordered so that serializing the same input twice
/// yields byte-identical output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyReport {
    /// Physical tables read (excluding CTEs, created objects and write targets)
    #[serde(rename = "_tables")]
    pub tables: BTreeSet<String>,

    /// Columns referenced per table; `*` marks wildcard use
    #[serde(rename = "_variables")]
    pub variables: BTreeMap<String, BTreeSet<String>>,

    /// Literal conditions per table and column
    #[serde(rename = "_values")]
    pub values: BTreeMap<String, BTreeMap<String, Vec<LiteralCondition>>>,

    /// Created objects flagged VOLATILE/TEMPORARY
    #[serde(rename = "_temp_tables")]
    pub temp_tables: BTreeSet<String>,

    /// Names introduced by WITH clauses
    #[serde(rename = "_ctes")]
    pub ctes: BTreeSet<String>,

    /// Function and procedure calls, de-duplicated by (name, type)
    #[serde(rename = "_functions")]
    pub functions: Vec<FunctionCall>,

    /// CREATE targets
    #[serde(rename = "_created_objects")]
    pub created_objects: BTreeSet<String>,

    /// INSERT/UPDATE/DELETE/MERGE targets
    #[serde(rename = "_write_targets")]
    pub write_targets: BTreeSet<String>,

    /// Rendered conditions keyed by `Operation <label>`
    #[serde(rename = "_pseudocode")]
    pub pseudocode: BTreeMap<String, Vec<PseudocodeEntry>>,

    /// Non-fatal warnings in the order they were raised
    #[serde(rename = "_warnings")]
    pub warnings: Vec<String>,

    #[serde(rename = "_meta")]
    pub meta: ReportMeta,
}

impl DependencyReport {
    /// Create an empty report
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            meta: ReportMeta {
                statements: 0,
                dialect: dialect.into(),
            },
            ..Self::default()
        }
    }

    /// Record a column attribution
    pub fn add_column(&mut self, attribution: ColumnAttribution) {
        self.variables
            .entry(attribution.table)
            .or_default()
            .insert(attribution.column);
    }

    /// Record a literal condition unless an identical one is already present
    pub fn add_condition(&mut self, table: &str, column: &str, condition: LiteralCondition) {
        let conditions = self
            .values
            .entry(table.to_string())
            .or_default()
            .entry(column.to_string())
            .or_default();

        if !conditions.contains(&condition) {
            conditions.push(condition);
        }
    }

    /// Record a rendered scope under `Operation <label>`
    ///
    /// Labels restart per statement, so an entry whose label was already used
    /// by an earlier statement is appended rather than overwriting it.
    pub fn add_pseudocode(&mut self, label: &str, entry: PseudocodeEntry) {
        self.pseudocode
            .entry(format!("Operation {}", label))
            .or_default()
            .push(entry);
    }

    /// Record a call unless one with the same (name, type) exists
    pub fn add_function(&mut self, call: FunctionCall) {
        let seen = self
            .functions
            .iter()
            .any(|f| f.name == call.name && f.kind == call.kind);
        if !seen {
            self.functions.push(call);
        }
    }

    /// Record a warning
    pub fn add_warning(&mut self, warning: &Warning) {
        self.warnings.push(warning.to_string());
    }

    /// Apply cross-statement exclusions and canonical ordering
    ///
    /// A created object or write target is never also a base table, and
    /// every condition list is ordered by its canonical JSON text.
    pub fn finalize(&mut self) {
        let excluded: HashSet<&String> = self
            .created_objects
            .iter()
            .chain(self.write_targets.iter())
            .collect();
        self.tables.retain(|t| !excluded.contains(t));

        for columns in self.values.values_mut() {
            for conditions in columns.values_mut() {
                conditions.sort_by_cached_key(LiteralCondition::canonical_key);
            }
        }
    }

    /// Sorted column list for a table
    pub fn columns_of(&self, table: &str) -> Vec<&str> {
        self.variables
            .get(table)
            .map(|cols| cols.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Conditions recorded for a table column
    pub fn conditions_of(&self, table: &str, column: &str) -> &[LiteralCondition] {
        self.values
            .get(table)
            .and_then(|cols| cols.get(column))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First pseudocode entry for a label
    pub fn operation(&self, label: &str) -> Option<&PseudocodeEntry> {
        self.pseudocode
            .get(&format!("Operation {}", label))
            .and_then(|entries| entries.first())
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to indented JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{FilterOp, LiteralValue};
    use crate::diagnostic::Warning;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_report() {
        let report = DependencyReport::new("ansi");
        assert!(report.tables.is_empty());
        assert_eq!(report.meta.dialect, "ansi");
        assert_eq!(report.meta.statements, 0);
    }

    #[test]
    fn conditions_are_deduplicated_and_sorted() {
        let mut report = DependencyReport::new("ansi");
        let le = LiteralCondition::single(FilterOp::LtEq, LiteralValue::Integer(200));
        let gt = LiteralCondition::single(FilterOp::Gt, LiteralValue::Integer(100));

        report.add_condition("sales.items", "amount", le.clone());
        report.add_condition("sales.items", "amount", gt.clone());
        report.add_condition("sales.items", "amount", le.clone());
        report.finalize();

        assert_eq!(report.conditions_of("sales.items", "amount"), &[gt, le]);
    }

    #[test]
    fn finalize_excludes_created_and_written_tables() {
        let mut report = DependencyReport::new("ansi");
        report.tables.insert("sales.orders".to_string());
        report.tables.insert("sales.items".to_string());
        report.tables.insert("tmp.stage".to_string());
        report.created_objects.insert("tmp.stage".to_string());
        report.write_targets.insert("sales.items".to_string());
        report.finalize();

        assert_eq!(report.tables.iter().collect::<Vec<_>>(), vec!["sales.orders"]);
    }

    #[test]
    fn functions_dedup_by_name_and_kind() {
        let mut report = DependencyReport::new("ansi");
        report.add_function(FunctionCall::function("UPPER", Some(true)));
        report.add_function(FunctionCall::function("UPPER", Some(true)));
        report.add_function(FunctionCall::procedure("UPPER"));

        assert_eq!(report.functions.len(), 2);
    }

    #[test]
    fn pseudocode_labels_accumulate() {
        let mut report = DependencyReport::new("ansi");
        report.add_pseudocode("1", PseudocodeEntry::default());
        report.add_pseudocode("1", PseudocodeEntry {
            where_clause: "(t.a == 1)".to_string(),
            ..PseudocodeEntry::default()
        });

        assert_eq!(report.pseudocode["Operation 1"].len(), 2);
        assert!(report.operation("1").unwrap().is_empty());
    }

    #[test]
    fn report_serialization_keys() {
        let mut report = DependencyReport::new("ansi");
        report.add_warning(&Warning::star_used("sales.orders"));
        let json = report.to_json().unwrap();

        for key in [
            "\"_tables\"",
            "\"_variables\"",
            "\"_values\"",
            "\"_temp_tables\"",
            "\"_ctes\"",
            "\"_functions\"",
            "\"_created_objects\"",
            "\"_write_targets\"",
            "\"_pseudocode\"",
            "\"_warnings\"",
            "\"_meta\"",
        ] {
            assert!(json.contains(key), "missing {}", key);
        }
        assert!(json.contains("select_star_used: table sales.orders"));
    }
}
