//! Table and object classification
//!
//! Splits the tables a statement mentions into base tables, CTE names,
//! created objects (with a temporary/volatile flag) and DML write targets.
//! Classification accumulates across the statements of a script: a name
//! created or written by an earlier statement is never a base table later.

use sqlparser::ast::{
    visit_relations, CreateTable, FromTable, ObjectName, Query, Statement, TableFactor, Visit,
    Visitor,
};
use sqldeps_core::{TableKind, TableReference};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

use crate::names::qualified_name;

/// Markers of a temporary object in rendered CREATE text
const TEMP_MARKERS: &[&str] = &["volatile", "global temporary", "temporary"];

/// Objects of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementObjects {
    /// Physical tables read
    pub base_tables: BTreeSet<String>,

    /// WITH-clause names as written
    pub ctes: BTreeSet<String>,

    /// CREATE targets; kind is `Temp` when flagged temporary/volatile
    pub created: Vec<TableReference>,

    /// INSERT/UPDATE/DELETE/MERGE targets
    pub write_targets: Vec<TableReference>,
}

/// Which heuristic flagged a created object as temporary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempSignal {
    /// TEMPORARY / VOLATILE flag on the CREATE node
    Structural,

    /// Marker in the statement head before the object name
    Properties,

    /// Marker anywhere in the rendered statement
    Text,
}

/// Script-wide classifier
#[derive(Debug, Default)]
pub struct ObjectClassifier {
    /// Lowercase CTE names seen so far
    ctes: BTreeSet<String>,
    created: BTreeSet<String>,
    write_targets: BTreeSet<String>,
}

impl ObjectClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one statement
    pub fn classify(&mut self, statement: &Statement) -> StatementObjects {
        let mut objects = StatementObjects {
            ctes: cte_names(statement),
            ..StatementObjects::default()
        };
        self.ctes
            .extend(objects.ctes.iter().map(|name| name.to_lowercase()));

        if let Some(created) = created_object(statement) {
            self.created.insert(created.qualified_name.clone());
            objects.created.push(created);
        }
        if let Some(target) = write_target(statement) {
            self.write_targets.insert(target.qualified_name.clone());
            objects.write_targets.push(target);
        }

        for table in relations(statement) {
            if self.ctes.contains(&table.base_key())
                || self.created.contains(&table.qualified_name)
                || self.write_targets.contains(&table.qualified_name)
            {
                continue;
            }
            objects.base_tables.insert(table.qualified_name);
        }

        objects
    }
}

/// Every table reference in a statement, in visiting order
fn relations<V: Visit>(node: &V) -> Vec<TableReference> {
    let mut tables = Vec::new();
    let _ = visit_relations(node, |name: &ObjectName| {
        let table = table_reference(name, TableKind::Base);
        if !table.qualified_name.is_empty() {
            tables.push(table);
        }
        ControlFlow::<()>::Continue(())
    });
    tables
}

fn table_reference(name: &ObjectName, kind: TableKind) -> TableReference {
    TableReference::from_parts(name.0.iter().map(|ident| ident.value.clone()), kind)
}

struct CteCollector {
    names: BTreeSet<String>,
}

impl Visitor for CteCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.names.insert(cte.alias.name.value.clone());
            }
        }
        ControlFlow::Continue(())
    }
}

/// Names introduced by any WITH clause of the statement
pub fn cte_names(statement: &Statement) -> BTreeSet<String> {
    let mut collector = CteCollector {
        names: BTreeSet::new(),
    };
    let _ = statement.visit(&mut collector);
    collector.names
}

/// The CREATE target of a statement, flagged `Temp` when temporary
pub fn created_object(statement: &Statement) -> Option<TableReference> {
    let (name, structural) = match statement {
        Statement::CreateTable(create) => (&create.name, structural_temp(create)),
        Statement::CreateView { name, .. } => (name, false),
        _ => return None,
    };

    let table = table_reference(name, TableKind::Created);
    if table.qualified_name.is_empty() {
        return None;
    }

    match temp_signal(statement, name, structural) {
        Some(signal) => {
            tracing::trace!(table = %table.qualified_name, ?signal, "temporary object");
            Some(table.with_kind(TableKind::Temp))
        }
        None => Some(table),
    }
}

fn structural_temp(create: &CreateTable) -> bool {
    create.temporary || create.volatile || create.global == Some(true)
}

/// Ordered temp heuristics; the first that fires wins
pub fn temp_signal(statement: &Statement, name: &ObjectName, structural: bool) -> Option<TempSignal> {
    if structural {
        return Some(TempSignal::Structural);
    }

    let rendered = statement.to_string().to_lowercase();
    let head = rendered
        .find(&name.to_string().to_lowercase())
        .map(|end| &rendered[..end])
        .unwrap_or_default();

    if has_temp_marker(head) {
        Some(TempSignal::Properties)
    } else if has_temp_marker(&rendered) {
        Some(TempSignal::Text)
    } else {
        None
    }
}

fn has_temp_marker(text: &str) -> bool {
    TEMP_MARKERS.iter().any(|marker| text.contains(marker))
}

fn factor_table(factor: &TableFactor) -> Option<&ObjectName> {
    match factor {
        TableFactor::Table { name, .. } => Some(name),
        _ => None,
    }
}

/// The table a DML statement writes to
pub fn write_target(statement: &Statement) -> Option<TableReference> {
    let target = match statement {
        Statement::Insert(insert) => {
            if !qualified_name(&insert.table_name).is_empty() {
                Some(table_reference(&insert.table_name, TableKind::WriteTarget))
            } else {
                // any table outside the source query
                let inner: BTreeSet<String> = insert
                    .source
                    .as_ref()
                    .map(|source| relations(&**source))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|t| t.qualified_name)
                    .collect();
                return relations(statement)
                    .into_iter()
                    .find(|t| !inner.contains(&t.qualified_name))
                    .map(|t| t.with_kind(TableKind::WriteTarget));
            }
        }
        Statement::Update { table, .. } => factor_table(&table.relation)
            .map(|name| table_reference(name, TableKind::WriteTarget)),
        Statement::Delete(delete) => {
            let from = match &delete.from {
                FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
            };
            delete
                .tables
                .first()
                .or_else(|| from.first().and_then(|t| factor_table(&t.relation)))
                .map(|name| table_reference(name, TableKind::WriteTarget))
        }
        Statement::Merge { table, .. } => {
            factor_table(table).map(|name| table_reference(name, TableKind::WriteTarget))
        }
        _ => None,
    };

    target.filter(|t| !t.qualified_name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;
    use pretty_assertions::assert_eq;

    fn parse(sql: &str) -> Vec<Statement> {
        SqlParser::new().parse(sql, None).unwrap().statements
    }

    fn classify(sql: &str) -> StatementObjects {
        let mut classifier = ObjectClassifier::new();
        let mut last = StatementObjects::default();
        for statement in parse(sql) {
            last = classifier.classify(&statement);
        }
        last
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn select_tables_are_base_tables() {
        let objects = classify("SELECT a.id FROM sales.orders a JOIN sales.items b ON a.id = b.order_id");
        assert_eq!(names(&objects.base_tables), vec!["sales.items", "sales.orders"]);
        assert!(objects.created.is_empty());
        assert!(objects.write_targets.is_empty());
    }

    #[test]
    fn cte_names_are_not_base_tables() {
        let objects = classify(
            "WITH recent AS (SELECT id FROM sales.orders) SELECT r.id FROM recent r",
        );
        assert_eq!(names(&objects.base_tables), vec!["sales.orders"]);
        assert_eq!(names(&objects.ctes), vec!["recent"]);
    }

    #[test]
    fn ctas_target_is_created() {
        let objects = classify("CREATE TABLE tmp.stage AS SELECT id FROM sales.orders");
        assert_eq!(names(&objects.base_tables), vec!["sales.orders"]);
        assert_eq!(objects.created.len(), 1);
        assert_eq!(objects.created[0].qualified_name, "tmp.stage");
        assert_eq!(objects.created[0].kind, TableKind::Created);
    }

    #[test]
    fn temporary_table_is_flagged_structurally() {
        let statements = parse("CREATE TEMPORARY TABLE stage AS SELECT id FROM sales.orders");
        let created = created_object(&statements[0]).unwrap();
        assert_eq!(created.kind, TableKind::Temp);

        let Statement::CreateTable(create) = &statements[0] else {
            panic!("expected CREATE TABLE")
        };
        assert_eq!(
            temp_signal(&statements[0], &create.name, structural_temp(create)),
            Some(TempSignal::Structural)
        );
    }

    #[test]
    fn temp_marker_in_name_falls_through_to_text() {
        let objects = classify("CREATE TABLE rpt.temporary_orders AS SELECT id FROM sales.orders");
        assert_eq!(objects.created[0].qualified_name, "rpt.temporary_orders");
        assert_eq!(objects.created[0].kind, TableKind::Temp);

        let statements = parse("CREATE TABLE rpt.temporary_orders AS SELECT id FROM sales.orders");
        let Statement::CreateTable(create) = &statements[0] else {
            panic!("expected CREATE TABLE")
        };
        assert!(!structural_temp(create));
        assert_eq!(
            temp_signal(&statements[0], &create.name, false),
            Some(TempSignal::Text)
        );
    }

    #[test]
    fn temp_tiers_run_in_order() {
        let statements = parse("CREATE TEMPORARY TABLE stage AS SELECT id FROM tmp.temporary_feed");
        let Statement::CreateTable(create) = &statements[0] else {
            panic!("expected CREATE TABLE")
        };

        // every tier would fire here; the first one wins
        assert_eq!(
            temp_signal(&statements[0], &create.name, true),
            Some(TempSignal::Structural)
        );
        assert_eq!(
            temp_signal(&statements[0], &create.name, false),
            Some(TempSignal::Properties)
        );

        let plain = parse("CREATE TABLE rpt.orders AS SELECT id FROM sales.orders");
        let Statement::CreateTable(create) = &plain[0] else {
            panic!("expected CREATE TABLE")
        };
        assert_eq!(temp_signal(&plain[0], &create.name, false), None);
    }

    #[test]
    fn volatile_table_in_snowflake() {
        let statements = SqlParser::snowflake()
            .parse("CREATE VOLATILE TABLE vt AS SELECT id FROM sales.orders", None)
            .unwrap()
            .statements;
        let created = created_object(&statements[0]).unwrap();
        assert_eq!(created.qualified_name, "vt");
        assert_eq!(created.kind, TableKind::Temp);
    }

    #[test]
    fn view_is_created_not_temp() {
        let statements = parse("CREATE VIEW rpt.v AS SELECT id FROM sales.orders");
        let created = created_object(&statements[0]).unwrap();
        assert_eq!(created.qualified_name, "rpt.v");
        assert_eq!(created.kind, TableKind::Created);
    }

    #[test]
    fn dml_write_targets() {
        let cases = [
            ("INSERT INTO sales.new_items (order_id) SELECT order_id FROM sales.order_items", "sales.new_items", "sales.order_items"),
            ("UPDATE sales.orders SET status = 'x' WHERE id IN (SELECT order_id FROM sales.returns)", "sales.orders", "sales.returns"),
            ("DELETE FROM sales.order_items WHERE order_id IN (SELECT id FROM sales.orders)", "sales.order_items", "sales.orders"),
            (
                "MERGE INTO sales.orders AS o USING sales.order_items AS i ON o.order_id = i.order_id \
                 WHEN MATCHED THEN UPDATE SET customer_id = i.customer_id",
                "sales.orders",
                "sales.order_items",
            ),
        ];

        for (sql, target, source) in cases {
            let objects = classify(sql);
            assert_eq!(objects.write_targets.len(), 1, "{}", sql);
            assert_eq!(objects.write_targets[0].qualified_name, target);
            assert_eq!(names(&objects.base_tables), vec![source], "{}", sql);
        }
    }

    #[test]
    fn earlier_targets_are_excluded_later() {
        let objects = classify(
            "CREATE TABLE tmp.stage AS SELECT id FROM sales.orders; \
             SELECT s.id FROM tmp.stage s JOIN sales.items i ON s.id = i.order_id",
        );
        assert_eq!(names(&objects.base_tables), vec!["sales.items"]);
    }
}
