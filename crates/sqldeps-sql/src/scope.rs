//! Query scopes and alias resolution
//!
//! Every SELECT block of a statement becomes a [`Scope`]. Scopes live in an
//! arena owned by [`ScopeTree`] and point at their parent by id, so a nested
//! (correlated) block can see its ancestors' aliases while its own aliases
//! never leak upward.
//!
//! The tree is built in one depth-first traversal. Children are attached in
//! document order: CTE bodies, projection subqueries, FROM/JOIN sources and
//! ON conditions, WHERE, GROUP BY, HAVING, QUALIFY. Labels (`1`, `1.1`, ...)
//! are assigned in a second pass once the whole tree exists.

use sqlparser::ast::{
    Expr, GroupByExpr, Query, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins,
};
use sqldeps_core::{TableKind, TableReference};
use std::collections::{BTreeMap, BTreeSet};

use crate::names::{column_ref, function_args, ColumnRef};

/// Index of a scope in its tree
pub type ScopeId = usize;

/// CTE name (lowercase) -> scope of its body
type CteEnv = BTreeMap<String, ScopeId>;

/// Result of attributing a column reference to a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Attributed to a qualified table name
    Table(String),

    /// The qualifier matches nothing visible from the scope
    UnknownQualifier,

    /// Unqualified reference with no table anywhere in scope
    NoTables,

    /// Unqualified reference with several candidate tables
    Ambiguous(Vec<String>),

    /// Only derived sources are in reach and none of them maps the column
    /// to a table
    Untraced(Vec<String>),
}

impl Resolution {
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// One query block
#[derive(Debug)]
pub struct Scope<'a> {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub select: &'a Select,
    /// Query whose body is this select, for its ORDER BY
    pub owner: Option<&'a Query>,
    children: Vec<ScopeId>,

    /// Physical tables directly in FROM/JOIN, in order
    tables: Vec<TableReference>,

    /// Qualifier (alias, base name or qualified name, lowercase) -> qualified table
    aliases: BTreeMap<String, String>,

    /// Aliases of derived tables and CTE references
    derived: BTreeSet<String>,

    /// Derived alias -> {output column (lowercase) -> base table}
    derived_columns: BTreeMap<String, BTreeMap<String, String>>,

    /// Derived alias -> the one base table its body reads
    derived_single: BTreeMap<String, String>,
}

impl<'a> Scope<'a> {
    fn new(id: ScopeId, parent: Option<ScopeId>, select: &'a Select) -> Self {
        Self {
            id,
            parent,
            select,
            owner: None,
            children: Vec::new(),
            tables: Vec::new(),
            aliases: BTreeMap::new(),
            derived: BTreeSet::new(),
            derived_columns: BTreeMap::new(),
            derived_single: BTreeMap::new(),
        }
    }

    /// Direct child scopes in document order
    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    /// Physical tables of this block's FROM clause
    pub fn tables(&self) -> &[TableReference] {
        &self.tables
    }

    /// Alias map: qualifier -> qualified table
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Subquery column map: derived alias -> {output column -> table}
    pub fn derived_columns(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.derived_columns
    }

    /// Single-base map: derived alias -> table
    pub fn derived_single(&self) -> &BTreeMap<String, String> {
        &self.derived_single
    }

    /// Distinct physical tables
    pub fn physical_tables(&self) -> BTreeSet<String> {
        self.tables.iter().map(|t| t.qualified_name.clone()).collect()
    }

    /// Base tables reachable from this block: physical tables plus the single
    /// base of each derived source
    pub fn base_tables(&self) -> BTreeSet<String> {
        let mut tables = self.physical_tables();
        tables.extend(self.derived_single.values().cloned());
        tables
    }

    fn has_sources(&self) -> bool {
        !self.tables.is_empty() || !self.derived.is_empty()
    }

    fn add_table(&mut self, table: TableReference) {
        let qualified = table.qualified_name.clone();
        if let Some(alias) = &table.alias {
            self.aliases.insert(alias.to_lowercase(), qualified.clone());
        }
        // first occurrence wins for base and qualified names
        self.aliases
            .entry(table.base_key())
            .or_insert_with(|| qualified.clone());
        self.aliases
            .entry(qualified.to_lowercase())
            .or_insert(qualified);
        self.tables.push(table);
    }

    fn lookup_qualified(&self, qualifier: &[String], column: &str) -> Option<Resolution> {
        let full = qualifier.join(".").to_lowercase();
        let last = qualifier.last().map(|q| q.to_lowercase()).unwrap_or_default();
        let column = column.to_lowercase();
        let keys = [full, last];

        let table = keys.iter().find_map(|q| {
            self.aliases
                .get(q)
                .or_else(|| self.derived_columns.get(q).and_then(|cols| cols.get(&column)))
                .or_else(|| self.derived_single.get(q))
                .cloned()
        });
        if let Some(table) = table {
            return Some(Resolution::Table(table));
        }

        // a derived source hides same-named qualifiers of enclosing blocks
        keys.into_iter()
            .find(|q| self.derived.contains(q))
            .map(|q| Resolution::Untraced(vec![q]))
    }

    fn lookup_unqualified(&self, column: &str) -> Option<Resolution> {
        if !self.has_sources() {
            return None;
        }

        let column = column.to_lowercase();
        let mut candidates = self.physical_tables();
        candidates.extend(
            self.derived_columns
                .values()
                .filter_map(|cols| cols.get(&column))
                .cloned(),
        );
        if candidates.is_empty() {
            candidates.extend(self.derived_single.values().cloned());
        }

        let mut candidates: Vec<String> = candidates.into_iter().collect();
        if candidates.len() == 1 {
            return candidates.pop().map(Resolution::Table);
        }
        if candidates.is_empty() {
            return Some(Resolution::Untraced(self.derived.iter().cloned().collect()));
        }
        Some(Resolution::Ambiguous(candidates))
    }
}

/// Attribute a column reference starting at `scope`
///
/// Qualified references try the scope's alias map, its subquery column map
/// and its single-base map, then the same in each ancestor. The walk stops at
/// the first scope that knows the qualifier, even when it cannot attribute the
/// column. Unqualified references use the nearest scope that has any FROM
/// source.
fn resolve_in(scopes: &[Scope<'_>], scope: ScopeId, column: &ColumnRef) -> Resolution {
    let mut current = Some(scope);

    if column.is_qualified() {
        while let Some(id) = current {
            let s = &scopes[id];
            if let Some(resolution) = s.lookup_qualified(&column.qualifier, &column.column) {
                return resolution;
            }
            current = s.parent;
        }
        return Resolution::UnknownQualifier;
    }

    while let Some(id) = current {
        let s = &scopes[id];
        if let Some(resolution) = s.lookup_unqualified(&column.column) {
            return resolution;
        }
        current = s.parent;
    }
    Resolution::NoTables
}

/// Scope tree of one statement
#[derive(Debug)]
pub struct ScopeTree<'a> {
    scopes: Vec<Scope<'a>>,
    roots: Vec<ScopeId>,
    /// Entry scope of each query, for EXISTS/IN references
    query_entries: Vec<(&'a Query, ScopeId)>,
    labels: Vec<String>,
}

impl<'a> ScopeTree<'a> {
    /// Build the scope tree of a statement and label it
    pub fn build(statement: &'a Statement) -> Self {
        let mut builder = ScopeBuilder::default();
        builder.statement(statement);

        let mut tree = Self {
            scopes: builder.scopes,
            roots: builder.roots,
            query_entries: builder.query_entries,
            labels: Vec::new(),
        };
        tree.assign_labels();
        tree
    }

    /// Label pass: roots get `1..n`, direct children `<parent>.<k>`
    fn assign_labels(&mut self) {
        let mut labels = vec![String::new(); self.scopes.len()];
        let mut stack: Vec<(ScopeId, String)> = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &id)| (id, (i + 1).to_string()))
            .collect();

        while let Some((id, label)) = stack.pop() {
            for (k, &child) in self.scopes[id].children.iter().enumerate().rev() {
                stack.push((child, format!("{}.{}", label, k + 1)));
            }
            labels[id] = label;
        }

        self.labels = labels;
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// All scopes, parents before children, in document order
    pub fn scopes(&self) -> &[Scope<'a>] {
        &self.scopes
    }

    pub fn scope(&self, id: ScopeId) -> &Scope<'a> {
        &self.scopes[id]
    }

    /// Top-level scopes of the statement
    pub fn roots(&self) -> &[ScopeId] {
        &self.roots
    }

    pub fn label(&self, id: ScopeId) -> &str {
        &self.labels[id]
    }

    /// Label of the scope a (sub)query starts with
    pub fn label_of_query(&self, query: &Query) -> Option<&str> {
        self.query_entries
            .iter()
            .find(|(q, _)| std::ptr::eq(*q, query))
            .map(|&(_, id)| self.label(id))
    }

    /// Attribute a column reference seen in `scope`
    pub fn resolve(&self, scope: ScopeId, column: &ColumnRef) -> Resolution {
        resolve_in(&self.scopes, scope, column)
    }
}

#[derive(Default)]
struct ScopeBuilder<'a> {
    scopes: Vec<Scope<'a>>,
    roots: Vec<ScopeId>,
    query_entries: Vec<(&'a Query, ScopeId)>,
}

impl<'a> ScopeBuilder<'a> {
    fn statement(&mut self, statement: &'a Statement) {
        let env = CteEnv::new();

        match statement {
            Statement::Query(query) => {
                self.query(query, None, &env);
            }
            Statement::Insert(insert) => {
                if let Some(source) = &insert.source {
                    self.query(source, None, &env);
                }
            }
            Statement::CreateTable(create) => {
                if let Some(query) = &create.query {
                    self.query(query, None, &env);
                }
            }
            Statement::CreateView { query, .. } => {
                self.query(query, None, &env);
            }
            Statement::Update {
                assignments,
                selection,
                ..
            } => {
                for assignment in assignments {
                    self.nested(&assignment.value, None, &env);
                }
                if let Some(selection) = selection {
                    self.nested(selection, None, &env);
                }
            }
            Statement::Delete(delete) => {
                if let Some(selection) = &delete.selection {
                    self.nested(selection, None, &env);
                }
            }
            Statement::Merge { source, on, .. } => {
                if let TableFactor::Derived { subquery, .. } = source {
                    self.query(subquery, None, &env);
                }
                self.nested(on, None, &env);
            }
            _ => {}
        }
    }

    fn query(&mut self, query: &'a Query, parent: Option<ScopeId>, env: &CteEnv) -> Option<ScopeId> {
        let local: CteEnv;
        let env = match &query.with {
            Some(with) => {
                let mut names = env.clone();
                for cte in &with.cte_tables {
                    if let Some(id) = self.query(&cte.query, parent, &names) {
                        names.insert(cte.alias.name.value.to_lowercase(), id);
                    }
                }
                local = names;
                &local
            }
            None => env,
        };

        let entry = self.set_expr(&query.body, parent, env);
        if let Some(id) = entry {
            self.query_entries.push((query, id));
            if matches!(query.body.as_ref(), SetExpr::Select(_)) {
                self.scopes[id].owner = Some(query);
            }
        }
        entry
    }

    fn set_expr(&mut self, body: &'a SetExpr, parent: Option<ScopeId>, env: &CteEnv) -> Option<ScopeId> {
        match body {
            SetExpr::Select(select) => Some(self.select(select, parent, env)),
            SetExpr::Query(query) => self.query(query, parent, env),
            SetExpr::SetOperation { left, right, .. } => {
                let left = self.set_expr(left, parent, env);
                let right = self.set_expr(right, parent, env);
                left.or(right)
            }
            _ => None,
        }
    }

    fn select(&mut self, select: &'a Select, parent: Option<ScopeId>, env: &CteEnv) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope::new(id, parent, select));
        match parent {
            Some(parent) => self.scopes[parent].children.push(id),
            None => self.roots.push(id),
        }

        // physical tables first: derived children may correlate against them
        for table in &select.from {
            self.collect_tables(id, table, env);
        }

        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.nested(expr, Some(id), env);
                }
                _ => {}
            }
        }

        for table in &select.from {
            self.from_children(id, table, env);
        }

        if let Some(selection) = &select.selection {
            self.nested(selection, Some(id), env);
        }
        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                self.nested(expr, Some(id), env);
            }
        }
        if let Some(having) = &select.having {
            self.nested(having, Some(id), env);
        }
        if let Some(qualify) = &select.qualify {
            self.nested(qualify, Some(id), env);
        }

        id
    }

    fn collect_tables(&mut self, id: ScopeId, table: &'a TableWithJoins, env: &CteEnv) {
        self.factor_tables(id, &table.relation, env);
        for join in &table.joins {
            self.factor_tables(id, &join.relation, env);
        }
    }

    fn factor_tables(&mut self, id: ScopeId, factor: &'a TableFactor, env: &CteEnv) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let alias = alias.as_ref().map(|a| a.name.value.clone());

                let cte = match name.0.as_slice() {
                    [single] => env.get(&single.value.to_lowercase()).copied(),
                    _ => None,
                };
                if let Some(cte_scope) = cte {
                    let key = alias.unwrap_or_else(|| crate::names::base_name(name));
                    self.register_derived(id, key.to_lowercase(), cte_scope);
                    return;
                }

                let mut table = TableReference::from_parts(
                    name.0.iter().map(|ident| ident.value.clone()),
                    TableKind::Base,
                );
                if let Some(alias) = alias {
                    table = table.with_alias(alias);
                }
                if !table.qualified_name.is_empty() {
                    self.scopes[id].add_table(table);
                }
            }
            TableFactor::NestedJoin { table_with_joins, .. } => {
                self.collect_tables(id, table_with_joins, env);
            }
            _ => {}
        }
    }

    fn from_children(&mut self, id: ScopeId, table: &'a TableWithJoins, env: &CteEnv) {
        self.factor_children(id, &table.relation, env);
        for join in &table.joins {
            self.factor_children(id, &join.relation, env);
            if let Some(on) = crate::render::join_condition(&join.join_operator) {
                self.nested(on, Some(id), env);
            }
        }
    }

    fn factor_children(&mut self, id: ScopeId, factor: &'a TableFactor, env: &CteEnv) {
        match factor {
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let child = self.query(subquery, Some(id), env);
                // unaliased subqueries expose nothing to the enclosing block
                if let (Some(child), Some(alias)) = (child, alias) {
                    self.register_derived(id, alias.name.value.to_lowercase(), child);
                }
            }
            TableFactor::NestedJoin { table_with_joins, .. } => {
                self.from_children(id, table_with_joins, env);
            }
            _ => {}
        }
    }

    /// Expose a derived source's output columns and single base under `alias`
    fn register_derived(&mut self, id: ScopeId, alias: String, inner: ScopeId) {
        let (single, columns) = self.derived_output(inner);

        let scope = &mut self.scopes[id];
        scope.derived.insert(alias.clone());
        if let Some(single) = single {
            scope.derived_single.insert(alias.clone(), single);
        }
        if !columns.is_empty() {
            scope.derived_columns.insert(alias, columns);
        }
    }

    fn derived_output(&self, inner: ScopeId) -> (Option<String>, BTreeMap<String, String>) {
        let scope = &self.scopes[inner];
        let bases = scope.base_tables();
        let single = if bases.len() == 1 {
            bases.into_iter().next()
        } else {
            None
        };

        let mut columns = BTreeMap::new();
        for item in &scope.select.projection {
            let (name, expr) = match item {
                SelectItem::ExprWithAlias { expr, alias } => (alias.value.clone(), expr),
                SelectItem::UnnamedExpr(expr) => match column_ref(expr) {
                    Some(col) => (col.column, expr),
                    None => continue,
                },
                _ => continue,
            };

            let base = column_ref(expr)
                .and_then(|col| resolve_in(&self.scopes, inner, &col).table().map(str::to_string))
                .or_else(|| single.clone());
            if let Some(base) = base {
                columns.insert(name.to_lowercase(), base);
            }
        }

        (single, columns)
    }

    /// Attach every subquery inside `expr` as a child of `parent`
    fn nested(&mut self, expr: &'a Expr, parent: Option<ScopeId>, env: &CteEnv) {
        let mut queries = Vec::new();
        collect_subqueries(expr, &mut queries);
        for query in queries {
            self.query(query, parent, env);
        }
    }
}

/// Subqueries directly inside an expression, in document order
///
/// Does not descend into the subqueries themselves.
pub fn collect_subqueries<'a>(expr: &'a Expr, out: &mut Vec<&'a Query>) {
    match expr {
        Expr::Subquery(query) => out.push(query),
        Expr::Exists { subquery, .. } => out.push(subquery),
        Expr::InSubquery { expr, subquery, .. } => {
            collect_subqueries(expr, out);
            out.push(subquery);
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_subqueries(left, out);
            collect_subqueries(right, out);
        }
        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::IsTrue(expr)
        | Expr::IsFalse(expr)
        | Expr::Cast { expr, .. }
        | Expr::Extract { expr, .. }
        | Expr::Trim { expr, .. } => collect_subqueries(expr, out),
        Expr::InList { expr, list, .. } => {
            collect_subqueries(expr, out);
            for item in list {
                collect_subqueries(item, out);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_subqueries(expr, out);
            collect_subqueries(low, out);
            collect_subqueries(high, out);
        }
        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            collect_subqueries(expr, out);
            collect_subqueries(pattern, out);
        }
        Expr::Substring {
            expr,
            substring_from,
            substring_for,
            ..
        } => {
            collect_subqueries(expr, out);
            for bound in [substring_from, substring_for].into_iter().flatten() {
                collect_subqueries(bound, out);
            }
        }
        Expr::Function(func) => {
            if let sqlparser::ast::FunctionArguments::Subquery(query) = &func.args {
                out.push(query);
            }
            for arg in function_args(func) {
                collect_subqueries(arg, out);
            }
        }
        Expr::Tuple(items) => {
            for item in items {
                collect_subqueries(item, out);
            }
        }
        _ => {}
    }
}
