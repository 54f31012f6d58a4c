//! Table references and column attributions

use serde::{Deserialize, Serialize};

/// How a referenced table participates in a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Physical table read by the statement
    Base,

    /// Target of a CREATE statement
    Created,

    /// CREATE target flagged VOLATILE/TEMPORARY
    Temp,

    /// Target of INSERT/UPDATE/DELETE/MERGE
    WriteTarget,
}

/// A table as it appears in a statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableReference {
    /// Canonical identity: `catalog.schema.table` or shorter
    pub qualified_name: String,

    /// Last name part (the table name itself)
    pub base_name: String,

    /// Alias if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Role in the statement
    pub kind: TableKind,
}

impl TableReference {
    /// Build a reference from dotted name parts
    pub fn from_parts<I, S>(parts: I, kind: TableKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.is_empty())
            .collect();
        let base_name = parts.last().cloned().unwrap_or_default();

        Self {
            qualified_name: parts.join("."),
            base_name,
            alias: None,
            kind,
        }
    }

    /// Set the alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Change the kind
    pub fn with_kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    /// Key used for case-insensitive base-name lookups
    pub fn base_key(&self) -> String {
        self.base_name.to_lowercase()
    }
}

/// A (table, column) pair; `*` marks a wildcard reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnAttribution {
    pub table: String,
    pub column: String,
}

impl ColumnAttribution {
    /// Column value recorded for `*` projections
    pub const WILDCARD: &'static str = "*";

    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Wildcard attribution for a table
    pub fn wildcard(table: impl Into<String>) -> Self {
        Self::new(table, Self::WILDCARD)
    }

    pub fn is_wildcard(&self) -> bool {
        self.column == Self::WILDCARD
    }
}
