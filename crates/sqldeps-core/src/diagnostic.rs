//! Warning codes for non-fatal resolution problems
//!
//! IMPORTANT: Warning codes are versioned and stable.
//! Downstream tooling matches on the `<code>:` prefix of each warning string,
//! so NEVER rename or remove codes - add new ones only.

use serde::{Deserialize, Serialize};

/// Warning code registry (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// A `*` or `t.*` projection was attributed to a table
    SelectStarUsed,

    /// A column (or qualified star) could not be attributed to a single table
    AmbiguousColumnOrigin,
}

impl WarningCode {
    /// Get the warning code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelectStarUsed => "select_star_used",
            Self::AmbiguousColumnOrigin => "ambiguous_column_origin",
        }
    }

    /// Parse a code from its stable identifier
    pub fn from_str_opt(code: &str) -> Option<Self> {
        match code {
            "select_star_used" => Some(Self::SelectStarUsed),
            "ambiguous_column_origin" => Some(Self::AmbiguousColumnOrigin),
            _ => None,
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A non-fatal warning raised while resolving a statement
///
/// Warnings never abort extraction; the affected attribution is simply
/// omitted. They are reported as `"<code>: <message>"` strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Stable warning code
    pub code: WarningCode,

    /// Human-readable message
    pub message: String,
}

impl Warning {
    /// Create a new warning
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `*` attributed to a resolved table
    pub fn star_used(table: &str) -> Self {
        Self::new(
            WarningCode::SelectStarUsed,
            format!("table {} has '*' referenced", table),
        )
    }

    /// Unqualified `*` in a scope without any FROM table
    pub fn star_without_tables() -> Self {
        Self::new(WarningCode::SelectStarUsed, "'*' with no FROM tables in scope")
    }

    /// `q.*` where `q` does not resolve
    pub fn unresolved_star_qualifier(qualifier: &str) -> Self {
        Self::new(
            WarningCode::AmbiguousColumnOrigin,
            format!("could not resolve qualifier '{}' for star", qualifier),
        )
    }

    /// `q.col` where `q` does not resolve
    pub fn unresolved_qualifier(qualifier: &str, column: &str) -> Self {
        Self::new(
            WarningCode::AmbiguousColumnOrigin,
            format!(
                "could not resolve qualifier '{}' for column '{}'",
                qualifier, column
            ),
        )
    }

    /// Unqualified column in a scope without any FROM table
    pub fn column_without_tables(column: &str) -> Self {
        Self::new(
            WarningCode::AmbiguousColumnOrigin,
            format!("column '{}' with no FROM tables in scope", column),
        )
    }

    /// Unqualified column with several candidate tables
    pub fn column_in_multiple_tables(column: &str, tables: &[String]) -> Self {
        Self::new(
            WarningCode::AmbiguousColumnOrigin,
            format!(
                "column '{}' could belong to any of: {}",
                column,
                tables.join(", ")
            ),
        )
    }

    /// Column reached only through derived sources that do not expose it
    pub fn column_through_derived(column: &str, sources: &[String]) -> Self {
        Self::new(
            WarningCode::AmbiguousColumnOrigin,
            format!(
                "column '{}' could not be traced through derived source(s): {}",
                column,
                sources.join(", ")
            ),
        )
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
