//! SQL dependency extraction
//!
//! This crate handles:
//! - Parsing SQL using datafusion-sqlparser-rs
//! - Building query scopes and resolving aliases, derived tables and CTEs
//! - Classifying tables into base tables, CTEs, created objects and write targets
//! - Attributing columns and literal filters to tables
//! - Rendering filter/join conditions as labelled pseudocode

pub mod attributor;
pub mod classifier;
pub mod extractor;
pub mod functions;
pub mod literals;
pub mod names;
pub mod parser;
pub mod render;
pub mod scope;

pub use attributor::{ColumnAttributor, ScopeColumns};
pub use classifier::{ObjectClassifier, StatementObjects, TempSignal};
pub use extractor::{extract_dependencies, DependencyExtractor, ExtractError};
pub use functions::function_calls;
pub use literals::{ColumnCondition, LiteralExtractor};
pub use parser::{ParseError, ParsedSql, SqlParser};
pub use render::ConditionRenderer;
pub use scope::{Resolution, Scope, ScopeId, ScopeTree};
