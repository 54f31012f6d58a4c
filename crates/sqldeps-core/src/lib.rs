//! sqldeps core
//!
//! Core domain model with stable, serializable types.
//! Never rename warning codes or report keys - they are part of the public API.

pub mod condition;
pub mod config;
pub mod diagnostic;
pub mod report;
pub mod table;

pub use condition::{ConditionOperand, FilterOp, LiteralCondition, LiteralValue};
pub use config::{Config, ConfigError, DialectConfig, WarningRules};
pub use diagnostic::{Warning, WarningCode};
pub use report::{CallKind, DependencyReport, FunctionCall, PseudocodeEntry, ReportMeta};
pub use table::{ColumnAttribution, TableKind, TableReference};
