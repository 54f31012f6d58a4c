//! Dependency extraction
//!
//! Drives the scope resolver, classifier, attributor, literal extractor and
//! renderer over every statement of a script and merges the results into one
//! [`DependencyReport`].

use sqlparser::ast::Statement;
use std::path::Path;
use sqldeps_core::{Config, DependencyReport, DialectConfig, TableKind, Warning, WarningRules};

use crate::attributor::ColumnAttributor;
use crate::classifier::ObjectClassifier;
use crate::functions::function_calls;
use crate::literals::LiteralExtractor;
use crate::parser::{ParseError, SqlParser};
use crate::render::ConditionRenderer;
use crate::scope::ScopeTree;

/// Extraction error
///
/// Parsing is the only fatal step; everything after it degrades to warnings.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ExtractError {
    /// Stable error type name (`ParseError`)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "ParseError",
        }
    }
}

/// Extracts dependency reports from SQL scripts
///
/// Stateless across calls: every extraction builds and drops its own scope
/// trees.
pub struct DependencyExtractor {
    parser: SqlParser,
    rules: WarningRules,
}

impl DependencyExtractor {
    /// Extractor for a dialect with no warning suppression
    pub fn new(dialect: DialectConfig) -> Self {
        Self {
            parser: SqlParser::from_dialect(&dialect),
            rules: WarningRules::default(),
        }
    }

    /// Extractor configured from `sqldeps.toml`
    pub fn from_config(config: &Config) -> Self {
        Self {
            parser: SqlParser::from_dialect(&config.dialect),
            rules: config.warnings.clone(),
        }
    }

    pub fn dialect(&self) -> DialectConfig {
        self.parser.dialect()
    }

    /// Parse and extract a whole script
    pub fn extract(&self, sql: &str) -> Result<DependencyReport, ExtractError> {
        self.extract_source(sql, None)
    }

    /// Parse and extract a script read from `file_path`, so parse errors
    /// name the file
    pub fn extract_source(
        &self,
        sql: &str,
        file_path: Option<&Path>,
    ) -> Result<DependencyReport, ExtractError> {
        let parsed = self.parser.parse(sql, file_path)?;
        Ok(self.extract_statements(&parsed.statements))
    }

    /// Extract from already-parsed statements
    pub fn extract_statements(&self, statements: &[Statement]) -> DependencyReport {
        let mut report = DependencyReport::new(self.dialect().as_str());
        let mut classifier = ObjectClassifier::new();

        for (index, statement) in statements.iter().enumerate() {
            tracing::debug!(statement = index + 1, "extracting statement");
            self.statement(statement, &mut classifier, &mut report);
        }

        report.meta.statements = statements.len();
        report.finalize();
        report
    }

    fn statement(
        &self,
        statement: &Statement,
        classifier: &mut ObjectClassifier,
        report: &mut DependencyReport,
    ) {
        let objects = classifier.classify(statement);
        report.tables.extend(objects.base_tables);
        report.ctes.extend(objects.ctes);
        for created in objects.created {
            if created.kind == TableKind::Temp {
                report.temp_tables.insert(created.qualified_name.clone());
            }
            report.created_objects.insert(created.qualified_name);
        }
        report
            .write_targets
            .extend(objects.write_targets.into_iter().map(|t| t.qualified_name));

        let tree = ScopeTree::build(statement);
        for scope in tree.scopes() {
            let label = tree.label(scope.id);
            tracing::debug!(
                label,
                tables = ?scope.physical_tables(),
                "scope built"
            );

            let columns = ColumnAttributor::new(&tree, scope.id).attribute();
            for column in columns.columns {
                report.add_column(column);
            }
            for warning in &columns.warnings {
                self.warn(report, warning);
            }

            for found in LiteralExtractor::new(&tree, scope.id).extract() {
                report.add_condition(&found.table, &found.column, found.condition);
            }

            report.add_pseudocode(label, ConditionRenderer::new(&tree, scope.id).entry());
        }

        for call in function_calls(statement) {
            report.add_function(call);
        }
    }

    fn warn(&self, report: &mut DependencyReport, warning: &Warning) {
        if self.rules.is_suppressed(warning.code) {
            tracing::trace!(%warning, "warning suppressed");
            return;
        }
        tracing::debug!(%warning, "warning");
        report.add_warning(warning);
    }
}

impl Default for DependencyExtractor {
    fn default() -> Self {
        Self::new(DialectConfig::default())
    }
}

/// Extract with the default (ansi) dialect
pub fn extract_dependencies(sql: &str) -> Result<DependencyReport, ExtractError> {
    DependencyExtractor::default().extract(sql)
}
