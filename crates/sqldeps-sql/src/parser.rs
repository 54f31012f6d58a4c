//! SQL parsing using datafusion-sqlparser-rs
//!
//! Thin facade over sqlparser: picks a dialect and wraps parse failures.

use sqlparser::ast::Statement;
use sqlparser::dialect::{
    BigQueryDialect, Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::parser::{Parser, ParserError};
use sqldeps_core::DialectConfig;
use std::path::{Path, PathBuf};

/// SQL parser with configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
    name: DialectConfig,
}

impl SqlParser {
    /// Create a new SQL parser with the default (generic) dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
            name: DialectConfig::Ansi,
        }
    }

    /// Create a SQL parser for BigQuery
    pub fn bigquery() -> Self {
        Self {
            dialect: Box::new(BigQueryDialect {}),
            name: DialectConfig::BigQuery,
        }
    }

    /// Create a SQL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
            name: DialectConfig::Postgres,
        }
    }

    /// Create a SQL parser for Snowflake
    pub fn snowflake() -> Self {
        Self {
            dialect: Box::new(SnowflakeDialect {}),
            name: DialectConfig::Snowflake,
        }
    }

    /// Create a SQL parser for MySQL
    pub fn mysql() -> Self {
        Self {
            dialect: Box::new(MySqlDialect {}),
            name: DialectConfig::MySql,
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        match dialect {
            DialectConfig::BigQuery => Self::bigquery(),
            DialectConfig::Snowflake => Self::snowflake(),
            DialectConfig::Postgres => Self::postgres(),
            DialectConfig::MySql => Self::mysql(),
            DialectConfig::Ansi => Self::new(),
        }
    }

    /// Dialect this parser was built for
    pub fn dialect(&self) -> DialectConfig {
        self.name
    }

    /// Parse a SQL script into statements
    pub fn parse(&self, sql: &str, file_path: Option<&Path>) -> Result<ParsedSql, ParseError> {
        match Parser::parse_sql(&*self.dialect, sql) {
            Ok(statements) => Ok(ParsedSql {
                statements,
                file_path: file_path.map(Path::to_path_buf),
            }),
            Err(error) => Err(ParseError {
                error,
                file_path: file_path.map(Path::to_path_buf),
            }),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Successfully parsed SQL script
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Parsed statements in document order
    pub statements: Vec<Statement>,

    /// Source file path (if parsed from file)
    pub file_path: Option<PathBuf>,
}

impl ParsedSql {
    pub fn first_statement(&self) -> Option<&Statement> {
        self.statements.first()
    }

    /// Count the number of statements
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// SQL parsing error
#[derive(Debug, thiserror::Error)]
#[error("SQL parse error{}: {error}", location(.file_path))]
pub struct ParseError {
    /// Parser error from sqlparser
    pub error: ParserError,

    /// Source file path
    pub file_path: Option<PathBuf>,
}

impl ParseError {
    /// Parser message without the wrapper prefix
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

fn location(file_path: &Option<PathBuf>) -> String {
    file_path
        .as_ref()
        .map(|path| format!(" in {}", path.display()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_select() {
        let parser = SqlParser::new();
        let parsed = parser.parse("SELECT id, name FROM users WHERE active = true", None).unwrap();

        assert_eq!(parsed.statement_count(), 1);
        assert!(matches!(parsed.first_statement(), Some(Statement::Query(_))));
    }

    #[test]
    fn parse_script() {
        let parser = SqlParser::new();
        let parsed = parser
            .parse("SELECT 1 FROM a; DELETE FROM b WHERE x = 1;", None)
            .unwrap();

        assert_eq!(parsed.statement_count(), 2);
    }

    #[test]
    fn parse_invalid_sql() {
        let parser = SqlParser::new();
        let error = parser.parse("SELECT FROM WHERE (", None).unwrap_err();

        assert!(error.to_string().starts_with("SQL parse error:"));
        assert!(!error.message().is_empty());
        assert!(error.file_path.is_none());
    }

    #[test]
    fn parse_error_names_the_file() {
        let parser = SqlParser::new();
        let path = Path::new("models/orders.sql");

        let error = parser.parse("SELECT FROM WHERE (", Some(path)).unwrap_err();
        assert_eq!(error.file_path.as_deref(), Some(path));
        assert!(error.to_string().starts_with("SQL parse error in models/orders.sql: "));

        let parsed = parser.parse("SELECT 1", Some(path)).unwrap();
        assert_eq!(parsed.file_path.as_deref(), Some(path));
    }

    #[test]
    fn snowflake_accepts_volatile_tables() {
        let parser = SqlParser::snowflake();
        assert!(parser
            .parse("CREATE VOLATILE TABLE vt AS SELECT id FROM sales.orders", None)
            .is_ok());
    }

    #[test]
    fn different_dialects() {
        let sql = "SELECT id FROM users";

        for dialect in [
            DialectConfig::Ansi,
            DialectConfig::BigQuery,
            DialectConfig::Postgres,
            DialectConfig::Snowflake,
            DialectConfig::MySql,
        ] {
            let parser = SqlParser::from_dialect(&dialect);
            assert_eq!(parser.dialect(), dialect);
            assert!(parser.parse(sql, None).is_ok());
        }
    }
}
