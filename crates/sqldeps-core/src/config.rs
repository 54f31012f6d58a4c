//! Configuration schema (sqldeps.toml)

use serde::{Deserialize, Serialize};
use crate::diagnostic::WarningCode;

/// SQL dialect configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// Generic ANSI SQL
    #[default]
    Ansi,

    /// Snowflake SQL dialect (accepts VOLATILE / TEMPORARY tables)
    Snowflake,

    /// PostgreSQL SQL dialect
    Postgres,

    /// BigQuery SQL dialect
    BigQuery,

    /// MySQL SQL dialect
    MySql,
}

impl DialectConfig {
    /// Stable name reported in `_meta.dialect`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ansi => "ansi",
            Self::Snowflake => "snowflake",
            Self::Postgres => "postgres",
            Self::BigQuery => "bigquery",
            Self::MySql => "mysql",
        }
    }
}

impl std::fmt::Display for DialectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DialectConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ansi" | "generic" => Ok(Self::Ansi),
            "snowflake" => Ok(Self::Snowflake),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "bigquery" => Ok(Self::BigQuery),
            "mysql" => Ok(Self::MySql),
            other => Err(ConfigError::UnknownDialect(other.to_string())),
        }
    }
}

/// Warning filtering rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningRules {
    /// Warning codes dropped from the report (e.g. "select_star_used")
    #[serde(default)]
    pub suppress: Vec<String>,
}

impl WarningRules {
    /// Check if a warning code is suppressed
    pub fn is_suppressed(&self, code: WarningCode) -> bool {
        self.suppress.iter().any(|c| c == code.as_str())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Pretty-print the JSON report
    #[serde(default)]
    pub pretty: bool,

    /// Warning filtering
    #[serde(default)]
    pub warnings: WarningRules,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        for code in &config.warnings.suppress {
            if WarningCode::from_str_opt(code).is_none() {
                return Err(ConfigError::UnknownWarningCode(code.clone()));
            }
        }

        Ok(config)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("Unknown warning code: {0}")]
    UnknownWarningCode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.dialect, DialectConfig::Ansi);
        assert!(!config.pretty);
        assert!(config.warnings.suppress.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            dialect = "snowflake"
            pretty = true

            [warnings]
            suppress = ["select_star_used"]
            "#,
        )
        .unwrap();

        assert_eq!(config.dialect, DialectConfig::Snowflake);
        assert!(config.pretty);
        assert!(config.warnings.is_suppressed(WarningCode::SelectStarUsed));
        assert!(!config.warnings.is_suppressed(WarningCode::AmbiguousColumnOrigin));
    }

    #[test]
    fn unknown_warning_code_is_rejected() {
        let result = Config::from_toml("[warnings]\nsuppress = [\"nope\"]\n");
        assert!(matches!(result, Err(ConfigError::UnknownWarningCode(_))));
    }

    #[test]
    fn dialect_from_str() {
        assert_eq!("Generic".parse::<DialectConfig>().unwrap(), DialectConfig::Ansi);
        assert_eq!("postgresql".parse::<DialectConfig>().unwrap(), DialectConfig::Postgres);
        assert!("teradata".parse::<DialectConfig>().is_err());
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config {
            dialect: DialectConfig::BigQuery,
            ..Config::default()
        };
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}
