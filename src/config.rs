//! Configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// Destination database (PostgreSQL) connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

impl ConnectionConfig {
    /// Build a connection string for tokio-postgres.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }
}

/// Destination loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Destination connection parameters.
    pub connection: ConnectionConfig,

    /// Name of the table the data will be inserted into. Required.
    pub table_name: String,

    /// True: commit once at session end. False: per-statement durability.
    #[serde(default = "default_true")]
    pub perform_as_transaction: bool,

    /// True: binary COPY streaming. False: parameterized INSERT per row.
    #[serde(default = "default_true")]
    pub perform_copy: bool,
}

impl DestinationConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DestinationConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Runs before any connection is opened.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(LoadError::Config(
                "table name needs to be provided".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml(table: &str) -> String {
        format!(
            r#"
connection:
  host: localhost
  database: warehouse
  user: loader
  password: secret
table_name: "{}"
"#,
            table
        )
    }

    #[test]
    fn test_defaults() {
        let config = DestinationConfig::from_yaml(&sample_yaml("public.orders")).unwrap();
        assert_eq!(config.connection.port, 5432);
        assert!(config.perform_as_transaction);
        assert!(config.perform_copy);
    }

    #[test]
    fn test_missing_table_name_rejected() {
        let err = DestinationConfig::from_yaml(&sample_yaml("")).unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
    }

    #[test]
    fn test_explicit_flags() {
        let yaml = format!(
            "{}perform_as_transaction: false\nperform_copy: false\n",
            sample_yaml("t")
        );
        let config = DestinationConfig::from_yaml(&yaml).unwrap();
        assert!(!config.perform_as_transaction);
        assert!(!config.perform_copy);
    }

    #[test]
    fn test_connection_string() {
        let config = DestinationConfig::from_yaml(&sample_yaml("t")).unwrap();
        assert_eq!(
            config.connection.connection_string(),
            "host=localhost port=5432 dbname=warehouse user=loader password=secret"
        );
    }
}
