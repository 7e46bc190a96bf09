//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::error::{Result, SchemaError};

impl Config {
    /// Load configuration from a file.
    ///
    /// `.json` files are parsed as JSON; everything else is parsed as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| SchemaError::Config(format!("Failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Resolve the active connection definition. `name` overrides the
    /// configured default.
    pub fn active_connection(&self, name: Option<&str>) -> Result<&ConnectionConfig> {
        let name = name.unwrap_or(&self.connection);
        self.connections.get(name).ok_or_else(|| {
            SchemaError::ConnectionMissing(format!("connection '{}' is not defined", name))
        })
    }

    /// The type-mapping overrides for one dialect, if any were configured.
    pub fn type_mappings_for(
        &self,
        dialect: &str,
    ) -> Option<&std::collections::BTreeMap<String, String>> {
        self.type_mappings.get(dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
connection: main

connections:
  main:
    driver: mysql
    host: localhost
    port: 3306
    database: app
    user: root
    password: secret

exclude_tables:
  - migrations
  - telescope_entries

migrations_path: database/migrations

models:
  path: app/Models
  namespace: App\Models
  use_fillable: true

type_mappings:
  mysql:
    geometry: string

features:
  separate_foreign_keys: true
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        assert_eq!(config.connection, "main");
        assert!(config.features.separate_foreign_keys);
        assert_eq!(
            config.type_mappings_for("mysql").unwrap()["geometry"],
            "string"
        );
        assert_eq!(
            config.exclude_tables,
            vec!["migrations".to_string(), "telescope_entries".into()]
        );
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", VALID_YAML).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection, "main");
        assert!(Config::load("does_not_exist.yaml").is_err());
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(r#"{"connection": "default"}"#).unwrap();
        assert_eq!(config.connection, "default");
        assert!(config.models.use_fillable);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            Config::from_json("{not json"),
            Err(SchemaError::Config(_))
        ));
    }

    #[test]
    fn test_active_connection_resolution() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        assert_eq!(config.active_connection(None).unwrap().database, "app");
        assert_eq!(
            config.active_connection(Some("main")).unwrap().driver,
            "mysql"
        );
        assert!(matches!(
            config.active_connection(Some("reporting")),
            Err(SchemaError::ConnectionMissing(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.connection, "default");
        assert_eq!(config.models.namespace, "App\\Models");
        assert_eq!(config.formatting.indent, "    ");
        assert!(!config.features.separate_foreign_keys);
        assert!(config.features.detect_polymorphic);
    }
}
