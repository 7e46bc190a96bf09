//! Configuration validation.

use crate::config::Config;
use crate::drivers::DriverTag;
use crate::error::{Result, SchemaError};

pub fn validate(config: &Config) -> Result<()> {
    if config.connection.is_empty() {
        return Err(SchemaError::Config(
            "connection name must not be empty".to_string(),
        ));
    }

    for (name, conn) in &config.connections {
        let tag = DriverTag::from_str(&conn.driver)?;
        match tag {
            DriverTag::Sqlite => {
                if conn.path.is_none() {
                    return Err(SchemaError::Config(format!(
                        "connection '{}': sqlite requires a 'path'",
                        name
                    )));
                }
            }
            _ => {
                if conn.database.is_empty() {
                    return Err(SchemaError::Config(format!(
                        "connection '{}': 'database' must not be empty",
                        name
                    )));
                }
            }
        }
    }

    for dialect in config.type_mappings.keys() {
        DriverTag::from_str(dialect).map_err(|_| {
            SchemaError::Config(format!(
                "type_mappings: unknown dialect '{}'",
                dialect
            ))
        })?;
    }

    let indent = &config.formatting.indent;
    let all_spaces = !indent.is_empty() && indent.chars().all(|c| c == ' ');
    if !(all_spaces || indent == "\t") {
        return Err(SchemaError::Config(
            "formatting.indent must be one or more spaces or a single tab".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    fn make_test_connection(driver: &str) -> ConnectionConfig {
        ConnectionConfig {
            driver: driver.to_string(),
            host: "localhost".to_string(),
            port: 3306,
            database: "app".to_string(),
            user: "root".to_string(),
            password: String::new(),
            schema: None,
            path: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_unknown_driver_is_rejected() {
        let mut config = Config::default();
        config
            .connections
            .insert("default".into(), make_test_connection("oracle"));
        assert!(matches!(
            validate(&config),
            Err(SchemaError::UnsupportedDriver(_))
        ));
    }

    #[test]
    fn test_sqlite_requires_path() {
        let mut config = Config::default();
        config
            .connections
            .insert("default".into(), make_test_connection("sqlite"));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_indent_is_rejected() {
        let mut config = Config::default();
        config.formatting.indent = "  \t".to_string();
        assert!(validate(&config).is_err());

        config.formatting.indent = "\t".to_string();
        assert!(validate(&config).is_ok());

        config.formatting.indent = "  ".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_type_mapping_dialects_are_checked() {
        let mut config = Config::default();
        config
            .type_mappings
            .insert("mongodb".into(), Default::default());
        assert!(validate(&config).is_err());
    }
}
