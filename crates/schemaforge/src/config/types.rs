//! Configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the default connection in `connections`.
    #[serde(default = "default_connection")]
    pub connection: String,

    /// Named connection definitions. The core receives opened connections;
    /// these definitions are what the CLI opens them from.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,

    /// Tables skipped by default during generation.
    #[serde(default = "default_exclude_tables")]
    pub exclude_tables: Vec<String>,

    /// Output directory for creation scripts.
    #[serde(default = "default_migrations_path")]
    pub migrations_path: PathBuf,

    #[serde(default)]
    pub models: ModelsConfig,

    /// Per-dialect native-type to method-token overrides,
    /// e.g. `type_mappings.mysql.geometry = "string"`.
    #[serde(default)]
    pub type_mappings: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default)]
    pub formatting: FormattingConfig,

    #[serde(default)]
    pub features: FeatureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            connections: BTreeMap::new(),
            exclude_tables: default_exclude_tables(),
            migrations_path: default_migrations_path(),
            models: ModelsConfig::default(),
            type_mappings: BTreeMap::new(),
            formatting: FormattingConfig::default(),
            features: FeatureConfig::default(),
        }
    }
}

/// One named database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver tag: mysql, mariadb, pgsql, sqlite or sqlsrv.
    pub driver: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Schema namespace for pgsql ("public") and sqlsrv ("dbo").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Database file path (sqlite only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Stub generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_models_path")]
    pub path: PathBuf,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_base_class")]
    pub base_class: String,

    #[serde(default = "default_true")]
    pub generate_relationships: bool,

    #[serde(default = "default_true")]
    pub generate_scopes: bool,

    /// Emit a fillable list; when false, a guarded list is emitted instead.
    #[serde(default = "default_true")]
    pub use_fillable: bool,

    #[serde(default = "default_guarded_columns")]
    pub guarded_columns: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            path: default_models_path(),
            namespace: default_namespace(),
            base_class: default_base_class(),
            generate_relationships: true,
            generate_scopes: true,
            use_fillable: true,
            guarded_columns: default_guarded_columns(),
        }
    }
}

/// Output formatting options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingConfig {
    /// Indentation unit: spaces or a single tab.
    #[serde(default = "default_indent")]
    pub indent: String,

    #[serde(default = "default_true")]
    pub sort_imports: bool,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            sort_imports: true,
        }
    }
}

/// Feature toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub separate_foreign_keys: bool,

    #[serde(default = "default_true")]
    pub detect_polymorphic: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            separate_foreign_keys: false,
            detect_polymorphic: true,
        }
    }
}

fn default_connection() -> String {
    "default".to_string()
}

fn default_exclude_tables() -> Vec<String> {
    vec!["migrations".to_string(), "sqlite_sequence".to_string()]
}

fn default_migrations_path() -> PathBuf {
    PathBuf::from("database/migrations")
}

fn default_models_path() -> PathBuf {
    PathBuf::from("app/Models")
}

fn default_namespace() -> String {
    "App\\Models".to_string()
}

fn default_base_class() -> String {
    "Illuminate\\Database\\Eloquent\\Model".to_string()
}

fn default_guarded_columns() -> Vec<String> {
    vec![
        "id".to_string(),
        "created_at".to_string(),
        "updated_at".to_string(),
        "deleted_at".to_string(),
    ]
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_indent() -> String {
    "    ".to_string()
}

fn default_true() -> bool {
    true
}
