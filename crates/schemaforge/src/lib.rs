//! # schemaforge
//!
//! Database schema introspection and code generation.
//!
//! schemaforge connects to a live relational database, builds a
//! dialect-neutral description of its schema and emits two artifact sets:
//!
//! - **Creation scripts** ordered so every referenced table exists before its
//!   referrers, with cycle-safe foreign-key installation
//! - **Data-access class stubs** whose relationships are inferred from the
//!   foreign-key graph
//!
//! plus a structural **drift report** between the live schema and a
//! previously emitted script set.
//!
//! ## Example
//!
//! ```rust,no_run
//! use schemaforge::{
//!     Connection, MigrationEmitter, MigrationOptions, ParserImpl, SchemaParser, TypeMap,
//! };
//!
//! #[tokio::main]
//! async fn main() -> schemaforge::Result<()> {
//!     let pool = sqlx::MySqlPool::connect("mysql://root@localhost/app").await?;
//!     let parser = ParserImpl::from_connection(Connection::MySql(pool), None);
//!
//!     let names = parser.list_tables(&[]).await?;
//!     let tables = schemaforge::parse_tables(&parser, &names).await?;
//!
//!     let type_map = TypeMap::builder().build();
//!     let emitter = MigrationEmitter::new(&type_map, MigrationOptions::default());
//!     for file in emitter.generate(&tables, chrono::Local::now().naive_local()) {
//!         println!("{}", file.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diff;
pub mod drivers;
pub mod emit;
pub mod error;
pub mod graph;
pub mod naming;
pub mod relations;
pub mod schema;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, FeatureConfig, FormattingConfig, ModelsConfig};
pub use diff::{
    MigrationArchive, MigrationDrift, SchemaComparator, SchemaDiff, ScriptArchive, TableDiff,
};
pub use drivers::{parse_tables, Connection, DriverTag, ParserImpl, SchemaParser};
pub use emit::{GeneratedFile, MigrationEmitter, MigrationOptions, ModelEmitter};
pub use error::{Result, SchemaError};
pub use graph::DependencyGraph;
pub use relations::{Relationship, RelationshipDetector};
pub use schema::{Column, ColumnType, DefaultValue, ForeignKey, Index, IndexKind, Table};
pub use typemap::{TypeMap, TypeMapBuilder};
