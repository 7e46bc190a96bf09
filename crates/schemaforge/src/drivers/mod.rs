//! Dialect parser implementations.
//!
//! One parser per supported dialect, each reducing its catalog queries into
//! the dialect-neutral schema model:
//!
//! - [`mysql`]: MySQL/MariaDB via INFORMATION_SCHEMA
//! - [`postgres`]: PostgreSQL via information_schema + pg_catalog
//! - [`sqlite`]: SQLite via sqlite_master + PRAGMA
//! - [`mssql`]: SQL Server via sys.* catalog views
//!
//! [`ParserImpl`] provides enum-based static dispatch over the four
//! implementations; [`Connection`] carries the opened pool the host hands to
//! the core.

pub mod common;
pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mssql::{MssqlConnectionManager, MssqlParser};
pub use mysql::MysqlParser;
pub use postgres::PostgresParser;
pub use sqlite::SqliteParser;

use async_trait::async_trait;

use crate::error::{Result, SchemaError};
use crate::schema::Table;

/// Driver tag identifying one supported dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTag {
    Mysql,
    Pgsql,
    Sqlite,
    Sqlsrv,
}

impl DriverTag {
    /// Parse a driver tag. MariaDB reports the MySQL tag; anything outside
    /// the supported set fails with UnsupportedDriver.
    pub fn from_str(tag: &str) -> Result<Self> {
        match tag.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DriverTag::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(DriverTag::Pgsql),
            "sqlite" => Ok(DriverTag::Sqlite),
            "sqlsrv" | "mssql" | "sqlserver" => Ok(DriverTag::Sqlsrv),
            other => Err(SchemaError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverTag::Mysql => "mysql",
            DriverTag::Pgsql => "pgsql",
            DriverTag::Sqlite => "sqlite",
            DriverTag::Sqlsrv => "sqlsrv",
        }
    }
}

impl std::fmt::Display for DriverTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opened database connection handed to the core by the host.
///
/// Connection acquisition (credentials, TLS, pooling limits) is host-side;
/// the parsers only run read-only catalog queries on whatever they receive.
pub enum Connection {
    MySql(sqlx::MySqlPool),
    Postgres(sqlx::PgPool),
    Sqlite(sqlx::SqlitePool),
    Mssql(bb8::Pool<MssqlConnectionManager>),
}

impl Connection {
    pub fn driver(&self) -> DriverTag {
        match self {
            Connection::MySql(_) => DriverTag::Mysql,
            Connection::Postgres(_) => DriverTag::Pgsql,
            Connection::Sqlite(_) => DriverTag::Sqlite,
            Connection::Mssql(_) => DriverTag::Sqlsrv,
        }
    }
}

/// Contract every dialect parser implements.
#[async_trait]
pub trait SchemaParser: Send + Sync {
    /// List base table names, minus the excluded set, in a stable order.
    async fn list_tables(&self, exclude: &[String]) -> Result<Vec<String>>;

    /// Parse one table: three catalog queries (columns, indexes, foreign
    /// keys) plus table-level metadata, composed into a validated [`Table`].
    async fn parse_table(&self, name: &str) -> Result<Table>;

    /// Whether the table exists in the live catalog.
    async fn table_exists(&self, name: &str) -> Result<bool>;

    /// Name of the connected database.
    async fn database_name(&self) -> Result<String>;

    /// The dialect's driver tag.
    fn driver(&self) -> DriverTag;
}

/// Enum-based static dispatch over the four parsers.
///
/// The compiler generates a match instead of vtable dispatch; the factory
/// selects the implementation from the connection's driver tag.
pub enum ParserImpl {
    Mysql(MysqlParser),
    Postgres(PostgresParser),
    Sqlite(SqliteParser),
    Mssql(MssqlParser),
}

impl ParserImpl {
    /// Select the parser implementation for an opened connection.
    ///
    /// `schema` is the namespace for dialects that have one (PostgreSQL
    /// defaults to "public", SQL Server to "dbo"); it is ignored elsewhere.
    pub fn from_connection(connection: Connection, schema: Option<String>) -> Self {
        match connection {
            Connection::MySql(pool) => ParserImpl::Mysql(MysqlParser::new(pool)),
            Connection::Postgres(pool) => ParserImpl::Postgres(PostgresParser::new(
                pool,
                schema.unwrap_or_else(|| "public".to_string()),
            )),
            Connection::Sqlite(pool) => ParserImpl::Sqlite(SqliteParser::new(pool)),
            Connection::Mssql(pool) => ParserImpl::Mssql(MssqlParser::new(
                pool,
                schema.unwrap_or_else(|| "dbo".to_string()),
            )),
        }
    }
}

#[async_trait]
impl SchemaParser for ParserImpl {
    async fn list_tables(&self, exclude: &[String]) -> Result<Vec<String>> {
        match self {
            ParserImpl::Mysql(p) => p.list_tables(exclude).await,
            ParserImpl::Postgres(p) => p.list_tables(exclude).await,
            ParserImpl::Sqlite(p) => p.list_tables(exclude).await,
            ParserImpl::Mssql(p) => p.list_tables(exclude).await,
        }
    }

    async fn parse_table(&self, name: &str) -> Result<Table> {
        match self {
            ParserImpl::Mysql(p) => p.parse_table(name).await,
            ParserImpl::Postgres(p) => p.parse_table(name).await,
            ParserImpl::Sqlite(p) => p.parse_table(name).await,
            ParserImpl::Mssql(p) => p.parse_table(name).await,
        }
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        match self {
            ParserImpl::Mysql(p) => p.table_exists(name).await,
            ParserImpl::Postgres(p) => p.table_exists(name).await,
            ParserImpl::Sqlite(p) => p.table_exists(name).await,
            ParserImpl::Mssql(p) => p.table_exists(name).await,
        }
    }

    async fn database_name(&self) -> Result<String> {
        match self {
            ParserImpl::Mysql(p) => p.database_name().await,
            ParserImpl::Postgres(p) => p.database_name().await,
            ParserImpl::Sqlite(p) => p.database_name().await,
            ParserImpl::Mssql(p) => p.database_name().await,
        }
    }

    fn driver(&self) -> DriverTag {
        match self {
            ParserImpl::Mysql(p) => p.driver(),
            ParserImpl::Postgres(p) => p.driver(),
            ParserImpl::Sqlite(p) => p.driver(),
            ParserImpl::Mssql(p) => p.driver(),
        }
    }
}

/// Parse a set of tables concurrently.
///
/// Each `parse_table` call is independent and read-only, so the calls run
/// concurrently up to the pool's connection ceiling; the result preserves the
/// input order so downstream ordering stays deterministic.
pub async fn parse_tables(parser: &ParserImpl, names: &[String]) -> Result<Vec<Table>> {
    futures::future::try_join_all(names.iter().map(|name| parser.parse_table(name))).await
}
