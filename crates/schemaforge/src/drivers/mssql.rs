//! SQL Server dialect parser.
//!
//! Uses Tiberius with bb8 connection pooling. Catalog reads go through the
//! sys.* views; numeric catalog columns are CAST to INT so row decoding does
//! not depend on tinyint/smallint storage classes.

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::drivers::common;
use crate::drivers::{DriverTag, SchemaParser};
use crate::error::{Result, SchemaError};
use crate::schema::{Column, ColumnType, ForeignKey, Index, IndexKind, Table};

/// Connection manager for bb8 pooling of Tiberius clients.
#[derive(Clone)]
pub struct MssqlConnectionManager {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
    encrypt: bool,
    trust_server_cert: bool,
}

impl MssqlConnectionManager {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            encrypt: false,
            trust_server_cert: true,
        }
    }

    pub fn with_encryption(mut self, encrypt: bool, trust_server_cert: bool) -> Self {
        self.encrypt = encrypt;
        self.trust_server_cert = trust_server_cert;
        self
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        if self.encrypt {
            if self.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }
        config
    }
}

#[async_trait]
impl bb8::ManageConnection for MssqlConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();
        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

const COLUMNS_SQL: &str = r#"
    SELECT
        c.name AS column_name,
        ty.name AS type_name,
        CAST(c.max_length AS INT) AS max_length,
        CAST(c.precision AS INT) AS num_precision,
        CAST(c.scale AS INT) AS num_scale,
        c.is_nullable,
        c.is_identity,
        c.is_computed,
        OBJECT_DEFINITION(c.default_object_id) AS default_definition,
        CAST(ep.value AS NVARCHAR(2048)) AS comment
    FROM sys.columns c
    JOIN sys.types ty ON ty.user_type_id = c.user_type_id
    LEFT JOIN sys.extended_properties ep
        ON ep.major_id = c.object_id AND ep.minor_id = c.column_id AND ep.name = 'MS_Description'
    WHERE c.object_id = OBJECT_ID(@P1)
    ORDER BY c.column_id
"#;

const INDEXES_SQL: &str = r#"
    SELECT
        i.name AS index_name,
        i.is_unique,
        i.is_primary_key,
        i.type_desc,
        CAST(ic.key_ordinal AS INT) AS key_ordinal,
        c.name AS column_name
    FROM sys.indexes i
    JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
    JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
    WHERE i.object_id = OBJECT_ID(@P1) AND i.type > 0 AND ic.is_included_column = 0
    ORDER BY i.name, ic.key_ordinal
"#;

const FOREIGN_KEYS_SQL: &str = r#"
    SELECT
        fk.name AS constraint_name,
        pc.name AS column_name,
        CAST(fkc.constraint_column_id AS INT) AS ordinal,
        rt.name AS referenced_table,
        rc.name AS referenced_column,
        fk.delete_referential_action_desc AS on_delete,
        fk.update_referential_action_desc AS on_update
    FROM sys.foreign_keys fk
    JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
    JOIN sys.columns pc
        ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
    JOIN sys.objects rt ON rt.object_id = fkc.referenced_object_id
    JOIN sys.columns rc
        ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
    WHERE fk.parent_object_id = OBJECT_ID(@P1)
    ORDER BY fk.name, fkc.constraint_column_id
"#;

const TABLE_META_SQL: &str = r#"
    SELECT CAST(ep.value AS NVARCHAR(2048)) AS table_comment
    FROM sys.extended_properties ep
    WHERE ep.major_id = OBJECT_ID(@P1) AND ep.minor_id = 0 AND ep.name = 'MS_Description'
"#;

/// SQL Server schema parser, scoped to one schema namespace.
pub struct MssqlParser {
    pool: Pool<MssqlConnectionManager>,
    schema: String,
}

impl MssqlParser {
    pub fn new(pool: Pool<MssqlConnectionManager>, schema: String) -> Self {
        Self { pool, schema }
    }

    async fn get_client(&self) -> Result<PooledConnection<'_, MssqlConnectionManager>> {
        self.pool.get().await.map_err(|e| {
            SchemaError::ConnectionMissing(format!("failed to acquire SQL Server connection: {}", e))
        })
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    async fn fetch(&self, sql: &'static str, table: &str) -> Result<Vec<tiberius::Row>> {
        let mut client = self.get_client().await?;
        let qualified = self.qualified(table);
        let mut query = Query::new(sql);
        query.bind(qualified);
        let stream = query
            .query(&mut client)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| SchemaError::query(sql, e))
    }
}

#[async_trait]
impl SchemaParser for MssqlParser {
    async fn list_tables(&self, exclude: &[String]) -> Result<Vec<String>> {
        let sql = r#"
            SELECT t.name AS table_name
            FROM sys.tables t
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE s.name = @P1
            ORDER BY t.name
        "#;
        let mut client = self.get_client().await?;
        let mut query = Query::new(sql);
        query.bind(self.schema.clone());
        let stream = query
            .query(&mut client)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| SchemaError::query(sql, e))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get::<&str, _>("table_name").unwrap_or_default().to_string();
            if !exclude.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn parse_table(&self, name: &str) -> Result<Table> {
        if !self.table_exists(name).await? {
            return Err(SchemaError::TableNotFound(name.to_string()));
        }

        let mut table = Table::new(name);
        table
            .attributes
            .insert("schema".to_string(), self.schema.clone());

        for row in self.fetch(TABLE_META_SQL, name).await? {
            table.comment = row
                .get::<&str, _>("table_comment")
                .map(str::to_string)
                .filter(|c| !c.is_empty());
        }

        for row in self.fetch(COLUMNS_SQL, name).await? {
            table.columns.push(build_column(&ColumnRow {
                name: row.get::<&str, _>("column_name").unwrap_or_default().to_string(),
                type_name: row.get::<&str, _>("type_name").unwrap_or_default().to_string(),
                max_length: row.get::<i32, _>("max_length").unwrap_or_default(),
                precision: row.get::<i32, _>("num_precision").unwrap_or_default(),
                scale: row.get::<i32, _>("num_scale").unwrap_or_default(),
                nullable: row.get::<bool, _>("is_nullable").unwrap_or(true),
                identity: row.get::<bool, _>("is_identity").unwrap_or(false),
                computed: row.get::<bool, _>("is_computed").unwrap_or(false),
                default: row.get::<&str, _>("default_definition").map(str::to_string),
                comment: row.get::<&str, _>("comment").map(str::to_string),
            }));
        }

        let mut index_rows = Vec::new();
        for row in self.fetch(INDEXES_SQL, name).await? {
            index_rows.push(IndexRow {
                name: row.get::<&str, _>("index_name").unwrap_or_default().to_string(),
                is_unique: row.get::<bool, _>("is_unique").unwrap_or(false),
                is_primary: row.get::<bool, _>("is_primary_key").unwrap_or(false),
                type_desc: row.get::<&str, _>("type_desc").unwrap_or_default().to_string(),
                ordinal: row.get::<i32, _>("key_ordinal").unwrap_or_default(),
                column: row.get::<&str, _>("column_name").unwrap_or_default().to_string(),
            });
        }
        table.indexes = build_indexes(index_rows);

        let mut fk_rows = Vec::new();
        for row in self.fetch(FOREIGN_KEYS_SQL, name).await? {
            fk_rows.push(ForeignKeyRow {
                constraint: row.get::<&str, _>("constraint_name").unwrap_or_default().to_string(),
                column: row.get::<&str, _>("column_name").unwrap_or_default().to_string(),
                ordinal: row.get::<i32, _>("ordinal").unwrap_or_default(),
                referenced_table: row.get::<&str, _>("referenced_table").unwrap_or_default().to_string(),
                referenced_column: row.get::<&str, _>("referenced_column").unwrap_or_default().to_string(),
                on_delete: row.get::<&str, _>("on_delete").unwrap_or_default().to_string(),
                on_update: row.get::<&str, _>("on_update").unwrap_or_default().to_string(),
            });
        }
        table.foreign_keys = build_foreign_keys(fk_rows);

        mark_primary_columns(&mut table);
        table.validate()?;
        debug!(table = name, columns = table.columns.len(), "parsed SQL Server table");
        Ok(table)
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let sql = r#"
            SELECT COUNT(*) AS total
            FROM sys.tables t
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE s.name = @P1 AND t.name = @P2
        "#;
        let mut client = self.get_client().await?;
        let mut query = Query::new(sql);
        query.bind(self.schema.clone());
        query.bind(name.to_string());
        let stream = query
            .query(&mut client)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        let row = stream
            .into_row()
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        Ok(row.and_then(|r| r.get::<i32, _>("total")).unwrap_or(0) > 0)
    }

    async fn database_name(&self) -> Result<String> {
        let sql = "SELECT DB_NAME() AS db";
        let mut client = self.get_client().await?;
        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        let row = stream
            .into_row()
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        Ok(row
            .and_then(|r| r.get::<&str, _>("db").map(str::to_string))
            .unwrap_or_default())
    }

    fn driver(&self) -> DriverTag {
        DriverTag::Sqlsrv
    }
}

/// One sys.columns row.
pub(crate) struct ColumnRow {
    pub name: String,
    pub type_name: String,
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub nullable: bool,
    pub identity: bool,
    pub computed: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
}

/// One sys.indexes row (one per key column).
pub(crate) struct IndexRow {
    pub name: String,
    pub is_unique: bool,
    pub is_primary: bool,
    pub type_desc: String,
    pub ordinal: i32,
    pub column: String,
}

/// One sys.foreign_keys row (one per constrained column).
pub(crate) struct ForeignKeyRow {
    pub constraint: String,
    pub column: String,
    pub ordinal: i32,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: String,
    pub on_update: String,
}

/// Map a SQL Server type token to the canonical vocabulary. `max_length`
/// disambiguates varchar(max) from bounded varchars.
pub(crate) fn normalize_type(type_name: &str, max_length: i32) -> ColumnType {
    match type_name.to_ascii_lowercase().as_str() {
        "tinyint" => ColumnType::TinyInteger,
        "smallint" => ColumnType::SmallInteger,
        "int" => ColumnType::Integer,
        "bigint" => ColumnType::BigInteger,
        "bit" => ColumnType::Boolean,
        "decimal" | "numeric" | "money" | "smallmoney" => ColumnType::Decimal,
        "float" => ColumnType::Double,
        "real" => ColumnType::Float,
        "char" | "nchar" => ColumnType::Char,
        "varchar" | "nvarchar" if max_length == -1 => ColumnType::Text,
        "varchar" | "nvarchar" => ColumnType::String,
        "text" | "ntext" | "xml" => ColumnType::Text,
        "binary" => ColumnType::Binary,
        "varbinary" | "image" => ColumnType::Blob,
        "date" => ColumnType::Date,
        "time" => ColumnType::Time,
        "datetime" | "datetime2" | "smalldatetime" => ColumnType::DateTime,
        "datetimeoffset" => ColumnType::TimestampTz,
        "uniqueidentifier" => ColumnType::Uuid,
        "geometry" | "geography" => ColumnType::Geometry,
        other => {
            debug!(token = other, "unknown SQL Server type, treating as string");
            ColumnType::String
        }
    }
}

pub(crate) fn build_column(row: &ColumnRow) -> Column {
    let column_type = normalize_type(&row.type_name, row.max_length);
    let mut column = Column::new(&row.name, column_type.clone(), &row.type_name);

    column.nullable = row.nullable;
    column.auto_increment = row.identity;

    match column_type {
        ColumnType::Char | ColumnType::String | ColumnType::Binary => {
            if row.max_length > 0 {
                // n-prefixed types store two bytes per character
                let divisor = if row.type_name.starts_with(['n', 'N']) { 2 } else { 1 };
                column.length = Some((row.max_length / divisor) as u32);
            }
        }
        ColumnType::Decimal => {
            if row.precision > 0 {
                column.precision = Some(row.precision as u32);
            }
            if row.scale >= 0 {
                column.scale = Some(row.scale as u32);
            }
        }
        _ => {}
    }

    column.comment = row.comment.clone().filter(|c| !c.is_empty());
    if !column.auto_increment {
        column.default = row
            .default
            .as_deref()
            .and_then(|raw| common::parse_default(raw, DriverTag::Sqlsrv));
    }
    column.attributes.computed = row.computed;

    column
}

pub(crate) fn build_indexes(rows: Vec<IndexRow>) -> Vec<Index> {
    let grouped = common::group_by_constraint(
        rows.into_iter()
            .map(|r| {
                (
                    r.name.clone(),
                    r.ordinal,
                    (r.column, r.is_unique, r.is_primary, r.type_desc),
                )
            })
            .collect(),
    );

    grouped
        .into_iter()
        .map(|(name, members)| {
            let (_, is_unique, is_primary, type_desc) = members[0].clone();
            let kind = if is_primary {
                IndexKind::Primary
            } else if type_desc == "SPATIAL" {
                IndexKind::Spatial
            } else if is_unique {
                IndexKind::Unique
            } else {
                IndexKind::Index
            };
            Index {
                name,
                kind,
                columns: members.into_iter().map(|m| m.0).collect(),
                algorithm: None,
            }
        })
        .collect()
}

pub(crate) fn build_foreign_keys(rows: Vec<ForeignKeyRow>) -> Vec<ForeignKey> {
    let grouped = common::group_by_constraint(
        rows.into_iter()
            .map(|r| {
                (
                    r.constraint.clone(),
                    r.ordinal,
                    (
                        r.column,
                        r.referenced_table,
                        r.referenced_column,
                        r.on_delete,
                        r.on_update,
                    ),
                )
            })
            .collect(),
    );

    grouped
        .into_iter()
        .map(|(name, members)| {
            let (_, referenced_table, _, on_delete, on_update) = members[0].clone();
            ForeignKey {
                name,
                columns: members.iter().map(|m| m.0.clone()).collect(),
                referenced_table,
                referenced_columns: members.iter().map(|m| m.2.clone()).collect(),
                on_delete: common::fk_action(&on_delete),
                on_update: common::fk_action(&on_update),
            }
        })
        .collect()
}

/// Set the primary attribute on columns covered by the primary index.
fn mark_primary_columns(table: &mut Table) {
    let primary_columns: Vec<String> = table
        .primary_key()
        .map(|index| index.columns.clone())
        .unwrap_or_default();
    for column in &mut table.columns {
        if primary_columns.contains(&column.name) {
            column.attributes.primary = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue, FkAction};

    fn make_test_row(name: &str, type_name: &str) -> ColumnRow {
        ColumnRow {
            name: name.to_string(),
            type_name: type_name.to_string(),
            max_length: 0,
            precision: 0,
            scale: -1,
            nullable: false,
            identity: false,
            computed: false,
            default: None,
            comment: None,
        }
    }

    #[test]
    fn test_normalize_types() {
        assert_eq!(normalize_type("bit", 1), ColumnType::Boolean);
        assert_eq!(normalize_type("uniqueidentifier", 16), ColumnType::Uuid);
        assert_eq!(normalize_type("datetimeoffset", 10), ColumnType::TimestampTz);
        assert_eq!(normalize_type("nvarchar", 510), ColumnType::String);
        assert_eq!(normalize_type("nvarchar", -1), ColumnType::Text);
        assert_eq!(normalize_type("float", 8), ColumnType::Double);
        assert_eq!(normalize_type("real", 4), ColumnType::Float);
        assert_eq!(normalize_type("sql_variant", 0), ColumnType::String);
    }

    #[test]
    fn test_build_column_identity() {
        let mut row = make_test_row("id", "bigint");
        row.identity = true;
        let column = build_column(&row);
        assert!(column.auto_increment);
        assert_eq!(column.column_type, ColumnType::BigInteger);
    }

    #[test]
    fn test_build_column_nvarchar_length_halved() {
        let mut row = make_test_row("title", "nvarchar");
        row.max_length = 510;
        let column = build_column(&row);
        assert_eq!(column.length, Some(255));

        let mut row = make_test_row("code", "varchar");
        row.max_length = 32;
        assert_eq!(build_column(&row).length, Some(32));
    }

    #[test]
    fn test_build_column_default_unwrapped() {
        let mut row = make_test_row("active", "bit");
        row.default = Some("((1))".to_string());
        let column = build_column(&row);
        assert_eq!(column.default, Some(DefaultValue::Int(1)));

        let mut row = make_test_row("created_at", "datetime2");
        row.default = Some("(getdate())".to_string());
        assert_eq!(
            build_column(&row).default,
            Some(DefaultValue::Expression("getdate()".into()))
        );
    }

    #[test]
    fn test_build_indexes_kinds() {
        let rows = vec![
            IndexRow {
                name: "PK_users".into(),
                is_unique: true,
                is_primary: true,
                type_desc: "CLUSTERED".into(),
                ordinal: 1,
                column: "id".into(),
            },
            IndexRow {
                name: "IX_users_email".into(),
                is_unique: true,
                is_primary: false,
                type_desc: "NONCLUSTERED".into(),
                ordinal: 1,
                column: "email".into(),
            },
        ];
        let indexes = build_indexes(rows);
        assert_eq!(indexes[0].kind, IndexKind::Primary);
        assert_eq!(indexes[1].kind, IndexKind::Unique);
    }

    #[test]
    fn test_build_foreign_keys_descriptive_actions() {
        let rows = vec![ForeignKeyRow {
            constraint: "FK_posts_users".into(),
            column: "user_id".into(),
            ordinal: 1,
            referenced_table: "users".into(),
            referenced_column: "id".into(),
            on_delete: "SET_NULL".into(),
            on_update: "NO_ACTION".into(),
        }];
        let fks = build_foreign_keys(rows);
        assert_eq!(fks[0].on_delete, FkAction::SetNull);
        assert_eq!(fks[0].on_update, FkAction::NoAction);
    }
}
