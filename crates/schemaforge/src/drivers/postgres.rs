//! PostgreSQL dialect parser.
//!
//! Columns come from information_schema; indexes and foreign keys need
//! pg_catalog joins because information_schema flattens expression indexes
//! and hides ordinal positions for composite constraints.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::drivers::common;
use crate::drivers::{DriverTag, SchemaParser};
use crate::error::{Result, SchemaError};
use crate::schema::{
    Column, ColumnType, ForeignKey, Index, IndexAlgorithm, IndexKind, Table,
};

const COLUMNS_SQL: &str = r#"
    SELECT
        column_name,
        udt_name,
        CAST(COALESCE(character_maximum_length, 0) AS INT) AS char_length,
        CAST(COALESCE(numeric_precision, 0) AS INT) AS num_precision,
        CAST(COALESCE(numeric_scale, -1) AS INT) AS num_scale,
        (is_nullable = 'YES') AS is_nullable,
        (is_identity = 'YES') AS is_identity,
        (is_generated = 'ALWAYS') AS is_generated,
        column_default,
        col_description(format('%I.%I', table_schema, table_name)::regclass::oid, ordinal_position) AS comment
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
"#;

const INDEXES_SQL: &str = r#"
    SELECT
        i.relname AS index_name,
        ix.indisunique AS is_unique,
        ix.indisprimary AS is_primary,
        am.amname AS algorithm,
        a.attname AS column_name,
        CAST(k.ordinality AS INT) AS ordinality
    FROM pg_catalog.pg_index ix
    JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
    JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_am am ON am.oid = i.relam
    JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ordinality) ON true
    JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
    WHERE n.nspname = $1 AND t.relname = $2
    ORDER BY i.relname, k.ordinality
"#;

const FOREIGN_KEYS_SQL: &str = r#"
    SELECT
        c.conname AS constraint_name,
        a.attname AS column_name,
        CAST(k.ordinality AS INT) AS ordinality,
        rt.relname AS referenced_table,
        ra.attname AS referenced_column,
        CAST(c.confdeltype AS TEXT) AS on_delete,
        CAST(c.confupdtype AS TEXT) AS on_update
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
    JOIN LATERAL unnest(c.conkey) WITH ORDINALITY AS k(attnum, ordinality) ON true
    JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
    JOIN LATERAL unnest(c.confkey) WITH ORDINALITY AS fk(attnum, ordinality)
      ON fk.ordinality = k.ordinality
    JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = fk.attnum
    WHERE c.contype = 'f' AND n.nspname = $1 AND t.relname = $2
    ORDER BY c.conname, k.ordinality
"#;

const TABLE_META_SQL: &str = r#"
    SELECT obj_description(c.oid) AS table_comment
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relname = $2
"#;

/// PostgreSQL schema parser, scoped to one schema namespace.
pub struct PostgresParser {
    pool: PgPool,
    schema: String,
}

impl PostgresParser {
    pub fn new(pool: PgPool, schema: String) -> Self {
        Self { pool, schema }
    }

    async fn fetch(&self, sql: &str, table: &str) -> Result<Vec<PgRow>> {
        sqlx::query(sql)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))
    }
}

#[async_trait]
impl SchemaParser for PostgresParser {
    async fn list_tables(&self, exclude: &[String]) -> Result<Vec<String>> {
        let sql = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;
        let rows = sqlx::query(sql)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("table_name")?;
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
            let comment: Option<String> = row.try_get("table_comment")?;
            table.comment = comment.filter(|c| !c.is_empty());
        }

        for row in self.fetch(COLUMNS_SQL, name).await? {
            table.columns.push(build_column(&ColumnRow {
                name: row.try_get("column_name")?,
                udt_name: row.try_get("udt_name")?,
                char_length: row.try_get("char_length")?,
                precision: row.try_get("num_precision")?,
                scale: row.try_get("num_scale")?,
                nullable: row.try_get("is_nullable")?,
                identity: row.try_get("is_identity")?,
                generated: row.try_get("is_generated")?,
                default: row.try_get("column_default")?,
                comment: row.try_get("comment")?,
            }));
        }

        let mut index_rows = Vec::new();
        for row in self.fetch(INDEXES_SQL, name).await? {
            index_rows.push(IndexRow {
                name: row.try_get("index_name")?,
                is_unique: row.try_get("is_unique")?,
                is_primary: row.try_get("is_primary")?,
                algorithm: row.try_get("algorithm")?,
                column: row.try_get("column_name")?,
                ordinal: row.try_get("ordinality")?,
            });
        }
        table.indexes = build_indexes(index_rows);

        let mut fk_rows = Vec::new();
        for row in self.fetch(FOREIGN_KEYS_SQL, name).await? {
            fk_rows.push(ForeignKeyRow {
                constraint: row.try_get("constraint_name")?,
                column: row.try_get("column_name")?,
                ordinal: row.try_get("ordinality")?,
                referenced_table: row.try_get("referenced_table")?,
                referenced_column: row.try_get("referenced_column")?,
                on_delete: row.try_get("on_delete")?,
                on_update: row.try_get("on_update")?,
            });
        }
        table.foreign_keys = build_foreign_keys(fk_rows);

        mark_primary_columns(&mut table);
        table.validate()?;
        debug!(table = name, columns = table.columns.len(), "parsed PostgreSQL table");
        Ok(table)
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let sql = r#"
            SELECT COUNT(*) AS total
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_name = $2
        "#;
        let row = sqlx::query(sql)
            .bind(&self.schema)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        Ok(row.try_get::<i64, _>("total")? > 0)
    }

    async fn database_name(&self) -> Result<String> {
        let sql = "SELECT current_database() AS db";
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        Ok(row.try_get("db")?)
    }

    fn driver(&self) -> DriverTag {
        DriverTag::Pgsql
    }
}

/// One information_schema.columns row.
pub(crate) struct ColumnRow {
    pub name: String,
    pub udt_name: String,
    pub char_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub nullable: bool,
    pub identity: bool,
    pub generated: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
}

/// One pg_index row (one per indexed column).
pub(crate) struct IndexRow {
    pub name: String,
    pub is_unique: bool,
    pub is_primary: bool,
    pub algorithm: String,
    pub column: String,
    pub ordinal: i32,
}

/// One pg_constraint row (one per constrained column).
pub(crate) struct ForeignKeyRow {
    pub constraint: String,
    pub column: String,
    pub ordinal: i32,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: String,
    pub on_update: String,
}

/// Map a PostgreSQL udt token to the canonical vocabulary.
///
/// `interval` maps to the canonical string type, losing range semantics;
/// callers get a warning the first time a column hits that path.
pub(crate) fn normalize_type(udt: &str) -> ColumnType {
    match udt.to_ascii_lowercase().as_str() {
        "int2" | "smallserial" => ColumnType::SmallInteger,
        "int4" | "serial" => ColumnType::Integer,
        "int8" | "bigserial" => ColumnType::BigInteger,
        "float4" => ColumnType::Float,
        "float8" => ColumnType::Double,
        "numeric" | "money" => ColumnType::Decimal,
        "bpchar" => ColumnType::Char,
        "varchar" => ColumnType::String,
        "text" | "citext" | "xml" => ColumnType::Text,
        "bytea" => ColumnType::Blob,
        "date" => ColumnType::Date,
        "time" | "timetz" => ColumnType::Time,
        "timestamp" => ColumnType::Timestamp,
        "timestamptz" => ColumnType::TimestampTz,
        "json" => ColumnType::Json,
        "jsonb" => ColumnType::Jsonb,
        "bool" => ColumnType::Boolean,
        "uuid" => ColumnType::Uuid,
        "point" => ColumnType::Point,
        "path" | "line" | "lseg" => ColumnType::LineString,
        "polygon" | "box" | "circle" => ColumnType::Polygon,
        "geometry" => ColumnType::Geometry,
        "interval" => {
            warn!("PostgreSQL interval maps to string; range semantics are lost");
            ColumnType::String
        }
        "inet" | "cidr" | "macaddr" | "macaddr8" => ColumnType::String,
        other => {
            debug!(token = other, "unknown PostgreSQL type, treating as string");
            ColumnType::String
        }
    }
}

pub(crate) fn build_column(row: &ColumnRow) -> Column {
    let column_type = normalize_type(&row.udt_name);
    let mut column = Column::new(&row.name, column_type.clone(), &row.udt_name);

    column.nullable = row.nullable;
    // serial columns surface as int + nextval default; identity columns as
    // is_identity = YES
    let nextval_default = row
        .default
        .as_deref()
        .map(|d| d.starts_with("nextval("))
        .unwrap_or(false);
    column.auto_increment =
        column_type.is_integer() && (row.identity || nextval_default || is_serial(&row.udt_name));

    match column_type {
        ColumnType::Char | ColumnType::String => {
            if row.char_length > 0 {
                column.length = Some(row.char_length as u32);
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
            .and_then(|raw| common::parse_default(raw, DriverTag::Pgsql));
    }
    column.attributes.computed = row.generated;

    column
}

fn is_serial(udt: &str) -> bool {
    matches!(udt, "serial" | "bigserial" | "smallserial")
}

pub(crate) fn build_indexes(rows: Vec<IndexRow>) -> Vec<Index> {
    let grouped = common::group_by_constraint(
        rows.into_iter()
            .map(|r| {
                (
                    r.name.clone(),
                    r.ordinal,
                    (r.column, r.is_unique, r.is_primary, r.algorithm),
                )
            })
            .collect(),
    );

    grouped
        .into_iter()
        .map(|(name, members)| {
            let (_, is_unique, is_primary, algorithm) = members[0].clone();
            let kind = if is_primary {
                IndexKind::Primary
            } else if is_unique {
                IndexKind::Unique
            } else if algorithm == "gist" || algorithm == "spgist" {
                IndexKind::Spatial
            } else if algorithm == "gin" {
                IndexKind::Fulltext
            } else {
                IndexKind::Index
            };
            let algorithm = match algorithm.as_str() {
                "btree" => Some(IndexAlgorithm::BTree),
                "hash" => Some(IndexAlgorithm::Hash),
                _ => None,
            };
            Index {
                name,
                kind,
                columns: members.into_iter().map(|m| m.0).collect(),
                algorithm,
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
pub(crate) fn mark_primary_columns(table: &mut Table) {
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
