//! MySQL/MariaDB dialect parser.
//!
//! Reads INFORMATION_SCHEMA through an SQLx pool. String columns are CAST to
//! CHAR and numerics to SIGNED so row decoding stays uniform across MySQL and
//! MariaDB collations.

use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tracing::debug;

use crate::drivers::common;
use crate::drivers::{DriverTag, SchemaParser};
use crate::error::{Result, SchemaError};
use crate::schema::{
    Column, ColumnType, ForeignKey, Index, IndexAlgorithm, IndexKind, Table,
};

const COLUMNS_SQL: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR(255)) AS column_name,
        CAST(COLUMN_TYPE AS CHAR(1024)) AS column_type,
        CAST(DATA_TYPE AS CHAR(64)) AS data_type,
        IF(IS_NULLABLE = 'YES', 1, 0) AS is_nullable,
        CAST(COLUMN_DEFAULT AS CHAR(1024)) AS column_default,
        CAST(EXTRA AS CHAR(255)) AS extra,
        CAST(COALESCE(CHARACTER_MAXIMUM_LENGTH, 0) AS SIGNED) AS char_length,
        CAST(COALESCE(NUMERIC_PRECISION, 0) AS SIGNED) AS num_precision,
        CAST(COALESCE(NUMERIC_SCALE, -1) AS SIGNED) AS num_scale,
        CAST(CHARACTER_SET_NAME AS CHAR(64)) AS charset,
        CAST(COLLATION_NAME AS CHAR(64)) AS collation,
        CAST(COLUMN_COMMENT AS CHAR(2048)) AS column_comment,
        CAST(COLUMN_KEY AS CHAR(8)) AS column_key
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const INDEXES_SQL: &str = r#"
    SELECT
        CAST(INDEX_NAME AS CHAR(255)) AS index_name,
        IF(NON_UNIQUE = 1, 1, 0) AS non_unique,
        CAST(SEQ_IN_INDEX AS SIGNED) AS seq_in_index,
        CAST(COLUMN_NAME AS CHAR(255)) AS column_name,
        CAST(INDEX_TYPE AS CHAR(32)) AS index_type
    FROM INFORMATION_SCHEMA.STATISTICS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY INDEX_NAME, SEQ_IN_INDEX
"#;

const FOREIGN_KEYS_SQL: &str = r#"
    SELECT
        CAST(kcu.CONSTRAINT_NAME AS CHAR(255)) AS constraint_name,
        CAST(kcu.COLUMN_NAME AS CHAR(255)) AS column_name,
        CAST(kcu.ORDINAL_POSITION AS SIGNED) AS ordinal_position,
        CAST(kcu.REFERENCED_TABLE_NAME AS CHAR(255)) AS referenced_table,
        CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR(255)) AS referenced_column,
        CAST(rc.DELETE_RULE AS CHAR(32)) AS delete_rule,
        CAST(rc.UPDATE_RULE AS CHAR(32)) AS update_rule
    FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
    JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc
      ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
     AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
    WHERE kcu.TABLE_SCHEMA = DATABASE()
      AND kcu.TABLE_NAME = ?
      AND kcu.REFERENCED_TABLE_NAME IS NOT NULL
    ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
"#;

const TABLE_META_SQL: &str = r#"
    SELECT
        CAST(ENGINE AS CHAR(64)) AS engine,
        CAST(TABLE_COLLATION AS CHAR(64)) AS collation,
        CAST(SUBSTRING_INDEX(TABLE_COLLATION, '_', 1) AS CHAR(64)) AS charset,
        CAST(TABLE_COMMENT AS CHAR(2048)) AS table_comment
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
"#;

/// MySQL/MariaDB schema parser.
pub struct MysqlParser {
    pool: MySqlPool,
}

impl MysqlParser {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, sql: &str, table: &str) -> Result<Vec<MySqlRow>> {
        sqlx::query(sql)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))
    }
}

#[async_trait]
impl SchemaParser for MysqlParser {
    async fn list_tables(&self, exclude: &[String]) -> Result<Vec<String>> {
        let sql = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS table_name
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;
        let rows = sqlx::query(sql)
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

        for row in self.fetch(TABLE_META_SQL, name).await? {
            table.engine = row.try_get::<Option<String>, _>("engine")?;
            table.collation = row.try_get::<Option<String>, _>("collation")?;
            table.charset = row.try_get::<Option<String>, _>("charset")?;
            let comment: Option<String> = row.try_get("table_comment")?;
            table.comment = comment.filter(|c| !c.is_empty());
        }

        let column_rows = self.fetch(COLUMNS_SQL, name).await?;
        for row in column_rows {
            table.columns.push(build_column(&ColumnRow {
                name: row.try_get("column_name")?,
                column_type: row.try_get("column_type")?,
                data_type: row.try_get("data_type")?,
                nullable: row.try_get::<i64, _>("is_nullable")? == 1,
                default: row.try_get("column_default")?,
                extra: row.try_get("extra")?,
                char_length: row.try_get("char_length")?,
                precision: row.try_get("num_precision")?,
                scale: row.try_get("num_scale")?,
                charset: row.try_get("charset")?,
                collation: row.try_get("collation")?,
                comment: row.try_get("column_comment")?,
                column_key: row.try_get("column_key")?,
            }));
        }

        let mut index_rows = Vec::new();
        for row in self.fetch(INDEXES_SQL, name).await? {
            index_rows.push(IndexRow {
                name: row.try_get("index_name")?,
                non_unique: row.try_get::<i64, _>("non_unique")? == 1,
                seq: row.try_get::<i64, _>("seq_in_index")? as i32,
                column: row.try_get("column_name")?,
                index_type: row.try_get("index_type")?,
            });
        }
        table.indexes = build_indexes(index_rows);

        let mut fk_rows = Vec::new();
        for row in self.fetch(FOREIGN_KEYS_SQL, name).await? {
            fk_rows.push(ForeignKeyRow {
                constraint: row.try_get("constraint_name")?,
                column: row.try_get("column_name")?,
                ordinal: row.try_get::<i64, _>("ordinal_position")? as i32,
                referenced_table: row.try_get("referenced_table")?,
                referenced_column: row.try_get("referenced_column")?,
                on_delete: row.try_get("delete_rule")?,
                on_update: row.try_get("update_rule")?,
            });
        }
        table.foreign_keys = build_foreign_keys(fk_rows);

        table.validate()?;
        debug!(table = name, columns = table.columns.len(), "parsed MySQL table");
        Ok(table)
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let sql = r#"
            SELECT COUNT(*) AS total
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        "#;
        let row = sqlx::query(sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        Ok(row.try_get::<i64, _>("total")? > 0)
    }

    async fn database_name(&self) -> Result<String> {
        let sql = "SELECT DATABASE() AS db";
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        let name: Option<String> = row.try_get("db")?;
        name.ok_or_else(|| {
            SchemaError::ConnectionMissing("no database selected on the connection".to_string())
        })
    }

    fn driver(&self) -> DriverTag {
        DriverTag::Mysql
    }
}

/// One INFORMATION_SCHEMA.COLUMNS row.
pub(crate) struct ColumnRow {
    pub name: String,
    pub column_type: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub extra: String,
    pub char_length: i64,
    pub precision: i64,
    pub scale: i64,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: String,
    pub column_key: String,
}

/// One INFORMATION_SCHEMA.STATISTICS row.
pub(crate) struct IndexRow {
    pub name: String,
    pub non_unique: bool,
    pub seq: i32,
    pub column: String,
    pub index_type: String,
}

/// One KEY_COLUMN_USAGE + REFERENTIAL_CONSTRAINTS row.
pub(crate) struct ForeignKeyRow {
    pub constraint: String,
    pub column: String,
    pub ordinal: i32,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: String,
    pub on_update: String,
}

/// Map a MySQL data type token to the canonical vocabulary. The full native
/// token disambiguates tinyint(1) booleans.
pub(crate) fn normalize_type(data_type: &str, native: &str) -> ColumnType {
    let native_lower = native.to_ascii_lowercase();
    match data_type.to_ascii_lowercase().as_str() {
        "tinyint" if native_lower.starts_with("tinyint(1)") => ColumnType::Boolean,
        "tinyint" => ColumnType::TinyInteger,
        "smallint" => ColumnType::SmallInteger,
        "mediumint" => ColumnType::MediumInteger,
        "int" | "integer" => ColumnType::Integer,
        "bigint" => ColumnType::BigInteger,
        "float" => ColumnType::Float,
        "double" | "real" => ColumnType::Double,
        "decimal" | "numeric" => ColumnType::Decimal,
        "bit" => ColumnType::Boolean,
        "char" => ColumnType::Char,
        "varchar" => ColumnType::String,
        "tinytext" => ColumnType::TinyText,
        "text" => ColumnType::Text,
        "mediumtext" => ColumnType::MediumText,
        "longtext" => ColumnType::LongText,
        "binary" | "varbinary" => ColumnType::Binary,
        "tinyblob" | "blob" | "mediumblob" | "longblob" => ColumnType::Blob,
        "date" => ColumnType::Date,
        "time" => ColumnType::Time,
        "datetime" => ColumnType::DateTime,
        "timestamp" => ColumnType::Timestamp,
        "year" => ColumnType::Year,
        "json" => ColumnType::Json,
        "enum" => ColumnType::Enum,
        "set" => ColumnType::Set,
        "point" => ColumnType::Point,
        "linestring" => ColumnType::LineString,
        "polygon" => ColumnType::Polygon,
        "multipoint" => ColumnType::MultiPoint,
        "multilinestring" => ColumnType::MultiLineString,
        "multipolygon" => ColumnType::MultiPolygon,
        "geometry" => ColumnType::Geometry,
        "geomcollection" | "geometrycollection" => ColumnType::GeometryCollection,
        other => {
            debug!(token = other, "unknown MySQL type, treating as string");
            ColumnType::String
        }
    }
}

pub(crate) fn build_column(row: &ColumnRow) -> Column {
    let column_type = normalize_type(&row.data_type, &row.column_type);
    let mut column = Column::new(&row.name, column_type.clone(), &row.column_type);

    column.nullable = row.nullable;
    column.unsigned = common::is_unsigned(&row.column_type);
    column.auto_increment = row.extra.to_ascii_lowercase().contains("auto_increment");

    match column_type {
        ColumnType::Char | ColumnType::String | ColumnType::Binary => {
            if row.char_length > 0 {
                column.length = Some(row.char_length as u32);
            }
        }
        ColumnType::Decimal | ColumnType::Float | ColumnType::Double => {
            if row.precision > 0 {
                column.precision = Some(row.precision as u32);
            }
            if row.scale >= 0 {
                column.scale = Some(row.scale as u32);
            }
        }
        ColumnType::Enum | ColumnType::Set => {
            column.attributes.enum_values = Some(common::enum_values(&row.column_type));
        }
        _ => {}
    }

    column.charset = row.charset.clone();
    column.collation = row.collation.clone();
    column.comment = Some(row.comment.clone()).filter(|c| !c.is_empty());
    column.default = row
        .default
        .as_deref()
        .and_then(|raw| common::parse_default(raw, DriverTag::Mysql));

    column.attributes.primary = row.column_key == "PRI";
    column.attributes.computed = row.extra.to_ascii_uppercase().contains("GENERATED")
        && !row.extra.to_ascii_uppercase().contains("DEFAULT_GENERATED");

    column
}

pub(crate) fn build_indexes(rows: Vec<IndexRow>) -> Vec<Index> {
    let grouped = common::group_by_constraint(
        rows.into_iter()
            .map(|r| (r.name.clone(), r.seq, (r.column, r.non_unique, r.index_type)))
            .collect(),
    );

    grouped
        .into_iter()
        .map(|(name, members)| {
            let (_, non_unique, index_type) = &members[0];
            let kind = if name == "PRIMARY" {
                IndexKind::Primary
            } else if index_type == "FULLTEXT" {
                IndexKind::Fulltext
            } else if index_type == "SPATIAL" {
                IndexKind::Spatial
            } else if !non_unique {
                IndexKind::Unique
            } else {
                IndexKind::Index
            };
            let algorithm = match index_type.as_str() {
                "BTREE" => Some(IndexAlgorithm::BTree),
                "HASH" => Some(IndexAlgorithm::Hash),
                _ => None,
            };
            Index {
                name,
                kind,
                columns: members.iter().map(|(c, _, _)| c.clone()).collect(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue, FkAction};

    fn make_test_row(name: &str, data_type: &str, native: &str) -> ColumnRow {
        ColumnRow {
            name: name.to_string(),
            column_type: native.to_string(),
            data_type: data_type.to_string(),
            nullable: false,
            default: None,
            extra: String::new(),
            char_length: 0,
            precision: 0,
            scale: -1,
            charset: None,
            collation: None,
            comment: String::new(),
            column_key: String::new(),
        }
    }

    #[test]
    fn test_normalize_integers() {
        assert_eq!(normalize_type("bigint", "bigint unsigned"), ColumnType::BigInteger);
        assert_eq!(normalize_type("mediumint", "mediumint(9)"), ColumnType::MediumInteger);
        assert_eq!(normalize_type("tinyint", "tinyint(4)"), ColumnType::TinyInteger);
        assert_eq!(normalize_type("tinyint", "tinyint(1)"), ColumnType::Boolean);
    }

    #[test]
    fn test_normalize_unknown_falls_back_to_string() {
        assert_eq!(normalize_type("inet6", "inet6"), ColumnType::String);
    }

    #[test]
    fn test_build_column_auto_increment_and_unsigned() {
        let mut row = make_test_row("id", "bigint", "bigint(20) unsigned");
        row.extra = "auto_increment".to_string();
        row.column_key = "PRI".to_string();
        let column = build_column(&row);
        assert!(column.auto_increment);
        assert!(column.unsigned);
        assert!(column.attributes.primary);
        assert_eq!(column.column_type, ColumnType::BigInteger);
    }

    #[test]
    fn test_build_column_enum() {
        let row = make_test_row("status", "enum", "enum('draft','published')");
        let column = build_column(&row);
        assert_eq!(column.column_type, ColumnType::Enum);
        assert_eq!(
            column.attributes.enum_values.as_deref(),
            Some(&["draft".to_string(), "published".into()][..])
        );
    }

    #[test]
    fn test_build_column_decimal_precision_scale() {
        let mut row = make_test_row("price", "decimal", "decimal(8,2)");
        row.precision = 8;
        row.scale = 2;
        let column = build_column(&row);
        assert_eq!(column.precision, Some(8));
        assert_eq!(column.scale, Some(2));
    }

    #[test]
    fn test_build_column_default_expression() {
        let mut row = make_test_row("created_at", "timestamp", "timestamp");
        row.default = Some("CURRENT_TIMESTAMP".to_string());
        let column = build_column(&row);
        assert_eq!(
            column.default,
            Some(DefaultValue::Expression("CURRENT_TIMESTAMP".into()))
        );
    }

    #[test]
    fn test_build_column_generated_is_computed() {
        let mut row = make_test_row("slug_hash", "varchar", "varchar(64)");
        row.extra = "STORED GENERATED".to_string();
        row.char_length = 64;
        let column = build_column(&row);
        assert!(column.attributes.computed);
        assert_eq!(column.length, Some(64));

        let mut row = make_test_row("created_at", "timestamp", "timestamp");
        row.extra = "DEFAULT_GENERATED".to_string();
        assert!(!build_column(&row).attributes.computed);
    }

    #[test]
    fn test_build_indexes_kinds_and_grouping() {
        let rows = vec![
            IndexRow {
                name: "PRIMARY".into(),
                non_unique: false,
                seq: 1,
                column: "id".into(),
                index_type: "BTREE".into(),
            },
            IndexRow {
                name: "users_email_unique".into(),
                non_unique: false,
                seq: 1,
                column: "email".into(),
                index_type: "BTREE".into(),
            },
            IndexRow {
                name: "users_name_idx".into(),
                non_unique: true,
                seq: 2,
                column: "last_name".into(),
                index_type: "BTREE".into(),
            },
            IndexRow {
                name: "users_name_idx".into(),
                non_unique: true,
                seq: 1,
                column: "first_name".into(),
                index_type: "BTREE".into(),
            },
            IndexRow {
                name: "users_bio_ft".into(),
                non_unique: true,
                seq: 1,
                column: "bio".into(),
                index_type: "FULLTEXT".into(),
            },
        ];
        let indexes = build_indexes(rows);
        assert_eq!(indexes.len(), 4);
        assert_eq!(indexes[0].kind, IndexKind::Primary);
        assert_eq!(indexes[1].kind, IndexKind::Unique);
        assert_eq!(indexes[2].kind, IndexKind::Index);
        assert_eq!(
            indexes[2].columns,
            vec!["first_name".to_string(), "last_name".into()]
        );
        assert!(indexes[2].is_composite());
        assert_eq!(indexes[3].kind, IndexKind::Fulltext);
        assert_eq!(indexes[3].algorithm, None);
    }

    #[test]
    fn test_build_foreign_keys_composite_ordering() {
        let rows = vec![
            ForeignKeyRow {
                constraint: "orders_line_fk".into(),
                column: "line_no".into(),
                ordinal: 2,
                referenced_table: "lines".into(),
                referenced_column: "no".into(),
                on_delete: "CASCADE".into(),
                on_update: "RESTRICT".into(),
            },
            ForeignKeyRow {
                constraint: "orders_line_fk".into(),
                column: "order_id".into(),
                ordinal: 1,
                referenced_table: "lines".into(),
                referenced_column: "order_id".into(),
                on_delete: "CASCADE".into(),
                on_update: "RESTRICT".into(),
            },
        ];
        let fks = build_foreign_keys(rows);
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].columns, vec!["order_id".to_string(), "line_no".into()]);
        assert_eq!(
            fks[0].referenced_columns,
            vec!["order_id".to_string(), "no".into()]
        );
        assert_eq!(fks[0].on_delete, FkAction::Cascade);
        assert_eq!(fks[0].on_update, FkAction::Restrict);
    }
}
