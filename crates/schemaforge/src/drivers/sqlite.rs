//! SQLite dialect parser.
//!
//! SQLite has no information_schema; everything comes from sqlite_master and
//! the PRAGMA table-valued functions. Declared types are free-form, so
//! canonical classification follows the documented affinity rules.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::drivers::common;
use crate::drivers::{DriverTag, SchemaParser};
use crate::error::{Result, SchemaError};
use crate::schema::{Column, ColumnType, ForeignKey, Index, IndexKind, Table};

/// SQLite schema parser.
pub struct SqliteParser {
    pool: SqlitePool,
}

impl SqliteParser {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// PRAGMA calls take no bind parameters; the table name is embedded with
    /// quote escaping.
    fn pragma(&self, pragma: &str, argument: &str) -> String {
        format!("PRAGMA {}('{}')", pragma, argument.replace('\'', "''"))
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<SqliteRow>> {
        sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))
    }
}

#[async_trait]
impl SchemaParser for SqliteParser {
    async fn list_tables(&self, exclude: &[String]) -> Result<Vec<String>> {
        let sql = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;
        let rows = self.fetch(sql).await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
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

        let mut column_rows = Vec::new();
        for row in self.fetch(&self.pragma("table_info", name)).await? {
            column_rows.push(ColumnRow {
                name: row.try_get("name")?,
                declared_type: row.try_get("type")?,
                not_null: row.try_get::<i64, _>("notnull")? != 0,
                default: row.try_get("dflt_value")?,
                pk_position: row.try_get::<i64, _>("pk")? as i32,
            });
        }
        let (columns, primary) = build_columns(&column_rows);
        table.columns = columns;
        if let Some(primary) = primary {
            table.indexes.push(primary);
        }

        for row in self.fetch(&self.pragma("index_list", name)).await? {
            let index_name: String = row.try_get("name")?;
            // synthetic autoindexes mirror the PK/unique constraints
            if index_name.starts_with("sqlite_autoindex_") {
                continue;
            }
            let unique = row.try_get::<i64, _>("unique")? != 0;

            let mut member_rows = Vec::new();
            for member in self.fetch(&self.pragma("index_info", &index_name)).await? {
                member_rows.push((
                    member.try_get::<i64, _>("seqno")? as i32,
                    member.try_get::<String, _>("name")?,
                ));
            }
            member_rows.sort_by_key(|(seqno, _)| *seqno);

            table.indexes.push(Index {
                name: index_name,
                kind: if unique { IndexKind::Unique } else { IndexKind::Index },
                columns: member_rows.into_iter().map(|(_, column)| column).collect(),
                algorithm: None,
            });
        }

        let mut fk_rows = Vec::new();
        for row in self.fetch(&self.pragma("foreign_key_list", name)).await? {
            fk_rows.push(ForeignKeyRow {
                id: row.try_get::<i64, _>("id")? as i32,
                seq: row.try_get::<i64, _>("seq")? as i32,
                referenced_table: row.try_get("table")?,
                column: row.try_get("from")?,
                referenced_column: row.try_get::<Option<String>, _>("to")?,
                on_update: row.try_get("on_update")?,
                on_delete: row.try_get("on_delete")?,
            });
        }
        table.foreign_keys = build_foreign_keys(name, fk_rows);

        table.validate()?;
        debug!(table = name, columns = table.columns.len(), "parsed SQLite table");
        Ok(table)
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS total FROM sqlite_master WHERE type = 'table' AND name = ?";
        let row = sqlx::query(sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SchemaError::query(sql, e))?;
        Ok(row.try_get::<i64, _>("total")? > 0)
    }

    async fn database_name(&self) -> Result<String> {
        // the attached main database has no logical name
        Ok("main".to_string())
    }

    fn driver(&self) -> DriverTag {
        DriverTag::Sqlite
    }
}

/// One PRAGMA table_info row.
pub(crate) struct ColumnRow {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it.
    pub pk_position: i32,
}

/// One PRAGMA foreign_key_list row.
pub(crate) struct ForeignKeyRow {
    pub id: i32,
    pub seq: i32,
    pub referenced_table: String,
    pub column: String,
    /// Absent when the FK references the target's primary key implicitly.
    pub referenced_column: Option<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// SQLite affinity classification of a declared type. BOOLEAN carries
/// INTEGER affinity and DATE/DATETIME text affinity, so both classify as
/// their storage class rather than their declared intent.
pub(crate) fn normalize_type(declared: &str) -> ColumnType {
    let lower = declared.to_ascii_lowercase();
    if lower.contains("int") {
        return ColumnType::Integer;
    }
    if lower.contains("char") || lower.contains("clob") || lower.contains("text") {
        return ColumnType::Text;
    }
    if lower.contains("blob") || lower.is_empty() {
        return ColumnType::Blob;
    }
    if lower.contains("real") || lower.contains("floa") || lower.contains("doub") {
        return ColumnType::Float;
    }
    if lower.contains("bool") {
        return ColumnType::Integer;
    }
    if lower.contains("date") || lower.contains("time") {
        return ColumnType::Text;
    }
    ColumnType::Decimal
}

/// Build columns and the synthesized primary index.
///
/// A single-column INTEGER primary key is the rowid alias and therefore
/// auto-increments.
pub(crate) fn build_columns(rows: &[ColumnRow]) -> (Vec<Column>, Option<Index>) {
    let pk_members: Vec<&ColumnRow> = {
        let mut members: Vec<&ColumnRow> = rows.iter().filter(|r| r.pk_position > 0).collect();
        members.sort_by_key(|r| r.pk_position);
        members
    };
    let rowid_alias = pk_members.len() == 1
        && pk_members[0].declared_type.eq_ignore_ascii_case("integer");

    let columns = rows
        .iter()
        .map(|row| {
            let column_type = normalize_type(&row.declared_type);
            let mut column = Column::new(&row.name, column_type, &row.declared_type);
            column.nullable = !row.not_null && row.pk_position == 0;
            column.attributes.primary = row.pk_position > 0;
            column.auto_increment = rowid_alias && row.pk_position > 0;
            column.length = common::length_of(&row.declared_type);
            if !column.auto_increment {
                column.default = row
                    .default
                    .as_deref()
                    .and_then(|raw| common::parse_default(raw, DriverTag::Sqlite));
            }
            column
        })
        .collect();

    let primary = (!pk_members.is_empty()).then(|| Index {
        name: "primary".to_string(),
        kind: IndexKind::Primary,
        columns: pk_members.iter().map(|r| r.name.clone()).collect(),
        algorithm: None,
    });

    (columns, primary)
}

pub(crate) fn build_foreign_keys(table: &str, rows: Vec<ForeignKeyRow>) -> Vec<ForeignKey> {
    let grouped = common::group_by_constraint(
        rows.into_iter()
            .map(|r| {
                (
                    r.id.to_string(),
                    r.seq,
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
        .map(|(_, members)| {
            let (_, referenced_table, _, on_delete, on_update) = members[0].clone();
            let columns: Vec<String> = members.iter().map(|m| m.0.clone()).collect();
            ForeignKey {
                // SQLite constraints are anonymous; synthesize a stable name
                name: format!("{}_{}_foreign", table, columns.join("_")),
                columns,
                referenced_columns: members
                    .iter()
                    .map(|m| m.2.clone().unwrap_or_else(|| "id".to_string()))
                    .collect(),
                referenced_table,
                on_delete: common::fk_action(&on_delete),
                on_update: common::fk_action(&on_update),
            }
        })
        .collect()
}
