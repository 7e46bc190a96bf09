//! Dialect-neutral schema model.
//!
//! These types provide a database-agnostic representation of tables, columns,
//! indexes and foreign keys. Parsers construct them from catalog queries;
//! every downstream component (dependency engine, relationship detector,
//! emitters, comparator) only borrows them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Canonical column type vocabulary.
///
/// Distinct from the raw `native_type` string read from the catalog: every
/// dialect parser reduces its native tokens to one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    // Integer family
    TinyInteger,
    SmallInteger,
    MediumInteger,
    Integer,
    BigInteger,
    // Floating point
    Float,
    Double,
    // Fixed point
    Decimal,
    // Textual
    Char,
    String,
    TinyText,
    Text,
    MediumText,
    LongText,
    // Binary
    Binary,
    Blob,
    // Temporal
    Date,
    Time,
    DateTime,
    Timestamp,
    TimestampTz,
    Year,
    // Structured
    Json,
    Jsonb,
    // Logical
    Boolean,
    // Identity
    Uuid,
    Ulid,
    // Enumerable (value list carried in `ColumnAttributes::enum_values`)
    Enum,
    Set,
    // Spatial
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    Geometry,
    GeometryCollection,
}

impl ColumnType {
    /// Whether the type belongs to the integer family.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInteger
                | ColumnType::SmallInteger
                | ColumnType::MediumInteger
                | ColumnType::Integer
                | ColumnType::BigInteger
        )
    }

    /// Whether the type is temporal (date, time, datetime, timestamp, year).
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnType::Date
                | ColumnType::Time
                | ColumnType::DateTime
                | ColumnType::Timestamp
                | ColumnType::TimestampTz
                | ColumnType::Year
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            ColumnType::Point
                | ColumnType::LineString
                | ColumnType::Polygon
                | ColumnType::MultiPoint
                | ColumnType::MultiLineString
                | ColumnType::MultiPolygon
                | ColumnType::Geometry
                | ColumnType::GeometryCollection
        )
    }

    pub fn is_json(&self) -> bool {
        matches!(self, ColumnType::Json | ColumnType::Jsonb)
    }
}

/// A column default parsed from its textual catalog form.
///
/// Catalog casts (`::text`, surrounding parentheses, `b'…'` bit prefixes) are
/// stripped by the parsers before classification. A bare upper-case expression
/// such as `CURRENT_TIMESTAMP` or `uuid()` is preserved verbatim as
/// [`DefaultValue::Expression`]; the emitter wraps it in a raw-SQL marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum DefaultValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Expression(String),
}

/// Well-known dynamic column attributes plus a free-form escape hatch for
/// dialect-specific extras.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnAttributes {
    /// Column is (part of) the primary key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary: bool,

    /// Column is computed/generated and has no stored definition of its own.
    #[serde(default, skip_serializing_if = "is_false")]
    pub computed: bool,

    /// Value list for enum/set columns. Non-empty whenever the canonical type
    /// is Enum or Set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    /// Varchar declared at the dialect maximum (emitted without a length).
    #[serde(default, skip_serializing_if = "is_false")]
    pub max_varchar: bool,

    /// Free-form dialect extras.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

fn is_false(v: &bool) -> bool {
    !v
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Canonical type.
    pub column_type: ColumnType,

    /// Raw dialect type string (e.g. "int(10) unsigned", "timestamptz").
    pub native_type: String,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Whether the column auto-increments. Implies an integer family type.
    pub auto_increment: bool,

    /// Whether the native token carries `unsigned` (MySQL only; other
    /// dialects always report false).
    pub unsigned: bool,

    /// Declared length for string/char/binary types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Numeric precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,

    /// Numeric scale. Never exceeds `precision` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Parsed default value. `None` when the catalog reports no default or a
    /// literal NULL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,

    #[serde(default)]
    pub attributes: ColumnAttributes,
}

impl Column {
    /// Create a column with the given name and type; everything else takes
    /// the neutral defaults parsers start from.
    pub fn new(name: impl Into<String>, column_type: ColumnType, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type,
            native_type: native_type.into(),
            nullable: false,
            auto_increment: false,
            unsigned: false,
            length: None,
            precision: None,
            scale: None,
            charset: None,
            collation: None,
            comment: None,
            default: None,
            attributes: ColumnAttributes::default(),
        }
    }
}

/// Index kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
    Fulltext,
    Spatial,
}

/// Index algorithm hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAlgorithm {
    BTree,
    Hash,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name, unique within its table.
    pub name: String,

    pub kind: IndexKind,

    /// Ordered column names. Never empty.
    pub columns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<IndexAlgorithm>,
}

impl Index {
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl FkAction {
    /// The textual form emitted into creation scripts.
    pub fn as_sql(&self) -> &'static str {
        match self {
            FkAction::Cascade => "cascade",
            FkAction::SetNull => "set null",
            FkAction::SetDefault => "set default",
            FkAction::Restrict => "restrict",
            FkAction::NoAction => "no action",
        }
    }
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Local column names, ordered. Same length as `referenced_columns`.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub referenced_table: String,

    /// Referenced column names, ordered.
    pub referenced_columns: Vec<String>,

    pub on_delete: FkAction,

    pub on_update: FkAction,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unique within one generation invocation.
    pub name: String,

    /// Columns in catalog order. Emission preserves this order.
    pub columns: Vec<Column>,

    /// Indexes, identified by name.
    pub indexes: Vec<Index>,

    /// Foreign keys, identified by name.
    pub foreign_keys: Vec<ForeignKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Free-form dialect extras (e.g. the schema namespace on PostgreSQL and
    /// SQL Server).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Table {
    /// Create an empty table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            engine: None,
            charset: None,
            collation: None,
            comment: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary index, if any. At most one exists per table.
    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    /// Whether both `created_at` and `updated_at` are present.
    pub fn has_timestamps(&self) -> bool {
        self.column("created_at").is_some() && self.column("updated_at").is_some()
    }

    /// Whether a temporal `deleted_at` column is present.
    pub fn has_soft_deletes(&self) -> bool {
        self.column("deleted_at")
            .map(|c| c.column_type.is_temporal())
            .unwrap_or(false)
    }

    /// Whether `column` carries a single-column unique index.
    pub fn has_unique_index_on(&self, column: &str) -> bool {
        self.indexes.iter().any(|i| {
            matches!(i.kind, IndexKind::Unique | IndexKind::Primary)
                && i.columns.len() == 1
                && i.columns[0] == column
        })
    }

    /// Validate the model invariants after composition.
    ///
    /// Parsers call this once per table so that a malformed catalog read
    /// surfaces as a structured error instead of a downstream panic.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| {
            Err(SchemaError::Config(format!(
                "table '{}': {}",
                self.name, msg
            )))
        };

        let primaries = self
            .indexes
            .iter()
            .filter(|i| i.kind == IndexKind::Primary)
            .count();
        if primaries > 1 {
            return fail(format!("{} primary indexes", primaries));
        }

        let mut seen = std::collections::BTreeSet::new();
        for index in &self.indexes {
            if !seen.insert(index.name.as_str()) {
                return fail(format!("duplicate index name '{}'", index.name));
            }
            if index.columns.is_empty() {
                return fail(format!("index '{}' has no columns", index.name));
            }
            for col in &index.columns {
                if self.column(col).is_none() {
                    return fail(format!("index '{}' references unknown column '{}'", index.name, col));
                }
            }
        }

        for fk in &self.foreign_keys {
            if fk.columns.is_empty() || fk.columns.len() != fk.referenced_columns.len() {
                return fail(format!("foreign key '{}' has mismatched column lists", fk.name));
            }
            for col in &fk.columns {
                if self.column(col).is_none() {
                    return fail(format!("foreign key '{}' references unknown column '{}'", fk.name, col));
                }
            }
        }

        for col in &self.columns {
            if let (Some(p), Some(s)) = (col.precision, col.scale) {
                if s > p {
                    return fail(format!("column '{}' scale {} exceeds precision {}", col.name, s, p));
                }
            }
            if col.auto_increment && !col.column_type.is_integer() {
                return fail(format!("column '{}' auto-increments but is not an integer", col.name));
            }
            if matches!(col.column_type, ColumnType::Enum | ColumnType::Set)
                && col
                    .attributes
                    .enum_values
                    .as_ref()
                    .map(|v| v.is_empty())
                    .unwrap_or(true)
            {
                return fail(format!("column '{}' is enumerable but has no value list", col.name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_column(name: &str, ty: ColumnType) -> Column {
        Column::new(name, ty, "test")
    }

    fn make_test_table(columns: Vec<Column>) -> Table {
        let mut table = Table::new("widgets");
        table.columns = columns;
        table
    }

    #[test]
    fn test_integer_family() {
        assert!(ColumnType::BigInteger.is_integer());
        assert!(ColumnType::TinyInteger.is_integer());
        assert!(!ColumnType::Decimal.is_integer());
        assert!(!ColumnType::String.is_integer());
    }

    #[test]
    fn test_temporal_family() {
        assert!(ColumnType::TimestampTz.is_temporal());
        assert!(ColumnType::Year.is_temporal());
        assert!(!ColumnType::Json.is_temporal());
    }

    #[test]
    fn test_has_timestamps_requires_both() {
        let table = make_test_table(vec![make_test_column("created_at", ColumnType::Timestamp)]);
        assert!(!table.has_timestamps());

        let table = make_test_table(vec![
            make_test_column("created_at", ColumnType::Timestamp),
            make_test_column("updated_at", ColumnType::Timestamp),
        ]);
        assert!(table.has_timestamps());
    }

    #[test]
    fn test_soft_deletes_requires_temporal_type() {
        let table = make_test_table(vec![make_test_column("deleted_at", ColumnType::Boolean)]);
        assert!(!table.has_soft_deletes());

        let table = make_test_table(vec![make_test_column("deleted_at", ColumnType::Timestamp)]);
        assert!(table.has_soft_deletes());
    }

    #[test]
    fn test_unique_index_lookup() {
        let mut table = make_test_table(vec![make_test_column("email", ColumnType::String)]);
        table.indexes.push(Index {
            name: "widgets_email_unique".into(),
            kind: IndexKind::Unique,
            columns: vec!["email".into()],
            algorithm: None,
        });
        assert!(table.has_unique_index_on("email"));
        assert!(!table.has_unique_index_on("name"));
    }

    #[test]
    fn test_validate_rejects_two_primaries() {
        let mut table = make_test_table(vec![
            make_test_column("a", ColumnType::Integer),
            make_test_column("b", ColumnType::Integer),
        ]);
        for (name, col) in [("pk_a", "a"), ("pk_b", "b")] {
            table.indexes.push(Index {
                name: name.into(),
                kind: IndexKind::Primary,
                columns: vec![col.into()],
                algorithm: None,
            });
        }
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_scale_above_precision() {
        let mut col = make_test_column("price", ColumnType::Decimal);
        col.precision = Some(4);
        col.scale = Some(8);
        let table = make_test_table(vec![col]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_enum() {
        let col = make_test_column("status", ColumnType::Enum);
        let table = make_test_table(vec![col]);
        assert!(table.validate().is_err());

        let mut col = make_test_column("status", ColumnType::Enum);
        col.attributes.enum_values = Some(vec!["draft".into()]);
        let table = make_test_table(vec![col]);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_textual_auto_increment() {
        let mut col = make_test_column("name", ColumnType::String);
        col.auto_increment = true;
        let table = make_test_table(vec![col]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_index_on_missing_column() {
        let mut table = make_test_table(vec![make_test_column("a", ColumnType::Integer)]);
        table.indexes.push(Index {
            name: "idx".into(),
            kind: IndexKind::Index,
            columns: vec!["ghost".into()],
            algorithm: None,
        });
        assert!(table.validate().is_err());
    }
}
