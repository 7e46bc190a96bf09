//! Canonical-type to emitted-token mapping.
//!
//! The dialect parsers reduce native catalog tokens to [`ColumnType`]; this
//! module maps the canonical form onward to the tokens the emitters print:
//! the builder method for creation scripts, the cast token for stubs, and the
//! docblock property type. Per-dialect `type_mappings` overrides from the
//! configuration are applied at construction; the map is immutable afterwards
//! and passed explicitly into the emitters.

use std::collections::BTreeMap;

use crate::schema::{Column, ColumnType};

/// Immutable token map consulted by both emitters.
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    /// native-type token (lower-cased) -> builder method token.
    method_overrides: BTreeMap<String, String>,
}

/// Builder for [`TypeMap`]. Overrides may only be registered here; once
/// built, the map is read-only.
#[derive(Debug, Default)]
pub struct TypeMapBuilder {
    method_overrides: BTreeMap<String, String>,
}

impl TypeMapBuilder {
    /// Map a native type token to a custom builder method token.
    pub fn with_mapping(mut self, native: impl Into<String>, method: impl Into<String>) -> Self {
        self.method_overrides
            .insert(native.into().to_ascii_lowercase(), method.into());
        self
    }

    /// Register every override from a configuration sub-map.
    pub fn with_mappings(mut self, mappings: &BTreeMap<String, String>) -> Self {
        for (native, method) in mappings {
            self.method_overrides
                .insert(native.to_ascii_lowercase(), method.clone());
        }
        self
    }

    pub fn build(self) -> TypeMap {
        TypeMap {
            method_overrides: self.method_overrides,
        }
    }
}

impl TypeMap {
    pub fn builder() -> TypeMapBuilder {
        TypeMapBuilder::default()
    }

    /// The builder method token for a column, before unsigned/auto-increment
    /// composition (the creation-script emitter applies those).
    ///
    /// Overrides are keyed on the native token, so a configured mapping wins
    /// over the canonical default.
    pub fn method_token(&self, column: &Column) -> String {
        let native_key = base_native_token(&column.native_type);
        if let Some(custom) = self.method_overrides.get(&native_key) {
            return custom.clone();
        }
        canonical_method(&column.column_type).to_string()
    }

    /// The cast token declared in stubs, if the column warrants one.
    pub fn cast_token(&self, column: &Column) -> Option<String> {
        match column.column_type {
            ColumnType::Boolean => Some("boolean".to_string()),
            ColumnType::Json | ColumnType::Jsonb => Some("array".to_string()),
            ColumnType::Decimal => {
                Some(format!("decimal:{}", column.scale.unwrap_or(2)))
            }
            ref ty if ty.is_temporal() && column.name.ends_with("_at") => {
                Some("datetime".to_string())
            }
            ColumnType::Date if column.name.ends_with("_date") => Some("date".to_string()),
            _ => None,
        }
    }

    /// The scalar type used in docblock property annotations.
    pub fn property_type(&self, column: &Column) -> &'static str {
        match column.column_type {
            ref ty if ty.is_integer() => "int",
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal => "float",
            ref ty if ty.is_temporal() => "\\Illuminate\\Support\\Carbon",
            ColumnType::Boolean => "bool",
            ColumnType::Json | ColumnType::Jsonb => "array",
            _ => "string",
        }
    }
}

/// Strip length/precision decorations from a native token:
/// "varchar(255)" -> "varchar", "int(10) unsigned" -> "int".
fn base_native_token(native: &str) -> String {
    let lower = native.to_ascii_lowercase();
    let end = lower.find(['(', ' ']).unwrap_or(lower.len());
    lower[..end].to_string()
}

/// Canonical type to default builder method token.
fn canonical_method(ty: &ColumnType) -> &'static str {
    match ty {
        ColumnType::TinyInteger => "tinyInteger",
        ColumnType::SmallInteger => "smallInteger",
        ColumnType::MediumInteger => "mediumInteger",
        ColumnType::Integer => "integer",
        ColumnType::BigInteger => "bigInteger",
        ColumnType::Float => "float",
        ColumnType::Double => "double",
        ColumnType::Decimal => "decimal",
        ColumnType::Char => "char",
        ColumnType::String => "string",
        ColumnType::TinyText => "tinyText",
        ColumnType::Text => "text",
        ColumnType::MediumText => "mediumText",
        ColumnType::LongText => "longText",
        ColumnType::Binary => "binary",
        ColumnType::Blob => "binary",
        ColumnType::Date => "date",
        ColumnType::Time => "time",
        ColumnType::DateTime => "dateTime",
        ColumnType::Timestamp => "timestamp",
        ColumnType::TimestampTz => "timestampTz",
        ColumnType::Year => "year",
        ColumnType::Json => "json",
        ColumnType::Jsonb => "jsonb",
        ColumnType::Boolean => "boolean",
        ColumnType::Uuid => "uuid",
        ColumnType::Ulid => "ulid",
        ColumnType::Enum => "enum",
        ColumnType::Set => "set",
        ColumnType::Point => "point",
        ColumnType::LineString => "lineString",
        ColumnType::Polygon => "polygon",
        ColumnType::MultiPoint => "multiPoint",
        ColumnType::MultiLineString => "multiLineString",
        ColumnType::MultiPolygon => "multiPolygon",
        ColumnType::Geometry => "geometry",
        ColumnType::GeometryCollection => "geometryCollection",
    }
}
