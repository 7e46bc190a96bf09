//! Schema comparison and drift reporting.
//!
//! Direct mode diffs two parsed schema sets structurally. Migration-aware
//! mode compares a live schema against the table/column names extracted from
//! a legacy script archive by the lexical [`ScriptArchive`] scanner.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::error::Result;
use crate::schema::{Column, Table};

/// One changed column field with its before/after values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

/// Per-column change set.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDiff {
    pub name: String,
    pub changes: BTreeMap<String, Change>,
}

/// Per-table structural differences.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDiff {
    pub name: String,
    pub added_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub modified_columns: Vec<ColumnDiff>,
    pub added_indexes: Vec<String>,
    pub dropped_indexes: Vec<String>,
    pub added_foreign_keys: Vec<String>,
    pub dropped_foreign_keys: Vec<String>,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.modified_columns.is_empty()
            && self.added_indexes.is_empty()
            && self.dropped_indexes.is_empty()
            && self.added_foreign_keys.is_empty()
            && self.dropped_foreign_keys.is_empty()
    }
}

/// Full comparison result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaDiff {
    pub created: Vec<String>,
    pub dropped: Vec<String>,
    pub modified: Vec<TableDiff>,
}

impl SchemaDiff {
    pub fn is_in_sync(&self) -> bool {
        self.created.is_empty() && self.dropped.is_empty() && self.modified.is_empty()
    }
}

/// Drift relative to a migration archive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationDrift {
    pub new: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl MigrationDrift {
    pub fn is_in_sync(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Table/column names recovered from a previously emitted script set.
pub trait MigrationArchive {
    /// Table name to column names, as far as the archive records them.
    fn tables(&self) -> &BTreeMap<String, Vec<String>>;
}

/// Structural schema comparison.
pub struct SchemaComparator;

impl SchemaComparator {
    /// Compare two schema sets. `created` lists tables present only in
    /// `current`, `dropped` tables present only in `target`; the
    /// intersection is compared per table.
    pub fn compare(current: &[Table], target: &[Table]) -> SchemaDiff {
        let target_names: BTreeMap<&str, &Table> =
            target.iter().map(|t| (t.name.as_str(), t)).collect();
        let current_names: BTreeMap<&str, &Table> =
            current.iter().map(|t| (t.name.as_str(), t)).collect();

        let mut diff = SchemaDiff::default();
        for table in current {
            match target_names.get(table.name.as_str()) {
                None => diff.created.push(table.name.clone()),
                Some(other) => {
                    let table_diff = Self::compare_table(table, other);
                    if !table_diff.is_empty() {
                        diff.modified.push(table_diff);
                    }
                }
            }
        }
        for table in target {
            if !current_names.contains_key(table.name.as_str()) {
                diff.dropped.push(table.name.clone());
            }
        }
        diff
    }

    /// Structural per-table comparison. Columns match by name and count as
    /// modified when type, nullability, default, length, precision or scale
    /// differ; indexes and foreign keys match by name only.
    pub fn compare_table(current: &Table, target: &Table) -> TableDiff {
        let mut diff = TableDiff {
            name: current.name.clone(),
            ..TableDiff::default()
        };

        for column in &current.columns {
            match target.column(&column.name) {
                None => diff.added_columns.push(column.name.clone()),
                Some(other) => {
                    let changes = column_changes(column, other);
                    if !changes.is_empty() {
                        diff.modified_columns.push(ColumnDiff {
                            name: column.name.clone(),
                            changes,
                        });
                    }
                }
            }
        }
        for column in &target.columns {
            if current.column(&column.name).is_none() {
                diff.dropped_columns.push(column.name.clone());
            }
        }

        let index_names = |t: &Table| -> Vec<String> {
            t.indexes.iter().map(|i| i.name.clone()).collect()
        };
        let current_indexes = index_names(current);
        let target_indexes = index_names(target);
        diff.added_indexes = current_indexes
            .iter()
            .filter(|n| !target_indexes.contains(n))
            .cloned()
            .collect();
        diff.dropped_indexes = target_indexes
            .iter()
            .filter(|n| !current_indexes.contains(n))
            .cloned()
            .collect();

        let fk_names = |t: &Table| -> Vec<String> {
            t.foreign_keys.iter().map(|f| f.name.clone()).collect()
        };
        let current_fks = fk_names(current);
        let target_fks = fk_names(target);
        diff.added_foreign_keys = current_fks
            .iter()
            .filter(|n| !target_fks.contains(n))
            .cloned()
            .collect();
        diff.dropped_foreign_keys = target_fks
            .iter()
            .filter(|n| !current_fks.contains(n))
            .cloned()
            .collect();

        diff
    }

    /// Compare a live schema against the script archive. The archive check is
    /// coarser than direct mode: a table is modified when any column name
    /// exists on one side only.
    pub fn compare_with_migrations(
        tables: &[Table],
        archive: &dyn MigrationArchive,
    ) -> MigrationDrift {
        let recorded = archive.tables();
        let mut drift = MigrationDrift::default();

        for table in tables {
            match recorded.get(&table.name) {
                None => drift.new.push(table.name.clone()),
                Some(columns) => {
                    let live: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
                    let missing_in_archive = live.iter().any(|c| !columns.iter().any(|a| a == c));
                    let missing_in_live = columns.iter().any(|a| !live.contains(&a.as_str()));
                    if missing_in_archive || missing_in_live {
                        drift.modified.push(table.name.clone());
                    }
                }
            }
        }

        let live_names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        for name in recorded.keys() {
            if !live_names.contains(&name.as_str()) {
                drift.removed.push(name.clone());
            }
        }

        drift
    }
}

fn column_changes(current: &Column, target: &Column) -> BTreeMap<String, Change> {
    let mut changes = BTreeMap::new();
    // `from` is the target (archived) value, `to` the live one
    let mut check = |field: &str, from: serde_json::Value, to: serde_json::Value| {
        if from != to {
            changes.insert(field.to_string(), Change { from, to });
        }
    };

    check("type", json!(target.column_type), json!(current.column_type));
    check("nullable", json!(target.nullable), json!(current.nullable));
    check("default", json!(target.default), json!(current.default));
    check("length", json!(target.length), json!(current.length));
    check("precision", json!(target.precision), json!(current.precision));
    check("scale", json!(target.scale), json!(current.scale));
    changes
}

/// Lexical scanner over previously emitted creation scripts.
///
/// Walks `Schema::create` blocks and records quoted first arguments of
/// `$table->…` column calls, plus the column pairs behind `timestamps()` and
/// `softDeletes()`. Columns introduced by other helper directives
/// (`rememberToken()`, `ulid()` without a name) are not recovered; drift
/// reports may flag such tables as modified even when they are in sync.
#[derive(Debug, Default)]
pub struct ScriptArchive {
    tables: BTreeMap<String, Vec<String>>,
}

/// Methods whose first argument is not a column name.
const NON_COLUMN_METHODS: &[&str] = &[
    "index",
    "unique",
    "fullText",
    "spatialIndex",
    "primary",
    "foreign",
    "dropForeign",
    "engine",
    "charset",
    "collation",
    "comment",
];

impl ScriptArchive {
    /// Scan every `.php` file in a directory, in lexical filename order.
    pub fn scan_dir(path: impl AsRef<Path>) -> Result<Self> {
        let mut entries: Vec<_> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("php"))
            .collect();
        entries.sort();

        let mut archive = Self::default();
        for path in entries {
            let source = std::fs::read_to_string(&path)?;
            archive.scan_source(&source);
        }
        Ok(archive)
    }

    /// Scan in-memory sources (used by tests and preview mode).
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a str>) -> Self {
        let mut archive = Self::default();
        for source in sources {
            archive.scan_source(source);
        }
        archive
    }

    fn scan_source(&mut self, source: &str) {
        let mut current_table: Option<String> = None;

        for line in source.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("Schema::create(") {
                if let Some(name) = quoted_prefix(rest) {
                    current_table = Some(name.to_string());
                    self.tables.entry(name.to_string()).or_default();
                }
                continue;
            }
            if trimmed.starts_with("});") {
                current_table = None;
                continue;
            }
            let Some(table) = current_table.clone() else {
                continue;
            };
            let Some(rest) = trimmed.strip_prefix("$table->") else {
                continue;
            };
            let Some(paren) = rest.find('(') else {
                continue;
            };
            let method = &rest[..paren];
            let columns = self.tables.entry(table).or_default();
            match method {
                "timestamps" => {
                    push_unique(columns, "created_at");
                    push_unique(columns, "updated_at");
                }
                "softDeletes" => push_unique(columns, "deleted_at"),
                "id" => {
                    let column = quoted_prefix(&rest[paren + 1..]).unwrap_or("id");
                    push_unique(columns, column);
                }
                m if NON_COLUMN_METHODS.contains(&m) => {}
                _ => {
                    if let Some(column) = quoted_prefix(&rest[paren + 1..]) {
                        push_unique(columns, column);
                    }
                }
            }
        }
    }
}

impl MigrationArchive for ScriptArchive {
    fn tables(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tables
    }
}

fn push_unique(columns: &mut Vec<String>, column: &str) {
    if !columns.iter().any(|c| c == column) {
        columns.push(column.to_string());
    }
}

/// Extract a leading single-quoted string: `'users', function…` -> `users`.
fn quoted_prefix(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(&rest[..end])
}
