//! Creation-script emission.
//!
//! One timestamped script per table, ordered so every referenced table is
//! created before its referrers, plus optional edge-only scripts that install
//! foreign keys after the fact. Cycles degrade instead of aborting: the
//! tables are still created in a best-effort order and every foreign key of a
//! cycle member moves to an edge-only script, letting the ring close once all
//! tables exist.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::emit::{quote, render_default, GeneratedFile};
use crate::graph::DependencyGraph;
use crate::schema::{Column, ColumnType, FkAction, ForeignKey, Index, IndexKind, Table};
use crate::typemap::TypeMap;

/// Options for migration emission.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Emit every foreign key into a separate edge-only script.
    pub separate_foreign_keys: bool,
    /// Indentation unit.
    pub indent: String,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            separate_foreign_keys: false,
            indent: "    ".to_string(),
        }
    }
}

/// Emits ordered creation scripts for a table set.
pub struct MigrationEmitter<'a> {
    type_map: &'a TypeMap,
    options: MigrationOptions,
}

impl<'a> MigrationEmitter<'a> {
    pub fn new(type_map: &'a TypeMap, options: MigrationOptions) -> Self {
        Self { type_map, options }
    }

    /// Generate the ordered file set. Filenames start at `start` and advance
    /// one second per file so lexical order equals emission order.
    pub fn generate(&self, tables: &[Table], start: NaiveDateTime) -> Vec<GeneratedFile> {
        let graph = DependencyGraph::new(tables);
        let cycles = graph.detect_circular_dependencies();
        let mut cycle_members: BTreeSet<String> = BTreeSet::new();
        for cycle in &cycles {
            warn!(
                cycle = %cycle.join(" -> "),
                "circular dependency; deferring foreign keys to edge-only scripts"
            );
            cycle_members.extend(cycle.iter().cloned());
        }

        let order = graph.sorted_lenient();
        let mut files = Vec::new();
        let mut deferred: Vec<&Table> = Vec::new();
        let mut seq: i64 = 0;

        for &table in &order {
            let inline = !self.options.separate_foreign_keys && !cycle_members.contains(&table.name);
            if !inline && !table.foreign_keys.is_empty() {
                deferred.push(table);
            }
            files.push(GeneratedFile {
                name: filename(start, seq, &format!("create_{}_table", table.name)),
                content: self.create_body(table, inline),
            });
            seq += 1;
        }

        for table in deferred {
            files.push(GeneratedFile {
                name: filename(start, seq, &format!("add_foreign_keys_to_{}_table", table.name)),
                content: self.fk_body(table),
            });
            seq += 1;
        }

        files
    }

    fn create_body(&self, table: &Table, inline_fks: bool) -> String {
        let ind = &self.options.indent;
        let mut lines: Vec<String> = Vec::new();

        if let Some(engine) = &table.engine {
            lines.push(format!("$table->engine = {};", quote(engine)));
        }
        if let Some(charset) = &table.charset {
            lines.push(format!("$table->charset = {};", quote(charset)));
        }
        if let Some(collation) = &table.collation {
            lines.push(format!("$table->collation = {};", quote(collation)));
        }
        if let Some(comment) = &table.comment {
            lines.push(format!("$table->comment({});", quote(comment)));
        }

        let condensed_timestamps = table.has_timestamps();
        let condensed_soft_deletes = table.has_soft_deletes();
        for column in &table.columns {
            let skip = (condensed_timestamps
                && matches!(column.name.as_str(), "created_at" | "updated_at"))
                || (condensed_soft_deletes && column.name == "deleted_at");
            if skip {
                continue;
            }
            lines.push(self.column_line(column));
        }
        if condensed_timestamps {
            lines.push("$table->timestamps();".to_string());
        }
        if condensed_soft_deletes {
            lines.push("$table->softDeletes();".to_string());
        }

        if let Some(primary) = table.primary_key() {
            let handled_by_short_form = !primary.is_composite()
                && table
                    .column(&primary.columns[0])
                    .map(|c| c.auto_increment)
                    .unwrap_or(false);
            if !handled_by_short_form {
                lines.push(format!("$table->primary({});", column_list(&primary.columns)));
            }
        }

        for index in &table.indexes {
            if index.kind == IndexKind::Primary {
                continue;
            }
            lines.push(index_line(index));
        }

        if inline_fks {
            for fk in &table.foreign_keys {
                lines.push(foreign_line(fk));
            }
        }

        let body: String = lines
            .iter()
            .map(|line| format!("{ind}{ind}{ind}{line}\n"))
            .collect();

        format!(
            "<?php\n\n\
             use Illuminate\\Database\\Migrations\\Migration;\n\
             use Illuminate\\Database\\Schema\\Blueprint;\n\
             use Illuminate\\Support\\Facades\\Schema;\n\n\
             return new class extends Migration\n\
             {{\n\
             {ind}/**\n\
             {ind} * Run the migrations.\n\
             {ind} */\n\
             {ind}public function up(): void\n\
             {ind}{{\n\
             {ind}{ind}Schema::create({name}, function (Blueprint $table) {{\n\
             {body}\
             {ind}{ind}}});\n\
             {ind}}}\n\n\
             {ind}/**\n\
             {ind} * Reverse the migrations.\n\
             {ind} */\n\
             {ind}public function down(): void\n\
             {ind}{{\n\
             {ind}{ind}Schema::dropIfExists({name});\n\
             {ind}}}\n\
             }};\n",
            name = quote(&table.name),
        )
    }

    fn fk_body(&self, table: &Table) -> String {
        let ind = &self.options.indent;
        let up: String = table
            .foreign_keys
            .iter()
            .map(|fk| format!("{ind}{ind}{ind}{}\n", foreign_line(fk)))
            .collect();
        let down: String = table
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "{ind}{ind}{ind}$table->dropForeign({});\n",
                    bracket_list(&fk.columns)
                )
            })
            .collect();

        format!(
            "<?php\n\n\
             use Illuminate\\Database\\Migrations\\Migration;\n\
             use Illuminate\\Database\\Schema\\Blueprint;\n\
             use Illuminate\\Support\\Facades\\Schema;\n\n\
             return new class extends Migration\n\
             {{\n\
             {ind}/**\n\
             {ind} * Run the migrations.\n\
             {ind} */\n\
             {ind}public function up(): void\n\
             {ind}{{\n\
             {ind}{ind}Schema::table({name}, function (Blueprint $table) {{\n\
             {up}\
             {ind}{ind}}});\n\
             {ind}}}\n\n\
             {ind}/**\n\
             {ind} * Reverse the migrations.\n\
             {ind} */\n\
             {ind}public function down(): void\n\
             {ind}{{\n\
             {ind}{ind}Schema::table({name}, function (Blueprint $table) {{\n\
             {down}\
             {ind}{ind}}});\n\
             {ind}}}\n\
             }};\n",
            name = quote(&table.name),
        )
    }

    /// Render one column definition with its modifiers in fixed order.
    fn column_line(&self, column: &Column) -> String {
        if column.auto_increment && column.column_type.is_integer() {
            let method = match column.column_type {
                ColumnType::BigInteger => "id",
                ColumnType::Integer => "increments",
                ColumnType::MediumInteger => "mediumIncrements",
                ColumnType::SmallInteger => "smallIncrements",
                _ => "tinyIncrements",
            };
            if method == "id" && column.name == "id" {
                return "$table->id();".to_string();
            }
            return format!("$table->{}({});", method, quote(&column.name));
        }

        let mut method = self.type_map.method_token(column);
        if column.unsigned && column.column_type.is_integer() {
            method = format!(
                "unsigned{}{}",
                method[..1].to_uppercase(),
                &method[1..]
            );
        }

        let mut args = vec![quote(&column.name)];
        match column.column_type {
            ColumnType::Enum | ColumnType::Set => {
                let values = column
                    .attributes
                    .enum_values
                    .as_deref()
                    .unwrap_or_default();
                args.push(value_list(values));
            }
            ColumnType::Decimal => {
                if let Some(precision) = column.precision {
                    args.push(precision.to_string());
                    if let Some(scale) = column.scale {
                        args.push(scale.to_string());
                    }
                }
            }
            ColumnType::Char | ColumnType::String => {
                if !column.attributes.max_varchar {
                    if let Some(length) = column.length {
                        args.push(length.to_string());
                    }
                }
            }
            _ => {}
        }

        let mut line = format!("$table->{}({})", method, args.join(", "));
        if column.nullable {
            line.push_str("->nullable()");
        }
        if let Some(default) = &column.default {
            line.push_str(&format!("->default({})", render_default(default)));
        }
        if let Some(comment) = &column.comment {
            line.push_str(&format!("->comment({})", quote(comment)));
        }
        if let Some(charset) = &column.charset {
            line.push_str(&format!("->charset({})", quote(charset)));
        }
        if let Some(collation) = &column.collation {
            line.push_str(&format!("->collation({})", quote(collation)));
        }
        line.push(';');
        line
    }
}

fn filename(start: NaiveDateTime, seq: i64, stem: &str) -> String {
    let stamp = start + chrono::Duration::seconds(seq);
    format!("{}_{}.php", stamp.format("%Y_%m_%d_%H%M%S"), stem)
}

fn value_list(values: &[String]) -> String {
    let rendered: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("[{}]", rendered.join(", "))
}

fn bracket_list(columns: &[String]) -> String {
    value_list(columns)
}

/// A single column renders as a string, several as an array.
fn column_list(columns: &[String]) -> String {
    if columns.len() == 1 {
        quote(&columns[0])
    } else {
        bracket_list(columns)
    }
}

fn index_line(index: &Index) -> String {
    let method = match index.kind {
        IndexKind::Unique => "unique",
        IndexKind::Fulltext => "fullText",
        IndexKind::Spatial => "spatialIndex",
        _ => "index",
    };
    format!(
        "$table->{}({}, {});",
        method,
        column_list(&index.columns),
        quote(&index.name)
    )
}

fn foreign_line(fk: &ForeignKey) -> String {
    let mut line = format!(
        "$table->foreign({})->references({})->on({})",
        column_list(&fk.columns),
        column_list(&fk.referenced_columns),
        quote(&fk.referenced_table)
    );
    if !matches!(fk.on_delete, FkAction::Restrict | FkAction::NoAction) {
        line.push_str(&format!("->onDelete({})", quote(fk.on_delete.as_sql())));
    }
    if !matches!(fk.on_update, FkAction::Restrict | FkAction::NoAction) {
        line.push_str(&format!("->onUpdate({})", quote(fk.on_update.as_sql())));
    }
    line.push(';');
    line
}
