//! Class-stub emission.
//!
//! One stub per table: conventional settings are omitted, deviations are
//! declared explicitly, and one method is emitted per detected relationship.

use crate::config::{FormattingConfig, ModelsConfig};
use crate::emit::{quote, GeneratedFile};
use crate::naming;
use crate::relations::Relationship;
use crate::schema::{Column, ColumnType, Table};
use crate::typemap::TypeMap;

/// Emits one class stub per table.
pub struct ModelEmitter<'a> {
    models: &'a ModelsConfig,
    formatting: &'a FormattingConfig,
    type_map: &'a TypeMap,
}

impl<'a> ModelEmitter<'a> {
    pub fn new(
        models: &'a ModelsConfig,
        formatting: &'a FormattingConfig,
        type_map: &'a TypeMap,
    ) -> Self {
        Self {
            models,
            formatting,
            type_map,
        }
    }

    /// Generate the stub for one table. `relationships` comes from the
    /// detector and is already in emission order.
    pub fn generate(&self, table: &Table, relationships: &[Relationship]) -> GeneratedFile {
        let ind = &self.formatting.indent;
        let class = naming::table_to_model(&table.name);

        let base_short = short_name(&self.models.base_class);
        let mut imports = vec![self.models.base_class.clone()];
        if table.has_soft_deletes() {
            imports.push("Illuminate\\Database\\Eloquent\\SoftDeletes".to_string());
        }
        if self.formatting.sort_imports {
            imports.sort();
        }

        let mut sections: Vec<String> = Vec::new();

        if table.has_soft_deletes() {
            sections.push(format!("{ind}use SoftDeletes;\n"));
        }

        let mut properties: Vec<String> = Vec::new();
        if naming::model_to_table(&class) != table.name {
            properties.push(format!(
                "{ind}protected $table = {};\n",
                quote(&table.name)
            ));
        }

        let pk_column = table
            .primary_key()
            .filter(|index| !index.is_composite())
            .and_then(|index| table.column(&index.columns[0]));
        if let Some(pk) = pk_column {
            if pk.name != "id" {
                properties.push(format!(
                    "{ind}protected $primaryKey = {};\n",
                    quote(&pk.name)
                ));
            }
            if !pk.auto_increment {
                properties.push(format!("{ind}public $incrementing = false;\n"));
            }
            if matches!(
                pk.column_type,
                ColumnType::Uuid | ColumnType::Ulid | ColumnType::String | ColumnType::Char
            ) {
                properties.push(format!("{ind}protected $keyType = 'string';\n"));
            }
        }

        if !table.has_timestamps() {
            properties.push(format!("{ind}public $timestamps = false;\n"));
        }

        if self.models.use_fillable {
            let fillable: Vec<&Column> = table
                .columns
                .iter()
                .filter(|c| !c.auto_increment && !self.models.guarded_columns.contains(&c.name))
                .collect();
            if !fillable.is_empty() {
                properties.push(self.string_array_property(
                    "fillable",
                    &fillable.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                ));
            }
        } else {
            let guarded: Vec<&str> = table
                .columns
                .iter()
                .filter(|c| self.models.guarded_columns.contains(&c.name))
                .map(|c| c.name.as_str())
                .collect();
            properties.push(self.string_array_property("guarded", &guarded));
        }

        let casts: Vec<(String, String)> = table
            .columns
            .iter()
            .filter_map(|c| self.type_map.cast_token(c).map(|cast| (c.name.clone(), cast)))
            .collect();
        if !casts.is_empty() {
            let mut lines = format!("{ind}protected $casts = [\n");
            for (name, cast) in &casts {
                lines.push_str(&format!("{ind}{ind}{} => {},\n", quote(name), quote(cast)));
            }
            lines.push_str(&format!("{ind}];\n"));
            properties.push(lines);
        }

        sections.extend(properties);

        for relationship in relationships {
            sections.push(self.relationship_method(relationship));
        }

        if self.models.generate_scopes {
            for column in &table.columns {
                if column.column_type == ColumnType::Boolean {
                    if let Some(stripped) = column.name.strip_prefix("is_") {
                        sections.push(self.scope_method(&column.name, stripped));
                    }
                }
            }
        }

        let use_block: String = imports
            .iter()
            .map(|import| format!("use {};\n", import))
            .collect();

        let content = format!(
            "<?php\n\n\
             namespace {namespace};\n\n\
             {use_block}\n\
             {docblock}\
             class {class} extends {base_short}\n\
             {{\n\
             {body}\
             }}\n",
            namespace = self.models.namespace,
            docblock = self.docblock(table),
            body = sections.join("\n"),
        );

        GeneratedFile {
            name: format!("{}.php", class),
            content,
        }
    }

    fn string_array_property(&self, name: &str, values: &[&str]) -> String {
        let ind = &self.formatting.indent;
        let mut lines = format!("{ind}protected ${} = [\n", name);
        for value in values {
            lines.push_str(&format!("{ind}{ind}{},\n", quote(value)));
        }
        lines.push_str(&format!("{ind}];\n"));
        lines
    }

    fn docblock(&self, table: &Table) -> String {
        let mut block = String::from("/**\n");
        for column in &table.columns {
            let mut ty = self.type_map.property_type(column).to_string();
            if column.nullable {
                ty.push_str("|null");
            }
            block.push_str(&format!(" * @property {} ${}\n", ty, column.name));
        }
        block.push_str(" */\n");
        block
    }

    fn relationship_method(&self, relationship: &Relationship) -> String {
        let ind = &self.formatting.indent;
        let body = match relationship {
            Relationship::BelongsTo {
                related,
                foreign_key,
                owner_key,
                ..
            } => {
                let mut args = format!("{}::class", related);
                match (foreign_key, owner_key) {
                    (Some(fk), Some(ok)) => {
                        args.push_str(&format!(", {}, {}", quote(fk), quote(ok)));
                    }
                    (Some(fk), None) => args.push_str(&format!(", {}", quote(fk))),
                    (None, Some(ok)) => {
                        let conventional =
                            format!("{}_id", naming::to_snake_case(related));
                        args.push_str(&format!(", {}, {}", quote(&conventional), quote(ok)));
                    }
                    (None, None) => {}
                }
                format!("return $this->belongsTo({});", args)
            }
            Relationship::HasOne {
                related,
                foreign_key,
                ..
            } => {
                let mut args = format!("{}::class", related);
                if let Some(fk) = foreign_key {
                    args.push_str(&format!(", {}", quote(fk)));
                }
                format!("return $this->hasOne({});", args)
            }
            Relationship::HasMany {
                related,
                foreign_key,
                ..
            } => {
                let mut args = format!("{}::class", related);
                if let Some(fk) = foreign_key {
                    args.push_str(&format!(", {}", quote(fk)));
                }
                format!("return $this->hasMany({});", args)
            }
            Relationship::BelongsToMany {
                related,
                pivot_table,
                pivot_columns,
                ..
            } => {
                let mut call = format!(
                    "return $this->belongsToMany({}::class, {})",
                    related,
                    quote(pivot_table)
                );
                if !pivot_columns.is_empty() {
                    let extras: Vec<String> =
                        pivot_columns.iter().map(|c| quote(c)).collect();
                    call.push_str(&format!("->withPivot({})", extras.join(", ")));
                }
                call.push(';');
                call
            }
            Relationship::MorphTo { .. } => "return $this->morphTo();".to_string(),
        };

        format!(
            "{ind}public function {method}()\n\
             {ind}{{\n\
             {ind}{ind}{body}\n\
             {ind}}}\n",
            method = relationship.method(),
        )
    }

    fn scope_method(&self, column: &str, stripped: &str) -> String {
        let ind = &self.formatting.indent;
        format!(
            "{ind}public function scope{scope}($query)\n\
             {ind}{{\n\
             {ind}{ind}return $query->where({column}, true);\n\
             {ind}}}\n",
            scope = naming::to_studly_case(stripped),
            column = quote(column),
        )
    }
}

fn short_name(class_path: &str) -> &str {
    class_path.rsplit('\\').next().unwrap_or(class_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKey, Index, IndexKind};

    fn make_config() -> (ModelsConfig, FormattingConfig) {
        (ModelsConfig::default(), FormattingConfig::default())
    }

    fn make_users() -> Table {
        let mut users = Table::new("users");
        let mut id = Column::new("id", ColumnType::BigInteger, "bigint unsigned");
        id.auto_increment = true;
        id.attributes.primary = true;
        users.columns.push(id);
        users.columns.push(Column::new("name", ColumnType::String, "varchar(255)"));
        let mut active = Column::new("is_active", ColumnType::Boolean, "tinyint(1)");
        active.nullable = false;
        users.columns.push(active);
        users.indexes.push(Index {
            name: "PRIMARY".into(),
            kind: IndexKind::Primary,
            columns: vec!["id".into()],
            algorithm: None,
        });
        users.columns.push(Column::new("created_at", ColumnType::Timestamp, "timestamp"));
        users.columns.push(Column::new("updated_at", ColumnType::Timestamp, "timestamp"));
        users
    }

    fn emit(table: &Table, relationships: &[Relationship]) -> String {
        let (models, formatting) = make_config();
        let type_map = TypeMap::builder().build();
        ModelEmitter::new(&models, &formatting, &type_map)
            .generate(table, relationships)
            .content
    }

    #[test]
    fn test_conventional_table_omits_overrides() {
        let content = emit(&make_users(), &[]);
        assert!(content.contains("class User extends Model"));
        assert!(content.contains("namespace App\\Models;"));
        assert!(!content.contains("$table ="));
        assert!(!content.contains("$primaryKey"));
        assert!(!content.contains("$incrementing"));
        assert!(!content.contains("$timestamps"));
    }

    #[test]
    fn test_lossy_plural_gets_table_override() {
        let mut table = Table::new("meta_data");
        table.columns.push(Column::new("id", ColumnType::BigInteger, "bigint"));
        let content = emit(&table, &[]);
        assert!(content.contains("class MetaDatum extends Model"));
        // MetaDatum round-trips to meta_data, so no override is needed
        assert!(!content.contains("$table ="));

        let mut odd = Table::new("person");
        odd.columns.push(Column::new("id", ColumnType::BigInteger, "bigint"));
        let content = emit(&odd, &[]);
        assert!(content.contains("class Person"));
        assert!(content.contains("protected $table = 'person';"));
    }

    #[test]
    fn test_uuid_primary_key_overrides() {
        let mut table = Table::new("tokens");
        let mut pk = Column::new("uuid", ColumnType::Uuid, "uuid");
        pk.attributes.primary = true;
        table.columns.push(pk);
        table.indexes.push(Index {
            name: "tokens_pkey".into(),
            kind: IndexKind::Primary,
            columns: vec!["uuid".into()],
            algorithm: None,
        });

        let content = emit(&table, &[]);
        assert!(content.contains("protected $primaryKey = 'uuid';"));
        assert!(content.contains("public $incrementing = false;"));
        assert!(content.contains("protected $keyType = 'string';"));
        assert!(content.contains("public $timestamps = false;"));
    }

    #[test]
    fn test_fillable_excludes_guarded_and_auto_increment() {
        let content = emit(&make_users(), &[]);
        assert!(content.contains("protected $fillable = ["));
        assert!(content.contains("'name',"));
        assert!(content.contains("'is_active',"));
        assert!(!content.contains("'id',"));
        assert!(!content.contains("'created_at',"));
    }

    #[test]
    fn test_guarded_mode() {
        let (mut models, formatting) = make_config();
        models.use_fillable = false;
        let type_map = TypeMap::builder().build();
        let content = ModelEmitter::new(&models, &formatting, &type_map)
            .generate(&make_users(), &[])
            .content;
        assert!(content.contains("protected $guarded = ["));
        assert!(content.contains("'id',"));
        assert!(!content.contains("$fillable"));
    }

    #[test]
    fn test_casts() {
        let content = emit(&make_users(), &[]);
        assert!(content.contains("protected $casts = ["));
        assert!(content.contains("'is_active' => 'boolean',"));
        assert!(content.contains("'created_at' => 'datetime',"));
    }

    #[test]
    fn test_docblock_types() {
        let content = emit(&make_users(), &[]);
        assert!(content.contains(" * @property int $id"));
        assert!(content.contains(" * @property string $name"));
        assert!(content.contains(" * @property bool $is_active"));

        let mut table = Table::new("drafts");
        let mut body = Column::new("body", ColumnType::Text, "text");
        body.nullable = true;
        table.columns.push(body);
        let content = emit(&table, &[]);
        assert!(content.contains(" * @property string|null $body"));
    }

    #[test]
    fn test_relationship_methods() {
        let relationships = vec![
            Relationship::BelongsTo {
                method: "author".into(),
                related: "User".into(),
                foreign_key: Some("author_id".into()),
                owner_key: None,
                self_referencing: false,
            },
            Relationship::HasMany {
                method: "comments".into(),
                related: "Comment".into(),
                foreign_key: None,
            },
            Relationship::BelongsToMany {
                method: "tags".into(),
                related: "Tag".into(),
                pivot_table: "post_tag".into(),
                pivot_columns: vec!["sort_order".into()],
            },
            Relationship::MorphTo {
                method: "commentable".into(),
                type_column: "commentable_type".into(),
                id_column: "commentable_id".into(),
            },
        ];
        let mut table = Table::new("posts");
        table.columns.push(Column::new("id", ColumnType::BigInteger, "bigint"));
        let content = emit(&table, &relationships);

        assert!(content.contains("public function author()"));
        assert!(content.contains("return $this->belongsTo(User::class, 'author_id');"));
        assert!(content.contains("return $this->hasMany(Comment::class);"));
        assert!(content.contains(
            "return $this->belongsToMany(Tag::class, 'post_tag')->withPivot('sort_order');"
        ));
        assert!(content.contains("return $this->morphTo();"));
    }

    #[test]
    fn test_boolean_scope() {
        let content = emit(&make_users(), &[]);
        assert!(content.contains("public function scopeActive($query)"));
        assert!(content.contains("return $query->where('is_active', true);"));
    }

    #[test]
    fn test_soft_deletes_trait_and_sorted_imports() {
        let mut table = make_users();
        let mut deleted = Column::new("deleted_at", ColumnType::Timestamp, "timestamp");
        deleted.nullable = true;
        table.columns.push(deleted);

        let content = emit(&table, &[]);
        assert!(content.contains("use SoftDeletes;"));
        let model_pos = content.find("use Illuminate\\Database\\Eloquent\\Model;").unwrap();
        let trait_pos = content
            .find("use Illuminate\\Database\\Eloquent\\SoftDeletes;")
            .unwrap();
        assert!(model_pos < trait_pos);
    }

    #[test]
    fn test_stub_filename() {
        let (models, formatting) = make_config();
        let type_map = TypeMap::builder().build();
        let file = ModelEmitter::new(&models, &formatting, &type_map)
            .generate(&make_users(), &[]);
        assert_eq!(file.name, "User.php");
    }
}
