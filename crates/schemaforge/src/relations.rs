//! Relationship inference over the foreign-key graph.
//!
//! For one table against the full set, the detector emits the relationships
//! a generated data-access stub should declare: owning side for each of the
//! table's own foreign keys, the referred-to side for every inbound foreign
//! key, many-to-many through join tables, and polymorphic pairs inferred from
//! column naming. Output order is fixed (owning, referred-to, many-to-many,
//! polymorphic; input order within each group) so stub emission is
//! deterministic.

use serde::Serialize;

use crate::graph::DependencyGraph;
use crate::naming;
use crate::schema::Table;

/// One inferred relationship. Key fields are populated only when the key
/// deviates from convention; the stub emitter then passes them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Relationship {
    /// This table owns a foreign key to `related`.
    BelongsTo {
        method: String,
        related: String,
        foreign_key: Option<String>,
        owner_key: Option<String>,
        self_referencing: bool,
    },
    /// Another table holds a unique foreign key to this one.
    HasOne {
        method: String,
        related: String,
        foreign_key: Option<String>,
    },
    /// Another table holds a plural foreign key to this one.
    HasMany {
        method: String,
        related: String,
        foreign_key: Option<String>,
    },
    /// Joined to `related` through the `pivot_table`.
    BelongsToMany {
        method: String,
        related: String,
        pivot_table: String,
        pivot_columns: Vec<String>,
    },
    /// A `{name}_type` / `{name}_id` column pair.
    MorphTo {
        method: String,
        type_column: String,
        id_column: String,
    },
}

impl Relationship {
    pub fn method(&self) -> &str {
        match self {
            Relationship::BelongsTo { method, .. }
            | Relationship::HasOne { method, .. }
            | Relationship::HasMany { method, .. }
            | Relationship::BelongsToMany { method, .. }
            | Relationship::MorphTo { method, .. } => method,
        }
    }
}

/// Detector configuration.
#[derive(Debug, Clone)]
pub struct RelationshipDetector {
    detect_polymorphic: bool,
}

impl Default for RelationshipDetector {
    fn default() -> Self {
        Self {
            detect_polymorphic: true,
        }
    }
}

impl RelationshipDetector {
    pub fn new(detect_polymorphic: bool) -> Self {
        Self { detect_polymorphic }
    }

    /// Detect every relationship of `table` against the full set.
    pub fn detect(&self, table: &Table, all: &[Table]) -> Vec<Relationship> {
        let graph = DependencyGraph::new(all);
        let mut relationships = Vec::new();

        self.detect_belongs_to(table, all, &mut relationships);
        self.detect_has(table, all, &graph, &mut relationships);
        self.detect_belongs_to_many(table, all, &graph, &mut relationships);
        if self.detect_polymorphic {
            self.detect_morph_to(table, &mut relationships);
        }

        relationships
    }

    /// One owning relationship per foreign key whose target is in the set.
    fn detect_belongs_to(&self, table: &Table, all: &[Table], out: &mut Vec<Relationship>) {
        for fk in &table.foreign_keys {
            let Some(target) = all.iter().find(|t| t.name == fk.referenced_table) else {
                continue;
            };
            let local = &fk.columns[0];
            let method = naming::fk_to_relation(local);

            let conventional_fk =
                format!("{}_id", naming::to_snake_case(&naming::singular_relation(&target.name)));
            let foreign_key = (local != &conventional_fk).then(|| local.clone());
            let owner_key = (fk.referenced_columns[0] != "id")
                .then(|| fk.referenced_columns[0].clone());

            out.push(Relationship::BelongsTo {
                method,
                related: naming::table_to_model(&target.name),
                foreign_key,
                owner_key,
                self_referencing: target.name == table.name,
            });
        }
    }

    /// One referred-to relationship per inbound foreign key, unless the
    /// referring table is a pivot (the many-to-many rule subsumes it).
    fn detect_has(
        &self,
        table: &Table,
        all: &[Table],
        graph: &DependencyGraph<'_>,
        out: &mut Vec<Relationship>,
    ) {
        for other in all {
            if other.name == table.name || graph.is_pivot(other) {
                continue;
            }
            for fk in &other.foreign_keys {
                if fk.referenced_table != table.name {
                    continue;
                }
                let fk_column = &fk.columns[0];
                let conventional_fk =
                    format!("{}_id", naming::to_snake_case(&naming::singular_relation(&table.name)));
                let foreign_key = (fk_column != &conventional_fk).then(|| fk_column.clone());
                let related = naming::table_to_model(&other.name);

                if other.has_unique_index_on(fk_column) {
                    out.push(Relationship::HasOne {
                        method: naming::singular_relation(&other.name),
                        related,
                        foreign_key,
                    });
                } else {
                    out.push(Relationship::HasMany {
                        method: naming::plural_relation(&other.name),
                        related,
                        foreign_key,
                    });
                }
            }
        }
    }

    /// One many-to-many relationship per pivot joining this table to another.
    fn detect_belongs_to_many(
        &self,
        table: &Table,
        all: &[Table],
        graph: &DependencyGraph<'_>,
        out: &mut Vec<Relationship>,
    ) {
        for pivot in all {
            if !graph.is_pivot(pivot) {
                continue;
            }
            let targets: Vec<&str> = pivot
                .foreign_keys
                .iter()
                .map(|fk| fk.referenced_table.as_str())
                .collect();
            if !targets.contains(&table.name.as_str()) {
                continue;
            }
            let Some(&other) = targets.iter().find(|&&t| t != table.name) else {
                continue;
            };

            let key_columns: Vec<&str> = pivot
                .foreign_keys
                .iter()
                .flat_map(|fk| fk.columns.iter().map(String::as_str))
                .collect();
            let pivot_columns: Vec<String> = pivot
                .columns
                .iter()
                .filter(|c| {
                    !key_columns.contains(&c.name.as_str())
                        && !matches!(c.name.as_str(), "id" | "created_at" | "updated_at")
                })
                .map(|c| c.name.clone())
                .collect();

            out.push(Relationship::BelongsToMany {
                method: naming::plural_relation(other),
                related: naming::table_to_model(other),
                pivot_table: pivot.name.clone(),
                pivot_columns,
            });
        }
    }

    /// A `{name}_type` / `{name}_id` pair declares a polymorphic owner.
    fn detect_morph_to(&self, table: &Table, out: &mut Vec<Relationship>) {
        for column in &table.columns {
            let Some(base) = column.name.strip_suffix("_type") else {
                continue;
            };
            let id_column = format!("{}_id", base);
            if table.column(&id_column).is_some() {
                out.push(Relationship::MorphTo {
                    method: naming::to_camel_case(base),
                    type_column: column.name.clone(),
                    id_column,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, FkAction, ForeignKey, Index, IndexKind};

    fn make_test_table(name: &str, fks: &[(&str, &str)]) -> Table {
        let mut table = Table::new(name);
        table
            .columns
            .push(Column::new("id", ColumnType::BigInteger, "bigint"));
        for (column, target) in fks {
            table
                .columns
                .push(Column::new(*column, ColumnType::BigInteger, "bigint"));
            table.foreign_keys.push(ForeignKey {
                name: format!("{}_{}_foreign", name, column),
                columns: vec![column.to_string()],
                referenced_table: target.to_string(),
                referenced_columns: vec!["id".to_string()],
                on_delete: FkAction::Restrict,
                on_update: FkAction::NoAction,
            });
        }
        table
    }

    #[test]
    fn test_belongs_to_and_has_many_pair() {
        let all = vec![
            make_test_table("users", &[]),
            make_test_table("posts", &[("user_id", "users")]),
        ];
        let detector = RelationshipDetector::default();

        let on_posts = detector.detect(&all[1], &all);
        assert_eq!(
            on_posts,
            vec![Relationship::BelongsTo {
                method: "user".into(),
                related: "User".into(),
                foreign_key: None,
                owner_key: None,
                self_referencing: false,
            }]
        );

        let on_users = detector.detect(&all[0], &all);
        assert_eq!(
            on_users,
            vec![Relationship::HasMany {
                method: "posts".into(),
                related: "Post".into(),
                foreign_key: None,
            }]
        );
    }

    #[test]
    fn test_deviant_foreign_key_is_reported() {
        let all = vec![
            make_test_table("users", &[]),
            make_test_table("posts", &[("author_id", "users")]),
        ];
        let detector = RelationshipDetector::default();

        let on_posts = detector.detect(&all[1], &all);
        assert_eq!(
            on_posts,
            vec![Relationship::BelongsTo {
                method: "author".into(),
                related: "User".into(),
                foreign_key: Some("author_id".into()),
                owner_key: None,
                self_referencing: false,
            }]
        );

        let on_users = detector.detect(&all[0], &all);
        assert_eq!(
            on_users,
            vec![Relationship::HasMany {
                method: "posts".into(),
                related: "Post".into(),
                foreign_key: Some("author_id".into()),
            }]
        );
    }

    #[test]
    fn test_unique_inbound_key_yields_has_one() {
        let users = make_test_table("users", &[]);
        let mut profiles = make_test_table("profiles", &[("user_id", "users")]);
        profiles.indexes.push(Index {
            name: "profiles_user_id_unique".into(),
            kind: IndexKind::Unique,
            columns: vec!["user_id".into()],
            algorithm: None,
        });
        let all = vec![users, profiles];
        let detector = RelationshipDetector::default();

        let on_users = detector.detect(&all[0], &all);
        assert_eq!(
            on_users,
            vec![Relationship::HasOne {
                method: "profile".into(),
                related: "Profile".into(),
                foreign_key: None,
            }]
        );
    }

    #[test]
    fn test_pivot_subsumes_has_many() {
        let posts = make_test_table("posts", &[]);
        let tags = make_test_table("tags", &[]);
        let mut pivot = make_test_table("post_tag", &[("post_id", "posts"), ("tag_id", "tags")]);
        pivot.columns.retain(|c| c.name != "id");
        let all = vec![posts, tags, pivot];
        let detector = RelationshipDetector::default();

        let on_posts = detector.detect(&all[0], &all);
        assert_eq!(
            on_posts,
            vec![Relationship::BelongsToMany {
                method: "tags".into(),
                related: "Tag".into(),
                pivot_table: "post_tag".into(),
                pivot_columns: vec![],
            }]
        );

        let on_tags = detector.detect(&all[1], &all);
        assert_eq!(
            on_tags,
            vec![Relationship::BelongsToMany {
                method: "posts".into(),
                related: "Post".into(),
                pivot_table: "post_tag".into(),
                pivot_columns: vec![],
            }]
        );
    }

    #[test]
    fn test_pivot_extra_columns_are_surfaced() {
        let posts = make_test_table("posts", &[]);
        let tags = make_test_table("tags", &[]);
        let mut pivot = make_test_table("post_tag", &[("post_id", "posts"), ("tag_id", "tags")]);
        pivot.columns.retain(|c| c.name != "id");
        pivot
            .columns
            .push(Column::new("sort_order", ColumnType::Integer, "int"));
        let all = vec![posts, tags, pivot];
        let detector = RelationshipDetector::default();

        let on_posts = detector.detect(&all[0], &all);
        match &on_posts[0] {
            Relationship::BelongsToMany { pivot_columns, .. } => {
                assert_eq!(pivot_columns, &vec!["sort_order".to_string()]);
            }
            other => panic!("expected BelongsToMany, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_flagged() {
        let all = vec![make_test_table("categories", &[("parent_id", "categories")])];
        let detector = RelationshipDetector::default();
        let rels = detector.detect(&all[0], &all);
        // the inbound side of a self-reference is not re-reported
        assert_eq!(
            rels,
            vec![Relationship::BelongsTo {
                method: "parent".into(),
                related: "Category".into(),
                foreign_key: Some("parent_id".into()),
                owner_key: None,
                self_referencing: true,
            }]
        );
    }

    #[test]
    fn test_polymorphic_pair_detection() {
        let mut images = make_test_table("images", &[]);
        images
            .columns
            .push(Column::new("imageable_type", ColumnType::String, "varchar"));
        images
            .columns
            .push(Column::new("imageable_id", ColumnType::BigInteger, "bigint"));
        let all = vec![images];

        let detector = RelationshipDetector::default();
        let rels = detector.detect(&all[0], &all);
        assert_eq!(
            rels,
            vec![Relationship::MorphTo {
                method: "imageable".into(),
                type_column: "imageable_type".into(),
                id_column: "imageable_id".into(),
            }]
        );

        let gated = RelationshipDetector::new(false);
        assert!(gated.detect(&all[0], &all).is_empty());
    }
}
