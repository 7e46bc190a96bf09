//! Foreign-key dependency engine.
//!
//! Builds the table dependency graph once and answers ordering questions on
//! it: topological resolution, cycle detection with explicit cycle paths,
//! wave batching, level grouping, and root/leaf/pivot classification. The
//! engine borrows the tables and never mutates them; every ordering it
//! returns is stable in the input order of tables.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SchemaError};
use crate::schema::Table;

/// Dependency graph over a table set.
///
/// Edges point from a table to the tables it references. Self-references and
/// references to tables outside the input set carry no edge; duplicate
/// foreign keys to the same target count once.
pub struct DependencyGraph<'a> {
    tables: &'a [Table],
    index: BTreeMap<&'a str, usize>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(tables: &'a [Table]) -> Self {
        let index: BTreeMap<&str, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
        for (i, table) in tables.iter().enumerate() {
            for fk in &table.foreign_keys {
                let Some(&target) = index.get(fk.referenced_table.as_str()) else {
                    continue;
                };
                if target == i || deps[i].contains(&target) {
                    continue;
                }
                deps[i].push(target);
                dependents[target].push(i);
            }
        }

        Self {
            tables,
            index,
            deps,
            dependents,
        }
    }

    /// Topologically order the tables so every referenced table precedes its
    /// referrers. Fails with the first detected cycle; independent tables
    /// keep their input order.
    pub fn resolve(&self) -> Result<Vec<&'a Table>> {
        let cycles = self.detect_circular_dependencies();
        if let Some(first) = cycles.into_iter().next() {
            return Err(SchemaError::CircularDependency { cycle: first });
        }
        Ok(self.sorted_lenient())
    }

    /// Best-effort stable topological order. When the graph is acyclic this
    /// is a true topological order; inside a cycle, the earliest remaining
    /// table is emitted to keep making progress (its in-cycle edges are later
    /// installed by edge-only scripts).
    pub fn sorted_lenient(&self) -> Vec<&'a Table> {
        let n = self.tables.len();
        let mut emitted = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while order.len() < n {
            let mut progressed = false;
            for i in 0..n {
                if emitted[i] || !self.deps[i].iter().all(|&d| emitted[d]) {
                    continue;
                }
                emitted[i] = true;
                order.push(&self.tables[i]);
                progressed = true;
            }
            if !progressed {
                for i in 0..n {
                    if !emitted[i] {
                        emitted[i] = true;
                        order.push(&self.tables[i]);
                        break;
                    }
                }
            }
        }

        order
    }

    /// Every cycle in the graph, as closed node walks (`[a, b, a]`).
    /// Disjoint cycles are each reported once; self-references never count.
    pub fn detect_circular_dependencies(&self) -> Vec<Vec<String>> {
        let n = self.tables.len();
        let mut visited = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut cycles: Vec<Vec<usize>> = Vec::new();

        for start in 0..n {
            if !visited[start] {
                self.dfs_cycles(start, &mut visited, &mut stack, &mut cycles);
            }
        }

        let mut reported: Vec<BTreeSet<usize>> = Vec::new();
        let mut result = Vec::new();
        for cycle in cycles {
            let key: BTreeSet<usize> = cycle.iter().copied().collect();
            if reported.contains(&key) {
                continue;
            }
            reported.push(key);
            result.push(
                cycle
                    .iter()
                    .map(|&i| self.tables[i].name.clone())
                    .collect(),
            );
        }
        result
    }

    fn dfs_cycles(
        &self,
        node: usize,
        visited: &mut [bool],
        stack: &mut Vec<usize>,
        cycles: &mut Vec<Vec<usize>>,
    ) {
        if let Some(pos) = stack.iter().position(|&x| x == node) {
            let mut cycle: Vec<usize> = stack[pos..].to_vec();
            cycle.push(node);
            cycles.push(cycle);
            return;
        }
        if visited[node] {
            return;
        }
        stack.push(node);
        for &dep in &self.deps[node] {
            self.dfs_cycles(dep, visited, stack, cycles);
        }
        stack.pop();
        visited[node] = true;
    }

    /// Group the sorted tables into waves: no table in a wave references
    /// another table in the same wave.
    pub fn group_into_batches(&self) -> Vec<Vec<&'a Table>> {
        let mut batches: Vec<Vec<&Table>> = Vec::new();
        let mut current: Vec<&Table> = Vec::new();
        let mut current_names: BTreeSet<&str> = BTreeSet::new();

        for table in self.sorted_lenient() {
            let i = self.index[table.name.as_str()];
            let references_current = self.deps[i]
                .iter()
                .any(|&d| current_names.contains(self.tables[d].name.as_str()));
            if references_current {
                batches.push(std::mem::take(&mut current));
                current_names.clear();
            }
            current_names.insert(table.name.as_str());
            current.push(table);
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    /// Iterative fixed-point level assignment: level 0 holds tables with no
    /// in-set dependencies; level k holds tables whose every dependency sits
    /// below k. Tables on a cycle never stabilize and receive no level.
    pub fn group_by_level(&self) -> BTreeMap<usize, Vec<String>> {
        let n = self.tables.len();
        let mut level: Vec<Option<usize>> = vec![None; n];

        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..n {
                if level[i].is_some() {
                    continue;
                }
                if self.deps[i].is_empty() {
                    level[i] = Some(0);
                    changed = true;
                    continue;
                }
                let mut max = 0;
                let mut all_assigned = true;
                for &d in &self.deps[i] {
                    match level[d] {
                        Some(l) => max = max.max(l),
                        None => {
                            all_assigned = false;
                            break;
                        }
                    }
                }
                if all_assigned {
                    level[i] = Some(max + 1);
                    changed = true;
                }
            }
        }

        let mut map: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for i in 0..n {
            if let Some(l) = level[i] {
                map.entry(l).or_default().push(self.tables[i].name.clone());
            }
        }
        map
    }

    /// Tables with no in-set dependencies, pivots excluded.
    pub fn root_tables(&self) -> Vec<&'a Table> {
        self.tables
            .iter()
            .enumerate()
            .filter(|(i, t)| self.deps[*i].is_empty() && !self.is_pivot(t))
            .map(|(_, t)| t)
            .collect()
    }

    /// Tables no other in-set table references, pivots excluded.
    pub fn leaf_tables(&self) -> Vec<&'a Table> {
        self.tables
            .iter()
            .enumerate()
            .filter(|(i, t)| self.dependents[*i].is_empty() && !self.is_pivot(t))
            .map(|(_, t)| t)
            .collect()
    }

    /// Tables satisfying the pivot predicate, in input order.
    pub fn pivot_tables(&self) -> Vec<&'a Table> {
        self.tables.iter().filter(|t| self.is_pivot(t)).collect()
    }

    /// The pivot predicate: exactly two foreign keys, both targets in the
    /// input set, a `left_right` style name, and no columns beyond the two
    /// keys, an `id`, the timestamp pair and one extra.
    pub fn is_pivot(&self, table: &Table) -> bool {
        if table.foreign_keys.len() != 2 {
            return false;
        }
        if !table
            .foreign_keys
            .iter()
            .all(|fk| self.index.contains_key(fk.referenced_table.as_str()))
        {
            return false;
        }
        if !is_join_name(&table.name) {
            return false;
        }

        let mut allowed = 2 + 1;
        if table.column("id").is_some() {
            allowed += 1;
        }
        if table.has_timestamps() {
            allowed += 2;
        }
        table.columns.len() <= allowed
    }

    /// True iff installing an edge `from -> to` would close a cycle, i.e. a
    /// path from `to` back to `from` already exists.
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        let (Some(&f), Some(&t)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        if f == t {
            return false;
        }
        let mut seen = vec![false; self.tables.len()];
        let mut stack = vec![t];
        while let Some(x) = stack.pop() {
            if x == f {
                return true;
            }
            if seen[x] {
                continue;
            }
            seen[x] = true;
            stack.extend(self.deps[x].iter().copied());
        }
        false
    }
}

/// Two non-empty lowercase alphanumeric segments joined by one underscore.
fn is_join_name(name: &str) -> bool {
    let mut parts = name.split('_');
    let (Some(left), Some(right), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let ok = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    };
    ok(left) && ok(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, FkAction, ForeignKey, Table};

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

    fn names(tables: &[&Table]) -> Vec<String> {
        tables.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn test_resolve_orders_referenced_first() {
        let tables = vec![
            make_test_table("comments", &[("post_id", "posts"), ("user_id", "users")]),
            make_test_table("posts", &[("user_id", "users")]),
            make_test_table("users", &[]),
        ];
        let graph = DependencyGraph::new(&tables);
        let order = names(&graph.resolve().unwrap());
        assert_eq!(order, vec!["users", "posts", "comments"]);
    }

    #[test]
    fn test_resolve_is_stable_without_edges() {
        let tables = vec![
            make_test_table("zebras", &[]),
            make_test_table("apples", &[]),
            make_test_table("mangos", &[]),
        ];
        let graph = DependencyGraph::new(&tables);
        let order = names(&graph.resolve().unwrap());
        assert_eq!(order, vec!["zebras", "apples", "mangos"]);
    }

    #[test]
    fn test_resolve_skips_self_references() {
        let tables = vec![make_test_table("categories", &[("parent_id", "categories")])];
        let graph = DependencyGraph::new(&tables);
        let order = names(&graph.resolve().unwrap());
        assert_eq!(order, vec!["categories"]);
        assert!(graph.detect_circular_dependencies().is_empty());
    }

    #[test]
    fn test_resolve_ignores_external_references() {
        let tables = vec![make_test_table("posts", &[("tenant_id", "tenants")])];
        let graph = DependencyGraph::new(&tables);
        assert_eq!(names(&graph.resolve().unwrap()), vec!["posts"]);
    }

    #[test]
    fn test_cycle_detection_reports_closed_walk() {
        let tables = vec![
            make_test_table("a", &[("b_id", "b")]),
            make_test_table("b", &[("a_id", "a")]),
        ];
        let graph = DependencyGraph::new(&tables);
        let cycles = graph.detect_circular_dependencies();
        assert_eq!(cycles, vec![vec!["a".to_string(), "b".into(), "a".into()]]);

        match graph.resolve() {
            Err(SchemaError::CircularDependency { cycle }) => {
                assert_eq!(cycle, vec!["a".to_string(), "b".into(), "a".into()]);
            }
            other => panic!("expected CircularDependency, got {:?}", other.map(|t| names(&t))),
        }
    }

    #[test]
    fn test_disjoint_cycles_each_reported_once() {
        let tables = vec![
            make_test_table("a", &[("b_id", "b")]),
            make_test_table("b", &[("a_id", "a")]),
            make_test_table("c", &[("d_id", "d")]),
            make_test_table("d", &[("c_id", "c")]),
        ];
        let graph = DependencyGraph::new(&tables);
        let cycles = graph.detect_circular_dependencies();
        assert_eq!(cycles.len(), 2);
    }

    #[test]
    fn test_batches_never_reference_within_wave() {
        let tables = vec![
            make_test_table("users", &[]),
            make_test_table("posts", &[("user_id", "users")]),
            make_test_table("tags", &[]),
        ];
        let graph = DependencyGraph::new(&tables);
        let batches = graph.group_into_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(names(&batches[0]), vec!["users"]);
        assert_eq!(names(&batches[1]), vec!["posts", "tags"]);
    }

    #[test]
    fn test_group_by_level_fixed_point() {
        let tables = vec![
            make_test_table("comments", &[("post_id", "posts")]),
            make_test_table("posts", &[("user_id", "users")]),
            make_test_table("users", &[]),
            make_test_table("tags", &[]),
        ];
        let graph = DependencyGraph::new(&tables);
        let levels = graph.group_by_level();
        assert_eq!(levels[&0], vec!["users".to_string(), "tags".into()]);
        assert_eq!(levels[&1], vec!["posts".to_string()]);
        assert_eq!(levels[&2], vec!["comments".to_string()]);
    }

    #[test]
    fn test_group_by_level_leaves_cycles_unassigned() {
        let tables = vec![
            make_test_table("a", &[("b_id", "b")]),
            make_test_table("b", &[("a_id", "a")]),
            make_test_table("solo", &[]),
        ];
        let graph = DependencyGraph::new(&tables);
        let levels = graph.group_by_level();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[&0], vec!["solo".to_string()]);
    }

    #[test]
    fn test_duplicate_foreign_keys_count_once() {
        let mut table = make_test_table("posts", &[("user_id", "users"), ("editor_id", "users")]);
        assert_eq!(table.foreign_keys.len(), 2);
        table.columns.push(Column::new("x", ColumnType::Integer, "int"));
        let tables = vec![table, make_test_table("users", &[])];
        let graph = DependencyGraph::new(&tables);
        let levels = graph.group_by_level();
        assert_eq!(levels[&1], vec!["posts".to_string()]);
    }

    fn make_pivot() -> Table {
        let mut pivot = make_test_table("post_tag", &[("post_id", "posts"), ("tag_id", "tags")]);
        // make_test_table adds an id column; pivots commonly have just the two keys
        pivot.columns.retain(|c| c.name != "id");
        pivot
    }

    #[test]
    fn test_pivot_classification() {
        let tables = vec![
            make_test_table("posts", &[]),
            make_test_table("tags", &[]),
            make_pivot(),
        ];
        let graph = DependencyGraph::new(&tables);
        assert_eq!(names(&graph.pivot_tables()), vec!["post_tag"]);
    }

    #[test]
    fn test_pivot_requires_join_style_name() {
        let mut odd = make_pivot();
        odd.name = "memberships".into();
        for fk in &mut odd.foreign_keys {
            fk.name = fk.name.replace("post_tag", "memberships");
        }
        let tables = vec![
            make_test_table("posts", &[]),
            make_test_table("tags", &[]),
            odd,
        ];
        let graph = DependencyGraph::new(&tables);
        assert!(graph.pivot_tables().is_empty());
    }

    #[test]
    fn test_pivot_rejects_wide_tables() {
        let mut wide = make_pivot();
        for i in 0..4 {
            wide.columns
                .push(Column::new(format!("extra_{}", i), ColumnType::String, "varchar"));
        }
        let tables = vec![
            make_test_table("posts", &[]),
            make_test_table("tags", &[]),
            wide,
        ];
        let graph = DependencyGraph::new(&tables);
        assert!(graph.pivot_tables().is_empty());
    }

    #[test]
    fn test_pivot_is_neither_root_nor_leaf() {
        let tables = vec![
            make_test_table("posts", &[]),
            make_test_table("tags", &[]),
            make_pivot(),
        ];
        let graph = DependencyGraph::new(&tables);
        assert!(!names(&graph.root_tables()).contains(&"post_tag".to_string()));
        assert!(!names(&graph.leaf_tables()).contains(&"post_tag".to_string()));
    }

    #[test]
    fn test_would_create_cycle() {
        let tables = vec![
            make_test_table("users", &[]),
            make_test_table("posts", &[("user_id", "users")]),
        ];
        let graph = DependencyGraph::new(&tables);
        assert!(graph.would_create_cycle("users", "posts"));
        assert!(!graph.would_create_cycle("posts", "users"));
        assert!(!graph.would_create_cycle("posts", "posts"));
        assert!(!graph.would_create_cycle("posts", "elsewhere"));
    }
}
