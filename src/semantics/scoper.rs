//! Lexical scopes and column name resolution.
//!
//! Every SELECT and UNION owns a scope. Each FROM item gets a temporary scope
//! without a parent while it is walked, so join conditions only see the
//! tables of their own join; the temporary tables are merged into the SELECT
//! scope when the item is left. A derived table's SELECT has no parent
//! scope either. ORDER BY, GROUP BY and HAVING push an extra scope holding the
//! projection's aliases on top of the SELECT scope.
//!
//! Scopes are created during the first pass and re-entered by id during the
//! second pass, which performs the lookups.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{Result, SqlsemError};
use crate::parser::ast::{ColName, NodeId, Select, SelectExpr, TableExpr, Union};
use crate::parser::walk::{Cursor, Node};

use super::table_info::{projected_name, ColumnSource, TableInfo};
use super::table_set::TableSet;

pub(crate) type ScopeId = usize;

/// Name usable in ORDER BY / GROUP BY / HAVING that refers to a projection item.
#[derive(Debug, Clone)]
struct ProjectionAlias {
    name: String,
    expr: NodeId,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<ScopeId>,
    /// Indices into the analyzer's table list.
    tables: Vec<usize>,
    aliases: Vec<ProjectionAlias>,
}

/// Outcome of resolving a column reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// The column belongs to a table. `certain` is false when the table's
    /// column list is incomplete and the column was assumed to exist.
    Column { table: usize, certain: bool },
    /// The name refers to a projection item of the enclosing SELECT.
    Alias { expr: NodeId },
}

#[derive(Debug, Default)]
pub(crate) struct Scoper {
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
    /// SELECT / UNION id -> scope.
    statement_scopes: BTreeMap<NodeId, ScopeId>,
    /// Left-most table of a FROM item -> temporary scope of the item.
    from_scopes: BTreeMap<NodeId, ScopeId>,
}

/// Returns the id of the left-most table of a FROM item.
fn leftmost_table(table_expr: &TableExpr) -> Option<NodeId> {
    match table_expr {
        TableExpr::Aliased(aliased) => Some(aliased.id),
        TableExpr::Join(join) => leftmost_table(&join.left),
        TableExpr::Paren(exprs) => exprs.first().and_then(leftmost_table),
    }
}

/// Returns true if the cursor is a FROM item directly below a SELECT.
fn is_from_item(cursor: &Cursor<'_>) -> bool {
    matches!(
        (cursor.node, cursor.parent),
        (Node::TableExpr(_), Some(Node::Select(_)))
    )
}

/// Returns true if the cursor is a clause that can refer to projection aliases.
fn is_alias_clause(cursor: &Cursor<'_>) -> bool {
    match (cursor.node, cursor.parent) {
        (Node::OrderBy(_) | Node::GroupBy(_) | Node::Having(_), Some(Node::Select(_))) => true,
        (Node::OrderBy(_), Some(Node::Union(_))) => true,
        _ => false,
    }
}

fn select_aliases(sel: &Select) -> Vec<ProjectionAlias> {
    sel.exprs
        .iter()
        .filter_map(|select_expr| match select_expr {
            SelectExpr::Aliased(aliased) => aliased.alias.as_ref().map(|alias| ProjectionAlias {
                name: alias.clone(),
                expr: aliased.expr.id,
            }),
            SelectExpr::Star(_) => None,
        })
        .collect()
}

fn union_aliases(union: &Union) -> Vec<ProjectionAlias> {
    union
        .left
        .first_select()
        .exprs
        .iter()
        .filter_map(|select_expr| match select_expr {
            SelectExpr::Aliased(aliased) => Some(ProjectionAlias {
                name: projected_name(aliased),
                expr: aliased.expr.id,
            }),
            SelectExpr::Star(_) => None,
        })
        .collect()
}

impl Scoper {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            ..Scope::default()
        });
        self.scopes.len() - 1
    }

    /// Returns the innermost scope of the walk.
    pub(crate) fn current(&self) -> Option<ScopeId> {
        self.stack.last().copied()
    }

    fn pop(&mut self) -> Result<ScopeId> {
        self.stack
            .pop()
            .ok_or_else(|| SqlsemError::Internal("unbalanced scopes".into()))
    }

    /// Returns the scope owned by a SELECT or UNION.
    pub(crate) fn statement_scope(&self, statement: NodeId) -> Option<ScopeId> {
        self.statement_scopes.get(&statement).copied()
    }

    /// Returns the tables declared directly in a scope.
    pub(crate) fn tables_in(&self, scope: ScopeId) -> TableSet {
        self.scopes
            .get(scope)
            .map(|s| s.tables.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the tables declared by every SELECT / UNION, keyed by its id.
    pub(crate) fn statement_tables(&self) -> BTreeMap<NodeId, TableSet> {
        self.statement_scopes
            .iter()
            .map(|(statement, scope)| (*statement, self.tables_in(*scope)))
            .collect()
    }

    // ------------------------------------------------------------------
    // First pass
    // ------------------------------------------------------------------

    pub(crate) fn down(&mut self, cursor: &Cursor<'_>) -> Result<()> {
        match cursor.node {
            Node::Select(_) | Node::Union(_) => {
                let parent = match cursor.parent {
                    Some(Node::DerivedTable(_)) => None,
                    _ => self.current(),
                };
                let scope = self.new_scope(parent);
                if let Some(id) = cursor.node.id() {
                    self.statement_scopes.insert(id, scope);
                }
                self.stack.push(scope);
            }
            Node::TableExpr(table_expr) if is_from_item(cursor) => {
                let scope = self.new_scope(None);
                if let Some(id) = leftmost_table(table_expr) {
                    self.from_scopes.insert(id, scope);
                }
                self.stack.push(scope);
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn up(&mut self, cursor: &Cursor<'_>, tables: &[TableInfo]) -> Result<()> {
        match cursor.node {
            Node::Select(_) | Node::Union(_) => {
                self.pop()?;
            }
            Node::TableExpr(_) if is_from_item(cursor) => {
                let item_scope = self.pop()?;
                let item_tables = self.scopes[item_scope].tables.clone();
                for table in item_tables {
                    self.add_table(table, tables)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Makes `table` visible in the current scope.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if another table of the scope uses the same name.
    pub(crate) fn add_table(&mut self, table: usize, tables: &[TableInfo]) -> Result<()> {
        let Some(scope) = self.current() else {
            return Err(SqlsemError::Internal("table outside of any SELECT".into()));
        };
        let name = tables
            .get(table)
            .map(TableInfo::table_name)
            .unwrap_or_default();
        for existing in &self.scopes[scope].tables {
            let Some(other) = tables.get(*existing).map(TableInfo::table_name) else {
                continue;
            };
            if other.name != name.name {
                continue;
            }
            if other.qualifier.is_none() || name.qualifier.is_none() || other.qualifier == name.qualifier {
                return Err(SqlsemError::InvalidArgument(format!(
                    "Not unique table/alias: '{}'",
                    name.name
                )));
            }
        }
        self.scopes[scope].tables.push(table);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Second pass
    // ------------------------------------------------------------------

    pub(crate) fn down_post(&mut self, cursor: &Cursor<'_>) -> Result<()> {
        match cursor.node {
            Node::Select(_) | Node::Union(_) => {
                let scope = cursor
                    .node
                    .id()
                    .and_then(|id| self.statement_scope(id))
                    .ok_or_else(|| {
                        SqlsemError::not_yet_supported(
                            "semantics::scoper::down_post",
                            "SELECT introduced by a rewrite",
                        )
                    })?;
                self.stack.push(scope);
            }
            Node::TableExpr(table_expr) if is_from_item(cursor) => {
                let scope = leftmost_table(table_expr)
                    .and_then(|id| self.from_scopes.get(&id).copied())
                    .ok_or_else(|| {
                        SqlsemError::not_yet_supported(
                            "semantics::scoper::down_post",
                            "table introduced by a rewrite",
                        )
                    })?;
                self.stack.push(scope);
            }
            _ if is_alias_clause(cursor) => {
                let aliases = match cursor.parent {
                    Some(Node::Select(sel)) => select_aliases(sel),
                    Some(Node::Union(union)) => union_aliases(union),
                    _ => Vec::new(),
                };
                let parent = self.current();
                let scope = self.new_scope(parent);
                self.scopes[scope].aliases = aliases;
                self.stack.push(scope);
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn up_post(&mut self, cursor: &Cursor<'_>) -> Result<()> {
        let pushed = matches!(cursor.node, Node::Select(_) | Node::Union(_))
            || is_from_item(cursor)
            || is_alias_clause(cursor);
        if pushed {
            self.pop()?;
        }
        Ok(())
    }

    /// Resolves a column reference, searching from the innermost scope outwards.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousReference` if the innermost scope that knows the
    /// name offers more than one candidate, and `UnresolvedReference` if no
    /// scope knows it.
    pub(crate) fn resolve_column(&self, col: &ColName, tables: &[TableInfo]) -> Result<Resolution> {
        let ambiguous = || {
            SqlsemError::AmbiguousReference(format!("Column '{col}' in field list is ambiguous"))
        };

        let mut next = self.current();
        while let Some(id) = next {
            let scope = &self.scopes[id];

            if col.qualifier.is_none() {
                let mut matched: Vec<NodeId> = scope
                    .aliases
                    .iter()
                    .filter(|alias| alias.name.eq_ignore_ascii_case(&col.name))
                    .map(|alias| alias.expr)
                    .collect();
                matched.dedup();
                match matched.as_slice() {
                    [] => {}
                    [expr] => return Ok(Resolution::Alias { expr: *expr }),
                    _ => return Err(ambiguous()),
                }
            }

            let mut known = Vec::new();
            let mut unknown = Vec::new();
            for &table in &scope.tables {
                let Some(info) = tables.get(table) else {
                    continue;
                };
                if let Some(qualifier) = &col.qualifier {
                    if !info.matches(qualifier) {
                        continue;
                    }
                }
                match info.column(&col.name) {
                    Some(ColumnSource::Unknown) => unknown.push(table),
                    Some(_) => known.push(table),
                    None => {}
                }
            }

            let resolved = match (known.as_slice(), unknown.as_slice()) {
                ([table], _) => Some(Resolution::Column {
                    table: *table,
                    certain: true,
                }),
                ([_, _, ..], _) | ([], [_, _, ..]) => return Err(ambiguous()),
                ([], [table]) => Some(Resolution::Column {
                    table: *table,
                    certain: false,
                }),
                ([], []) => None,
            };
            if let Some(resolution) = resolved {
                trace!(column = %col, ?resolution, scope = id, "resolved column");
                return Ok(resolution);
            }
            next = scope.parent;
        }

        Err(SqlsemError::UnresolvedReference(format!("symbol {col} not found")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{ColumnDef, TableSchema};
    use crate::parser::ast::TableName;
    use crate::semantics::table_info::PhysicalTable;
    use crate::types::SqlType;

    fn table(name: &str, alias: Option<&str>, columns: &[&str], authoritative: bool) -> TableInfo {
        let mut schema = TableSchema::new(
            name,
            columns
                .iter()
                .map(|c| ColumnDef::new(*c, SqlType::Int64).unwrap())
                .collect(),
        )
        .unwrap();
        if !authoritative {
            schema = schema.non_authoritative();
        }
        TableInfo::Physical(PhysicalTable {
            node: NodeId::UNASSIGNED,
            name: TableName::new(name),
            alias: alias.map(str::to_string),
            database: "main".into(),
            schema: Arc::new(schema),
        })
    }

    fn col(qualifier: Option<&str>, name: &str) -> ColName {
        ColName {
            qualifier: qualifier.map(TableName::new),
            name: name.into(),
        }
    }

    /// Builds `outer` (tables 0, 1) with `inner` (table 2) nested inside.
    fn nested() -> (Scoper, Vec<TableInfo>) {
        let tables = vec![
            table("t1", None, &["a", "b"], true),
            table("t2", None, &["a", "c"], true),
            table("t3", None, &["d"], true),
        ];
        let mut scoper = Scoper::new();
        let outer = scoper.new_scope(None);
        scoper.stack.push(outer);
        scoper.add_table(0, &tables).unwrap();
        scoper.add_table(1, &tables).unwrap();
        let inner = scoper.new_scope(Some(outer));
        scoper.stack.push(inner);
        scoper.add_table(2, &tables).unwrap();
        (scoper, tables)
    }

    #[test]
    fn test_resolves_innermost_then_outer() {
        let (scoper, tables) = nested();
        assert_eq!(
            scoper.resolve_column(&col(None, "d"), &tables).unwrap(),
            Resolution::Column { table: 2, certain: true }
        );
        assert_eq!(
            scoper.resolve_column(&col(None, "B"), &tables).unwrap(),
            Resolution::Column { table: 0, certain: true }
        );
        assert_eq!(
            scoper.resolve_column(&col(Some("t2"), "a"), &tables).unwrap(),
            Resolution::Column { table: 1, certain: true }
        );
    }

    #[test]
    fn test_ambiguous_and_unresolved() {
        let (scoper, tables) = nested();
        let err = scoper.resolve_column(&col(None, "a"), &tables).unwrap_err();
        assert_eq!(
            err,
            SqlsemError::AmbiguousReference("Column 'a' in field list is ambiguous".into())
        );
        let err = scoper.resolve_column(&col(None, "zz"), &tables).unwrap_err();
        assert_eq!(err, SqlsemError::UnresolvedReference("symbol zz not found".into()));
        // table names are case sensitive
        assert!(scoper.resolve_column(&col(Some("T1"), "a"), &tables).is_err());
    }

    #[test]
    fn test_non_authoritative_tables() {
        let tables = vec![
            table("known", None, &["a"], true),
            table("partial", None, &["b"], false),
            table("other", None, &[], false),
        ];
        let mut scoper = Scoper::new();
        let scope = scoper.new_scope(None);
        scoper.stack.push(scope);
        scoper.add_table(0, &tables).unwrap();
        scoper.add_table(1, &tables).unwrap();

        // a known column wins over a maybe
        assert_eq!(
            scoper.resolve_column(&col(None, "a"), &tables).unwrap(),
            Resolution::Column { table: 0, certain: true }
        );
        // only one table may hold the column
        assert_eq!(
            scoper.resolve_column(&col(None, "x"), &tables).unwrap(),
            Resolution::Column { table: 1, certain: false }
        );

        scoper.add_table(2, &tables).unwrap();
        assert!(matches!(
            scoper.resolve_column(&col(None, "x"), &tables),
            Err(SqlsemError::AmbiguousReference(_))
        ));
        assert_eq!(
            scoper.resolve_column(&col(Some("other"), "x"), &tables).unwrap(),
            Resolution::Column { table: 2, certain: false }
        );
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let tables = vec![
            table("t1", Some("x"), &["a"], true),
            table("t2", Some("x"), &["a"], true),
        ];
        let mut scoper = Scoper::new();
        let scope = scoper.new_scope(None);
        scoper.stack.push(scope);
        scoper.add_table(0, &tables).unwrap();
        let err = scoper.add_table(1, &tables).unwrap_err();
        assert_eq!(err, SqlsemError::InvalidArgument("Not unique table/alias: 'x'".into()));
    }

    #[test]
    fn test_alias_scope_shadows_tables() {
        let (mut scoper, tables) = nested();
        let parent = scoper.current();
        let alias_scope = scoper.new_scope(parent);
        scoper.scopes[alias_scope].aliases = vec![ProjectionAlias {
            name: "total".into(),
            expr: NodeId(42),
        }];
        scoper.stack.push(alias_scope);

        assert_eq!(
            scoper.resolve_column(&col(None, "TOTAL"), &tables).unwrap(),
            Resolution::Alias { expr: NodeId(42) }
        );
        assert_eq!(
            scoper.resolve_column(&col(None, "d"), &tables).unwrap(),
            Resolution::Column { table: 2, certain: true }
        );
    }
}
