//! Dependency binding for expressions.
//!
//! During the second pass every expression receives two table sets: the
//! tables it reads directly, and the physical tables it ultimately depends
//! on once derived tables are looked through. Subqueries depend on the outer
//! columns they reference; their own tables stay inside.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::trace;

use crate::error::{Result, SqlsemError};
use crate::parser::ast::{ComparisonOp, Expr, ExprKind, NodeId, SelectExpr, StarExpr};
use crate::parser::walk::{Cursor, Node};

use super::config::EqualityClosure;
use super::scoper::{Resolution, Scoper};
use super::semtable::{ColumnName, SubqueryInfo};
use super::table_info::{ColumnSource, TableInfo};
use super::table_set::TableSet;

/// Column references resolved inside one SELECT or UNION, including the ones
/// of everything nested in it.
#[derive(Debug, Clone, Default)]
struct Frame {
    /// Tables declared in FROM clauses at any depth.
    declared: TableSet,
    /// (direct, base) dependencies of every resolved column.
    leaves: Vec<(TableSet, TableSet)>,
}

pub(crate) struct Binder {
    pub(crate) direct: BTreeMap<NodeId, TableSet>,
    pub(crate) recursive: BTreeMap<NodeId, TableSet>,
    /// Column expression -> what it resolved to.
    pub(crate) bindings: BTreeMap<NodeId, Resolution>,
    pub(crate) subqueries: BTreeMap<NodeId, Vec<NodeId>>,
    pub(crate) subquery_info: BTreeMap<NodeId, SubqueryInfo>,
    pub(crate) equalities: ColumnEqualities,
    frames: Vec<Frame>,
    finished: BTreeMap<NodeId, Frame>,
    statements: Vec<NodeId>,
    /// Expressions that are top-level conjuncts of a WHERE or ON clause.
    conjuncts: BTreeSet<NodeId>,
}

impl Binder {
    pub(crate) fn new(closure: EqualityClosure) -> Self {
        Binder {
            direct: BTreeMap::new(),
            recursive: BTreeMap::new(),
            bindings: BTreeMap::new(),
            subqueries: BTreeMap::new(),
            subquery_info: BTreeMap::new(),
            equalities: ColumnEqualities::new(closure),
            frames: Vec::new(),
            finished: BTreeMap::new(),
            statements: Vec::new(),
            conjuncts: BTreeSet::new(),
        }
    }

    pub(crate) fn down(&mut self, cursor: &Cursor<'_>, scoper: &Scoper, tables: &[TableInfo]) -> Result<()> {
        match cursor.node {
            Node::Select(_) | Node::Union(_) => {
                let id = cursor.node.id().unwrap_or_default();
                let declared = scoper
                    .statement_scope(id)
                    .map(|scope| scoper.tables_in(scope))
                    .unwrap_or_default();
                self.statements.push(id);
                self.frames.push(Frame {
                    declared,
                    leaves: Vec::new(),
                });
            }
            Node::SelectExpr(SelectExpr::Star(StarExpr {
                qualifier: Some(qualifier),
            })) => {
                let visible = self
                    .statements
                    .last()
                    .and_then(|id| scoper.statement_scope(*id))
                    .map(|scope| scoper.tables_in(scope))
                    .unwrap_or_default();
                let known = visible
                    .iter()
                    .any(|table| tables.get(table).is_some_and(|info| info.matches(qualifier)));
                if !known {
                    return Err(SqlsemError::UnresolvedReference(format!(
                        "table {qualifier} not found"
                    )));
                }
            }
            Node::Where(expr) => {
                self.conjuncts.insert(expr.id);
            }
            Node::JoinCondition(condition) => {
                if let Some(on) = &condition.on {
                    self.conjuncts.insert(on.id);
                }
            }
            Node::Expr(expr) => match &expr.kind {
                ExprKind::Column(col) => {
                    let resolution = scoper.resolve_column(col, tables)?;
                    let (direct, base) = self.resolution_deps(resolution, &col.name, tables);
                    trace!(column = %col, node = %expr.id, %direct, %base, "bound column");
                    if let Some(frame) = self.frames.last_mut() {
                        frame.leaves.push((direct.clone(), base.clone()));
                    }
                    self.bindings.insert(expr.id, resolution);
                    self.direct.insert(expr.id, direct);
                    self.recursive.insert(expr.id, base);
                }
                ExprKind::And(left, right) if self.conjuncts.contains(&expr.id) => {
                    self.conjuncts.insert(left.id);
                    self.conjuncts.insert(right.id);
                }
                ExprKind::Comparison {
                    op: ComparisonOp::Eq,
                    left,
                    right,
                } if self.conjuncts.contains(&expr.id) => {
                    self.remember_equality(left, right, scoper, tables);
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn up(&mut self, cursor: &Cursor<'_>) {
        match cursor.node {
            Node::Select(_) | Node::Union(_) => {
                let id = self.statements.pop().unwrap_or_default();
                let frame = self.frames.pop().unwrap_or_default();
                if let Some(parent) = self.frames.last_mut() {
                    parent.declared.merge_in_place(&frame.declared);
                    parent.leaves.extend(frame.leaves.iter().cloned());
                }
                self.finished.insert(id, frame);
            }
            Node::Expr(expr) => self.bind_compound(expr),
            _ => {}
        }
    }

    /// Records empty dependencies for a column whose resolution failed.
    pub(crate) fn mark_unbound(&mut self, expr: NodeId) {
        self.direct.insert(expr, TableSet::empty());
        self.recursive.insert(expr, TableSet::empty());
    }

    fn deps_of(&self, expr: NodeId) -> (TableSet, TableSet) {
        (
            self.direct.get(&expr).cloned().unwrap_or_default(),
            self.recursive.get(&expr).cloned().unwrap_or_default(),
        )
    }

    fn resolution_deps(&self, resolution: Resolution, column: &str, tables: &[TableInfo]) -> (TableSet, TableSet) {
        match resolution {
            Resolution::Alias { expr } => self.deps_of(expr),
            Resolution::Column { table, .. } => {
                let direct = TableSet::single(table);
                let Some(TableInfo::Derived(derived)) = tables.get(table) else {
                    return (direct.clone(), direct);
                };
                let base = match tables[table].column(column) {
                    Some(ColumnSource::Derived(source)) => self
                        .recursive
                        .get(&source.id)
                        .cloned()
                        .unwrap_or_else(|| derived.inner_tables.clone()),
                    _ => derived.inner_tables.clone(),
                };
                (direct, base)
            }
        }
    }

    fn bind_compound(&mut self, expr: &Expr) {
        let (direct, base) = match &expr.kind {
            ExprKind::Column(_) => return,
            ExprKind::Literal(_) | ExprKind::Variable(_) => (TableSet::empty(), TableSet::empty()),
            ExprKind::Subquery(subquery) | ExprKind::Exists(subquery) => {
                let inner = Node::statement(&subquery.select).id().unwrap_or_default();
                self.bind_subquery(expr.id, inner)
            }
            ExprKind::Func(func) => {
                let mut direct = TableSet::empty();
                let mut base = TableSet::empty();
                for arg in &func.args {
                    if let SelectExpr::Aliased(aliased) = arg {
                        let (d, b) = self.deps_of(aliased.expr.id);
                        direct.merge_in_place(&d);
                        base.merge_in_place(&b);
                    }
                }
                (direct, base)
            }
            _ => {
                let mut direct = TableSet::empty();
                let mut base = TableSet::empty();
                for child in expr.children() {
                    let (d, b) = self.deps_of(child.id);
                    direct.merge_in_place(&d);
                    base.merge_in_place(&b);
                }
                (direct, base)
            }
        };
        self.direct.insert(expr.id, direct);
        self.recursive.insert(expr.id, base);
    }

    fn bind_subquery(&mut self, subquery: NodeId, inner: NodeId) -> (TableSet, TableSet) {
        let mut direct = TableSet::empty();
        let mut base = TableSet::empty();
        if let Some(frame) = self.finished.get(&inner) {
            for (leaf_direct, leaf_base) in &frame.leaves {
                if !leaf_direct.is_subset_of(&frame.declared) {
                    direct.merge_in_place(&leaf_direct.difference(&frame.declared));
                    base.merge_in_place(leaf_base);
                }
            }
        }

        let outer = self.statements.last().copied().unwrap_or_default();
        let correlated = !direct.is_empty();
        trace!(node = %subquery, %outer, correlated, "bound subquery");
        self.subqueries.entry(outer).or_default().push(subquery);
        self.subquery_info.insert(
            subquery,
            SubqueryInfo {
                outer_select: outer,
                inner_select: inner,
                correlated,
            },
        );
        (direct, base)
    }

    fn column_key(&self, expr: &Expr, scoper: &Scoper, tables: &[TableInfo]) -> Option<ColumnName> {
        let col = expr.as_column()?;
        let resolution = scoper.resolve_column(col, tables).ok()?;
        let (table, _) = self.resolution_deps(resolution, &col.name, tables);
        Some(ColumnName::new(table, &col.name))
    }

    fn remember_equality(&mut self, left: &Expr, right: &Expr, scoper: &Scoper, tables: &[TableInfo]) {
        let left_key = self.column_key(left, scoper, tables);
        let right_key = self.column_key(right, scoper, tables);
        match (left_key, right_key) {
            (Some(l), Some(r)) => self.equalities.add_columns(l, left, r, right),
            (Some(l), None) if matches!(right.kind, ExprKind::Literal(_)) => {
                self.equalities.add_value(l, left, right);
            }
            (None, Some(r)) if matches!(left.kind, ExprKind::Literal(_)) => {
                self.equalities.add_value(r, right, left);
            }
            _ => {}
        }
    }
}

/// Column equalities collected from WHERE and ON conjuncts.
#[derive(Debug, Default)]
pub(crate) struct ColumnEqualities {
    closure: EqualityClosure,
    pub(crate) known: BTreeMap<ColumnName, Vec<Expr>>,
    /// First expression seen for each column.
    representative: BTreeMap<ColumnName, Expr>,
    links: BTreeMap<ColumnName, BTreeSet<ColumnName>>,
    values: BTreeMap<ColumnName, Vec<Expr>>,
}

fn push_unique(list: &mut Vec<Expr>, expr: &Expr) {
    let printed = expr.to_string();
    if !list.iter().any(|known| known.to_string() == printed) {
        list.push(expr.clone());
    }
}

impl ColumnEqualities {
    fn new(closure: EqualityClosure) -> Self {
        ColumnEqualities {
            closure,
            ..Self::default()
        }
    }

    fn add_columns(&mut self, left: ColumnName, left_expr: &Expr, right: ColumnName, right_expr: &Expr) {
        if left == right {
            return;
        }
        self.representative.entry(left.clone()).or_insert_with(|| left_expr.clone());
        self.representative.entry(right.clone()).or_insert_with(|| right_expr.clone());
        self.links.entry(left.clone()).or_default().insert(right.clone());
        self.links.entry(right.clone()).or_default().insert(left.clone());
        match self.closure {
            EqualityClosure::Pairwise => {
                push_unique(self.known.entry(left).or_default(), right_expr);
                push_unique(self.known.entry(right).or_default(), left_expr);
            }
            EqualityClosure::Transitive => self.close_over(&left),
        }
    }

    fn add_value(&mut self, column: ColumnName, column_expr: &Expr, value: &Expr) {
        self.representative.entry(column.clone()).or_insert_with(|| column_expr.clone());
        push_unique(self.values.entry(column.clone()).or_default(), value);
        match self.closure {
            EqualityClosure::Pairwise => push_unique(self.known.entry(column).or_default(), value),
            EqualityClosure::Transitive => self.close_over(&column),
        }
    }

    /// Rewrites the lists of every column connected to `start`.
    fn close_over(&mut self, start: &ColumnName) {
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(column) = queue.pop_front() {
            if !component.insert(column.clone()) {
                continue;
            }
            if let Some(linked) = self.links.get(&column) {
                queue.extend(linked.iter().cloned());
            }
        }

        let mut values = Vec::new();
        for column in &component {
            for value in self.values.get(column).into_iter().flatten() {
                push_unique(&mut values, value);
            }
        }
        for column in &component {
            let mut list = Vec::new();
            for other in component.iter().filter(|other| *other != column) {
                if let Some(expr) = self.representative.get(other) {
                    push_unique(&mut list, expr);
                }
            }
            for value in &values {
                push_unique(&mut list, value);
            }
            self.known.insert(column.clone(), list);
        }
    }
}
