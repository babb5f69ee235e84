//! The semantic table: the result of analyzing one statement.

use std::collections::BTreeMap;

use crate::error::SqlsemError;
use crate::parser::ast::{AliasedTableExpr, Expr, ExprKind, NodeId, SelectExpr};
use crate::types::SqlType;

use super::table_info::TableInfo;
use super::table_set::TableSet;

/// Identity of a column for equality tracking: the table(s) it was read from
/// and its lower-cased name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnName {
    pub table: TableSet,
    pub column: String,
}

impl ColumnName {
    /// Creates a column identity; the name is lower-cased.
    #[must_use]
    pub fn new(table: TableSet, column: &str) -> Self {
        ColumnName {
            table,
            column: column.to_ascii_lowercase(),
        }
    }
}

/// Where a subquery sits and whether it reads columns of enclosing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubqueryInfo {
    /// SELECT or UNION containing the subquery expression.
    pub outer_select: NodeId,
    /// SELECT or UNION forming the body of the subquery.
    pub inner_select: NodeId,
    pub correlated: bool,
}

/// Analysis result consumed by the plan builder.
///
/// Built once per successful analysis and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SemTable {
    pub(crate) tables: Vec<TableInfo>,
    /// `AliasedTableExpr` id -> index into `tables`.
    pub(crate) table_nodes: BTreeMap<NodeId, usize>,
    pub(crate) direct: BTreeMap<NodeId, TableSet>,
    pub(crate) recursive: BTreeMap<NodeId, TableSet>,
    pub(crate) expr_types: BTreeMap<NodeId, SqlType>,
    /// SELECT / UNION id -> tables declared in its FROM clause.
    pub(crate) statement_tables: BTreeMap<NodeId, TableSet>,
    pub(crate) subqueries: BTreeMap<NodeId, Vec<NodeId>>,
    pub(crate) subquery_info: BTreeMap<NodeId, SubqueryInfo>,
    pub(crate) column_equalities: BTreeMap<ColumnName, Vec<Expr>>,
    pub(crate) comments: Vec<String>,
    pub(crate) projection_error: Option<SqlsemError>,
}

impl SemTable {
    /// Returns every table of the statement, indexed by table identity.
    #[must_use]
    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    #[must_use]
    pub fn table_info(&self, table: usize) -> Option<&TableInfo> {
        self.tables.get(table)
    }

    /// Returns the identity of the table introduced by a FROM item.
    #[must_use]
    pub fn table_set_for(&self, table_expr: &AliasedTableExpr) -> TableSet {
        self.table_nodes
            .get(&table_expr.id)
            .map(|table| TableSet::single(*table))
            .unwrap_or_default()
    }

    /// Returns the tables an expression reads directly.
    ///
    /// Nodes the analysis never saw, such as ones built by a later rewrite,
    /// get the union of their children.
    #[must_use]
    pub fn direct_deps(&self, expr: &Expr) -> TableSet {
        Self::deps(&self.direct, expr)
    }

    /// Returns the physical tables an expression ultimately depends on.
    #[must_use]
    pub fn recursive_deps(&self, expr: &Expr) -> TableSet {
        Self::deps(&self.recursive, expr)
    }

    fn deps(map: &BTreeMap<NodeId, TableSet>, expr: &Expr) -> TableSet {
        if let Some(deps) = map.get(&expr.id) {
            return deps.clone();
        }
        let mut deps = TableSet::empty();
        match &expr.kind {
            ExprKind::Func(func) => {
                for arg in &func.args {
                    if let SelectExpr::Aliased(aliased) = arg {
                        deps.merge_in_place(&Self::deps(map, &aliased.expr));
                    }
                }
            }
            _ => {
                for child in expr.children() {
                    deps.merge_in_place(&Self::deps(map, child));
                }
            }
        }
        deps
    }

    /// Returns the inferred type of an expression, if one could be determined.
    #[must_use]
    pub fn type_for(&self, expr: &Expr) -> Option<SqlType> {
        self.expr_types.get(&expr.id).copied()
    }

    /// Returns the tables declared in the FROM clause of a SELECT, including
    /// those of nested FROM items but not of subqueries.
    #[must_use]
    pub fn tables_in_select(&self, select: NodeId) -> TableSet {
        self.statement_tables.get(&select).cloned().unwrap_or_default()
    }

    /// Returns the subquery expressions found directly in a SELECT.
    #[must_use]
    pub fn subqueries_of(&self, select: NodeId) -> &[NodeId] {
        self.subqueries.get(&select).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn subquery_info(&self, subquery: NodeId) -> Option<&SubqueryInfo> {
        self.subquery_info.get(&subquery)
    }

    /// Returns the expressions known to be equal to a column.
    #[must_use]
    pub fn column_equalities(&self, column: &ColumnName) -> &[Expr] {
        self.column_equalities
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns every recorded column equality.
    #[must_use]
    pub fn all_column_equalities(&self) -> &BTreeMap<ColumnName, Vec<Expr>> {
        &self.column_equalities
    }

    /// Returns the comments following the first SELECT keyword.
    #[must_use]
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Returns the ambiguity error deferred from a projection list, if any.
    ///
    /// The plan builder reports it only if it cannot merge the tables
    /// involved into a single route.
    #[must_use]
    pub fn projection_error(&self) -> Option<&SqlsemError> {
        self.projection_error.as_ref()
    }

    #[must_use]
    pub fn direct_dependencies(&self) -> &BTreeMap<NodeId, TableSet> {
        &self.direct
    }

    #[must_use]
    pub fn recursive_dependencies(&self) -> &BTreeMap<NodeId, TableSet> {
        &self.recursive
    }

    #[must_use]
    pub fn expr_types(&self) -> &BTreeMap<NodeId, SqlType> {
        &self.expr_types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{BinaryOp, Literal};

    #[test]
    fn test_deps_fall_back_to_children() {
        let mut left = Expr::column(None, "a");
        left.id = NodeId(1);
        let mut right = Expr::column(None, "b");
        right.id = NodeId(2);
        let sum = Expr::new(ExprKind::Binary {
            op: BinaryOp::Plus,
            left: Box::new(left),
            right: Box::new(right),
        });

        let mut semtable = SemTable::default();
        semtable.direct.insert(NodeId(1), TableSet::single(0));
        semtable.direct.insert(NodeId(2), TableSet::single(3));

        assert_eq!(semtable.direct_deps(&sum), [0, 3].into_iter().collect());
        assert!(semtable.recursive_deps(&sum).is_empty());
        assert!(semtable.direct_deps(&Expr::literal(Literal::Null)).is_empty());
    }

    #[test]
    fn test_missing_entries_are_empty() {
        let semtable = SemTable::default();
        assert!(semtable.subqueries_of(NodeId(7)).is_empty());
        assert!(semtable.tables_in_select(NodeId(7)).is_empty());
        assert!(semtable
            .column_equalities(&ColumnName::new(TableSet::single(0), "x"))
            .is_empty());
        assert!(semtable.projection_error().is_none());
    }
}
