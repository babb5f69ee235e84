//! Column metadata of the tables a statement reads from.

use std::sync::Arc;

use crate::catalog::TableSchema;
use crate::error::{Result, SqlsemError};
use crate::parser::ast::{AliasedExpr, Expr, ExprKind, NodeId, SelectExpr, TableName};
use crate::types::SqlType;

use super::table_set::TableSet;

/// A table registered by the analyzer.
#[derive(Debug, Clone)]
pub enum TableInfo {
    /// Table known to the schema.
    Physical(PhysicalTable),
    /// Table synthesized from the projection of a derived table.
    Derived(DerivedTableInfo),
}

/// A schema table referenced in FROM.
#[derive(Debug, Clone)]
pub struct PhysicalTable {
    /// The `AliasedTableExpr` that introduced the table.
    pub node: NodeId,
    /// Table name as written, including any database qualifier.
    pub name: TableName,
    pub alias: Option<String>,
    /// Database the table was looked up in.
    pub database: String,
    pub schema: Arc<TableSchema>,
}

/// A derived table `(select ...) as alias`.
#[derive(Debug, Clone)]
pub struct DerivedTableInfo {
    pub node: NodeId,
    pub alias: Option<String>,
    /// Id of the SELECT that produces the rows.
    pub select: NodeId,
    pub columns: Vec<DerivedColumn>,
    /// True if the projection still holds a `*` that could not be expanded.
    pub has_star: bool,
    /// Physical tables read by the inner SELECT.
    pub inner_tables: TableSet,
}

/// Column of a derived table and the expression that produces it.
#[derive(Debug, Clone)]
pub struct DerivedColumn {
    pub name: String,
    pub expr: Expr,
}

/// What a table knows about a column it was asked for.
#[derive(Debug, Clone, Copy)]
pub enum ColumnSource<'a> {
    /// Column of a schema table; the type is known.
    Physical(SqlType),
    /// Column of a derived table, produced by the given expression.
    Derived(&'a Expr),
    /// The table's column list is incomplete and may contain the column.
    Unknown,
}

/// Returns the name a projection item exposes to an enclosing query.
///
/// The explicit alias wins, then the bare name of a column reference,
/// then the printed expression.
#[must_use]
pub fn projected_name(aliased: &AliasedExpr) -> String {
    if let Some(alias) = &aliased.alias {
        return alias.clone();
    }
    match &aliased.expr.kind {
        ExprKind::Column(col) => col.name.clone(),
        _ => aliased.expr.to_string(),
    }
}

impl DerivedTableInfo {
    /// Builds the column list of a derived table from its projection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if two columns share a name.
    pub fn from_projection(
        node: NodeId,
        alias: Option<String>,
        select: NodeId,
        exprs: &[SelectExpr],
        inner_tables: TableSet,
    ) -> Result<Self> {
        let mut info = DerivedTableInfo {
            node,
            alias,
            select,
            columns: Vec::new(),
            has_star: false,
            inner_tables,
        };
        info.refresh_columns(exprs)?;
        Ok(info)
    }

    /// Rebuilds the column list from `exprs`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if two columns share a name.
    pub fn refresh_columns(&mut self, exprs: &[SelectExpr]) -> Result<()> {
        let mut columns: Vec<DerivedColumn> = Vec::with_capacity(exprs.len());
        let mut has_star = false;
        for select_expr in exprs {
            match select_expr {
                SelectExpr::Star(_) => has_star = true,
                SelectExpr::Aliased(aliased) => {
                    let name = projected_name(aliased);
                    if columns.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
                        return Err(SqlsemError::InvalidArgument(format!(
                            "Duplicate column name '{name}'"
                        )));
                    }
                    columns.push(DerivedColumn {
                        name,
                        expr: aliased.expr.clone(),
                    });
                }
            }
        }
        self.columns = columns;
        self.has_star = has_star;
        Ok(())
    }
}

impl TableInfo {
    /// Returns the id of the FROM item that introduced the table.
    #[must_use]
    pub fn node(&self) -> NodeId {
        match self {
            TableInfo::Physical(table) => table.node,
            TableInfo::Derived(table) => table.node,
        }
    }

    /// Returns the name the table is referred to by inside the query.
    #[must_use]
    pub fn table_name(&self) -> TableName {
        match self {
            TableInfo::Physical(table) => match &table.alias {
                Some(alias) => TableName::new(alias.clone()),
                None => table.name.clone(),
            },
            TableInfo::Derived(table) => TableName::new(table.alias.clone().unwrap_or_default()),
        }
    }

    /// Returns true if the table may be referred to as `qualifier`.
    ///
    /// Table names are compared case-sensitively. A database-qualified
    /// reference only matches an unaliased physical table of that database.
    #[must_use]
    pub fn matches(&self, qualifier: &TableName) -> bool {
        match self {
            TableInfo::Physical(table) => match (&table.alias, &qualifier.qualifier) {
                (Some(alias), None) => *alias == qualifier.name,
                (Some(_), Some(_)) => false,
                (None, None) => table.name.name == qualifier.name,
                (None, Some(db)) => table.name.name == qualifier.name && *db == table.database,
            },
            TableInfo::Derived(table) => {
                qualifier.qualifier.is_none() && table.alias.as_deref() == Some(qualifier.name.as_str())
            }
        }
    }

    /// Returns true if the column list covers every column of the table.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        match self {
            TableInfo::Physical(table) => table.schema.authoritative,
            TableInfo::Derived(table) => !table.has_star,
        }
    }

    /// Looks up a column by name, case-insensitively.
    ///
    /// Returns `None` if the table definitely has no such column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<ColumnSource<'_>> {
        let found = match self {
            TableInfo::Physical(table) => table
                .schema
                .get_column(name)
                .map(|column| ColumnSource::Physical(column.sql_type)),
            TableInfo::Derived(table) => table
                .columns
                .iter()
                .find(|column| column.name.eq_ignore_ascii_case(name))
                .map(|column| ColumnSource::Derived(&column.expr)),
        };
        match found {
            Some(source) => Some(source),
            None if !self.is_authoritative() => Some(ColumnSource::Unknown),
            None => None,
        }
    }

    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        match self {
            TableInfo::Physical(table) => table.schema.columns.iter().map(|c| c.name.as_str()).collect(),
            TableInfo::Derived(table) => table.columns.iter().map(|c| c.name.as_str()).collect(),
        }
    }

    /// Returns the derived-table details, if this is a derived table.
    #[must_use]
    pub fn as_derived(&self) -> Option<&DerivedTableInfo> {
        match self {
            TableInfo::Derived(table) => Some(table),
            TableInfo::Physical(_) => None,
        }
    }
}
