//! Registers the tables of a statement as their FROM items are left.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::catalog::{SchemaInformation, TableSchema};
use crate::error::{Result, SqlsemError};
use crate::parser::ast::{NodeId, SelectStatement, SimpleTableExpr, TableExpr, TableName};
use crate::parser::walk::{Cursor, Node};

use super::scoper::Scoper;
use super::table_info::{DerivedTableInfo, PhysicalTable, TableInfo};
use super::table_set::TableSet;

pub(crate) struct TableCollector<'s> {
    schema: &'s dyn SchemaInformation,
    current_db: String,
    /// Position is the table's identity in every [`TableSet`].
    pub(crate) tables: Vec<TableInfo>,
    /// `AliasedTableExpr` id -> table.
    pub(crate) by_node: BTreeMap<NodeId, usize>,
}

impl<'s> TableCollector<'s> {
    pub(crate) fn new(schema: &'s dyn SchemaInformation, current_db: &str) -> Self {
        TableCollector {
            schema,
            current_db: current_db.to_string(),
            tables: Vec::new(),
            by_node: BTreeMap::new(),
        }
    }

    /// Returns the physical tables behind `set`, looking through derived tables.
    pub(crate) fn base_tables(&self, set: &TableSet) -> TableSet {
        let mut base = TableSet::empty();
        for table in set.iter() {
            match self.tables.get(table) {
                Some(TableInfo::Derived(derived)) => base.merge_in_place(&derived.inner_tables),
                Some(TableInfo::Physical(_)) => base.insert(table),
                None => {}
            }
        }
        base
    }

    /// Registers the table of an `AliasedTableExpr` and returns its index.
    ///
    /// Returns `Ok(None)` for every other node.
    pub(crate) fn up(&mut self, cursor: &Cursor<'_>, scoper: &Scoper) -> Result<Option<usize>> {
        let Node::TableExpr(TableExpr::Aliased(aliased)) = cursor.node else {
            return Ok(None);
        };

        let info = match &aliased.expr {
            SimpleTableExpr::Table(name) => {
                let database = name.qualifier.clone().unwrap_or_else(|| self.current_db.clone());
                let schema = self.lookup(&database, name)?;
                TableInfo::Physical(PhysicalTable {
                    node: aliased.id,
                    name: name.clone(),
                    alias: aliased.alias.clone(),
                    database,
                    schema,
                })
            }
            SimpleTableExpr::Derived(derived) => {
                let SelectStatement::Select(sel) = &derived.select else {
                    return Err(SqlsemError::not_yet_supported(
                        "semantics::table_collector::derived_table",
                        "union in derived table",
                    ));
                };
                let declared = scoper
                    .statement_scope(sel.id)
                    .map(|scope| scoper.tables_in(scope))
                    .unwrap_or_default();
                TableInfo::Derived(DerivedTableInfo::from_projection(
                    aliased.id,
                    aliased.alias.clone(),
                    sel.id,
                    &sel.exprs,
                    self.base_tables(&declared),
                )?)
            }
        };

        let index = self.tables.len();
        trace!(table = index, name = %info.table_name(), node = %aliased.id, "registered table");
        self.tables.push(info);
        self.by_node.insert(aliased.id, index);
        Ok(Some(index))
    }

    /// Rebuilds the columns of a derived table from its rewritten projection.
    pub(crate) fn up_post(&mut self, cursor: &Cursor<'_>) -> Result<()> {
        let Node::TableExpr(TableExpr::Aliased(aliased)) = cursor.node else {
            return Ok(());
        };
        let SimpleTableExpr::Derived(derived) = &aliased.expr else {
            return Ok(());
        };
        let SelectStatement::Select(sel) = &derived.select else {
            return Ok(());
        };
        let index = self.by_node.get(&aliased.id).copied();
        if let Some(TableInfo::Derived(info)) = index.and_then(|i| self.tables.get_mut(i)) {
            info.refresh_columns(&sel.exprs)?;
        }
        Ok(())
    }

    fn lookup(&self, database: &str, name: &TableName) -> Result<Arc<TableSchema>> {
        if let Some(schema) = self.schema.find_table(database, &name.name)? {
            return Ok(schema);
        }
        if name.qualifier.is_none() && name.name.eq_ignore_ascii_case("dual") {
            return Ok(Arc::new(TableSchema::new(name.name.clone(), Vec::new())?));
        }
        Err(SqlsemError::UnresolvedReference(format!("table {name} not found")))
    }
}
