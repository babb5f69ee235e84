//! Replaces `*` and `t.*` projections with explicit column references.

use crate::error::Result;
use crate::parser::ast::{
    AliasedExpr, Expr, ExprKind, NodeId, Select, SelectExpr, SelectStatement, SimpleTableExpr,
    StarExpr, TableExpr, TableName,
};
use crate::semantics::{projected_name, SemTable, TableInfo};

/// Expands the stars of every SELECT in `stmt`, innermost first.
///
/// A star stays in place when one of the tables it covers has an incomplete
/// column list, or is a derived table whose own projection kept its star.
///
/// # Errors
///
/// Never fails today; the signature matches the analyzer's rewrite step.
pub fn expand_star(stmt: &mut SelectStatement, semtable: &SemTable) -> Result<()> {
    match stmt {
        SelectStatement::Select(sel) => expand_select(sel, semtable),
        SelectStatement::Union(union) => {
            expand_star(&mut union.left, semtable)?;
            expand_star(&mut union.right, semtable)
        }
    }
}

fn expand_select(sel: &mut Select, semtable: &SemTable) -> Result<()> {
    for table_expr in &mut sel.from {
        expand_table_expr(table_expr, semtable)?;
    }
    for select_expr in &mut sel.exprs {
        if let SelectExpr::Aliased(aliased) = select_expr {
            expand_expr(&mut aliased.expr, semtable)?;
        }
    }
    for expr in sel
        .where_clause
        .iter_mut()
        .chain(sel.having.iter_mut())
        .chain(sel.group_by.iter_mut())
    {
        expand_expr(expr, semtable)?;
    }
    for order in &mut sel.order_by {
        expand_expr(&mut order.expr, semtable)?;
    }

    if !sel.exprs.iter().any(|e| matches!(e, SelectExpr::Star(_))) {
        return Ok(());
    }
    let mut exprs = Vec::with_capacity(sel.exprs.len());
    for select_expr in std::mem::take(&mut sel.exprs) {
        match select_expr {
            SelectExpr::Star(star) => match star_columns(&star, sel, semtable) {
                Some(columns) => exprs.extend(columns),
                None => exprs.push(SelectExpr::Star(star)),
            },
            aliased => exprs.push(aliased),
        }
    }
    sel.exprs = exprs;
    Ok(())
}

fn expand_table_expr(table_expr: &mut TableExpr, semtable: &SemTable) -> Result<()> {
    match table_expr {
        TableExpr::Aliased(aliased) => match &mut aliased.expr {
            SimpleTableExpr::Derived(derived) => expand_star(&mut derived.select, semtable),
            SimpleTableExpr::Table(_) => Ok(()),
        },
        TableExpr::Join(join) => {
            expand_table_expr(&mut join.left, semtable)?;
            expand_table_expr(&mut join.right, semtable)?;
            match &mut join.condition.on {
                Some(on) => expand_expr(on, semtable),
                None => Ok(()),
            }
        }
        TableExpr::Paren(exprs) => exprs
            .iter_mut()
            .try_for_each(|table_expr| expand_table_expr(table_expr, semtable)),
    }
}

/// Expands the subqueries nested in an expression.
fn expand_expr(expr: &mut Expr, semtable: &SemTable) -> Result<()> {
    match &mut expr.kind {
        ExprKind::Subquery(subquery) | ExprKind::Exists(subquery) => {
            expand_star(&mut subquery.select, semtable)
        }
        ExprKind::Column(_) | ExprKind::Literal(_) | ExprKind::Variable(_) => Ok(()),
        ExprKind::Binary { left, right, .. }
        | ExprKind::Comparison { left, right, .. }
        | ExprKind::And(left, right)
        | ExprKind::Or(left, right) => {
            expand_expr(left, semtable)?;
            expand_expr(right, semtable)
        }
        ExprKind::Not(inner) | ExprKind::Unary { expr: inner, .. } | ExprKind::IsNull { expr: inner, .. } => {
            expand_expr(inner, semtable)
        }
        ExprKind::Func(func) => func.args.iter_mut().try_for_each(|arg| match arg {
            SelectExpr::Aliased(aliased) => expand_expr(&mut aliased.expr, semtable),
            SelectExpr::Star(_) => Ok(()),
        }),
        ExprKind::Tuple(exprs) => exprs.iter_mut().try_for_each(|e| expand_expr(e, semtable)),
    }
}

/// Returns the projection of a derived table's SELECT as it is now.
fn derived_projection(from: &[TableExpr], node: NodeId) -> Option<&[SelectExpr]> {
    from.iter().find_map(|table_expr| match table_expr {
        TableExpr::Aliased(aliased) if aliased.id == node => match &aliased.expr {
            SimpleTableExpr::Derived(derived) => derived.select.as_select().map(|s| s.exprs.as_slice()),
            SimpleTableExpr::Table(_) => None,
        },
        TableExpr::Aliased(_) => None,
        TableExpr::Join(join) => derived_projection(std::slice::from_ref(&join.left), node)
            .or_else(|| derived_projection(std::slice::from_ref(&join.right), node)),
        TableExpr::Paren(exprs) => derived_projection(exprs, node),
    })
}

fn star_columns(star: &StarExpr, sel: &Select, semtable: &SemTable) -> Option<Vec<SelectExpr>> {
    let mut columns = Vec::new();
    for table in semtable.tables_in_select(sel.id).iter() {
        let info = semtable.table_info(table)?;
        if let Some(qualifier) = &star.qualifier {
            if !info.matches(qualifier) {
                continue;
            }
        }
        let names: Vec<String> = match info {
            TableInfo::Physical(physical) if physical.schema.authoritative => {
                physical.schema.columns.iter().map(|c| c.name.clone()).collect()
            }
            TableInfo::Physical(_) => return None,
            // the provisional column list predates the inner expansion
            TableInfo::Derived(_) => {
                let projection = derived_projection(&sel.from, info.node())?;
                let mut names = Vec::with_capacity(projection.len());
                for select_expr in projection {
                    match select_expr {
                        SelectExpr::Aliased(aliased) => names.push(projected_name(aliased)),
                        SelectExpr::Star(_) => return None,
                    }
                }
                names
            }
        };
        let qualifier: TableName = info.table_name();
        columns.extend(names.into_iter().map(|name| {
            SelectExpr::Aliased(AliasedExpr::new(Expr::column(Some(qualifier.clone()), name)))
        }));
    }
    if columns.is_empty() {
        return None;
    }
    Some(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ColumnDef, TableSchema};
    use crate::error::SqlsemError;
    use crate::parser::parse_query;
    use crate::rewrite::no_rewrite;
    use crate::semantics::analyze;
    use crate::types::SqlType;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let user = TableSchema::new(
            "user",
            vec![
                ColumnDef::new("id", SqlType::Int64).unwrap(),
                ColumnDef::new("name", SqlType::VarChar).unwrap(),
            ],
        )
        .unwrap();
        let music = TableSchema::new("music", vec![ColumnDef::new("id", SqlType::Int64).unwrap()])
            .unwrap()
            .non_authoritative();
        catalog.create_table("ks", user).unwrap();
        catalog.create_table("ks", music).unwrap();
        catalog
    }

    fn expanded(sql: &str) -> String {
        let mut stmt = parse_query(sql).unwrap();
        analyze(&mut stmt, "ks", &catalog(), expand_star).unwrap();
        stmt.to_string()
    }

    #[test]
    fn test_expands_physical_tables() {
        assert_eq!(expanded("select * from user"), "select user.id, user.name from user");
        assert_eq!(
            expanded("select u.* , 1 from user as u"),
            "select u.id, u.name, 1 from user as u"
        );
    }

    #[test]
    fn test_expands_derived_tables() {
        assert_eq!(
            expanded("select * from (select * from user) as d"),
            "select d.id, d.name from (select user.id, user.name from user) as d"
        );
        assert_eq!(
            expanded("select d.* from (select id as x from user) as d"),
            "select d.x from (select id as x from user) as d"
        );
    }

    #[test]
    fn test_keeps_star_of_incomplete_tables() {
        assert_eq!(expanded("select * from music"), "select * from music");
        assert_eq!(
            expanded("select user.* from user, music"),
            "select user.id, user.name from user, music"
        );
        assert_eq!(
            expanded("select * from user, music"),
            "select * from user, music"
        );
    }

    #[test]
    fn test_expands_subqueries() {
        assert_eq!(
            expanded("select id from user where exists (select * from user as u2)"),
            "select id from user where exists (select u2.id, u2.name from user as u2)"
        );
    }

    #[test]
    fn test_unknown_star_qualifier_is_rejected() {
        for (sql, table) in [("select nope.* from user", "nope"), ("select u.* from user", "u")] {
            let expected = SqlsemError::UnresolvedReference(format!("table {table} not found"));
            let mut stmt = parse_query(sql).unwrap();
            let err = analyze(&mut stmt, "ks", &catalog(), no_rewrite).unwrap_err();
            assert_eq!(err, expected, "{sql}");
            let mut stmt = parse_query(sql).unwrap();
            let err = analyze(&mut stmt, "ks", &catalog(), expand_star).unwrap_err();
            assert_eq!(err, expected, "{sql}");
        }
        // an incomplete table still resolves its qualifier
        assert_eq!(expanded("select music.* from music"), "select music.* from music");
    }
}
