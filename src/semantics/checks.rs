//! Constructs rejected before any binding happens.

use crate::error::{Result, SqlsemError};
use crate::parser::ast::{ExprKind, SelectExpr, SelectStatement, SimpleTableExpr, TableExpr};
use crate::parser::walk::{Cursor, Node};

/// Checks run on the way down the first pass.
#[derive(Debug, Default)]
pub(crate) struct ConstructChecks {
    /// Per enclosing SELECT: does it read only from `dual`?
    dual: Vec<bool>,
}

fn reject_into(select: &SelectStatement) -> Result<()> {
    match select {
        SelectStatement::Select(sel) if sel.into.is_some() => Err(SqlsemError::InvalidArgument(
            "Incorrect usage/placement of 'INTO'".into(),
        )),
        _ => Ok(()),
    }
}

impl ConstructChecks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn down(&mut self, cursor: &Cursor<'_>) -> Result<()> {
        match cursor.node {
            Node::Select(sel) => self.dual.push(sel.reads_only_dual()),
            Node::JoinCondition(condition) if condition.using.is_some() => {
                return Err(SqlsemError::Unsupported(
                    "unsupported: join with USING(column_list) clause for complex queries".into(),
                ));
            }
            Node::TableExpr(TableExpr::Join(join)) if join.kind.is_natural() => {
                return Err(SqlsemError::Unsupported(format!(
                    "unsupported: {}",
                    join.kind.as_str()
                )));
            }
            Node::TableExpr(TableExpr::Aliased(aliased)) => {
                if let SimpleTableExpr::Derived(derived) = &aliased.expr {
                    reject_into(&derived.select)?;
                }
            }
            Node::Expr(expr) => match &expr.kind {
                ExprKind::Subquery(subquery) | ExprKind::Exists(subquery) => {
                    if let SelectStatement::Union(_) = &subquery.select {
                        return Err(SqlsemError::not_yet_supported(
                            "semantics::checks::subquery_body",
                            format!("{} in subquery", subquery.select.kind_name()),
                        ));
                    }
                    reject_into(&subquery.select)?;
                }
                ExprKind::Func(func) => {
                    if func.is_locking() && !self.dual.last().copied().unwrap_or(true) {
                        return Err(SqlsemError::Unsupported(format!("{func} allowed only with dual")));
                    }
                    let single_arg = matches!(func.args.as_slice(), [SelectExpr::Aliased(_)]);
                    if func.distinct && !single_arg {
                        return Err(SqlsemError::InvalidArgument(format!("syntax error: {func}")));
                    }
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn up(&mut self, cursor: &Cursor<'_>) {
        if let Node::Select(_) = cursor.node {
            self.dual.pop();
        }
    }
}
