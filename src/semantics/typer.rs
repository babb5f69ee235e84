//! Bottom-up type inference.

use std::collections::BTreeMap;

use crate::parser::ast::{
    BinaryOp, Expr, ExprKind, FuncExpr, Literal, NodeId, SelectExpr, SelectStatement, UnaryOp,
};
use crate::parser::walk::{Cursor, Node};
use crate::types::{arithmetic_result, division_result, integer_division_result, SqlType};

use super::binder::Binder;
use super::scoper::Resolution;
use super::table_info::{ColumnSource, TableInfo};

/// Infers expression types as the second pass leaves each expression.
///
/// Children are always typed before their parent. A type that cannot be
/// determined is left out of the map.
#[derive(Debug, Default)]
pub(crate) struct Typer {
    pub(crate) types: BTreeMap<NodeId, SqlType>,
}

fn literal_type(literal: &Literal) -> SqlType {
    match literal {
        Literal::Int(_) | Literal::Bool(_) => SqlType::Int64,
        Literal::Decimal(_) => SqlType::Decimal,
        Literal::Float(_) => SqlType::Float64,
        Literal::Str(_) => SqlType::VarChar,
        Literal::Null => SqlType::Null,
    }
}

impl Typer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn up(&mut self, cursor: &Cursor<'_>, binder: &Binder, tables: &[TableInfo]) {
        let Node::Expr(expr) = cursor.node else {
            return;
        };
        if let Some(ty) = self.infer(expr, binder, tables) {
            self.types.insert(expr.id, ty);
        }
    }

    fn type_of(&self, expr: &Expr) -> Option<SqlType> {
        self.types.get(&expr.id).copied()
    }

    fn infer(&self, expr: &Expr, binder: &Binder, tables: &[TableInfo]) -> Option<SqlType> {
        match &expr.kind {
            ExprKind::Column(col) => match binder.bindings.get(&expr.id)? {
                Resolution::Alias { expr } => self.types.get(expr).copied(),
                Resolution::Column { table, .. } => match tables.get(*table)?.column(&col.name)? {
                    ColumnSource::Physical(ty) => Some(ty),
                    ColumnSource::Derived(source) => self.type_of(source),
                    ColumnSource::Unknown => None,
                },
            },
            ExprKind::Literal(literal) => Some(literal_type(literal)),
            ExprKind::Binary { op, left, right } => {
                let (left, right) = (self.type_of(left), self.type_of(right));
                match op {
                    BinaryOp::BitAnd
                    | BinaryOp::BitOr
                    | BinaryOp::BitXor
                    | BinaryOp::ShiftLeft
                    | BinaryOp::ShiftRight => Some(SqlType::Uint64),
                    BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Mult | BinaryOp::Mod => {
                        Some(arithmetic_result(left?, right?))
                    }
                    BinaryOp::Div => Some(division_result(left?, right?)),
                    BinaryOp::IntDiv => Some(integer_division_result(left?, right?)),
                }
            }
            ExprKind::Comparison { .. }
            | ExprKind::And(..)
            | ExprKind::Or(..)
            | ExprKind::Not(_)
            | ExprKind::IsNull { .. }
            | ExprKind::Exists(_) => Some(SqlType::Int64),
            ExprKind::Unary { op: UnaryOp::BitNot, .. } => Some(SqlType::Uint64),
            ExprKind::Unary { op: UnaryOp::Minus, expr } => match self.type_of(expr)? {
                ty if ty.is_unsigned() => Some(SqlType::Int64),
                ty => Some(ty),
            },
            ExprKind::Subquery(subquery) => match &subquery.select {
                SelectStatement::Select(sel) => match sel.exprs.as_slice() {
                    [SelectExpr::Aliased(single)] => self.type_of(&single.expr),
                    _ => None,
                },
                SelectStatement::Union(_) => None,
            },
            ExprKind::Func(func) => self.function_type(func),
            ExprKind::Tuple(_) | ExprKind::Variable(_) => None,
        }
    }

    fn function_type(&self, func: &FuncExpr) -> Option<SqlType> {
        let args: Vec<Option<SqlType>> = func
            .args
            .iter()
            .map(|arg| match arg {
                SelectExpr::Aliased(aliased) => self.type_of(&aliased.expr),
                SelectExpr::Star(_) => None,
            })
            .collect();
        let first = args.first().copied().flatten();

        let ty = match func.lowered_name().as_str() {
            "count" => SqlType::Int64,
            "sum" | "avg" => match first {
                Some(ty) if ty.is_float() => SqlType::Float64,
                _ => SqlType::Decimal,
            },
            "min" | "max" | "any_value" | "abs" | "ceil" | "ceiling" | "floor" | "round" => first?,
            "group_concat" => SqlType::Text,
            "bit_and" | "bit_or" | "bit_xor" | "last_insert_id" | "row_count" | "found_rows" => {
                SqlType::Uint64
            }
            "std" | "stddev" | "stddev_pop" | "stddev_samp" | "variance" | "var_pop" | "var_samp"
            | "rand" => SqlType::Float64,
            "concat" | "concat_ws" | "lower" | "lcase" | "upper" | "ucase" | "substr"
            | "substring" | "trim" | "ltrim" | "rtrim" | "replace" | "lpad" | "rpad" | "hex"
            | "database" | "schema" | "user" | "current_user" | "version" => SqlType::VarChar,
            "length" | "char_length" | "character_length" | "locate" | "instr" | "ascii"
            | "get_lock" | "is_free_lock" | "is_used_lock" | "release_all_locks"
            | "release_lock" | "unix_timestamp" => SqlType::Int64,
            "coalesce" | "ifnull" => args.iter().copied().flatten().next()?,
            "if" => args.get(1).copied().flatten()?,
            "now" | "current_timestamp" | "sysdate" | "localtime" | "localtimestamp" => {
                SqlType::Datetime
            }
            "curdate" | "current_date" | "date" => SqlType::Date,
            "curtime" | "current_time" => SqlType::Time,
            name if name.starts_with("json_") => SqlType::Json,
            _ => return None,
        };
        Some(ty)
    }
}
