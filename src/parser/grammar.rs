//! Pest parser integration for the SELECT grammar.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::error::{Result, SqlsemError};
use crate::parser::ast::{
    AliasedExpr, AliasedTableExpr, BinaryOp, ColName, ComparisonOp, DerivedTable, Expr, ExprKind,
    FuncExpr, JoinCondition, JoinKind, JoinTableExpr, Limit, Literal, NodeId, Order, Select,
    SelectExpr, SelectInto, SelectStatement, SimpleTableExpr, StarExpr, Subquery, TableExpr,
    TableName, UnaryOp, Union,
};

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct SqlParser;

/// Parses a SELECT or UNION statement.
///
/// Every node of the returned tree carries [`NodeId::UNASSIGNED`].
///
/// # Errors
///
/// Returns a `ParseError` if the query is syntactically invalid.
pub fn parse_query(query: &str) -> Result<SelectStatement> {
    let mut pairs = SqlParser::parse(Rule::query, query).map_err(|e| {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c))
            | pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        SqlsemError::ParseError {
            line,
            col,
            message: e.variant.message().to_string(),
        }
    })?;

    let query = next_pair(&mut pairs, "query")?;
    for inner in query.into_inner() {
        if inner.as_rule() == Rule::select_statement {
            return build_select_statement(inner);
        }
    }
    Err(missing("statement"))
}

fn missing(what: &str) -> SqlsemError {
    SqlsemError::ParseError {
        line: 0,
        col: 0,
        message: format!("Expected {what}"),
    }
}

fn unexpected(pair: &Pair<Rule>) -> SqlsemError {
    let (line, col) = pair.as_span().start_pos().line_col();
    SqlsemError::ParseError {
        line,
        col,
        message: format!("Unexpected {:?} '{}'", pair.as_rule(), pair.as_str()),
    }
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>> {
    pairs.next().ok_or_else(|| missing(what))
}

// ============================================================================
// Statements
// ============================================================================

fn build_select_statement(pair: Pair<Rule>) -> Result<SelectStatement> {
    let mut inner = pair.into_inner();
    let mut stmt = build_union_operand(next_pair(&mut inner, "SELECT")?)?;
    let mut order_by = Vec::new();
    let mut limit = None;
    let mut into = None;

    while let Some(next) = inner.next() {
        match next.as_rule() {
            Rule::union_op => {
                let distinct = !next.into_inner().any(|p| p.as_rule() == Rule::kw_all);
                let right = build_union_operand(next_pair(&mut inner, "UNION operand")?)?;
                stmt = SelectStatement::Union(Box::new(Union {
                    id: NodeId::UNASSIGNED,
                    left: stmt,
                    right,
                    distinct,
                    order_by: Vec::new(),
                    limit: None,
                }));
            }
            Rule::order_by_clause => order_by = build_order_by(next)?,
            Rule::limit_clause => limit = Some(build_limit(next)?),
            Rule::into_clause => into = Some(build_into(next)?),
            _ => return Err(unexpected(&next)),
        }
    }

    match &mut stmt {
        SelectStatement::Select(sel) => {
            if !order_by.is_empty() {
                sel.order_by = order_by;
            }
            if limit.is_some() {
                sel.limit = limit;
            }
            if into.is_some() {
                sel.into = into;
            }
        }
        SelectStatement::Union(union) => {
            union.order_by = order_by;
            union.limit = limit;
            if into.is_some() {
                last_select_mut(&mut union.right).into = into;
            }
        }
    }
    Ok(stmt)
}

fn last_select_mut(stmt: &mut SelectStatement) -> &mut Select {
    match stmt {
        SelectStatement::Select(sel) => sel,
        SelectStatement::Union(union) => last_select_mut(&mut union.right),
    }
}

fn build_union_operand(pair: Pair<Rule>) -> Result<SelectStatement> {
    let inner = next_pair(&mut pair.into_inner(), "SELECT")?;
    match inner.as_rule() {
        Rule::select_core => Ok(SelectStatement::Select(Box::new(build_select_core(inner)?))),
        Rule::select_statement => build_select_statement(inner),
        _ => Err(unexpected(&inner)),
    }
}

fn build_select_core(pair: Pair<Rule>) -> Result<Select> {
    let mut select = Select::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::kw_select => {}
            Rule::comment_block => {
                let text = inner.as_str();
                let body = text
                    .strip_prefix("/*")
                    .and_then(|s| s.strip_suffix("*/"))
                    .unwrap_or_default();
                select.comments.push(body.to_string());
            }
            Rule::kw_distinct => select.distinct = true,
            Rule::select_exprs => {
                select.exprs = inner
                    .into_inner()
                    .map(build_select_expr)
                    .collect::<Result<_>>()?;
            }
            Rule::into_clause => select.into = Some(build_into(inner)?),
            Rule::from_clause => {
                let table_exprs = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::table_exprs)
                    .ok_or_else(|| missing("table list"))?;
                select.from = build_table_exprs(table_exprs)?;
            }
            Rule::where_clause => select.where_clause = Some(build_clause_expr(inner)?),
            Rule::group_by_clause => select.group_by = build_clause_exprs(inner)?,
            Rule::having_clause => select.having = Some(build_clause_expr(inner)?),
            _ => return Err(unexpected(&inner)),
        }
    }
    Ok(select)
}

fn build_select_expr(pair: Pair<Rule>) -> Result<SelectExpr> {
    let inner = next_pair(&mut pair.into_inner(), "select expression")?;
    match inner.as_rule() {
        Rule::star_expr => Ok(SelectExpr::Star(build_star(inner))),
        Rule::aliased_expr => {
            let mut expr = None;
            let mut alias = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::expr => expr = Some(build_expr(part)?),
                    Rule::kw_as => {}
                    Rule::alias => {
                        let name = next_pair(&mut part.into_inner(), "alias")?;
                        alias = Some(match name.as_rule() {
                            Rule::string_literal => unescape_string(name.as_str()),
                            _ => identifier_text(&name),
                        });
                    }
                    _ => return Err(unexpected(&part)),
                }
            }
            Ok(SelectExpr::Aliased(AliasedExpr {
                expr: expr.ok_or_else(|| missing("expression"))?,
                alias,
            }))
        }
        _ => Err(unexpected(&inner)),
    }
}

fn build_star(pair: Pair<Rule>) -> StarExpr {
    StarExpr {
        qualifier: pair.into_inner().next().map(build_table_name),
    }
}

fn identifier_text(pair: &Pair<Rule>) -> String {
    let raw = pair.as_str();
    raw.strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(raw)
        .to_string()
}

fn build_table_name(pair: Pair<Rule>) -> TableName {
    let mut parts: Vec<String> = pair.into_inner().map(|p| identifier_text(&p)).collect();
    let name = parts.pop().unwrap_or_default();
    TableName {
        qualifier: parts.pop(),
        name,
    }
}

// ============================================================================
// FROM clause
// ============================================================================

fn build_table_exprs(pair: Pair<Rule>) -> Result<Vec<TableExpr>> {
    pair.into_inner().map(build_table_expr).collect()
}

fn build_table_expr(pair: Pair<Rule>) -> Result<TableExpr> {
    let mut inner = pair.into_inner();
    let mut table = build_table_factor(next_pair(&mut inner, "table")?)?;
    for join in inner {
        table = build_join(table, join)?;
    }
    Ok(table)
}

fn build_table_factor(pair: Pair<Rule>) -> Result<TableExpr> {
    let inner = next_pair(&mut pair.into_inner(), "table")?;
    match inner.as_rule() {
        Rule::derived_table => {
            let mut select = None;
            let mut alias = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::select_statement => select = Some(build_select_statement(part)?),
                    Rule::identifier => alias = Some(identifier_text(&part)),
                    _ => {}
                }
            }
            Ok(TableExpr::Aliased(AliasedTableExpr {
                id: NodeId::UNASSIGNED,
                expr: SimpleTableExpr::Derived(DerivedTable {
                    select: select.ok_or_else(|| missing("derived table body"))?,
                }),
                alias,
            }))
        }
        Rule::paren_tables => {
            let table_exprs = next_pair(&mut inner.into_inner(), "table list")?;
            Ok(TableExpr::Paren(build_table_exprs(table_exprs)?))
        }
        Rule::aliased_table => {
            let mut name = None;
            let mut alias = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::table_name => name = Some(build_table_name(part)),
                    Rule::identifier => alias = Some(identifier_text(&part)),
                    _ => {}
                }
            }
            let name = name.ok_or_else(|| missing("table name"))?;
            Ok(TableExpr::Aliased(AliasedTableExpr::table(name, alias)))
        }
        _ => Err(unexpected(&inner)),
    }
}

fn build_join(left: TableExpr, pair: Pair<Rule>) -> Result<TableExpr> {
    let mut kind = JoinKind::Inner;
    let mut right = None;
    let mut condition = JoinCondition::default();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::join_type => kind = build_join_kind(part),
            Rule::table_factor => right = Some(build_table_factor(part)?),
            Rule::join_condition => {
                for clause in part.into_inner() {
                    match clause.as_rule() {
                        Rule::on_clause => condition.on = Some(build_clause_expr(clause)?),
                        Rule::using_clause => {
                            condition.using = Some(
                                clause
                                    .into_inner()
                                    .filter(|p| p.as_rule() == Rule::identifier)
                                    .map(|p| identifier_text(&p))
                                    .collect(),
                            );
                        }
                        _ => return Err(unexpected(&clause)),
                    }
                }
            }
            _ => return Err(unexpected(&part)),
        }
    }

    Ok(TableExpr::Join(Box::new(JoinTableExpr {
        left,
        kind,
        right: right.ok_or_else(|| missing("joined table"))?,
        condition,
    })))
}

fn build_join_kind(pair: Pair<Rule>) -> JoinKind {
    let (mut natural, mut left, mut right, mut straight) = (false, false, false, false);
    for kw in pair.into_inner() {
        match kw.as_rule() {
            Rule::kw_natural => natural = true,
            Rule::kw_left => left = true,
            Rule::kw_right => right = true,
            Rule::kw_straight_join => straight = true,
            _ => {}
        }
    }
    match (natural, left, right) {
        (true, true, _) => JoinKind::NaturalLeft,
        (true, _, true) => JoinKind::NaturalRight,
        (true, _, _) => JoinKind::Natural,
        (false, true, _) => JoinKind::Left,
        (false, _, true) => JoinKind::Right,
        _ if straight => JoinKind::Straight,
        _ => JoinKind::Inner,
    }
}

// ============================================================================
// Trailing clauses
// ============================================================================

fn build_clause_expr(pair: Pair<Rule>) -> Result<Expr> {
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::expr {
            return build_expr(inner);
        }
    }
    Err(missing("expression"))
}

fn build_clause_exprs(pair: Pair<Rule>) -> Result<Vec<Expr>> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::expr)
        .map(build_expr)
        .collect()
}

fn build_order_by(pair: Pair<Rule>) -> Result<Vec<Order>> {
    let mut orders = Vec::new();
    for item in pair.into_inner().filter(|p| p.as_rule() == Rule::order_item) {
        let mut expr = None;
        let mut ascending = true;
        for part in item.into_inner() {
            match part.as_rule() {
                Rule::expr => expr = Some(build_expr(part)?),
                Rule::kw_desc => ascending = false,
                _ => {}
            }
        }
        orders.push(Order {
            expr: expr.ok_or_else(|| missing("ORDER BY expression"))?,
            ascending,
        });
    }
    Ok(orders)
}

fn build_limit(pair: Pair<Rule>) -> Result<Limit> {
    let mut exprs = build_clause_exprs(pair)?;
    let count = exprs.pop().ok_or_else(|| missing("LIMIT count"))?;
    Ok(Limit {
        offset: exprs.pop(),
        count,
    })
}

fn build_into(pair: Pair<Rule>) -> Result<SelectInto> {
    let mut target = None;
    let mut variables = Vec::new();
    let mut path = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::kw_into => {}
            Rule::kw_outfile | Rule::kw_dumpfile => target = Some(part.as_rule()),
            Rule::string_literal => path = Some(unescape_string(part.as_str())),
            Rule::variable => variables.push(variable_name(part.as_str())),
            _ => return Err(unexpected(&part)),
        }
    }
    match target {
        Some(Rule::kw_outfile) => Ok(SelectInto::Outfile(path.unwrap_or_default())),
        Some(_) => Ok(SelectInto::Dumpfile(path.unwrap_or_default())),
        None => Ok(SelectInto::Variables(variables)),
    }
}

fn variable_name(raw: &str) -> String {
    raw.strip_prefix('@').unwrap_or(raw).to_string()
}

// ============================================================================
// Expressions
// ============================================================================

fn build_expr(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expr | Rule::primary => build_expr(next_pair(&mut pair.into_inner(), "expression")?),
        Rule::or_expr
        | Rule::and_expr
        | Rule::bit_or_expr
        | Rule::bit_and_expr
        | Rule::shift_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr
        | Rule::bit_xor_expr => build_chain(pair),
        Rule::not_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, "expression")?;
            if first.as_rule() == Rule::kw_not {
                let operand = build_expr(next_pair(&mut inner, "NOT operand")?)?;
                Ok(Expr::new(ExprKind::Not(Box::new(operand))))
            } else {
                build_expr(first)
            }
        }
        Rule::predicate => {
            let mut inner = pair.into_inner();
            let left = build_expr(next_pair(&mut inner, "expression")?)?;
            match inner.next() {
                Some(tail) => build_predicate_tail(left, tail),
                None => Ok(left),
            }
        }
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, "expression")?;
            if first.as_rule() == Rule::unary_op {
                let op = if first.as_str() == "~" {
                    UnaryOp::BitNot
                } else {
                    UnaryOp::Minus
                };
                let operand = build_expr(next_pair(&mut inner, "unary operand")?)?;
                Ok(Expr::new(ExprKind::Unary {
                    op,
                    expr: Box::new(operand),
                }))
            } else {
                build_expr(first)
            }
        }
        Rule::literal => build_literal(pair),
        Rule::exists_expr => {
            let subquery = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::subquery)
                .ok_or_else(|| missing("EXISTS subquery"))?;
            Ok(Expr::new(ExprKind::Exists(Box::new(build_subquery(subquery)?))))
        }
        Rule::subquery => Ok(Expr::new(ExprKind::Subquery(Box::new(build_subquery(pair)?)))),
        Rule::tuple_or_paren => {
            let mut exprs = build_tuple(pair)?;
            if exprs.len() == 1 {
                exprs.pop().ok_or_else(|| missing("expression"))
            } else {
                Ok(Expr::new(ExprKind::Tuple(exprs)))
            }
        }
        Rule::variable => Ok(Expr::new(ExprKind::Variable(variable_name(pair.as_str())))),
        Rule::function_call => build_function(pair),
        Rule::column_ref => {
            let mut parts: Vec<String> = pair.into_inner().map(|p| identifier_text(&p)).collect();
            let name = parts.pop().unwrap_or_default();
            let qualifier = parts.pop().map(|table| TableName {
                qualifier: parts.pop(),
                name: table,
            });
            Ok(Expr::new(ExprKind::Column(ColName { qualifier, name })))
        }
        _ => Err(unexpected(&pair)),
    }
}

/// Folds `operand (op operand)*` left-associatively.
fn build_chain(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut left = build_expr(next_pair(&mut inner, "operand")?)?;
    while let Some(op) = inner.next() {
        let right = build_expr(next_pair(&mut inner, "operand")?)?;
        let (l, r) = (Box::new(left), Box::new(right));
        let kind = match op.as_rule() {
            Rule::or_op => ExprKind::Or(l, r),
            Rule::and_op => ExprKind::And(l, r),
            _ => ExprKind::Binary {
                op: binary_op(&op)?,
                left: l,
                right: r,
            },
        };
        left = Expr::new(kind);
    }
    Ok(left)
}

fn binary_op(op: &Pair<Rule>) -> Result<BinaryOp> {
    Ok(match op.as_str().to_ascii_lowercase().as_str() {
        "+" => BinaryOp::Plus,
        "-" => BinaryOp::Minus,
        "*" => BinaryOp::Mult,
        "/" => BinaryOp::Div,
        "div" => BinaryOp::IntDiv,
        "%" | "mod" => BinaryOp::Mod,
        "&" => BinaryOp::BitAnd,
        "|" => BinaryOp::BitOr,
        "^" => BinaryOp::BitXor,
        "<<" => BinaryOp::ShiftLeft,
        ">>" => BinaryOp::ShiftRight,
        _ => return Err(unexpected(op)),
    })
}

fn build_predicate_tail(left: Expr, pair: Pair<Rule>) -> Result<Expr> {
    let tail = next_pair(&mut pair.into_inner(), "predicate")?;
    let rule = tail.as_rule();
    let mut negated = false;
    let mut right = None;
    let mut op = None;

    for part in tail.into_inner() {
        match part.as_rule() {
            Rule::kw_not => negated = true,
            Rule::kw_is | Rule::kw_null | Rule::kw_in | Rule::kw_like => {}
            Rule::comparison_op => op = ComparisonOp::parse(part.as_str()),
            Rule::tuple_or_paren => right = Some(Expr::new(ExprKind::Tuple(build_tuple(part)?))),
            _ => right = Some(build_expr(part)?),
        }
    }

    let op = match rule {
        Rule::is_null_tail => {
            return Ok(Expr::new(ExprKind::IsNull {
                expr: Box::new(left),
                negated,
            }));
        }
        Rule::in_tail if negated => ComparisonOp::NotIn,
        Rule::in_tail => ComparisonOp::In,
        Rule::like_tail if negated => ComparisonOp::NotLike,
        Rule::like_tail => ComparisonOp::Like,
        _ => op.ok_or_else(|| missing("comparison operator"))?,
    };
    Ok(Expr::new(ExprKind::Comparison {
        op,
        left: Box::new(left),
        right: Box::new(right.ok_or_else(|| missing("right operand"))?),
    }))
}

fn build_tuple(pair: Pair<Rule>) -> Result<Vec<Expr>> {
    pair.into_inner().map(build_expr).collect()
}

fn build_subquery(pair: Pair<Rule>) -> Result<Subquery> {
    let select = build_select_statement(next_pair(&mut pair.into_inner(), "subquery")?)?;
    Ok(Subquery { select })
}

fn build_function(pair: Pair<Rule>) -> Result<Expr> {
    let mut names = Vec::new();
    let mut distinct = false;
    let mut args = Vec::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::identifier => names.push(identifier_text(&part)),
            Rule::kw_distinct => distinct = true,
            Rule::func_args => {
                for arg in part.into_inner() {
                    let arg = next_pair(&mut arg.into_inner(), "argument")?;
                    args.push(match arg.as_rule() {
                        Rule::star_expr => SelectExpr::Star(build_star(arg)),
                        _ => SelectExpr::Aliased(AliasedExpr::new(build_expr(arg)?)),
                    });
                }
            }
            _ => return Err(unexpected(&part)),
        }
    }
    let name = names.pop().ok_or_else(|| missing("function name"))?;
    Ok(Expr::new(ExprKind::Func(FuncExpr {
        qualifier: names.pop(),
        name,
        distinct,
        args,
    })))
}

fn build_literal(pair: Pair<Rule>) -> Result<Expr> {
    let inner = next_pair(&mut pair.into_inner(), "literal")?;
    let text = inner.as_str();
    let literal = match inner.as_rule() {
        Rule::kw_null => Literal::Null,
        Rule::kw_true => Literal::Bool(true),
        Rule::kw_false => Literal::Bool(false),
        Rule::float_literal => Literal::Float(text.to_string()),
        Rule::decimal_literal => Literal::Decimal(text.to_string()),
        Rule::integer_literal => Literal::Int(text.to_string()),
        Rule::string_literal => Literal::Str(unescape_string(text)),
        _ => return Err(unexpected(&inner)),
    };
    Ok(Expr::literal(literal))
}

/// Strips the quotes of a string literal and resolves escapes.
fn unescape_string(raw: &str) -> String {
    let quote = raw.chars().next();
    let body = raw.get(1..raw.len().saturating_sub(1)).unwrap_or_default();
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => {}
            }
        } else if Some(c) == quote && chars.peek() == Some(&c) {
            chars.next();
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out
}
