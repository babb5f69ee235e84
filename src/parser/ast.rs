//! Abstract Syntax Tree definitions for SELECT statements.
//!
//! Every node kind that the analyzer needs to refer back to carries a
//! [`NodeId`]. Parsers and rewrites create nodes with [`NodeId::UNASSIGNED`];
//! identities are assigned by [`crate::parser::walk::assign_node_ids`].

use std::fmt;

/// Identity of an AST node within one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Identity of a node that has not been numbered yet.
    pub const UNASSIGNED: NodeId = NodeId(0);

    /// Returns true if this id was assigned by the numbering pass.
    #[must_use]
    pub fn is_assigned(self) -> bool {
        self != NodeId::UNASSIGNED
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A parsed SELECT or UNION statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectStatement {
    /// Plain SELECT.
    Select(Box<Select>),
    /// UNION of two statements.
    Union(Box<Union>),
}

impl SelectStatement {
    /// Returns the leading comments of the statement.
    #[must_use]
    pub fn comments(&self) -> &[String] {
        match self {
            SelectStatement::Select(sel) => &sel.comments,
            SelectStatement::Union(union) => union.left.comments(),
        }
    }

    /// Returns the left-most SELECT of the statement.
    #[must_use]
    pub fn first_select(&self) -> &Select {
        match self {
            SelectStatement::Select(sel) => sel,
            SelectStatement::Union(union) => union.left.first_select(),
        }
    }

    /// Returns the statement as a plain SELECT, if it is one.
    #[must_use]
    pub fn as_select(&self) -> Option<&Select> {
        match self {
            SelectStatement::Select(sel) => Some(sel),
            SelectStatement::Union(_) => None,
        }
    }

    /// Returns the name of the statement kind, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SelectStatement::Select(_) => "Select",
            SelectStatement::Union(_) => "Union",
        }
    }
}

/// SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub id: NodeId,
    /// `/* ... */` comments following the SELECT keyword.
    pub comments: Vec<String>,
    pub distinct: bool,
    pub exprs: Vec<SelectExpr>,
    /// FROM items; empty when the statement has no FROM clause.
    pub from: Vec<TableExpr>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<Order>,
    pub limit: Option<Limit>,
    pub into: Option<SelectInto>,
}

impl Select {
    /// Returns true if the statement reads from no table or only from `dual`.
    #[must_use]
    pub fn reads_only_dual(&self) -> bool {
        self.from.iter().all(|table_expr| match table_expr {
            TableExpr::Aliased(AliasedTableExpr {
                expr: SimpleTableExpr::Table(name),
                ..
            }) => name.qualifier.is_none() && name.name.eq_ignore_ascii_case("dual"),
            _ => false,
        })
    }
}

/// `left UNION [ALL] right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub id: NodeId,
    pub left: SelectStatement,
    pub right: SelectStatement,
    /// False for UNION ALL.
    pub distinct: bool,
    pub order_by: Vec<Order>,
    pub limit: Option<Limit>,
}

/// Item of a projection list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    /// `*` or `t.*`.
    Star(StarExpr),
    /// `expr [AS alias]`.
    Aliased(AliasedExpr),
}

/// `*` or `qualifier.*`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StarExpr {
    pub qualifier: Option<TableName>,
}

/// Expression with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasedExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl AliasedExpr {
    /// Creates an unaliased projection.
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        AliasedExpr { expr, alias: None }
    }
}

/// FROM item.
#[derive(Debug, Clone, PartialEq)]
pub enum TableExpr {
    /// Table or derived table with optional alias.
    Aliased(AliasedTableExpr),
    /// Two table expressions joined.
    Join(Box<JoinTableExpr>),
    /// Parenthesized list of table expressions.
    Paren(Vec<TableExpr>),
}

/// Table or derived table with optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasedTableExpr {
    pub id: NodeId,
    pub expr: SimpleTableExpr,
    pub alias: Option<String>,
}

impl AliasedTableExpr {
    /// Creates an aliased reference to a named table.
    #[must_use]
    pub fn table(name: TableName, alias: Option<String>) -> Self {
        AliasedTableExpr {
            id: NodeId::UNASSIGNED,
            expr: SimpleTableExpr::Table(name),
            alias,
        }
    }
}

/// The table part of an [`AliasedTableExpr`].
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleTableExpr {
    /// Physical table name.
    Table(TableName),
    /// `(select ...)`.
    Derived(DerivedTable),
}

/// Subquery used as a table.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTable {
    pub select: SelectStatement,
}

/// Possibly database-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TableName {
    pub qualifier: Option<String>,
    pub name: String,
}

impl TableName {
    /// Creates an unqualified table name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        TableName {
            qualifier: None,
            name: name.into(),
        }
    }

    /// Creates a database-qualified table name.
    #[must_use]
    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        TableName {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }
}

/// `left <kind> JOIN right <condition>`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTableExpr {
    pub left: TableExpr,
    pub kind: JoinKind,
    pub right: TableExpr,
    pub condition: JoinCondition,
}

/// Join flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Straight,
    Left,
    Right,
    Natural,
    NaturalLeft,
    NaturalRight,
}

impl JoinKind {
    /// Returns the SQL spelling of the join.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "join",
            JoinKind::Straight => "straight_join",
            JoinKind::Left => "left join",
            JoinKind::Right => "right join",
            JoinKind::Natural => "natural join",
            JoinKind::NaturalLeft => "natural left join",
            JoinKind::NaturalRight => "natural right join",
        }
    }

    /// Returns true for the NATURAL variants.
    #[must_use]
    pub fn is_natural(&self) -> bool {
        matches!(
            self,
            JoinKind::Natural | JoinKind::NaturalLeft | JoinKind::NaturalRight
        )
    }
}

/// `ON expr` and/or `USING (columns)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinCondition {
    pub on: Option<Expr>,
    pub using: Option<Vec<String>>,
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub expr: Expr,
    pub ascending: bool,
}

/// `LIMIT [offset,] count`.
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub offset: Option<Expr>,
    pub count: Expr,
}

/// INTO target of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectInto {
    /// `INTO @a, @b`.
    Variables(Vec<String>),
    /// `INTO OUTFILE 'path'`.
    Outfile(String),
    /// `INTO DUMPFILE 'path'`.
    Dumpfile(String),
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Column reference.
    Column(ColName),
    /// Literal value.
    Literal(Literal),
    /// `@name` user variable.
    Variable(String),
    /// Arithmetic or bitwise operation.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Comparison, including IN and LIKE.
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Unary minus or bit inversion.
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// `expr IS [NOT] NULL`.
    IsNull { expr: Box<Expr>, negated: bool },
    /// Function call.
    Func(FuncExpr),
    /// Scalar or IN subquery.
    Subquery(Box<Subquery>),
    /// `EXISTS (subquery)`.
    Exists(Box<Subquery>),
    /// Parenthesized list, as used on the right of IN.
    Tuple(Vec<Expr>),
}

impl Expr {
    /// Creates an expression with an unassigned id.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            id: NodeId::UNASSIGNED,
            kind,
        }
    }

    /// Creates a column reference.
    #[must_use]
    pub fn column(qualifier: Option<TableName>, name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Column(ColName {
            qualifier,
            name: name.into(),
        }))
    }

    /// Creates a literal.
    #[must_use]
    pub fn literal(literal: Literal) -> Self {
        Expr::new(ExprKind::Literal(literal))
    }

    /// Returns the column reference if this is one.
    #[must_use]
    pub fn as_column(&self) -> Option<&ColName> {
        match &self.kind {
            ExprKind::Column(col) => Some(col),
            _ => None,
        }
    }

    /// Returns the direct child expressions, left to right.
    ///
    /// Subquery bodies are not expressions and are not included.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Column(_)
            | ExprKind::Literal(_)
            | ExprKind::Variable(_)
            | ExprKind::Subquery(_)
            | ExprKind::Exists(_) => Vec::new(),
            ExprKind::Binary { left, right, .. }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::And(left, right)
            | ExprKind::Or(left, right) => vec![&**left, &**right],
            ExprKind::Not(expr) | ExprKind::Unary { expr, .. } | ExprKind::IsNull { expr, .. } => {
                vec![&**expr]
            }
            ExprKind::Func(func) => func
                .args
                .iter()
                .filter_map(|arg| match arg {
                    SelectExpr::Aliased(aliased) => Some(&aliased.expr),
                    SelectExpr::Star(_) => None,
                })
                .collect(),
            ExprKind::Tuple(exprs) => exprs.iter().collect(),
        }
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Or(..) => 1,
            ExprKind::And(..) => 2,
            ExprKind::Not(_) => 3,
            ExprKind::Comparison { .. } | ExprKind::IsNull { .. } => 4,
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Unary { .. } => 11,
            _ => 12,
        }
    }
}

/// Column reference, optionally qualified by a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColName {
    pub qualifier: Option<TableName>,
    pub name: String,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Integer literal, kept as written.
    Int(String),
    /// Fixed point literal such as `1.5`.
    Decimal(String),
    /// Floating point literal with exponent such as `1e3`.
    Float(String),
    /// String literal (unescaped).
    Str(String),
    /// TRUE / FALSE.
    Bool(bool),
    Null,
}

/// Arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mult,
    Div,
    IntDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    /// Returns the SQL spelling of the operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mult => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::BitOr => 5,
            BinaryOp::BitAnd => 6,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 7,
            BinaryOp::Plus | BinaryOp::Minus => 8,
            BinaryOp::Mult | BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Mod => 9,
            BinaryOp::BitXor => 10,
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NullSafeEq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Like,
    NotLike,
}

impl ComparisonOp {
    /// Returns the SQL spelling of the operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NullSafeEq => "<=>",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::In => "in",
            ComparisonOp::NotIn => "not in",
            ComparisonOp::Like => "like",
            ComparisonOp::NotLike => "not like",
        }
    }

    /// Parses a symbolic comparison operator.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(ComparisonOp::Eq),
            "<=>" => Some(ComparisonOp::NullSafeEq),
            "!=" | "<>" => Some(ComparisonOp::Neq),
            "<" => Some(ComparisonOp::Lt),
            "<=" => Some(ComparisonOp::Lte),
            ">" => Some(ComparisonOp::Gt),
            ">=" => Some(ComparisonOp::Gte),
            _ => None,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    BitNot,
}

/// Function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncExpr {
    pub qualifier: Option<String>,
    pub name: String,
    pub distinct: bool,
    pub args: Vec<SelectExpr>,
}

impl FuncExpr {
    /// Returns the lower-cased function name.
    #[must_use]
    pub fn lowered_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Returns true for functions that acquire or release named locks.
    #[must_use]
    pub fn is_locking(&self) -> bool {
        matches!(
            self.lowered_name().as_str(),
            "get_lock" | "is_free_lock" | "is_used_lock" | "release_all_locks" | "release_lock"
        )
    }

    /// Returns true for aggregate functions.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.lowered_name().as_str(),
            "avg"
                | "bit_and"
                | "bit_or"
                | "bit_xor"
                | "count"
                | "group_concat"
                | "max"
                | "min"
                | "std"
                | "stddev"
                | "stddev_pop"
                | "stddev_samp"
                | "sum"
                | "var_pop"
                | "var_samp"
                | "variance"
                | "any_value"
        )
    }
}

/// Parenthesized SELECT used as an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub select: SelectStatement,
}

// ============================================================================
// Canonical printing
// ============================================================================

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_order_limit(
    f: &mut fmt::Formatter<'_>,
    order_by: &[Order],
    limit: Option<&Limit>,
) -> fmt::Result {
    if !order_by.is_empty() {
        f.write_str(" order by ")?;
        write_list(f, order_by)?;
    }
    if let Some(limit) = limit {
        write!(f, " {limit}")?;
    }
    Ok(())
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectStatement::Select(sel) => write!(f, "{sel}"),
            SelectStatement::Union(union) => write!(f, "{union}"),
        }
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("select ")?;
        for comment in &self.comments {
            write!(f, "/*{comment}*/ ")?;
        }
        if self.distinct {
            f.write_str("distinct ")?;
        }
        write_list(f, &self.exprs)?;
        if !self.from.is_empty() {
            f.write_str(" from ")?;
            write_list(f, &self.from)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " where {where_clause}")?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" group by ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(having) = &self.having {
            write!(f, " having {having}")?;
        }
        write_order_limit(f, &self.order_by, self.limit.as_ref())?;
        if let Some(into) = &self.into {
            write!(f, " {into}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Union {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.left)?;
        f.write_str(if self.distinct { " union " } else { " union all " })?;
        match &self.right {
            SelectStatement::Union(_) => write!(f, "({})", self.right)?,
            SelectStatement::Select(_) => write!(f, "{}", self.right)?,
        }
        write_order_limit(f, &self.order_by, self.limit.as_ref())
    }
}

impl fmt::Display for SelectExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectExpr::Star(star) => write!(f, "{star}"),
            SelectExpr::Aliased(aliased) => write!(f, "{aliased}"),
        }
    }
}

impl fmt::Display for StarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.*"),
            None => f.write_str("*"),
        }
    }
}

impl fmt::Display for AliasedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " as {alias}")?;
        }
        Ok(())
    }
}

impl fmt::Display for TableExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableExpr::Aliased(aliased) => write!(f, "{aliased}"),
            TableExpr::Join(join) => write!(f, "{join}"),
            TableExpr::Paren(exprs) => {
                f.write_str("(")?;
                write_list(f, exprs)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for AliasedTableExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            SimpleTableExpr::Table(name) => write!(f, "{name}")?,
            SimpleTableExpr::Derived(derived) => write!(f, "({})", derived.select)?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " as {alias}")?;
        }
        Ok(())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Display for JoinTableExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.kind.as_str(), self.right)?;
        if let Some(on) = &self.condition.on {
            write!(f, " on {on}")?;
        }
        if let Some(using) = &self.condition.using {
            f.write_str(" using (")?;
            write_list(f, using)?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, if self.ascending { "asc" } else { "desc" })
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("limit ")?;
        if let Some(offset) = &self.offset {
            write!(f, "{offset}, ")?;
        }
        write!(f, "{}", self.count)
    }
}

impl fmt::Display for SelectInto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectInto::Variables(vars) => {
                f.write_str("into ")?;
                for (i, var) in vars.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "@{var}")?;
                }
                Ok(())
            }
            SelectInto::Outfile(path) => write!(f, "into outfile {}", Quoted(path)),
            SelectInto::Dumpfile(path) => write!(f, "into dumpfile {}", Quoted(path)),
        }
    }
}

/// Writes a child expression, parenthesized when it binds looser than its parent.
fn write_operand(f: &mut fmt::Formatter<'_>, parent: u8, child: &Expr, strict: bool) -> fmt::Result {
    let child_precedence = child.precedence();
    if child_precedence < parent || (strict && child_precedence == parent) {
        write!(f, "({child})")
    } else {
        write!(f, "{child}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precedence = self.precedence();
        match &self.kind {
            ExprKind::Column(col) => write!(f, "{col}"),
            ExprKind::Literal(literal) => write!(f, "{literal}"),
            ExprKind::Variable(name) => write!(f, "@{name}"),
            ExprKind::Binary { op, left, right } => {
                write_operand(f, precedence, left, false)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, precedence, right, true)
            }
            ExprKind::Comparison { op, left, right } => {
                write_operand(f, precedence, left, false)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, precedence, right, true)
            }
            ExprKind::And(left, right) => {
                write_operand(f, precedence, left, false)?;
                f.write_str(" and ")?;
                write_operand(f, precedence, right, true)
            }
            ExprKind::Or(left, right) => {
                write_operand(f, precedence, left, false)?;
                f.write_str(" or ")?;
                write_operand(f, precedence, right, true)
            }
            ExprKind::Not(expr) => {
                f.write_str("not ")?;
                write_operand(f, precedence, expr, false)
            }
            ExprKind::Unary { op, expr } => {
                f.write_str(match op {
                    UnaryOp::Minus => "-",
                    UnaryOp::BitNot => "~",
                })?;
                write_operand(f, precedence, expr, false)
            }
            ExprKind::IsNull { expr, negated } => {
                write_operand(f, precedence, expr, true)?;
                f.write_str(if *negated { " is not null" } else { " is null" })
            }
            ExprKind::Func(func) => write!(f, "{func}"),
            ExprKind::Subquery(subquery) => write!(f, "({})", subquery.select),
            ExprKind::Exists(subquery) => write!(f, "exists ({})", subquery.select),
            ExprKind::Tuple(exprs) => {
                f.write_str("(")?;
                write_list(f, exprs)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for ColName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("'")?;
        for c in self.0.chars() {
            match c {
                '\'' => f.write_str("\\'")?,
                '\\' => f.write_str("\\\\")?,
                _ => write!(f, "{c}")?,
            }
        }
        f.write_str("'")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) | Literal::Decimal(v) | Literal::Float(v) => f.write_str(v),
            Literal::Str(v) => write!(f, "{}", Quoted(v)),
            Literal::Bool(true) => f.write_str("true"),
            Literal::Bool(false) => f.write_str("false"),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for FuncExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{qualifier}.")?;
        }
        write!(f, "{}(", self.name)?;
        if self.distinct {
            f.write_str("distinct ")?;
        }
        write_list(f, &self.args)?;
        f.write_str(")")
    }
}
