//! Generic pre/post-order traversal over a parsed statement.
//!
//! [`walk`] hands every node to a [`Visitor`] together with its parent. The
//! children of a SELECT are visited FROM clause first, then the projection,
//! WHERE, GROUP BY, HAVING, ORDER BY, LIMIT and INTO, so table sources are
//! known before any expression referring to them is reached.

use std::collections::BTreeSet;

use crate::parser::ast::{
    DerivedTable, Expr, ExprKind, JoinCondition, Limit, NodeId, Order, Select, SelectExpr,
    SelectInto, SelectStatement, SimpleTableExpr, TableExpr, Union,
};

/// A borrowed view of one node of the tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Union(&'a Union),
    Select(&'a Select),
    /// Projection list of a SELECT.
    SelectExprs(&'a [SelectExpr]),
    /// Projection item, or a function argument.
    SelectExpr(&'a SelectExpr),
    TableExpr(&'a TableExpr),
    DerivedTable(&'a DerivedTable),
    JoinCondition(&'a JoinCondition),
    Expr(&'a Expr),
    Where(&'a Expr),
    GroupBy(&'a [Expr]),
    Having(&'a Expr),
    /// ORDER BY list of a SELECT or UNION.
    OrderBy(&'a [Order]),
    Order(&'a Order),
    Limit(&'a Limit),
    Into(&'a SelectInto),
}

impl<'a> Node<'a> {
    /// Returns the node for the top of a statement.
    #[must_use]
    pub fn statement(stmt: &'a SelectStatement) -> Node<'a> {
        match stmt {
            SelectStatement::Select(sel) => Node::Select(sel),
            SelectStatement::Union(union) => Node::Union(union),
        }
    }

    /// Returns the identity of the node, for node kinds that carry one.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Node::Union(union) => Some(union.id),
            Node::Select(sel) => Some(sel.id),
            Node::Expr(expr) => Some(expr.id),
            Node::TableExpr(TableExpr::Aliased(aliased)) => Some(aliased.id),
            _ => None,
        }
    }

    /// Returns the children of the node in visiting order.
    #[must_use]
    pub fn children(&self) -> Vec<Node<'a>> {
        let mut children = Vec::new();
        match *self {
            Node::Union(union) => {
                children.push(Node::statement(&union.left));
                children.push(Node::statement(&union.right));
                if !union.order_by.is_empty() {
                    children.push(Node::OrderBy(&union.order_by));
                }
                if let Some(limit) = &union.limit {
                    children.push(Node::Limit(limit));
                }
            }
            Node::Select(sel) => {
                children.extend(sel.from.iter().map(Node::TableExpr));
                children.push(Node::SelectExprs(&sel.exprs));
                if let Some(where_clause) = &sel.where_clause {
                    children.push(Node::Where(where_clause));
                }
                if !sel.group_by.is_empty() {
                    children.push(Node::GroupBy(&sel.group_by));
                }
                if let Some(having) = &sel.having {
                    children.push(Node::Having(having));
                }
                if !sel.order_by.is_empty() {
                    children.push(Node::OrderBy(&sel.order_by));
                }
                if let Some(limit) = &sel.limit {
                    children.push(Node::Limit(limit));
                }
                if let Some(into) = &sel.into {
                    children.push(Node::Into(into));
                }
            }
            Node::SelectExprs(exprs) => children.extend(exprs.iter().map(Node::SelectExpr)),
            Node::SelectExpr(SelectExpr::Aliased(aliased)) => children.push(Node::Expr(&aliased.expr)),
            Node::TableExpr(table_expr) => match table_expr {
                TableExpr::Aliased(aliased) => {
                    if let SimpleTableExpr::Derived(derived) = &aliased.expr {
                        children.push(Node::DerivedTable(derived));
                    }
                }
                TableExpr::Join(join) => {
                    children.push(Node::TableExpr(&join.left));
                    children.push(Node::TableExpr(&join.right));
                    children.push(Node::JoinCondition(&join.condition));
                }
                TableExpr::Paren(exprs) => children.extend(exprs.iter().map(Node::TableExpr)),
            },
            Node::DerivedTable(derived) => children.push(Node::statement(&derived.select)),
            Node::JoinCondition(condition) => {
                if let Some(on) = &condition.on {
                    children.push(Node::Expr(on));
                }
            }
            Node::Expr(expr) => match &expr.kind {
                ExprKind::Subquery(subquery) | ExprKind::Exists(subquery) => {
                    children.push(Node::statement(&subquery.select));
                }
                ExprKind::Func(func) => children.extend(func.args.iter().map(Node::SelectExpr)),
                _ => children.extend(expr.children().into_iter().map(Node::Expr)),
            },
            Node::Where(expr) | Node::Having(expr) => children.push(Node::Expr(expr)),
            Node::GroupBy(exprs) => children.extend(exprs.iter().map(Node::Expr)),
            Node::OrderBy(orders) => children.extend(orders.iter().map(Node::Order)),
            Node::Order(order) => children.push(Node::Expr(&order.expr)),
            Node::Limit(limit) => {
                if let Some(offset) = &limit.offset {
                    children.push(Node::Expr(offset));
                }
                children.push(Node::Expr(&limit.count));
            }
            Node::SelectExpr(SelectExpr::Star(_)) | Node::Into(_) => {}
        }
        children
    }
}

/// A node together with its parent.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    pub node: Node<'a>,
    pub parent: Option<Node<'a>>,
}

/// Callbacks invoked by [`walk`].
pub trait Visitor {
    /// Called before the children of a node are visited.
    ///
    /// Returning false skips the children of the node and its `post` call.
    fn pre(&mut self, cursor: &Cursor<'_>) -> bool;

    /// Called after the children of a node were visited.
    ///
    /// Returning false stops the whole walk.
    fn post(&mut self, cursor: &Cursor<'_>) -> bool;
}

/// Walks `stmt` depth first. Returns false if a `post` hook stopped the walk.
pub fn walk<V: Visitor + ?Sized>(stmt: &SelectStatement, visitor: &mut V) -> bool {
    walk_node(Node::statement(stmt), None, visitor)
}

fn walk_node<'a, V: Visitor + ?Sized>(
    node: Node<'a>,
    parent: Option<Node<'a>>,
    visitor: &mut V,
) -> bool {
    let cursor = Cursor { node, parent };
    if !visitor.pre(&cursor) {
        return true;
    }
    for child in node.children() {
        if !walk_node(child, Some(node), visitor) {
            return false;
        }
    }
    visitor.post(&cursor)
}

// ============================================================================
// Node numbering
// ============================================================================

struct MaxId(u32);

impl Visitor for MaxId {
    fn pre(&mut self, cursor: &Cursor<'_>) -> bool {
        if let Some(id) = cursor.node.id() {
            self.0 = self.0.max(id.0);
        }
        true
    }

    fn post(&mut self, _cursor: &Cursor<'_>) -> bool {
        true
    }
}

struct Numbering {
    next: u32,
    seen: BTreeSet<NodeId>,
    assigned: usize,
}

impl Numbering {
    fn number(&mut self, id: &mut NodeId) {
        if id.is_assigned() && self.seen.insert(*id) {
            return;
        }
        self.next += 1;
        *id = NodeId(self.next);
        self.seen.insert(*id);
        self.assigned += 1;
    }

    fn statement(&mut self, stmt: &mut SelectStatement) {
        match stmt {
            SelectStatement::Select(sel) => self.select(sel),
            SelectStatement::Union(union) => {
                self.number(&mut union.id);
                self.statement(&mut union.left);
                self.statement(&mut union.right);
                self.orders(&mut union.order_by);
                if let Some(limit) = &mut union.limit {
                    self.limit(limit);
                }
            }
        }
    }

    fn select(&mut self, sel: &mut Select) {
        self.number(&mut sel.id);
        for table_expr in &mut sel.from {
            self.table_expr(table_expr);
        }
        for select_expr in &mut sel.exprs {
            self.select_expr(select_expr);
        }
        if let Some(where_clause) = &mut sel.where_clause {
            self.expr(where_clause);
        }
        for expr in &mut sel.group_by {
            self.expr(expr);
        }
        if let Some(having) = &mut sel.having {
            self.expr(having);
        }
        self.orders(&mut sel.order_by);
        if let Some(limit) = &mut sel.limit {
            self.limit(limit);
        }
    }

    fn orders(&mut self, orders: &mut [Order]) {
        for order in orders {
            self.expr(&mut order.expr);
        }
    }

    fn limit(&mut self, limit: &mut Limit) {
        if let Some(offset) = &mut limit.offset {
            self.expr(offset);
        }
        self.expr(&mut limit.count);
    }

    fn select_expr(&mut self, select_expr: &mut SelectExpr) {
        if let SelectExpr::Aliased(aliased) = select_expr {
            self.expr(&mut aliased.expr);
        }
    }

    fn table_expr(&mut self, table_expr: &mut TableExpr) {
        match table_expr {
            TableExpr::Aliased(aliased) => {
                self.number(&mut aliased.id);
                if let SimpleTableExpr::Derived(derived) = &mut aliased.expr {
                    self.statement(&mut derived.select);
                }
            }
            TableExpr::Join(join) => {
                self.table_expr(&mut join.left);
                self.table_expr(&mut join.right);
                if let Some(on) = &mut join.condition.on {
                    self.expr(on);
                }
            }
            TableExpr::Paren(exprs) => {
                for expr in exprs {
                    self.table_expr(expr);
                }
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        self.number(&mut expr.id);
        match &mut expr.kind {
            ExprKind::Column(_) | ExprKind::Literal(_) | ExprKind::Variable(_) => {}
            ExprKind::Binary { left, right, .. }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::And(left, right)
            | ExprKind::Or(left, right) => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Not(inner) | ExprKind::Unary { expr: inner, .. } | ExprKind::IsNull { expr: inner, .. } => {
                self.expr(inner);
            }
            ExprKind::Func(func) => {
                for arg in &mut func.args {
                    self.select_expr(arg);
                }
            }
            ExprKind::Subquery(subquery) | ExprKind::Exists(subquery) => {
                self.statement(&mut subquery.select);
            }
            ExprKind::Tuple(exprs) => {
                for expr in exprs {
                    self.expr(expr);
                }
            }
        }
    }
}

/// Gives every identity-carrying node of `stmt` a unique [`NodeId`].
///
/// Nodes that already hold a unique id keep it. Unassigned nodes and later
/// copies of a duplicated id receive fresh ids above the current maximum, in
/// visiting order, so numbering the same tree twice yields the same ids.
/// Returns the number of ids handed out.
pub fn assign_node_ids(stmt: &mut SelectStatement) -> usize {
    let mut max = MaxId(0);
    walk(stmt, &mut max);
    let mut numbering = Numbering {
        next: max.0,
        seen: BTreeSet::new(),
        assigned: 0,
    };
    numbering.statement(stmt);
    numbering.assigned
}
