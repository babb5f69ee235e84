//! Two-pass semantic analysis around a caller-supplied rewrite.
//!
//! The first pass checks constructs, builds scopes and registers tables. The
//! rewrite then runs against a provisional [`SemTable`] holding only the
//! tables. The second pass re-enters the scopes, binds every expression and
//! infers types.
//!
//! Errors are sticky: after the first hard error, `pre` hooks stop doing work
//! but keep the walk going, and the next `post` hook stops it.

use tracing::debug;

use crate::catalog::SchemaInformation;
use crate::error::{ErrorKind, Result, SqlsemError};
use crate::parser::ast::SelectStatement;
use crate::parser::walk::{assign_node_ids, walk, Cursor, Node, Visitor};

use super::binder::Binder;
use super::checks::ConstructChecks;
use super::config::AnalyzerConfig;
use super::scoper::Scoper;
use super::semtable::SemTable;
use super::table_collector::TableCollector;
use super::typer::Typer;

/// The pass an analyzer hook runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the rewrite: checks, scopes and tables.
    PreRewrite,
    /// After the rewrite: binding and typing.
    PostRewrite,
}

struct Analyzer<'s> {
    config: AnalyzerConfig,
    scoper: Scoper,
    collector: TableCollector<'s>,
    checks: ConstructChecks,
    binder: Binder,
    typer: Typer,
    /// One counter per enclosing SELECT / UNION; positive while inside its
    /// projection list.
    projection: Vec<u32>,
    err: Option<SqlsemError>,
    projection_err: Option<SqlsemError>,
    comments: Vec<String>,
}

fn is_projection(cursor: &Cursor<'_>) -> bool {
    matches!(
        (cursor.node, cursor.parent),
        (Node::SelectExprs(_), Some(Node::Select(_)))
    )
}

impl<'s> Analyzer<'s> {
    fn new(schema: &'s dyn SchemaInformation, current_db: &str, config: AnalyzerConfig) -> Self {
        Analyzer {
            config,
            scoper: Scoper::new(),
            collector: TableCollector::new(schema, current_db),
            checks: ConstructChecks::new(),
            binder: Binder::new(config.equality_closure),
            typer: Typer::new(),
            projection: Vec::new(),
            err: None,
            projection_err: None,
            comments: Vec::new(),
        }
    }

    fn run(&mut self, stmt: &SelectStatement, phase: Phase) -> Result<()> {
        let mut pass = Pass {
            analyzer: self,
            phase,
        };
        walk(stmt, &mut pass);
        match self.err.take() {
            Some(err) => {
                debug!(?phase, error = %err, "analysis failed");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn in_projection(&self) -> bool {
        self.projection.last().is_some_and(|count| *count > 0)
    }

    fn enter_projection(&mut self, cursor: &Cursor<'_>) {
        match cursor.node {
            Node::Select(_) | Node::Union(_) => self.projection.push(0),
            _ if is_projection(cursor) => {
                if let Some(count) = self.projection.last_mut() {
                    *count += 1;
                }
            }
            _ => {}
        }
    }

    fn leave_projection(&mut self, cursor: &Cursor<'_>) {
        match cursor.node {
            Node::Select(_) | Node::Union(_) => {
                self.projection.pop();
            }
            _ if is_projection(cursor) => {
                if let Some(count) = self.projection.last_mut() {
                    *count = count.saturating_sub(1);
                }
            }
            _ => {}
        }
    }

    fn set_error(&mut self, err: SqlsemError, cursor: &Cursor<'_>) {
        let deferred = err.kind() == ErrorKind::AmbiguousReference
            && self.in_projection()
            && self.config.defer_projection_ambiguity;
        if !deferred {
            self.err = Some(err);
            return;
        }
        debug!(error = %err, "deferring ambiguous column in projection");
        if let Some(id) = cursor.node.id() {
            self.binder.mark_unbound(id);
        }
        self.projection_err = Some(err);
    }

    fn pre(&mut self, cursor: &Cursor<'_>, phase: Phase) -> Result<()> {
        match phase {
            Phase::PreRewrite => {
                self.checks.down(cursor)?;
                self.scoper.down(cursor)
            }
            Phase::PostRewrite => {
                self.scoper.down_post(cursor)?;
                self.binder.down(cursor, &self.scoper, &self.collector.tables)
            }
        }
    }

    fn post(&mut self, cursor: &Cursor<'_>, phase: Phase) -> Result<()> {
        match phase {
            Phase::PreRewrite => {
                if let Some(table) = self.collector.up(cursor, &self.scoper)? {
                    self.scoper.add_table(table, &self.collector.tables)?;
                }
                self.scoper.up(cursor, &self.collector.tables)?;
                self.checks.up(cursor);
            }
            Phase::PostRewrite => {
                self.binder.up(cursor);
                self.collector.up_post(cursor)?;
                self.typer.up(cursor, &self.binder, &self.collector.tables);
                self.scoper.up_post(cursor)?;
            }
        }
        Ok(())
    }

    /// Table information only, handed to the rewrite.
    fn provisional(&self) -> SemTable {
        SemTable {
            tables: self.collector.tables.clone(),
            table_nodes: self.collector.by_node.clone(),
            statement_tables: self.scoper.statement_tables(),
            comments: self.comments.clone(),
            ..SemTable::default()
        }
    }

    fn finish(self) -> SemTable {
        let statement_tables = self.scoper.statement_tables();
        SemTable {
            tables: self.collector.tables,
            table_nodes: self.collector.by_node,
            direct: self.binder.direct,
            recursive: self.binder.recursive,
            expr_types: self.typer.types,
            statement_tables,
            subqueries: self.binder.subqueries,
            subquery_info: self.binder.subquery_info,
            column_equalities: self.binder.equalities.known,
            comments: self.comments,
            projection_error: self.projection_err,
        }
    }
}

/// Visitor driving one pass of an [`Analyzer`].
struct Pass<'a, 's> {
    analyzer: &'a mut Analyzer<'s>,
    phase: Phase,
}

impl Visitor for Pass<'_, '_> {
    fn pre(&mut self, cursor: &Cursor<'_>) -> bool {
        let analyzer = &mut *self.analyzer;
        if analyzer.err.is_some() {
            return true;
        }
        analyzer.enter_projection(cursor);
        if let Err(err) = analyzer.pre(cursor, self.phase) {
            analyzer.set_error(err, cursor);
        }
        true
    }

    fn post(&mut self, cursor: &Cursor<'_>) -> bool {
        let analyzer = &mut *self.analyzer;
        if analyzer.err.is_some() {
            return false;
        }
        if let Err(err) = analyzer.post(cursor, self.phase) {
            analyzer.set_error(err, cursor);
        }
        analyzer.leave_projection(cursor);
        analyzer.err.is_none()
    }
}

/// Analyzes `stmt` with the default [`AnalyzerConfig`].
///
/// See [`analyze_with_config`].
///
/// # Errors
///
/// Returns the first hard error found in either pass, or the error of the
/// rewrite step.
pub fn analyze<F>(
    stmt: &mut SelectStatement,
    current_db: &str,
    schema: &dyn SchemaInformation,
    rewrite: F,
) -> Result<SemTable>
where
    F: FnOnce(&mut SelectStatement, &SemTable) -> Result<()>,
{
    analyze_with_config(stmt, current_db, schema, AnalyzerConfig::default(), rewrite)
}

/// Analyzes `stmt`, resolving unqualified tables in `current_db`.
///
/// Node ids are assigned before the first pass. `rewrite` runs exactly once
/// between the passes and may mutate the statement; nodes it adds receive
/// fresh ids while existing ones keep theirs.
///
/// # Errors
///
/// Returns the first hard error found in either pass, or the error of the
/// rewrite step. An ambiguous column directly inside a projection list is
/// not a hard error when deferral is enabled; it is available through
/// [`SemTable::projection_error`].
pub fn analyze_with_config<F>(
    stmt: &mut SelectStatement,
    current_db: &str,
    schema: &dyn SchemaInformation,
    config: AnalyzerConfig,
    rewrite: F,
) -> Result<SemTable>
where
    F: FnOnce(&mut SelectStatement, &SemTable) -> Result<()>,
{
    let numbered = assign_node_ids(stmt);
    let mut analyzer = Analyzer::new(schema, current_db, config);
    analyzer.comments = stmt.comments().to_vec();

    debug!(db = current_db, nodes = numbered, "starting pre-rewrite pass");
    analyzer.run(stmt, Phase::PreRewrite)?;

    let provisional = analyzer.provisional();
    rewrite(stmt, &provisional)?;
    let added = assign_node_ids(stmt);

    debug!(
        tables = analyzer.collector.tables.len(),
        added, "starting post-rewrite pass"
    );
    analyzer.run(stmt, Phase::PostRewrite)?;

    let semtable = analyzer.finish();
    debug!(
        exprs = semtable.direct.len(),
        deferred = semtable.projection_error.is_some(),
        "analysis complete"
    );
    Ok(semtable)
}
