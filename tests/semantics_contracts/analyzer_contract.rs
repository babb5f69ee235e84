//! Contract tests for the Analyzer.
//!
//! These tests verify the orchestration contracts:
//! - Hard errors abort the analysis and no table is returned
//! - Projection ambiguity is deferred, everywhere else it is fatal
//! - The rewrite runs exactly once, between the two passes
//! - Node identities survive the rewrite

use std::cell::Cell;

use sqlsem::parser::ast::{AliasedExpr, Expr, Literal, SelectExpr, SelectStatement, TableExpr};
use sqlsem::rewrite::no_rewrite;
use sqlsem::{analyze, analyze_with_config, parse_query, AnalyzerConfig, ErrorKind};

use crate::{contract_catalog, try_analyze};

#[test]
fn test_first_hard_error_wins() {
    // Contract: the pre-rewrite pass stops at the first failing construct
    let err = try_analyze("select 1 from user natural join user_extra where x in (select 1 union select 2)")
        .unwrap_err();
    assert_eq!(err.to_string(), "unsupported: natural join");
}

#[test]
fn test_deferral_applies_only_to_projection() {
    // Contract: ambiguity in the projection list is deferred
    let semtable = try_analyze("select col, id + 1 from user, user_extra").unwrap();
    assert_eq!(
        semtable.projection_error().map(|e| e.kind()),
        Some(ErrorKind::AmbiguousReference)
    );

    // Contract: the same reference anywhere else is fatal
    for sql in [
        "select 1 from user, user_extra where col = 1",
        "select 1 from user, user_extra group by col",
        "select 1 from user, user_extra order by col",
        "select 1 from user join user_extra on col = 1",
        "select 1 from user, user_extra having col > 0",
    ] {
        let err = try_analyze(sql).expect_err(sql);
        assert_eq!(err.kind(), ErrorKind::AmbiguousReference, "{sql}");
    }
}

#[test]
fn test_deferral_never_hides_other_errors() {
    // Contract: unresolved names in the projection are not deferred
    let err = try_analyze("select nope from user, user_extra").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);

    // Contract: a later hard error still fails after a deferral
    let err = try_analyze("select col from user, user_extra where nope = 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
}

#[test]
fn test_deferral_can_be_disabled() {
    let mut stmt = parse_query("select col from user, user_extra").unwrap();
    let config = AnalyzerConfig::new().with_projection_ambiguity_deferral(false);
    let err = analyze_with_config(&mut stmt, "ks", &contract_catalog(), config, no_rewrite).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousReference);
}

#[test]
fn test_rewrite_runs_once_between_passes() {
    // Contract: construct errors are raised before the rewrite is called
    let calls = Cell::new(0);
    let mut stmt = parse_query("select 1 from user join user_extra using (id)").unwrap();
    let result = analyze(&mut stmt, "ks", &contract_catalog(), |_, _| {
        calls.set(calls.get() + 1);
        Ok(())
    });
    assert!(result.is_err());
    assert_eq!(calls.get(), 0);

    // Contract: binding errors are raised after it
    let mut stmt = parse_query("select nope from user").unwrap();
    let result = analyze(&mut stmt, "ks", &contract_catalog(), |_, _| {
        calls.set(calls.get() + 1);
        Ok(())
    });
    assert!(result.is_err());
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_rewritten_nodes_are_bound() {
    // Contract: expressions added by the rewrite get ids, deps and types
    let mut stmt = parse_query("select id from user").unwrap();
    let semtable = analyze(&mut stmt, "ks", &contract_catalog(), |stmt, provisional| {
        assert_eq!(provisional.tables().len(), 1);
        if let SelectStatement::Select(sel) = stmt {
            sel.exprs.push(SelectExpr::Aliased(AliasedExpr::new(Expr::column(None, "col"))));
            sel.exprs.push(SelectExpr::Aliased(AliasedExpr::new(Expr::literal(Literal::Int("7".into())))));
        }
        Ok(())
    })
    .unwrap();

    let sel = stmt.first_select();
    let mut ids = Vec::new();
    for select_expr in &sel.exprs {
        let SelectExpr::Aliased(aliased) = select_expr else {
            panic!("star");
        };
        assert!(aliased.expr.id.is_assigned());
        assert!(semtable.type_for(&aliased.expr).is_some());
        ids.push(aliased.expr.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 3);

    let SelectExpr::Aliased(col) = &sel.exprs[1] else {
        panic!("star");
    };
    let TableExpr::Aliased(user) = &sel.from[0] else {
        panic!("expected a plain table");
    };
    assert_eq!(semtable.direct_deps(&col.expr), semtable.table_set_for(user));
}
