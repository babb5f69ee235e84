//! Contract tests for scoping and table identity.
//!
//! These tests verify:
//! - Table identities follow the FROM-first walk order
//! - Inner scopes shadow outer ones, derived tables see no outer tables
//! - Table names are case sensitive, column names are not

use sqlsem::parser::ast::{SelectExpr, SelectStatement};
use sqlsem::rewrite::no_rewrite;
use sqlsem::semantics::TableInfo;
use sqlsem::{analyze, parse_query, ErrorKind, TableSet};

use crate::{contract_catalog, try_analyze};

fn names(sql: &str) -> Vec<String> {
    try_analyze(sql)
        .unwrap()
        .tables()
        .iter()
        .map(|table| table.table_name().to_string())
        .collect()
}

#[test]
fn test_table_identity_order() {
    // Contract: tables are numbered as their FROM items are left
    assert_eq!(
        names("select (select 1 from music) from user as u, (select id from user_extra) as d"),
        vec!["u", "user_extra", "d", "music"]
    );
}

#[test]
fn test_inner_scope_shadows_outer() {
    // Contract: the innermost scope that knows a column wins
    let mut stmt = parse_query("select id from user where id in (select id from user_extra)").unwrap();
    let semtable = analyze(&mut stmt, "ks", &contract_catalog(), no_rewrite).unwrap();
    let sel = stmt.first_select();
    let subquery = semtable.subqueries_of(sel.id)[0];
    assert!(!semtable.subquery_info(subquery).unwrap().correlated);
}

#[test]
fn test_derived_table_cannot_see_outer_tables() {
    // Contract: a derived table is analyzed as an independent statement
    let err = try_analyze("select 1 from user, (select user.col as c from user_extra) as d").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
}

#[test]
fn test_name_case_rules() {
    // Contract: column names match case-insensitively
    assert!(try_analyze("select ID, User.Col from user as User").is_ok());
    // Contract: table names and aliases match case-sensitively
    let err = try_analyze("select USER.id from user").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
}

#[test]
fn test_database_qualified_names() {
    // Contract: a database qualifier must name the table's database
    assert!(try_analyze("select ks.user.id from ks.user").is_ok());
    assert!(try_analyze("select ks.user.id from user").is_ok());
    let err = try_analyze("select other.user.id from user").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    let err = try_analyze("select 1 from other.user").unwrap_err();
    assert_eq!(err.to_string(), "table other.user not found");
}

#[test]
fn test_incomplete_schemas_resolve_conservatively() {
    // Contract: a missing column binds to the only incomplete table in scope
    let semtable = try_analyze("select genre from user, music").unwrap();
    assert!(semtable.projection_error().is_none());

    let mut stmt = parse_query("select genre from user, music where music.genre = 'x'").unwrap();
    let semtable = analyze(&mut stmt, "ks", &contract_catalog(), no_rewrite).unwrap();
    let SelectStatement::Select(sel) = &stmt else {
        panic!("expected select");
    };
    let SelectExpr::Aliased(genre) = &sel.exprs[0] else {
        panic!("star");
    };
    assert_eq!(semtable.direct_deps(&genre.expr), TableSet::single(1));
    assert!(matches!(semtable.table_info(1), Some(TableInfo::Physical(t)) if !t.schema.authoritative));
    assert_eq!(semtable.type_for(&genre.expr), None);
}

#[test]
fn test_dual_is_always_available() {
    assert!(try_analyze("select 1 from dual").is_ok());
    assert!(try_analyze("select 1 from DUAL").is_ok());
    let err = try_analyze("select 1 from ks.dual").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
}
