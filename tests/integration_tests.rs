//! Integration tests for the full parse + analyze workflow.

use sqlsem::catalog::{CachedSchema, Catalog, ColumnDef, TableSchema};
use sqlsem::parser::ast::{Expr, SelectExpr, SelectStatement, TableName};
use sqlsem::rewrite::{expand_star, no_rewrite};
use sqlsem::semantics::{ColumnName, TableInfo};
use sqlsem::types::SqlType;
use sqlsem::{
    analyze, analyze_with_config, parse_query, AnalyzerConfig, EqualityClosure, ErrorKind,
    SemTable, SqlsemError, TableSet,
};

fn table(name: &str, columns: &[(&str, SqlType)]) -> TableSchema {
    TableSchema::new(
        name,
        columns
            .iter()
            .map(|(column, ty)| ColumnDef::new(*column, *ty).expect("column"))
            .collect(),
    )
    .expect("table")
}

fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .create_table(
            "information_schema",
            table(
                "tables",
                &[("table_schema", SqlType::VarChar), ("table_name", SqlType::VarChar), ("x", SqlType::Int64)],
            ),
        )
        .unwrap();
    catalog
        .create_table(
            "information_schema",
            table(
                "columns",
                &[("table_schema", SqlType::VarChar), ("column_name", SqlType::VarChar), ("x", SqlType::Int64)],
            ),
        )
        .unwrap();
    catalog
        .create_table(
            "ks",
            table("user", &[("id", SqlType::Int64), ("name", SqlType::VarChar), ("col", SqlType::Int32)]),
        )
        .unwrap();
    catalog
        .create_table(
            "ks",
            table(
                "user_extra",
                &[("id", SqlType::Int64), ("user_id", SqlType::Int64), ("col", SqlType::Int32)],
            ),
        )
        .unwrap();
    catalog
        .create_table(
            "ks",
            table("music", &[("id", SqlType::Int64), ("user_id", SqlType::Uint32)]).non_authoritative(),
        )
        .unwrap();
    catalog
}

fn analyze_in(db: &str, sql: &str) -> sqlsem::Result<(SelectStatement, SemTable)> {
    let mut stmt = parse_query(sql)?;
    let semtable = analyze(&mut stmt, db, &catalog(), no_rewrite)?;
    Ok((stmt, semtable))
}

fn analyze_ks(sql: &str) -> sqlsem::Result<(SelectStatement, SemTable)> {
    analyze_in("ks", sql)
}

fn projected(stmt: &SelectStatement, index: usize) -> &Expr {
    match &stmt.first_select().exprs[index] {
        SelectExpr::Aliased(aliased) => &aliased.expr,
        SelectExpr::Star(star) => panic!("unexpected {star}"),
    }
}

fn set(tables: &[usize]) -> TableSet {
    tables.iter().copied().collect()
}

// =============================================================================
// Scenarios
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn test_aliased_information_schema_table() {
        let (stmt, semtable) =
            analyze_in("information_schema", "select t.table_schema from tables t").unwrap();
        assert_eq!(semtable.tables().len(), 1);
        assert_eq!(semtable.tables()[0].table_name(), TableName::new("t"));
        assert_eq!(semtable.direct_deps(projected(&stmt, 0)), set(&[0]));
        assert_eq!(semtable.type_for(projected(&stmt, 0)), Some(SqlType::VarChar));
    }

    #[test]
    fn test_join_using_is_unsupported() {
        let err = analyze_in(
            "information_schema",
            "select 1 from tables t join columns c on c.x = t.x using (x)",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
        assert!(err.to_string().contains("join with USING(column_list)"));
    }

    #[test]
    fn test_into_in_derived_table() {
        let err = analyze_ks("select * from (select 1 into @v) as d").unwrap_err();
        assert_eq!(
            err,
            SqlsemError::InvalidArgument("Incorrect usage/placement of 'INTO'".into())
        );
    }

    #[test]
    fn test_natural_join_in_subquery() {
        let err = analyze_ks("select (select 5 from dual natural join user)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
        assert_eq!(err.to_string(), "unsupported: natural join");
    }

    #[test]
    fn test_ambiguity_deferral_boundary() {
        let err = analyze_ks("select 1 from user, user_extra where col = 1").unwrap_err();
        assert_eq!(
            err,
            SqlsemError::AmbiguousReference("Column 'col' in field list is ambiguous".into())
        );

        let (_, semtable) = analyze_ks("select col from user, user_extra").unwrap();
        let deferred = semtable.projection_error().expect("deferred error");
        assert_eq!(deferred.kind(), ErrorKind::AmbiguousReference);
    }

    #[test]
    fn test_duplicate_derived_column() {
        let err = analyze_ks("select * from (select id, id from user) as d").unwrap_err();
        assert_eq!(err, SqlsemError::InvalidArgument("Duplicate column name 'id'".into()));

        let err = analyze_ks("select * from (select name as id, id from user) as d").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

// =============================================================================
// Dependencies
// =============================================================================

mod dependencies {
    use super::*;

    #[test]
    fn test_derived_table_is_transparent_for_base_deps() {
        let (stmt, semtable) = analyze_ks(
            "select d.x, d.n from (select user.id as x, user_extra.col + 1 as n \
             from user join user_extra on user.id = user_extra.user_id) as d",
        )
        .unwrap();
        // inner tables are registered before the derived table itself
        assert_eq!(semtable.tables().len(), 3);
        assert!(semtable.tables()[2].as_derived().is_some());

        let x = projected(&stmt, 0);
        assert_eq!(semtable.direct_deps(x), set(&[2]));
        assert_eq!(semtable.recursive_deps(x), set(&[0]));
        assert_eq!(semtable.type_for(x), Some(SqlType::Int64));

        let n = projected(&stmt, 1);
        assert_eq!(semtable.recursive_deps(n), set(&[1]));
        assert_eq!(semtable.type_for(n), Some(SqlType::Int64));
    }

    #[test]
    fn test_uncorrelated_subquery_has_no_deps() {
        let (stmt, semtable) =
            analyze_ks("select id from user where id in (select user_id from user_extra)").unwrap();
        let sel = stmt.first_select();
        let subqueries = semtable.subqueries_of(sel.id);
        assert_eq!(subqueries.len(), 1);
        let info = semtable.subquery_info(subqueries[0]).unwrap();
        assert!(!info.correlated);
        assert_eq!(info.outer_select, sel.id);

        let where_clause = sel.where_clause.as_ref().unwrap();
        assert_eq!(semtable.direct_deps(where_clause), set(&[0]));
        assert_eq!(semtable.tables_in_select(sel.id), set(&[0]));
        assert_eq!(semtable.tables_in_select(info.inner_select), set(&[1]));
    }

    #[test]
    fn test_correlated_subquery_depends_on_outer_table() {
        let (stmt, semtable) = analyze_ks(
            "select id, (select max(col) from user_extra where user_extra.user_id = user.id) from user",
        )
        .unwrap();
        let subquery = projected(&stmt, 1);
        assert_eq!(semtable.direct_deps(subquery), set(&[0]));
        assert_eq!(semtable.recursive_deps(subquery), set(&[0]));
        assert_eq!(semtable.type_for(subquery), Some(SqlType::Int32));
        assert!(semtable.subquery_info(subquery.id).unwrap().correlated);
    }

    #[test]
    fn test_order_by_alias_binds_to_projection() {
        let (stmt, semtable) = analyze_ks("select col + 1 as k from user order by k desc").unwrap();
        let order = &stmt.first_select().order_by[0].expr;
        assert_eq!(semtable.direct_deps(order), set(&[0]));
        assert_eq!(semtable.type_for(order), Some(SqlType::Int64));
    }

    #[test]
    fn test_union_order_by_uses_first_select_names() {
        let (stmt, semtable) =
            analyze_ks("select id from user union select user_id from user_extra order by id").unwrap();
        let SelectStatement::Union(union) = &stmt else {
            panic!("expected union");
        };
        let order = &union.order_by[0].expr;
        assert_eq!(semtable.direct_deps(order), set(&[0]));
    }

    #[test]
    fn test_join_condition_sees_only_its_join() {
        let err = analyze_ks("select 1 from user_extra, user join music on music.id = user_extra.id")
            .unwrap_err();
        assert_eq!(err, SqlsemError::UnresolvedReference("symbol user_extra.id not found".into()));
    }

    #[test]
    fn test_deps_stay_within_visible_tables() {
        let queries = [
            "select id, name from user where col > 3 order by name",
            "select u.id from user as u join user_extra as e on u.id = e.user_id where e.col in (1, 2)",
            "select x from (select id as x from user) as d where x = 5",
            "select id from user where exists (select 1 from user_extra where user_extra.id = user.id)",
        ];
        for sql in queries {
            let (_, semtable) = analyze_ks(sql).unwrap();
            for (node, deps) in semtable.recursive_dependencies() {
                for table in deps.iter() {
                    assert!(
                        matches!(semtable.table_info(table), Some(TableInfo::Physical(_))),
                        "{sql}: {node} depends on non-physical table {table}"
                    );
                }
            }
            for deps in semtable.direct_dependencies().values() {
                assert!(deps.iter().all(|table| table < semtable.tables().len()), "{sql}");
            }
        }
    }
}

// =============================================================================
// Types and schema
// =============================================================================

mod typing {
    use super::*;

    #[test]
    fn test_expression_types() {
        let (stmt, semtable) = analyze_ks(
            "select id + 1.5, count(*), name, col / 2, col div 2, -col, id = 1, 1e3 from user group by name",
        )
        .unwrap();
        let types: Vec<Option<SqlType>> =
            (0..8).map(|i| semtable.type_for(projected(&stmt, i))).collect();
        assert_eq!(
            types,
            vec![
                Some(SqlType::Decimal),
                Some(SqlType::Int64),
                Some(SqlType::VarChar),
                Some(SqlType::Decimal),
                Some(SqlType::Int64),
                Some(SqlType::Int32),
                Some(SqlType::Int64),
                Some(SqlType::Float64),
            ]
        );
    }

    #[test]
    fn test_non_authoritative_table_binds_unknown_columns() {
        let (stmt, semtable) = analyze_ks("select music.genre, user_id, genre from music").unwrap();
        assert_eq!(semtable.direct_deps(projected(&stmt, 0)), set(&[0]));
        assert_eq!(semtable.type_for(projected(&stmt, 0)), None);
        assert_eq!(semtable.type_for(projected(&stmt, 1)), Some(SqlType::Uint32));
        assert_eq!(semtable.direct_deps(projected(&stmt, 2)), set(&[0]));
    }

    #[test]
    fn test_known_column_wins_over_incomplete_table() {
        let (stmt, semtable) = analyze_ks("select name from user, music").unwrap();
        assert_eq!(semtable.direct_deps(projected(&stmt, 0)), set(&[0]));
        assert!(semtable.projection_error().is_none());
    }

    #[test]
    fn test_unknown_names() {
        let err = analyze_ks("select a from nope").unwrap_err();
        assert_eq!(err, SqlsemError::UnresolvedReference("table nope not found".into()));

        let err = analyze_ks("select zz from user").unwrap_err();
        assert_eq!(err, SqlsemError::UnresolvedReference("symbol zz not found".into()));
    }

    #[test]
    fn test_dual_and_locks() {
        let (stmt, semtable) = analyze_ks("select get_lock('a', 10) from dual").unwrap();
        assert_eq!(semtable.type_for(projected(&stmt, 0)), Some(SqlType::Int64));

        let err = analyze_ks("select release_lock('a') from user").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn test_comments_are_kept() {
        let (_, semtable) = analyze_ks("select /* vt+ PLANNER=gen4 */ id from user").unwrap();
        assert_eq!(semtable.comments(), &[" vt+ PLANNER=gen4 ".to_string()]);
    }

    #[test]
    fn test_analysis_through_shared_cache() {
        let cached = CachedSchema::new(catalog());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut stmt = parse_query("select id from user where col = 1").unwrap();
                    let semtable = analyze(&mut stmt, "ks", &cached, no_rewrite).unwrap();
                    assert_eq!(semtable.tables().len(), 1);
                });
            }
        });
        assert_eq!(cached.hits() + cached.misses(), 4);
    }
}

// =============================================================================
// Column equalities
// =============================================================================

mod equalities {
    use super::*;

    const SQL: &str = "select 1 from user, user_extra \
                       where user.id = user_extra.user_id and user_extra.user_id = 5 and user.col > 1";

    fn printed(semtable: &SemTable, table: usize, column: &str) -> Vec<String> {
        semtable
            .column_equalities(&ColumnName::new(TableSet::single(table), column))
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_pairwise() {
        let (_, semtable) = analyze_ks(SQL).unwrap();
        assert_eq!(printed(&semtable, 0, "id"), vec!["user_extra.user_id"]);
        assert_eq!(printed(&semtable, 1, "USER_ID"), vec!["user.id", "5"]);
        assert!(printed(&semtable, 0, "col").is_empty());
    }

    #[test]
    fn test_transitive() {
        let mut stmt = parse_query(SQL).unwrap();
        let config = AnalyzerConfig::new().with_equality_closure(EqualityClosure::Transitive);
        let semtable = analyze_with_config(&mut stmt, "ks", &catalog(), config, no_rewrite).unwrap();
        assert_eq!(printed(&semtable, 0, "id"), vec!["user_extra.user_id", "5"]);
        assert_eq!(printed(&semtable, 1, "user_id"), vec!["user.id", "5"]);
    }

    #[test]
    fn test_disjunctions_are_ignored() {
        let (_, semtable) =
            analyze_ks("select 1 from user, user_extra where user.id = user_extra.user_id or user.col = 2")
                .unwrap();
        assert!(semtable.all_column_equalities().is_empty());
    }

    #[test]
    fn test_join_conditions_count() {
        let (_, semtable) =
            analyze_ks("select 1 from user join user_extra on user.id = user_extra.user_id").unwrap();
        assert_eq!(printed(&semtable, 0, "id"), vec!["user_extra.user_id"]);
    }
}

// =============================================================================
// Rewrite
// =============================================================================

mod rewrite {
    use super::*;

    #[test]
    fn test_star_expansion_is_bound_and_typed() {
        let mut stmt = parse_query("select * from user join user_extra on user.id = user_extra.user_id").unwrap();
        let semtable = analyze(&mut stmt, "ks", &catalog(), expand_star).unwrap();
        assert_eq!(
            stmt.to_string(),
            "select user.id, user.name, user.col, user_extra.id, user_extra.user_id, user_extra.col \
             from user join user_extra on user.id = user_extra.user_id"
        );
        assert_eq!(semtable.direct_deps(projected(&stmt, 4)), set(&[1]));
        assert_eq!(semtable.type_for(projected(&stmt, 1)), Some(SqlType::VarChar));
    }

    #[test]
    fn test_star_expansion_through_derived_table() {
        let mut stmt = parse_query("select * from (select * from user) as d where d.col = 1").unwrap();
        let semtable = analyze(&mut stmt, "ks", &catalog(), expand_star).unwrap();
        let name = projected(&stmt, 1);
        assert_eq!(name.to_string(), "d.name");
        assert_eq!(semtable.direct_deps(name), set(&[1]));
        assert_eq!(semtable.recursive_deps(name), set(&[0]));
        assert_eq!(semtable.type_for(name), Some(SqlType::VarChar));
    }

    #[test]
    fn test_expanded_duplicates_are_rejected() {
        let mut stmt = parse_query("select * from (select * from user, user_extra) as d").unwrap();
        let err = analyze(&mut stmt, "ks", &catalog(), expand_star).unwrap_err();
        assert_eq!(err, SqlsemError::InvalidArgument("Duplicate column name 'id'".into()));
    }

    #[test]
    fn test_no_op_rewrite_is_idempotent() {
        let mut stmt = parse_query(
            "select u.id, count(*) from user as u where u.col in (select col from user_extra) group by u.id",
        )
        .unwrap();
        let first = analyze(&mut stmt, "ks", &catalog(), no_rewrite).unwrap();
        let printed = stmt.to_string();
        let second = analyze(&mut stmt, "ks", &catalog(), no_rewrite).unwrap();

        assert_eq!(stmt.to_string(), printed);
        assert_eq!(first.direct_dependencies(), second.direct_dependencies());
        assert_eq!(first.recursive_dependencies(), second.recursive_dependencies());
        assert_eq!(first.expr_types(), second.expr_types());
        assert_eq!(first.tables().len(), second.tables().len());
    }
}

// =============================================================================
// Determinism
// =============================================================================

mod determinism {
    use super::*;
    use proptest::prelude::*;

    const QUERIES: &[&str] = &[
        "select id from user",
        "select u.name, e.col from user as u join user_extra as e on u.id = e.user_id where e.col > 2",
        "select d.x from (select id as x, col from user) as d where d.col = 1 order by x",
        "select id from user where exists (select 1 from user_extra where user_extra.id = user.id)",
        "select count(*), name from user group by name having count(*) > 1",
        "select id from user union all select user_id from user_extra limit 10",
    ];

    fn snapshot(sql: &str) -> String {
        let mut stmt = parse_query(sql).unwrap();
        let semtable = analyze(&mut stmt, "ks", &catalog(), expand_star).unwrap();
        format!(
            "{stmt}|{:?}|{:?}|{:?}",
            semtable.direct_dependencies(),
            semtable.recursive_dependencies(),
            semtable.expr_types()
        )
    }

    #[test]
    fn test_repeated_analysis_is_identical() {
        for sql in QUERIES {
            assert_eq!(snapshot(sql), snapshot(sql), "{sql}");
        }
    }

    proptest! {
        #[test]
        fn prop_analysis_is_deterministic(
            index in 0..QUERIES.len(),
            literal in 0u32..10_000,
        ) {
            let sql = format!("select id from user where col > 1 and id = {literal}");
            prop_assert_eq!(snapshot(&sql), snapshot(&sql));
            prop_assert_eq!(snapshot(QUERIES[index]), snapshot(QUERIES[index]));
        }
    }
}
