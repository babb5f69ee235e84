//! sqlsem - semantic analysis for a sharded SQL query planner
//!
//! Parses MySQL-dialect SELECT statements, resolves every table and column
//! reference, tracks which tables each expression depends on and infers
//! expression types. The result, a [`SemTable`], is what a route-merging
//! plan builder consumes.
//!
//! ```no_run
//! use sqlsem::catalog::{Catalog, ColumnDef, TableSchema};
//! use sqlsem::types::SqlType;
//!
//! let mut catalog = Catalog::new();
//! let user = TableSchema::new("user", vec![ColumnDef::new("id", SqlType::Int64)?])?;
//! catalog.create_table("ks", user)?;
//!
//! let mut stmt = sqlsem::parse_query("select * from user where id = 5")?;
//! let semtable = sqlsem::analyze(&mut stmt, "ks", &catalog, sqlsem::rewrite::expand_star)?;
//! assert_eq!(semtable.tables().len(), 1);
//! # Ok::<(), sqlsem::SqlsemError>(())
//! ```

pub mod catalog;
pub mod error;
pub mod parser;
pub mod rewrite;
pub mod semantics;
pub mod types;

pub use error::{ErrorKind, Result, SqlsemError};
pub use parser::parse_query;
pub use semantics::{analyze, analyze_with_config, AnalyzerConfig, EqualityClosure, SemTable, TableSet};
