//! Semantic analysis of SELECT statements.
//!
//! [`analyze`] resolves every table and column reference of a statement,
//! records which tables each expression depends on, infers expression types
//! and returns the result as a [`SemTable`].

mod analyzer;
mod binder;
mod checks;
mod config;
mod scoper;
mod semtable;
mod table_collector;
mod table_info;
mod table_set;
mod typer;

pub use analyzer::{analyze, analyze_with_config, Phase};
pub use config::{AnalyzerConfig, EqualityClosure};
pub use semtable::{ColumnName, SemTable, SubqueryInfo};
pub use table_info::{
    projected_name, ColumnSource, DerivedColumn, DerivedTableInfo, PhysicalTable, TableInfo,
};
pub use table_set::TableSet;
