//! Schema metadata used to resolve physical tables.
//!
//! The analyzer only talks to [`SchemaInformation`]; [`Catalog`] is an
//! in-memory implementation and [`CachedSchema`] wraps a slower source with a
//! read-through cache.

mod cache;
mod schema;

use std::sync::Arc;

use crate::error::Result;

pub use cache::CachedSchema;
pub use schema::{Catalog, ColumnDef, TableSchema};

/// Source of column metadata for physical tables.
///
/// Implementations must be safe to share between threads: concurrent
/// analyses of distinct statements may query the same source.
pub trait SchemaInformation: Send + Sync {
    /// Looks up `table` in `database`. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    fn find_table(&self, database: &str, table: &str) -> Result<Option<Arc<TableSchema>>>;
}

impl<S: SchemaInformation + ?Sized> SchemaInformation for Arc<S> {
    fn find_table(&self, database: &str, table: &str) -> Result<Option<Arc<TableSchema>>> {
        (**self).find_table(database, table)
    }
}
