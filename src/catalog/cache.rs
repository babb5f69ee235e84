//! Read-through cache in front of a schema source.
//!
//! # Thread Safety
//!
//! Lookups take a `parking_lot::RwLock` read guard on the hot path and only
//! upgrade to a write guard on a miss, so concurrent analyses mostly share
//! the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

use super::{SchemaInformation, TableSchema};

/// Caches lookups (including misses) of an underlying [`SchemaInformation`].
#[derive(Debug)]
pub struct CachedSchema<S> {
    inner: S,
    /// (database, table) -> cached lookup result.
    entries: RwLock<HashMap<(String, String), Option<Arc<TableSchema>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: SchemaInformation> CachedSchema<S> {
    /// Wraps `inner` with an empty cache.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drops every cached entry.
    pub fn invalidate(&self) {
        self.entries.write().clear();
    }

    /// Returns the number of lookups served from the cache.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of lookups forwarded to the inner source.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl<S: SchemaInformation> SchemaInformation for CachedSchema<S> {
    fn find_table(&self, database: &str, table: &str) -> Result<Option<Arc<TableSchema>>> {
        let key = (database.to_string(), table.to_string());
        if let Some(cached) = self.entries.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Failed lookups are not cached.
        let found = self.inner.find_table(database, table)?;
        self.entries.write().insert(key, found.clone());
        Ok(found)
    }
}
