//! Schema definitions and the in-memory schema catalog.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlsemError};
use crate::types::SqlType;

use super::SchemaInformation;

/// Registry of table schemas, grouped by database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Database name -> table name -> schema.
    databases: HashMap<String, HashMap<String, Arc<TableSchema>>>,
}

impl Catalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Catalog {
            databases: HashMap::new(),
        }
    }

    /// Registers a table schema under the given database.
    ///
    /// # Errors
    ///
    /// Returns an error if a table with the same name already exists in the database.
    pub fn create_table(&mut self, database: &str, schema: TableSchema) -> Result<()> {
        let tables = self.databases.entry(database.to_string()).or_default();
        if tables.contains_key(&schema.name) {
            return Err(SqlsemError::SchemaError(format!(
                "Table '{database}.{}' already exists",
                schema.name
            )));
        }
        tables.insert(schema.name.clone(), Arc::new(schema));
        Ok(())
    }

    /// Retrieves a table schema by database and name.
    #[must_use]
    pub fn get_table(&self, database: &str, name: &str) -> Option<Arc<TableSchema>> {
        self.databases.get(database)?.get(name).cloned()
    }

    /// Checks if a table exists in the catalog.
    #[must_use]
    pub fn table_exists(&self, database: &str, name: &str) -> bool {
        self.get_table(database, name).is_some()
    }

    /// Returns all database names.
    #[must_use]
    pub fn database_names(&self) -> Vec<&str> {
        self.databases.keys().map(String::as_str).collect()
    }

    /// Returns all table names of a database.
    #[must_use]
    pub fn table_names(&self, database: &str) -> Vec<&str> {
        self.databases
            .get(database)
            .map(|tables| tables.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Serializes the catalog to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| SqlsemError::SchemaError(format!("Failed to serialize catalog: {e}")))
    }

    /// Deserializes a catalog from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| SqlsemError::SchemaError(format!("Failed to deserialize catalog: {e}")))
    }
}

impl SchemaInformation for Catalog {
    fn find_table(&self, database: &str, table: &str) -> Result<Option<Arc<TableSchema>>> {
        Ok(self.get_table(database, table))
    }
}

/// Schema definition for a physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Ordered list of column definitions.
    pub columns: Vec<ColumnDef>,
    /// Whether `columns` lists every column of the table.
    pub authoritative: bool,
}

impl TableSchema {
    /// Creates a new table schema with an authoritative column list.
    ///
    /// # Errors
    ///
    /// Returns an error if two columns share a name.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Result<Self> {
        let schema = TableSchema {
            name: name.into(),
            columns,
            authoritative: true,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Marks the column list as incomplete.
    #[must_use]
    pub fn non_authoritative(mut self) -> Self {
        self.authoritative = false;
        self
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.to_ascii_lowercase()) {
                return Err(SqlsemError::SchemaError(format!(
                    "Duplicate column name '{}'",
                    col.name
                )));
            }
        }
        Ok(())
    }

    /// Finds a column definition by name (case-insensitive).
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Definition of a single column in a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub sql_type: SqlType,
}

impl ColumnDef {
    /// Creates a new column definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the column name is empty.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SqlsemError::SchemaError("Column name cannot be empty".into()));
        }
        Ok(ColumnDef { name, sql_type })
    }
}
