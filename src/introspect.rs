//! Live schema introspection
//!
//! Every call queries the database; nothing is cached. Objects that do not
//! exist come back as empty results. Only a failing catalog query is an
//! error (`SchemaLookupError`).

use crate::connection::ConnectionManager;
use crate::error::DatabaseError;
use crate::executor::bind_params;
use crate::executor::timeout::execute_with_timeout;
use crate::schema_queries::{
    get_columns_query, get_foreign_keys_query, get_primary_keys_query, get_tables_query,
};
use crate::types::{ColumnDescriptor, ForeignKey};
use serde::Serialize;
use sqlx::Row;
use sqlx::any::AnyRow;
use std::collections::BTreeMap;

/// Columns and keys of one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnDescriptor>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// Case-insensitive column membership
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Snapshot of the tables a workflow works with
///
/// Built on demand by [`SchemaIntrospector::catalog`] and never refreshed:
/// build a new one after schema changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaCatalog {
    pub tables: BTreeMap<String, TableSchema>,
}

impl SchemaCatalog {
    /// Look up a table (case-insensitive)
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|(table, _)| table.eq_ignore_ascii_case(name))
            .map(|(_, schema)| schema)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

/// Reads table, column and key metadata through a session's connection
pub struct SchemaIntrospector<'a> {
    conn: &'a ConnectionManager,
}

impl<'a> SchemaIntrospector<'a> {
    pub fn new(conn: &'a ConnectionManager) -> Self {
        Self { conn }
    }

    /// Base tables in the configured (or default) schema
    ///
    /// Callers must not rely on the order for correctness.
    pub async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let (sql, params) = get_tables_query(self.conn.db_type(), self.schema());
        let rows = self.fetch(&sql, &params, "Listing tables").await?;
        rows.iter()
            .map(|row| text_column(row, "table_name"))
            .collect()
    }

    /// Columns of `table` in ordinal order
    ///
    /// A table that does not exist yields an empty list, not an error, so an
    /// empty result is only a weak existence test.
    pub async fn get_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, DatabaseError> {
        let (sql, params) = get_columns_query(self.conn.db_type(), self.schema(), table);
        let rows = self
            .fetch(&sql, &params, &format!("Reading columns of {}", table))
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    name: text_column(row, "column_name")?,
                    declared_type: optional_text_column(row, "data_type")?.unwrap_or_default(),
                    nullable: optional_text_column(row, "is_nullable")?
                        .is_none_or(|v| v.eq_ignore_ascii_case("YES")),
                })
            })
            .collect()
    }

    pub async fn get_primary_keys(&self, table: &str) -> Result<Vec<String>, DatabaseError> {
        let Some((sql, params)) = get_primary_keys_query(self.conn.db_type(), self.schema(), table)
        else {
            return Ok(Vec::new());
        };
        let rows = self
            .fetch(&sql, &params, &format!("Reading primary keys of {}", table))
            .await?;
        rows.iter()
            .map(|row| text_column(row, "column_name"))
            .collect()
    }

    pub async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, DatabaseError> {
        let Some((sql, params)) = get_foreign_keys_query(self.conn.db_type(), self.schema(), table)
        else {
            return Ok(Vec::new());
        };
        let rows = self
            .fetch(&sql, &params, &format!("Reading foreign keys of {}", table))
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKey {
                    constraint: optional_text_column(row, "constraint_name")?,
                    column: text_column(row, "column_name")?,
                    referred_table: text_column(row, "referred_table")?,
                    referred_column: optional_text_column(row, "referred_column")?,
                })
            })
            .collect()
    }

    /// Exact-name membership in [`list_tables`](Self::list_tables)
    pub async fn table_exists(&self, table: &str) -> Result<bool, DatabaseError> {
        Ok(self.list_tables().await?.iter().any(|t| t == table))
    }

    /// Columns and keys for each of `tables`
    pub async fn catalog<S: AsRef<str>>(&self, tables: &[S]) -> Result<SchemaCatalog, DatabaseError> {
        let mut catalog = SchemaCatalog::default();
        for table in tables {
            let table = table.as_ref();
            let schema = TableSchema {
                columns: self.get_columns(table).await?,
                primary_keys: self.get_primary_keys(table).await?,
                foreign_keys: self.get_foreign_keys(table).await?,
            };
            catalog.tables.insert(table.to_string(), schema);
        }
        Ok(catalog)
    }

    fn schema(&self) -> Option<&str> {
        self.conn.config().schema.as_deref()
    }

    async fn fetch(
        &self,
        sql: &str,
        params: &[String],
        description: &str,
    ) -> Result<Vec<AnyRow>, DatabaseError> {
        execute_with_timeout(
            self.conn.config().query_timeout(),
            description,
            DatabaseError::SchemaLookupError,
            bind_params(sql, params).fetch_all(self.conn.pool()),
        )
        .await
    }
}

fn text_column(row: &AnyRow, column: &str) -> Result<String, DatabaseError> {
    optional_text_column(row, column)?.ok_or_else(|| {
        DatabaseError::SchemaLookupError(format!("Catalog returned NULL for {}", column))
    })
}

fn optional_text_column(row: &AnyRow, column: &str) -> Result<Option<String>, DatabaseError> {
    row.try_get::<Option<String>, _>(column)
        .map_err(|e| DatabaseError::SchemaLookupError(format!("Failed to read {}: {}", column, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;
    use crate::dsn::ConnectionProfile;
    use crate::executor::QueryExecutor;

    async fn seeded() -> ConnectionManager {
        let conn = match ConnectionManager::connect(
            ConnectionProfile::sqlite(":memory:"),
            &DatasetConfig::default(),
        )
        .await
        {
            Ok(conn) => conn,
            Err(e) => panic!("connect failed: {}", e),
        };
        let executor = QueryExecutor::new(&conn);
        for sql in [
            "CREATE TABLE customers (customer_id INTEGER PRIMARY KEY, name TEXT NOT NULL, region TEXT)",
            "CREATE TABLE orders (order_id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL REFERENCES customers(customer_id), total REAL)",
        ] {
            if let Err(e) = executor.execute(sql).await {
                panic!("seed failed: {}", e);
            }
        }
        conn
    }

    #[tokio::test]
    async fn test_lists_tables() {
        let conn = seeded().await;
        let introspector = SchemaIntrospector::new(&conn);
        let mut tables = introspector.list_tables().await.unwrap_or_default();
        tables.sort();
        assert_eq!(tables, vec!["customers", "orders"]);
    }

    #[tokio::test]
    async fn test_columns_in_order_with_nullability() {
        let conn = seeded().await;
        let introspector = SchemaIntrospector::new(&conn);
        let columns = introspector.get_columns("customers").await.unwrap_or_default();

        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["customer_id", "name", "region"]);
        assert_eq!(columns[0].declared_type, "INTEGER");
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
    }

    #[tokio::test]
    async fn test_missing_table_has_no_columns() {
        let conn = seeded().await;
        let introspector = SchemaIntrospector::new(&conn);
        let columns = introspector.get_columns("nonexistent_table").await;
        assert!(matches!(columns, Ok(ref c) if c.is_empty()));
        assert!(matches!(introspector.table_exists("nonexistent_table").await, Ok(false)));
        assert!(matches!(introspector.table_exists("orders").await, Ok(true)));
    }

    #[tokio::test]
    async fn test_keys() {
        let conn = seeded().await;
        let introspector = SchemaIntrospector::new(&conn);

        let pks = introspector.get_primary_keys("orders").await.unwrap_or_default();
        assert_eq!(pks, vec!["order_id"]);

        let fks = introspector.get_foreign_keys("orders").await.unwrap_or_default();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].column, "customer_id");
        assert_eq!(fks[0].referred_table, "customers");
        assert_eq!(fks[0].referred_column.as_deref(), Some("customer_id"));

        assert!(matches!(introspector.get_foreign_keys("customers").await, Ok(ref f) if f.is_empty()));
    }

    #[tokio::test]
    async fn test_catalog() {
        let conn = seeded().await;
        let introspector = SchemaIntrospector::new(&conn);
        let catalog = introspector
            .catalog(&["orders", "customers"])
            .await
            .unwrap_or_default();

        assert_eq!(catalog.table_names(), vec!["customers", "orders"]);
        assert!(catalog.table("ORDERS").is_some_and(|t| t.has_column("total")));
    }

    #[tokio::test]
    async fn test_closed_pool_is_not_reported_as_empty() {
        let conn = seeded().await;
        conn.close().await;
        let introspector = SchemaIntrospector::new(&conn);
        assert!(introspector.list_tables().await.is_err());
    }
}
