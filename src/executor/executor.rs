//! SQL execution with statement classification and view verification

use super::row_converter::rows_to_result;
use super::timeout::execute_with_timeout;
use crate::connection::ConnectionManager;
use crate::error::DatabaseError;
use crate::schema_queries::{get_columns_query, get_object_exists_query};
use crate::sql_limiter::sample_query;
use crate::sql_parser::{StatementKind, classify_statement, create_view_name, strip_code_fences};
use crate::types::QueryResult;
use crate::validate::validate_identifier;
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;
use sqlx::Row;

/// Bind string parameters in order
pub(crate) fn bind_params<'q>(
    sql: &'q str,
    params: &'q [String],
) -> Query<'q, Any, AnyArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| query.bind(param.as_str()))
}

/// Executes SQL against a session's connection
///
/// Every public operation re-verifies the connection first and refuses to
/// run when verification fails.
pub struct QueryExecutor<'a> {
    conn: &'a ConnectionManager,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(conn: &'a ConnectionManager) -> Self {
        Self { conn }
    }

    /// Execute one statement
    ///
    /// Code-fence markup is stripped first. Then:
    /// - `SELECT ...` runs as a read and returns rows
    /// - `CREATE VIEW ...` runs, then the view is looked up in the catalog
    ///   inside the same transaction; a missing view rolls back and fails
    ///   with `ViewCreationError`
    /// - anything else runs in a transaction and returns `None`
    ///
    /// Failures carry the driver message unchanged and are never retried.
    pub async fn execute(&self, sql: &str) -> Result<Option<QueryResult>, DatabaseError> {
        self.conn.require_connection().await?;

        let sql = strip_code_fences(sql);
        if sql.is_empty() {
            return Err(DatabaseError::ValidationError(
                "SQL statement cannot be empty".to_string(),
            ));
        }

        let kind = classify_statement(&sql);
        log::debug!(
            "Executing {:?} statement: {}",
            kind,
            sql.chars().take(80).collect::<String>()
        );

        match kind {
            StatementKind::Read => self.fetch(&sql, &[]).await.map(Some),
            StatementKind::CreateView => {
                self.create_view(&sql).await?;
                Ok(None)
            }
            StatementKind::Write => {
                self.write(&sql, &[]).await?;
                Ok(None)
            }
        }
    }

    /// Execute a write with bound string parameters inside a transaction
    pub async fn execute_with_params(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<(), DatabaseError> {
        self.conn.require_connection().await?;
        self.write(sql, params).await
    }

    /// Run a read with bound string parameters
    pub async fn query_with_params(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<QueryResult, DatabaseError> {
        self.conn.require_connection().await?;
        self.fetch(sql, params).await
    }

    /// Whether a table or view with exactly this name exists
    pub async fn object_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        validate_identifier(name)?;
        self.conn.require_connection().await?;

        let (sql, params) = get_object_exists_query(
            self.conn.db_type(),
            self.conn.config().schema.as_deref(),
            name,
        );
        let row = execute_with_timeout(
            self.conn.config().query_timeout(),
            "Checking object existence",
            DatabaseError::ExecutionError,
            bind_params(&sql, &params).fetch_one(self.conn.pool()),
        )
        .await?;

        found_flag(&row)
    }

    /// Bounded preview of a table or view
    ///
    /// An empty preview still lists the object's columns, read from the
    /// catalog.
    pub async fn sample(&self, object: &str, rows: usize) -> Result<QueryResult, DatabaseError> {
        let sql = sample_query(object, rows, self.conn.db_type())?;
        self.conn.require_connection().await?;
        let mut result = self.fetch(&sql, &[]).await?;

        if result.columns.is_empty() {
            let (sql, params) = get_columns_query(
                self.conn.db_type(),
                self.conn.config().schema.as_deref(),
                object,
            );
            result.columns = self
                .fetch(&sql, &params)
                .await?
                .rows
                .iter()
                .filter_map(|row| row.get("column_name").and_then(|v| v.as_text()))
                .collect();
        }
        Ok(result)
    }

    async fn fetch(&self, sql: &str, params: &[String]) -> Result<QueryResult, DatabaseError> {
        let rows = execute_with_timeout(
            self.conn.config().query_timeout(),
            "Executing query",
            DatabaseError::ExecutionError,
            bind_params(sql, params).fetch_all(self.conn.pool()),
        )
        .await?;

        rows_to_result(&rows)
    }

    async fn write(&self, sql: &str, params: &[String]) -> Result<(), DatabaseError> {
        let limit = self.conn.config().query_timeout();
        let mut tx = execute_with_timeout(
            limit,
            "Starting transaction",
            DatabaseError::ExecutionError,
            self.conn.pool().begin(),
        )
        .await?;

        let result = execute_with_timeout(
            limit,
            "Executing statement",
            DatabaseError::ExecutionError,
            bind_params(sql, params).execute(&mut *tx),
        )
        .await;

        match result {
            Ok(done) => {
                execute_with_timeout(
                    limit,
                    "Committing transaction",
                    DatabaseError::ExecutionError,
                    tx.commit(),
                )
                .await?;
                log::debug!("Statement affected {} row(s)", done.rows_affected());
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn create_view(&self, sql: &str) -> Result<(), DatabaseError> {
        let statement = sql.trim_end().trim_end_matches(';').trim_end();
        let view_name = create_view_name(statement).ok_or_else(|| {
            DatabaseError::ValidationError(format!(
                "Could not read a view name from: {}",
                statement.chars().take(80).collect::<String>()
            ))
        })?;

        let limit = self.conn.config().query_timeout();
        let mut tx = execute_with_timeout(
            limit,
            "Starting transaction",
            DatabaseError::ExecutionError,
            self.conn.pool().begin(),
        )
        .await?;

        let created = execute_with_timeout(
            limit,
            "Creating view",
            DatabaseError::ExecutionError,
            sqlx::query(statement).execute(&mut *tx),
        )
        .await;
        if let Err(e) = created {
            let _ = tx.rollback().await;
            return Err(e);
        }

        let (check_sql, check_params) = get_object_exists_query(
            self.conn.db_type(),
            self.conn.config().schema.as_deref(),
            &view_name,
        );
        let found = match execute_with_timeout(
            limit,
            "Verifying view",
            DatabaseError::ExecutionError,
            bind_params(&check_sql, &check_params).fetch_one(&mut *tx),
        )
        .await
        .and_then(|row| found_flag(&row))
        {
            Ok(found) => found,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };

        if !found {
            let _ = tx.rollback().await;
            return Err(DatabaseError::ViewCreationError(view_name));
        }

        execute_with_timeout(
            limit,
            "Committing transaction",
            DatabaseError::ExecutionError,
            tx.commit(),
        )
        .await?;

        log::info!("✓ Created view {}", view_name);
        Ok(())
    }
}

/// Read the `found` column of an existence check (count or 0/1 flag)
fn found_flag(row: &sqlx::any::AnyRow) -> Result<bool, DatabaseError> {
    row.try_get::<i64, _>("found")
        .map(|n| n > 0)
        .or_else(|_| row.try_get::<i32, _>("found").map(|n| n > 0))
        .map_err(|e| {
            DatabaseError::ExecutionError(format!("Failed to read existence check result: {}", e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;
    use crate::dsn::ConnectionProfile;
    use crate::types::SqlValue;

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
            "CREATE TABLE customers (customer_id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE orders (order_id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(customer_id), total REAL)",
            "INSERT INTO customers VALUES (1, 'Ada'), (2, 'Grace')",
            "INSERT INTO orders VALUES (10, 1, 9.5), (11, 1, 20.0), (12, 2, NULL)",
        ] {
            if let Err(e) = executor.execute(sql).await {
                panic!("seed failed on {}: {}", sql, e);
            }
        }
        conn
    }

    #[tokio::test]
    async fn test_select_returns_rows() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);

        let result = executor
            .execute("```sql\nSELECT order_id, total FROM orders ORDER BY order_id\n```")
            .await;
        let result = match result {
            Ok(Some(result)) => result,
            other => panic!("expected rows, got {:?}", other.map(|r| r.map(|q| q.row_count()))),
        };
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.columns, vec!["order_id", "total"]);
        assert_eq!(result.rows[0].get("order_id"), Some(&SqlValue::Int(10)));
        assert_eq!(result.rows[2].get("total"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_create_view_then_exists_and_sample() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);

        let created = executor
            .execute(
                "CREATE VIEW customer_orders AS SELECT o.order_id, c.name \
                 FROM orders o INNER JOIN customers c ON o.customer_id = c.customer_id;",
            )
            .await;
        assert!(matches!(created, Ok(None)), "{:?}", created.err());

        assert!(matches!(executor.object_exists("customer_orders").await, Ok(true)));

        let sample = executor.sample("customer_orders", 2).await;
        assert!(matches!(sample.as_ref().map(|r| r.row_count()), Ok(2)));
    }

    #[tokio::test]
    async fn test_create_view_twice_fails() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);
        let sql = "CREATE VIEW v_customers AS SELECT * FROM customers";

        assert!(executor.execute(sql).await.is_ok());
        match executor.execute(sql).await {
            Err(DatabaseError::ExecutionError(msg)) => assert!(msg.contains("already exists")),
            other => panic!("expected ExecutionError, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_failed_write_is_rolled_back() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);

        let result = executor
            .execute("INSERT INTO customers VALUES (1, 'duplicate key')")
            .await;
        assert!(matches!(result, Err(DatabaseError::ExecutionError(_))));

        let count = executor.execute("SELECT COUNT(*) AS n FROM customers").await;
        let count = count.ok().flatten().and_then(|r| r.rows[0].get("n").cloned());
        assert_eq!(count, Some(SqlValue::Int(2)));
    }

    #[tokio::test]
    async fn test_params_are_bound() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);

        let hostile = "x'); DROP TABLE customers; --".to_string();
        let inserted = executor
            .execute_with_params(
                "INSERT INTO customers (customer_id, name) VALUES (3, ?)",
                std::slice::from_ref(&hostile),
            )
            .await;
        assert!(inserted.is_ok(), "{:?}", inserted.err());

        let found = executor
            .query_with_params("SELECT name FROM customers WHERE name = ?", &[hostile.clone()])
            .await;
        assert!(matches!(found.map(|r| r.row_count()), Ok(1)));
    }

    #[tokio::test]
    async fn test_closed_connection_is_refused() {
        let conn = seeded().await;
        conn.close().await;
        let executor = QueryExecutor::new(&conn);
        assert!(matches!(
            executor.execute("SELECT 1").await,
            Err(DatabaseError::ConnectionError(_))
        ));
    }

    #[tokio::test]
    async fn test_computed_columns_keep_their_values() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);

        let result = executor
            .execute("SELECT COUNT(*) AS n, 1 + 1 AS two, 'x' AS s FROM customers")
            .await;
        let row = match result {
            Ok(Some(result)) => result.rows[0].clone(),
            other => panic!("expected rows, got {:?}", other.map(|r| r.map(|q| q.row_count()))),
        };
        assert_eq!(row.get("n"), Some(&SqlValue::Int(2)));
        assert_eq!(row.get("two"), Some(&SqlValue::Int(2)));
        assert_eq!(row.get("s"), Some(&SqlValue::Text("x".to_string())));

        let created = executor
            .execute(
                "CREATE VIEW order_totals AS SELECT customer_id, COUNT(*) AS orders, \
                 SUM(total) * 2 AS doubled FROM orders GROUP BY customer_id",
            )
            .await;
        assert!(created.is_ok(), "{:?}", created.err());

        let sample = executor.sample("order_totals", 5).await;
        let sample = match sample {
            Ok(sample) => sample,
            Err(e) => panic!("sample failed: {}", e),
        };
        let first = sample
            .rows
            .iter()
            .find(|r| r.get("customer_id") == Some(&SqlValue::Int(1)));
        assert_eq!(first.and_then(|r| r.get("orders")), Some(&SqlValue::Int(2)));
        assert_eq!(first.and_then(|r| r.get("doubled")), Some(&SqlValue::Float(59.0)));

        // SUM over only NULL totals is NULL
        let second = sample
            .rows
            .iter()
            .find(|r| r.get("customer_id") == Some(&SqlValue::Int(2)));
        assert_eq!(second.and_then(|r| r.get("doubled")), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_view_missing_from_catalog_is_rolled_back() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);

        // The name is read as `odd`, the catalog stores `odd name`
        let result = executor
            .execute("CREATE VIEW \"odd name\" AS SELECT 1 AS one")
            .await;
        match result {
            Err(DatabaseError::ViewCreationError(view)) => assert_eq!(view, "odd"),
            other => panic!("expected ViewCreationError, got {:?}", other.map(|_| ())),
        }

        let left_over = executor
            .query_with_params(
                "SELECT name FROM sqlite_master WHERE type = 'view' AND name = ?",
                &["odd name".to_string()],
            )
            .await;
        assert!(matches!(left_over.map(|r| r.row_count()), Ok(0)));
    }

    #[tokio::test]
    async fn test_empty_sample_lists_columns() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);

        let created = executor
            .execute("CREATE VIEW no_orders AS SELECT order_id, total FROM orders WHERE 1 = 0")
            .await;
        assert!(created.is_ok(), "{:?}", created.err());

        let sample = executor.sample("no_orders", 5).await;
        let sample = match sample {
            Ok(sample) => sample,
            Err(e) => panic!("sample failed: {}", e),
        };
        assert!(sample.is_empty());
        assert_eq!(sample.columns, vec!["order_id", "total"]);
    }

    #[tokio::test]
    async fn test_sample_rejects_unsafe_name() {
        let conn = seeded().await;
        let executor = QueryExecutor::new(&conn);
        assert!(matches!(
            executor.sample("orders; DROP TABLE orders", 5).await,
            Err(DatabaseError::ValidationError(_))
        ));
    }
}
