//! Dataset registry
//!
//! One row per created dataset in a registry table (`DU_Datasets` unless
//! configured otherwise). All values are bound parameters; only the
//! validated registry table name is interpolated.
//!
//! A registry write that fails after the view was created leaves the view in
//! place; the caller gets a `RegistryError` and decides what to do.

use crate::connection::ConnectionManager;
use crate::error::DatabaseError;
use crate::executor::QueryExecutor;
use crate::schema_queries::placeholder;
use crate::types::{ConnectionIdentity, DatabaseType, SqlRow, SqlValue};
use crate::validate::validate_identifier;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

const COLUMNS: [&str; 9] = [
    "DatasetName",
    "Description",
    "CreatedBy",
    "ViewName",
    "JoinConditions",
    "Tables",
    "DatabaseName",
    "ServerName",
    "CreatedDate",
];

/// One registered dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Assigned by the database; `None` before registration
    pub dataset_id: Option<i64>,
    pub dataset_name: String,
    pub description: String,
    pub created_by: String,
    pub view_name: String,
    pub join_conditions: String,
    pub tables: Vec<String>,
    pub database_name: String,
    pub server_name: String,
    /// RFC 3339, UTC
    pub created_at: String,
}

impl DatasetRecord {
    /// Record for a view just created on the connection identified by `identity`
    pub fn new(
        dataset_name: &str,
        description: &str,
        view_name: &str,
        join_conditions: &str,
        tables: &[String],
        identity: &ConnectionIdentity,
    ) -> Self {
        Self {
            dataset_id: None,
            dataset_name: dataset_name.to_string(),
            description: description.to_string(),
            created_by: identity.user.clone(),
            view_name: view_name.to_string(),
            join_conditions: join_conditions.to_string(),
            tables: tables.to_vec(),
            database_name: identity.database.clone(),
            server_name: identity.server.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    fn from_row(row: &SqlRow) -> Result<Self, DatabaseError> {
        let text = |column: &str| {
            row.get(column)
                .and_then(SqlValue::as_text)
                .unwrap_or_default()
        };

        let tables_json = text("Tables");
        let tables = if tables_json.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&tables_json).map_err(|e| {
                DatabaseError::RegistryError(format!(
                    "Dataset '{}' has malformed Tables value: {}",
                    text("DatasetName"),
                    e
                ))
            })?
        };

        Ok(Self {
            dataset_id: match row.get("DatasetID") {
                Some(SqlValue::Int(id)) => Some(*id),
                _ => None,
            },
            dataset_name: text("DatasetName"),
            description: text("Description"),
            created_by: text("CreatedBy"),
            view_name: text("ViewName"),
            join_conditions: text("JoinConditions"),
            tables,
            database_name: text("DatabaseName"),
            server_name: text("ServerName"),
            created_at: text("CreatedDate"),
        })
    }
}

/// Registry table DDL for each dialect
pub fn create_table_sql(db_type: DatabaseType, table: &str) -> Result<String, DatabaseError> {
    validate_identifier(table)?;

    let (id, short, long) = match db_type {
        DatabaseType::SQLite => ("INTEGER PRIMARY KEY AUTOINCREMENT", "TEXT", "TEXT"),
        DatabaseType::Postgres => ("SERIAL PRIMARY KEY", "VARCHAR(255)", "TEXT"),
        DatabaseType::MySQL | DatabaseType::MariaDB => {
            ("INT AUTO_INCREMENT PRIMARY KEY", "VARCHAR(255)", "TEXT")
        }
        DatabaseType::SqlServer => ("INT IDENTITY(1,1) PRIMARY KEY", "NVARCHAR(255)", "NVARCHAR(MAX)"),
    };

    let body = format!(
        "{table} (\
         DatasetID {id}, \
         DatasetName {short} NOT NULL, \
         Description {long}, \
         CreatedDate {short} NOT NULL, \
         CreatedBy {short}, \
         ViewName {short} NOT NULL, \
         JoinConditions {long}, \
         Tables {long}, \
         DatabaseName {short}, \
         ServerName {short})",
        table = table,
        id = id,
        short = short,
        long = long,
    );

    Ok(match db_type {
        DatabaseType::SqlServer => format!(
            "IF OBJECT_ID(N'{}', N'U') IS NULL CREATE TABLE {}",
            table, body
        ),
        _ => format!("CREATE TABLE IF NOT EXISTS {}", body),
    })
}

/// Reads and writes dataset records through a session's connection
pub struct DatasetRegistry<'a> {
    conn: &'a ConnectionManager,
    table: String,
}

impl<'a> DatasetRegistry<'a> {
    /// Registry over the configured registry table
    pub fn new(conn: &'a ConnectionManager) -> Result<Self, DatabaseError> {
        let table = conn.config().registry_table.clone();
        validate_identifier(&table)?;
        Ok(Self { conn, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the registry table if it does not exist yet
    pub async fn ensure_table(&self) -> Result<(), DatabaseError> {
        let sql = create_table_sql(self.conn.db_type(), &self.table)?;
        QueryExecutor::new(self.conn)
            .execute(&sql)
            .await
            .map(|_| ())
            .map_err(registry_error)
    }

    /// Insert `record`; the database assigns the id
    pub async fn register(&self, record: &DatasetRecord) -> Result<(), DatabaseError> {
        let db_type = self.conn.db_type();
        let placeholders: Vec<String> = (1..=COLUMNS.len())
            .map(|i| placeholder(db_type, i))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            COLUMNS.join(", "),
            placeholders.join(", ")
        );

        let tables = serde_json::to_string(&record.tables).map_err(|e| {
            DatabaseError::RegistryError(format!("Failed to encode table list: {}", e))
        })?;
        let params = vec![
            record.dataset_name.clone(),
            record.description.clone(),
            record.created_by.clone(),
            record.view_name.clone(),
            record.join_conditions.clone(),
            tables,
            record.database_name.clone(),
            record.server_name.clone(),
            record.created_at.clone(),
        ];

        QueryExecutor::new(self.conn)
            .execute_with_params(&sql, &params)
            .await
            .map_err(registry_error)?;

        log::info!(
            "Registered dataset {} (view {}) in {}",
            record.dataset_name,
            record.view_name,
            self.table
        );
        Ok(())
    }

    /// All records, newest first
    pub async fn list(&self) -> Result<Vec<DatasetRecord>, DatabaseError> {
        let sql = format!(
            "SELECT DatasetID, {} FROM {} ORDER BY CreatedDate DESC, DatasetID DESC",
            COLUMNS.join(", "),
            self.table
        );
        let result = QueryExecutor::new(self.conn)
            .query_with_params(&sql, &[])
            .await
            .map_err(registry_error)?;

        result.rows.iter().map(DatasetRecord::from_row).collect()
    }
}

// Connection failures keep their kind; everything else is a registry failure
fn registry_error(err: DatabaseError) -> DatabaseError {
    match err {
        DatabaseError::ConnectionError(_) | DatabaseError::RegistryError(_) => err,
        other => DatabaseError::RegistryError(other.to_string()),
    }
}
