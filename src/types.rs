//! Type definitions shared across the pipeline

use base64::Engine as _;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};

/// One column of a table as reported by the live catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Declared type (e.g., "VARCHAR", "INTEGER", "TEXT")
    pub declared_type: String,

    /// Whether the column accepts NULL
    pub nullable: bool,
}

/// Foreign key relationship of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    /// Constraint name, when the backend reports one
    pub constraint: Option<String>,

    /// Constrained column in the inspected table
    pub column: String,

    /// Table the column points at
    pub referred_table: String,

    /// Referenced column (None when the backend leaves it implicit)
    pub referred_column: Option<String>,
}

/// Who and where a verified connection is talking to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionIdentity {
    pub server: String,
    pub database: String,
    pub user: String,
}

impl std::fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "server={} database={} user={}",
            self.server, self.database, self.user
        )
    }
}

/// Result of `ConnectionManager::verify`
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    /// Whether the connection answered
    pub connected: bool,

    /// Identity, present only when connected
    pub identity: Option<ConnectionIdentity>,

    /// Human-readable detail (identity summary or the failure message)
    pub detail: String,
}

/// A single typed SQL value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text rendering used for registry reads and CLI output
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Float(v) => Some(v.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Blob(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }
}

// Plain JSON values; blobs go out as base64 text
impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Int(v) => serializer.serialize_i64(*v),
            SqlValue::Float(v) => serializer.serialize_f64(*v),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Blob(bytes) => serializer
                .serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }
}

/// One named value inside a row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlColumnValue {
    pub name: String,
    pub value: SqlValue,
}

/// One result row, columns in select order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlRow {
    pub columns: Vec<SqlColumnValue>,
}

impl SqlRow {
    /// Look up a value by column name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| &c.value)
    }
}

/// Tabular result of a read statement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<SqlRow>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, in row order
    pub fn column_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SqlValue> + 'a {
        self.rows.iter().filter_map(move |row| row.get(name))
    }
}

/// Database type for SQL dialect-specific handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum DatabaseType {
    Postgres,
    MySQL,
    MariaDB,
    SQLite,
    SqlServer, // No sqlx driver; query text is still produced
}

impl DatabaseType {
    /// Detect database type from connection URL scheme
    ///
    /// # Examples
    /// ```
    /// # use kodegen_dataset_views::types::DatabaseType;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = DatabaseType::from_url("postgres://localhost/mydb")?;
    /// assert_eq!(db, DatabaseType::Postgres);
    /// let db = DatabaseType::from_url("mssql+pyodbc://srv/sales?trusted_connection=yes")?;
    /// assert_eq!(db, DatabaseType::SqlServer);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_url(url: &str) -> Result<Self, crate::error::DatabaseError> {
        let scheme = url
            .split(':')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        // "mssql+pyodbc" style schemes carry the driver after '+'
        let dialect = scheme.split('+').next().unwrap_or_default();

        match dialect {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySQL),
            "mariadb" => Ok(Self::MariaDB),
            "sqlite" | "sqlite3" | "file" => Ok(Self::SQLite),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            _ => Err(crate::error::DatabaseError::ConnectionError(format!(
                "unsupported dialect: cannot determine database type from '{}'",
                dialect
            ))),
        }
    }

    /// URL scheme used when rendering a connection string
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySQL => "mysql",
            Self::MariaDB => "mysql", // MariaDB speaks the MySQL protocol
            Self::SQLite => "sqlite",
            Self::SqlServer => "mssql",
        }
    }

    /// Whether the compiled sqlx driver set can open this dialect
    pub fn has_driver(&self) -> bool {
        !matches!(self, Self::SqlServer)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::MySQL => write!(f, "MySQL"),
            Self::MariaDB => write!(f, "MariaDB"),
            Self::SQLite => write!(f, "SQLite"),
            Self::SqlServer => write!(f, "SQL Server"),
        }
    }
}
