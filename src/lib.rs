//! Natural-language join descriptions turned into verified database views
//!
//! Text such as `join orders table with customers table using customer_id`
//! is validated, parsed into join specs and rendered into a `CREATE VIEW`
//! statement, which is executed and verified against the live catalog of
//! PostgreSQL, MySQL, MariaDB or SQLite databases. SQL Server profiles are
//! parsed and rendered but cannot connect.

pub mod error;
pub mod types;

pub mod config;
pub mod dsn;
pub mod schema_queries;
pub mod sql_limiter;
pub mod sql_parser;
pub mod validate;

pub mod connection;
pub mod executor;
pub mod introspect;
pub mod join;

pub mod cache;
pub mod generator;
pub mod profile;
pub mod registry;
pub mod workflow;

// Re-export secrecy types for consumers
pub use secrecy::{ExposeSecret, SecretString};

// Re-exports
pub use cache::{InMemoryMetadataCache, MetadataCache, NoopMetadataCache};
pub use config::DatasetConfig;
pub use connection::ConnectionManager;
pub use dsn::{AuthMethod, ConnectionProfile, parse_dsn};
pub use error::DatabaseError;
pub use executor::QueryExecutor;
pub use generator::{
    DeterministicViewGenerator, ViewGenerationInput, ViewTextGenerator, check_generated_view,
};
pub use introspect::{SchemaCatalog, SchemaIntrospector, TableSchema};
pub use join::{
    JoinConditionError, JoinSpec, JoinType, parse_join_condition, synthesize_join_clause,
    validate_join_condition,
};
pub use profile::{ColumnProfile, DatasetProfile, profile_dataset, profile_result};
pub use registry::{DatasetRecord, DatasetRegistry};
pub use types::{
    ColumnDescriptor, ConnectionIdentity, ConnectionStatus, DatabaseType, ForeignKey,
    QueryResult, SqlRow, SqlValue,
};
pub use validate::{ensure_allowed, validate_identifier};
pub use workflow::{DatasetSession, ViewCreationResult, ViewDefinitionRequest, WorkflowState};
