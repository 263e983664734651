//! Dataset creation session
//!
//! A [`DatasetSession`] carries one user's progress from connecting to a
//! registered dataset view:
//!
//! `NoConnection → Connected → TablesSelected → JoinsDefined → ViewGenerated
//! → ViewCreated → Verified`
//!
//! Each step needs the state its predecessor produced. Re-running an earlier
//! step is allowed and discards everything after it. A failing step leaves
//! the state where it was.

use crate::cache::{
    DatasetMetadata, MetadataCache, NoopMetadataCache, RelationshipMetadata, TableMetadata,
};
use crate::config::DatasetConfig;
use crate::connection::ConnectionManager;
use crate::dsn::ConnectionProfile;
use crate::error::DatabaseError;
use crate::executor::QueryExecutor;
use crate::generator::{ViewGenerationInput, ViewTextGenerator, check_generated_view};
use crate::introspect::{SchemaCatalog, SchemaIntrospector};
use crate::join::{JoinSpec, parse_join_condition, validate_join_condition};
use crate::registry::{DatasetRecord, DatasetRegistry};
use crate::sql_parser::create_view_name;
use crate::types::{ConnectionIdentity, ConnectionStatus, QueryResult};
use crate::validate::{ensure_allowed, validate_identifier};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a session is in the dataset creation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum WorkflowState {
    NoConnection,
    Connected,
    TablesSelected,
    JoinsDefined,
    ViewGenerated,
    ViewCreated,
    Verified,
}

/// A view waiting to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewDefinitionRequest {
    pub view_name: String,
    pub tables: Vec<String>,
    pub join_condition: String,
    pub generated_sql: String,
    /// Strategy that produced `generated_sql`
    pub generator: String,
}

/// Outcome of creating or verifying a view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewCreationResult {
    pub success: bool,
    /// Name of the verified object
    pub object: Option<String>,
    pub error: Option<String>,
    /// Bounded preview, filled in by verification
    pub sample: Option<QueryResult>,
}

/// Session context for creating one dataset at a time
pub struct DatasetSession {
    config: DatasetConfig,
    cache: Arc<dyn MetadataCache>,
    conn: Option<ConnectionManager>,
    state: WorkflowState,
    tables: Vec<String>,
    catalog: SchemaCatalog,
    join_condition: String,
    joins: Vec<JoinSpec>,
    request: Option<ViewDefinitionRequest>,
    creation: Option<ViewCreationResult>,
}

impl DatasetSession {
    pub fn new(config: DatasetConfig) -> Self {
        Self::with_cache(config, Arc::new(NoopMetadataCache))
    }

    pub fn with_cache(config: DatasetConfig, cache: Arc<dyn MetadataCache>) -> Self {
        Self {
            config,
            cache,
            conn: None,
            state: WorkflowState::NoConnection,
            tables: Vec::new(),
            catalog: SchemaCatalog::default(),
            join_condition: String::new(),
            joins: Vec::new(),
            request: None,
            creation: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    pub fn request(&self) -> Option<&ViewDefinitionRequest> {
        self.request.as_ref()
    }

    pub fn creation(&self) -> Option<&ViewCreationResult> {
        self.creation.as_ref()
    }

    /// The session's connection
    pub fn connection(&self) -> Result<&ConnectionManager, DatabaseError> {
        self.conn.as_ref().ok_or_else(|| {
            DatabaseError::ValidationError("Connect to a database first".to_string())
        })
    }

    /// Open the session's connection
    pub async fn connect(
        &mut self,
        profile: ConnectionProfile,
    ) -> Result<ConnectionStatus, DatabaseError> {
        if self.conn.is_some() {
            return Err(DatabaseError::ValidationError(
                "Session is already connected; disconnect first".to_string(),
            ));
        }

        let conn = ConnectionManager::connect(profile, &self.config).await?;
        let status = conn.verify().await;
        self.conn = Some(conn);
        self.reset_to(WorkflowState::Connected);
        Ok(status)
    }

    /// Current connection status; reports "not connected" without a connection
    pub async fn verify_connection(&self) -> ConnectionStatus {
        match &self.conn {
            Some(conn) => conn.verify().await,
            None => ConnectionStatus {
                connected: false,
                identity: None,
                detail: "No database connection available".to_string(),
            },
        }
    }

    /// Pick the tables the dataset is built from
    ///
    /// Every table must exist in the connected database (exact name match).
    pub async fn select_tables<S: AsRef<str>>(
        &mut self,
        tables: &[S],
    ) -> Result<&SchemaCatalog, DatabaseError> {
        self.require_state(WorkflowState::Connected, "select tables")?;

        let mut selected: Vec<String> = Vec::new();
        for table in tables {
            let table = table.as_ref().trim();
            validate_identifier(table)?;
            if !selected.iter().any(|t| t == table) {
                selected.push(table.to_string());
            }
        }
        if selected.is_empty() {
            return Err(DatabaseError::ValidationError(
                "Select at least one table".to_string(),
            ));
        }

        let conn = self.connection()?;
        let introspector = SchemaIntrospector::new(conn);
        let available = introspector.list_tables().await?;
        if let Some(missing) = selected.iter().find(|t| !available.contains(*t)) {
            return Err(DatabaseError::ValidationError(format!(
                "Table '{}' does not exist in the database",
                missing
            )));
        }
        let catalog = introspector.catalog(&selected).await?;

        self.reset_to(WorkflowState::TablesSelected);
        self.tables = selected;
        self.catalog = catalog;
        Ok(&self.catalog)
    }

    /// Validate and parse the join description
    ///
    /// Joined tables must be among the selected ones. With
    /// `strict_join_fields` the join field must be a column of both tables;
    /// with `require_connected_chain` every clause after the first must start
    /// from a table an earlier clause introduced.
    pub fn define_joins(&mut self, join_condition: &str) -> Result<&[JoinSpec], DatabaseError> {
        self.require_state(WorkflowState::TablesSelected, "define joins")?;

        if self.tables.len() < 2 {
            return Err(DatabaseError::ValidationError(
                "Add at least two tables to define join conditions".to_string(),
            ));
        }

        validate_join_condition(join_condition)?;
        let parsed = parse_join_condition(join_condition);
        if parsed.is_empty() {
            return Err(DatabaseError::ValidationError(
                "No clause of the join condition could be parsed".to_string(),
            ));
        }

        let mut joins = Vec::with_capacity(parsed.len());
        for join in parsed {
            validate_identifier(&join.join_field)?;
            joins.push(JoinSpec {
                source_table: ensure_allowed(&join.source_table, &self.tables)?.to_string(),
                target_table: ensure_allowed(&join.target_table, &self.tables)?.to_string(),
                ..join
            });
        }

        if self.config.strict_join_fields {
            self.check_join_fields(&joins)?;
        }
        if self.config.require_connected_chain {
            check_connected_chain(&joins)?;
        }

        self.reset_to(WorkflowState::JoinsDefined);
        self.join_condition = join_condition.to_string();
        self.joins = joins;
        Ok(&self.joins)
    }

    /// Produce the CREATE VIEW statement with `generator`
    pub async fn generate_view(
        &mut self,
        view_name: &str,
        generator: &dyn ViewTextGenerator,
    ) -> Result<&ViewDefinitionRequest, DatabaseError> {
        self.require_state(WorkflowState::JoinsDefined, "generate a view")?;
        validate_identifier(view_name)?;
        if self.tables.iter().any(|t| t.eq_ignore_ascii_case(view_name)) {
            return Err(DatabaseError::ValidationError(format!(
                "View name '{}' collides with a selected table",
                view_name
            )));
        }

        let input = ViewGenerationInput {
            view_name: view_name.to_string(),
            tables: self.tables.clone(),
            table_columns: self
                .catalog
                .tables
                .iter()
                .map(|(name, schema)| (name.clone(), schema.columns.clone()))
                .collect::<BTreeMap<_, _>>(),
            join_condition: self.join_condition.clone(),
        };

        log::debug!("Generating view {} with {} strategy", view_name, generator.name());
        let raw = generator.generate(&input).await?;
        let db_type = self.connection()?.db_type();
        let sql = check_generated_view(
            &raw,
            view_name,
            &self.tables,
            &self.joins,
            db_type,
            self.config.schema.as_deref(),
        )?;
        // The database stores the name as the statement spells it
        let created_name = create_view_name(&sql).unwrap_or(input.view_name);

        self.reset_to(WorkflowState::ViewGenerated);
        Ok(self.request.insert(ViewDefinitionRequest {
            view_name: created_name,
            tables: input.tables,
            join_condition: input.join_condition,
            generated_sql: sql,
            generator: generator.name().to_string(),
        }))
    }

    /// Execute the generated statement
    pub async fn create_view(&mut self) -> Result<&ViewCreationResult, DatabaseError> {
        self.require_state(WorkflowState::ViewGenerated, "create the view")?;
        if self.state > WorkflowState::ViewGenerated {
            return Err(DatabaseError::ValidationError(
                "View was already created; generate a new definition first".to_string(),
            ));
        }

        let request = self.request.as_ref().ok_or_else(|| {
            DatabaseError::ValidationError("No view definition to create".to_string())
        })?;
        let conn = self.connection()?;
        QueryExecutor::new(conn).execute(&request.generated_sql).await?;

        let view_name = request.view_name.clone();
        self.state = WorkflowState::ViewCreated;
        Ok(self.creation.insert(ViewCreationResult {
            success: true,
            object: Some(view_name),
            error: None,
            sample: None,
        }))
    }

    /// Confirm the view exists and fetch a bounded preview
    pub async fn verify_view(&mut self) -> Result<&ViewCreationResult, DatabaseError> {
        self.require_state(WorkflowState::ViewCreated, "verify the view")?;

        let view_name = self
            .request
            .as_ref()
            .map(|r| r.view_name.clone())
            .ok_or_else(|| DatabaseError::ValidationError("No view to verify".to_string()))?;
        let conn = self.connection()?;
        let executor = QueryExecutor::new(conn);

        if !executor.object_exists(&view_name).await? {
            return Err(DatabaseError::ViewCreationError(view_name));
        }
        let sample = executor.sample(&view_name, self.config.sample_rows).await?;

        self.state = WorkflowState::Verified;
        Ok(self.creation.insert(ViewCreationResult {
            success: true,
            object: Some(view_name),
            error: None,
            sample: Some(sample),
        }))
    }

    /// Record the verified dataset in the registry, then in the metadata cache
    ///
    /// A registry failure is returned as `RegistryError` and the view stays in
    /// the database.
    pub async fn register(
        &mut self,
        dataset_name: &str,
        description: &str,
    ) -> Result<DatasetRecord, DatabaseError> {
        self.require_state(WorkflowState::Verified, "register the dataset")?;
        if dataset_name.trim().is_empty() {
            return Err(DatabaseError::ValidationError(
                "Dataset name cannot be empty".to_string(),
            ));
        }

        let request = self.request.as_ref().ok_or_else(|| {
            DatabaseError::ValidationError("No verified view to register".to_string())
        })?;
        let conn = self.connection()?;
        let identity: ConnectionIdentity = conn.require_connection().await?;

        let registry = DatasetRegistry::new(conn)?;
        registry.ensure_table().await?;
        let record = DatasetRecord::new(
            dataset_name,
            description,
            &request.view_name,
            &request.join_condition,
            &request.tables,
            &identity,
        );
        if let Err(e) = registry.register(&record).await {
            log::warn!(
                "View {} exists but dataset {} was not registered: {}",
                request.view_name,
                dataset_name,
                e
            );
            return Err(e);
        }

        self.cache
            .save_dataset(DatasetMetadata {
                dataset_name: dataset_name.to_string(),
                description: description.to_string(),
                tables: request.tables.clone(),
                created_at: record.created_at.clone(),
            })
            .await?;
        for table in &request.tables {
            self.cache
                .save_table_metadata(TableMetadata {
                    dataset_name: dataset_name.to_string(),
                    table_name: table.clone(),
                    columns: self
                        .catalog
                        .table(table)
                        .map(|t| t.columns.clone())
                        .unwrap_or_default(),
                    description: description.to_string(),
                })
                .await?;
        }
        for join in &self.joins {
            self.cache
                .save_relationship(RelationshipMetadata {
                    dataset_name: dataset_name.to_string(),
                    source_table: join.source_table.clone(),
                    target_table: join.target_table.clone(),
                    join_conditions: vec![join.clone()],
                })
                .await?;
        }

        Ok(record)
    }

    /// Close the connection and forget all progress
    pub async fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close().await;
        }
        self.reset_to(WorkflowState::NoConnection);
    }

    fn require_state(&self, needed: WorkflowState, action: &str) -> Result<(), DatabaseError> {
        if self.state < needed {
            return Err(DatabaseError::ValidationError(format!(
                "Cannot {} in state {:?}; {:?} is required",
                action, self.state, needed
            )));
        }
        Ok(())
    }

    /// Move to `state`, dropping artifacts of every later step
    fn reset_to(&mut self, state: WorkflowState) {
        if state < WorkflowState::ViewCreated {
            self.creation = None;
        }
        if state < WorkflowState::ViewGenerated {
            self.request = None;
        }
        if state < WorkflowState::JoinsDefined {
            self.joins.clear();
            self.join_condition.clear();
        }
        if state < WorkflowState::TablesSelected {
            self.tables.clear();
            self.catalog = SchemaCatalog::default();
        }
        self.state = state;
    }

    fn check_join_fields(&self, joins: &[JoinSpec]) -> Result<(), DatabaseError> {
        for join in joins {
            for table in [&join.source_table, &join.target_table] {
                let has_field = self
                    .catalog
                    .table(table)
                    .is_some_and(|t| t.has_column(&join.join_field));
                if !has_field {
                    return Err(DatabaseError::ValidationError(format!(
                        "Join field '{}' is not a column of table '{}'",
                        join.join_field, table
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_connected_chain(joins: &[JoinSpec]) -> Result<(), DatabaseError> {
    let mut introduced: Vec<&str> = Vec::new();
    for (index, join) in joins.iter().enumerate() {
        if index > 0 && !introduced.contains(&join.source_table.as_str()) {
            return Err(DatabaseError::ValidationError(format!(
                "Join clause {} starts from '{}', which no earlier clause introduced",
                index + 1,
                join.source_table
            )));
        }
        introduced.push(&join.source_table);
        introduced.push(&join.target_table);
    }
    Ok(())
}
