//! CREATE VIEW text generation
//!
//! A [`ViewTextGenerator`] turns a view name, the selected tables with their
//! columns and a join description into one `CREATE VIEW` statement. The
//! deterministic strategy here renders it from the parsed joins; other
//! strategies (an LLM client, say) plug in through the same trait.
//!
//! Whatever the origin, generated SQL goes through [`check_generated_view`]
//! before it is executed.

use crate::error::DatabaseError;
use crate::join::{JoinSpec, parse_join_condition, synthesize_join_clause, validate_join_condition};
use crate::sql_parser::{
    StatementKind, classify_statement, create_view_name, parse_single_statement,
    referenced_relations, strip_code_fences,
};
use crate::schema_queries::get_default_schema;
use crate::types::{ColumnDescriptor, DatabaseType};
use crate::validate::{ensure_allowed, validate_identifier};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything a generator gets to work with
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewGenerationInput {
    pub view_name: String,
    pub tables: Vec<String>,
    pub table_columns: BTreeMap<String, Vec<ColumnDescriptor>>,
    pub join_condition: String,
}

impl ViewGenerationInput {
    /// Columns of `table` (case-insensitive), empty when unknown
    pub fn columns_of(&self, table: &str) -> &[ColumnDescriptor] {
        self.table_columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, columns)| columns.as_slice())
            .unwrap_or(&[])
    }

    /// Schema description in the shape text generators are prompted with
    pub fn describe_tables(&self) -> String {
        self.tables
            .iter()
            .map(|table| {
                let columns = self
                    .columns_of(table)
                    .iter()
                    .map(|c| format!("  - {} ({})", c.name, c.declared_type))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("Table: {}\n{}", table, columns)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Produces a candidate `CREATE VIEW` statement
///
/// Implementations report their own failures as `GenerationError`.
#[async_trait]
pub trait ViewTextGenerator: Send + Sync {
    async fn generate(&self, input: &ViewGenerationInput) -> Result<String, DatabaseError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Renders the view straight from the parsed join description
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicViewGenerator;

#[async_trait]
impl ViewTextGenerator for DeterministicViewGenerator {
    async fn generate(&self, input: &ViewGenerationInput) -> Result<String, DatabaseError> {
        validate_identifier(&input.view_name)?;
        validate_join_condition(&input.join_condition)?;

        let joins = parse_join_condition(&input.join_condition)
            .into_iter()
            .map(|join| canonical_join(join, &input.tables))
            .collect::<Result<Vec<_>, _>>()?;
        if joins.is_empty() {
            return Err(DatabaseError::GenerationError(
                "join condition produced no join clauses".to_string(),
            ));
        }

        let mut joined_tables: Vec<&str> = Vec::new();
        for join in &joins {
            for table in [join.source_table.as_str(), join.target_table.as_str()] {
                if !joined_tables.contains(&table) {
                    joined_tables.push(table);
                }
            }
        }

        let select_list: Vec<String> = joined_tables
            .iter()
            .flat_map(|table| {
                input.columns_of(table).iter().filter_map(move |column| {
                    match validate_identifier(&column.name) {
                        Ok(()) => Some(format!(
                            "{table}.{col} AS {table}_{col}",
                            table = table,
                            col = column.name
                        )),
                        Err(e) => {
                            log::warn!("Leaving column {}.{} out of the view: {}", table, column.name, e);
                            None
                        }
                    }
                })
            })
            .collect();

        let select_list = if select_list.is_empty() {
            "*".to_string()
        } else {
            select_list.join(",\n    ")
        };

        Ok(format!(
            "CREATE VIEW {} AS\nSELECT\n    {}\n{}",
            input.view_name,
            select_list,
            synthesize_join_clause(&joins)
        ))
    }

    fn name(&self) -> &str {
        "deterministic"
    }
}

/// Rewrite parsed (lowercased) table names to the spelling of the selection
fn canonical_join(join: JoinSpec, tables: &[String]) -> Result<JoinSpec, DatabaseError> {
    validate_identifier(&join.join_field)?;
    Ok(JoinSpec {
        source_table: ensure_allowed(&join.source_table, tables)?.to_string(),
        target_table: ensure_allowed(&join.target_table, tables)?.to_string(),
        ..join
    })
}

/// Check generated SQL before it is executed
///
/// The statement must be exactly one `CREATE VIEW` for `view_name`, and every
/// relation it reads must be in `allow_list`. A schema-qualified relation must
/// name `schema` (or the dialect's default schema when `schema` is `None`).
/// Tables named in `joins` that the SQL never mentions are logged as a
/// warning. Returns the statement with code fences removed.
pub fn check_generated_view<S: AsRef<str>>(
    sql: &str,
    view_name: &str,
    allow_list: &[S],
    joins: &[JoinSpec],
    db_type: DatabaseType,
    schema: Option<&str>,
) -> Result<String, DatabaseError> {
    let sql = strip_code_fences(sql);

    if classify_statement(&sql) != StatementKind::CreateView {
        return Err(DatabaseError::GenerationError(format!(
            "Generated SQL is not a CREATE VIEW statement: {}",
            sql.chars().take(80).collect::<String>()
        )));
    }

    match create_view_name(&sql) {
        Some(name) if name.eq_ignore_ascii_case(view_name) => {}
        Some(name) => {
            return Err(DatabaseError::GenerationError(format!(
                "Generated SQL creates view '{}' instead of '{}'",
                name, view_name
            )));
        }
        None => {
            return Err(DatabaseError::GenerationError(
                "Generated SQL does not name a view".to_string(),
            ));
        }
    }

    let statement = parse_single_statement(&sql, db_type)?;
    let relations = referenced_relations(&statement);

    let allowed_schema = schema.or_else(|| get_default_schema(db_type));
    for relation in relations
        .iter()
        .filter(|r| !r.name.eq_ignore_ascii_case(view_name))
    {
        if let Some(qualifier) = &relation.schema {
            if !allowed_schema.is_some_and(|s| s.eq_ignore_ascii_case(qualifier)) {
                return Err(DatabaseError::ValidationError(format!(
                    "Relation '{}.{}' is outside the connected schema",
                    qualifier, relation.name
                )));
            }
        }
        ensure_allowed(&relation.name, allow_list)?;
    }

    for table in joins
        .iter()
        .flat_map(|j| [j.source_table.as_str(), j.target_table.as_str()])
    {
        if !relations.iter().any(|r| r.name.eq_ignore_ascii_case(table)) {
            log::warn!(
                "Generated view {} does not reference joined table {}",
                view_name,
                table
            );
        }
    }

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, declared_type: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            nullable: true,
        }
    }

    fn input() -> ViewGenerationInput {
        let mut table_columns = BTreeMap::new();
        table_columns.insert(
            "Orders".to_string(),
            vec![column("order_id", "INTEGER"), column("customer_id", "INTEGER")],
        );
        table_columns.insert(
            "Customers".to_string(),
            vec![column("customer_id", "INTEGER"), column("name", "TEXT")],
        );
        ViewGenerationInput {
            view_name: "customer_orders".to_string(),
            tables: vec!["Orders".to_string(), "Customers".to_string()],
            table_columns,
            join_condition: "Join orders table with customers table using customer_id".to_string(),
        }
    }

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl ViewTextGenerator for CannedGenerator {
        async fn generate(&self, _input: &ViewGenerationInput) -> Result<String, DatabaseError> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_deterministic_view_uses_catalog_spelling() {
        let sql = DeterministicViewGenerator.generate(&input()).await;
        let sql = match sql {
            Ok(sql) => sql,
            Err(e) => panic!("generation failed: {}", e),
        };
        assert!(sql.starts_with("CREATE VIEW customer_orders AS"));
        assert!(sql.contains("Orders.order_id AS Orders_order_id"));
        assert!(sql.contains("Customers.name AS Customers_name"));
        assert!(sql.ends_with(
            "FROM Orders\nINNER JOIN Customers ON Orders.customer_id = Customers.customer_id"
        ));

        let checked = check_generated_view(
            &sql,
            "customer_orders",
            &input().tables,
            &[],
            DatabaseType::SQLite,
            None,
        );
        assert!(checked.is_ok(), "{:?}", checked.err());
    }

    #[tokio::test]
    async fn test_deterministic_rejects_unselected_table() {
        let mut request = input();
        request.join_condition = "join orders table with payments table using order_id".to_string();
        let result = DeterministicViewGenerator.generate(&request).await;
        assert!(matches!(result, Err(DatabaseError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_star_when_no_columns_known() {
        let mut request = input();
        request.table_columns.clear();
        let sql = DeterministicViewGenerator.generate(&request).await.unwrap_or_default();
        assert!(sql.contains("SELECT\n    *\nFROM Orders"));
    }

    #[tokio::test]
    async fn test_external_output_is_fence_stripped_and_checked() {
        let generator = CannedGenerator(
            "```sql\nCREATE VIEW customer_orders AS SELECT o.order_id FROM Orders o JOIN Customers c ON o.customer_id = c.customer_id;\n```",
        );
        let raw = generator.generate(&input()).await.unwrap_or_default();
        let checked = check_generated_view(
            &raw,
            "customer_orders",
            &input().tables,
            &[],
            DatabaseType::SQLite,
            None,
        );
        assert!(matches!(checked.as_deref(), Ok(s) if s.starts_with("CREATE VIEW")));
    }

    #[test]
    fn test_check_rejects_foreign_relation() {
        let result = check_generated_view(
            "CREATE VIEW customer_orders AS SELECT * FROM Orders JOIN secrets ON 1 = 1",
            "customer_orders",
            &["Orders", "Customers"],
            &[],
            DatabaseType::SQLite,
            None,
        );
        assert!(matches!(result, Err(DatabaseError::ValidationError(_))));
    }

    #[test]
    fn test_check_rejects_other_schemas() {
        let tables = ["orders", "customers"];
        let foreign = check_generated_view(
            "CREATE VIEW v AS SELECT * FROM other_schema.orders",
            "v",
            &tables,
            &[],
            DatabaseType::Postgres,
            None,
        );
        assert!(matches!(foreign, Err(DatabaseError::ValidationError(_))));

        let default_schema = check_generated_view(
            "CREATE VIEW v AS SELECT * FROM public.orders",
            "v",
            &tables,
            &[],
            DatabaseType::Postgres,
            None,
        );
        assert!(default_schema.is_ok(), "{:?}", default_schema.err());

        let configured = check_generated_view(
            "CREATE VIEW v AS SELECT * FROM sales.orders o JOIN sales.customers c ON o.id = c.id",
            "v",
            &tables,
            &[],
            DatabaseType::Postgres,
            Some("sales"),
        );
        assert!(configured.is_ok(), "{:?}", configured.err());
    }

    #[test]
    fn test_check_rejects_other_statements() {
        let tables = ["Orders"];
        assert!(matches!(
            check_generated_view("DROP TABLE Orders", "v", &tables, &[], DatabaseType::SQLite, None),
            Err(DatabaseError::GenerationError(_))
        ));
        assert!(matches!(
            check_generated_view(
                "CREATE VIEW other AS SELECT * FROM Orders",
                "v",
                &tables,
                &[],
                DatabaseType::SQLite,
                None
            ),
            Err(DatabaseError::GenerationError(_))
        ));
        assert!(matches!(
            check_generated_view(
                "CREATE VIEW v AS SELECT * FROM Orders; DROP TABLE Orders",
                "v",
                &tables,
                &[],
                DatabaseType::SQLite,
                None
            ),
            Err(DatabaseError::GenerationError(_))
        ));
    }

    #[test]
    fn test_describe_tables() {
        let text = input().describe_tables();
        assert!(text.contains("Table: Orders\n  - order_id (INTEGER)"));
    }
}
