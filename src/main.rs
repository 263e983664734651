// Command line front end for dataset views
//
// REQUIRED: DATABASE_DSN environment variable must be set.
// OPTIONAL: DATASET_* environment variables (see DatasetConfig).
//
// Subcommands:
//   tables                          list base tables
//   columns <table>                 columns of one table
//   parse <join text>               parsed join specs and the FROM clause
//   create <view> <join text> <table>...
//                                   generate, create, verify and register a view
//   datasets                        registered datasets, newest first
//   profile <view>                  column statistics of a view

use anyhow::{Context, Result, anyhow, bail};
use kodegen_dataset_views::{
    DatasetConfig, DatasetRegistry, DatasetSession, DeterministicViewGenerator, SchemaIntrospector,
    parse_dsn, parse_join_condition, profile_dataset, synthesize_join_clause,
    validate_join_condition,
};
use serde::Serialize;

const USAGE: &str = "usage: kodegen-dataset-views <tables | columns <table> | parse <text> | \
                     create <view> <text> <table>... | datasets | profile <view>>";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

#[derive(Serialize)]
struct ParsedJoins {
    joins: Vec<kodegen_dataset_views::JoinSpec>,
    from_clause: String,
}

#[derive(Serialize)]
struct CreatedDataset {
    sql: String,
    sample: Option<kodegen_dataset_views::QueryResult>,
    record: kodegen_dataset_views::DatasetRecord,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };

    // Parsing needs no database
    if command == "parse" {
        let text = rest.join(" ");
        validate_join_condition(&text)?;
        let joins = parse_join_condition(&text);
        let from_clause = synthesize_join_clause(&joins);
        return print_json(&ParsedJoins { joins, from_clause });
    }

    let dsn = std::env::var("DATABASE_DSN").context("DATABASE_DSN must be set")?;
    let profile = parse_dsn(&dsn).context("Invalid DATABASE_DSN")?;
    let config = DatasetConfig::from_env().context("Invalid DATASET_* configuration")?;

    let mut session = DatasetSession::new(config);
    let status = session.connect(profile).await?;
    log::info!("{}", status.detail);

    let outcome = run(&mut session, command, rest).await;
    session.disconnect().await;
    outcome
}

async fn run(session: &mut DatasetSession, command: &str, rest: &[String]) -> Result<()> {
    match (command, rest) {
        ("tables", []) => {
            let tables = SchemaIntrospector::new(session.connection()?)
                .list_tables()
                .await?;
            print_json(&tables)
        }
        ("columns", [table]) => {
            let columns = SchemaIntrospector::new(session.connection()?)
                .get_columns(table)
                .await?;
            if columns.is_empty() {
                log::warn!("No columns found; does table '{}' exist?", table);
            }
            print_json(&columns)
        }
        ("create", [view, text, tables @ ..]) if tables.len() >= 2 => {
            session.select_tables(tables).await?;
            session.define_joins(text)?;
            let sql = session
                .generate_view(view, &DeterministicViewGenerator)
                .await?
                .generated_sql
                .clone();
            session.create_view().await?;
            let sample = session.verify_view().await?.sample.clone();
            let record = session
                .register(view, &format!("View over {}", tables.join(", ")))
                .await
                .with_context(|| format!("View '{}' was created but not registered", view))?;
            print_json(&CreatedDataset {
                sql,
                sample,
                record,
            })
        }
        ("datasets", []) => {
            let registry = DatasetRegistry::new(session.connection()?)?;
            registry.ensure_table().await?;
            print_json(&registry.list().await?)
        }
        ("profile", [view]) => {
            let profile = profile_dataset(session.connection()?, view).await?;
            print_json(&profile)
        }
        _ => Err(anyhow!(USAGE)),
    }
}
