use crate::connection::{DatastoreClient, DatastoreConnection};
use crate::entity::{DatastoreEntity, DatastoreProperties};
use crate::load_config::{load_config, load_from_env};
use crate::query::{self, Page};
use crate::schema::{EntityResult, Key, Query, Value};
use crate::update::delete_one;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Inspect and maintain entities in a Google Cloud Datastore project.
#[derive(Parser)]
#[clap(
    name = "datastorers",
    version,
    about = "Inspect and maintain entities in a Google Cloud Datastore project"
)]
pub struct Cli {
    /// Path to a YAML config file; the environment is used when omitted
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up one entity by numeric id or key name
    Get {
        #[clap(long)]
        kind: String,
        #[clap(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<i64>,
        #[clap(long)]
        name: Option<String>,
    },
    /// List entities whose property equals a value
    Query {
        #[clap(long)]
        kind: String,
        #[clap(long)]
        property: String,
        #[clap(long)]
        value: String,
        #[clap(long, value_enum, default_value_t = ValueType::String)]
        value_type: ValueType,
        #[clap(long)]
        limit: Option<i32>,
        /// Continue after the end cursor printed by a previous page
        #[clap(long)]
        cursor: Option<String>,
    },
    /// List entities of a kind
    List {
        #[clap(long)]
        kind: String,
        #[clap(long)]
        limit: Option<i32>,
        #[clap(long)]
        cursor: Option<String>,
    },
    /// Delete entities of a kind by numeric id
    Delete {
        #[clap(long)]
        kind: String,
        #[clap(long = "id", required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    String,
    Integer,
    Boolean,
}

impl ValueType {
    fn parse(self, raw: &str) -> Result<Value> {
        Ok(match self {
            ValueType::String => Value::string(raw),
            ValueType::Integer => Value::integer(
                raw.parse::<i64>()
                    .with_context(|| format!("--value {raw:?} is not an integer"))?,
            ),
            ValueType::Boolean => Value::boolean(
                raw.parse::<bool>()
                    .with_context(|| format!("--value {raw:?} is not true or false"))?,
            ),
        })
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!(command = ?cli.command, "Starting datastorers");

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };
    let client = DatastoreClient::new(config).context("Failed to create datastore client")?;

    match execute(cli.command, &client).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            Err(e)
        }
    }
}

/// Runs one command and returns what it prints.
pub async fn execute(command: Commands, connection: &impl DatastoreConnection) -> Result<String> {
    match command {
        Commands::Get { kind, id, name } => {
            let entity = match (id, name) {
                (Some(id), _) => query::get_one_entity_by_id(&kind, id, connection).await,
                (None, Some(name)) => query::get_one_entity_by_name(&kind, &name, connection).await,
                (None, None) => anyhow::bail!("either --id or --name is required"),
            }
            .with_context(|| format!("Failed to get {kind} entity"))?;
            Ok(serde_json::to_string_pretty(&render(entity))?)
        }
        Commands::Query {
            kind,
            property,
            value,
            value_type,
            limit,
            cursor,
        } => {
            let value = value_type.parse(&value)?;
            let query = Query {
                limit,
                start_cursor: cursor,
                ..query::property_query(&kind, &property, value)
            };
            let page = query::fetch_page(query, connection)
                .await
                .with_context(|| format!("Failed to query {kind} by {property}"))?;
            render_page(page)
        }
        Commands::List {
            kind,
            limit,
            cursor,
        } => {
            let query = Query {
                limit,
                start_cursor: cursor,
                ..query::kind_query(&kind)
            };
            let page = query::fetch_page(query, connection)
                .await
                .with_context(|| format!("Failed to list {kind}"))?;
            render_page(page)
        }
        Commands::Delete { kind, ids } => {
            let kind = kind.as_str();
            let deletes = ids.iter().map(|&id| {
                let entity = DatastoreEntity::new(
                    Some(Key::from_id(kind, id)),
                    DatastoreProperties::new(),
                    None,
                );
                async move {
                    delete_one(connection, entity)
                        .await
                        .with_context(|| format!("Failed to delete {kind} {id}"))
                }
            });
            futures::future::try_join_all(deletes).await?;
            tracing::info!(kind, count = ids.len(), "Deleted entities");
            Ok(format!("Deleted {} {} entities", ids.len(), kind))
        }
    }
}

fn render(entity: DatastoreEntity) -> EntityResult {
    let version = entity.version();
    EntityResult {
        entity: entity.into(),
        version,
        cursor: None,
    }
}

fn render_page(page: Page) -> Result<String> {
    let entities: Vec<EntityResult> = page.entities.into_iter().map(render).collect();
    let output = serde_json::json!({
        "entities": entities,
        "endCursor": page.end_cursor,
        "hasMoreResults": page.has_more_results,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}
