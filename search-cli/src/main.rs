//! Command-line surface for the hybrid search engine. Absent real drivers
//! configured through the environment, every subcommand runs against an
//! in-memory demo assembly built from the fakes in the test-tooling crate;
//! state does not persist across invocations.

mod demo;

use clap::{Parser, Subcommand};
use hybrid_search_core::identity::{EntityId, OrganizationId, RecordId, TenantId};
use hybrid_search_core::model::{ReindexLockType, TenantScope};
use hybrid_search_core::SearchError;
use hybrid_search_index::orchestrator::SearchOptions;
use hybrid_search_index::row::Row;
use hybrid_search_queue::queue::{JobHandler, Queue};
use hybrid_search_queue::reindex::ReindexMode;
use hybrid_search_queue::worker::IndexingWorker;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "search", about = "Hybrid search engine control surface")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a hybrid search query.
    Query {
        #[arg(long)]
        query: String,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        org: Option<String>,
        #[arg(long, value_delimiter = ',')]
        entity: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        strategy: Option<Vec<String>>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Report strategy availability and queue depths.
    Status,
    /// Index a single record.
    Index {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        record: String,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        org: Option<String>,
    },
    /// Reindex an entity (or every registered entity) for a tenant.
    Reindex {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        entity: Option<String>,
        #[arg(long)]
        org: Option<String>,
        #[arg(long)]
        purge: bool,
        #[arg(long)]
        skip_purge: bool,
        #[arg(long)]
        partitions: Option<usize>,
        #[arg(long)]
        partition: Option<usize>,
        #[arg(long)]
        batch: Option<usize>,
        #[arg(long)]
        force: bool,
    },
    /// Start a queue worker loop.
    Worker {
        queue_name: String,
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

enum CliError {
    User(String),
    BackendUnavailable(String),
    Other(SearchError),
}

impl From<SearchError> for CliError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::Strategy(hybrid_search_core::error::StrategyError::Unavailable { .. }) => CliError::BackendUnavailable(err.to_string()),
            SearchError::Queue(hybrid_search_core::error::QueueError::BackendUnavailable { .. }) => CliError::BackendUnavailable(err.to_string()),
            _ => CliError::Other(err),
        }
    }
}

fn parse_tenant(raw: &str) -> Result<TenantId, CliError> {
    raw.parse().map_err(|_| CliError::User(format!("invalid --tenant value '{raw}'")))
}

fn parse_org(raw: &Option<String>) -> Result<Option<OrganizationId>, CliError> {
    match raw {
        Some(raw) => raw.parse().map(Some).map_err(|_| CliError::User(format!("invalid --org value '{raw}'"))),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::from(0),
        Err(CliError::User(message)) => {
            eprintln!("error: {message}");
            ExitCode::from(1)
        }
        Err(CliError::BackendUnavailable(message)) => {
            eprintln!("backend unavailable: {message}");
            ExitCode::from(2)
        }
        Err(CliError::Other(err)) => {
            eprintln!("unexpected error: {err}");
            ExitCode::from(3)
        }
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Query { query, tenant, org, entity, strategy, limit } => run_query(query, tenant, org, entity, strategy, limit).await,
        Command::Status => run_status().await,
        Command::Index { entity, record, tenant, org } => run_index(entity, record, tenant, org).await,
        Command::Reindex { tenant, entity, org, purge, skip_purge, partitions, partition, batch, force } => {
            run_reindex(tenant, entity, org, purge, skip_purge, partitions, partition, batch, force).await
        }
        Command::Worker { queue_name, concurrency } => run_worker(queue_name, concurrency).await,
    }
}

async fn run_query(query: String, tenant: String, org: Option<String>, entity: Option<Vec<String>>, strategy: Option<Vec<String>>, limit: Option<usize>) -> Result<(), CliError> {
    let tenant_id = parse_tenant(&tenant)?;
    let organization_id = parse_org(&org)?;
    let demo = demo::DemoAssembly::new();

    let options = SearchOptions { strategies: strategy, entity_ids: entity.map(|names| names.into_iter().map(EntityId::new).collect()), limit };
    let scope = TenantScope::new(tenant_id, organization_id);
    let hits = demo.orchestrator.search(&query, scope, options).await;
    println!("{}", serde_json::to_string_pretty(&hits).map_err(|e| CliError::Other(SearchError::Fatal(e.to_string())))?);
    Ok(())
}

async fn run_status() -> Result<(), CliError> {
    use hybrid_search_strategies::Strategy;
    let demo = demo::DemoAssembly::new();
    let mut report = serde_json::Map::new();
    for strategy in &demo.strategies {
        report.insert(
            strategy.id().to_string(),
            serde_json::json!({ "name": strategy.name(), "priority": strategy.priority(), "available": strategy.is_available().await }),
        );
    }
    println!("{}", serde_json::to_string_pretty(&report).unwrap());
    Ok(())
}

async fn run_index(entity: String, record: String, tenant: String, org: Option<String>) -> Result<(), CliError> {
    let tenant_id = parse_tenant(&tenant)?;
    let organization_id = parse_org(&org)?;
    let entity_id = EntityId::new(entity);
    let demo = demo::DemoAssembly::new();
    if demo.registry.get(&entity_id).is_none() {
        return Err(CliError::User(format!("entity '{entity_id}' is not registered")));
    }

    let scope = TenantScope::new(tenant_id, organization_id);
    demo.primary_store.insert_row(&entity_id, &scope, Row { id: record.clone(), fields: Default::default() });
    let outcome = demo.indexer.index_record_by_id(&entity_id, &RecordId::new(record), scope).await?;
    println!("{outcome:?}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_reindex(
    tenant: String,
    entity: Option<String>,
    org: Option<String>,
    purge: bool,
    skip_purge: bool,
    partitions: Option<usize>,
    partition: Option<usize>,
    batch: Option<usize>,
    force: bool,
) -> Result<(), CliError> {
    if purge && skip_purge {
        return Err(CliError::User("--purge and --skip-purge are mutually exclusive".to_string()));
    }
    let tenant_id = parse_tenant(&tenant)?;
    let organization_id = parse_org(&org)?;
    let demo = demo::DemoAssembly::new();

    let entity_ids = match entity {
        Some(entity) => {
            let entity_id = EntityId::new(entity);
            if demo.registry.get(&entity_id).is_none() {
                return Err(CliError::User(format!("entity '{entity_id}' is not registered")));
            }
            vec![entity_id]
        }
        None => demo.indexer.enabled_entity_ids(),
    };
    if let Some(partitions) = partitions {
        let partition = partition.unwrap_or(0);
        if partition >= partitions {
            return Err(CliError::User(format!("--partition {partition} is out of range for --partitions {partitions}")));
        }
        tracing::info!(partitions, partition, "partitioned reindex requested; this demo assembly processes the full range");
    }
    if force {
        tracing::info!("--force set: stale-lock checks will still apply, but pre-existing fresh locks are not special-cased here");
    }

    let scope = TenantScope::new(tenant_id, organization_id);
    let mut config = hybrid_search_core::config::ReindexConfig::default();
    if let Some(batch) = batch {
        config.direct_page_size = batch;
    }
    let controller = hybrid_search_queue::reindex::ReindexController::new(demo.indexer.clone(), demo.locks.clone(), config);
    let report = controller.reindex_all(&entity_ids, scope, ReindexLockType::Vector, ReindexMode::Direct, purge, None, None).await?;
    println!("{report:#?}");
    Ok(())
}

async fn run_worker(queue_name: String, concurrency: Option<usize>) -> Result<(), CliError> {
    if let Some(concurrency) = concurrency {
        tracing::info!(concurrency, "concurrency is accepted for parity with the queue CLI surface; the in-process demo queue processes one job at a time");
    }
    let demo = demo::DemoAssembly::new();
    let queue: Arc<dyn Queue> = Arc::new(hybrid_search_queue::in_process::InProcessQueue::new(queue_name.clone()));
    let coverage = Arc::new(hybrid_search_queue::worker::InMemoryCoverageAdjuster::default());
    let worker: Arc<dyn JobHandler> = Arc::new(IndexingWorker::new(demo.indexer.clone(), coverage, false));
    queue.process(worker).await?;
    tracing::info!(queue = %queue_name, "worker started, waiting for shutdown signal");
    tokio::signal::ctrl_c().await.ok();
    queue.close().await?;
    Ok(())
}
