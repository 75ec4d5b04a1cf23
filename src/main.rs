use actix::prelude::*;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use scylladb_cqrs::actors::{CoordinatorActor, DlqActor, GetDlqMessages, GetDlqStats, Shutdown};
use scylladb_cqrs::config::{AppConfig, Backend};
use scylladb_cqrs::domain::account::{
    Account, AccountCommand, AccountCommandHandler, AccountEvent, AccountSummaryProjection, AccountSummaryStore,
    InMemoryAccountSummaryStore, Money, ScyllaAccountSummaryStore,
};
use scylladb_cqrs::event_sourcing::{EventLog, EventStore, InMemoryEventLog, Repository, ScyllaEventLog};
use scylladb_cqrs::metrics::{self, Metrics};
use scylladb_cqrs::projection::{run_change_feed, ProjectionBus};
use scylladb_cqrs::utils::RetryConfig;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,scylladb_cqrs=debug")))
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(backend = ?config.backend, "Starting event-sourced accounts demo");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    actix::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 2. Run against the selected backend ===
    match config.backend {
        Backend::Memory => run_in_memory(&config, metrics).await,
        Backend::Scylla => run_on_scylla(&config, metrics).await,
    }
}

async fn run_in_memory(config: &AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let log = Arc::new(InMemoryEventLog::new());
    let summaries = Arc::new(InMemoryAccountSummaryStore::new());

    let bus = Arc::new(build_bus(summaries.clone(), metrics.clone()));
    let feed = actix::spawn(run_change_feed(log.subscribe(), bus));

    let (handler, repository) = write_side(log.clone(), config, metrics);
    let account_id = demonstrate(&handler, &repository).await?;

    // Closing the log ends the feed once it has drained
    drop(handler);
    drop(repository);
    drop(log);
    let summary = feed.await?;
    tracing::info!(
        batches = summary.batches,
        handled = summary.handled,
        failed = summary.failed,
        "Change feed drained"
    );

    report(summaries.as_ref(), account_id).await
}

async fn run_on_scylla(config: &AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let session = Arc::new(connect(config).await?);

    let log = Arc::new(ScyllaEventLog::new(session.clone()));
    log.ensure_schema().await?;
    let summaries = Arc::new(ScyllaAccountSummaryStore::new(session.clone()));
    summaries.ensure_schema().await?;
    DlqActor::ensure_schema(&session).await?;

    let bus = Arc::new(build_bus(summaries.clone(), metrics.clone()));

    // The coordinator owns the CDC processor and the DLQ
    tracing::info!("Starting coordinator actor");
    let coordinator =
        CoordinatorActor::new(session.clone(), config.scylla_keyspace.clone(), bus, Some(metrics.clone())).start();

    let (handler, repository) = write_side(log, config, metrics);
    let account_id = demonstrate(&handler, &repository).await?;

    // CDC has a confidence window before rows become readable
    tracing::info!("Waiting for CDC processor to project events...");
    tokio::time::sleep(Duration::from_secs(30)).await;

    report(summaries.as_ref(), account_id).await?;

    match coordinator.send(GetDlqStats).await? {
        Ok(stats) => tracing::info!(
            total = stats.total_messages,
            by_kind = ?stats.by_kind,
            "Dead letter queue"
        ),
        Err(e) => tracing::error!(error = %e, "Dead letter stats unavailable"),
    }
    match coordinator.send(GetDlqMessages { limit: 10 }).await? {
        Ok(messages) => {
            for message in messages {
                tracing::warn!(
                    aggregate_id = %message.aggregate_id,
                    version = message.version,
                    kind = %message.kind,
                    failure_count = message.failure_count,
                    error = %message.error_message,
                    "Dead-lettered record"
                );
            }
        }
        Err(e) => tracing::error!(error = %e, "Dead letters unavailable"),
    }

    if let Err(e) = coordinator.send(Shutdown).await? {
        tracing::error!(error = %e, "Coordinator shutdown failed");
    }
    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<Session> {
    tracing::info!(nodes = ?config.scylla_nodes, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_nodes(&config.scylla_nodes)
        .build()
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                config.scylla_keyspace
            ),
            &[],
        )
        .await?;

    session.use_keyspace(&config.scylla_keyspace, false).await?;
    Ok(session)
}

fn build_bus(summaries: Arc<dyn AccountSummaryStore>, metrics: Arc<Metrics>) -> ProjectionBus<AccountEvent> {
    let mut bus = ProjectionBus::new().with_metrics(metrics);
    let registered = AccountSummaryProjection::new(summaries).register_all(&mut bus);
    tracing::info!(kinds = registered, "Account summary projection registered");
    bus
}

fn write_side(
    log: Arc<dyn EventLog>,
    config: &AppConfig,
    metrics: Arc<Metrics>,
) -> (AccountCommandHandler, Repository<Account>) {
    let store = Arc::new(EventStore::new(log).with_metrics(metrics));
    let repository = Repository::new(store, Arc::new(Account::default));
    let handler = AccountCommandHandler::new(repository.clone())
        .with_retry(RetryConfig::for_commands(config.command_max_attempts));
    (handler, repository)
}

/// Open, deposit, withdraw into overdraft, then lose a concurrent save
async fn demonstrate(handler: &AccountCommandHandler, repository: &Repository<Account>) -> anyhow::Result<Uuid> {
    let account_id = Uuid::new_v4();

    handler.open(account_id, "John", "Smith").await?;
    handler.deposit(account_id, "100.00".parse()?).await?;
    handler.withdraw(account_id, "12.55".parse()?).await?;
    let version = handler.withdraw(account_id, Money::from_units(100)).await?;
    tracing::info!(account_id = %account_id, version = version, "Account driven into overdraft");

    // Two writers load the same version; only the first save can win
    let mut first = repository.get_by_id(account_id).await?;
    let mut second = repository.get_by_id(account_id).await?;
    first.execute(&AccountCommand::Deposit {
        amount: Money::from_units(25),
    })?;
    second.execute(&AccountCommand::Deposit {
        amount: Money::from_units(50),
    })?;

    repository.save(&mut first).await?;
    match repository.save(&mut second).await {
        Ok(_) => tracing::warn!(account_id = %account_id, "Concurrent save unexpectedly succeeded"),
        Err(e) => tracing::info!(
            account_id = %account_id,
            status = e.status_code(),
            error = %e,
            "Concurrent save rejected"
        ),
    }

    Ok(account_id)
}

async fn report(summaries: &dyn AccountSummaryStore, account_id: Uuid) -> anyhow::Result<()> {
    match summaries.get(account_id).await? {
        Some(summary) => tracing::info!(
            account_id = %account_id,
            owner = %format!("{} {}", summary.first_name, summary.last_name),
            balance = %summary.balance,
            version = summary.version,
            "Account summary"
        ),
        None => tracing::warn!(account_id = %account_id, "Account summary not projected yet"),
    }
    Ok(())
}
