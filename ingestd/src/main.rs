//! Ingestion fabric daemon: runs one `TopicConsumer` per `(service, topic)`
//! pair registered in `ingest_registry`, wired to the search-index and
//! contact-discovery processors. Grounded on the teacher's
//! `riptide-workers` binary: clap CLI, JSON `tracing_subscriber` init, and
//! cooperative shutdown via `tokio::select!` against `ctrl_c()`.

mod processors;

use anyhow::{Context, Result};
use clap::Parser;
use deadpool_redis::{Config as RedisConfig, Runtime};
use ingest_adapters::{GcpPubSubTransport, InMemoryTransport};
use ingest_config::FabricConfig;
use ingest_consumer::{ConsumerConfig, ConsumerMetrics, TopicConsumer};
use ingest_idempotency::{IdempotencyKernel, RedisIdempotencyStore};
use ingest_persistence::{OutboxPublisher, PostgresContactStore, PostgresOutbox};
use ingest_search::{HttpSearchWriter, InMemorySearchWriter};
use ingest_types::ports::contact_store::ContactStore;
use ingest_types::ports::idempotency::IdempotencyStore;
use ingest_types::ports::search_writer::SearchWriter;
use ingest_types::ports::transport::PubSubTransport;
use processors::{ContactDiscoveryProcessor, VespaLoaderProcessor};
use sqlx::postgres::PgPoolOptions;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Every `(service, topic)` pair this daemon drives consumers for. A
/// registry entry with no consumer here is reachable (spec §4.B's table is
/// total) but simply unused by this binary.
const VESPA_LOADER_TOPICS: &[&str] = &[
    "emails",
    "word_documents",
    "word_fragments",
    "sheet_documents",
    "sheet_fragments",
    "presentation_documents",
    "presentation_fragments",
    "task_documents",
    "calendars",
    "todos",
    "contacts",
    "llm_chats",
    "shipment_events",
    "meeting_polls",
    "bookings",
];

const CONTACT_DISCOVERY_TOPICS: &[&str] = &["emails", "calendars", "documents", "todos", "contacts"];

#[derive(Parser)]
#[command(name = "ingestd")]
#[command(about = "Multi-tenant personal-data ingestion fabric")]
struct Args {
    /// Search backend base URL; omit to index in memory only (dev/test).
    #[arg(long, env = "SEARCH_BACKEND_URL")]
    search_backend_url: Option<String>,

    #[arg(long, default_value = "0")]
    max_concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let config = FabricConfig::from_env().context("loading fabric configuration")?;
    let max_concurrency = if args.max_concurrency > 0 {
        args.max_concurrency
    } else if config.max_concurrency > 0 {
        config.max_concurrency
    } else {
        num_cpus::get().max(2)
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pubsub_project_id = %config.pubsub_project_id,
        emulator = config.is_emulator(),
        max_concurrency,
        "starting ingestion fabric"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connecting to postgres")?;

    let redis_pool = RedisConfig::from_url(&config.redis_url)
        .create_pool(Some(Runtime::Tokio1))
        .context("building redis pool")?;

    let transport: Arc<dyn PubSubTransport> = if let Some(host) = &config.pubsub_emulator_host {
        tracing::info!(host = %host, "using Pub/Sub emulator transport");
        Arc::new(GcpPubSubTransport::emulator(config.pubsub_project_id.clone(), host))
    } else {
        tracing::warn!("PUBSUB_EMULATOR_HOST unset and no production credentials wired; falling back to an in-process transport");
        Arc::new(InMemoryTransport::new())
    };

    let idempotency_store: Arc<dyn IdempotencyStore> = Arc::new(RedisIdempotencyStore::new(Arc::new(redis_pool)));
    let kernel = Arc::new(IdempotencyKernel::new(idempotency_store));

    let search_writer: Arc<dyn SearchWriter> = match &args.search_backend_url {
        Some(url) => Arc::new(HttpSearchWriter::new(url.clone())),
        None => Arc::new(InMemorySearchWriter::new()),
    };

    let contact_store: Arc<dyn ContactStore> = Arc::new(PostgresContactStore::new(db_pool.clone()));
    let outbox = Arc::new(PostgresOutbox::new(db_pool.clone()));

    let vespa_processor = Arc::new(VespaLoaderProcessor::new(search_writer));
    let contact_processor = Arc::new(ContactDiscoveryProcessor::new(contact_store, outbox.clone()));

    let consumer_config = ConsumerConfig {
        max_concurrency,
        ..ConsumerConfig::default()
    };

    let mut consumers = Vec::new();
    for topic in VESPA_LOADER_TOPICS {
        consumers.push(Arc::new(TopicConsumer::new(
            "vespa_loader",
            *topic,
            transport.clone(),
            vespa_processor.clone(),
            kernel.clone(),
            Arc::new(ConsumerMetrics::new()),
            consumer_config.clone(),
        )));
    }
    for topic in CONTACT_DISCOVERY_TOPICS {
        consumers.push(Arc::new(TopicConsumer::new(
            "contact_discovery",
            *topic,
            transport.clone(),
            contact_processor.clone(),
            kernel.clone(),
            Arc::new(ConsumerMetrics::new()),
            consumer_config.clone(),
        )));
    }

    let outbox_running = Arc::new(AtomicBool::new(true));
    let outbox_publisher = Arc::new(OutboxPublisher::new(db_pool, transport.clone()));
    let outbox_task = {
        let publisher = outbox_publisher.clone();
        let running = outbox_running.clone();
        tokio::spawn(async move { publisher.run(running).await })
    };

    let mut handles = Vec::with_capacity(consumers.len());
    for consumer in &consumers {
        let consumer = consumer.clone();
        handles.push(tokio::spawn(async move { consumer.run().await }));
    }

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
        tracing::info!("received shutdown signal, stopping consumers");
    };
    shutdown_signal.await;

    for consumer in &consumers {
        consumer.stop();
    }
    outbox_running.store(false, std::sync::atomic::Ordering::Relaxed);

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "consumer exited with an error"),
            Err(e) => tracing::error!(error = %e, "consumer task panicked"),
        }
    }
    let _ = outbox_task.await;

    tracing::info!("ingestion fabric shutdown complete");
    Ok(())
}
