use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use vitalhub::{
    actors::ingest::IngestWorker,
    api::{spawn_api_server, ApiState},
    baseline::BaselineRegistry,
    broker::{self, BrokerGateway},
    config::Config,
    detector::DetectorState,
    llm::TrendAnalyst,
    storage::{MemoryBackend, StorageBackend, TimescaleBackend},
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Run without a database (samples and alerts kept in memory only)
    #[arg(long)]
    in_memory: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("vitalhub", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = Config::from_env();

    run_backend(config, args.in_memory).await
}

/// Wire up and run the full pipeline until Ctrl+C.
async fn run_backend(config: Config, in_memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn StorageBackend> = if in_memory {
        warn!("running with in-memory storage, nothing will be persisted");
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(TimescaleBackend::connect(&config.db).await?)
    };

    let registry = Arc::new(BaselineRegistry::new());
    let detector = Arc::new(DetectorState::new(registry));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ingestion workers feed from the gateway and publish back through it.
    let (publisher, outbound_rx) = broker::outbound_channel();
    let (workers, worker_handles) = IngestWorker::spawn_pool(
        Arc::clone(&detector),
        Arc::clone(&store),
        publisher.clone(),
    );
    info!("{} ingestion workers started", workers.len());

    let (gateway, counters) = BrokerGateway::new(
        config.mqtt.clone(),
        workers,
        Arc::clone(&detector),
        outbound_rx,
        shutdown_rx.clone(),
    );
    let gateway_handle = tokio::spawn(gateway.run());
    info!("broker gateway started");

    let analyst = TrendAnalyst::new(config.llm.clone())?;
    let api_state = ApiState::new(
        Arc::clone(&detector),
        Arc::clone(&store),
        publisher,
        analyst,
    );
    spawn_api_server(config.api_port, api_state, shutdown_rx).await?;

    info!("backend running, press Ctrl+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping..."),
        Err(err) => error!("unable to listen for shutdown signal: {err}"),
    }

    // Stop the gateway; dropping it closes the work channels, so the
    // workers drain whatever is queued and exit.
    let _ = shutdown_tx.send(true);

    if let Err(e) = gateway_handle.await {
        warn!("broker gateway task failed: {e}");
    }
    for handle in worker_handles {
        if let Err(e) = handle.await {
            warn!("ingestion worker task failed: {e}");
        }
    }

    let dropped = counters.parse_errors.load(Ordering::Relaxed);
    if dropped > 0 {
        warn!("{dropped} malformed payloads were dropped during this run");
    }

    if let Err(e) = store.close().await {
        warn!("error closing storage backend: {e}");
    }

    info!("backend stopped");
    Ok(())
}
