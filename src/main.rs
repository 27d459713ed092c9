//! `tick-trend` runner.
//!
//! Stdin carries the ingestion transport, one batch per line. Trend detection
//! runs on its own timer and keeps running after stdin closes; Ctrl+C stops
//! both.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use tick_trend::archive::FsArchive;
use tick_trend::config::{Config, LogFormat};
use tick_trend::enrichment::EnrichmentProcessor;
use tick_trend::model::envelope::TransportBatch;
use tick_trend::notify::{notifier_for_topic, Notifier};
use tick_trend::tick_store::SqliteTickStore;
use tick_trend::trend::TrendDetector;

type SharedStore = Arc<SqliteTickStore>;
type Processor = EnrichmentProcessor<SharedStore, Arc<FsArchive>>;
type Detector = TrendDetector<SharedStore, Arc<dyn Notifier + Send + Sync>>;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.with_ansi(false).json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set TABLE_NAME, BUCKET_NAME and SNS_TOPIC_ARN or edit config/default.toml");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let settings = config.trend.detector_settings()?;
    let interval = config.trend.interval_duration()?;
    tracing::info!(
        table = %config.store.table,
        bucket = %config.archive.bucket,
        topic = %config.notify.topic,
        symbols = ?settings.symbols,
        interval_ms = interval.as_millis() as u64,
        "Starting tick-trend"
    );

    // The blocking HTTP client must be dropped outside the runtime; main holds the last handles.
    let store: SharedStore = Arc::new(
        SqliteTickStore::open(&config.store.table)
            .with_context(|| format!("failed to open store {}", config.store.table))?,
    );
    let archive = Arc::new(FsArchive::new(&config.archive.bucket));
    let notifier: Arc<dyn Notifier + Send + Sync> = Arc::from(notifier_for_topic(&config.notify.topic));

    let processor = Arc::new(EnrichmentProcessor::new(Arc::clone(&store), archive));
    let detector = Arc::new(TrendDetector::new(Arc::clone(&store), notifier, settings));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let result = runtime.block_on(run(
        Arc::clone(&processor),
        Arc::clone(&detector),
        interval,
        BufReader::new(tokio::io::stdin()),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Ctrl+C received");
        },
    ));
    drop(runtime);

    tracing::info!("Shutdown complete");
    result
}

async fn run<R, F>(
    processor: Arc<Processor>,
    detector: Arc<Detector>,
    interval: Duration,
    input: R,
    shutdown: F,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let trend_task = tokio::spawn(trend_loop(detector, interval, shutdown_rx));
    tokio::pin!(shutdown);

    let mut lines = input.lines();
    let mut ingesting = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if ingesting => match line {
                Ok(Some(line)) => handle_batch_line(&processor, &line).await,
                Ok(None) => {
                    tracing::info!("Ingestion stream closed; trend detection continues");
                    ingesting = false;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read ingestion stream");
                    ingesting = false;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = trend_task.await {
        tracing::warn!(error = %e, "Trend task ended abnormally");
    }
    Ok(())
}

/// One line on stdin is one delivery from the ingestion transport.
async fn handle_batch_line(processor: &Arc<Processor>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let batch: TransportBatch = match serde_json::from_str(line) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed batch envelope");
            return;
        }
    };

    let processor = Arc::clone(processor);
    match tokio::task::spawn_blocking(move || processor.process_batch(&batch)).await {
        Ok(outcome) => {
            let status = outcome.status();
            tracing::info!(
                status_code = status.status_code,
                body = %status.body,
                processed = outcome.processed(),
                skipped = outcome.skipped(),
                failed = outcome.failed(),
                "Enrichment invocation finished"
            );
        }
        Err(e) => tracing::error!(error = %e, "Enrichment invocation aborted"),
    }
}

async fn trend_loop(detector: Arc<Detector>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let detector = Arc::clone(&detector);
                match tokio::task::spawn_blocking(move || detector.run()).await {
                    Ok(outcome) => {
                        let status = outcome.status();
                        tracing::info!(
                            status_code = status.status_code,
                            body = %status.body,
                            alerts = outcome.alerts().len(),
                            "Trend invocation finished"
                        );
                    }
                    Err(e) => tracing::error!(error = %e, "Trend invocation aborted"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Trend task shutting down");
                    break;
                }
            }
        }
    }
}
