//! EMI Risk Engine - Main Entry Point
//!
//! Loads the model artifacts, starts the background metrics updater and
//! answers assessment requests over NATS until Ctrl-C.

use anyhow::Result;
use emi_risk_engine::{
    clock::{Clock, SystemClock},
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{BackgroundMetricsUpdater, LiveMetrics, StatsAggregator, SysinfoSampler},
    models::{load_baseline_accuracy, ModelLoader},
    orchestrator::PredictionOrchestrator,
    producer::ResponsePublisher,
    service,
    telemetry::MlflowTelemetry,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("emi_risk_engine={}", logging.level)));

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    info!("Starting EMI Risk Engine");
    info!(
        "Risk levels: medium>{:.0}%, high>{:.0}% | Confidence: medium>{:.2}, high>{:.2}",
        config.assessment.risk_levels.medium,
        config.assessment.risk_levels.high,
        config.assessment.confidence.medium,
        config.assessment.confidence.high
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Load model artifacts; anything missing only degrades the matching operation
    let loader = ModelLoader::with_threads(config.models.onnx_threads);
    let gateway = loader.load_gateway(&config.models);
    let status = gateway.status();
    info!(
        classifier = status.classifier_loaded,
        regressor = status.regressor_loaded,
        scalers = status.scalers_loaded,
        label_decoder = status.label_decoder_loaded,
        "Model artifacts loaded"
    );

    let baseline = load_baseline_accuracy(&config.models, config.metrics.baseline);
    info!(
        classification = baseline.classification,
        regression = baseline.regression,
        "Baseline model accuracy"
    );

    let stats = Arc::new(StatsAggregator::with_capacity(
        clock.clone(),
        baseline,
        config.metrics.recent_capacity,
    ));
    let live = Arc::new(LiveMetrics::new());
    let orchestrator = Arc::new(
        PredictionOrchestrator::new(gateway, stats.clone(), live.clone(), clock.clone())
            .with_assessment(config.assessment.clone()),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Background metrics updater
    let mut updater = BackgroundMetricsUpdater::new(stats.clone(), live.clone(), clock.clone())
        .with_timing(&config.metrics);
    if config.metrics.sample_host {
        updater = updater.with_sampler(Arc::new(SysinfoSampler::new()));
    } else {
        info!("Host sampling disabled, system load will be simulated");
    }
    if let Some(uri) = &config.telemetry.mlflow_tracking_uri {
        match MlflowTelemetry::new(uri, Duration::from_millis(config.telemetry.timeout_ms)) {
            Ok(telemetry) => {
                info!(tracking_uri = %uri, "MLflow telemetry enabled");
                updater = updater.with_telemetry(Arc::new(telemetry));
            }
            Err(e) => warn!(error = %e, "MLflow telemetry disabled"),
        }
    }
    let updater_handle = Arc::new(updater).spawn(shutdown_tx.subscribe());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.subject_prefix);
    let publisher = ResponsePublisher::new(client.clone(), &config.nats.subject_prefix);

    // Periodic snapshot publishing
    let snapshot_handle = {
        let orchestrator = orchestrator.clone();
        let publisher = publisher.clone();
        let mut shutdown = shutdown_tx.subscribe();
        let period = Duration::from_secs(config.pipeline.snapshot_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = publisher.publish_snapshot(&orchestrator.get_snapshot()).await {
                            warn!(error = %e, "Failed to publish snapshot");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    };

    let num_workers = config.pipeline.workers;
    info!(
        "Starting request loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", consumer.wildcard_subject());
    info!("Publishing snapshots to: {}", publisher.snapshot_subject());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers.max(1)));
    let handled_count = Arc::new(AtomicU64::new(0));

    let mut subscription = consumer.subscribe().await?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => {
                    warn!("Subscription closed");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
        };

        let Some(kind) = consumer.kind_of(&message.subject) else {
            if let Some(reply_to) = message.reply {
                let reply = service::error_reply(&format!("unknown subject {}", message.subject));
                if let Err(e) = publisher.reply(reply_to, reply).await {
                    error!(error = %e, "Failed to send error reply");
                }
            } else {
                debug!(subject = %message.subject, "Ignoring message");
            }
            continue;
        };

        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let orchestrator = orchestrator.clone();
        let publisher = publisher.clone();
        let handled_count = handled_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let reply = service::handle_request(&orchestrator, kind, &message.payload);

            match message.reply {
                Some(reply_to) => {
                    if let Err(e) = publisher.reply(reply_to, reply).await {
                        error!(request = %kind, error = %e, "Failed to send reply");
                    }
                }
                None => warn!(request = %kind, "Request without reply subject"),
            }

            debug!(
                request = %kind,
                processing_time_us = start_time.elapsed().as_micros(),
                "Request handled"
            );

            let count = handled_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 requests
            if count % 100 == 0 {
                let snapshot = orchestrator.stats().snapshot();
                info!(
                    handled = count,
                    success_rate = format!("{:.1}%", snapshot.success_rate * 100.0),
                    avg_latency_ms = snapshot.statistics.avg_prediction_time * 1000.0,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Engine shutting down...");
    let _ = shutdown_tx.send(());
    if let Err(e) = updater_handle.await {
        error!(error = %e, "Metrics updater task failed");
    }
    if let Err(e) = snapshot_handle.await {
        error!(error = %e, "Snapshot task failed");
    }

    // Print final summary
    stats.print_summary();

    Ok(())
}
