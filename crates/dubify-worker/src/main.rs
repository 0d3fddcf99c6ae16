//! Batch dubbing worker binary.
//!
//! Usage: `dubify-worker <jobs.json>`

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dubify_worker::{build_queue, parse_requests, run_batch, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    init_tracing(config.log_json)?;

    info!("Starting dubify-worker");
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Metrics listener started");
    }

    let path = std::env::args()
        .nth(1)
        .context("usage: dubify-worker <jobs.json>")?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {path}"))?;
    let requests = parse_requests(&raw)?;

    let (queue, records) = match build_queue(&config, &requests).await {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to build job queue: {:#}", e);
            return Err(e);
        }
    };

    let mut events = queue.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(
                job_id = %event.job_id,
                user_id = %event.user_id,
                state = ?event.state,
                attempt = event.attempt,
                "Job state changed"
            );
        }
    });

    let shutdown_queue = queue.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal");
            shutdown_queue.shutdown();
        }
    });

    let summary = run_batch(&queue, records.as_ref(), requests).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("dubify-worker finished");
    Ok(())
}

fn init_tracing(use_json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive("dubify=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
