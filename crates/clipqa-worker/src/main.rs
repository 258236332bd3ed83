//! Segmentation worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipqa_detector::{DetectorClient, MonitorConfig, SegmentationMonitor};
use clipqa_storage::{DriveUploader, ObjectStoreUploader};
use clipqa_store::{PgStore, StoreConfig};
use clipqa_worker::{
    metrics, ClipMaterializer, FfmpegTools, VideoProcessor, WorkerConfig, WorkerError, WorkerExecutor,
    WorkerResult,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting clipqa-worker");

    let executor = match build_executor().await {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!("Failed to start worker: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal, finishing in-flight video");
            executor.shutdown();
        })
    };

    if let Err(e) = executor.run().await {
        error!("Worker error: {}", e);
        std::process::exit(1);
    }

    shutdown.abort();
    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clipqa=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn build_executor() -> WorkerResult<WorkerExecutor> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if config.metrics_enabled {
        metrics::init_metrics(config.metrics_port)?;
    }

    clipqa_media::check_ffmpeg()?;
    clipqa_media::check_ffprobe()?;

    let store = Arc::new(PgStore::connect(&StoreConfig::from_env()?).await?);
    store.migrate().await?;

    let detector = SegmentationMonitor::new(Arc::new(DetectorClient::from_env()?), MonitorConfig::from_env());
    let media = Arc::new(FfmpegTools::new(&config)?);

    let drive = Arc::new(DriveUploader::from_env()?);
    let object_store = Arc::new(ObjectStoreUploader::from_env()?);

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .map_err(|e| WorkerError::config_error(format!("work dir {}: {}", config.work_dir.display(), e)))?;

    let materializer = ClipMaterializer::new(store.clone(), media.clone(), drive, object_store, config.upload_retries);
    let processor = VideoProcessor::new(Arc::new(detector), media, materializer, config.clone());

    Ok(WorkerExecutor::new(store, processor, config))
}
