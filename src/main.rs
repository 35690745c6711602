//! mediaflow entry point: run the orchestrator, run a worker, or publish a
//! development job event.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mediaflow::broker::{Broker, RedisBroker};
use mediaflow::config::Settings;
use mediaflow::job::{IngestionJobRequest, JobCreatedEvent};
use mediaflow::orchestrator::{ApiState, CommandListener, Orchestrator};
use mediaflow::worker::{
    AiWorker, MediaWorker, MetadataWorker, TextExtractionWorker, ValidationWorker, WorkerHandler,
    WorkerService, health_router,
};

#[derive(Parser)]
#[command(name = "mediaflow", version, about = "Media ingestion pipeline")]
struct Cli {
    /// Broker connection URL.
    #[arg(long, env = "BROKER_URL")]
    broker_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator: HTTP surface plus the command-queue listener.
    Serve,
    /// Run a single worker service.
    Worker {
        #[arg(value_enum)]
        kind: WorkerKind,
        /// Port for this worker's health endpoint.
        #[arg(long)]
        health_port: Option<u16>,
    },
    /// Publish a JOB_CREATED event for a local file (stands in for the
    /// upload gateway during development).
    Submit {
        file: PathBuf,
        #[arg(long)]
        content_type: String,
        #[arg(long)]
        submitted_by: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WorkerKind {
    Validation,
    Metadata,
    Text,
    Ai,
    Media,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(url) = cli.broker_url {
        settings.broker_url = url;
    }

    match cli.command {
        Command::Serve => serve(settings).await,
        Command::Worker { kind, health_port } => run_worker(settings, kind, health_port).await,
        Command::Submit {
            file,
            content_type,
            submitted_by,
        } => submit(settings, file, content_type, submitted_by).await,
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    tracing::info!("starting workflow orchestrator");
    let broker: Arc<dyn Broker> = Arc::new(RedisBroker::connect(&settings.broker_url).await?);
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&broker), &settings));

    if settings.listener_enabled {
        let listener = CommandListener::new(
            Arc::clone(&broker),
            Arc::clone(&orchestrator),
            settings.command_channel.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = listener.run().await {
                tracing::error!("command listener stopped: {e}");
            }
        });
    } else {
        tracing::info!("command listener disabled; only direct HTTP submission is processed");
    }

    mediaflow::orchestrator::serve(
        ApiState { orchestrator },
        &settings.http_host,
        settings.http_port,
    )
    .await
}

async fn run_worker(
    settings: Settings,
    kind: WorkerKind,
    health_port: Option<u16>,
) -> anyhow::Result<()> {
    let broker: Arc<dyn Broker> = Arc::new(RedisBroker::connect(&settings.broker_url).await?);

    let (handler, channels): (Arc<dyn WorkerHandler>, _) = match kind {
        WorkerKind::Validation => (
            Arc::new(ValidationWorker::new(settings.validation.clone())),
            &settings.workers.validation,
        ),
        WorkerKind::Metadata => (Arc::new(MetadataWorker), &settings.workers.metadata),
        WorkerKind::Text => (
            Arc::new(TextExtractionWorker::new(settings.processed_dir.clone())),
            &settings.workers.text,
        ),
        WorkerKind::Ai => (Arc::new(AiWorker), &settings.workers.ai),
        WorkerKind::Media => (Arc::new(MediaWorker), &settings.workers.media),
    };

    let service = WorkerService::new(
        broker,
        handler,
        channels.request_channel.clone(),
        channels.callback_channel.clone(),
    );

    let port = health_port.unwrap_or(settings.worker_health_port);
    let router = health_router(format!("{kind:?}").to_lowercase());
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                tracing::info!("worker health endpoint on 127.0.0.1:{port}");
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!("health endpoint stopped: {e}");
                }
            }
            Err(e) => tracing::error!("could not bind health endpoint: {e}"),
        }
    });

    service.run().await?;
    Ok(())
}

async fn submit(
    settings: Settings,
    file: PathBuf,
    content_type: String,
    submitted_by: Option<String>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file)?;
    let checksum = format!("{:x}", Sha256::digest(&bytes));

    let request = IngestionJobRequest {
        job_id: Uuid::new_v4().to_string(),
        file_path: file.to_string_lossy().into_owned(),
        content_type,
        checksum_sha256: checksum,
        submitted_by,
    };
    let event = JobCreatedEvent::new(request);

    let broker = RedisBroker::connect(&settings.broker_url).await?;
    broker
        .publish(&settings.command_channel, &serde_json::to_vec(&event)?)
        .await?;

    println!("{}", event.job.job_id);
    Ok(())
}
