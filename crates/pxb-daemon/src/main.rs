use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use pxb_daemon::api::{self, AppState};
use pxb_providers::ResourceProvider;
use pxb_runner::{Config, Runner, ABANDONED_MESSAGE, DEFAULT_CONFIG_FILE};
use pxb_storage::JobStore;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "pxb-daemon", version, about = "HTTP front end for Proxmox batch analysis")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listen address, overrides `server.listen` from the config
    #[arg(long)]
    listen: Option<String>,

    /// Mark jobs left RUNNING by a previous process as FAILED before serving
    #[arg(long, default_value_t = false)]
    reconcile_on_start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config)?;
    let listen = cli.listen.clone().unwrap_or_else(|| cfg.server.listen.clone());

    let runner = Runner::open(cfg)?;
    if cli.reconcile_on_start {
        let abandoned = runner.store.abandon_running(ABANDONED_MESSAGE).await?;
        if !abandoned.is_empty() {
            warn!(jobs = ?abandoned, "marked interrupted jobs as failed");
        }
    }

    let resources: Arc<dyn ResourceProvider> = runner.resource_provider()?;
    let orchestrator = Arc::new(runner.orchestrator_with(Arc::clone(&resources))?);
    let state = AppState::new(runner.store.clone(), resources, orchestrator);
    let tracker = state.tracker.clone();

    let app = Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/cluster/info", get(api::cluster_info))
        .route("/cluster/resources", get(api::cluster_resources))
        .route("/batch/start", post(api::start_batch))
        .route("/batch/jobs", get(api::list_jobs))
        .route("/batch/jobs/{job_id}", get(api::get_job))
        .route("/batch/jobs/{job_id}/status", get(api::job_status))
        .route(
            "/batch/jobs/{job_id}/analyses/{resource_id}",
            get(api::get_resource_analysis),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = listen.parse()?;
    info!("listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let active = tracker.active().await;
    if !active.is_empty() {
        warn!(jobs = ?active, "shutting down with runs in flight; they stay RUNNING until reconciled");
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
