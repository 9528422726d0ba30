//! canopyd entry point.

use std::sync::Arc;

use anyhow::Context;
use canopy_daemon::config::SIMULATED_BACKEND;
use canopy_daemon::{create_router, AppState, DaemonConfig, DaemonError};
use canopy_engine::{ProvisioningEngine, SimulatedEngine};
use canopy_lifecycle::LifecycleOrchestrator;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "canopyd",
    version,
    about = "Canopy deployment control plane daemon"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "CANOPY_CONFIG")]
    config: Option<String>,

    /// Bind address, e.g. 127.0.0.1:7878
    #[arg(short, long, env = "CANOPY_BIND")]
    bind: Option<String>,

    /// Project namespace deployments live in
    #[arg(short, long, env = "CANOPY_PROJECT")]
    project: Option<String>,

    /// Default cloud provider
    #[arg(long, env = "CANOPY_PROVIDER")]
    provider: Option<String>,

    /// Default region
    #[arg(short, long, env = "CANOPY_REGION")]
    region: Option<String>,

    /// Engine backend, "simulated" being the only one available
    #[arg(short, long, env = "CANOPY_ENGINE")]
    engine: Option<String>,
}

impl Cli {
    fn apply_to(self, config: &mut DaemonConfig) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(project) = self.project {
            config.project = project;
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
    }
}

fn build_engine(config: &DaemonConfig) -> Result<Arc<dyn ProvisioningEngine>, DaemonError> {
    match config.engine.as_str() {
        SIMULATED_BACKEND => Ok(Arc::new(SimulatedEngine::new())),
        other => Err(DaemonError::UnknownBackend(other.to_string())),
    }
}

async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
        _ = shutdown_rx.changed() => info!("shutdown requested, draining connections"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply_to(&mut config);

    let addr = config.socket_addr()?;
    let project = config.namespace()?;
    let provider = config.provider_config();
    let engine = build_engine(&config)?;
    info!(
        engine = engine.backend_name(),
        project = %project,
        provider = %provider,
        "starting canopyd"
    );

    let orchestrator = Arc::new(LifecycleOrchestrator::new(engine, project, provider));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(orchestrator, shutdown_tx);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(bind = %addr, "canopyd listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await
        .context("serving REST API")?;

    info!("canopyd stopped");
    Ok(())
}
