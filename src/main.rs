use anyhow::{Context, Result};
use clap::Parser;
use m2mscl::{SclConfig, SclNode, SclRole, build_router};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "m2mscl")]
#[command(about = "M2M Service Capability Layer server")]
struct Cli {
    /// Overrides SCL_ID
    #[arg(long)]
    id: Option<String>,
    /// nscl or gscl; overrides SCL_ROLE
    #[arg(long)]
    role: Option<SclRole>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Public base address announced to peers; overrides SCL_POC
    #[arg(long)]
    poc: Option<String>,
    /// Tree snapshot restored at boot and written at shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut config: SclConfig) -> SclConfig {
        if let Some(id) = self.id {
            config.scl_id = id;
        }
        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(poc) = self.poc {
            config.poc = Some(poc);
        }
        if let Some(snapshot) = self.snapshot {
            config.snapshot_path = Some(snapshot);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.apply(SclConfig::from_env().context("failed to load SCL configuration")?);
    config.validate().context("invalid SCL configuration")?;

    let node = SclNode::builder(config)
        .build()
        .await
        .context("failed to start SCL")?;
    let registration = node
        .start_registration()
        .context("failed to start registration")?;

    let app = build_router(node.router().clone());

    let addr = node.config().address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        address = %addr,
        scl = %node.config().scl_id,
        role = ?node.config().role,
        "scl started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(registration) = registration {
        if let Err(err) = registration.stop().await {
            warn!(error = %err, "registration task did not stop cleanly");
        }
    }
    if let Some(count) = node.checkpoint().await.context("failed to write snapshot")? {
        info!(resources = count, "snapshot written at shutdown");
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("m2mscl=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
