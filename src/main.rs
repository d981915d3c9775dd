use clap::Parser;
use prometheus::Registry;
use rgw_usage_exporter::{
    config::{Config, LogFormat},
    create_app,
    handlers::AppState,
    services::{AdminApi, Poller, PollerSettings, RgwAdminClient, SnapshotStore, UsageExporter},
};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Prometheus exporter for Ceph RGW usage, bucket and user statistics.
#[derive(Parser, Debug)]
#[command(name = "rgw-usage-exporter", version, about)]
struct Args {
    /// YAML configuration file; overrides environment variables.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    init_logging(&config);
    config.validate()?;

    info!("Starting rgw-usage-exporter v{}", env!("CARGO_PKG_VERSION"));

    if !config.start_delay().is_zero() {
        info!("Start delay {} seconds...", config.start_delay);
        tokio::select! {
            _ = tokio::time::sleep(config.start_delay()) => {}
            _ = shutdown_signal() => {
                info!("Shutdown signal received during start delay");
                return Ok(());
            }
        }
    }

    let client: Arc<dyn AdminApi> = Arc::new(RgwAdminClient::new(&config)?);
    let store = Arc::new(SnapshotStore::new());

    let registry = Registry::new();
    registry.register(Box::new(UsageExporter::new(Arc::clone(&store), &config)?))?;

    let poller = Poller::start(client, Arc::clone(&store), PollerSettings::from(&config));

    let app = create_app(AppState {
        store,
        registry: Arc::new(registry),
    });

    let listen_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Serving metrics on http://{}/metrics", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for collectors...");
    poller.shutdown().await;

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => fmt().json().with_env_filter(filter).with_target(true).init(),
        LogFormat::Pretty => fmt().pretty().with_env_filter(filter).with_target(true).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
