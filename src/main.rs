use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::config::{
    DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT, DEFAULT_STORAGE_ROOT,
};
use api_rest::ServerConfig;
use imgstore_files::{FolderStore, LocalFs};

/// Folder-scoped image store served over HTTP
#[derive(Parser, Debug)]
#[command(name = "imgstore", version, about)]
struct Args {
    /// Storage root directory; created if missing
    #[arg(long, env = "IMGSTORE_ROOT", default_value = DEFAULT_STORAGE_ROOT)]
    root: PathBuf,

    /// Address to bind
    #[arg(long, env = "IMGSTORE_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind
    #[arg(long, env = "IMGSTORE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "IMGSTORE_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

/// Main entry point for the image store
///
/// Loads `.env`, resolves configuration from flags and environment, opens the storage root
/// (creating it if absent) and serves the REST API until Ctrl-C or SIGTERM.
///
/// # Environment Variables
/// - `IMGSTORE_ROOT`: Storage root directory (default: "images")
/// - `IMGSTORE_HOST`: Bind host (default: "127.0.0.1")
/// - `IMGSTORE_PORT`: Bind port (default: 4040)
/// - `IMGSTORE_MAX_UPLOAD_BYTES`: Request body limit (default: 50 MiB)
/// - `RUST_LOG`: Log filter
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the storage root cannot be created,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("imgstore=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("imgstore_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let cfg = ServerConfig::new(args.root, args.host, args.port, args.max_upload_bytes)?;

    let store = FolderStore::open(Arc::new(LocalFs), cfg.storage_root()).await?;
    let app = api_rest::router(store, cfg.max_upload_bytes());

    let listener = tokio::net::TcpListener::bind(cfg.bind_target()).await?;
    tracing::info!(
        "++ Starting image store on {} (root: {})",
        listener.local_addr()?,
        cfg.storage_root().display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Image store stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {}", e);
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
                tracing::warn!("failed to listen for SIGTERM: {}", e);
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
