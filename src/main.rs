use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_app::{PhotoApp, config::Config, web::WebServer};

#[derive(Parser)]
#[command(name = "photo-app")]
#[command(version)]
#[command(about = "Image upload service with asynchronous ingestion and cached lookups")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("photo_app={},tower_http=trace", cli.log_level)
    } else {
        format!("photo_app={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting photo-app v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(Some(&cli.config))?;

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    info!("Using database: {}", config.database.url);
    info!("Cache backend: {}", config.cache.backend);

    let app = PhotoApp::build(config.clone()).await?;
    let web_server = WebServer::new(&config, app.router())?;
    info!(
        "Web server listening on http://{}:{}",
        web_server.host(),
        web_server.port()
    );

    let shutdown_token = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown_token.clone()));

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(web_server.serve_with_cancellation(ready_tx, shutdown_token.clone()));

    match ready_rx.await {
        Ok(Ok(())) => info!("photo-app ready"),
        Ok(Err(e)) => {
            error!("Web server failed to start: {}", e);
            app.shutdown().await?;
            return Err(e);
        }
        Err(_) => error!("Web server exited before reporting readiness"),
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Web server error: {}", e),
        Err(e) => error!("Web server task failed: {}", e),
    }

    app.shutdown().await?;
    info!("photo-app stopped");
    Ok(())
}

/// Cancel `token` on SIGINT, or SIGTERM on unix
async fn wait_for_shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received SIGINT (Ctrl+C), shutting down gracefully")
                    }
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received SIGINT (Ctrl+C), shutting down gracefully");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully");
        }
    }

    token.cancel();
}
