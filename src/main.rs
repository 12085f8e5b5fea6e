use scriptgate::config::{Config, PKG_NAME, VERSION};
use scriptgate::proxy::{AppState, ProxyServer};
use scriptgate::tls;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scriptgate=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("scriptgate.toml"));

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;

    info!(path = %config_path.display(), "Configuration loaded");

    let state = Arc::new(AppState::from_config(&config)?);

    print_startup_banner(&config, &state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_port = config.server.http_port();
    let https_port = config.server.https_port();

    let http_handle = if http_port > 0 {
        let addr = bind_addr(&config.server.bind, http_port)?;
        let server = ProxyServer::new(addr, Arc::clone(&state), shutdown_rx.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!(error = %e, "HTTP proxy server error");
            }
        }))
    } else {
        None
    };

    let https_handle = match (&config.server.tls_cert, &config.server.tls_key) {
        (Some(cert), Some(key)) if https_port > 0 => {
            let acceptor = tls::acceptor_from_files(cert, key)?;
            info!(cert = %cert, key = %key, "TLS enabled with provided certificates");

            let addr = bind_addr(&config.server.bind, https_port)?;
            let server = ProxyServer::new(addr, Arc::clone(&state), shutdown_rx.clone())
                .with_tls(acceptor);
            Some(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!(error = %e, "HTTPS proxy server error");
                }
            }))
        }
        _ => None,
    };

    wait_for_shutdown_signal().await;

    let _ = shutdown_tx.send(true);

    // Listeners return once their connections drain; give up after 5s
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if let Some(handle) = http_handle {
            let _ = handle.await;
        }
        if let Some(handle) = https_handle {
            let _ = handle.await;
        }
    })
    .await;

    let stats = state.upstream().stats();
    info!(
        upstream_requests = stats.get_total_requests(),
        upstream_unreachable = stats.get_unreachable(),
        upstream_bad_status = stats.get_bad_status(),
        "Shutdown complete"
    );
    Ok(())
}

fn bind_addr(bind: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{}:{}", bind, port).parse().map_err(|e| {
        error!(bind = %bind, port, error = %e, "Invalid bind address");
        anyhow::anyhow!("Invalid bind address {}:{}: {}", bind, port, e)
    })
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }
}

fn print_startup_banner(config: &Config, state: &AppState) {
    info!(name = PKG_NAME, version = VERSION, "Starting script proxy");
    let http_port = config.server.http_port();
    let https_port = config.server.https_port();
    info!(
        bind = %config.server.bind,
        http_port = if http_port > 0 { Some(http_port) } else { None },
        https_port = if https_port > 0 { Some(https_port) } else { None },
        tls = config.server.tls_enabled(),
        public_host = %config.server.public_host,
        "Server configuration"
    );
    let upstream = state.upstream().config();
    info!(
        user_agent = %upstream.user_agent,
        connect_timeout_secs = upstream.connect_timeout.as_secs(),
        response_timeout_secs = upstream.response_timeout.as_secs(),
        pool_max_idle = upstream.max_idle_per_host,
        pool_idle_timeout_secs = upstream.idle_timeout.as_secs(),
        "Upstream settings"
    );
    info!(
        route_count = state.routes().len(),
        routes = ?state.routes().paths().collect::<Vec<_>>(),
        "Configured routes"
    );
}
