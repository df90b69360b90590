use std::{future::IntoFuture, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use scim_gateway::{
    AppState,
    adapter::InMemoryAdapter,
    build_app,
    config::{ConfigError, GatewayConfig},
    observability,
};
use tokio_util::task::TaskTracker;

/// CLI arguments for the SCIM gateway
#[derive(Parser, Debug)]
#[command(version, about = "SCIM provisioning gateway", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "scimgateway.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the gateway server (default)
    Serve,
    /// Load and validate the configuration, then exit
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Check => {
            println!(
                "Configuration OK: {} (adapter \"{}\", listening on {})",
                args.config,
                config.adapter.name,
                config.server.bind_addr()
            );
            ExitCode::SUCCESS
        }
        Command::Serve => {
            if let Err(e) = observability::init_tracing(&config.observability) {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
            match run_server(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "Gateway stopped with an error");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn load_config(path: &str) -> Result<GatewayConfig, ConfigError> {
    GatewayConfig::from_file(path)
}

async fn run_server(config: GatewayConfig) -> std::io::Result<()> {
    let adapter = Arc::new(InMemoryAdapter::new(
        config.adapter.name.clone(),
        config.adapter.attributes.clone(),
    ));
    for group in &config.adapter.groups {
        if !adapter.add_group(group) {
            tracing::warn!(group = %group, "Duplicate group in adapter.groups ignored");
        }
    }

    let state = AppState::new(config.clone(), adapter);
    let task_tracker = state.task_tracker.clone();
    let app = build_app(&config, state);

    let bind_addr = config.server.bind_addr();
    let grace = config.server.shutdown_grace();

    #[cfg(feature = "tls")]
    if let Some(tls) = &config.server.tls {
        let rustls_config = load_rustls_config(tls).await?;
        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown_signal().await;
                handle.graceful_shutdown(Some(grace));
            }
        });

        tracing::info!(
            adapter = %config.adapter.name,
            "Server listening on https://{}",
            bind_addr
        );
        axum_server::bind_rustls(bind_addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;

        drain(task_tracker, grace).await;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(
        adapter = %config.adapter.name,
        "Server listening on http://{}",
        bind_addr
    );

    // Stop waiting for in-flight requests once the grace period has elapsed
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::pin!(server);
    tokio::select! {
        result = &mut server => result?,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!("Grace period elapsed with requests still in flight");
        }
    }

    drain(task_tracker, grace).await;
    Ok(())
}

/// Read the certificate, optional CA chain and key from disk.
#[cfg(feature = "tls")]
async fn load_rustls_config(
    tls: &scim_gateway::config::TlsConfig,
) -> std::io::Result<axum_server::tls_rustls::RustlsConfig> {
    let mut cert = tokio::fs::read(&tls.cert_path).await?;
    if let Some(ca_path) = &tls.ca_path {
        if !cert.ends_with(b"\n") {
            cert.push(b'\n');
        }
        cert.extend(tokio::fs::read(ca_path).await?);
    }
    let key = tokio::fs::read(&tls.key_path).await?;
    axum_server::tls_rustls::RustlsConfig::from_pem(cert, key).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, no longer accepting connections");
}

/// Wait for adapter calls that outlived their requests.
async fn drain(task_tracker: TaskTracker, grace: Duration) {
    task_tracker.close();

    match tokio::time::timeout(grace, task_tracker.wait()).await {
        Ok(()) => tracing::info!("All adapter calls completed"),
        Err(_) => {
            tracing::warn!("Timeout waiting for adapter calls, some may not have completed")
        }
    }

    tracing::info!("Shutdown complete");
}
