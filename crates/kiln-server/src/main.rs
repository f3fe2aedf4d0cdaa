//! # Kiln Server
//!
//! Loads configuration, registers the configured devices and runs the
//! scheduler until Ctrl+C or SIGTERM.

use kiln_config::{AppConfig, ConfigLoader};
use kiln_core::logging::init_logging;
use kiln_core::KilnResult;
use kiln_server::startup::{print_banner, print_startup_info};
use kiln_server::ControlPlane;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.observability.logging()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    print_banner();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn load_config() -> KilnResult<AppConfig> {
    let loader = ConfigLoader::from_default_location()?;
    Ok(loader.get().await)
}

async fn run(config: AppConfig) -> KilnResult<()> {
    if config.observability.metrics_enabled {
        kiln_jobs::register_metrics();
    }

    let plane = ControlPlane::from_config(&config)?;
    print_startup_info(&config, &plane);

    if config.scheduler.enabled {
        plane.start()?;
    } else {
        warn!("Scheduler disabled; jobs will stay queued");
    }

    shutdown_signal().await;
    plane.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
