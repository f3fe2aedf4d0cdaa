//! Server startup utilities.

use crate::ControlPlane;
use kiln_config::AppConfig;
use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(r#"
    __ __ _ __
   / //_/(_) /___
  / ,<  / / / __ \
 / /| |/ / / / / /
/_/ |_/_/_/_/ /_/

   fabrication control plane
    "#);
}

/// Prints what the process is about to run.
pub fn print_startup_info(config: &AppConfig, plane: &ControlPlane) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Environment:   {}", config.app.environment);
    info!("Devices:       {}", plane.registry().list().join(", "));
    info!(
        "Scheduler:     {} (every {} ms)",
        if config.scheduler.enabled { "enabled" } else { "disabled" },
        config.scheduler.poll_interval_ms
    );
    info!("Poll timeout:  {} ms", config.scheduler.device_poll_timeout_ms);
    info!("{}", separator);
}
