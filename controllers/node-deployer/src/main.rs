//! Node Deployer Controller
//!
//! Deploys network nodes described by `NodeIntent` resources:
//! - resolves the provider driver and the applicable `NodeConfig`
//! - wires the node's interfaces with CNI network attachments
//! - keeps the node pod in line with the desired spec (hash-based drift)
//! - bootstraps the device management plane once the pod is reachable
//!
//! Progress and failures are reported through the intent's `Ready` condition.

mod backoff;
mod bootstrap;
mod config;
mod controller;
mod drivers;
mod error;
mod nad;
mod reconciler;
mod store;
mod watcher;
mod workload;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting Node Deployer Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Watch namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!(
        "  NodeConfig namespace: {}",
        config.config_namespace.as_deref().unwrap_or("intent namespace")
    );
    info!("  Network attachments: {}", config.enable_network_attachments);
    info!("  Concurrency: {}", config.concurrency);
    info!("  Device session timeout: {:?}", config.session_timeout);
    info!("  Device SSH port: {}", config.ssh_port);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
