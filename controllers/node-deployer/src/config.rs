//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::time::Duration;

/// Runtime settings for the node deployer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch intents in; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Namespace NodeConfigs are looked up in; the intent namespace when unset
    pub config_namespace: Option<String>,
    /// Apply NetworkAttachmentDefinitions and annotate pods with them
    pub enable_network_attachments: bool,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    /// Per-operation device session timeout
    pub session_timeout: Duration,
    /// SSH port on the devices
    pub ssh_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            config_namespace: None,
            enable_network_attachments: true,
            concurrency: 4,
            session_timeout: Duration::from_secs(5),
            ssh_port: 22,
        }
    }
}

impl ControllerConfig {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let enable_network_attachments = match non_empty("ENABLE_NAD") {
            Some(v) => parse_bool("ENABLE_NAD", &v)?,
            None => defaults.enable_network_attachments,
        };
        let concurrency = match non_empty("NODE_DEPLOYER_CONCURRENCY") {
            Some(v) => parse_number("NODE_DEPLOYER_CONCURRENCY", &v)?,
            None => defaults.concurrency,
        };
        let session_timeout = match non_empty("DEVICE_SESSION_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("DEVICE_SESSION_TIMEOUT_SECS", &v)?),
            None => defaults.session_timeout,
        };
        let ssh_port = match non_empty("DEVICE_SSH_PORT") {
            Some(v) => parse_number("DEVICE_SSH_PORT", &v)?,
            None => defaults.ssh_port,
        };

        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "NODE_DEPLOYER_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            config_namespace: non_empty("NODE_CONFIG_NAMESPACE"),
            enable_network_attachments,
            concurrency,
            session_timeout,
            ssh_port,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ControllerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ControllerError::InvalidConfig(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ControllerError> {
    value.trim().parse().map_err(|_parse_error| {
        ControllerError::InvalidConfig(format!("{key} must be a number, got {value:?}"))
    })
}
