//! NodeConfig resolution shared by all drivers.

use crate::error::ControllerError;
use crate::store::ClusterStore;
use crate::workload::intent_key;
use crds::{NodeConfig, NodeConfigSpec, NodeIntent};
use kube::ResourceExt;
use tracing::debug;

/// Name of the per-provider fallback config
pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Resolves the config for an intent. First match wins, nothing is merged:
///
/// 1. the intent's explicit `parametersRef`
/// 2. a config named after the intent for this provider
/// 3. the `default` config for this provider
/// 4. an empty config, leaving every family default in place
pub async fn resolve_node_config(
    store: &dyn ClusterStore,
    config_namespace: Option<&str>,
    provider: &str,
    intent: &NodeIntent,
) -> Result<NodeConfig, ControllerError> {
    let (intent_namespace, intent_name) = intent_key(intent)?;
    let scope = config_namespace.unwrap_or(&intent_namespace);

    if let Some(reference) = &intent.spec.parameters_ref {
        let namespace = reference.namespace.as_deref().unwrap_or(scope);
        debug!("Using referenced NodeConfig {}/{}", namespace, reference.name);
        return store
            .get_node_config(namespace, &reference.name)
            .await?
            .ok_or_else(|| ControllerError::not_found("NodeConfig", namespace, &reference.name));
    }

    let configs = store.list_node_configs(scope).await?;
    let matching = |name: &str| {
        configs
            .iter()
            .find(|c| c.name_any() == name && c.spec.provider == provider)
    };

    if let Some(config) = matching(&intent_name).or_else(|| matching(DEFAULT_CONFIG_NAME)) {
        debug!("Resolved NodeConfig {}/{} for {}", scope, config.name_any(), intent_name);
        return Ok(config.clone());
    }

    debug!("No NodeConfig for {}/{}, using {} defaults", intent_namespace, intent_name, provider);
    let mut fallback = NodeConfig::new("", NodeConfigSpec::for_provider(provider));
    fallback.metadata.namespace = Some(scope.to_string());
    Ok(fallback)
}
