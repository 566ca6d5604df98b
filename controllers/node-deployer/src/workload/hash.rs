//! Revision hashing for drift detection.
//!
//! Pods are immutable once created, so the engine compares a content hash of
//! the desired spec against the one stamped on the running pod.

use k8s_openapi::api::core::v1::{Pod, PodSpec};
use sha2::{Digest, Sha256};

/// Annotation carrying the revision hash of the pod spec
pub const REVISION_HASH_ANNOTATION: &str = "dcops.microscaler.io/revision-hash";

/// SHA-256 over the JSON serialization of the spec, lower-case hex.
pub fn revision_hash(spec: &PodSpec) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(spec)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Hashes the pod spec and records the result as an annotation.
pub fn stamp_revision(pod: &mut Pod) -> Result<String, serde_json::Error> {
    let hash = revision_hash(&pod.spec.clone().unwrap_or_default())?;
    pod.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(REVISION_HASH_ANNOTATION.to_string(), hash.clone());
    Ok(hash)
}

/// Revision hash recorded on a pod, if any.
#[must_use]
pub fn revision_of(pod: &Pod) -> Option<&str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(REVISION_HASH_ANNOTATION))
        .map(String::as_str)
}
