//! Status conditions shared by the node lifecycle CRDs.
//!
//! A `NodeIntent` tracks exactly one `Ready` condition. Every reconcile pass
//! overwrites it through [`NodeIntentStatus::set_condition`].

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type tracked on a `NodeIntent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionType {
    /// Overall readiness of the node
    #[default]
    Ready,
}

/// Kubernetes-style tri-state condition status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Not yet determined
    #[default]
    Unknown,
}

/// Machine-readable reason attached to a condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionReason {
    /// Node is bootstrapped and serving
    Ready,
    /// A reconcile step failed; see message
    Failed,
    /// Waiting on the workload
    #[default]
    Unknown,
}

/// A single status condition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Condition status
    pub status: ConditionStatus,

    /// Reason for the current status
    pub reason: ConditionReason,

    /// Human-readable detail
    #[serde(default)]
    pub message: String,

    /// Last time `status` changed
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Ready/True/Ready.
    #[must_use]
    pub fn ready() -> Self {
        Self::new(ConditionStatus::True, ConditionReason::Ready, String::new())
    }

    /// Ready/False/Failed carrying the failure message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ConditionStatus::False, ConditionReason::Failed, message.into())
    }

    /// Ready/False/Unknown, used while waiting on the workload.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ConditionStatus::False, ConditionReason::Unknown, message.into())
    }

    fn new(status: ConditionStatus, reason: ConditionReason, message: String) -> Self {
        Self {
            type_: ConditionType::Ready,
            status,
            reason,
            message,
            last_transition_time: Utc::now(),
        }
    }

    /// True when everything except the transition time matches.
    #[must_use]
    pub fn same_state(&self, other: &Self) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}
