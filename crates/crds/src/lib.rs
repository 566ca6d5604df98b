//! DCops CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the node deployer.

pub mod condition;
pub mod network_attachment;
pub mod node_config;
pub mod node_intent;
pub mod references;

pub use condition::*;
pub use network_attachment::*;
pub use node_config::*;
pub use node_intent::*;
pub use references::*;
