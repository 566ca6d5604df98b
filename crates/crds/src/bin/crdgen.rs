//! Prints the node deployer CRDs as a multi-document YAML stream.
//!
//! ```sh
//! cargo run -p crds --bin crdgen > config/crd/node-deployer.yaml
//! ```

use crds::{NodeConfig, NodeIntent};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    for crd in [NodeIntent::crd(), NodeConfig::crd()] {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
