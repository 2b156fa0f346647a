//! Prints the CustomResourceDefinition manifests as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > deploy/crds.yaml`

use crds::{Grafana, GrafanaDashboard};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let documents = [
        serde_yaml::to_string(&Grafana::crd())?,
        serde_yaml::to_string(&GrafanaDashboard::crd())?,
    ];
    for document in documents {
        println!("---");
        print!("{document}");
    }
    Ok(())
}
