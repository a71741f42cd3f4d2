//! # CRD Generator
//!
//! Prints the `Database` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run -p crds --bin crdgen > config/crd/libsql.ahti.io_databases.yaml
//! cargo run -p crds --bin crdgen | kubectl apply -f -
//! ```

use crds::Database;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = Database::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
