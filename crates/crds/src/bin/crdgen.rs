//! Prints the `PodFlame` CustomResourceDefinition as YAML.
//!
//! ```sh
//! cargo run -p crds --bin crdgen > config/crd/podflame.yaml
//! ```

use crds::PodFlame;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&PodFlame::crd())?);
    Ok(())
}
