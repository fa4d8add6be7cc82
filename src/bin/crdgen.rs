//! # CRD Generator
//!
//! Prints the `Application` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/application.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use app_operator::crd::Application;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = serde_yaml::to_string(&Application::crd())?;
    print!("{crd}");
    Ok(())
}
