//! Prints the Dashboard CRD as YAML
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/dashboard.yaml
//! ```

use kube::CustomResourceExt;
use sentinel_dashboard_operator::crd::Dashboard;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Dashboard::crd())?);
    Ok(())
}
