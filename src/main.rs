//! # Application Operator
//!
//! A Kubernetes operator that turns `Application` resources into running
//! workloads with ingress routing.
//!
//! ## Overview
//!
//! For every `Application` the operator:
//!
//! 1. **Resolves identity** - Reads region, app code, module and environment from annotations
//! 2. **Converges the workload** - Creates or updates the Deployment and its Service
//! 3. **Routes domains** - One Ingress per subdomain, subpath or custom routing group
//! 4. **Reports status** - `Progressing` while rolling out, `Running` once ready
//!
//! Converged applications are revisited periodically to correct drift.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! RUST_LOG=app_operator=debug cargo run --bin app-operator
//! ```

use anyhow::Result;
use app_operator::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init).await
}
