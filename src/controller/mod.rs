//! # Controller
//!
//! Core controller modules for the application operator.
//!
//! - `token`: control token returned by every reconciler step
//! - `error`: tagged error taxonomy
//! - `app_info`: application identity extraction
//! - `domain`: domain group derivation
//! - `upsert`: generic get-or-create-or-update primitive
//! - `resources`: desired Deployment, Service and Ingress objects
//! - `reconciler`: steps, orchestrator and reconcile entry point
//! - `backoff`: Fibonacci backoff mechanism for retries

pub mod app_info;
pub mod backoff;
pub mod domain;
pub mod error;
pub mod reconciler;
pub mod resources;
pub mod token;
pub mod upsert;

#[cfg(test)]
pub(crate) mod testing;
