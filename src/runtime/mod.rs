//! # Runtime
//!
//! Process-level wiring around the reconciler.
//!
//! - `initialization`: tracing, metrics, HTTP server, Kubernetes client and reconciler setup
//! - `watch_loop`: kube-runtime controller over `Application` and its child objects
//! - `error_policy`: requeue decisions for failed passes

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
