//! Application Operator Library
//!
//! Reconciles `Application` custom resources into a Deployment, a Service and
//! one Ingress per routing group. Tests live next to the code they cover, plus
//! integration tests under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use app_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
