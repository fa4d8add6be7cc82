//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use app_operator::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (`Application`, `DomainGroupSpec`, etc.)
//! - The control token and its scheduling directive
//! - Reconciler types (`Reconciler`, `ReconcilerStep`, `Orchestrator`, etc.)
//! - The upsert engine and its update policies
//! - Controller configuration

// CRD types - most commonly used
pub use crate::crd::*;

// Control flow between steps and the scheduler
pub use crate::controller::token::{ControlToken, SchedulingDirective, TokenOutcome};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, Orchestrator, PassContext, PassReport, PassState, Reconciler, ReconcilerError,
    ReconcilerStep,
};

// Writing child objects
pub use crate::controller::upsert::{
    upsert, ObjectApi, Replace, SpecHashMerge, UpdatePolicy, UpsertOutcome,
};

// Pure helpers
pub use crate::controller::app_info::{extract, ApplicationIdentity};
pub use crate::controller::domain::{build as build_domain_groups, DomainGroup, DomainSettings};

// Config types - for configuration management
pub use crate::config::ControllerConfig;

// Common error types
pub use crate::controller::error::{ApiError, ErrorKind};
