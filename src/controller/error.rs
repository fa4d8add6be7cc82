//! # Errors
//!
//! Tagged error taxonomy shared by every reconciler step.
//!
//! Callers branch on [`ReconcilerError::kind`] rather than on message text:
//!
//! | Kind         | Origin                                   | Handling                      |
//! |--------------|------------------------------------------|-------------------------------|
//! | `NotFound`   | object absent in the cluster             | drives create-instead-of-update |
//! | `Conflict`   | stale `resourceVersion` on write         | full-pass retry, immediately  |
//! | `Parse`      | missing identity annotation              | bounded retry                 |
//! | `Validation` | invalid domain specification             | bounded retry                 |
//! | `Transport`  | any other cluster API failure            | Fibonacci backoff             |
//! | `Cancelled`  | pass aborted by shutdown                 | default error requeue         |
//! | `Internal`   | step ordering bug                        | Fibonacci backoff             |

use crate::controller::app_info::ParseError;
use crate::controller::domain::DomainError;
use std::fmt;
use thiserror::Error;

/// Failure reported by a cluster API capability call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("object not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<kube::Error> for ApiError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(api_err) if api_err.code == 404 => ApiError::NotFound,
            kube::Error::Api(api_err) if api_err.code == 409 => {
                ApiError::Conflict(api_err.message.clone())
            }
            other => ApiError::Other(Box::new(other)),
        }
    }
}

/// Cluster API verb, recorded on wrapped errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Create,
    Update,
    List,
    Delete,
    PatchStatus,
}

impl Verb {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::List => "list",
            Verb::Delete => "delete",
            Verb::PatchStatus => "patch-status",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind, namespace and name of the object an operation targeted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("{object} not found")]
    NotFound { object: ObjectRef },

    #[error("conflict during {verb} of {object}: {message}")]
    Conflict {
        object: ObjectRef,
        verb: Verb,
        message: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("{verb} of {object} failed: {source}")]
    Transport {
        object: ObjectRef,
        verb: Verb,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("reconcile pass cancelled")]
    Cancelled,

    #[error("step '{step}' requires {requirement} from an earlier step")]
    MissingPrerequisite {
        step: &'static str,
        requirement: &'static str,
    },
}

/// Classification of a [`ReconcilerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Parse,
    Validation,
    Transport,
    Cancelled,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Parse => "parse",
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl ReconcilerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcilerError::NotFound { .. } => ErrorKind::NotFound,
            ReconcilerError::Conflict { .. } => ErrorKind::Conflict,
            ReconcilerError::Parse(_) => ErrorKind::Parse,
            ReconcilerError::Validation(_) => ErrorKind::Validation,
            ReconcilerError::Transport { .. } => ErrorKind::Transport,
            ReconcilerError::Cancelled => ErrorKind::Cancelled,
            ReconcilerError::MissingPrerequisite { .. } => ErrorKind::Internal,
        }
    }

    /// Wrap a capability failure with the operation that produced it
    #[must_use]
    pub fn from_api(error: ApiError, object: ObjectRef, verb: Verb) -> Self {
        match error {
            ApiError::NotFound => ReconcilerError::NotFound { object },
            ApiError::Conflict(message) => ReconcilerError::Conflict {
                object,
                verb,
                message,
            },
            ApiError::Other(source) => ReconcilerError::Transport {
                object,
                verb,
                source,
            },
        }
    }
}
