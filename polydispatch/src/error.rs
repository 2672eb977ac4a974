//! Dispatch errors.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::shape::CallShapeError;
use crate::signature::Signature;

/// A signature named in an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub label: String,
    pub priority: i32,
}

impl Candidate {
    pub fn of(signature: &Signature) -> Self {
        Self {
            label: signature.label().to_string(),
            priority: signature.priority(),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` (priority {})", self.label, self.priority)
    }
}

fn list(candidates: &[Candidate]) -> String {
    if candidates.is_empty() {
        return "none".to_string();
    }
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from resolving or running an operation.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Nothing matched the argument types, or every guard rejected the values.
    #[error(
        "no method of `{operation}` matches ({arg_types}); reachable by type: {}",
        list(.candidates)
    )]
    NoMatch {
        operation: String,
        arg_types: String,
        candidates: Vec<Candidate>,
    },

    #[error(
        "ambiguous call to `{operation}` ({arg_types}); equally specific: {}",
        list(.candidates)
    )]
    StaticAmbiguity {
        operation: String,
        arg_types: String,
        candidates: Vec<Candidate>,
    },

    #[error("ambiguous guards in `{operation}` ({arg_types}); all accepted: {}", list(.candidates))]
    RuntimeAmbiguity {
        operation: String,
        arg_types: String,
        candidates: Vec<Candidate>,
    },

    #[error("no method of `{operation}` ({arg_types}) after `{after}`")]
    ExhaustedChain {
        operation: String,
        arg_types: String,
        after: String,
    },

    #[error("bad call to `{operation}`: {source}")]
    MalformedCallShape {
        operation: String,
        #[source]
        source: CallShapeError,
    },

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("`{operation}` exceeded the redirect depth limit of {limit}")]
    RecursionLimit { operation: String, limit: usize },

    #[error("cannot add `{mixin}` to `{operation}`: it would become its own mixin")]
    CompositionCycle { operation: String, mixin: String },

    /// An error returned by an implementation body.
    #[error("{0}")]
    Raised(String),
}

impl DispatchError {
    /// Build an error from inside an implementation body.
    pub fn raised(message: impl Into<String>) -> Self {
        DispatchError::Raised(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NoMatch { .. } => ErrorKind::NoMatch,
            DispatchError::StaticAmbiguity { .. } => ErrorKind::StaticAmbiguity,
            DispatchError::RuntimeAmbiguity { .. } => ErrorKind::RuntimeAmbiguity,
            DispatchError::ExhaustedChain { .. } => ErrorKind::ExhaustedChain,
            DispatchError::MalformedCallShape { .. } => ErrorKind::MalformedCallShape,
            DispatchError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            DispatchError::RecursionLimit { .. } => ErrorKind::RecursionLimit,
            DispatchError::CompositionCycle { .. } => ErrorKind::CompositionCycle,
            DispatchError::Raised(_) => ErrorKind::Raised,
        }
    }

    /// Signatures named by the error, if any.
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            DispatchError::NoMatch { candidates, .. }
            | DispatchError::StaticAmbiguity { candidates, .. }
            | DispatchError::RuntimeAmbiguity { candidates, .. } => candidates,
            _ => &[],
        }
    }
}

/// Discriminant of [`DispatchError`], for traces and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoMatch,
    StaticAmbiguity,
    RuntimeAmbiguity,
    ExhaustedChain,
    MalformedCallShape,
    UnknownOperation,
    RecursionLimit,
    CompositionCycle,
    Raised,
}
