//! Structured error types for slowmo
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The taxonomies stay separate all the way up to the user: a request that
//! never reached the service, a program that did not compile, and a run whose
//! scheduler state could not be reconstructed are reported differently.

use super::types::{ContextId, MachineId, UnitId, UnitLocation};
use thiserror::Error;

/// An incoming event lacks a field required for reconstruction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{event}: missing required field `{field}`")]
    MissingField { event: &'static str, field: String },

    #[error("{event}: invalid field `{field}`: {reason}")]
    InvalidField { event: &'static str, field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn missing(event: &'static str, field: impl Into<String>) -> Self {
        ValidationError::MissingField { event, field: field.into() }
    }

    pub(crate) fn invalid(
        event: &'static str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ValidationError::InvalidField { event, field: field.into(), reason: reason.into() }
    }
}

/// A well-formed event cannot be applied without breaking the model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("context {0} is not owned by any thread")]
    UnknownContext(ContextId),

    #[error("thread {0} is not known")]
    UnknownMachine(MachineId),

    #[error("unit {0} is not parked")]
    UnitNotParked(UnitId),

    #[error("context {0} is bound to more than one thread")]
    DuplicateContext(ContextId),

    #[error("machine {0} appears in more than one thread entry")]
    DuplicateMachine(MachineId),

    #[error("unit {unit} appears twice: {first} and {second}")]
    DuplicateUnit { unit: UnitId, first: UnitLocation, second: UnitLocation },

    #[error("thread entry #{index} has neither a machine nor a context")]
    DeadPlaceholder { index: usize },

    #[error("initial population was already seeded for this run")]
    AlreadySeeded,
}

/// Failure to apply an event to the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("engine state is corrupted by an earlier failure; reset before applying events")]
    Corrupted,
}

/// Failure of the stream that delivers server messages
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open event source {path}: {source}")]
    Open { path: String, source: std::io::Error },

    #[error("failed to decode message on line {line}: {source}")]
    Decode { line: usize, source: serde_json::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a run ended without a clean program exit
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("request failed: {0}")]
    Request(#[from] TransportError),

    #[error("compilation failed: {0}")]
    Compilation(String),

    #[error("visualization aborted: {0}")]
    Reconstruction(#[from] EngineError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("run aborted")]
    Aborted,
}
