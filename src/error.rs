//! Error taxonomy for lifecycle validation and trace recording.
//!
//! Every fallible operation of the crate reports a [`TraceError`] to its
//! immediate caller. Nothing is retried and nothing is silently corrected.

use crate::core::TransitionError;
use crate::entity::HierarchyViolation;
use crate::registry::IdHash;
use crate::trace::{EntityType, Tick, TimeScale};
use thiserror::Error;

/// Errors raised while validating transitions or emitting trace records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("invalid state transition: event '{event}' is not permitted in state '{state}'")]
    InvalidTransition { state: String, event: String },

    #[error(transparent)]
    HierarchyViolation(#[from] HierarchyViolation),

    #[error("hash collision: '{name}' maps to {hash} which is already taken by '{existing}'")]
    HashCollision {
        name: String,
        existing: String,
        hash: IdHash,
    },

    #[error("unknown identifier {0}")]
    UnknownIdentifier(IdHash),

    #[error("descending timestamp: {time} is earlier than the last record at {last}")]
    OutOfOrderTime { time: Tick, last: Tick },

    #[error("'{name}' is registered as {registered} and cannot be used as {requested}")]
    TypeMismatch {
        name: String,
        registered: EntityType,
        requested: EntityType,
    },

    #[error("event '{event}' cannot be recorded on a {entity_type} record")]
    InvalidEvent {
        event: String,
        entity_type: EntityType,
    },

    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("migration of '{task}' has no destination core")]
    MissingMigrationDestination { task: String },

    #[error("event '{event}' on '{target}' needs a source core or scheduler")]
    MissingSource { target: String, event: String },

    #[error("time value {value} overflows when normalised from {scale}")]
    TimeOverflow { value: u64, scale: TimeScale },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("'{name}' cannot be used as an identifier: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("{time} is not a whole number of {scale}")]
    SubUnitTime { time: Tick, scale: TimeScale },

    #[error("session was terminated by an earlier failure")]
    SessionTerminated,

    #[error("'{issuer}' issues '{event}' only on itself, not on '{target}'")]
    SourceMismatch {
        issuer: String,
        target: String,
        event: String,
    },

    #[error("core '{core}' cannot go idle while '{process}' runs on it")]
    CoreBusy { core: String, process: String },

    #[error("no process is running on core '{core}'")]
    NoTaskRunning { core: String },

    #[error("semaphore event '{event}' cannot report {count:?} accesses")]
    InvalidAccessCount { event: String, count: String },
}

impl TraceError {
    /// Stable snake_case code for callers that cannot match on the enum.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_state_transition",
            Self::HierarchyViolation(violation) => violation.code(),
            Self::HashCollision { .. } => "hash_collision",
            Self::UnknownIdentifier(_) => "unknown_identifier",
            Self::OutOfOrderTime { .. } => "descending_timestamp",
            Self::TypeMismatch { .. } => "invalid_type",
            Self::InvalidEvent { .. } => "invalid_event",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::MissingMigrationDestination { .. } => "missing_migration_destination",
            Self::MissingSource { .. } => "missing_source",
            Self::TimeOverflow { .. } => "time_overflow",
            Self::Parse { .. } => "parse_error",
            Self::InvalidName { .. } => "invalid_name",
            Self::SubUnitTime { .. } => "sub_unit_time",
            Self::SessionTerminated => "session_terminated",
            Self::SourceMismatch { .. } => "source_and_target_not_equal",
            Self::CoreBusy { .. } => "core_idle_task_still_running",
            Self::NoTaskRunning { .. } => "no_task_running",
            Self::InvalidAccessCount { .. } => "amount_of_semaphore_accesses_invalid",
        }
    }
}

impl From<TransitionError> for TraceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { state, event, .. } => {
                Self::InvalidTransition { state, event }
            }
        }
    }
}

/// A text name that does not match any variant of a BTF vocabulary enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}
