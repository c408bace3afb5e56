//! Errors raised while assembling stimuli.

use thiserror::Error;

/// A [`StimulusBuilder`](super::StimulusBuilder) was missing something.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Stimulus name not specified. Call .name(name) before .build()")]
    MissingName,

    #[error("Stimulus target not specified. Call .target(key)")]
    MissingTarget,

    #[error("No events defined. Add at least one with .event(event)")]
    NoEvents,

    #[error("'{event}' is issued by a core or scheduler. Call .source(name)")]
    MissingSource { event: String },

    #[error("Migration needs a destination core. Call .destination(core)")]
    MissingDestination,

    #[error("Runnable '{runnable}' needs an owner. Call .parent(key)")]
    MissingParent { runnable: String },
}
