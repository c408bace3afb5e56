//! Session-level outcome of applying stimuli.

use crate::error::TraceError;
use crate::stimulus::EntityKey;
use thiserror::Error;

/// A stimulus that was rejected as a whole, with every reason found.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("stimulus #{index} '{stimulus}' on {target} rejected: {}", join(.violations))]
pub struct StimulusFailure {
    /// Position of the stimulus in the session, from zero.
    pub index: usize,
    pub stimulus: String,
    pub target: EntityKey,
    pub violations: Vec<TraceError>,
}

impl StimulusFailure {
    /// Stable codes of all violations, in the order they were found.
    pub fn codes(&self) -> Vec<&'static str> {
        self.violations.iter().map(TraceError::code).collect()
    }
}

fn join(violations: &[TraceError]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Totals of one [`Simulation::run`](super::Simulation::run).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub applied: usize,
    pub rejected: usize,
    /// Trace records appended by the applied stimuli.
    pub records: usize,
    pub failures: Vec<StimulusFailure>,
}

impl SessionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_lists_every_violation() {
        let failure = StimulusFailure {
            index: 3,
            stimulus: "tick".to_string(),
            target: EntityKey::task("taskA", 0),
            violations: vec![
                TraceError::UnknownEntity("r9".to_string()),
                TraceError::MissingMigrationDestination {
                    task: "taskA".to_string(),
                },
            ],
        };

        let message = failure.to_string();
        assert!(message.starts_with("stimulus #3 'tick' on task taskA[0] rejected"));
        assert!(message.contains("r9"));
        assert!(message.contains("; "));
        assert_eq!(
            failure.codes(),
            vec!["unknown_entity", "missing_migration_destination"]
        );
    }
}
