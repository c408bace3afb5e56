//! Runnables: task-level execution units nested under a process.

use crate::core::{runnable_table, LifecycleEvent, LifecycleState, Machine, StateHistory};
use crate::error::TraceError;
use tracing::warn;

/// A runnable's own lifecycle.
///
/// Ownership rules (a runnable may not terminate over running children) are
/// enforced by [`EntityArena`](super::EntityArena), which knows the children.
#[derive(Clone, Debug)]
pub struct Runnable {
    machine: Machine<LifecycleState, LifecycleEvent>,
    suspended_by_parent: bool,
}

impl Default for Runnable {
    fn default() -> Self {
        Self::new()
    }
}

impl Runnable {
    pub fn new() -> Self {
        Self {
            machine: Machine::new(runnable_table(), LifecycleState::Unknown),
            suspended_by_parent: false,
        }
    }

    pub fn untracked() -> Self {
        Self {
            machine: Machine::without_history(runnable_table(), LifecycleState::Unknown),
            suspended_by_parent: false,
        }
    }

    pub fn do_state_transition(&mut self, event: LifecycleEvent) -> Result<LifecycleState, TraceError> {
        self.machine.apply(event).map_err(|err| {
            warn!(error = %err, "runnable transition rejected");
            TraceError::from(err)
        })
    }

    pub fn peek(&self, event: LifecycleEvent) -> Result<LifecycleState, TraceError> {
        Ok(self.machine.peek(&event)?)
    }

    pub fn state(&self) -> LifecycleState {
        *self.machine.current_state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Running, or suspended mid-execution.
    pub fn is_in_progress(&self) -> bool {
        matches!(self.state(), LifecycleState::Running | LifecycleState::Active)
    }

    pub fn is_terminated(&self) -> bool {
        self.machine.is_final()
    }

    pub fn was_started(&self) -> bool {
        self.machine.was_started()
    }

    /// Set when the runnable was suspended because its process left the core.
    pub fn suspended_by_parent(&self) -> bool {
        self.suspended_by_parent
    }

    pub fn set_suspended_by_parent(&mut self, suspended: bool) {
        self.suspended_by_parent = suspended;
    }

    pub fn history(&self) -> &StateHistory<LifecycleState, LifecycleEvent> {
        self.machine.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use LifecycleState as S;

    #[test]
    fn suspend_and_resume_round_trip() {
        let mut runnable = Runnable::new();
        runnable.do_state_transition(E::Start).unwrap();
        assert!(runnable.is_running());

        assert_eq!(runnable.do_state_transition(E::Suspend).unwrap(), S::Active);
        assert!(runnable.is_in_progress());
        assert!(!runnable.is_running());

        assert_eq!(runnable.do_state_transition(E::Resume).unwrap(), S::Running);
        assert_eq!(runnable.do_state_transition(E::Terminate).unwrap(), S::Terminated);
        assert!(runnable.is_terminated());
        assert!(runnable.was_started());
    }

    #[test]
    fn process_events_are_rejected() {
        let mut runnable = Runnable::new();
        runnable.do_state_transition(E::Start).unwrap();

        let err = runnable.do_state_transition(E::Wait).unwrap_err();
        assert_eq!(err.code(), "invalid_state_transition");
        assert_eq!(runnable.state(), S::Running);
    }

    #[test]
    fn suspended_runnable_cannot_terminate() {
        let mut runnable = Runnable::new();
        runnable.do_state_transition(E::Start).unwrap();
        runnable.do_state_transition(E::Suspend).unwrap();
        assert!(runnable.do_state_transition(E::Terminate).is_err());
    }
}
