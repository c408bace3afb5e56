//! Process-level entities: tasks, ISRs and threads.

use crate::core::{process_table, LifecycleEvent, LifecycleState, Machine, StateHistory};
use crate::error::TraceError;
use tracing::warn;

/// One OS-process-level schedulable entity.
///
/// ```rust
/// use btf_trace::core::{LifecycleEvent, LifecycleState};
/// use btf_trace::entity::Process;
///
/// let mut process = Process::new();
/// process.do_state_transition(LifecycleEvent::Activate).unwrap();
/// assert_eq!(process.state(), LifecycleState::Ready);
/// assert!(process.do_state_transition(LifecycleEvent::Wait).is_err());
/// assert_eq!(process.state(), LifecycleState::Ready);
/// ```
#[derive(Clone, Debug)]
pub struct Process {
    machine: Machine<LifecycleState, LifecycleEvent>,
    wait_os_event: bool,
}

impl Default for Process {
    fn default() -> Self {
        Self::new()
    }
}

impl Process {
    pub fn new() -> Self {
        Self {
            machine: Machine::new(process_table(), LifecycleState::Unknown),
            wait_os_event: false,
        }
    }

    /// A process that keeps no transition history.
    pub fn untracked() -> Self {
        Self {
            machine: Machine::without_history(process_table(), LifecycleState::Unknown),
            wait_os_event: false,
        }
    }

    /// Apply `event`; on rejection the state is unchanged.
    pub fn do_state_transition(&mut self, event: LifecycleEvent) -> Result<LifecycleState, TraceError> {
        self.machine.apply(event).map_err(|err| {
            warn!(error = %err, "process transition rejected");
            TraceError::from(err)
        })
    }

    /// The state `event` would lead to.
    pub fn peek(&self, event: LifecycleEvent) -> Result<LifecycleState, TraceError> {
        Ok(self.machine.peek(&event)?)
    }

    pub fn state(&self) -> LifecycleState {
        *self.machine.current_state()
    }

    pub fn is_terminated(&self) -> bool {
        self.machine.is_final()
    }

    /// True once the process has left `unknown`. Never resets.
    pub fn was_started(&self) -> bool {
        self.machine.was_started()
    }

    /// Whether the current wait is pending an external OS release.
    ///
    /// Advisory only: the flag never influences which transitions are legal.
    pub fn wait_os_event(&self) -> bool {
        self.wait_os_event
    }

    pub fn set_wait_os_event(&mut self, waiting: bool) {
        self.wait_os_event = waiting;
    }

    pub fn history(&self) -> &StateHistory<LifecycleState, LifecycleEvent> {
        self.machine.history()
    }
}
