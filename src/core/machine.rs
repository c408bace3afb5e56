//! A transition table bound to one entity's current state.

use super::history::{StateHistory, StateTransition};
use super::state::{Event, State};
use super::table::{TransitionError, TransitionTable};

/// One running instance of the transition engine.
///
/// The table is shared and immutable; the machine owns only its current
/// state, the started flag and the history. A rejected event leaves all
/// three untouched.
///
/// A recording machine keeps one history record per accepted event for its
/// whole lifetime, so the history grows without bound. Machines built with
/// [`Machine::without_history`] track state only.
#[derive(Clone, Debug)]
pub struct Machine<S: State + 'static, E: Event + 'static> {
    table: &'static TransitionTable<S, E>,
    initial: S,
    current: S,
    was_started: bool,
    recording: bool,
    history: StateHistory<S, E>,
}

impl<S: State + 'static, E: Event + 'static> Machine<S, E> {
    /// A machine that records every accepted transition.
    pub fn new(table: &'static TransitionTable<S, E>, initial: S) -> Self {
        Self {
            table,
            current: initial.clone(),
            initial,
            was_started: false,
            recording: true,
            history: StateHistory::new(),
        }
    }

    /// A machine whose history stays empty.
    pub fn without_history(table: &'static TransitionTable<S, E>, initial: S) -> Self {
        Self {
            recording: false,
            ..Self::new(table, initial)
        }
    }

    /// The state `event` would lead to, without applying it.
    pub fn peek(&self, event: &E) -> Result<S, TransitionError> {
        self.table.next_state(&self.current, event)
    }

    /// Apply `event` and return the new state.
    pub fn apply(&mut self, event: E) -> Result<S, TransitionError> {
        let next = self.peek(&event)?;
        let from = std::mem::replace(&mut self.current, next.clone());
        if next != self.initial {
            self.was_started = true;
        }
        if self.recording {
            self.history.push(StateTransition {
                from,
                event,
                to: next.clone(),
            });
        }
        Ok(next)
    }

    /// Whether accepted transitions are kept in [`Machine::history`].
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn current_state(&self) -> &S {
        &self.current
    }

    pub fn is_final(&self) -> bool {
        self.current.is_final()
    }

    /// True once the machine has left its initial state. Never resets.
    pub fn was_started(&self) -> bool {
        self.was_started
    }

    pub fn history(&self) -> &StateHistory<S, E> {
        &self.history
    }

    pub fn table(&self) -> &'static TransitionTable<S, E> {
        self.table
    }
}
