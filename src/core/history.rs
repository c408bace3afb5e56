//! Ordered record of the transitions a machine has taken.

use super::state::{Event, State};
use serde::{Deserialize, Serialize};

/// One accepted `(from, event, to)` step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State, E: Event> {
    pub from: S,
    pub event: E,
    pub to: S,
}

impl<S: State, E: Event> StateTransition<S, E> {
    /// True when the event kept the state unchanged (e.g. a migration).
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Append-only transition log of one machine.
///
/// # Example
///
/// ```rust
/// use btf_trace::core::{LifecycleEvent, LifecycleState, StateHistory, StateTransition};
///
/// let history = StateHistory::new()
///     .record(StateTransition {
///         from: LifecycleState::Unknown,
///         event: LifecycleEvent::Activate,
///         to: LifecycleState::Ready,
///     })
///     .record(StateTransition {
///         from: LifecycleState::Ready,
///         event: LifecycleEvent::Start,
///         to: LifecycleState::Running,
///     });
///
/// assert_eq!(
///     history.get_path(),
///     vec![
///         &LifecycleState::Unknown,
///         &LifecycleState::Ready,
///         &LifecycleState::Running
///     ]
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State, E: Event> {
    transitions: Vec<StateTransition<S, E>>,
}

impl<S: State, E: Event> Default for StateHistory<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, E: Event> StateHistory<S, E> {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Return a new history with `transition` appended; `self` is untouched.
    pub fn record(&self, transition: StateTransition<S, E>) -> Self {
        let mut next = self.clone();
        next.push(transition);
        next
    }

    /// Append in place.
    pub fn push(&mut self, transition: StateTransition<S, E>) {
        self.transitions.push(transition);
    }

    /// States visited: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&S> {
        self.transitions
            .first()
            .map(|first| &first.from)
            .into_iter()
            .chain(self.transitions.iter().map(|t| &t.to))
            .collect()
    }

    /// Events applied, in order.
    pub fn events(&self) -> impl Iterator<Item = &E> {
        self.transitions.iter().map(|t| &t.event)
    }

    pub fn transitions(&self) -> &[StateTransition<S, E>] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LifecycleEvent as E, LifecycleState as S};

    fn step(from: S, event: E, to: S) -> StateTransition<S, E> {
        StateTransition { from, event, to }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<S, E> = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
    }

    #[test]
    fn record_leaves_original_untouched() {
        let history = StateHistory::new();
        let next = history.record(step(S::Unknown, E::Activate, S::Ready));

        assert_eq!(history.len(), 0);
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn path_and_events_follow_recording_order() {
        let mut history = StateHistory::new();
        history.push(step(S::Unknown, E::Activate, S::Ready));
        history.push(step(S::Ready, E::Start, S::Running));
        history.push(step(S::Running, E::FullMigration, S::Running));

        assert_eq!(
            history.get_path(),
            vec![&S::Unknown, &S::Ready, &S::Running, &S::Running]
        );
        assert_eq!(
            history.events().copied().collect::<Vec<_>>(),
            vec![E::Activate, E::Start, E::FullMigration]
        );
        assert!(history.transitions()[2].is_self_loop());
    }

    #[test]
    fn history_serializes_correctly() {
        let history = StateHistory::new().record(step(S::Ready, E::Start, S::Running));

        let json = serde_json::to_string(&history).unwrap();
        let restored: StateHistory<S, E> = serde_json::from_str(&json).unwrap();

        assert_eq!(history, restored);
    }
}
