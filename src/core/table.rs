//! Transition tables: the pure validation engine shared by all entity kinds.
//!
//! A [`TransitionTable`] is an inspectable data value listing the declared
//! states, the declared events and the legal `(from, event, to)` rules.
//! Anything not listed is illegal; the table fails closed.

use super::state::{Event, State};
use thiserror::Error;

/// Errors raised by the transition engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{table}: event '{event}' is not permitted in state '{state}'")]
    InvalidTransition {
        table: &'static str,
        state: String,
        event: String,
    },
}

/// Which current states a rule applies to.
#[derive(Clone, Debug, PartialEq)]
pub enum FromState<S: State> {
    /// Exactly this state.
    Exact(S),
    /// Any of the listed states.
    AnyOf(Vec<S>),
    /// Any declared state that is not final.
    AnyLive,
}

impl<S: State> FromState<S> {
    fn matches(&self, state: &S) -> bool {
        match self {
            Self::Exact(s) => s == state,
            Self::AnyOf(states) => states.contains(state),
            Self::AnyLive => !state.is_final(),
        }
    }
}

/// Where a rule leads.
#[derive(Clone, Debug, PartialEq)]
pub enum ToState<S: State> {
    /// Move to this state.
    To(S),
    /// Keep the current state (the event is still recorded).
    Stay,
}

/// One legal transition.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionRule<S: State, E: Event> {
    pub from: FromState<S>,
    pub event: E,
    pub to: ToState<S>,
}

/// The legal-transition table of one entity kind.
///
/// # Example
///
/// ```rust
/// use btf_trace::core::{LifecycleEvent, LifecycleState, TransitionTable};
///
/// let table = TransitionTable::new(
///     "door",
///     vec![LifecycleState::Ready, LifecycleState::Running],
///     vec![LifecycleEvent::Start, LifecycleEvent::Preempt],
/// )
/// .rule(LifecycleState::Ready, LifecycleEvent::Start, LifecycleState::Running)
/// .rule(LifecycleState::Running, LifecycleEvent::Preempt, LifecycleState::Ready);
///
/// assert_eq!(
///     table.next_state(&LifecycleState::Ready, &LifecycleEvent::Start).unwrap(),
///     LifecycleState::Running
/// );
/// assert!(table
///     .next_state(&LifecycleState::Ready, &LifecycleEvent::Preempt)
///     .is_err());
/// ```
#[derive(Clone, Debug)]
pub struct TransitionTable<S: State, E: Event> {
    name: &'static str,
    states: Vec<S>,
    events: Vec<E>,
    rules: Vec<TransitionRule<S, E>>,
}

impl<S: State, E: Event> TransitionTable<S, E> {
    /// Create an empty table over the declared state and event sets.
    pub fn new(name: &'static str, states: Vec<S>, events: Vec<E>) -> Self {
        Self {
            name,
            states,
            events,
            rules: Vec::new(),
        }
    }

    /// Add a rule from exactly one state.
    pub fn rule(self, from: S, event: E, to: S) -> Self {
        self.add(FromState::Exact(from), event, ToState::To(to))
    }

    /// Add a rule with an arbitrary source and target.
    pub fn add(mut self, from: FromState<S>, event: E, to: ToState<S>) -> Self {
        self.rules.push(TransitionRule { from, event, to });
        self
    }

    /// Name of the table, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared states.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// Declared events.
    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[TransitionRule<S, E>] {
        &self.rules
    }

    /// Compute the state reached by applying `event` in `state`.
    ///
    /// Pure: the table is not modified and nothing is recorded. States or
    /// events outside the declared sets are always rejected.
    pub fn next_state(&self, state: &S, event: &E) -> Result<S, TransitionError> {
        if !self.states.contains(state) || !self.events.contains(event) {
            return Err(self.reject(state, event));
        }

        self.rules
            .iter()
            .find(|rule| rule.event == *event && rule.from.matches(state))
            .map(|rule| match &rule.to {
                ToState::To(next) => next.clone(),
                ToState::Stay => state.clone(),
            })
            .ok_or_else(|| self.reject(state, event))
    }

    /// Check whether `event` is legal in `state`.
    pub fn is_legal(&self, state: &S, event: &E) -> bool {
        self.next_state(state, event).is_ok()
    }

    /// Events that may follow `state`, in declaration order.
    pub fn legal_events(&self, state: &S) -> Vec<E> {
        self.events
            .iter()
            .filter(|event| self.is_legal(state, event))
            .cloned()
            .collect()
    }

    fn reject(&self, state: &S, event: &E) -> TransitionError {
        TransitionError::InvalidTransition {
            table: self.name,
            state: state.name().to_string(),
            event: event.name().to_string(),
        }
    }
}
