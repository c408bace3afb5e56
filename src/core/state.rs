//! State and event traits for lifecycle machines.
//!
//! Transition tables are generic over these traits so that one engine can
//! drive every entity kind. Both traits only expose pure inspection methods.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for lifecycle states.
///
/// States are small immutable values. The engine compares them, copies them
/// into history records and serializes them into checkpoints.
///
/// # Example
///
/// ```rust
/// use btf_trace::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum CoreState {
///     Idle,
///     Execution,
/// }
///
/// impl State for CoreState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "idle",
///             Self::Execution => "execution",
///         }
///     }
/// }
///
/// assert_eq!(CoreState::Idle.name(), "idle");
/// assert!(!CoreState::Execution.is_final());
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// No transition leaves a final state; wildcard rules never match one.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }
}

/// Trait for events that drive a lifecycle machine.
pub trait Event:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the event's name for display/logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Busy,
        Done,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "idle",
                Self::Busy => "busy",
                Self::Done => "done",
            }
        }

        fn is_final(&self) -> bool {
            matches!(self, Self::Done)
        }
    }

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestEvent {
        Go,
    }

    impl Event for TestEvent {
        fn name(&self) -> &str {
            "go"
        }
    }

    #[test]
    fn state_name_returns_correct_value() {
        assert_eq!(TestState::Idle.name(), "idle");
        assert_eq!(TestState::Busy.name(), "busy");
        assert_eq!(TestState::Done.name(), "done");
    }

    #[test]
    fn is_final_identifies_terminal_states() {
        assert!(!TestState::Idle.is_final());
        assert!(!TestState::Busy.is_final());
        assert!(TestState::Done.is_final());
    }

    #[test]
    fn event_name_returns_correct_value() {
        assert_eq!(TestEvent::Go.name(), "go");
    }

    #[test]
    fn state_serializes_correctly() {
        let state = TestState::Busy;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: TestState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
