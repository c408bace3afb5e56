//! The transition engine.
//!
//! - `State`/`Event` traits describing what a table is generic over
//! - `TransitionTable`, a pure and inspectable legal-transition table
//! - `Machine`, one table bound to a current state with its history
//! - the shared lifecycle taxonomy with the process and runnable tables
//! - core and semaphore tables, and the scheduler, OS and signal vocabularies
//!
//! Nothing in this module touches the trace or the registry.

mod history;
mod lifecycle;
mod machine;
mod resources;
mod state;
mod table;

pub use history::{StateHistory, StateTransition};
pub use lifecycle::{process_table, runnable_table, LifecycleEvent, LifecycleState};
pub use machine::Machine;
pub use resources::{
    core_table, semaphore_table, CoreEvent, CoreState, OsEvent, SchedulerEvent, SemaphoreEvent,
    SemaphoreState, SignalEvent,
};
pub use state::{Event, State};
pub use table::{FromState, ToState, TransitionError, TransitionRule, TransitionTable};
