//! btf-trace: process lifecycle state machines that record BTF traces
//!
//! Tasks, ISRs, threads and their runnables are modelled as table-driven state
//! machines. A [`Simulation`](simulation::Simulation) applies external
//! stimuli to them and records every accepted change as a record in a
//! [`BtfFile`](trace::BtfFile), a time-ordered trace whose identifiers are
//! compact hashes resolved through a per-session
//! [`Registry`](registry::Registry).
//!
//! Validation always runs before mutation: a stimulus whose events are not all
//! legal leaves both the entities and the trace untouched.
//!
//! # Core Concepts
//!
//! - **Transition tables**: immutable `(state, event) -> state` data, see
//!   [`core::TransitionTable`]
//! - **Entities**: processes and runnables in an ownership arena, see
//!   [`entity::EntityArena`]
//! - **Trace**: BTF 2.2.1 records with a name dictionary, see [`trace`]
//! - **Resources**: cores and semaphores with their own tables, plus
//!   scheduler, signal and OS event records, see [`core::core_table`]
//!
//! # Example
//!
//! ```rust
//! use btf_trace::trace::{BtfFile, EntityType, TimeScale};
//! use btf_trace::core::LifecycleEvent;
//!
//! let mut file = BtfFile::new(TimeScale::Nano);
//! file.stimulus_event(0, "tick").unwrap();
//! file.process_event(0, EntityType::Task, "tick", "taskA", 0, LifecycleEvent::Activate)
//!     .unwrap();
//! file.process_event(5, EntityType::Task, "core0", "taskA", 0, LifecycleEvent::Start)
//!     .unwrap();
//!
//! let mut text = Vec::new();
//! file.write_btf(&mut text).unwrap();
//! let text = String::from_utf8(text).unwrap();
//! assert!(text.ends_with("5,core0,0,T,taskA,0,start\n"));
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod entity;
pub mod error;
pub mod registry;
pub mod simulation;
pub mod stimulus;
pub mod trace;

pub use builder::{BuildError, SimulationBuilder, StimulusBuilder};
pub use checkpoint::{CheckpointError, TraceCheckpoint};
pub use error::TraceError;
pub use registry::{IdHash, Registry};
pub use simulation::{SessionReport, Simulation, SimulationConfig, StimulusFailure};
pub use stimulus::{EntityKey, EntityTag, Stimulus};
pub use trace::{BtfEntry, BtfFile, EntityType, TimeScale};

/// Result alias for trace operations.
pub type Result<T> = std::result::Result<T, TraceError>;
