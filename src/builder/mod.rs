//! Fluent builders for stimuli and simulation sessions, plus the
//! [`btf_enum!`](crate::btf_enum) macro used for the crate's name tables.

pub mod error;
pub mod macros;
mod simulation;
mod stimulus;

pub use error::BuildError;
pub use simulation::SimulationBuilder;
pub use stimulus::StimulusBuilder;
