//! Trace records, the trace file and its BTF text form.
//!
//! A [`BtfFile`] owns its records and the [`Registry`](crate::registry::Registry)
//! that resolves them. Records are append-only and time never decreases.

mod entry;
mod error;
mod file;
mod resources;
mod text;
mod time;

pub use entry::{BtfEntry, EntityType, EntryEvent};
pub use error::TextError;
pub use file::{BtfFile, Comment, TraceHeader, BTF_VERSION, SIMULATION_TARGET};
pub use text::{ImportReport, SkippedLine};
pub use time::{Tick, TimeScale};
