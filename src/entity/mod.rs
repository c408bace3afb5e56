//! Lifecycle entities and the ownership hierarchy that ties them together.
//!
//! [`Process`] and [`Runnable`] each wrap one [`Machine`](crate::core::Machine)
//! bound to their own table. [`EntityArena`] adds the parent/child structure
//! and refuses terminations that would strand running children.

mod hierarchy;
mod process;
mod runnable;

pub use hierarchy::{EntityArena, EntityBody, EntityId, EntityNode, HierarchyViolation};
pub use process::Process;
pub use runnable::Runnable;
