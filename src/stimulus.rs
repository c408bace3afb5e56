//! Stimuli: external triggers mapped to lifecycle events on one entity.

use crate::core::LifecycleEvent;
use crate::trace::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::btf_enum! {
    /// Category of a simulated entity.
    pub enum EntityTag {
        Task => "task",
        Isr => "isr",
        Thread => "thread",
        Runnable => "runnable",
    }
}

impl EntityTag {
    pub fn entity_type(self) -> EntityType {
        match self {
            Self::Task => EntityType::Task,
            Self::Isr => EntityType::Isr,
            Self::Thread => EntityType::Thread,
            Self::Runnable => EntityType::Runnable,
        }
    }

    pub fn is_process(self) -> bool {
        !matches!(self, Self::Runnable)
    }
}

/// Identity of a simulated entity: `(tag, name, instance)`.
///
/// The instance tells successive spawns of the same name apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub tag: EntityTag,
    pub name: String,
    pub instance: u64,
}

impl EntityKey {
    pub fn new(tag: EntityTag, name: impl Into<String>, instance: u64) -> Self {
        Self {
            tag,
            name: name.into(),
            instance,
        }
    }

    pub fn task(name: impl Into<String>, instance: u64) -> Self {
        Self::new(EntityTag::Task, name, instance)
    }

    pub fn isr(name: impl Into<String>, instance: u64) -> Self {
        Self::new(EntityTag::Isr, name, instance)
    }

    pub fn thread(name: impl Into<String>, instance: u64) -> Self {
        Self::new(EntityTag::Thread, name, instance)
    }

    pub fn runnable(name: impl Into<String>, instance: u64) -> Self {
        Self::new(EntityTag::Runnable, name, instance)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}[{}]", self.tag, self.name, self.instance)
    }
}

/// One external trigger.
///
/// Applying a stimulus is all-or-nothing: every event in `events` is applied
/// to `target` in order, or none is. Build one with
/// [`StimulusBuilder`](crate::builder::StimulusBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    /// Stimulus name; issues `activate` and `mtalimitexceeded`.
    pub name: String,
    /// Time in the trace file's scale.
    pub time: u64,
    /// Core (or scheduler, for `interrupt_suspended`) issuing the other events.
    pub source: Option<String>,
    pub target: EntityKey,
    /// Owner of `target`; lets a runnable be created on first use.
    pub parent: Option<EntityKey>,
    pub events: Vec<LifecycleEvent>,
    /// Destination core of a migration.
    pub destination: Option<String>,
}

impl Stimulus {
    /// Whether any event is issued by the stimulus itself.
    pub fn fires_trigger(&self) -> bool {
        self.events
            .iter()
            .any(|ev| EntityType::source_of(*ev) == EntityType::Stimulus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_entity_types() {
        assert_eq!(EntityTag::Isr.entity_type(), EntityType::Isr);
        assert!(EntityTag::Thread.is_process());
        assert!(!EntityTag::Runnable.is_process());
    }

    #[test]
    fn keys_differ_by_instance() {
        assert_ne!(EntityKey::task("a", 0), EntityKey::task("a", 1));
        assert_ne!(EntityKey::task("a", 0), EntityKey::isr("a", 0));
        assert_eq!(EntityKey::runnable("r", 2).to_string(), "runnable r[2]");
    }

    #[test]
    fn trigger_only_for_stimulus_sourced_events() {
        let mut stimulus = Stimulus {
            name: "tick".to_string(),
            time: 0,
            source: Some("core0".to_string()),
            target: EntityKey::task("a", 0),
            parent: None,
            events: vec![LifecycleEvent::Start],
            destination: None,
        };
        assert!(!stimulus.fires_trigger());

        stimulus.events.push(LifecycleEvent::MtaLimitExceeded);
        assert!(stimulus.fires_trigger());
    }
}
