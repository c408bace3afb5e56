//! Builder for [`Stimulus`] values.

use crate::builder::error::BuildError;
use crate::core::LifecycleEvent;
use crate::stimulus::{EntityKey, Stimulus};
use crate::trace::EntityType;

/// Fluent construction of a [`Stimulus`].
///
/// `build` checks the stimulus is self-consistent: it names a target and
/// at least one event, carries a source when an event needs one, and a
/// destination when it migrates. Whether the events are legal for the
/// target is only known when the stimulus is applied.
#[derive(Debug, Clone, Default)]
pub struct StimulusBuilder {
    name: Option<String>,
    time: u64,
    source: Option<String>,
    target: Option<EntityKey>,
    parent: Option<EntityKey>,
    events: Vec<LifecycleEvent>,
    destination: Option<String>,
}

impl StimulusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Time in the trace file's scale. Defaults to zero.
    pub fn at(mut self, time: u64) -> Self {
        self.time = time;
        self
    }

    /// Core or scheduler issuing the events.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn target(mut self, target: EntityKey) -> Self {
        self.target = Some(target);
        self
    }

    pub fn parent(mut self, parent: EntityKey) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn event(mut self, event: LifecycleEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn events(mut self, events: impl IntoIterator<Item = LifecycleEvent>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn destination(mut self, core: impl Into<String>) -> Self {
        self.destination = Some(core.into());
        self
    }

    pub fn build(self) -> Result<Stimulus, BuildError> {
        let name = self.name.ok_or(BuildError::MissingName)?;
        let target = self.target.ok_or(BuildError::MissingTarget)?;
        if self.events.is_empty() {
            return Err(BuildError::NoEvents);
        }

        if target.tag.is_process() {
            let sourced = self
                .events
                .iter()
                .find(|ev| EntityType::source_of(**ev) != EntityType::Stimulus);
            if let (Some(event), None) = (sourced, &self.source) {
                return Err(BuildError::MissingSource {
                    event: event.to_string(),
                });
            }
            if self.destination.is_none() && self.events.iter().any(|ev| ev.is_migration()) {
                return Err(BuildError::MissingDestination);
            }
        } else if self.parent.is_none() {
            return Err(BuildError::MissingParent {
                runnable: target.name,
            });
        }

        Ok(Stimulus {
            name,
            time: self.time,
            source: self.source,
            target,
            parent: self.parent,
            events: self.events,
            destination: self.destination,
        })
    }
}
