//! Trace records and the entity-type vocabulary of a BTF trace.

use super::time::{Tick, TimeScale};
use crate::core::{
    core_table, process_table, runnable_table, CoreEvent, LifecycleEvent, OsEvent, SchedulerEvent,
    SemaphoreEvent, SignalEvent,
};
use crate::error::TraceError;
use crate::registry::{IdHash, Registry};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::btf_enum! {
    /// Kind of entity a name stands for, with its BTF type letter.
    pub enum EntityType {
        Core => "C",
        Task => "T",
        Isr => "I",
        Runnable => "R",
        Stimulus => "STI",
        Scheduler => "SCHED",
        Simulation => "SIM",
        Thread => "THR",
        Semaphore => "SEM",
        Signal => "SIG",
        Os => "EVENT",
    }
}

impl EntityType {
    /// Tasks, ISRs and threads share the process lifecycle.
    pub fn is_process(self) -> bool {
        matches!(self, Self::Task | Self::Isr | Self::Thread)
    }

    /// Entity type that issues `event` on a process record.
    ///
    /// Activation and budget overruns come from a stimulus, an interrupted
    /// suspension from the scheduler, everything else from a core.
    pub fn source_of(event: LifecycleEvent) -> EntityType {
        match event {
            LifecycleEvent::Activate | LifecycleEvent::MtaLimitExceeded => Self::Stimulus,
            LifecycleEvent::InterruptSuspended => Self::Scheduler,
            _ => Self::Core,
        }
    }
}

/// What a record says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryEvent {
    /// A lifecycle event on a process or runnable.
    Lifecycle(LifecycleEvent),
    /// The target task moved from the source core to `destination`.
    Migration { destination: IdHash },
    /// A stimulus fired.
    Trigger,
    /// Simulation metadata attached to the source process.
    Tag,
    /// A core went idle, started executing or changed frequency.
    Core(CoreEvent),
    /// A semaphore changed state or a process accessed it.
    Semaphore(SemaphoreEvent),
    Scheduler(SchedulerEvent),
    /// An OS event object was set, cleared or waited on.
    Os(OsEvent),
    /// A process read or wrote a signal.
    Signal(SignalEvent),
}

impl EntryEvent {
    /// Check that this event may appear on a record of `entity_type`.
    pub fn check_for(&self, entity_type: EntityType) -> Result<(), TraceError> {
        let allowed = match (self, entity_type) {
            (Self::Lifecycle(ev), t) if t.is_process() => {
                !ev.is_migration() && process_table().events().contains(ev)
            }
            (Self::Lifecycle(ev), EntityType::Runnable) => runnable_table().events().contains(ev),
            (Self::Migration { .. }, EntityType::Task) => true,
            (Self::Trigger, EntityType::Stimulus) => true,
            (Self::Tag, EntityType::Simulation) => true,
            (Self::Core(ev), EntityType::Core) => core_table().events().contains(ev),
            (Self::Semaphore(_), EntityType::Semaphore) => true,
            (Self::Scheduler(_), EntityType::Scheduler) => true,
            (Self::Os(_), EntityType::Os) => true,
            (Self::Signal(_), EntityType::Signal) => true,
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(TraceError::InvalidEvent {
                event: self.to_string(),
                entity_type,
            })
        }
    }

    /// Events an entity issues on itself: its record has source equal to
    /// target.
    pub fn is_self_sourced(&self) -> bool {
        match self {
            Self::Core(_) | Self::Trigger => true,
            Self::Scheduler(ev) => *ev == SchedulerEvent::Schedule,
            Self::Semaphore(ev) => ev.is_state_event(),
            _ => false,
        }
    }

    /// Events issued by the process running on a core.
    pub fn is_process_sourced(&self) -> bool {
        match self {
            Self::Scheduler(ev) => *ev == SchedulerEvent::SchedulePoint,
            Self::Semaphore(ev) => !ev.is_state_event(),
            Self::Os(_) | Self::Signal(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for EntryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifecycle(ev) => f.write_str(ev.as_str()),
            Self::Migration { .. } => f.write_str("migration"),
            Self::Trigger => f.write_str("trigger"),
            Self::Tag => f.write_str("tag"),
            Self::Core(ev) => f.write_str(ev.as_str()),
            Self::Semaphore(ev) => f.write_str(ev.as_str()),
            Self::Scheduler(ev) => f.write_str(ev.as_str()),
            Self::Os(ev) => f.write_str(ev.as_str()),
            Self::Signal(ev) => f.write_str(ev.as_str()),
        }
    }
}

/// One immutable trace record.
///
/// Names are stored as hashes; [`BtfEntry::render`] turns them back into
/// text through the registry of the owning file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtfEntry {
    pub time: Tick,
    pub entity_type: EntityType,
    pub source: IdHash,
    pub source_instance: u64,
    pub target: IdHash,
    pub target_instance: u64,
    pub event: EntryEvent,
    pub note: Option<String>,
}

impl BtfEntry {
    pub fn is_migration(&self) -> bool {
        matches!(self.event, EntryEvent::Migration { .. })
    }

    /// The entity this record is filed under in the per-entity index.
    ///
    /// Simulation tags describe their source process; every other record
    /// describes its target.
    pub fn subject(&self) -> IdHash {
        match self.event {
            EntryEvent::Tag => self.source,
            _ => self.target,
        }
    }

    /// Every hash the record references.
    pub fn hashes(&self) -> Vec<IdHash> {
        let mut hashes = vec![self.source, self.target];
        if let EntryEvent::Migration { destination } = self.event {
            hashes.push(destination);
        }
        hashes
    }

    /// Render as BTF text lines in `scale`.
    ///
    /// A migration renders as two lines: `enforcedmigration` issued by the
    /// source core followed by `fullmigration` issued by the destination.
    pub fn render(&self, registry: &Registry, scale: TimeScale) -> Result<String, TraceError> {
        let time = scale.from_ticks(self.time);
        let target = registry.resolve(self.target)?;
        let source = registry.resolve(self.source)?;

        match self.event {
            EntryEvent::Migration { destination } => {
                let destination = registry.resolve(destination)?;
                Ok(format!(
                    "{time},{source},{sinst},{ty},{target},{tinst},{from}\n\
                     {time},{destination},{sinst},{ty},{target},{tinst},{to}",
                    sinst = self.source_instance,
                    ty = self.entity_type,
                    tinst = self.target_instance,
                    from = LifecycleEvent::EnforcedMigration,
                    to = LifecycleEvent::FullMigration,
                ))
            }
            event => {
                let mut line = format!(
                    "{time},{source},{},{},{target},{},{event}",
                    self.source_instance, self.entity_type, self.target_instance
                );
                if let Some(note) = self.note.as_deref().filter(|n| !n.is_empty()) {
                    line.push(',');
                    line.extend(note.chars().filter(|c| *c != '\n' && *c != '\r'));
                }
                Ok(line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(names: &[&str]) -> (Registry, Vec<IdHash>) {
        let mut registry = Registry::new();
        let hashes = names
            .iter()
            .map(|name| registry.register(name).unwrap())
            .collect();
        (registry, hashes)
    }

    #[test]
    fn source_type_follows_event() {
        assert_eq!(
            EntityType::source_of(LifecycleEvent::Activate),
            EntityType::Stimulus
        );
        assert_eq!(
            EntityType::source_of(LifecycleEvent::InterruptSuspended),
            EntityType::Scheduler
        );
        assert_eq!(EntityType::source_of(LifecycleEvent::Start), EntityType::Core);
    }

    #[test]
    fn lifecycle_record_renders_as_one_line() {
        let (registry, h) = registry_with(&["core0", "taskA"]);
        let entry = BtfEntry {
            time: TimeScale::Nano.to_ticks(250).unwrap(),
            entity_type: EntityType::Task,
            source: h[0],
            source_instance: 0,
            target: h[1],
            target_instance: 3,
            event: EntryEvent::Lifecycle(LifecycleEvent::Preempt),
            note: None,
        };

        assert_eq!(
            entry.render(&registry, TimeScale::Nano).unwrap(),
            "250,core0,0,T,taskA,3,preempt"
        );
    }

    #[test]
    fn migration_renders_as_two_lines() {
        let (registry, h) = registry_with(&["core0", "core1", "taskA"]);
        let entry = BtfEntry {
            time: TimeScale::Nano.to_ticks(100).unwrap(),
            entity_type: EntityType::Task,
            source: h[0],
            source_instance: 0,
            target: h[2],
            target_instance: 1,
            event: EntryEvent::Migration { destination: h[1] },
            note: None,
        };

        assert_eq!(
            entry.render(&registry, TimeScale::Nano).unwrap(),
            "100,core0,0,T,taskA,1,enforcedmigration\n100,core1,0,T,taskA,1,fullmigration"
        );
        assert_eq!(entry.hashes().len(), 3);
    }

    #[test]
    fn note_is_appended_without_newlines() {
        let (registry, h) = registry_with(&["taskA", "SIM"]);
        let entry = BtfEntry {
            time: Tick::ZERO,
            entity_type: EntityType::Simulation,
            source: h[0],
            source_instance: 0,
            target: h[1],
            target_instance: 0,
            event: EntryEvent::Tag,
            note: Some("COMM:a\nb".to_string()),
        };

        assert_eq!(
            entry.render(&registry, TimeScale::Micro).unwrap(),
            "0,taskA,0,SIM,SIM,0,tag,COMM:ab"
        );
        assert_eq!(entry.subject(), h[0]);
    }

    #[test]
    fn unresolvable_hash_fails_rendering() {
        let (registry, h) = registry_with(&["core0"]);
        let missing = IdHash::new(1);
        let entry = BtfEntry {
            time: Tick::ZERO,
            entity_type: EntityType::Task,
            source: h[0],
            source_instance: 0,
            target: missing,
            target_instance: 0,
            event: EntryEvent::Lifecycle(LifecycleEvent::Start),
            note: None,
        };

        assert_eq!(
            entry.render(&registry, TimeScale::Nano).unwrap_err(),
            TraceError::UnknownIdentifier(missing)
        );
    }

    #[test]
    fn events_are_checked_against_record_type() {
        let suspend = EntryEvent::Lifecycle(LifecycleEvent::Suspend);
        let wait = EntryEvent::Lifecycle(LifecycleEvent::Wait);

        assert!(suspend.check_for(EntityType::Runnable).is_ok());
        assert!(suspend.check_for(EntityType::Task).is_err());
        assert!(wait.check_for(EntityType::Isr).is_ok());
        assert_eq!(
            wait.check_for(EntityType::Runnable).unwrap_err().code(),
            "invalid_event"
        );
        assert!(EntryEvent::Lifecycle(LifecycleEvent::FullMigration)
            .check_for(EntityType::Task)
            .is_err());
        assert!(EntryEvent::Trigger.check_for(EntityType::Stimulus).is_ok());
        assert!(EntryEvent::Tag.check_for(EntityType::Task).is_err());
    }

    #[test]
    fn resource_events_belong_to_their_entity_type() {
        let idle = EntryEvent::Core(CoreEvent::Idle);
        assert!(idle.check_for(EntityType::Core).is_ok());
        assert!(idle.check_for(EntityType::Task).is_err());
        assert!(EntryEvent::Semaphore(SemaphoreEvent::Lock)
            .check_for(EntityType::Semaphore)
            .is_ok());
        assert!(EntryEvent::Signal(SignalEvent::Write)
            .check_for(EntityType::Os)
            .is_err());
        assert!(EntryEvent::Os(OsEvent::WaitEvent)
            .check_for(EntityType::Os)
            .is_ok());
        assert_eq!(EntityType::Os.as_str(), "EVENT");
    }

    #[test]
    fn resource_events_name_their_issuer() {
        assert!(EntryEvent::Core(CoreEvent::Execute).is_self_sourced());
        assert!(EntryEvent::Scheduler(SchedulerEvent::Schedule).is_self_sourced());
        assert!(EntryEvent::Scheduler(SchedulerEvent::SchedulePoint).is_process_sourced());
        assert!(EntryEvent::Semaphore(SemaphoreEvent::Unlock).is_self_sourced());
        assert!(EntryEvent::Semaphore(SemaphoreEvent::RequestSemaphore).is_process_sourced());
        assert!(EntryEvent::Signal(SignalEvent::Read).is_process_sourced());
        let start = EntryEvent::Lifecycle(LifecycleEvent::Start);
        assert!(!start.is_self_sourced() && !start.is_process_sourced());
    }

    #[test]
    fn signal_record_renders_its_value() {
        let (registry, h) = registry_with(&["taskA", "speed"]);
        let entry = BtfEntry {
            time: TimeScale::Nano.to_ticks(40).unwrap(),
            entity_type: EntityType::Signal,
            source: h[0],
            source_instance: 2,
            target: h[1],
            target_instance: 0,
            event: EntryEvent::Signal(SignalEvent::Write),
            note: Some("120".to_string()),
        };

        assert_eq!(
            entry.render(&registry, TimeScale::Nano).unwrap(),
            "40,taskA,2,SIG,speed,0,write,120"
        );
    }
}
