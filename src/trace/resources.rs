//! Emission of core, scheduler, semaphore, signal and OS event records.
//!
//! Resource events issued by a process name a core instead: the record's
//! source is whatever process instance that core is executing.

use super::entry::{BtfEntry, EntityType, EntryEvent};
use super::file::BtfFile;
use super::time::Tick;
use crate::core::{CoreEvent, OsEvent, SchedulerEvent, SemaphoreEvent, SignalEvent};
use crate::error::TraceError;
use crate::registry::IdHash;

impl BtfFile {
    /// Record a core event. Cores issue their events on themselves.
    pub fn core_event(&mut self, time: u64, core: &str, event: CoreEvent) -> Result<(), TraceError> {
        self.check_time(time)?;
        let core = self.registry_mut().register_typed(core, EntityType::Core)?;
        self.core_event_by_hash(time, core, event)
    }

    /// [`BtfFile::core_event`] on a name registered earlier.
    pub fn core_event_by_hash(
        &mut self,
        time: u64,
        core: IdHash,
        event: CoreEvent,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        self.registry_mut().ensure_type(core, EntityType::Core)?;
        self.append(resource_record(
            time,
            EntityType::Core,
            (core, 0),
            core,
            EntryEvent::Core(event),
            None,
        ))
    }

    /// Record a scheduler event.
    ///
    /// `schedule` is issued by the scheduler itself, so `source` must name
    /// it. `schedulepoint` is issued by the process running on the core
    /// named by `source`.
    pub fn scheduler_event(
        &mut self,
        time: u64,
        source: &str,
        scheduler: &str,
        event: SchedulerEvent,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        let source_type = match event {
            SchedulerEvent::Schedule => EntityType::Scheduler,
            SchedulerEvent::SchedulePoint => EntityType::Core,
        };
        let scheduler = self
            .registry_mut()
            .register_typed(scheduler, EntityType::Scheduler)?;
        let source = self.registry_mut().register_typed(source, source_type)?;
        self.scheduler_event_by_hash(time, source, scheduler, event)
    }

    /// [`BtfFile::scheduler_event`] on names registered earlier.
    pub fn scheduler_event_by_hash(
        &mut self,
        time: u64,
        source: IdHash,
        scheduler: IdHash,
        event: SchedulerEvent,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        self.registry_mut()
            .ensure_type(scheduler, EntityType::Scheduler)?;
        let issuer = match event {
            SchedulerEvent::Schedule => (source, 0),
            SchedulerEvent::SchedulePoint => self.running_process(source)?,
        };
        self.append(resource_record(
            time,
            EntityType::Scheduler,
            issuer,
            scheduler,
            EntryEvent::Scheduler(event),
            None,
        ))
    }

    /// Record a semaphore event with the number of accesses it reports.
    ///
    /// State events (`lock`, `free`, `used`, ...) are issued by the
    /// semaphore, so `source` must name it. Access events are issued by the
    /// process running on the core named by `source`.
    pub fn semaphore_event(
        &mut self,
        time: u64,
        source: &str,
        semaphore: &str,
        event: SemaphoreEvent,
        accesses: u64,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        let source_type = if event.is_state_event() {
            EntityType::Semaphore
        } else {
            EntityType::Core
        };
        let semaphore = self
            .registry_mut()
            .register_typed(semaphore, EntityType::Semaphore)?;
        let source = self.registry_mut().register_typed(source, source_type)?;
        self.semaphore_event_by_hash(time, source, semaphore, event, accesses)
    }

    /// [`BtfFile::semaphore_event`] on names registered earlier.
    pub fn semaphore_event_by_hash(
        &mut self,
        time: u64,
        source: IdHash,
        semaphore: IdHash,
        event: SemaphoreEvent,
        accesses: u64,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        self.registry_mut()
            .ensure_type(semaphore, EntityType::Semaphore)?;
        let issuer = if event.is_state_event() {
            (source, 0)
        } else {
            self.running_process(source)?
        };
        self.append(resource_record(
            time,
            EntityType::Semaphore,
            issuer,
            semaphore,
            EntryEvent::Semaphore(event),
            Some(accesses.to_string()),
        ))
    }

    /// Record a signal access by the process running on `core`.
    ///
    /// A written value is kept as the record note.
    pub fn signal_event(
        &mut self,
        time: u64,
        core: &str,
        signal: &str,
        event: SignalEvent,
        value: Option<&str>,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        let signal = self
            .registry_mut()
            .register_typed(signal, EntityType::Signal)?;
        let core = self.registry_mut().register_typed(core, EntityType::Core)?;
        self.signal_event_by_hash(time, core, signal, event, value)
    }

    /// [`BtfFile::signal_event`] on names registered earlier.
    pub fn signal_event_by_hash(
        &mut self,
        time: u64,
        core: IdHash,
        signal: IdHash,
        event: SignalEvent,
        value: Option<&str>,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        self.registry_mut().ensure_type(signal, EntityType::Signal)?;
        let issuer = self.running_process(core)?;
        let note = value
            .map(|v| v.chars().filter(|c| *c != '\n' && *c != '\r').collect::<String>())
            .filter(|v| !v.is_empty());
        self.append(resource_record(
            time,
            EntityType::Signal,
            issuer,
            signal,
            EntryEvent::Signal(event),
            note,
        ))
    }

    /// Record an OS event operation by the process running on `core`.
    pub fn os_event(
        &mut self,
        time: u64,
        core: &str,
        os_event: &str,
        event: OsEvent,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        let os_event = self.registry_mut().register_typed(os_event, EntityType::Os)?;
        let core = self.registry_mut().register_typed(core, EntityType::Core)?;
        self.os_event_by_hash(time, core, os_event, event)
    }

    /// [`BtfFile::os_event`] on names registered earlier.
    pub fn os_event_by_hash(
        &mut self,
        time: u64,
        core: IdHash,
        os_event: IdHash,
        event: OsEvent,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        self.registry_mut().ensure_type(os_event, EntityType::Os)?;
        let issuer = self.running_process(core)?;
        self.append(resource_record(
            time,
            EntityType::Os,
            issuer,
            os_event,
            EntryEvent::Os(event),
            None,
        ))
    }

    /// Append a resource record read from text, with names as written.
    ///
    /// Self-sourced events take `source` as the resource itself; all others
    /// take it as the issuing process.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn import_resource(
        &mut self,
        time: u64,
        entity_type: EntityType,
        source: &str,
        source_instance: u64,
        target: &str,
        target_instance: u64,
        event: EntryEvent,
        note: &str,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        let target = self.registry_mut().register_typed(target, entity_type)?;
        let source = if event.is_self_sourced() {
            self.registry_mut().register_typed(source, entity_type)?
        } else {
            self.process_source(source)?
        };
        self.append(BtfEntry {
            time,
            entity_type,
            source,
            source_instance,
            target,
            target_instance,
            event,
            note: (!note.is_empty()).then(|| note.to_string()),
        })
    }

    fn running_process(&mut self, core: IdHash) -> Result<(IdHash, u64), TraceError> {
        self.registry_mut().ensure_type(core, EntityType::Core)?;
        self.running_on(core).ok_or_else(|| TraceError::NoTaskRunning {
            core: self.name_of(core),
        })
    }
}

fn resource_record(
    time: Tick,
    entity_type: EntityType,
    (source, source_instance): (IdHash, u64),
    target: IdHash,
    event: EntryEvent,
    note: Option<String>,
) -> BtfEntry {
    BtfEntry {
        time,
        entity_type,
        source,
        source_instance,
        target,
        target_instance: 0,
        event,
        note,
    }
}
