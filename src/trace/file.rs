//! The trace file: ordered records plus the dictionary that resolves them.

use super::entry::{BtfEntry, EntityType, EntryEvent};
use super::time::{Tick, TimeScale};
use crate::core::{
    core_table, semaphore_table, CoreEvent, CoreState, LifecycleEvent, Machine, SemaphoreEvent,
    SemaphoreState,
};
use crate::error::TraceError;
use crate::registry::{IdHash, Registry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// BTF format version written into every header.
pub const BTF_VERSION: &str = "2.2.1";

/// Target name of simulation tag records.
pub const SIMULATION_TARGET: &str = "SIM";

/// Metadata written above the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub creator: String,
    pub created_at: DateTime<Utc>,
    /// Free-form header lines, written as `#<entry>`.
    pub entries: Vec<String>,
}

impl Default for TraceHeader {
    fn default() -> Self {
        Self {
            creator: env!("CARGO_PKG_NAME").to_string(),
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }
}

/// State of one core as seen through its records.
#[derive(Debug, Clone)]
struct CoreSlot {
    machine: Machine<CoreState, CoreEvent>,
    /// Process instance the core is executing.
    running: Option<(IdHash, u64)>,
}

impl CoreSlot {
    fn new() -> Self {
        Self {
            machine: Machine::without_history(core_table(), CoreState::Unknown),
            running: None,
        }
    }
}

/// A comment line, placed before the record at index `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub position: usize,
    pub text: String,
}

/// Append-only BTF trace owned by one session.
///
/// Every emission validates time order and identifier types before it
/// touches anything; a rejected call leaves the file unchanged except for
/// names it registered.
///
/// # Example
///
/// ```rust
/// use btf_trace::trace::{BtfFile, TimeScale};
///
/// let mut file = BtfFile::new(TimeScale::Nano);
/// file.task_migration_event(100, "core0", "core1", "taskA", 1).unwrap();
///
/// let entry = &file.entries()[0];
/// assert!(entry.is_migration());
/// assert_eq!(file.registry().resolve(entry.target).unwrap(), "taskA");
/// assert!(file.task_migration_event(99, "core1", "core0", "taskA", 1).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct BtfFile {
    time_scale: TimeScale,
    header: TraceHeader,
    registry: Registry,
    entries: Vec<BtfEntry>,
    comments: Vec<Comment>,
    per_entity: HashMap<IdHash, Vec<usize>>,
    stimulus_instances: HashMap<IdHash, u64>,
    cores: HashMap<IdHash, CoreSlot>,
    semaphores: HashMap<IdHash, Machine<SemaphoreState, SemaphoreEvent>>,
    core_events: bool,
}

impl BtfFile {
    pub fn new(time_scale: TimeScale) -> Self {
        Self::with_registry(time_scale, Registry::new())
    }

    /// Start a file on an existing (possibly pre-populated) registry.
    pub fn with_registry(time_scale: TimeScale, registry: Registry) -> Self {
        Self {
            time_scale,
            header: TraceHeader::default(),
            registry,
            entries: Vec::new(),
            comments: Vec::new(),
            per_entity: HashMap::new(),
            stimulus_instances: HashMap::new(),
            cores: HashMap::new(),
            semaphores: HashMap::new(),
            core_events: false,
        }
    }

    pub fn time_scale(&self) -> TimeScale {
        self.time_scale
    }

    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    pub(crate) fn set_header(&mut self, header: TraceHeader) {
        self.header = header;
    }

    pub(crate) fn set_time_scale(&mut self, time_scale: TimeScale) {
        self.time_scale = time_scale;
    }

    /// Whether process records that take or leave a core also emit the
    /// core's `execute` and `idle` records.
    pub fn generates_core_events(&self) -> bool {
        self.core_events
    }

    pub fn set_core_events(&mut self, enabled: bool) {
        self.core_events = enabled;
    }

    pub fn core_state(&self, core: IdHash) -> CoreState {
        self.cores
            .get(&core)
            .map_or(CoreState::Unknown, |slot| *slot.machine.current_state())
    }

    /// Process instance currently executing on `core`.
    pub fn running_on(&self, core: IdHash) -> Option<(IdHash, u64)> {
        self.cores.get(&core).and_then(|slot| slot.running)
    }

    pub fn semaphore_state(&self, semaphore: IdHash) -> SemaphoreState {
        self.semaphores
            .get(&semaphore)
            .map_or(SemaphoreState::Unknown, |machine| *machine.current_state())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Register a name in this file's dictionary.
    pub fn register(&mut self, name: &str) -> Result<IdHash, TraceError> {
        self.registry.register(name)
    }

    pub fn entries(&self) -> &[BtfEntry] {
        &self.entries
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time of the last accepted record.
    pub fn last_time(&self) -> Option<Tick> {
        self.entries.last().map(|e| e.time)
    }

    /// Records filed under `hash`, in trace order.
    pub fn events_for_entity(&self, hash: IdHash) -> Vec<&BtfEntry> {
        self.per_entity
            .get(&hash)
            .map(|indices| indices.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Render one record as BTF text through this file's dictionary.
    pub fn render_entry(&self, entry: &BtfEntry) -> Result<String, TraceError> {
        entry.render(&self.registry, self.time_scale)
    }

    /// Normalise a value in the file's scale and check it against the last record.
    pub fn check_time(&self, time: u64) -> Result<Tick, TraceError> {
        let tick = self.time_scale.normalize(time)?;
        match self.last_time() {
            Some(last) if tick < last => Err(TraceError::OutOfOrderTime { time: tick, last }),
            _ => Ok(tick),
        }
    }

    /// Add a free-form header line.
    pub fn header_entry(&mut self, entry: &str) {
        self.header
            .entries
            .push(entry.chars().filter(|c| *c != '\n' && *c != '\r').collect());
    }

    /// Add a comment after the records emitted so far.
    pub fn comment(&mut self, text: &str) {
        self.comments.push(Comment {
            position: self.entries.len(),
            text: text.chars().filter(|c| *c != '\n' && *c != '\r').collect(),
        });
    }

    pub(crate) fn restore_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Record that `task` moved from `source_core` to `destination_core`.
    pub fn task_migration_event(
        &mut self,
        time: u64,
        source_core: &str,
        destination_core: &str,
        task: &str,
        task_instance: u64,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        let source = self.registry.register_typed(source_core, EntityType::Core)?;
        let destination = self
            .registry
            .register_typed(destination_core, EntityType::Core)?;
        let task = self.registry.register_typed(task, EntityType::Task)?;
        self.task_migration_event_by_hash(time, source, destination, task, task_instance)
    }

    /// [`BtfFile::task_migration_event`] on names registered earlier.
    pub fn task_migration_event_by_hash(
        &mut self,
        time: u64,
        source_core: IdHash,
        destination_core: IdHash,
        task: IdHash,
        task_instance: u64,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        self.registry.ensure_type(source_core, EntityType::Core)?;
        self.registry.ensure_type(destination_core, EntityType::Core)?;
        self.registry.ensure_type(task, EntityType::Task)?;

        self.push(BtfEntry {
            time,
            entity_type: EntityType::Task,
            source: source_core,
            source_instance: 0,
            target: task,
            target_instance: task_instance,
            event: EntryEvent::Migration {
                destination: destination_core,
            },
            note: None,
        });
        Ok(())
    }

    /// Record a lifecycle event on a task, ISR or thread.
    ///
    /// The source must be of the type [`EntityType::source_of`] names for
    /// `event`. Migrations go through [`BtfFile::task_migration_event`].
    pub fn process_event(
        &mut self,
        time: u64,
        process_type: EntityType,
        source: &str,
        process: &str,
        process_instance: u64,
        event: LifecycleEvent,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        EntryEvent::Lifecycle(event).check_for(process_type)?;
        let source = self
            .registry
            .register_typed(source, EntityType::source_of(event))?;
        let process = self.registry.register_typed(process, process_type)?;
        self.process_event_by_hash(time, process_type, source, process, process_instance, event)
    }

    /// [`BtfFile::process_event`] on names registered earlier.
    pub fn process_event_by_hash(
        &mut self,
        time: u64,
        process_type: EntityType,
        source: IdHash,
        process: IdHash,
        process_instance: u64,
        event: LifecycleEvent,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        let record_event = EntryEvent::Lifecycle(event);
        record_event.check_for(process_type)?;

        let source_type = EntityType::source_of(event);
        self.registry.ensure_type(source, source_type)?;
        self.registry.ensure_type(process, process_type)?;

        let source_instance = match source_type {
            EntityType::Stimulus => self.stimulus_instances.get(&source).copied().unwrap_or(0),
            _ => 0,
        };

        let vacated = if self.core_events && event.deallocates_core() {
            self.core_running(process, process_instance)
        } else {
            None
        };
        if self.core_events
            && source_type == EntityType::Core
            && event.allocates_core()
            && self.core_state(source) != CoreState::Execution
        {
            self.push(core_record(time, source, CoreEvent::Execute));
        }

        self.push(BtfEntry {
            time,
            entity_type: process_type,
            source,
            source_instance,
            target: process,
            target_instance: process_instance,
            event: record_event,
            note: None,
        });

        if let Some(core) = vacated {
            if self.core_state(core) != CoreState::Idle {
                self.push(core_record(time, core, CoreEvent::Idle));
            }
        }
        Ok(())
    }

    /// Record a runnable event issued by the process that executes it.
    pub fn runnable_event(
        &mut self,
        time: u64,
        process: &str,
        process_instance: u64,
        runnable: &str,
        runnable_instance: u64,
        event: LifecycleEvent,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        EntryEvent::Lifecycle(event).check_for(EntityType::Runnable)?;
        let process = self.registry.register(process)?;
        let runnable = self
            .registry
            .register_typed(runnable, EntityType::Runnable)?;
        self.runnable_event_by_hash(time, process, process_instance, runnable, runnable_instance, event)
    }

    /// [`BtfFile::runnable_event`] on names registered earlier.
    pub fn runnable_event_by_hash(
        &mut self,
        time: u64,
        process: IdHash,
        process_instance: u64,
        runnable: IdHash,
        runnable_instance: u64,
        event: LifecycleEvent,
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        let record_event = EntryEvent::Lifecycle(event);
        record_event.check_for(EntityType::Runnable)?;
        self.ensure_process(process, EntityType::Task)?;
        self.registry.ensure_type(runnable, EntityType::Runnable)?;

        self.push(BtfEntry {
            time,
            entity_type: EntityType::Runnable,
            source: process,
            source_instance: process_instance,
            target: runnable,
            target_instance: runnable_instance,
            event: record_event,
            note: None,
        });
        Ok(())
    }

    /// Record that `stimulus` fired. Returns the instance number it fired as.
    ///
    /// Instances count from zero per stimulus name.
    pub fn stimulus_event(&mut self, time: u64, stimulus: &str) -> Result<u64, TraceError> {
        self.check_time(time)?;
        let stimulus = self
            .registry
            .register_typed(stimulus, EntityType::Stimulus)?;
        self.stimulus_event_by_hash(time, stimulus)
    }

    /// [`BtfFile::stimulus_event`] on a name registered earlier.
    pub fn stimulus_event_by_hash(&mut self, time: u64, stimulus: IdHash) -> Result<u64, TraceError> {
        let time = self.check_time(time)?;
        self.registry.ensure_type(stimulus, EntityType::Stimulus)?;

        let instance = match self.stimulus_instances.get(&stimulus) {
            Some(last) => last + 1,
            None => 0,
        };
        self.stimulus_instances.insert(stimulus, instance);

        self.push(BtfEntry {
            time,
            entity_type: EntityType::Stimulus,
            source: stimulus,
            source_instance: instance,
            target: stimulus,
            target_instance: instance,
            event: EntryEvent::Trigger,
            note: None,
        });
        Ok(instance)
    }

    /// Attach a simulation tag (e.g. `COMM:name`) to a process.
    pub fn simulation_tag(&mut self, time: u64, process: &str, note: &str) -> Result<(), TraceError> {
        self.check_time(time)?;
        let process = self.registry.register(process)?;
        self.simulation_tag_by_hash(time, process, note)
    }

    /// [`BtfFile::simulation_tag`] on a name registered earlier.
    pub fn simulation_tag_by_hash(
        &mut self,
        time: u64,
        process: IdHash,
        note: &str,
    ) -> Result<(), TraceError> {
        self.tag(time, process, EntityType::Task, &[note.to_string()])
    }

    /// Tag a process with its command name.
    pub fn process_name(&mut self, time: u64, process: &str, name: &str) -> Result<(), TraceError> {
        self.check_time(time)?;
        let process = self.registry.register(process)?;
        self.tag(time, process, EntityType::Task, &[format!("COMM:{name}")])
    }

    /// Tag a process with its PID and parent PID.
    pub fn process_creation(
        &mut self,
        time: u64,
        process: &str,
        pid: u64,
        ppid: u64,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        let process = self.registry.register(process)?;
        self.tag(
            time,
            process,
            EntityType::Task,
            &[format!("PID:{pid}"), format!("PPID:{ppid}")],
        )
    }

    /// Tag a thread with its command name.
    pub fn thread_name(&mut self, time: u64, thread: &str, name: &str) -> Result<(), TraceError> {
        self.check_time(time)?;
        let thread = self.registry.register(thread)?;
        self.tag(time, thread, EntityType::Thread, &[format!("COMM:{name}")])
    }

    /// Tag a thread with its TID and owning PID.
    pub fn thread_creation(
        &mut self,
        time: u64,
        thread: &str,
        tid: u64,
        pid: u64,
    ) -> Result<(), TraceError> {
        self.check_time(time)?;
        let thread = self.registry.register(thread)?;
        self.tag(
            time,
            thread,
            EntityType::Thread,
            &[format!("TID:{tid}"), format!("PID:{pid}")],
        )
    }

    /// Append a record built elsewhere, validating it like any emission.
    ///
    /// Every referenced hash must already be in the dictionary and the time
    /// must be a whole number of the file's time unit. Core and semaphore
    /// records must be legal in the current state of their target.
    pub fn append(&mut self, entry: BtfEntry) -> Result<(), TraceError> {
        if let Some(last) = self.last_time() {
            if entry.time < last {
                return Err(TraceError::OutOfOrderTime {
                    time: entry.time,
                    last,
                });
            }
        }
        if entry.time.ticks() % self.time_scale.ticks_per_unit() != 0 {
            return Err(TraceError::SubUnitTime {
                time: entry.time,
                scale: self.time_scale,
            });
        }
        entry.event.check_for(entry.entity_type)?;
        for hash in entry.hashes() {
            self.registry.resolve(hash)?;
        }
        self.check_resource(&entry)?;
        if entry.event == EntryEvent::Trigger {
            self.stimulus_instances
                .insert(entry.target, entry.target_instance);
        }
        self.push(entry);
        Ok(())
    }

    fn check_resource(&self, entry: &BtfEntry) -> Result<(), TraceError> {
        if entry.event.is_self_sourced() && entry.source != entry.target {
            return Err(TraceError::SourceMismatch {
                issuer: self.name_of(entry.source),
                target: self.name_of(entry.target),
                event: entry.event.to_string(),
            });
        }
        if entry.event.is_process_sourced() {
            if let Some(registered) = self.registry.entity_type(entry.source) {
                if !registered.is_process() {
                    return Err(TraceError::TypeMismatch {
                        name: self.name_of(entry.source),
                        registered,
                        requested: EntityType::Task,
                    });
                }
            }
        }

        match entry.event {
            EntryEvent::Core(event) => {
                if event == CoreEvent::Idle {
                    if let Some((process, _)) = self.running_on(entry.target) {
                        return Err(TraceError::CoreBusy {
                            core: self.name_of(entry.target),
                            process: self.name_of(process),
                        });
                    }
                }
                core_table().next_state(&self.core_state(entry.target), &event)?;
            }
            EntryEvent::Semaphore(event) => {
                let count = entry.note.as_deref().unwrap_or("");
                let accepted = count
                    .trim()
                    .parse::<u64>()
                    .map_or(false, |n| event.accepts_accesses(n));
                if !accepted {
                    return Err(TraceError::InvalidAccessCount {
                        event: event.to_string(),
                        count: count.to_string(),
                    });
                }
                if event.is_state_event() {
                    semaphore_table().next_state(&self.semaphore_state(entry.target), &event)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Register `name` as the issuer of a process-sourced record.
    pub(super) fn process_source(&mut self, name: &str) -> Result<IdHash, TraceError> {
        let hash = self.registry.register(name)?;
        self.ensure_process(hash, EntityType::Task)?;
        Ok(hash)
    }

    /// Display name of `hash` for error messages.
    pub(super) fn name_of(&self, hash: IdHash) -> String {
        self.registry
            .resolve(hash)
            .map_or_else(|_| hash.to_string(), str::to_string)
    }

    fn core_running(&self, process: IdHash, instance: u64) -> Option<IdHash> {
        self.cores
            .iter()
            .find(|(_, slot)| slot.running == Some((process, instance)))
            .map(|(core, _)| *core)
    }

    /// Track core occupancy and resource states from an accepted record.
    fn observe(&mut self, entry: &BtfEntry) {
        let process = (entry.target, entry.target_instance);
        match entry.event {
            EntryEvent::Lifecycle(event) if entry.entity_type.is_process() => {
                if event.deallocates_core() {
                    for slot in self.cores.values_mut() {
                        if slot.running == Some(process) {
                            slot.running = None;
                        }
                    }
                } else if event.allocates_core()
                    && self.registry.entity_type(entry.source) == Some(EntityType::Core)
                {
                    self.cores
                        .entry(entry.source)
                        .or_insert_with(CoreSlot::new)
                        .running = Some(process);
                }
            }
            EntryEvent::Migration { destination } => {
                let moved = self
                    .cores
                    .get_mut(&entry.source)
                    .filter(|slot| slot.running == Some(process))
                    .map(|slot| slot.running = None)
                    .is_some();
                if moved {
                    self.cores
                        .entry(destination)
                        .or_insert_with(CoreSlot::new)
                        .running = Some(process);
                }
            }
            EntryEvent::Core(event) => {
                let slot = self.cores.entry(entry.target).or_insert_with(CoreSlot::new);
                if let Err(error) = slot.machine.apply(event) {
                    warn!(%error, "core record out of step with core state");
                }
            }
            EntryEvent::Semaphore(event) if event.is_state_event() => {
                let machine = self.semaphores.entry(entry.target).or_insert_with(|| {
                    Machine::without_history(semaphore_table(), SemaphoreState::Unknown)
                });
                if let Err(error) = machine.apply(event) {
                    warn!(%error, "semaphore record out of step with semaphore state");
                }
            }
            _ => {}
        }
    }

    fn tag(
        &mut self,
        time: u64,
        process: IdHash,
        default_type: EntityType,
        notes: &[String],
    ) -> Result<(), TraceError> {
        let time = self.check_time(time)?;
        self.ensure_process(process, default_type)?;
        let sim = self
            .registry
            .register_typed(SIMULATION_TARGET, EntityType::Simulation)?;

        for note in notes {
            self.push(BtfEntry {
                time,
                entity_type: EntityType::Simulation,
                source: process,
                source_instance: 0,
                target: sim,
                target_instance: 0,
                event: EntryEvent::Tag,
                note: Some(note.clone()),
            });
        }
        Ok(())
    }

    /// Require `hash` to name a task, ISR or thread; untyped names get `default_type`.
    fn ensure_process(&mut self, hash: IdHash, default_type: EntityType) -> Result<(), TraceError> {
        match self.registry.entity_type(hash) {
            Some(t) if t.is_process() => {
                self.registry.resolve(hash)?;
                Ok(())
            }
            _ => self.registry.ensure_type(hash, default_type),
        }
    }

    fn push(&mut self, entry: BtfEntry) {
        debug!(
            time = entry.time.ticks(),
            entity_type = %entry.entity_type,
            event = %entry.event,
            "record appended"
        );
        self.observe(&entry);
        self.per_entity
            .entry(entry.subject())
            .or_default()
            .push(self.entries.len());
        self.entries.push(entry);
    }
}

fn core_record(time: Tick, core: IdHash, event: CoreEvent) -> BtfEntry {
    BtfEntry {
        time,
        entity_type: EntityType::Core,
        source: core,
        source_instance: 0,
        target: core,
        target_instance: 0,
        event: EntryEvent::Core(event),
        note: None,
    }
}
