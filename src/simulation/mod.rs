//! The simulation orchestrator.
//!
//! A [`Simulation`] owns the entity population and the trace file of one
//! session and drives both from an ordered stream of [`Stimulus`] values.
//! Each stimulus is validated in full before anything is committed; a
//! rejected stimulus leaves every entity and the trace untouched.

mod config;
mod report;

pub use config::SimulationConfig;
pub use report::{SessionReport, StimulusFailure};

use crate::builder::SimulationBuilder;
use crate::core::{process_table, runnable_table, LifecycleEvent, LifecycleState};
use crate::entity::{EntityArena, EntityId, Process, Runnable};
use crate::error::TraceError;
use crate::stimulus::{EntityKey, Stimulus};
use crate::trace::{BtfFile, EntityType, EntryEvent};
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

type Checked = Validation<(), NonEmptyVec<TraceError>>;

fn check<T>(result: Result<T, TraceError>) -> Checked {
    match result {
        Ok(_) => Validation::success(()),
        Err(err) => Validation::fail(err),
    }
}

/// Where a stimulus lands, resolved without creating anything.
struct ResolvedTarget {
    existing: Option<EntityId>,
    /// Process whose name sources the runnable records.
    root: EntityKey,
}

/// One trace-generation session.
///
/// # Example
///
/// ```rust
/// use btf_trace::core::{LifecycleEvent, LifecycleState};
/// use btf_trace::builder::StimulusBuilder;
/// use btf_trace::simulation::Simulation;
/// use btf_trace::stimulus::EntityKey;
///
/// let mut sim = Simulation::builder().build();
/// let task = EntityKey::task("taskA", 0);
///
/// let activate = StimulusBuilder::new()
///     .name("tick")
///     .at(10)
///     .target(task.clone())
///     .event(LifecycleEvent::Activate)
///     .build()
///     .unwrap();
/// let start = StimulusBuilder::new()
///     .name("dispatch")
///     .at(20)
///     .source("core0")
///     .target(task.clone())
///     .event(LifecycleEvent::Start)
///     .build()
///     .unwrap();
///
/// let report = sim.run([activate, start]).unwrap();
/// assert!(report.is_clean());
/// assert_eq!(sim.state_of(&task), Some(LifecycleState::Running));
///
/// let file = sim.finish();
/// assert_eq!(file.len(), 3); // trigger, activate, start
/// ```
#[derive(Debug)]
pub struct Simulation {
    id: Uuid,
    config: SimulationConfig,
    arena: EntityArena,
    file: BtfFile,
    seen: usize,
    terminated: bool,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let file = BtfFile::new(config.time_scale);
        Self::with_file(config, file)
    }

    /// Start a session that appends to `file`.
    ///
    /// The file keeps its own time scale; `config.time_scale` is ignored.
    pub fn with_file(mut config: SimulationConfig, mut file: BtfFile) -> Self {
        config.time_scale = file.time_scale();
        file.set_core_events(config.generate_core_events);
        let id = Uuid::new_v4();
        info!(session = %id, time_scale = %config.time_scale, strict = config.strict, "session started");
        let arena = if config.record_history {
            EntityArena::new()
        } else {
            EntityArena::without_history()
        };
        Self {
            id,
            config,
            arena,
            file,
            seen: 0,
            terminated: false,
        }
    }

    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn arena(&self) -> &EntityArena {
        &self.arena
    }

    pub fn file(&self) -> &BtfFile {
        &self.file
    }

    /// True once a strict session rejected a stimulus. Every later stimulus
    /// fails with [`TraceError::SessionTerminated`].
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Add a task, ISR or thread. Adding an existing key is a no-op.
    pub fn add_process(&mut self, key: EntityKey) -> Result<EntityId, TraceError> {
        if let Some(id) = self.arena.find(&key) {
            return Ok(id);
        }
        if key.tag.is_process() {
            self.file
                .registry_mut()
                .register_typed(&key.name, key.tag.entity_type())?;
        }
        self.arena.insert_process(key)
    }

    /// Add a runnable owned by the existing entity `parent`.
    pub fn add_runnable(&mut self, key: EntityKey, parent: &EntityKey) -> Result<EntityId, TraceError> {
        if let Some(id) = self.arena.find(&key) {
            return Ok(id);
        }
        let parent = self
            .arena
            .find(parent)
            .ok_or_else(|| TraceError::UnknownEntity(parent.to_string()))?;
        if !key.tag.is_process() {
            self.file
                .registry_mut()
                .register_typed(&key.name, EntityType::Runnable)?;
        }
        self.arena.insert_runnable(key, parent)
    }

    pub fn state_of(&self, key: &EntityKey) -> Option<LifecycleState> {
        self.arena
            .find(key)
            .and_then(|id| self.arena.get(id))
            .map(|node| node.body.state())
    }

    pub fn process(&self, key: &EntityKey) -> Option<&Process> {
        self.arena.find(key).and_then(|id| self.arena.process(id))
    }

    pub fn runnable(&self, key: &EntityKey) -> Option<&Runnable> {
        self.arena.find(key).and_then(|id| self.arena.runnable(id))
    }

    /// Apply one stimulus. Returns the number of records appended.
    ///
    /// In a strict session the first rejection terminates the session.
    pub fn apply(&mut self, stimulus: Stimulus) -> Result<usize, StimulusFailure> {
        let index = self.seen;
        self.seen += 1;

        let failure = |violations: Vec<TraceError>| StimulusFailure {
            index,
            stimulus: stimulus.name.clone(),
            target: stimulus.target.clone(),
            violations,
        };

        if self.terminated {
            let failure = failure(vec![TraceError::SessionTerminated]);
            debug!(error = %failure, "stimulus after termination");
            return Err(failure);
        }

        if let Validation::Failure(errors) = self.preflight(&stimulus) {
            let failure = failure(errors.iter().cloned().collect());
            warn!(error = %failure, "stimulus rejected");
            return Err(self.reject(failure));
        }

        let before = self.file.len();
        if let Err(err) = self.commit(&stimulus) {
            let failure = failure(vec![err]);
            warn!(error = %failure, "stimulus failed after validation");
            return Err(self.reject(failure));
        }
        Ok(self.file.len() - before)
    }

    fn reject(&mut self, failure: StimulusFailure) -> StimulusFailure {
        if self.config.strict {
            self.terminated = true;
            warn!(session = %self.id, index = failure.index, "strict session terminated");
        }
        failure
    }

    /// Apply stimuli in order.
    ///
    /// Rejections are collected in the report and the session continues,
    /// unless the session is strict: then the first rejection is returned
    /// and the session accepts nothing more.
    #[instrument(skip_all, fields(session = %self.id))]
    pub fn run<I>(&mut self, stimuli: I) -> Result<SessionReport, StimulusFailure>
    where
        I: IntoIterator<Item = Stimulus>,
    {
        let mut report = SessionReport::default();
        for stimulus in stimuli {
            match self.apply(stimulus) {
                Ok(records) => {
                    report.applied += 1;
                    report.records += records;
                }
                Err(failure) if self.config.strict => return Err(failure),
                Err(failure) => {
                    report.rejected += 1;
                    report.failures.push(failure);
                }
            }
        }
        info!(
            applied = report.applied,
            rejected = report.rejected,
            records = report.records,
            "stimuli processed"
        );
        Ok(report)
    }

    /// End the session and hand over the trace.
    pub fn finish(self) -> BtfFile {
        info!(session = %self.id, records = self.file.len(), "session finished");
        self.file
    }

    fn resolve_target(&self, stimulus: &Stimulus) -> Result<ResolvedTarget, TraceError> {
        let target = &stimulus.target;
        if let Some(id) = self.arena.find(target) {
            let root = self.arena.root(id);
            let root = self
                .arena
                .get(root)
                .map(|node| node.key.clone())
                .ok_or_else(|| TraceError::UnknownEntity(target.to_string()))?;
            return Ok(ResolvedTarget {
                existing: Some(id),
                root,
            });
        }
        if target.tag.is_process() {
            return Ok(ResolvedTarget {
                existing: None,
                root: target.clone(),
            });
        }

        let parent = stimulus
            .parent
            .as_ref()
            .ok_or_else(|| TraceError::UnknownEntity(target.to_string()))?;
        let root = match self.arena.find(parent) {
            Some(id) => self
                .arena
                .get(self.arena.root(id))
                .map(|node| node.key.clone())
                .ok_or_else(|| TraceError::UnknownEntity(parent.to_string()))?,
            None if parent.tag.is_process() => parent.clone(),
            None => return Err(TraceError::UnknownEntity(parent.to_string())),
        };
        Ok(ResolvedTarget {
            existing: None,
            root,
        })
    }

    /// Validate a stimulus against the current session without changing it.
    ///
    /// Every independent problem is reported; event checks stop at the first
    /// illegal event since later states are unknown.
    fn preflight(&self, stimulus: &Stimulus) -> Checked {
        let target = &stimulus.target;
        let mut claims = vec![(target.name.clone(), target.tag.entity_type())];
        let mut checks: Vec<Checked> = vec![check(self.file.check_time(stimulus.time))];

        if stimulus.fires_trigger() {
            claims.push((stimulus.name.clone(), EntityType::Stimulus));
        }

        match self.resolve_target(stimulus) {
            Ok(resolved) => {
                if resolved.root != *target {
                    claims.push((resolved.root.name.clone(), resolved.root.tag.entity_type()));
                }
                checks.extend(self.check_sources(stimulus, &mut claims));
                checks.push(self.check_events(stimulus, &resolved));
            }
            Err(err) => checks.push(Validation::fail(err)),
        }

        checks.extend(self.check_claims(&claims));
        Validation::all_vec(checks).map(|_| ())
    }

    /// Every name a stimulus would register must keep one type, both against
    /// the dictionary and against the other names of the same stimulus.
    fn check_claims(&self, claims: &[(String, EntityType)]) -> Vec<Checked> {
        let registry = self.file.registry();
        claims
            .iter()
            .enumerate()
            .map(|(i, (name, entity_type))| {
                let earlier = claims[..i]
                    .iter()
                    .find(|(other, t)| other == name && t != entity_type);
                match earlier {
                    Some((_, registered)) => Validation::fail(TraceError::TypeMismatch {
                        name: name.clone(),
                        registered: *registered,
                        requested: *entity_type,
                    }),
                    None => check(registry.check_typed(name, *entity_type)),
                }
            })
            .collect()
    }

    fn check_sources(&self, stimulus: &Stimulus, claims: &mut Vec<(String, EntityType)>) -> Vec<Checked> {
        let target = &stimulus.target;
        if !target.tag.is_process() {
            return Vec::new();
        }
        let mut checks = Vec::new();

        let mut needed: Vec<(EntityType, LifecycleEvent)> = Vec::new();
        for &event in &stimulus.events {
            let source_type = if event.is_migration() {
                EntityType::Core
            } else {
                EntityType::source_of(event)
            };
            if source_type != EntityType::Stimulus && !needed.iter().any(|(t, _)| *t == source_type) {
                needed.push((source_type, event));
            }
        }

        if let Some(&(first_type, first_event)) = needed.first() {
            match stimulus.source.as_deref() {
                None => checks.push(Validation::fail(TraceError::MissingSource {
                    target: target.name.clone(),
                    event: first_event.to_string(),
                })),
                Some(source) => {
                    claims.push((source.to_string(), first_type));
                    if let Some(&(other, _)) = needed.get(1) {
                        checks.push(Validation::fail(TraceError::TypeMismatch {
                            name: source.to_string(),
                            registered: first_type,
                            requested: other,
                        }));
                    }
                }
            }
        }

        if let Some(migration) = stimulus.events.iter().find(|ev| ev.is_migration()) {
            if target.tag.entity_type() != EntityType::Task {
                checks.push(Validation::fail(TraceError::InvalidEvent {
                    event: migration.to_string(),
                    entity_type: target.tag.entity_type(),
                }));
            }
            match stimulus.destination.as_deref() {
                None => checks.push(Validation::fail(TraceError::MissingMigrationDestination {
                    task: target.name.clone(),
                })),
                Some(destination) => claims.push((destination.to_string(), EntityType::Core)),
            }
        }
        checks
    }

    /// Walk the event sequence on the target's current state.
    fn check_events(&self, stimulus: &Stimulus, resolved: &ResolvedTarget) -> Checked {
        let is_process = stimulus.target.tag.is_process();
        let entity_type = stimulus.target.tag.entity_type();
        let table = if is_process {
            process_table()
        } else {
            runnable_table()
        };

        let mut state = resolved
            .existing
            .and_then(|id| self.arena.get(id))
            .map(|node| node.body.state())
            .unwrap_or(LifecycleState::Unknown);
        let descendants = resolved
            .existing
            .map(|id| self.arena.descendants(id))
            .unwrap_or_default();
        let mut overrides: HashMap<EntityKey, LifecycleState> = HashMap::new();
        let mut parked: HashSet<EntityId> = descendants
            .iter()
            .copied()
            .filter(|d| self.arena.runnable(*d).is_some_and(Runnable::suspended_by_parent))
            .collect();

        for &event in &stimulus.events {
            if self.skips_release(state, event) {
                continue;
            }

            if !(is_process && event.is_migration()) {
                if let Err(err) = EntryEvent::Lifecycle(event).check_for(entity_type) {
                    return Validation::fail(err);
                }
            }

            let next = match table.next_state(&state, &event) {
                Ok(next) => next,
                Err(err) => return Validation::fail(err.into()),
            };

            if next == LifecycleState::Terminated {
                if let Some(id) = resolved.existing {
                    let blocked = self.arena.check_terminate_with(id, |node| {
                        overrides
                            .get(&node.key)
                            .copied()
                            .unwrap_or_else(|| node.body.state())
                    });
                    if let Err(violation) = blocked {
                        return Validation::fail(violation.into());
                    }
                }
            }
            state = next;

            if is_process && self.config.auto_suspend_runnables {
                if event.deallocates_core() {
                    for &d in &descendants {
                        let Some(node) = self.arena.get(d) else { continue };
                        let current = overrides
                            .get(&node.key)
                            .copied()
                            .unwrap_or_else(|| node.body.state());
                        if current == LifecycleState::Running {
                            overrides.insert(node.key.clone(), LifecycleState::Active);
                            parked.insert(d);
                        }
                    }
                } else if event.allocates_core() {
                    for d in parked.drain() {
                        if let Some(node) = self.arena.get(d) {
                            overrides.insert(node.key.clone(), LifecycleState::Running);
                        }
                    }
                }
            }
        }
        Validation::success(())
    }

    fn skips_release(&self, state: LifecycleState, event: LifecycleEvent) -> bool {
        self.config.ignore_repeated_release
            && event == LifecycleEvent::Release
            && state == LifecycleState::Ready
    }

    fn ensure_target(&mut self, stimulus: &Stimulus) -> Result<EntityId, TraceError> {
        let target = &stimulus.target;
        if let Some(id) = self.arena.find(target) {
            return Ok(id);
        }
        if target.tag.is_process() {
            return self.add_process(target.clone());
        }
        let parent = stimulus
            .parent
            .as_ref()
            .ok_or_else(|| TraceError::UnknownEntity(target.to_string()))?;
        if self.arena.find(parent).is_none() {
            if !parent.tag.is_process() {
                return Err(TraceError::UnknownEntity(parent.to_string()));
            }
            self.add_process(parent.clone())?;
        }
        self.add_runnable(target.clone(), parent)
    }

    fn commit(&mut self, stimulus: &Stimulus) -> Result<(), TraceError> {
        let id = self.ensure_target(stimulus)?;
        let time = stimulus.time;
        let target = &stimulus.target;

        if stimulus.fires_trigger() {
            self.file.stimulus_event(time, &stimulus.name)?;
        }

        for &event in &stimulus.events {
            let state = self
                .arena
                .get(id)
                .map(|node| node.body.state())
                .unwrap_or(LifecycleState::Unknown);
            if self.skips_release(state, event) {
                debug!(target = %target, "repeated release ignored");
                continue;
            }

            if !target.tag.is_process() {
                self.commit_runnable_event(id, time, event)?;
                continue;
            }

            let source = match EntityType::source_of(event) {
                EntityType::Stimulus if !event.is_migration() => stimulus.name.as_str(),
                _ => stimulus.source.as_deref().ok_or_else(|| TraceError::MissingSource {
                    target: target.name.clone(),
                    event: event.to_string(),
                })?,
            };

            if event.is_migration() {
                let destination = stimulus.destination.as_deref().ok_or_else(|| {
                    TraceError::MissingMigrationDestination {
                        task: target.name.clone(),
                    }
                })?;
                self.arena.transition(id, event)?;
                self.file.task_migration_event(
                    time,
                    source,
                    destination,
                    &target.name,
                    target.instance,
                )?;
                continue;
            }

            if self.config.auto_suspend_runnables && event.deallocates_core() {
                self.suspend_runnables(id, time)?;
            }

            self.arena.transition(id, event)?;
            if let Some(process) = self.arena.process_mut(id) {
                match event {
                    LifecycleEvent::Wait => process.set_wait_os_event(true),
                    LifecycleEvent::Release | LifecycleEvent::NoWait => {
                        process.set_wait_os_event(false)
                    }
                    _ => {}
                }
            }
            self.file.process_event(
                time,
                target.tag.entity_type(),
                source,
                &target.name,
                target.instance,
                event,
            )?;

            if self.config.auto_suspend_runnables && event.allocates_core() {
                self.resume_runnables(id, time)?;
            }
        }
        Ok(())
    }

    fn commit_runnable_event(&mut self, id: EntityId, time: u64, event: LifecycleEvent) -> Result<(), TraceError> {
        self.arena.transition(id, event)?;
        if matches!(event, LifecycleEvent::Resume | LifecycleEvent::Terminate) {
            if let Some(runnable) = self.arena.runnable_mut(id) {
                runnable.set_suspended_by_parent(false);
            }
        }
        self.record_runnable_event(id, time, event)
    }

    fn record_runnable_event(&mut self, id: EntityId, time: u64, event: LifecycleEvent) -> Result<(), TraceError> {
        let runnable = self
            .arena
            .get(id)
            .map(|node| node.key.clone())
            .ok_or_else(|| TraceError::UnknownEntity(format!("#{}", id.index())))?;
        let root = self.arena.root(id);
        let process = self
            .arena
            .get(root)
            .map(|node| node.key.clone())
            .ok_or_else(|| TraceError::UnknownEntity(format!("#{}", root.index())))?;
        self.file.runnable_event(
            time,
            &process.name,
            process.instance,
            &runnable.name,
            runnable.instance,
            event,
        )
    }

    /// Suspend running descendants of `process`, innermost first.
    fn suspend_runnables(&mut self, process: EntityId, time: u64) -> Result<(), TraceError> {
        for d in self.arena.descendants(process).into_iter().rev() {
            if self.arena.runnable(d).is_some_and(Runnable::is_running) {
                self.arena.transition(d, LifecycleEvent::Suspend)?;
                if let Some(runnable) = self.arena.runnable_mut(d) {
                    runnable.set_suspended_by_parent(true);
                }
                self.record_runnable_event(d, time, LifecycleEvent::Suspend)?;
            }
        }
        Ok(())
    }

    /// Resume descendants suspended by [`Simulation::suspend_runnables`], outermost first.
    fn resume_runnables(&mut self, process: EntityId, time: u64) -> Result<(), TraceError> {
        for d in self.arena.descendants(process) {
            if self.arena.runnable(d).is_some_and(Runnable::suspended_by_parent) {
                self.arena.transition(d, LifecycleEvent::Resume)?;
                if let Some(runnable) = self.arena.runnable_mut(d) {
                    runnable.set_suspended_by_parent(false);
                }
                self.record_runnable_event(d, time, LifecycleEvent::Resume)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StimulusBuilder;
    use LifecycleEvent as E;
    use LifecycleState as S;

    fn on_core(time: u64, target: EntityKey, events: &[E]) -> Stimulus {
        StimulusBuilder::new()
            .name("stim")
            .at(time)
            .source("core0")
            .target(target)
            .events(events.iter().copied())
            .build()
            .unwrap()
    }

    fn runnable_stimulus(time: u64, runnable: &str, parent: EntityKey, events: &[E]) -> Stimulus {
        StimulusBuilder::new()
            .name("stim")
            .at(time)
            .target(EntityKey::runnable(runnable, 0))
            .parent(parent)
            .events(events.iter().copied())
            .build()
            .unwrap()
    }

    fn running_task(sim: &mut Simulation, task: &EntityKey) {
        sim.apply(on_core(0, task.clone(), &[E::Activate, E::Start]))
            .unwrap();
    }

    #[test]
    fn stimulus_is_all_or_nothing() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);
        let records = sim.file().len();

        let failure = sim
            .apply(on_core(5, task.clone(), &[E::Preempt, E::Wait]))
            .unwrap_err();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.codes(), vec!["invalid_state_transition"]);
        assert_eq!(sim.state_of(&task), Some(S::Running));
        assert_eq!(sim.file().len(), records);
    }

    #[test]
    fn preflight_reports_every_independent_problem() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);
        sim.apply(on_core(10, task.clone(), &[E::Preempt])).unwrap();

        let mut late = on_core(3, task.clone(), &[E::Wait]);
        late.source = None;
        let failure = sim.apply(late).unwrap_err();
        assert_eq!(
            failure.codes(),
            vec!["descending_timestamp", "missing_source", "invalid_state_transition"]
        );
    }

    #[test]
    fn records_use_stimulus_core_and_scheduler_sources() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);
        sim.apply(
            StimulusBuilder::new()
                .name("irq")
                .at(4)
                .source("sched")
                .target(task.clone())
                .event(E::InterruptSuspended)
                .build()
                .unwrap(),
        )
        .unwrap();

        let file = sim.finish();
        let lines: Vec<_> = file
            .entries()
            .iter()
            .map(|e| file.render_entry(e).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                "0,stim,0,STI,stim,0,trigger",
                "0,stim,0,T,taskA,0,activate",
                "0,core0,0,T,taskA,0,start",
                "4,sched,0,T,taskA,0,interrupt_suspended",
            ]
        );
    }

    #[test]
    fn one_source_cannot_be_core_and_scheduler() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);

        let failure = sim
            .apply(on_core(1, task.clone(), &[E::InterruptSuspended, E::Start]))
            .unwrap_err();
        assert!(failure.codes().contains(&"invalid_type"));
    }

    #[test]
    fn one_name_cannot_be_stimulus_and_task() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        let mut clash = on_core(0, task.clone(), &[E::Activate]);
        clash.name = "taskA".to_string();

        let failure = sim.apply(clash).unwrap_err();
        assert_eq!(failure.codes(), vec!["invalid_type"]);
        assert!(sim.arena().is_empty());
        assert!(sim.file().registry().is_empty());
    }

    #[test]
    fn wait_flag_follows_wait_and_release() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);

        sim.apply(on_core(1, task.clone(), &[E::Wait])).unwrap();
        assert!(sim.process(&task).unwrap().wait_os_event());

        sim.apply(on_core(2, task.clone(), &[E::Release])).unwrap();
        assert!(!sim.process(&task).unwrap().wait_os_event());
    }

    #[test]
    fn repeated_release_is_ignored_when_configured() {
        let config = SimulationConfig {
            ignore_repeated_release: true,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config);
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);

        let records = sim
            .apply(on_core(1, task.clone(), &[E::Wait, E::Release, E::Release]))
            .unwrap();
        assert_eq!(records, 2);
        assert_eq!(sim.state_of(&task), Some(S::Ready));
    }

    #[test]
    fn runnable_is_created_under_its_parent() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 2);
        running_task(&mut sim, &task);

        sim.apply(runnable_stimulus(1, "r1", task.clone(), &[E::Start]))
            .unwrap();

        let file = sim.file();
        let last = file.entries().last().unwrap();
        assert_eq!(file.render_entry(last).unwrap(), "1,taskA,2,R,r1,0,start");
        assert_eq!(sim.state_of(&EntityKey::runnable("r1", 0)), Some(S::Running));
    }

    #[test]
    fn orphan_runnable_is_unknown_entity() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let stimulus = Stimulus {
            name: "stim".to_string(),
            time: 0,
            source: None,
            target: EntityKey::runnable("r1", 0),
            parent: None,
            events: vec![E::Start],
            destination: None,
        };
        let failure = sim.apply(stimulus).unwrap_err();
        assert_eq!(failure.codes(), vec!["unknown_entity"]);
        assert!(sim.arena().is_empty());
    }

    #[test]
    fn task_with_running_runnable_cannot_terminate() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);
        sim.apply(runnable_stimulus(1, "r1", task.clone(), &[E::Start]))
            .unwrap();

        let failure = sim
            .apply(on_core(2, task.clone(), &[E::Terminate]))
            .unwrap_err();
        assert_eq!(
            failure.codes(),
            vec!["terminate_on_task_with_running_runnables"]
        );

        sim.apply(runnable_stimulus(3, "r1", task.clone(), &[E::Terminate]))
            .unwrap();
        sim.apply(on_core(4, task.clone(), &[E::Terminate])).unwrap();
        assert!(sim.process(&task).unwrap().is_terminated());
    }

    #[test]
    fn auto_suspend_parks_and_resumes_runnables() {
        let config = SimulationConfig {
            auto_suspend_runnables: true,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config);
        let task = EntityKey::task("taskA", 0);
        let r1 = EntityKey::runnable("r1", 0);
        running_task(&mut sim, &task);
        sim.apply(runnable_stimulus(1, "r1", task.clone(), &[E::Start]))
            .unwrap();

        assert_eq!(sim.apply(on_core(2, task.clone(), &[E::Preempt])).unwrap(), 2);
        assert_eq!(sim.state_of(&r1), Some(S::Active));
        assert!(sim.runnable(&r1).unwrap().suspended_by_parent());

        assert_eq!(sim.apply(on_core(3, task.clone(), &[E::Resume])).unwrap(), 2);
        assert_eq!(sim.state_of(&r1), Some(S::Running));

        let failure = sim
            .apply(on_core(4, task.clone(), &[E::Preempt, E::Terminate]))
            .unwrap_err();
        assert_eq!(
            failure.codes(),
            vec!["terminate_on_task_with_running_runnables"]
        );
        assert_eq!(sim.state_of(&r1), Some(S::Running));
    }

    #[test]
    fn migration_keeps_state_and_needs_destination() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);
        sim.apply(on_core(1, task.clone(), &[E::Preempt])).unwrap();

        let migrate = StimulusBuilder::new()
            .name("balance")
            .at(2)
            .source("core0")
            .target(task.clone())
            .event(E::FullMigration)
            .destination("core1")
            .build()
            .unwrap();
        let mut adrift = migrate.clone();
        adrift.destination = None;
        assert_eq!(
            sim.apply(adrift).unwrap_err().codes(),
            vec!["missing_migration_destination"]
        );

        assert_eq!(sim.apply(migrate).unwrap(), 1);
        assert_eq!(sim.state_of(&task), Some(S::Ready));
        assert!(sim.file().entries().last().unwrap().is_migration());
    }

    #[test]
    fn strict_mode_stops_at_first_failure() {
        let config = SimulationConfig {
            strict: true,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config);
        let task = EntityKey::task("taskA", 0);

        let result = sim.run([
            on_core(0, task.clone(), &[E::Start]),
            on_core(1, task.clone(), &[E::Activate]),
        ]);
        let failure = result.unwrap_err();
        assert_eq!(failure.index, 0);
        assert_eq!(sim.state_of(&task), None);
        assert!(sim.is_terminated());
    }

    #[test]
    fn strict_session_refuses_everything_after_a_failure() {
        let mut sim = Simulation::builder().strict(true).build();
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);
        let records = sim.file().len();

        sim.apply(on_core(1, task.clone(), &[E::Activate]))
            .unwrap_err();
        assert!(sim.is_terminated());

        let failure = sim
            .apply(on_core(2, task.clone(), &[E::Preempt]))
            .unwrap_err();
        assert_eq!(failure.index, 2);
        assert_eq!(failure.codes(), vec!["session_terminated"]);
        assert_eq!(sim.state_of(&task), Some(S::Running));
        assert_eq!(sim.file().len(), records);

        let report = sim.run([on_core(3, task.clone(), &[E::Preempt])]);
        assert_eq!(report.unwrap_err().codes(), vec!["session_terminated"]);
    }

    #[test]
    fn lenient_session_is_never_terminated() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);
        sim.apply(on_core(0, task.clone(), &[E::Start])).unwrap_err();

        assert!(!sim.is_terminated());
        assert!(sim.apply(on_core(1, task.clone(), &[E::Activate])).is_ok());
    }

    #[test]
    fn budget_overrun_cannot_kill_a_task_with_running_runnable() {
        for auto_suspend in [false, true] {
            let config = SimulationConfig {
                auto_suspend_runnables: auto_suspend,
                ..SimulationConfig::default()
            };
            let mut sim = Simulation::new(config);
            let task = EntityKey::task("taskA", 0);
            let r1 = EntityKey::runnable("r1", 0);
            running_task(&mut sim, &task);
            sim.apply(runnable_stimulus(1, "r1", task.clone(), &[E::Start]))
                .unwrap();
            let records = sim.file().len();

            let failure = sim
                .apply(on_core(2, task.clone(), &[E::MtaLimitExceeded]))
                .unwrap_err();
            assert_eq!(
                failure.codes(),
                vec!["terminate_on_task_with_running_runnables"],
                "auto_suspend = {auto_suspend}"
            );
            assert_eq!(sim.state_of(&task), Some(S::Running));
            assert_eq!(sim.state_of(&r1), Some(S::Running));
            assert_eq!(sim.file().len(), records);
        }
    }

    #[test]
    fn history_can_be_switched_off() {
        let config = SimulationConfig {
            record_history: false,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config);
        let task = EntityKey::task("taskA", 0);
        running_task(&mut sim, &task);
        sim.apply(on_core(1, task.clone(), &[E::Preempt])).unwrap();

        let process = sim.process(&task).unwrap();
        assert_eq!(process.state(), S::Ready);
        assert!(process.was_started());
        assert!(process.history().is_empty());
    }

    #[test]
    fn core_records_accompany_dispatch_when_enabled() {
        let config = SimulationConfig {
            generate_core_events: true,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config);
        let task = EntityKey::task("taskA", 0);

        assert_eq!(
            sim.apply(on_core(0, task.clone(), &[E::Activate, E::Start])).unwrap(),
            4
        );
        assert_eq!(sim.apply(on_core(1, task.clone(), &[E::Preempt])).unwrap(), 2);

        let file = sim.finish();
        let lines: Vec<_> = file
            .entries()
            .iter()
            .map(|e| file.render_entry(e).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                "0,stim,0,STI,stim,0,trigger",
                "0,stim,0,T,taskA,0,activate",
                "0,core0,0,C,core0,0,execute",
                "0,core0,0,T,taskA,0,start",
                "1,core0,0,T,taskA,0,preempt",
                "1,core0,0,C,core0,0,idle",
            ]
        );
    }

    #[test]
    fn lenient_mode_reports_and_continues() {
        let mut sim = Simulation::new(SimulationConfig::default());
        let task = EntityKey::task("taskA", 0);

        let report = sim
            .run([
                on_core(0, task.clone(), &[E::Start]),
                on_core(1, task.clone(), &[E::Activate]),
            ])
            .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.records, 2);
        assert_eq!(sim.state_of(&task), Some(S::Ready));
    }
}
