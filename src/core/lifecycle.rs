//! Shared lifecycle taxonomy and the process/runnable transition tables.

use super::state::{Event, State};
use super::table::{FromState, ToState, TransitionTable};
use std::sync::LazyLock;

crate::btf_enum! {
    /// Lifecycle states shared by processes and runnables.
    ///
    /// `Unknown` is the initial state and doubles as the "no observation yet"
    /// sentinel. `Terminated` is terminal for every entity kind.
    pub enum LifecycleState {
        Unknown => "unknown",
        Ready => "ready",
        Running => "running",
        Waiting => "waiting",
        Polling => "polling",
        Parking => "parking",
        /// For runnables: called, but suspended because its process left the core.
        Active => "active",
        Terminated => "terminated",
    }
}

crate::btf_enum! {
    /// Lifecycle events, named as they appear in a BTF trace.
    pub enum LifecycleEvent {
        Activate => "activate",
        Start => "start",
        Preempt => "preempt",
        Resume => "resume",
        Terminate => "terminate",
        Poll => "poll",
        Run => "run",
        Park => "park",
        PollParking => "poll_parking",
        ReleaseParking => "release_parking",
        Wait => "wait",
        Release => "release",
        FullMigration => "fullmigration" | "full_migration",
        EnforcedMigration => "enforcedmigration" | "enforced_migration",
        InterruptSuspended => "interrupt_suspended",
        MtaLimitExceeded => "mtalimitexceeded",
        NoWait => "nowait",
        /// Runnable only: the calling process left the core.
        Suspend => "suspend",
        Unknown => "unknown",
    }
}

impl State for LifecycleState {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn is_final(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl Event for LifecycleEvent {
    fn name(&self) -> &str {
        self.as_str()
    }
}

impl LifecycleEvent {
    /// Core-reassignment events: they keep the lifecycle state and are
    /// recorded as migrations.
    pub fn is_migration(&self) -> bool {
        matches!(self, Self::FullMigration | Self::EnforcedMigration)
    }

    /// Events that put a process onto a core.
    pub fn allocates_core(&self) -> bool {
        matches!(self, Self::Start | Self::Resume | Self::Run)
    }

    /// Events that take a process off its core.
    pub fn deallocates_core(&self) -> bool {
        matches!(
            self,
            Self::Preempt
                | Self::Wait
                | Self::Park
                | Self::InterruptSuspended
                | Self::Terminate
                | Self::MtaLimitExceeded
        )
    }
}

static PROCESS_TABLE: LazyLock<TransitionTable<LifecycleState, LifecycleEvent>> =
    LazyLock::new(build_process_table);

static RUNNABLE_TABLE: LazyLock<TransitionTable<LifecycleState, LifecycleEvent>> =
    LazyLock::new(build_runnable_table);

/// Transition table for tasks, ISRs and threads.
pub fn process_table() -> &'static TransitionTable<LifecycleState, LifecycleEvent> {
    &PROCESS_TABLE
}

/// Transition table for runnables.
pub fn runnable_table() -> &'static TransitionTable<LifecycleState, LifecycleEvent> {
    &RUNNABLE_TABLE
}

fn build_process_table() -> TransitionTable<LifecycleState, LifecycleEvent> {
    use LifecycleEvent as E;
    use LifecycleState as S;

    let events = E::ALL
        .iter()
        .copied()
        .filter(|e| !matches!(e, E::Suspend))
        .collect();

    TransitionTable::new(
        "process",
        vec![
            S::Unknown,
            S::Ready,
            S::Running,
            S::Waiting,
            S::Polling,
            S::Parking,
            S::Terminated,
        ],
        events,
    )
    .rule(S::Unknown, E::Activate, S::Ready)
    .rule(S::Ready, E::Start, S::Running)
    .rule(S::Ready, E::Resume, S::Running)
    .rule(S::Running, E::Preempt, S::Ready)
    .rule(S::Running, E::Wait, S::Waiting)
    .rule(S::Waiting, E::Release, S::Ready)
    .rule(S::Waiting, E::NoWait, S::Ready)
    .rule(S::Running, E::Poll, S::Polling)
    .rule(S::Polling, E::PollParking, S::Parking)
    .rule(S::Parking, E::ReleaseParking, S::Polling)
    .rule(S::Polling, E::Resume, S::Running)
    .rule(S::Running, E::Park, S::Parking)
    .rule(S::Parking, E::Run, S::Running)
    .add(
        FromState::AnyOf(vec![S::Running, S::Waiting, S::Parking]),
        E::InterruptSuspended,
        ToState::To(S::Ready),
    )
    .rule(S::Running, E::MtaLimitExceeded, S::Terminated)
    .add(FromState::AnyLive, E::Terminate, ToState::To(S::Terminated))
    .add(FromState::AnyLive, E::FullMigration, ToState::Stay)
    .add(FromState::AnyLive, E::EnforcedMigration, ToState::Stay)
}

fn build_runnable_table() -> TransitionTable<LifecycleState, LifecycleEvent> {
    use LifecycleEvent as E;
    use LifecycleState as S;

    TransitionTable::new(
        "runnable",
        vec![S::Unknown, S::Running, S::Active, S::Terminated],
        vec![E::Start, E::Suspend, E::Resume, E::Terminate],
    )
    .rule(S::Unknown, E::Start, S::Running)
    .rule(S::Running, E::Suspend, S::Active)
    .rule(S::Active, E::Resume, S::Running)
    .rule(S::Running, E::Terminate, S::Terminated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use LifecycleState as S;

    #[test]
    fn process_table_follows_documented_lifecycle() {
        let table = process_table();
        let path = [
            (S::Unknown, E::Activate, S::Ready),
            (S::Ready, E::Start, S::Running),
            (S::Running, E::Poll, S::Polling),
            (S::Polling, E::PollParking, S::Parking),
            (S::Parking, E::ReleaseParking, S::Polling),
            (S::Polling, E::Resume, S::Running),
            (S::Running, E::Park, S::Parking),
            (S::Parking, E::Run, S::Running),
            (S::Running, E::Wait, S::Waiting),
            (S::Waiting, E::NoWait, S::Ready),
            (S::Ready, E::Resume, S::Running),
            (S::Running, E::MtaLimitExceeded, S::Terminated),
        ];

        for (from, event, to) in path {
            assert_eq!(table.next_state(&from, &event).unwrap(), to, "{from} --{event}-->");
        }
    }

    #[test]
    fn interrupt_suspended_returns_to_ready() {
        let table = process_table();
        for from in [S::Running, S::Waiting, S::Parking] {
            assert_eq!(
                table.next_state(&from, &E::InterruptSuspended).unwrap(),
                S::Ready
            );
        }
        assert!(!table.is_legal(&S::Ready, &E::InterruptSuspended));
    }

    #[test]
    fn terminated_process_rejects_everything() {
        assert!(process_table().legal_events(&S::Terminated).is_empty());
    }

    #[test]
    fn migrations_keep_process_state() {
        let table = process_table();
        for state in [S::Unknown, S::Ready, S::Running, S::Waiting, S::Polling, S::Parking] {
            assert_eq!(table.next_state(&state, &E::FullMigration).unwrap(), state);
            assert_eq!(table.next_state(&state, &E::EnforcedMigration).unwrap(), state);
        }
    }

    #[test]
    fn mtalimitexceeded_only_from_running() {
        let table = process_table();
        assert!(table.is_legal(&S::Running, &E::MtaLimitExceeded));
        assert!(!table.is_legal(&S::Waiting, &E::MtaLimitExceeded));
        assert!(!table.is_legal(&S::Ready, &E::MtaLimitExceeded));
    }

    #[test]
    fn process_table_rejects_runnable_events() {
        assert!(!process_table().is_legal(&S::Running, &E::Suspend));
        assert!(!process_table().is_legal(&S::Active, &E::Start));
    }

    #[test]
    fn runnable_table_covers_execution_events() {
        let table = runnable_table();
        assert_eq!(table.next_state(&S::Unknown, &E::Start).unwrap(), S::Running);
        assert_eq!(table.next_state(&S::Running, &E::Suspend).unwrap(), S::Active);
        assert_eq!(table.next_state(&S::Active, &E::Resume).unwrap(), S::Running);
        assert_eq!(
            table.next_state(&S::Running, &E::Terminate).unwrap(),
            S::Terminated
        );
        assert!(!table.is_legal(&S::Running, &E::Wait));
        assert!(!table.is_legal(&S::Terminated, &E::Start));
    }

    #[test]
    fn event_names_match_btf_spelling() {
        assert_eq!(E::FullMigration.as_str(), "fullmigration");
        assert_eq!(E::EnforcedMigration.as_str(), "enforcedmigration");
        assert_eq!("poll_parking".parse::<E>().unwrap(), E::PollParking);
    }

    #[test]
    fn migration_events_parse_in_both_spellings() {
        assert_eq!("fullmigration".parse::<E>().unwrap(), E::FullMigration);
        assert_eq!("full_migration".parse::<E>().unwrap(), E::FullMigration);
        assert_eq!("enforcedmigration".parse::<E>().unwrap(), E::EnforcedMigration);
        assert_eq!("enforced_migration".parse::<E>().unwrap(), E::EnforcedMigration);
        assert_eq!(E::FullMigration.to_string(), "fullmigration");
    }

    #[test]
    fn core_allocation_classification() {
        assert!(E::Start.allocates_core());
        assert!(E::Run.allocates_core());
        assert!(E::Preempt.deallocates_core());
        assert!(E::MtaLimitExceeded.deallocates_core());
        assert!(!E::Activate.allocates_core());
        assert!(!E::Activate.deallocates_core());
    }
}
