//! Cores, semaphores and the stateless OS vocabularies.
//!
//! Cores and semaphores run on the same [`TransitionTable`] engine as
//! processes. Schedulers, OS events and signals have no state of their own;
//! only their event names are declared here.

use super::state::{Event, State};
use super::table::{FromState, ToState, TransitionTable};
use std::sync::LazyLock;

crate::btf_enum! {
    /// Whether a core is executing a process.
    pub enum CoreState {
        Unknown => "unknown",
        Idle => "idle",
        Execution => "execution",
    }
}

crate::btf_enum! {
    pub enum CoreEvent {
        Idle => "idle",
        Execute => "execute",
        SetFrequence => "set_frequence",
    }
}

crate::btf_enum! {
    /// Occupancy of a semaphore.
    pub enum SemaphoreState {
        Unknown => "unknown",
        Free => "free",
        Used => "used",
        Full => "full",
        Overfull => "overfull",
    }
}

crate::btf_enum! {
    /// Semaphore events.
    ///
    /// State events are issued by the semaphore itself and move its state;
    /// access events are issued by the process running on a core.
    pub enum SemaphoreEvent {
        Assigned => "assigned",
        Decrement => "decrement",
        Free => "free",
        Full => "full",
        Increment => "increment",
        Lock => "lock",
        LockUsed => "lock_used",
        Overfull => "overfull",
        Queued => "queued",
        Released => "released",
        RequestSemaphore => "requestsemaphore",
        Unlock => "unlock",
        UnlockFull => "unlock_full",
        Used => "used",
        Waiting => "waiting",
    }
}

crate::btf_enum! {
    pub enum SchedulerEvent {
        /// Issued by the scheduler on itself.
        Schedule => "schedule",
        /// Issued by the process running on a core.
        SchedulePoint => "schedulepoint",
    }
}

crate::btf_enum! {
    /// OS event objects owned by a task.
    pub enum OsEvent {
        ClearEvent => "clear_event",
        SetEvent => "set_event",
        WaitEvent => "wait_event",
    }
}

crate::btf_enum! {
    pub enum SignalEvent {
        Read => "read",
        Write => "write",
    }
}

impl State for CoreState {
    fn name(&self) -> &str {
        self.as_str()
    }
}

impl Event for CoreEvent {
    fn name(&self) -> &str {
        self.as_str()
    }
}

impl State for SemaphoreState {
    fn name(&self) -> &str {
        self.as_str()
    }
}

impl Event for SemaphoreEvent {
    fn name(&self) -> &str {
        self.as_str()
    }
}

impl SemaphoreEvent {
    /// State events: issued by the semaphore on itself.
    pub fn is_state_event(&self) -> bool {
        matches!(
            self,
            Self::Free
                | Self::Unlock
                | Self::Lock
                | Self::UnlockFull
                | Self::Used
                | Self::Full
                | Self::LockUsed
                | Self::Overfull
        )
    }

    /// Whether `count` is a valid number of accesses to report with this event.
    pub fn accepts_accesses(&self, count: u64) -> bool {
        match self {
            Self::Free | Self::Unlock => count == 0,
            Self::Lock => count == 1,
            Self::UnlockFull | Self::Used => count > 0,
            _ => true,
        }
    }
}

static CORE_TABLE: LazyLock<TransitionTable<CoreState, CoreEvent>> = LazyLock::new(build_core_table);

static SEMAPHORE_TABLE: LazyLock<TransitionTable<SemaphoreState, SemaphoreEvent>> =
    LazyLock::new(build_semaphore_table);

/// Transition table for cores.
pub fn core_table() -> &'static TransitionTable<CoreState, CoreEvent> {
    &CORE_TABLE
}

/// Transition table for the state events of semaphores.
pub fn semaphore_table() -> &'static TransitionTable<SemaphoreState, SemaphoreEvent> {
    &SEMAPHORE_TABLE
}

fn build_core_table() -> TransitionTable<CoreState, CoreEvent> {
    use CoreEvent as E;
    use CoreState as S;

    TransitionTable::new("core", S::ALL.to_vec(), E::ALL.to_vec())
        .add(
            FromState::AnyOf(vec![S::Unknown, S::Idle]),
            E::Execute,
            ToState::To(S::Execution),
        )
        .add(
            FromState::AnyOf(vec![S::Unknown, S::Execution]),
            E::Idle,
            ToState::To(S::Idle),
        )
        .add(FromState::AnyLive, E::SetFrequence, ToState::Stay)
}

fn build_semaphore_table() -> TransitionTable<SemaphoreState, SemaphoreEvent> {
    use SemaphoreEvent as E;
    use SemaphoreState as S;

    let events = E::ALL.iter().copied().filter(E::is_state_event).collect();

    TransitionTable::new("semaphore", S::ALL.to_vec(), events)
        .rule(S::Unknown, E::Used, S::Used)
        .rule(S::Unknown, E::UnlockFull, S::Used)
        .rule(S::Unknown, E::Free, S::Free)
        .rule(S::Unknown, E::Unlock, S::Free)
        .rule(S::Unknown, E::Lock, S::Full)
        .rule(S::Unknown, E::LockUsed, S::Full)
        .rule(S::Unknown, E::Full, S::Full)
        .rule(S::Unknown, E::Overfull, S::Overfull)
        .rule(S::Free, E::Used, S::Used)
        .rule(S::Free, E::Lock, S::Full)
        .rule(S::Used, E::Free, S::Free)
        .rule(S::Used, E::LockUsed, S::Full)
        .rule(S::Used, E::Used, S::Used)
        .rule(S::Full, E::Unlock, S::Free)
        .rule(S::Full, E::UnlockFull, S::Used)
        .rule(S::Full, E::Overfull, S::Overfull)
        .rule(S::Overfull, E::Full, S::Full)
        .rule(S::Overfull, E::Overfull, S::Overfull)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_alternates_between_idle_and_execution() {
        let table = core_table();
        assert_eq!(
            table.next_state(&CoreState::Unknown, &CoreEvent::Idle).unwrap(),
            CoreState::Idle
        );
        assert_eq!(
            table.next_state(&CoreState::Idle, &CoreEvent::Execute).unwrap(),
            CoreState::Execution
        );
        assert_eq!(
            table.next_state(&CoreState::Execution, &CoreEvent::Idle).unwrap(),
            CoreState::Idle
        );
        assert!(!table.is_legal(&CoreState::Idle, &CoreEvent::Idle));
        assert!(!table.is_legal(&CoreState::Execution, &CoreEvent::Execute));
    }

    #[test]
    fn frequency_change_keeps_core_state() {
        for state in CoreState::ALL {
            assert_eq!(
                core_table().next_state(state, &CoreEvent::SetFrequence).unwrap(),
                *state
            );
        }
    }

    #[test]
    fn semaphore_fills_and_drains() {
        use SemaphoreEvent as E;
        use SemaphoreState as S;

        let table = semaphore_table();
        let path = [
            (S::Unknown, E::Free, S::Free),
            (S::Free, E::Used, S::Used),
            (S::Used, E::Used, S::Used),
            (S::Used, E::LockUsed, S::Full),
            (S::Full, E::Overfull, S::Overfull),
            (S::Overfull, E::Full, S::Full),
            (S::Full, E::UnlockFull, S::Used),
            (S::Used, E::Free, S::Free),
            (S::Free, E::Lock, S::Full),
            (S::Full, E::Unlock, S::Free),
        ];
        for (from, event, to) in path {
            assert_eq!(table.next_state(&from, &event).unwrap(), to, "{from} --{event}-->");
        }
    }

    #[test]
    fn semaphore_refuses_repeated_states() {
        use SemaphoreEvent as E;
        use SemaphoreState as S;

        let table = semaphore_table();
        assert!(!table.is_legal(&S::Free, &E::Free));
        assert!(!table.is_legal(&S::Free, &E::Unlock));
        assert!(!table.is_legal(&S::Full, &E::Lock));
        assert!(!table.is_legal(&S::Used, &E::UnlockFull));
        assert!(!table.is_legal(&S::Overfull, &E::Unlock));
    }

    #[test]
    fn access_events_are_not_state_events() {
        for event in [
            SemaphoreEvent::Assigned,
            SemaphoreEvent::Decrement,
            SemaphoreEvent::Increment,
            SemaphoreEvent::Queued,
            SemaphoreEvent::Released,
            SemaphoreEvent::RequestSemaphore,
            SemaphoreEvent::Waiting,
        ] {
            assert!(!event.is_state_event());
            assert!(!semaphore_table().events().contains(&event));
        }
    }

    #[test]
    fn access_counts_follow_the_event() {
        assert!(SemaphoreEvent::Free.accepts_accesses(0));
        assert!(!SemaphoreEvent::Unlock.accepts_accesses(1));
        assert!(SemaphoreEvent::Lock.accepts_accesses(1));
        assert!(!SemaphoreEvent::Lock.accepts_accesses(2));
        assert!(!SemaphoreEvent::Used.accepts_accesses(0));
        assert!(SemaphoreEvent::UnlockFull.accepts_accesses(3));
        assert!(SemaphoreEvent::Overfull.accepts_accesses(0));
        assert!(SemaphoreEvent::Increment.accepts_accesses(7));
    }
}
