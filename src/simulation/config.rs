//! Session configuration.

use crate::trace::TimeScale;
use serde::{Deserialize, Serialize};

/// Options of one simulation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Scale of stimulus times and of the written trace.
    pub time_scale: TimeScale,
    /// Stop at the first rejected stimulus instead of reporting and continuing.
    pub strict: bool,
    /// Suspend running runnables when their process leaves the core and
    /// resume them when it is dispatched again.
    pub auto_suspend_runnables: bool,
    /// Accept `release` on a process that is already `ready` as a no-op.
    pub ignore_repeated_release: bool,
    /// Keep every entity's transition history. Each history grows by one
    /// record per accepted event for the whole session.
    pub record_history: bool,
    /// Emit core `execute` and `idle` records when processes take and leave
    /// a core.
    pub generate_core_events: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_scale: TimeScale::Nano,
            strict: false,
            auto_suspend_runnables: false,
            ignore_repeated_release: false,
            record_history: true,
            generate_core_events: false,
        }
    }
}
