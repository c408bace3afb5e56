//! Builder for [`Simulation`] sessions.

use crate::registry::Registry;
use crate::simulation::{Simulation, SimulationConfig};
use crate::trace::{BtfFile, TimeScale};

/// Fluent construction of a [`Simulation`].
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    config: SimulationConfig,
    registry: Option<Registry>,
    header_entries: Vec<String>,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting at once, e.g. with a deserialized config.
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn time_scale(mut self, time_scale: TimeScale) -> Self {
        self.config.time_scale = time_scale;
        self
    }

    /// Stop at the first rejected stimulus.
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn auto_suspend_runnables(mut self, enabled: bool) -> Self {
        self.config.auto_suspend_runnables = enabled;
        self
    }

    pub fn ignore_repeated_release(mut self, enabled: bool) -> Self {
        self.config.ignore_repeated_release = enabled;
        self
    }

    /// Keep per-entity transition histories (on by default).
    pub fn record_history(mut self, enabled: bool) -> Self {
        self.config.record_history = enabled;
        self
    }

    pub fn generate_core_events(mut self, enabled: bool) -> Self {
        self.config.generate_core_events = enabled;
        self
    }

    /// Start from a pre-populated dictionary.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add a free-form line to the trace header.
    pub fn header_entry(mut self, entry: impl Into<String>) -> Self {
        self.header_entries.push(entry.into());
        self
    }

    pub fn build(self) -> Simulation {
        let mut file = BtfFile::with_registry(
            self.config.time_scale,
            self.registry.unwrap_or_default(),
        );
        for entry in &self.header_entries {
            file.header_entry(entry);
        }
        Simulation::with_file(self.config, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_reach_the_session() {
        let sim = SimulationBuilder::new()
            .time_scale(TimeScale::Micro)
            .strict(true)
            .auto_suspend_runnables(true)
            .header_entry("model demo")
            .build();

        assert!(sim.config().strict);
        assert!(sim.config().auto_suspend_runnables);
        assert!(!sim.config().ignore_repeated_release);
        assert!(sim.config().record_history);
        assert!(!sim.file().generates_core_events());
        assert_eq!(sim.file().time_scale(), TimeScale::Micro);
        assert_eq!(sim.file().header().entries, vec!["model demo".to_string()]);
    }

    #[test]
    fn history_and_core_event_switches_reach_the_session() {
        let sim = SimulationBuilder::new()
            .record_history(false)
            .generate_core_events(true)
            .build();

        assert!(!sim.config().record_history);
        assert!(sim.file().generates_core_events());
    }

    #[test]
    fn registry_is_carried_over() {
        let mut registry = Registry::new();
        registry.register("core0").unwrap();

        let sim = SimulationBuilder::new().registry(registry).build();
        assert_eq!(sim.file().registry().len(), 1);
    }
}
