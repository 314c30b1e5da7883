//! Outcome dispatch: pluggable penalties for crew who keep going short.
//!
//! The session never calls handlers itself. The host's penalty layer feeds
//! each [`DeficitReport`] to an [`OutcomeRegistry`], which applies every
//! enabled handler whose failure threshold an affected crew member has
//! reached, and removes a handler's effects from a vessel once the resource
//! is fully supplied again.

use std::collections::BTreeSet;

use snacks_logic::result::ProcessingResult;

use super::consumption::DeficitReport;
use crate::components::VesselId;
use crate::roster::AstronautRoster;

/// A penalty or effect tied to a resource shortfall.
pub trait Outcome {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Apply to `affected`, the crew at or past the failure threshold.
    fn apply_outcome(
        &mut self,
        vessel: &VesselId,
        result: &ProcessingResult,
        affected: &[String],
        roster: &mut AstronautRoster,
    );

    /// Undo any lasting effect on `vessel`.
    fn remove_outcome(&mut self, vessel: &VesselId, roster: &mut AstronautRoster);
}

struct OutcomeEntry {
    resource_name: String,
    failure_threshold: u32,
    handler: Box<dyn Outcome>,
    active_on: BTreeSet<VesselId>,
}

/// Handlers keyed by the resource whose shortfall triggers them.
#[derive(Default)]
pub struct OutcomeRegistry {
    entries: Vec<OutcomeEntry>,
}

impl OutcomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for shortfalls of `resource_name` once a crew
    /// member has `failure_threshold` consecutive failures (minimum 1).
    pub fn register(
        &mut self,
        resource_name: impl Into<String>,
        failure_threshold: u32,
        handler: Box<dyn Outcome>,
    ) {
        self.entries.push(OutcomeEntry {
            resource_name: resource_name.into(),
            failure_threshold: failure_threshold.max(1),
            handler,
            active_on: BTreeSet::new(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.handler.name())
    }

    /// Route one report. Returns how many handlers were applied.
    pub fn dispatch(&mut self, report: &DeficitReport, roster: &mut AstronautRoster) -> usize {
        let mut applied = 0;
        for result in report.consumption() {
            if !result.applies_outcomes {
                continue;
            }
            for entry in self
                .entries
                .iter_mut()
                .filter(|e| e.resource_name == result.resource_name)
            {
                if !entry.handler.is_enabled() {
                    continue;
                }

                if result.completed_successfully {
                    if entry.active_on.remove(&report.vessel_id) {
                        entry.handler.remove_outcome(&report.vessel_id, roster);
                    }
                    continue;
                }

                let over_threshold: Vec<String> = report
                    .affected(&result.resource_name)
                    .iter()
                    .filter(|name| {
                        roster
                            .get(name)
                            .is_some_and(|r| r.failures(&result.resource_name) >= entry.failure_threshold)
                    })
                    .cloned()
                    .collect();
                if over_threshold.is_empty() {
                    continue;
                }

                log::info!(
                    "{} applied to {} crew on {}",
                    entry.handler.name(),
                    over_threshold.len(),
                    report.vessel_id
                );
                entry
                    .handler
                    .apply_outcome(&report.vessel_id, result, &over_threshold, roster);
                entry.active_on.insert(report.vessel_id.clone());
                applied += 1;
            }
        }
        applied
    }

    /// Lift every active outcome from a vessel (recovered or destroyed).
    pub fn remove_vessel(&mut self, vessel: &VesselId, roster: &mut AstronautRoster) {
        for entry in &mut self.entries {
            if entry.active_on.remove(vessel) {
                entry.handler.remove_outcome(vessel, roster);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::conditions;
    use crate::systems::consumption::account_cycle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use snacks_logic::ledger::{ContainerLedger, ResourceContainer, ResourceLedger};
    use snacks_logic::processor::{ProcessorDefinition, ResourceProcessor};
    use snacks_logic::result::CrewContext;
    use snacks_logic::rule::ProcessedResource;

    struct Faint {
        enabled: bool,
    }

    impl Outcome for Faint {
        fn name(&self) -> &str {
            "Fainting"
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn apply_outcome(
            &mut self,
            _vessel: &VesselId,
            _result: &ProcessingResult,
            affected: &[String],
            roster: &mut AstronautRoster,
        ) {
            for name in affected {
                roster.get_or_create(name).add_condition(conditions::FAINTED);
            }
        }

        fn remove_outcome(&mut self, _vessel: &VesselId, roster: &mut AstronautRoster) {
            for name in ["Jeb", "Bill"] {
                if let Some(record) = roster.get_mut(name) {
                    record.remove_condition(conditions::FAINTED);
                }
            }
        }
    }

    struct Harness {
        processor: ResourceProcessor,
        ledger: ContainerLedger,
        roster: AstronautRoster,
        rng: StdRng,
        vessel: VesselId,
        crew: Vec<String>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                processor: ResourceProcessor::new(
                    ProcessorDefinition::new("Snacks!", 60.0)
                        .with_input(ProcessedResource::input("Snacks", 1.0)),
                ),
                ledger: ContainerLedger::new()
                    .with_container(ResourceContainer::new("Snacks", 0.0, 10.0)),
                roster: AstronautRoster::new(),
                rng: StdRng::seed_from_u64(3),
                vessel: VesselId::new("v1"),
                crew: vec!["Jeb".into(), "Bill".into()],
            }
        }

        fn cycle(&mut self) -> DeficitReport {
            let results = self.processor.run_cycle(&mut self.ledger, CrewContext::new(2, 2));
            account_cycle(
                &mut self.roster,
                &mut self.rng,
                &self.vessel,
                &self.crew,
                results,
                "Snacks",
            )
        }
    }

    #[test]
    fn test_outcome_waits_for_threshold() {
        let mut h = Harness::new();
        let mut registry = OutcomeRegistry::new();
        registry.register("Snacks", 2, Box::new(Faint { enabled: true }));

        let report = h.cycle();
        assert_eq!(registry.dispatch(&report, &mut h.roster), 0);

        let report = h.cycle();
        assert_eq!(registry.dispatch(&report, &mut h.roster), 1);
        assert!(h.roster.get("Jeb").unwrap().has_condition(conditions::FAINTED));
    }

    #[test]
    fn test_outcome_removed_when_fed() {
        let mut h = Harness::new();
        let mut registry = OutcomeRegistry::new();
        registry.register("Snacks", 1, Box::new(Faint { enabled: true }));

        let report = h.cycle();
        registry.dispatch(&report, &mut h.roster);
        assert!(h.roster.get("Bill").unwrap().has_condition(conditions::FAINTED));

        h.ledger.deposit("Snacks", 10.0);
        let report = h.cycle();
        registry.dispatch(&report, &mut h.roster);
        assert!(!h.roster.get("Bill").unwrap().has_condition(conditions::FAINTED));
    }

    #[test]
    fn test_disabled_outcome_never_applies() {
        let mut h = Harness::new();
        let mut registry = OutcomeRegistry::new();
        registry.register("Snacks", 1, Box::new(Faint { enabled: false }));
        let report = h.cycle();
        assert_eq!(registry.dispatch(&report, &mut h.roster), 0);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Fainting"]);
    }
}
