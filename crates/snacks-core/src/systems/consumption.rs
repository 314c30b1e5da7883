//! Crew deficit accounting: turns a processor cycle into per-crew counters
//! and a report the penalty layer can act on.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use snacks_logic::processor::CycleResults;
use snacks_logic::result::ProcessingResult;

use crate::components::VesselId;
use crate::roster::AstronautRoster;

/// One processor cycle on one vessel, with the crew each shortfall hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeficitReport {
    pub vessel_id: VesselId,
    pub processor_name: String,
    pub results: CycleResults,
    /// Failed resource name → crew who went without.
    pub affected_crew: BTreeMap<String, Vec<String>>,
}

impl DeficitReport {
    pub fn has_deficit(&self) -> bool {
        self.affected_crew.values().any(|crew| !crew.is_empty())
    }

    pub fn affected(&self, resource: &str) -> &[String] {
        self.affected_crew
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn consumption(&self) -> &[ProcessingResult] {
        &self.results.consumption
    }
}

/// Resolve who a shortfall hit: the explicit list when one was chosen,
/// otherwise everyone aboard.
pub fn resolve_affected_crew(explicit: Option<Vec<String>>, aboard: &[String]) -> Vec<String> {
    explicit.unwrap_or_else(|| aboard.to_vec())
}

/// Pick which eaters went short when only part of the crew did.
fn choose_affected(
    result: &ProcessingResult,
    eaters: &[String],
    rng: &mut impl Rng,
) -> Vec<String> {
    let count = result.affected_crew_count as usize;
    let explicit = (count < eaters.len())
        .then(|| eaters.choose_multiple(rng, count).cloned().collect());
    resolve_affected_crew(explicit, eaters)
}

/// Apply one cycle's results to the roster.
///
/// Fed crew get a success on each input; crew who went short get a failure
/// and, for `meal_resource`, a missed meal. Inputs flagged as not applying
/// outcomes leave the counters alone.
pub fn account_cycle(
    roster: &mut AstronautRoster,
    rng: &mut impl Rng,
    vessel_id: &VesselId,
    eaters: &[String],
    results: CycleResults,
    meal_resource: &str,
) -> DeficitReport {
    let mut affected_crew = BTreeMap::new();

    for result in &results.consumption {
        if !result.applies_outcomes {
            continue;
        }
        let resource = result.resource_name.as_str();
        let affected = if result.completed_successfully {
            Vec::new()
        } else {
            choose_affected(result, eaters, rng)
        };

        for name in eaters {
            let record = roster.get_or_create(name);
            let went_short = affected.contains(name);
            if went_short {
                record.record_failure(resource);
            } else {
                record.record_success(resource);
            }
            if resource == meal_resource {
                record.meals_missed = if went_short { record.meals_missed + 1 } else { 0 };
            }
        }

        if !affected.is_empty() {
            log::debug!(
                "{}: {} crew short of {} ({})",
                vessel_id,
                affected.len(),
                resource,
                results.processor_name
            );
            affected_crew.insert(result.resource_name.clone(), affected);
        }
    }

    DeficitReport {
        vessel_id: vessel_id.clone(),
        processor_name: results.processor_name.clone(),
        results,
        affected_crew,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use snacks_logic::ledger::{ContainerLedger, ResourceContainer};
    use snacks_logic::processor::{ProcessorDefinition, ResourceProcessor};
    use snacks_logic::result::CrewContext;
    use snacks_logic::rule::ProcessedResource;

    fn run(snacks: f64, eaters: &[String]) -> CycleResults {
        let mut processor = ResourceProcessor::new(
            ProcessorDefinition::new("Snacks!", 60.0)
                .with_input(ProcessedResource::input("Snacks", 1.0)),
        );
        let mut ledger =
            ContainerLedger::new().with_container(ResourceContainer::new("Snacks", snacks, 10.0));
        let crew = CrewContext::new(eaters.len() as u32, eaters.len() as u32);
        processor.run_cycle(&mut ledger, crew)
    }

    fn crew() -> Vec<String> {
        ["Jeb", "Bill", "Bob", "Val"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_meal_resets_counters() {
        let mut roster = AstronautRoster::new();
        let mut rng = StdRng::seed_from_u64(7);
        let vessel = VesselId::new("v1");
        let eaters = crew();
        roster.get_or_create("Jeb").meals_missed = 2;

        let report = account_cycle(&mut roster, &mut rng, &vessel, &eaters, run(10.0, &eaters), "Snacks");
        assert!(!report.has_deficit());
        assert_eq!(roster.get("Jeb").unwrap().meals_missed, 0);
        assert_eq!(roster.get("Val").unwrap().successes("Snacks"), 1);
    }

    #[test]
    fn test_partial_shortfall_picks_subset() {
        let mut roster = AstronautRoster::new();
        let mut rng = StdRng::seed_from_u64(7);
        let vessel = VesselId::new("v1");
        let eaters = crew();

        // 2.5 snacks for 4 crew → 2 fed, 2 short
        let report = account_cycle(&mut roster, &mut rng, &vessel, &eaters, run(2.5, &eaters), "Snacks");
        let short = report.affected("Snacks");
        assert_eq!(short.len(), 2);
        for name in &eaters {
            let record = roster.get(name).unwrap();
            if short.contains(name) {
                assert_eq!(record.meals_missed, 1);
                assert_eq!(record.failures("Snacks"), 1);
            } else {
                assert_eq!(record.meals_missed, 0);
            }
        }
    }

    #[test]
    fn test_total_shortfall_hits_everyone() {
        let mut roster = AstronautRoster::new();
        let mut rng = StdRng::seed_from_u64(1);
        let vessel = VesselId::new("v1");
        let eaters = crew();

        let report = account_cycle(&mut roster, &mut rng, &vessel, &eaters, run(0.0, &eaters), "Snacks");
        assert_eq!(report.affected("Snacks"), eaters.as_slice());
    }

    #[test]
    fn test_resolve_affected_prefers_explicit() {
        let aboard = crew();
        assert_eq!(resolve_affected_crew(None, &aboard), aboard);
        assert_eq!(
            resolve_affected_crew(Some(vec!["Bob".into()]), &aboard),
            vec!["Bob".to_string()]
        );
    }
}
