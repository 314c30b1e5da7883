//! Processed-resource rules: one input or output line of a processor.
//!
//! An input draws `ratio` (per crew member, per cycle by default) from the
//! ledger. An output stores `ratio` back, optionally throttled by how much of
//! a related input the same cycle managed to obtain: Soil is only produced
//! from Snacks that were actually eaten.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::RESOURCE_EPSILON;
use crate::ledger::ResourceLedger;
use crate::result::{CrewContext, ProcessingResult, ResultType};

/// Direction of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedResource {
    pub resource_name: String,
    pub kind: RuleKind,
    /// Amount per crew member per cycle (see the two flags below).
    pub ratio: f64,
    /// Input whose fulfillment gates this output's yield.
    pub related_resource_name: Option<String>,
    /// Multiply by crew count.
    pub applied_per_crew: bool,
    /// When false, `ratio` is per second and is multiplied by the cycle length.
    pub applied_per_cycle: bool,
    /// Whether a shortfall of this input counts toward crew penalties.
    pub failure_applies_outcomes: bool,
}

impl ProcessedResource {
    pub fn input(resource_name: impl Into<String>, ratio: f64) -> Self {
        Self {
            resource_name: resource_name.into(),
            kind: RuleKind::Input,
            ratio,
            related_resource_name: None,
            applied_per_crew: true,
            applied_per_cycle: true,
            failure_applies_outcomes: true,
        }
    }

    pub fn output(resource_name: impl Into<String>, ratio: f64) -> Self {
        Self {
            resource_name: resource_name.into(),
            kind: RuleKind::Output,
            ratio,
            related_resource_name: None,
            applied_per_crew: true,
            applied_per_cycle: true,
            failure_applies_outcomes: false,
        }
    }

    pub fn related_to(mut self, resource_name: impl Into<String>) -> Self {
        self.related_resource_name = Some(resource_name.into());
        self
    }

    pub fn per_crew(mut self, applied: bool) -> Self {
        self.applied_per_crew = applied;
        self
    }

    pub fn per_cycle(mut self, applied: bool) -> Self {
        self.applied_per_cycle = applied;
        self
    }

    pub fn applies_outcomes(mut self, applies: bool) -> Self {
        self.failure_applies_outcomes = applies;
        self
    }

    pub fn is_input(&self) -> bool {
        self.kind == RuleKind::Input
    }

    /// Amount this rule asks for (or offers) in one cycle.
    pub fn compute_demand(&self, crew_count: u32, cycle_seconds: f64) -> f64 {
        let mut demand = self.ratio.max(0.0);
        if self.applied_per_crew {
            demand *= f64::from(crew_count);
        }
        if !self.applied_per_cycle {
            demand *= cycle_seconds.max(0.0);
        }
        demand
    }

    /// One crew member's share of a per-crew demand.
    fn per_crew_share(&self, demand: f64, crew_count: u32) -> f64 {
        if crew_count == 0 {
            0.0
        } else {
            demand / f64::from(crew_count)
        }
    }

    /// Draw `demand` from the ledger.
    pub fn consume(
        &self,
        ledger: &mut dyn ResourceLedger,
        demand: f64,
        crew: CrewContext,
    ) -> ProcessingResult {
        let supplied = ledger.request(&self.resource_name, demand);
        let completed = supplied >= demand - RESOURCE_EPSILON;

        let affected_crew_count = if completed {
            0
        } else if self.applied_per_crew {
            let share = self.per_crew_share(demand, crew.crew_count);
            let fed = if share > 0.0 {
                ((supplied + RESOURCE_EPSILON) / share).floor() as u32
            } else {
                crew.crew_count
            };
            crew.crew_count.saturating_sub(fed)
        } else {
            crew.crew_count
        };

        if !completed {
            log::debug!(
                "{}: obtained {:.4} of {:.4}, {} crew short",
                self.resource_name,
                supplied,
                demand,
                affected_crew_count
            );
        }

        ProcessingResult {
            resource_name: self.resource_name.clone(),
            result_type: ResultType::Consumption,
            completed_successfully: completed,
            applied_per_crew: self.applied_per_crew,
            applies_outcomes: self.failure_applies_outcomes,
            affected_crew_count,
            crew_count: crew.crew_count,
            crew_capacity: crew.crew_capacity,
            requested_amount: demand,
            transferred_amount: supplied,
            current_amount: ledger.amount(&self.resource_name),
            max_amount: ledger.max_amount(&self.resource_name),
        }
    }

    /// Nominal output for a cycle before throttling.
    ///
    /// A related output scales with its feedstock's demand: `ratio` is a
    /// recycling ratio against what the related input asked for. Other
    /// outputs use [`Self::compute_demand`].
    pub fn nominal_output(
        &self,
        crew_count: u32,
        cycle_seconds: f64,
        consumption_results: &BTreeMap<String, ProcessingResult>,
    ) -> f64 {
        match self.related_result(consumption_results) {
            Some(related) => self.ratio.max(0.0) * related.requested_amount,
            None => self.compute_demand(crew_count, cycle_seconds),
        }
    }

    fn related_result<'a>(
        &self,
        consumption_results: &'a BTreeMap<String, ProcessingResult>,
    ) -> Option<&'a ProcessingResult> {
        self.related_resource_name
            .as_deref()
            .and_then(|name| consumption_results.get(name))
    }

    /// Store `base_amount`, scaled by the related input's fulfillment ratio.
    pub fn produce(
        &self,
        ledger: &mut dyn ResourceLedger,
        base_amount: f64,
        consumption_results: &BTreeMap<String, ProcessingResult>,
        crew: CrewContext,
    ) -> ProcessingResult {
        let throttle = match self.related_resource_name.as_deref() {
            Some(name) => match consumption_results.get(name) {
                Some(related) => related.percent_acquired(),
                None => {
                    log::debug!(
                        "{}: related input {} not processed this cycle, producing unthrottled",
                        self.resource_name,
                        name
                    );
                    1.0
                }
            },
            None => 1.0,
        };

        let amount = base_amount.max(0.0) * throttle;
        let stored = ledger.deposit(&self.resource_name, amount);
        let completed = stored >= amount - RESOURCE_EPSILON;
        if !completed {
            log::debug!(
                "{}: stored {:.4} of {:.4}, remainder discarded",
                self.resource_name,
                stored,
                amount
            );
        }

        ProcessingResult {
            resource_name: self.resource_name.clone(),
            result_type: ResultType::Production,
            completed_successfully: completed,
            applied_per_crew: self.applied_per_crew,
            applies_outcomes: false,
            affected_crew_count: 0,
            crew_count: crew.crew_count,
            crew_capacity: crew.crew_capacity,
            requested_amount: amount,
            transferred_amount: stored,
            current_amount: ledger.amount(&self.resource_name),
            max_amount: ledger.max_amount(&self.resource_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ContainerLedger, ResourceContainer};

    fn ledger(snacks: f64) -> ContainerLedger {
        ContainerLedger::new()
            .with_container(ResourceContainer::new("Snacks", snacks, 100.0))
            .with_container(ResourceContainer::new("Soil", 0.0, 100.0))
    }

    #[test]
    fn test_demand_per_crew() {
        let rule = ProcessedResource::input("Snacks", 1.5);
        assert!((rule.compute_demand(4, 3600.0) - 6.0).abs() < 1e-9);
        assert_eq!(rule.compute_demand(0, 3600.0), 0.0);
    }

    #[test]
    fn test_demand_flat_and_per_second() {
        let flat = ProcessedResource::input("ElectricCharge", 2.0).per_crew(false);
        assert!((flat.compute_demand(7, 60.0) - 2.0).abs() < 1e-9);

        let per_second = ProcessedResource::input("ElectricCharge", 0.01)
            .per_crew(false)
            .per_cycle(false);
        assert!((per_second.compute_demand(7, 600.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_consume_success() {
        let mut l = ledger(10.0);
        let rule = ProcessedResource::input("Snacks", 1.0);
        let r = rule.consume(&mut l, 3.0, CrewContext::new(3, 4));
        assert!(r.completed_successfully);
        assert_eq!(r.affected_crew_count, 0);
        assert!((r.current_amount - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_consume_shortfall_counts_unfed_crew() {
        let mut l = ledger(1.5);
        let rule = ProcessedResource::input("Snacks", 1.0);
        let r = rule.consume(&mut l, 4.0, CrewContext::new(4, 4));
        assert!(!r.completed_successfully);
        assert!((r.transferred_amount - 1.5).abs() < 1e-9);
        // One full share handed out, three crew go without
        assert_eq!(r.affected_crew_count, 3);
        assert_eq!(r.current_amount, 0.0);
    }

    #[test]
    fn test_consume_flat_shortfall_affects_everyone() {
        let mut l = ledger(0.0);
        let rule = ProcessedResource::input("Snacks", 1.0).per_crew(false);
        let r = rule.consume(&mut l, 1.0, CrewContext::new(3, 3));
        assert_eq!(r.affected_crew_count, 3);
    }

    #[test]
    fn test_produce_throttled_by_related_input() {
        let mut l = ledger(5.0);
        let input = ProcessedResource::input("Snacks", 1.0);
        let output = ProcessedResource::output("Soil", 1.0).related_to("Snacks");
        let crew = CrewContext::new(10, 10);

        let consumed = input.consume(&mut l, 10.0, crew);
        let mut results = BTreeMap::new();
        results.insert("Snacks".to_string(), consumed);

        let nominal = output.nominal_output(10, 3600.0, &results);
        assert!((nominal - 10.0).abs() < 1e-9);
        let produced = output.produce(&mut l, nominal, &results, crew);
        assert!((produced.transferred_amount - 5.0).abs() < 1e-9);
        assert!((l.amount("Soil") - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_produce_without_related_uses_base() {
        let mut l = ledger(0.0);
        let output = ProcessedResource::output("Soil", 2.0).per_crew(false);
        let results = BTreeMap::new();
        let nominal = output.nominal_output(3, 3600.0, &results);
        let produced = output.produce(&mut l, nominal, &results, CrewContext::new(3, 3));
        assert!(produced.completed_successfully);
        assert!((l.amount("Soil") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_produce_into_missing_container_reports_failure() {
        let mut l = ContainerLedger::new();
        let output = ProcessedResource::output("Soil", 1.0).per_crew(false);
        let r = output.produce(&mut l, 1.0, &BTreeMap::new(), CrewContext::new(1, 1));
        assert!(!r.completed_successfully);
        assert_eq!(r.transferred_amount, 0.0);
        assert!((r.requested_amount - 1.0).abs() < 1e-9);
    }
}
