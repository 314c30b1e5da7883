//! Resource processor: the per-cycle consumption/production engine.
//!
//! A processor accumulates elapsed time and, for every whole
//! `seconds_per_cycle` contained in it, runs one cycle: all inputs in order,
//! then all outputs in order. Outputs see that cycle's consumption results so
//! related-resource throttling works.
//!
//! Catch-up is always done cycle by cycle. A vessel left alone for three
//! days runs three separate day-long cycles, each against the ledger as the
//! previous one left it, rather than one triple-sized cycle.
//!
//! ```
//! use snacks_logic::ledger::{ContainerLedger, ResourceContainer};
//! use snacks_logic::processor::{ProcessorDefinition, ResourceProcessor};
//! use snacks_logic::result::CrewContext;
//! use snacks_logic::rule::ProcessedResource;
//!
//! let definition = ProcessorDefinition::new("Snacks!", 3600.0)
//!     .with_input(ProcessedResource::input("Snacks", 1.0))
//!     .with_output(ProcessedResource::output("Soil", 1.0).related_to("Snacks"));
//! let mut processor = ResourceProcessor::new(definition);
//! let mut ledger = ContainerLedger::new()
//!     .with_container(ResourceContainer::new("Snacks", 10.0, 10.0))
//!     .with_container(ResourceContainer::new("Soil", 0.0, 10.0));
//!
//! let cycles = processor.tick(7200.0, &mut ledger, CrewContext::new(2, 4));
//! assert_eq!(cycles.len(), 2);
//! assert!(cycles.iter().all(|c| c.all_consumed()));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, MAX_CYCLES_PER_ADVANCE};
use crate::ledger::ResourceLedger;
use crate::result::{CrewContext, ProcessingResult};
use crate::rule::{ProcessedResource, RuleKind};

/// Data describing a processor; what the config loader produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorDefinition {
    pub name: String,
    pub seconds_per_cycle: f64,
    pub inputs: Vec<ProcessedResource>,
    pub outputs: Vec<ProcessedResource>,
}

impl ProcessorDefinition {
    pub fn new(name: impl Into<String>, seconds_per_cycle: f64) -> Self {
        Self {
            name: name.into(),
            seconds_per_cycle,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, mut rule: ProcessedResource) -> Self {
        rule.kind = RuleKind::Input;
        self.inputs.push(rule);
        self
    }

    pub fn with_output(mut self, mut rule: ProcessedResource) -> Self {
        rule.kind = RuleKind::Output;
        self.outputs.push(rule);
        self
    }
}

/// Everything one cycle did to one vessel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleResults {
    pub processor_name: String,
    pub consumption: Vec<ProcessingResult>,
    pub production: Vec<ProcessingResult>,
}

impl CycleResults {
    /// True when every input was fully supplied.
    pub fn all_consumed(&self) -> bool {
        self.consumption.iter().all(|r| r.completed_successfully)
    }

    pub fn failed_consumption(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.consumption.iter().filter(|r| !r.completed_successfully)
    }

    pub fn consumed(&self, resource: &str) -> f64 {
        self.consumption
            .iter()
            .filter(|r| r.resource_name == resource)
            .map(|r| r.transferred_amount)
            .sum()
    }

    pub fn produced(&self, resource: &str) -> f64 {
        self.production
            .iter()
            .filter(|r| r.resource_name == resource)
            .map(|r| r.transferred_amount)
            .sum()
    }
}

/// Running processor: a definition plus its cycle accumulator.
#[derive(Debug, Clone)]
pub struct ResourceProcessor {
    definition: ProcessorDefinition,
    remaining_time: f64,
    consumption_results: BTreeMap<String, ProcessingResult>,
    production_results: BTreeMap<String, ProcessingResult>,
}

impl ResourceProcessor {
    pub fn new(mut definition: ProcessorDefinition) -> Self {
        if !(definition.seconds_per_cycle.is_finite() && definition.seconds_per_cycle > 0.0) {
            log::warn!(
                "processor {}: invalid cycle length {}, using {}",
                definition.name,
                definition.seconds_per_cycle,
                defaults::SECONDS_PER_CYCLE
            );
            definition.seconds_per_cycle = defaults::SECONDS_PER_CYCLE;
        }
        Self {
            definition,
            remaining_time: 0.0,
            consumption_results: BTreeMap::new(),
            production_results: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ProcessorDefinition {
        &self.definition
    }

    pub fn seconds_per_cycle(&self) -> f64 {
        self.definition.seconds_per_cycle
    }

    /// Time accumulated toward the next cycle.
    pub fn remaining_time(&self) -> f64 {
        self.remaining_time
    }

    /// Restore a persisted accumulator. Non-finite or negative values reset it.
    pub fn set_remaining_time(&mut self, seconds: f64) {
        self.remaining_time = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    }

    /// Swap in new rules and cycle length, keeping the accumulator.
    pub fn reconfigure(&mut self, definition: ProcessorDefinition) {
        let remaining = self.remaining_time;
        *self = Self::new(definition);
        self.remaining_time = remaining;
    }

    /// Whether a cycle is due.
    pub fn is_ready(&self) -> bool {
        self.remaining_time >= self.definition.seconds_per_cycle
    }

    /// Accumulate `elapsed` seconds and return how many whole cycles are due.
    ///
    /// The due cycles are consumed from the accumulator; the caller is
    /// expected to run them with [`Self::run_cycle`].
    pub fn advance(&mut self, elapsed: f64) -> u32 {
        if !(elapsed.is_finite() && elapsed > 0.0) {
            return 0;
        }
        self.remaining_time += elapsed;

        let cycle = self.definition.seconds_per_cycle;
        let due = (self.remaining_time / cycle).floor();
        if !due.is_finite() || due < 1.0 {
            return 0;
        }
        if due > f64::from(MAX_CYCLES_PER_ADVANCE) {
            log::warn!(
                "{}: {} cycles due, running {} and dropping the rest",
                self.definition.name,
                due,
                MAX_CYCLES_PER_ADVANCE
            );
            self.remaining_time = 0.0;
            return MAX_CYCLES_PER_ADVANCE;
        }
        self.remaining_time = (self.remaining_time - due * cycle).max(0.0);
        due as u32
    }

    /// Run exactly one cycle against `ledger`.
    pub fn run_cycle(&mut self, ledger: &mut dyn ResourceLedger, crew: CrewContext) -> CycleResults {
        let cycle_seconds = self.definition.seconds_per_cycle;
        self.consumption_results.clear();
        self.production_results.clear();

        let mut results = CycleResults {
            processor_name: self.definition.name.clone(),
            ..CycleResults::default()
        };

        for rule in &self.definition.inputs {
            let demand = rule.compute_demand(crew.crew_count, cycle_seconds);
            let result = rule.consume(ledger, demand, crew);
            self.consumption_results
                .insert(rule.resource_name.clone(), result.clone());
            results.consumption.push(result);
        }

        for rule in &self.definition.outputs {
            let base = rule.nominal_output(crew.crew_count, cycle_seconds, &self.consumption_results);
            let result = rule.produce(ledger, base, &self.consumption_results, crew);
            self.production_results
                .insert(rule.resource_name.clone(), result.clone());
            results.production.push(result);
        }

        log::debug!(
            "{}: cycle for {} crew, inputs ok = {}",
            self.definition.name,
            crew.crew_count,
            results.all_consumed()
        );
        results
    }

    /// Accumulate `elapsed` and run every cycle that became due.
    pub fn tick(
        &mut self,
        elapsed: f64,
        ledger: &mut dyn ResourceLedger,
        crew: CrewContext,
    ) -> Vec<CycleResults> {
        let cycles = self.advance(elapsed);
        let mut results = Vec::with_capacity(cycles as usize);
        for _ in 0..cycles {
            results.push(self.run_cycle(ledger, crew));
        }
        results
    }

    /// Last cycle's consumption results, keyed by resource name.
    pub fn consumption_results(&self) -> &BTreeMap<String, ProcessingResult> {
        &self.consumption_results
    }

    /// Last cycle's production results, keyed by resource name.
    pub fn production_results(&self) -> &BTreeMap<String, ProcessingResult> {
        &self.production_results
    }

    /// Net amount of `resource` drawn per cycle at the given crew size.
    pub fn demand_per_cycle(&self, resource: &str, crew_count: u32) -> f64 {
        let cycle_seconds = self.definition.seconds_per_cycle;
        self.definition
            .inputs
            .iter()
            .filter(|r| r.resource_name == resource)
            .map(|r| r.compute_demand(crew_count, cycle_seconds))
            .sum()
    }

    /// Seconds until `resource` runs out at the current crew size.
    ///
    /// `None` when the processor does not consume `resource` or nobody eats.
    /// Counts whole cycles the stock covers plus the time left before the
    /// next cycle.
    pub fn supply_duration(
        &self,
        ledger: &dyn ResourceLedger,
        resource: &str,
        crew_count: u32,
    ) -> Option<f64> {
        let per_cycle = self.demand_per_cycle(resource, crew_count);
        if per_cycle <= 0.0 {
            return None;
        }
        let full_cycles = (ledger.amount(resource) / per_cycle).floor();
        let until_next = self.definition.seconds_per_cycle - self.remaining_time;
        Some(full_cycles * self.definition.seconds_per_cycle + until_next.max(0.0))
    }
}
