//! Background converter catch-up for vessels that are not actively simulated.
//!
//! Each converter part on an unloaded vessel has a [`BackgroundConverterRecord`].
//! When enough time has passed the scheduler opens a [`ConversionJob`] for it
//! and walks the job through its phases, one phase per scheduler tick, so a
//! large fleet never stalls a single frame.

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use snacks_logic::constants::RESOURCE_EPSILON;
use snacks_logic::ledger::{ContainerLedger, ResourceLedger};

use crate::components::VesselId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConverterId(pub String);

impl ConverterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for the `module_index`-th converter module on a part.
    pub fn for_part(vessel: &VesselId, part_id: u32, module_index: u32) -> Self {
        Self(format!("{vessel}:{part_id}:{module_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConverterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Units per second for inputs and outputs, units per check for required
/// resources, units per yield cycle for yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRatio {
    pub resource_name: String,
    pub ratio: f64,
    #[serde(default)]
    pub dump_excess: bool,
}

impl ResourceRatio {
    pub fn new(resource_name: impl Into<String>, ratio: f64) -> Self {
        Self {
            resource_name: resource_name.into(),
            ratio,
            dump_excess: false,
        }
    }

    pub fn dumping(mut self) -> Self {
        self.dump_excess = true;
        self
    }
}

/// d100 roll table for yield resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YieldSettings {
    pub seconds_per_cycle: f64,
    pub minimum_success: u32,
    pub critical_success: u32,
    pub critical_fail: u32,
    pub critical_success_multiplier: f64,
    pub failure_multiplier: f64,
}

impl Default for YieldSettings {
    fn default() -> Self {
        Self {
            seconds_per_cycle: 3600.0,
            minimum_success: 40,
            critical_success: 95,
            critical_fail: 5,
            critical_success_multiplier: 1.5,
            failure_multiplier: 0.5,
        }
    }
}

impl YieldSettings {
    pub fn multiplier_for(&self, roll: u32) -> f64 {
        if roll <= self.critical_fail {
            0.0
        } else if roll >= self.critical_success {
            self.critical_success_multiplier
        } else if roll >= self.minimum_success {
            1.0
        } else {
            self.failure_multiplier
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterDefinition {
    pub module_name: String,
    pub inputs: Vec<ResourceRatio>,
    pub outputs: Vec<ResourceRatio>,
    pub required: Vec<ResourceRatio>,
    pub yields: Vec<ResourceRatio>,
    pub yield_settings: YieldSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundConverterRecord {
    pub converter_id: ConverterId,
    pub vessel_id: VesselId,
    pub is_activated: bool,
    pub is_missing_resources: bool,
    pub is_container_full: bool,
    pub input_efficiency: f64,
    pub output_efficiency: f64,
    pub last_update_time: f64,
    pub yield_elapsed: f64,
    pub definition: ConverterDefinition,
}

impl BackgroundConverterRecord {
    pub fn new(
        converter_id: ConverterId,
        vessel_id: VesselId,
        definition: ConverterDefinition,
        last_update_time: f64,
    ) -> Self {
        Self {
            converter_id,
            vessel_id,
            is_activated: true,
            is_missing_resources: false,
            is_container_full: false,
            input_efficiency: 1.0,
            output_efficiency: 1.0,
            last_update_time,
            yield_elapsed: 0.0,
            definition,
        }
    }

    pub fn can_run(&self) -> bool {
        self.is_activated && !self.is_missing_resources && !self.is_container_full
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPhase {
    Prepare,
    CheckRequired,
    ConsumeInputs,
    ProduceOutputs,
    ProduceYields,
    Finalize,
}

impl ConversionPhase {
    /// Inputs have left the ledger by the time a job reaches this phase.
    fn inputs_committed(self) -> bool {
        matches!(
            self,
            ConversionPhase::ProduceOutputs | ConversionPhase::ProduceYields | ConversionPhase::Finalize
        )
    }
}

/// An in-flight catch-up pass over one converter.
#[derive(Debug, Clone)]
struct ConversionJob {
    converter_id: ConverterId,
    now: f64,
    elapsed: f64,
    phase: ConversionPhase,
}

enum Step {
    Next(ConversionPhase),
    Done,
    Dropped,
}

/// Where the scheduler finds vessel ledgers.
pub trait LedgerSource {
    /// `None` for vessels the source does not know.
    fn is_loaded(&self, vessel: &VesselId) -> Option<bool>;

    fn ledger_mut(&mut self, vessel: &VesselId) -> Option<&mut dyn ResourceLedger>;
}

/// Snapshot ledgers; every vessel in the map counts as unloaded.
impl LedgerSource for BTreeMap<VesselId, ContainerLedger> {
    fn is_loaded(&self, vessel: &VesselId) -> Option<bool> {
        self.contains_key(vessel).then_some(false)
    }

    fn ledger_mut(&mut self, vessel: &VesselId) -> Option<&mut dyn ResourceLedger> {
        self.get_mut(vessel).map(|l| l as &mut dyn ResourceLedger)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerTick {
    pub started: usize,
    pub completed: usize,
    pub dropped: usize,
}

impl SchedulerTick {
    fn absorb(&mut self, other: SchedulerTick) {
        self.started += other.started;
        self.completed += other.completed;
        self.dropped += other.dropped;
    }
}

pub struct ConverterScheduler {
    records: BTreeMap<ConverterId, BackgroundConverterRecord>,
    jobs: Vec<ConversionJob>,
    rng: StdRng,
}

impl Default for ConverterScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterScheduler {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            records: BTreeMap::new(),
            jobs: Vec::new(),
            rng,
        }
    }

    /// Add or replace a record. A job already running for it is abandoned.
    pub fn register(&mut self, record: BackgroundConverterRecord) {
        let id = record.converter_id.clone();
        self.jobs.retain(|job| job.converter_id != id);
        self.records.insert(id, record);
    }

    pub fn remove(&mut self, id: &ConverterId) -> Option<BackgroundConverterRecord> {
        self.records.remove(id)
    }

    /// Drop every record on a vessel. Returns how many went.
    pub fn remove_vessel(&mut self, vessel: &VesselId) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| &r.vessel_id != vessel);
        before - self.records.len()
    }

    pub fn get(&self, id: &ConverterId) -> Option<&BackgroundConverterRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &ConverterId) -> Option<&mut BackgroundConverterRecord> {
        self.records.get_mut(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &BackgroundConverterRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn set_activated(&mut self, id: &ConverterId, activated: bool) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.is_activated = activated;
                true
            }
            None => false,
        }
    }

    /// Clear the missing-resources and container-full gates, e.g. after the
    /// player resupplies or empties the vessel.
    pub fn clear_blocked(&mut self, id: &ConverterId) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.is_missing_resources = false;
                record.is_container_full = false;
                true
            }
            None => false,
        }
    }

    /// Start jobs for records that are due, then advance every job one phase.
    pub fn tick(&mut self, now: f64, source: &mut dyn LedgerSource) -> SchedulerTick {
        let mut summary = SchedulerTick {
            started: self.start_jobs(now, source),
            ..Default::default()
        };
        summary.absorb(self.step_jobs(source));
        summary
    }

    /// Step all in-flight jobs to completion.
    pub fn run_until_idle(&mut self, source: &mut dyn LedgerSource) -> SchedulerTick {
        let mut summary = SchedulerTick::default();
        while !self.jobs.is_empty() {
            summary.absorb(self.step_jobs(source));
        }
        summary
    }

    /// Start due jobs and finish them immediately.
    pub fn catch_up(&mut self, now: f64, source: &mut dyn LedgerSource) -> SchedulerTick {
        let mut summary = self.tick(now, source);
        summary.absorb(self.run_until_idle(source));
        summary
    }

    fn start_jobs(&mut self, now: f64, source: &dyn LedgerSource) -> usize {
        let mut started = 0;
        for record in self.records.values_mut() {
            if self.jobs.iter().any(|j| j.converter_id == record.converter_id) {
                continue;
            }
            match source.is_loaded(&record.vessel_id) {
                None => continue,
                Some(true) => {
                    record.last_update_time = record.last_update_time.max(now);
                    continue;
                }
                Some(false) => {}
            }
            if !record.can_run() {
                record.last_update_time = now;
                continue;
            }
            let elapsed = now - record.last_update_time;
            if !elapsed.is_finite() || elapsed <= 0.0 {
                continue;
            }
            self.jobs.push(ConversionJob {
                converter_id: record.converter_id.clone(),
                now,
                elapsed,
                phase: ConversionPhase::Prepare,
            });
            started += 1;
        }
        started
    }

    fn step_jobs(&mut self, source: &mut dyn LedgerSource) -> SchedulerTick {
        let mut summary = SchedulerTick::default();
        for mut job in std::mem::take(&mut self.jobs) {
            match self.step(&job, source) {
                Step::Next(phase) => {
                    job.phase = phase;
                    self.jobs.push(job);
                }
                Step::Done => summary.completed += 1,
                Step::Dropped => summary.dropped += 1,
            }
        }
        summary
    }

    fn step(&mut self, job: &ConversionJob, source: &mut dyn LedgerSource) -> Step {
        let Some(record) = self.records.get_mut(&job.converter_id) else {
            return Step::Dropped;
        };
        // Once inputs are taken the job runs to Finalize, loaded or not.
        if source.is_loaded(&record.vessel_id) != Some(false) && !job.phase.inputs_committed() {
            return Step::Dropped;
        }
        let Some(ledger) = source.ledger_mut(&record.vessel_id) else {
            return Step::Dropped;
        };

        log::debug!("{} {:?}", job.converter_id, job.phase);
        match job.phase {
            ConversionPhase::Prepare => Step::Next(ConversionPhase::CheckRequired),
            ConversionPhase::CheckRequired => {
                let satisfied = record
                    .definition
                    .required
                    .iter()
                    .all(|r| ledger.amount(&r.resource_name) >= r.ratio - RESOURCE_EPSILON);
                if satisfied {
                    Step::Next(ConversionPhase::ConsumeInputs)
                } else {
                    record.is_missing_resources = true;
                    Step::Next(ConversionPhase::Finalize)
                }
            }
            ConversionPhase::ConsumeInputs => {
                let scale = job.elapsed * record.input_efficiency;
                let short = record.definition.inputs.iter().any(|r| {
                    ledger.amount(&r.resource_name) < r.ratio * scale - RESOURCE_EPSILON
                });
                if short {
                    record.is_missing_resources = true;
                    return Step::Next(ConversionPhase::Finalize);
                }
                for input in &record.definition.inputs {
                    ledger.request(&input.resource_name, input.ratio * scale);
                }
                Step::Next(ConversionPhase::ProduceOutputs)
            }
            ConversionPhase::ProduceOutputs => {
                let scale = job.elapsed * record.output_efficiency;
                for output in &record.definition.outputs {
                    if !store(ledger, output, output.ratio * scale) {
                        record.is_container_full = true;
                    }
                }
                Step::Next(ConversionPhase::ProduceYields)
            }
            ConversionPhase::ProduceYields => {
                produce_yields(record, ledger, &mut self.rng, job.elapsed);
                Step::Next(ConversionPhase::Finalize)
            }
            ConversionPhase::Finalize => {
                record.last_update_time = job.now;
                Step::Done
            }
        }
    }
}

/// Deposit `amount`; false when some of it had nowhere to go and the
/// resource is not dumped.
fn store(ledger: &mut dyn ResourceLedger, ratio: &ResourceRatio, amount: f64) -> bool {
    if amount <= 0.0 {
        return true;
    }
    let stored = ledger.deposit(&ratio.resource_name, amount);
    stored >= amount - RESOURCE_EPSILON || ratio.dump_excess
}

fn produce_yields(
    record: &mut BackgroundConverterRecord,
    ledger: &mut dyn ResourceLedger,
    rng: &mut StdRng,
    elapsed: f64,
) {
    let period = record.definition.yield_settings.seconds_per_cycle;
    if record.definition.yields.is_empty() || !period.is_finite() || period <= 0.0 {
        record.yield_elapsed = 0.0;
        return;
    }

    record.yield_elapsed += elapsed;
    let cycles = (record.yield_elapsed / period).floor();
    record.yield_elapsed -= cycles * period;

    for _ in 0..cycles as u64 {
        let roll = rng.gen_range(1..=100u32);
        let multiplier = record.definition.yield_settings.multiplier_for(roll);
        log::debug!("{} yield roll {roll} -> x{multiplier}", record.converter_id);
        for yielded in &record.definition.yields {
            if !store(ledger, yielded, yielded.ratio * multiplier) {
                record.is_container_full = true;
            }
        }
    }
}
