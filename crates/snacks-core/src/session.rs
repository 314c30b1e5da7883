//! Snacks session - main entry point for running life support.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;
use snacks_logic::config::LoadedConfig;
use snacks_logic::constants::{resources, SNACKS_PROCESSOR_NAME};
use snacks_logic::ledger::{ContainerLedger, ResourceLedger};
use snacks_logic::processor::{ProcessorDefinition, ResourceProcessor};
use snacks_logic::result::CrewContext;
use snacks_logic::settings::SnacksSettings;

use crate::components::*;
use crate::persistence::{self, ProcessorState, SaveError};
use crate::roster::AstronautRoster;
use crate::systems::*;

/// Explicit session context: every vessel, processor, crew record and
/// background converter the host has registered.
pub struct SnacksSession {
    /// ECS world; one entity per vessel
    pub world: World,
    vessel_index: HashMap<VesselId, Entity>,
    processors: Vec<ResourceProcessor>,
    roster: AstronautRoster,
    converters: ConverterScheduler,
    settings: SnacksSettings,
    /// Simulation time in seconds since start
    sim_time: f64,
    rng: StdRng,
}

impl SnacksSession {
    pub fn new(settings: SnacksSettings, processors: Vec<ProcessorDefinition>) -> Self {
        let mut roster = AstronautRoster::new();
        roster.set_exempt_names(settings.exempt_crew.iter().cloned());
        Self {
            world: World::new(),
            vessel_index: HashMap::new(),
            processors: processors.into_iter().map(ResourceProcessor::new).collect(),
            roster,
            converters: ConverterScheduler::new(),
            settings,
            sim_time: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_config(config: LoadedConfig) -> Self {
        Self::new(config.settings, config.processors)
    }

    /// Fix the random streams (crew selection and yield rolls).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        let records: Vec<_> = self.converters.records().cloned().collect();
        self.converters = ConverterScheduler::with_seed(seed.wrapping_add(1));
        for record in records {
            self.converters.register(record);
        }
        self
    }

    // ---- vessels ----

    /// Register a vessel, replacing any vessel with the same id.
    pub fn add_vessel(
        &mut self,
        vessel: Vessel,
        ledger: ContainerLedger,
        manifest: CrewManifest,
        loaded: bool,
    ) -> Entity {
        let id = vessel.id.clone();
        if let Some(old) = self.vessel_index.remove(&id) {
            if self.world.despawn(old).is_err() {
                log::warn!("vessel {id} was indexed without a live entity");
            }
        }
        log::info!("vessel {} ({}) added with {} crew", id, vessel.name, manifest.crew.len());
        let entity = self
            .world
            .spawn((vessel, ledger, manifest, SimulationState::from_loaded(loaded)));
        self.vessel_index.insert(id, entity);
        entity
    }

    /// Drop a vessel and its background converters. Crew records stay.
    pub fn remove_vessel(&mut self, id: &VesselId) -> bool {
        let Some(entity) = self.vessel_index.remove(id) else {
            return false;
        };
        if self.world.despawn(entity).is_err() {
            log::warn!("vessel {id} was indexed without a live entity");
        }
        let converters = self.converters.remove_vessel(id);
        log::info!("vessel {id} removed ({converters} converters)");
        true
    }

    pub fn set_loaded(&mut self, id: &VesselId, loaded: bool) -> bool {
        self.component_mut::<SimulationState>(id)
            .map(|state| *state = SimulationState::from_loaded(loaded))
            .is_some()
    }

    pub fn set_crew(&mut self, id: &VesselId, manifest: CrewManifest) -> bool {
        self.component_mut::<CrewManifest>(id)
            .map(|current| *current = manifest)
            .is_some()
    }

    pub fn ledger_mut(&mut self, id: &VesselId) -> Option<&mut ContainerLedger> {
        self.component_mut::<ContainerLedger>(id)
    }

    pub fn ledger_snapshot(&self, id: &VesselId) -> Option<ContainerLedger> {
        let entity = *self.vessel_index.get(id)?;
        self.world
            .get::<&ContainerLedger>(entity)
            .ok()
            .map(|ledger| (*ledger).clone())
    }

    pub fn has_vessel(&self, id: &VesselId) -> bool {
        self.vessel_index.contains_key(id)
    }

    pub fn vessel_count(&self) -> usize {
        self.vessel_index.len()
    }

    fn component_mut<T: hecs::Component>(&mut self, id: &VesselId) -> Option<&mut T> {
        let entity = *self.vessel_index.get(id)?;
        self.world.query_one_mut::<&mut T>(entity).ok()
    }

    // ---- converters and crew ----

    pub fn register_converter(&mut self, record: BackgroundConverterRecord) {
        self.converters.register(record);
    }

    pub fn converters(&self) -> &ConverterScheduler {
        &self.converters
    }

    pub fn converters_mut(&mut self) -> &mut ConverterScheduler {
        &mut self.converters
    }

    pub fn roster(&self) -> &AstronautRoster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut AstronautRoster {
        &mut self.roster
    }

    // ---- simulation ----

    /// Advance the session by `delta_seconds`.
    ///
    /// Every due processor cycle runs against every vessel with at least one
    /// eater, in processor order. Then the background scheduler starts due
    /// converter jobs and steps in-flight ones by one phase.
    pub fn update(&mut self, delta_seconds: f64) -> Vec<DeficitReport> {
        let delta = if delta_seconds.is_finite() { delta_seconds.max(0.0) } else { 0.0 };
        self.sim_time += delta;

        let mut reports = Vec::new();
        for processor in &mut self.processors {
            let cycles = processor.advance(delta);
            for _ in 0..cycles {
                for (_, (vessel, ledger, manifest)) in self
                    .world
                    .query_mut::<(&Vessel, &mut ContainerLedger, &CrewManifest)>()
                {
                    let eaters = self.roster.eaters(&manifest.crew);
                    if eaters.is_empty() {
                        continue;
                    }
                    let crew = CrewContext::new(eaters.len() as u32, manifest.capacity);
                    let results = processor.run_cycle(ledger, crew);
                    reports.push(account_cycle(
                        &mut self.roster,
                        &mut self.rng,
                        &vessel.id,
                        &eaters,
                        results,
                        resources::SNACKS,
                    ));
                }
            }
        }

        let mut ledgers = WorldLedgers {
            world: &mut self.world,
            index: &self.vessel_index,
        };
        let tick = self.converters.tick(self.sim_time, &mut ledgers);
        if tick != SchedulerTick::default() {
            log::debug!("background converters: {tick:?}");
        }
        reports
    }

    /// Finish every converter catch-up at the current time.
    pub fn catch_up_background(&mut self) -> SchedulerTick {
        let mut ledgers = WorldLedgers {
            world: &mut self.world,
            index: &self.vessel_index,
        };
        self.converters.catch_up(self.sim_time, &mut ledgers)
    }

    /// Swap settings and re-derive the built-in processor.
    pub fn apply_settings(&mut self, settings: SnacksSettings) {
        if let Some(processor) = self
            .processors
            .iter_mut()
            .find(|p| p.name() == SNACKS_PROCESSOR_NAME)
        {
            processor.reconfigure(settings.snacks_processor());
        }
        self.roster.set_exempt_names(settings.exempt_crew.iter().cloned());
        self.settings = settings;
    }

    pub fn settings(&self) -> &SnacksSettings {
        &self.settings
    }

    pub fn processor(&self, name: &str) -> Option<&ResourceProcessor> {
        self.processors.iter().find(|p| p.name() == name)
    }

    pub fn processors(&self) -> &[ResourceProcessor] {
        &self.processors
    }

    /// Seconds until `resource` runs out on a vessel, across every processor
    /// that consumes it. `None` when nothing aboard consumes it.
    pub fn supply_estimate(&self, id: &VesselId, resource: &str) -> Option<f64> {
        let entity = *self.vessel_index.get(id)?;
        let mut query = self
            .world
            .query_one::<(&ContainerLedger, &CrewManifest)>(entity)
            .ok()?;
        let (ledger, manifest) = query.get()?;
        let eaters = manifest
            .crew
            .iter()
            .filter(|name| !self.roster.is_exempt(name))
            .count() as u32;

        let per_second: f64 = self
            .processors
            .iter()
            .map(|p| p.demand_per_cycle(resource, eaters) / p.seconds_per_cycle())
            .sum();
        if per_second <= 0.0 {
            return None;
        }
        Some(ledger.amount(resource) / per_second)
    }

    /// Simulation time in seconds
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    // ---- persistence ----

    /// Save processor timing, converters and crew records. Vessels belong to
    /// the host and are re-added by it.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        let processors: Vec<ProcessorState> = self
            .processors
            .iter()
            .map(|p| ProcessorState {
                name: p.name().to_string(),
                remaining_time: p.remaining_time(),
            })
            .collect();
        let converters: Vec<_> = self.converters.records().collect();
        let astronauts: Vec<_> = self.roster.iter().collect();
        persistence::save_session(writer, self.sim_time, &processors, &converters, &astronauts)
    }

    /// Restore saved state, then catch up converters on vessels already
    /// registered.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = persistence::load_session(reader)?;

        self.sim_time = loaded.sim_time;
        for state in loaded.processors {
            match self.processors.iter_mut().find(|p| p.name() == state.name) {
                Some(processor) => processor.set_remaining_time(state.remaining_time),
                None => log::warn!("saved processor {} no longer configured", state.name),
            }
        }

        let mut roster = AstronautRoster::new();
        for record in loaded.astronauts {
            roster.insert(record);
        }
        roster.set_exempt_names(self.settings.exempt_crew.iter().cloned());
        self.roster = roster;

        for record in loaded.converters {
            self.converters.register(record);
        }
        let tick = self.catch_up_background();
        log::info!(
            "session loaded at t={}s: {} crew, {} converters ({} caught up)",
            self.sim_time,
            self.roster.len(),
            self.converters.len(),
            tick.completed
        );
        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SaveError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), SaveError> {
        self.load(BufReader::new(File::open(path)?))
    }
}

impl Default for SnacksSession {
    fn default() -> Self {
        let settings = SnacksSettings::default();
        let builtin = settings.snacks_processor();
        Self::new(settings, vec![builtin])
    }
}

/// Vessel ledgers as seen by the background scheduler.
struct WorldLedgers<'a> {
    world: &'a mut World,
    index: &'a HashMap<VesselId, Entity>,
}

impl LedgerSource for WorldLedgers<'_> {
    fn is_loaded(&self, vessel: &VesselId) -> Option<bool> {
        let entity = *self.index.get(vessel)?;
        self.world
            .get::<&SimulationState>(entity)
            .ok()
            .map(|state| state.is_loaded())
    }

    fn ledger_mut(&mut self, vessel: &VesselId) -> Option<&mut dyn ResourceLedger> {
        let entity = *self.index.get(vessel)?;
        self.world
            .query_one_mut::<&mut ContainerLedger>(entity)
            .ok()
            .map(|ledger| ledger as &mut dyn ResourceLedger)
    }
}
