//! Snacks Headless Simulation Harness
//!
//! Validates the life-support cycle engine and the shipped configuration
//! without a host game. Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p snacks-simtest
//!   cargo run -p snacks-simtest -- --verbose

use std::collections::BTreeMap;

use serde::Deserialize;
use snacks_core::prelude::*;
use snacks_core::systems::{
    BackgroundConverterRecord, ConverterDefinition, ConverterId, ResourceRatio, YieldSettings,
};
use snacks_logic::config::{self, LoadedConfig};
use snacks_logic::constants::{resources, SNACKS_PROCESSOR_NAME};
use snacks_logic::ledger::{ContainerLedger, ResourceContainer, ResourceLedger};
use snacks_logic::processor::{ProcessorDefinition, ResourceProcessor};
use snacks_logic::result::{CrewContext, ProcessingResult};
use snacks_logic::rule::ProcessedResource;
use snacks_logic::settings::{PenaltySettings, SnacksSettings};

// ── Shipped configuration (same JSON a host loads) ──────────────────────
const CONFIG_JSON: &str = include_str!("../../../data/snacks.json");

/// Strict view of the document, to cross-check the lenient loader.
#[derive(Debug, Deserialize)]
struct StrictDocument {
    settings: SnacksSettings,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    let filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    println!("=== Snacks Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Shipped configuration
    results.extend(validate_config(verbose));

    // 2. Ledger bounds
    results.extend(validate_ledger(verbose));

    // 3. Processor cycles
    results.extend(validate_processor(verbose));

    // 4. Multi-vessel session
    results.extend(validate_session(verbose));

    // 5. Background converters
    results.extend(validate_background(verbose));

    // 6. Outcome dispatch
    results.extend(validate_outcomes(verbose));

    // 7. Save/load
    results.extend(validate_persistence(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn load_shipped() -> Option<LoadedConfig> {
    config::load_config(CONFIG_JSON).ok()
}

fn pantry(snacks: f64, soil: f64) -> ContainerLedger {
    ContainerLedger::new()
        .with_container(ResourceContainer::new(resources::SNACKS, snacks, 200.0))
        .with_container(ResourceContainer::new(resources::SOIL, soil, 200.0))
}

fn manifest(names: &[&str]) -> CrewManifest {
    CrewManifest::new(names.iter().map(|n| n.to_string()).collect(), 0)
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let loaded = match config::load_config(CONFIG_JSON) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult {
                name: "config_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return results;
        }
    };

    results.push(TestResult {
        name: "config_clean".into(),
        passed: loaded.issues.is_empty(),
        detail: format!("{} recovered issues", loaded.issues.len()),
    });

    let names: Vec<&str> = loaded.processors.iter().map(|p| p.name.as_str()).collect();
    results.push(TestResult {
        name: "config_builtin_first".into(),
        passed: names.first() == Some(&SNACKS_PROCESSOR_NAME) && names.len() == 2,
        detail: format!("processors: {}", names.join(", ")),
    });

    let strict: Result<StrictDocument, _> = serde_json::from_str(CONFIG_JSON);
    let agrees = strict.map(|doc| doc.settings == loaded.settings);
    results.push(TestResult {
        name: "config_strict_agrees".into(),
        passed: matches!(agrees, Ok(true)),
        detail: format!("strict == lenient: {:?}", agrees.map_err(|e| e.to_string())),
    });

    let recycler = loaded.processors.iter().find(|p| p.name == "Soil Recycler");
    let throttled = recycler.is_some_and(|p| {
        p.outputs
            .iter()
            .all(|o| o.related_resource_name.as_deref() == Some(resources::SOIL))
    });
    results.push(TestResult {
        name: "config_recycler_throttled".into(),
        passed: throttled,
        detail: "recycler output follows Soil supply".into(),
    });

    let damaged = r#"{ "settings": { "meals_per_day": "often" }, "processors": [ { "seconds_per_cycle": 60 } ] }"#;
    let recovered = config::load_config(damaged);
    results.push(TestResult {
        name: "config_lenient_recovery".into(),
        passed: recovered
            .as_ref()
            .is_ok_and(|c| c.issues.len() == 2 && c.processors.len() == 1),
        detail: match &recovered {
            Ok(c) => format!("{} issues, {} processors", c.issues.len(), c.processors.len()),
            Err(e) => e.to_string(),
        },
    });

    if verbose {
        let s = &loaded.settings;
        println!(
            "  {} snacks/meal, {} meals per {}s day, exempt: {}",
            s.snacks_per_meal,
            s.meals_per_day,
            s.day_length_seconds,
            s.exempt_crew.join(", ")
        );
    }

    results
}

// ── 2. Ledger ───────────────────────────────────────────────────────────

fn validate_ledger(_verbose: bool) -> Vec<TestResult> {
    println!("--- Ledger ---");
    let mut results = Vec::new();

    let mut worst_over = 0.0f64;
    let mut negative = false;
    for step in 0..200 {
        let amount = f64::from(step) * 0.37;
        let mut ledger = ContainerLedger::new()
            .with_container(ResourceContainer::new("Snacks", 10.0, 20.0))
            .with_container(ResourceContainer::new("Snacks", 5.0, 5.0));
        let before = ledger.amount("Snacks");
        let got = ledger.request("Snacks", amount);
        worst_over = worst_over.max(got - amount);
        negative |= ledger.containers().iter().any(|c| c.amount() < 0.0);
        negative |= !close(before - got, ledger.amount("Snacks"));
    }
    results.push(TestResult {
        name: "ledger_request_bounded".into(),
        passed: worst_over <= 0.0 && !negative,
        detail: format!("max over-supply {worst_over}, negative/leak = {negative}"),
    });

    let mut overfull = false;
    for step in 0..200 {
        let mut ledger = pantry(150.0, 0.0);
        let put = ledger.deposit("Snacks", f64::from(step));
        overfull |= ledger.containers().iter().any(|c| c.amount() > c.max_amount());
        overfull |= put > f64::from(step);
    }
    results.push(TestResult {
        name: "ledger_deposit_bounded".into(),
        passed: !overfull,
        detail: "no container above capacity".into(),
    });

    let mut split = pantry(7.0, 0.0);
    let mut single = pantry(7.0, 0.0);
    let split_total: f64 = (0..4).map(|_| split.request("Snacks", 2.5)).sum();
    let single_total = single.request("Snacks", 10.0);
    results.push(TestResult {
        name: "ledger_monotonic".into(),
        passed: close(split_total, single_total),
        detail: format!("4 x 2.5 -> {split_total}, 1 x 10 -> {single_total}"),
    });

    let mut empty = ContainerLedger::new();
    results.push(TestResult {
        name: "ledger_missing_container".into(),
        passed: empty.deposit("Snacks", 3.0) == 0.0,
        detail: "deposit into nothing stores nothing".into(),
    });

    results
}

// ── 3. Processor ────────────────────────────────────────────────────────

fn validate_processor(verbose: bool) -> Vec<TestResult> {
    println!("--- Processor Cycles ---");
    let mut results = Vec::new();
    let settings = SnacksSettings::default();
    let day = settings.seconds_per_meal();

    // tick(0) changes nothing
    let mut processor = ResourceProcessor::new(settings.snacks_processor());
    let mut ledger = pantry(10.0, 0.0);
    processor.tick(day / 2.0, &mut ledger, CrewContext::new(2, 2));
    let remaining = processor.remaining_time();
    let cycles = processor.tick(0.0, &mut ledger, CrewContext::new(2, 2));
    results.push(TestResult {
        name: "processor_tick_zero".into(),
        passed: cycles.is_empty() && processor.remaining_time() == remaining && ledger.amount("Snacks") == 10.0,
        detail: format!("accumulator {remaining}s untouched"),
    });

    // 3 crew, 1.5 Snacks: all eaten, 1.5 Soil, partial failure
    let mut processor = ResourceProcessor::new(settings.snacks_processor());
    let mut ledger = pantry(1.5, 0.0);
    let cycles = processor.tick(day, &mut ledger, CrewContext::new(3, 3));
    let snack = cycles
        .first()
        .and_then(|c| c.consumption.first())
        .cloned();
    let passed = snack.as_ref().is_some_and(|r: &ProcessingResult| {
        !r.completed_successfully && close(r.transferred_amount, 1.5) && r.affected_crew_count == 2
    }) && close(ledger.amount("Soil"), 1.5)
        && ledger.amount("Snacks") == 0.0;
    results.push(TestResult {
        name: "processor_partial_starvation".into(),
        passed,
        detail: format!(
            "snacks {} soil {} affected {:?}",
            ledger.amount("Snacks"),
            ledger.amount("Soil"),
            snack.map(|r| r.affected_crew_count)
        ),
    });

    // N cycles at once == N single cycles
    let mut batched = ResourceProcessor::new(settings.snacks_processor());
    let mut stepped = ResourceProcessor::new(settings.snacks_processor());
    let mut batched_ledger = pantry(9.0, 0.0);
    let mut stepped_ledger = pantry(9.0, 0.0);
    let batched_cycles = batched.tick(day * 5.0, &mut batched_ledger, CrewContext::new(2, 4)).len();
    for _ in 0..5 {
        stepped.tick(day, &mut stepped_ledger, CrewContext::new(2, 4));
    }
    results.push(TestResult {
        name: "processor_catch_up".into(),
        passed: batched_cycles == 5 && batched_ledger == stepped_ledger,
        detail: format!(
            "{} cycles; snacks {} vs {}",
            batched_cycles,
            batched_ledger.amount("Snacks"),
            stepped_ledger.amount("Snacks")
        ),
    });

    // Half-supplied input halves the related output
    let definition = ProcessorDefinition::new("Composter", 60.0)
        .with_input(ProcessedResource::input("Scraps", 2.0))
        .with_output(ProcessedResource::output("Fertilizer", 1.0).related_to("Scraps"));
    let mut processor = ResourceProcessor::new(definition);
    let mut ledger = ContainerLedger::new()
        .with_container(ResourceContainer::new("Scraps", 2.0, 10.0))
        .with_container(ResourceContainer::new("Fertilizer", 0.0, 10.0));
    processor.tick(60.0, &mut ledger, CrewContext::new(2, 2));
    let made = ledger.amount("Fertilizer");
    results.push(TestResult {
        name: "processor_related_throttle".into(),
        passed: close(made, 2.0),
        detail: format!("50% scraps -> {made} of 4 fertilizer"),
    });

    if verbose {
        let p = ResourceProcessor::new(settings.snacks_processor());
        let left = p.supply_duration(&pantry(12.0, 0.0), resources::SNACKS, 4);
        println!("  12 snacks for 4 crew last {:?}s", left);
    }

    results
}

// ── 4. Session ──────────────────────────────────────────────────────────

fn validate_session(verbose: bool) -> Vec<TestResult> {
    println!("--- Session ---");
    let mut results = Vec::new();
    let Some(loaded) = load_shipped() else {
        return results;
    };
    let day = loaded.settings.seconds_per_meal();
    let mut session = SnacksSession::from_config(loaded).with_seed(7);

    session.add_vessel(
        Vessel::new("ksc-1", "Kerbal X"),
        pantry(30.0, 0.0),
        manifest(&["Jebediah Kerman", "Bill Kerman", "Bob Kerman"]),
        true,
    );
    session.add_vessel(
        Vessel::new("mun-base", "Mun Base"),
        pantry(4.0, 0.0),
        manifest(&["Valentina Kerman", "Wernher von Kerman", "Gene Kerman"]),
        false,
    );
    session.add_vessel(Vessel::new("probe", "Relay"), ContainerLedger::new(), manifest(&[]), false);

    let mut reports = Vec::new();
    for _ in 0..10 {
        reports.extend(session.update(day));
    }

    let probe_reports = reports.iter().filter(|r| r.vessel_id.as_str() == "probe").count();
    results.push(TestResult {
        name: "session_skips_uncrewed".into(),
        passed: probe_reports == 0,
        detail: format!("{} reports for the relay", probe_reports),
    });

    let exempt_untouched = ["Wernher von Kerman", "Gene Kerman"].iter().all(|n| {
        session
            .roster()
            .get(n)
            .is_some_and(|r| r.is_exempt && r.meals_missed == 0)
    });
    results.push(TestResult {
        name: "session_exempt_crew".into(),
        passed: exempt_untouched,
        detail: "exempt crew never miss meals".into(),
    });

    let val = session.roster().get("Valentina Kerman").map(|r| r.meals_missed);
    let jeb = session.roster().get("Jebediah Kerman").map(|r| r.meals_missed);
    results.push(TestResult {
        name: "session_starvation_counters".into(),
        passed: jeb == Some(0) && val.is_some_and(|m| m > 0),
        detail: format!("Jeb missed {:?}, Val missed {:?}", jeb, val),
    });

    let no_negative = ["ksc-1", "mun-base"].iter().all(|id| {
        session
            .ledger_snapshot(&VesselId::new(*id))
            .is_some_and(|l| l.containers().iter().all(|c| c.amount() >= 0.0))
    });
    results.push(TestResult {
        name: "session_no_negative_stock".into(),
        passed: no_negative,
        detail: format!("{} cycle reports over 10 days", reports.len()),
    });

    if verbose {
        for id in ["ksc-1", "mun-base"] {
            let vessel = VesselId::new(id);
            if let Some(ledger) = session.ledger_snapshot(&vessel) {
                println!(
                    "  {}: snacks {:.2}, soil {:.2}, supply {:?}s",
                    id,
                    ledger.amount(resources::SNACKS),
                    ledger.amount(resources::SOIL),
                    session.supply_estimate(&vessel, resources::SNACKS)
                );
            }
        }
    }

    results
}

// ── 5. Background converters ────────────────────────────────────────────

fn greenhouse() -> ConverterDefinition {
    ConverterDefinition {
        module_name: "Greenhouse".into(),
        inputs: vec![ResourceRatio::new(resources::SOIL, 0.0001)],
        outputs: vec![ResourceRatio::new(resources::SNACKS, 0.0001)],
        yields: vec![ResourceRatio::new(resources::SNACKS, 1.0)],
        yield_settings: YieldSettings {
            seconds_per_cycle: 21600.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn validate_background(_verbose: bool) -> Vec<TestResult> {
    println!("--- Background Converters ---");
    let mut results = Vec::new();

    let mut session = SnacksSession::default().with_seed(99);
    let base = VesselId::new("minmus-farm");
    session.add_vessel(Vessel::new("minmus-farm", "Minmus Farm"), pantry(0.0, 50.0), manifest(&[]), false);
    session.register_converter(BackgroundConverterRecord::new(
        ConverterId::for_part(&base, 4, 0),
        base.clone(),
        greenhouse(),
        0.0,
    ));

    // One phase per tick: six small updates finish one pass.
    let mut in_flight = Vec::new();
    for _ in 0..6 {
        session.update(1.0);
        in_flight.push(session.converters().in_flight());
    }
    results.push(TestResult {
        name: "background_phased".into(),
        passed: in_flight == [1, 1, 1, 1, 1, 0],
        detail: format!("jobs in flight per tick: {:?}", in_flight),
    });

    // A long absence catches up in one pass.
    session.update(10.0 * 21600.0);
    let tick = session.catch_up_background();
    let ledger = session.ledger_snapshot(&base).unwrap_or_default();
    let soil_used = 50.0 - ledger.amount(resources::SOIL);
    results.push(TestResult {
        name: "background_catch_up".into(),
        passed: tick.completed == 1 && close(soil_used, 0.0001 * (6.0 + 10.0 * 21600.0)),
        detail: format!(
            "soil used {:.4}, snacks {:.4} (yields rolled)",
            soil_used,
            ledger.amount(resources::SNACKS)
        ),
    });

    // Loaded vessels belong to the host.
    session.set_loaded(&base, true);
    let before = session.ledger_snapshot(&base);
    session.update(21600.0);
    session.catch_up_background();
    results.push(TestResult {
        name: "background_skips_loaded".into(),
        passed: session.ledger_snapshot(&base) == before,
        detail: "no background conversion while loaded".into(),
    });

    // Running dry blocks the converter until cleared.
    let mut session = SnacksSession::default().with_seed(3);
    let dry = VesselId::new("dry");
    session.add_vessel(Vessel::new("dry", "Dry Dock"), pantry(0.0, 0.0), manifest(&[]), false);
    let id = ConverterId::for_part(&dry, 1, 0);
    session.register_converter(BackgroundConverterRecord::new(id.clone(), dry, greenhouse(), 0.0));
    session.update(100.0);
    session.catch_up_background();
    let blocked = session.converters().get(&id).is_some_and(|r| r.is_missing_resources);
    results.push(TestResult {
        name: "background_missing_resources".into(),
        passed: blocked,
        detail: "empty soil marks the converter blocked".into(),
    });

    results
}

// ── 6. Outcomes ─────────────────────────────────────────────────────────

/// Fainting as configured in the penalty settings.
struct Fainting {
    penalties: PenaltySettings,
    fainted: BTreeMap<VesselId, Vec<String>>,
}

impl Outcome for Fainting {
    fn name(&self) -> &str {
        "Fainting"
    }

    fn is_enabled(&self) -> bool {
        self.penalties.fainting_enabled
    }

    fn apply_outcome(
        &mut self,
        vessel: &VesselId,
        _result: &ProcessingResult,
        affected: &[String],
        roster: &mut AstronautRoster,
    ) {
        let fainted = self.fainted.entry(vessel.clone()).or_default();
        for name in affected {
            if roster.get_or_create(name).add_condition(conditions::FAINTED) {
                fainted.push(name.clone());
            }
        }
    }

    fn remove_outcome(&mut self, vessel: &VesselId, roster: &mut AstronautRoster) {
        for name in self.fainted.remove(vessel).unwrap_or_default() {
            if let Some(record) = roster.get_mut(&name) {
                record.remove_condition(conditions::FAINTED);
            }
        }
    }
}

fn validate_outcomes(_verbose: bool) -> Vec<TestResult> {
    println!("--- Outcomes ---");
    let mut results = Vec::new();
    let Some(loaded) = load_shipped() else {
        return results;
    };
    let penalties = loaded.settings.penalties.clone();
    let day = loaded.settings.seconds_per_meal();
    let mut session = SnacksSession::from_config(loaded).with_seed(5);
    let mut registry = OutcomeRegistry::new();
    registry.register(
        resources::SNACKS,
        penalties.meals_before_fainting,
        Box::new(Fainting {
            penalties: penalties.clone(),
            fainted: BTreeMap::new(),
        }),
    );

    let ship = VesselId::new("hungry");
    session.add_vessel(Vessel::new("hungry", "Hungry Hauler"), pantry(0.0, 0.0), manifest(&["Jeb"]), true);

    let mut first_faint = None;
    for meal in 1..=penalties.meals_before_fainting + 1 {
        for report in session.update(day) {
            let roster = session.roster_mut();
            if registry.dispatch(&report, roster) > 0 && first_faint.is_none() {
                first_faint = Some(meal);
            }
        }
    }
    results.push(TestResult {
        name: "outcome_threshold".into(),
        passed: first_faint == Some(penalties.meals_before_fainting),
        detail: format!("fainted at meal {:?}", first_faint),
    });

    if let Some(ledger) = session.ledger_mut(&ship) {
        ledger.deposit(resources::SNACKS, 5.0);
    }
    for report in session.update(day) {
        registry.dispatch(&report, session.roster_mut());
    }
    let recovered = session
        .roster()
        .get("Jeb")
        .is_some_and(|r| !r.has_condition(conditions::FAINTED) && r.meals_missed == 0);
    results.push(TestResult {
        name: "outcome_recovery".into(),
        passed: recovered,
        detail: "a full meal lifts the condition".into(),
    });

    results
}

// ── 7. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(_verbose: bool) -> Vec<TestResult> {
    println!("--- Save/Load ---");
    let mut results = Vec::new();

    let mut session = SnacksSession::default().with_seed(11);
    let base = VesselId::new("duna-base");
    session.add_vessel(Vessel::new("duna-base", "Duna Base"), pantry(2.0, 50.0), manifest(&["Jeb", "Bill", "Bob"]), false);
    let mut record = BackgroundConverterRecord::new(ConverterId::for_part(&base, 9, 1), base.clone(), greenhouse(), 0.0);
    record.output_efficiency = 0.1 + 0.2;
    session.register_converter(record);
    session.update(21600.0 * 1.3);

    let mut buffer = Vec::new();
    if let Err(e) = session.save(&mut buffer) {
        results.push(TestResult {
            name: "save".into(),
            passed: false,
            detail: e.to_string(),
        });
        return results;
    }

    let mut restored = SnacksSession::default();
    let load = restored.load(&buffer[..]);
    let same_time = restored.sim_time().to_bits() == session.sim_time().to_bits();
    let same_timer = restored
        .processor(SNACKS_PROCESSOR_NAME)
        .map(|p| p.remaining_time().to_bits())
        == session.processor(SNACKS_PROCESSOR_NAME).map(|p| p.remaining_time().to_bits());
    let same_converters = restored.converters().records().eq(session.converters().records());
    let same_crew = restored.roster().iter().eq(session.roster().iter());
    results.push(TestResult {
        name: "save_load_roundtrip".into(),
        passed: load.is_ok() && same_time && same_timer && same_converters && same_crew,
        detail: format!(
            "{} bytes; time {} timer {} converters {} crew {}",
            buffer.len(),
            same_time,
            same_timer,
            same_converters,
            same_crew
        ),
    });

    let corrupt = restored.load(&buffer[..buffer.len() / 3]);
    results.push(TestResult {
        name: "load_rejects_truncated".into(),
        passed: corrupt.is_err(),
        detail: format!("{:?}", corrupt.err().map(|e| e.to_string())),
    });

    results
}
