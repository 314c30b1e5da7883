//! Integration tests for the cycle engine driven from configuration.
//!
//! Exercises: JSON config → ProcessorDefinition → ResourceProcessor
//! → ContainerLedger, the way a host wires them together.

use snacks_logic::config::load_config;
use snacks_logic::constants::{resources, SNACKS_PROCESSOR_NAME};
use snacks_logic::ledger::{ContainerLedger, ResourceContainer, ResourceLedger};
use snacks_logic::processor::ResourceProcessor;
use snacks_logic::result::CrewContext;

// ── Helpers ────────────────────────────────────────────────────────────

const CONFIG: &str = r#"{
    "settings": { "day_length_seconds": 600, "meals_per_day": 2, "exempt_crew": "Gene, Wernher" },
    "processors": [
        {
            "name": "Soil Recycler",
            "seconds_per_cycle": 300,
            "inputs":  [ { "resource": "Soil", "ratio": 0.5, "applies_outcomes": false } ],
            "outputs": [ { "resource": "Snacks", "related": "Soil", "ratio": 0.5 } ]
        }
    ]
}"#;

fn processors() -> Vec<ResourceProcessor> {
    let loaded = load_config(CONFIG).expect("config parses");
    assert!(loaded.issues.is_empty(), "{:?}", loaded.issues);
    loaded.processors.into_iter().map(ResourceProcessor::new).collect()
}

fn ledger(snacks: f64, soil: f64) -> ContainerLedger {
    ContainerLedger::new()
        .with_container(ResourceContainer::new(resources::SNACKS, snacks, 50.0))
        .with_container(ResourceContainer::new(resources::SOIL, soil, 50.0))
}

fn run(processors: &mut [ResourceProcessor], elapsed: f64, ledger: &mut ContainerLedger, crew: u32) {
    for processor in processors.iter_mut() {
        processor.tick(elapsed, ledger, CrewContext::new(crew, crew));
    }
}

// ── Configuration wiring ───────────────────────────────────────────────

#[test]
fn config_builds_builtin_and_custom_processors() {
    let processors = processors();
    let names: Vec<&str> = processors.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec![SNACKS_PROCESSOR_NAME, "Soil Recycler"]);
    assert_eq!(processors[0].seconds_per_cycle(), 300.0);
}

#[test]
fn exempt_list_accepts_comma_separated_names() {
    let loaded = load_config(CONFIG).unwrap();
    assert_eq!(loaded.settings.exempt_crew, vec!["Gene", "Wernher"]);
    assert!(loaded.settings.is_exempt("Gene"));
}

// ── Resource loop ──────────────────────────────────────────────────────

#[test]
fn snacks_become_soil_and_soil_comes_back() {
    let mut processors = processors();
    let mut ledger = ledger(10.0, 0.0);

    run(&mut processors, 300.0, &mut ledger, 2);

    // 2 Snacks eaten -> 2 Soil; recycler takes 1 Soil -> 0.5 Snacks.
    assert!((ledger.amount(resources::SNACKS) - 8.5).abs() < 1e-9);
    assert!((ledger.amount(resources::SOIL) - 1.0).abs() < 1e-9);
}

#[test]
fn long_absence_equals_many_short_updates() {
    let mut once = processors();
    let mut often = processors();
    once.truncate(1);
    often.truncate(1);
    let mut once_ledger = ledger(7.0, 3.0);
    let mut often_ledger = ledger(7.0, 3.0);

    run(&mut once, 3000.0, &mut once_ledger, 3);
    for _ in 0..30 {
        run(&mut often, 100.0, &mut often_ledger, 3);
    }

    assert_eq!(once_ledger, often_ledger);
    for (a, b) in once.iter().zip(&often) {
        assert_eq!(a.remaining_time(), b.remaining_time());
    }
}

#[test]
fn stock_never_goes_negative_or_over_capacity() {
    let mut processors = processors();
    let mut ledger = ledger(3.0, 49.0);
    for crew in [1, 4, 9, 2, 0, 6] {
        run(&mut processors, 450.0, &mut ledger, crew);
        for container in ledger.containers() {
            assert!(container.amount() >= 0.0);
            assert!(container.amount() <= container.max_amount());
        }
    }
}

#[test]
fn supply_duration_tracks_stock() {
    let processors = processors();
    let snacks = &processors[0];
    let full = snacks.supply_duration(&ledger(10.0, 0.0), resources::SNACKS, 2).unwrap();
    let half = snacks.supply_duration(&ledger(5.0, 0.0), resources::SNACKS, 2).unwrap();
    assert!(full > half);
    assert!(snacks.supply_duration(&ledger(5.0, 0.0), "Oxygen", 2).is_none());
}
