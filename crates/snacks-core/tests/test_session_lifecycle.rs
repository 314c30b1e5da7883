//! Integration tests for a session across its lifecycle.
//!
//! Exercises: vessel registration → meal cycles → crew transfers
//! → background conversion → save to disk → load into a fresh session.

use snacks_core::persistence::SaveError;
use snacks_core::prelude::*;
use snacks_core::systems::{BackgroundConverterRecord, ConverterDefinition, ConverterId, ResourceRatio};
use snacks_logic::config::load_config;
use snacks_logic::constants::{resources, SNACKS_PROCESSOR_NAME};
use snacks_logic::ledger::{ContainerLedger, ResourceContainer, ResourceLedger};

// ── Helpers ────────────────────────────────────────────────────────────

const DAY: f64 = 21600.0;

fn new_session() -> SnacksSession {
    let loaded = load_config(r#"{ "settings": { "soil_recycling_enabled": false } }"#).unwrap();
    SnacksSession::from_config(loaded).with_seed(2024)
}

fn pantry(snacks: f64) -> ContainerLedger {
    ContainerLedger::new().with_container(ResourceContainer::new(resources::SNACKS, snacks, 100.0))
}

fn crew(names: &[&str]) -> CrewManifest {
    CrewManifest::new(names.iter().map(|n| n.to_string()).collect(), 4)
}

fn temp_save(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("snacks-{}-{}.sav", name, std::process::id()))
}

// ── Crew ───────────────────────────────────────────────────────────────

#[test]
fn crew_counters_follow_them_between_vessels() {
    let mut session = new_session();
    let empty = VesselId::new("empty");
    let full = VesselId::new("full");
    session.add_vessel(Vessel::new("empty", "Lander"), pantry(0.0), crew(&["Jeb"]), true);
    session.add_vessel(Vessel::new("full", "Station"), pantry(50.0), crew(&[]), false);

    session.update(DAY * 2.0);
    assert_eq!(session.roster().get("Jeb").unwrap().meals_missed, 2);

    assert!(session.set_crew(&empty, crew(&[])));
    assert!(session.set_crew(&full, crew(&["Jeb"])));
    let reports = session.update(DAY);

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].vessel_id, full);
    let jeb = session.roster().get("Jeb").unwrap();
    assert_eq!(jeb.meals_missed, 0);
    assert_eq!(jeb.successes(resources::SNACKS), 1);
}

#[test]
fn host_exemption_stops_demand() {
    let mut session = new_session();
    let id = VesselId::new("v");
    session.add_vessel(Vessel::new("v", "Capsule"), pantry(10.0), crew(&["Jeb", "Bill"]), true);
    session.roster_mut().set_exempt("Bill", true);

    session.update(DAY);
    assert!((session.ledger_snapshot(&id).unwrap().amount(resources::SNACKS) - 9.0).abs() < 1e-9);
}

#[test]
fn deficit_report_names_the_hungry() {
    let mut session = new_session();
    session.add_vessel(
        Vessel::new("v", "Bus"),
        pantry(1.0),
        crew(&["Jeb", "Bill", "Bob", "Val"]),
        true,
    );

    let reports = session.update(DAY);
    let hungry = reports[0].affected(resources::SNACKS);
    assert_eq!(hungry.len(), 3);
    let fed: Vec<_> = ["Jeb", "Bill", "Bob", "Val"]
        .into_iter()
        .filter(|n| !hungry.iter().any(|h| h == n))
        .collect();
    assert_eq!(fed.len(), 1);
    assert_eq!(session.roster().get(fed[0]).unwrap().meals_missed, 0);
}

// ── Persistence ────────────────────────────────────────────────────────

#[test]
fn save_to_disk_and_resume() {
    let path = temp_save("resume");
    let base = VesselId::new("base");

    let mut session = new_session();
    session.add_vessel(Vessel::new("base", "Base"), pantry(0.0), crew(&["Val"]), false);
    session.register_converter(BackgroundConverterRecord::new(
        ConverterId::for_part(&base, 2, 0),
        base.clone(),
        ConverterDefinition {
            module_name: "Greenhouse".into(),
            outputs: vec![ResourceRatio::new(resources::SNACKS, 0.0005)],
            ..Default::default()
        },
        0.0,
    ));
    session.update(DAY * 0.5);
    session.catch_up_background();
    session.save_to_file(&path).expect("save");

    // The host re-adds its vessels, then loads.
    let mut resumed = new_session();
    resumed.add_vessel(Vessel::new("base", "Base"), session.ledger_snapshot(&base).unwrap(), crew(&["Val"]), false);
    resumed.load_from_file(&path).expect("load");
    let _ = std::fs::remove_file(&path);

    assert_eq!(resumed.sim_time(), session.sim_time());
    assert_eq!(
        resumed.processor(SNACKS_PROCESSOR_NAME).unwrap().remaining_time(),
        DAY * 0.5
    );
    assert_eq!(resumed.converters().len(), 1);

    // Half a day of greenhouse output feeds Val at the next meal.
    let reports = resumed.update(DAY * 0.5);
    assert!(reports.iter().all(|r| !r.has_deficit()));
}

#[test]
fn missing_save_is_an_io_error() {
    let mut session = new_session();
    let result = session.load_from_file(temp_save("does-not-exist"));
    assert!(matches!(result, Err(SaveError::Io(_))));
}
