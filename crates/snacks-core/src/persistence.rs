//! Save/Load for session state.
//!
//! The envelope is bincode. Inside it every processor, converter and
//! astronaut is a flat string-keyed record, so a damaged or older field
//! degrades to its default instead of failing the whole load.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{AstronautRecord, VesselId};
use crate::systems::{BackgroundConverterRecord, ConverterDefinition, ConverterId};

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

pub type FlatRecord = BTreeMap<String, String>;

const SUCCESS_PREFIX: &str = "success.";
const FAILURE_PREFIX: &str = "failure.";

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub sim_time: f64,
    pub processors: Vec<FlatRecord>,
    pub converters: Vec<FlatRecord>,
    pub astronauts: Vec<FlatRecord>,
}

/// Per-processor timing state
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorState {
    pub name: String,
    pub remaining_time: f64,
}

/// Result of loading a session
#[derive(Debug, Default)]
pub struct LoadedSession {
    pub sim_time: f64,
    pub processors: Vec<ProcessorState>,
    pub converters: Vec<BackgroundConverterRecord>,
    pub astronauts: Vec<AstronautRecord>,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

pub fn save_session<W: Write>(
    writer: W,
    sim_time: f64,
    processors: &[ProcessorState],
    converters: &[&BackgroundConverterRecord],
    astronauts: &[&AstronautRecord],
) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        sim_time,
        processors: processors.iter().map(flatten_processor).collect(),
        converters: converters.iter().map(|c| flatten_converter(c)).collect(),
        astronauts: astronauts.iter().map(|a| flatten_astronaut(a)).collect(),
    };
    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

pub fn load_session<R: Read>(reader: R) -> Result<LoadedSession, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    Ok(LoadedSession {
        sim_time: save_data.sim_time,
        processors: save_data.processors.iter().filter_map(restore_processor).collect(),
        converters: save_data.converters.iter().filter_map(restore_converter).collect(),
        astronauts: save_data.astronauts.iter().filter_map(restore_astronaut).collect(),
    })
}

fn put(record: &mut FlatRecord, key: &str, value: impl ToString) {
    record.insert(key.to_string(), value.to_string());
}

/// Typed access to a flat record; bad or missing fields fall back with a
/// warning.
struct FieldReader<'a> {
    record: &'a FlatRecord,
    context: &'a str,
}

impl<'a> FieldReader<'a> {
    fn new(record: &'a FlatRecord, context: &'a str) -> Self {
        Self { record, context }
    }

    fn parse<T: FromStr>(&self, key: &str, fallback: T) -> T {
        match self.record.get(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("{}: malformed {key} '{raw}', using default", self.context);
                fallback
            }),
            None => {
                log::warn!("{}: missing {key}, using default", self.context);
                fallback
            }
        }
    }

    fn f64(&self, key: &str, fallback: f64) -> f64 {
        let value = self.parse(key, fallback);
        if value.is_finite() {
            value
        } else {
            log::warn!("{}: non-finite {key}, using default", self.context);
            fallback
        }
    }

    fn text(&self, key: &str) -> String {
        self.record.get(key).cloned().unwrap_or_default()
    }

    fn counters(&self, prefix: &str) -> BTreeMap<String, u32> {
        self.record
            .keys()
            .filter_map(|key| key.strip_prefix(prefix))
            .filter(|resource| !resource.is_empty())
            .map(|resource| (resource.to_string(), self.parse(&format!("{prefix}{resource}"), 0)))
            .collect()
    }
}

/// Identity field; a record without one cannot be restored.
fn identity(record: &FlatRecord, key: &str, kind: &str) -> Option<String> {
    match record.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => {
            log::warn!("skipping {kind} record without {key}");
            None
        }
    }
}

fn flatten_processor(state: &ProcessorState) -> FlatRecord {
    let mut record = FlatRecord::new();
    put(&mut record, "name", &state.name);
    put(&mut record, "remaining_time", state.remaining_time);
    record
}

fn restore_processor(record: &FlatRecord) -> Option<ProcessorState> {
    let name = identity(record, "name", "processor")?;
    let fields = FieldReader::new(record, &name);
    Some(ProcessorState {
        remaining_time: fields.f64("remaining_time", 0.0).max(0.0),
        name: name.clone(),
    })
}

fn flatten_converter(converter: &BackgroundConverterRecord) -> FlatRecord {
    let mut record = FlatRecord::new();
    put(&mut record, "converter_id", &converter.converter_id);
    put(&mut record, "vessel_id", &converter.vessel_id);
    put(&mut record, "is_activated", converter.is_activated);
    put(&mut record, "is_missing_resources", converter.is_missing_resources);
    put(&mut record, "is_container_full", converter.is_container_full);
    put(&mut record, "input_efficiency", converter.input_efficiency);
    put(&mut record, "output_efficiency", converter.output_efficiency);
    put(&mut record, "last_update_time", converter.last_update_time);
    put(&mut record, "yield_elapsed", converter.yield_elapsed);
    match serde_json::to_string(&converter.definition) {
        Ok(json) => put(&mut record, "definition", json),
        Err(e) => log::warn!("{}: definition not saved: {e}", converter.converter_id),
    }
    record
}

fn restore_converter(record: &FlatRecord) -> Option<BackgroundConverterRecord> {
    let id = identity(record, "converter_id", "converter")?;
    let vessel = identity(record, "vessel_id", "converter")?;
    let fields = FieldReader::new(record, &id);

    let definition = match record.get("definition") {
        Some(json) => serde_json::from_str::<ConverterDefinition>(json).unwrap_or_else(|e| {
            log::warn!("{id}: unreadable definition ({e}), converter will idle");
            ConverterDefinition::default()
        }),
        None => {
            log::warn!("{id}: missing definition, converter will idle");
            ConverterDefinition::default()
        }
    };

    let mut converter = BackgroundConverterRecord::new(
        ConverterId::new(id.clone()),
        VesselId::new(vessel),
        definition,
        fields.f64("last_update_time", 0.0),
    );
    converter.is_activated = fields.parse("is_activated", true);
    converter.is_missing_resources = fields.parse("is_missing_resources", false);
    converter.is_container_full = fields.parse("is_container_full", false);
    converter.input_efficiency = fields.f64("input_efficiency", 1.0);
    converter.output_efficiency = fields.f64("output_efficiency", 1.0);
    converter.yield_elapsed = fields.f64("yield_elapsed", 0.0).max(0.0);
    Some(converter)
}

fn flatten_astronaut(astronaut: &AstronautRecord) -> FlatRecord {
    let mut record = FlatRecord::new();
    put(&mut record, "name", &astronaut.name);
    put(&mut record, "is_exempt", astronaut.is_exempt);
    put(&mut record, "exempt_by_host", astronaut.exempt_by_host);
    put(&mut record, "meals_missed", astronaut.meals_missed);
    put(&mut record, "condition_summary", &astronaut.condition_summary);
    for (resource, count) in &astronaut.resource_successes {
        put(&mut record, &format!("{SUCCESS_PREFIX}{resource}"), count);
    }
    for (resource, count) in &astronaut.resource_failures {
        put(&mut record, &format!("{FAILURE_PREFIX}{resource}"), count);
    }
    record
}

fn restore_astronaut(record: &FlatRecord) -> Option<AstronautRecord> {
    let name = identity(record, "name", "astronaut")?;
    let fields = FieldReader::new(record, &name);
    let is_exempt = fields.parse("is_exempt", false);
    Some(AstronautRecord {
        is_exempt,
        exempt_by_host: fields.parse("exempt_by_host", is_exempt),
        meals_missed: fields.parse("meals_missed", 0),
        condition_summary: fields.text("condition_summary"),
        resource_successes: fields.counters(SUCCESS_PREFIX),
        resource_failures: fields.counters(FAILURE_PREFIX),
        name: name.clone(),
    })
}
