//! Lenient JSON configuration loading.
//!
//! Only a document that is not JSON at all (or not an object) is rejected.
//! Everything below that is recovered locally: an unusable number or flag
//! falls back to its default, a rule without a resource name is dropped on
//! its own, a processor without a name is dropped on its own. Every recovery
//! is logged and collected in [`LoadedConfig::issues`].
//!
//! Layout:
//!
//! ```json
//! {
//!   "include_builtin_snacks": true,
//!   "settings": { "meals_per_day": 3, "penalties": { "fainting_enabled": true } },
//!   "processors": [
//!     {
//!       "name": "Hydroponics",
//!       "seconds_per_cycle": 3600,
//!       "inputs":  [ { "resource": "Soil", "ratio": 0.5, "per_crew": true } ],
//!       "outputs": [ { "resource": "Snacks", "related": "Soil", "ratio": 0.8 } ]
//!     }
//!   ]
//! }
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

use crate::constants::defaults;
use crate::processor::ProcessorDefinition;
use crate::rule::ProcessedResource;
use crate::settings::{PenaltySettings, SnacksSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{context}: expected an object")]
    NotAnObject { context: String },
    #[error("{context}: missing required field `{field}`, entry skipped")]
    MissingField {
        context: String,
        field: &'static str,
    },
    #[error("{context}: `{field}` has unusable value {raw}, using {fallback}")]
    MalformedValue {
        context: String,
        field: &'static str,
        raw: String,
        fallback: String,
    },
    #[error("processor {name} defined more than once, later definition skipped")]
    DuplicateProcessor { name: String },
}

/// Result of a lenient load.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    pub settings: SnacksSettings,
    pub processors: Vec<ProcessorDefinition>,
    /// Problems that were recovered from.
    pub issues: Vec<ConfigError>,
}

/// Parse a configuration document.
pub fn load_config(json: &str) -> Result<LoadedConfig, ConfigError> {
    let value: Value = serde_json::from_str(json)?;
    parse_config(&value)
}

/// Build a configuration from an already-parsed document.
pub fn parse_config(value: &Value) -> Result<LoadedConfig, ConfigError> {
    let root = value.as_object().ok_or_else(|| ConfigError::NotAnObject {
        context: "config".into(),
    })?;

    let mut issues = Vec::new();
    let mut reader = FieldReader::new(root, "config", &mut issues);
    let include_builtin = reader.flag("include_builtin_snacks", true);

    let settings = match root.get("settings") {
        Some(Value::Object(obj)) => parse_settings(obj, &mut issues),
        Some(_) => {
            report(
                &mut issues,
                ConfigError::NotAnObject {
                    context: "settings".into(),
                },
            );
            SnacksSettings::default()
        }
        None => SnacksSettings::default(),
    };

    let mut processors = Vec::new();
    if include_builtin {
        processors.push(settings.snacks_processor());
    }

    if let Some(list) = root.get("processors") {
        let entries = list.as_array().map(Vec::as_slice).unwrap_or_else(|| {
            report(
                &mut issues,
                ConfigError::NotAnObject {
                    context: "processors".into(),
                },
            );
            &[]
        });
        for (index, entry) in entries.iter().enumerate() {
            let Some(definition) = parse_processor(entry, index, &mut issues) else {
                continue;
            };
            if processors.iter().any(|p| p.name == definition.name) {
                report(
                    &mut issues,
                    ConfigError::DuplicateProcessor {
                        name: definition.name,
                    },
                );
                continue;
            }
            processors.push(definition);
        }
    }

    Ok(LoadedConfig {
        settings,
        processors,
        issues,
    })
}

fn report(issues: &mut Vec<ConfigError>, issue: ConfigError) {
    log::warn!("{issue}");
    issues.push(issue);
}

fn parse_settings(obj: &Map<String, Value>, issues: &mut Vec<ConfigError>) -> SnacksSettings {
    let base = SnacksSettings::default();
    let mut r = FieldReader::new(obj, "settings", issues);

    let mut settings = SnacksSettings {
        snacks_per_meal: r.number("snacks_per_meal", base.snacks_per_meal),
        meals_per_day: r.count("meals_per_day", base.meals_per_day),
        day_length_seconds: r.positive("day_length_seconds", base.day_length_seconds),
        soil_recycling_enabled: r.flag("soil_recycling_enabled", base.soil_recycling_enabled),
        soil_ratio: r.number("soil_ratio", base.soil_ratio),
        exempt_crew: r.strings("exempt_crew"),
        penalties: base.penalties,
    };

    if let Some(Value::Object(p)) = obj.get("penalties") {
        settings.penalties = parse_penalties(p, issues);
    }
    settings
}

fn parse_penalties(obj: &Map<String, Value>, issues: &mut Vec<ConfigError>) -> PenaltySettings {
    let base = PenaltySettings::default();
    let mut r = FieldReader::new(obj, "settings.penalties", issues);
    PenaltySettings {
        fainting_enabled: r.flag("fainting_enabled", base.fainting_enabled),
        meals_before_fainting: r.count("meals_before_fainting", base.meals_before_fainting),
        faint_duration_seconds: r.number("faint_duration_seconds", base.faint_duration_seconds),
        death_enabled: r.flag("death_enabled", base.death_enabled),
        meals_before_death: r.count("meals_before_death", base.meals_before_death),
        funds_loss_enabled: r.flag("funds_loss_enabled", base.funds_loss_enabled),
        funds_per_snack: r.number("funds_per_snack", base.funds_per_snack),
        rep_loss_enabled: r.flag("rep_loss_enabled", base.rep_loss_enabled),
        rep_loss_per_meal: r.number("rep_loss_per_meal", base.rep_loss_per_meal),
    }
}

fn parse_processor(
    entry: &Value,
    index: usize,
    issues: &mut Vec<ConfigError>,
) -> Option<ProcessorDefinition> {
    let context = format!("processors[{index}]");
    let Some(obj) = entry.as_object() else {
        report(issues, ConfigError::NotAnObject { context });
        return None;
    };

    let mut r = FieldReader::new(obj, &context, issues);
    let name = r.required_text("name")?;
    let seconds = r.positive("seconds_per_cycle", defaults::SECONDS_PER_CYCLE);
    let mut definition = ProcessorDefinition::new(name, seconds);

    for (i, rule) in rule_entries(obj, "inputs", &context, issues).iter().enumerate() {
        let rule_context = format!("{context}.inputs[{i}]");
        if let Some(input) = parse_input(rule, &rule_context, issues) {
            definition = definition.with_input(input);
        }
    }
    for (i, rule) in rule_entries(obj, "outputs", &context, issues).iter().enumerate() {
        let rule_context = format!("{context}.outputs[{i}]");
        if let Some(output) = parse_output(rule, &rule_context, issues) {
            definition = definition.with_output(output);
        }
    }
    Some(definition)
}

fn rule_entries<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
    context: &str,
    issues: &mut Vec<ConfigError>,
) -> &'a [Value] {
    match obj.get(field) {
        Some(Value::Array(list)) => list.as_slice(),
        Some(_) => {
            report(
                issues,
                ConfigError::NotAnObject {
                    context: format!("{context}.{field}"),
                },
            );
            &[]
        }
        None => &[],
    }
}

fn parse_input(
    entry: &Value,
    context: &str,
    issues: &mut Vec<ConfigError>,
) -> Option<ProcessedResource> {
    let Some(obj) = entry.as_object() else {
        report(
            issues,
            ConfigError::NotAnObject {
                context: context.to_string(),
            },
        );
        return None;
    };
    let mut r = FieldReader::new(obj, context, issues);
    let resource = r.required_text("resource")?;
    Some(
        ProcessedResource::input(resource, r.number("ratio", defaults::RULE_RATIO))
            .per_crew(r.flag("per_crew", true))
            .per_cycle(r.flag("per_cycle", true))
            .applies_outcomes(r.flag("applies_outcomes", true)),
    )
}

fn parse_output(
    entry: &Value,
    context: &str,
    issues: &mut Vec<ConfigError>,
) -> Option<ProcessedResource> {
    let Some(obj) = entry.as_object() else {
        report(
            issues,
            ConfigError::NotAnObject {
                context: context.to_string(),
            },
        );
        return None;
    };
    let mut r = FieldReader::new(obj, context, issues);
    let resource = r.required_text("resource")?;
    let mut rule = ProcessedResource::output(resource, r.number("ratio", defaults::RULE_RATIO))
        .per_crew(r.flag("per_crew", true))
        .per_cycle(r.flag("per_cycle", true));
    if let Some(related) = r.text("related") {
        rule = rule.related_to(related);
    }
    Some(rule)
}

/// Reads typed fields out of one JSON object, recording every fallback.
struct FieldReader<'a> {
    obj: &'a Map<String, Value>,
    context: String,
    issues: &'a mut Vec<ConfigError>,
}

impl<'a> FieldReader<'a> {
    fn new(obj: &'a Map<String, Value>, context: &str, issues: &'a mut Vec<ConfigError>) -> Self {
        Self {
            obj,
            context: context.to_string(),
            issues,
        }
    }

    fn malformed(&mut self, field: &'static str, raw: &Value, fallback: String) {
        report(
            self.issues,
            ConfigError::MalformedValue {
                context: self.context.clone(),
                field,
                raw: raw.to_string(),
                fallback,
            },
        );
    }

    /// Non-negative number; accepts JSON numbers and numeric strings.
    fn number(&mut self, field: &'static str, default: f64) -> f64 {
        let Some(raw) = self.obj.get(field) else {
            return default;
        };
        let parsed = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(v) if v.is_finite() && v >= 0.0 => v,
            _ => {
                self.malformed(field, raw, default.to_string());
                default
            }
        }
    }

    /// Strictly positive number.
    fn positive(&mut self, field: &'static str, default: f64) -> f64 {
        let value = self.number(field, default);
        if value > 0.0 {
            value
        } else {
            if let Some(raw) = self.obj.get(field) {
                self.malformed(field, raw, default.to_string());
            }
            default
        }
    }

    fn count(&mut self, field: &'static str, default: u32) -> u32 {
        let value = self.number(field, f64::from(default));
        if value.fract() == 0.0 && value <= f64::from(u32::MAX) {
            value as u32
        } else {
            if let Some(raw) = self.obj.get(field) {
                self.malformed(field, raw, default.to_string());
            }
            default
        }
    }

    /// Boolean; accepts JSON bools and "true"/"false" strings.
    fn flag(&mut self, field: &'static str, default: bool) -> bool {
        let Some(raw) = self.obj.get(field) else {
            return default;
        };
        let parsed = match raw {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().to_ascii_lowercase().parse::<bool>().ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| {
            self.malformed(field, raw, default.to_string());
            default
        })
    }

    fn text(&self, field: &'static str) -> Option<String> {
        self.obj
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn required_text(&mut self, field: &'static str) -> Option<String> {
        let value = self.text(field);
        if value.is_none() {
            report(
                self.issues,
                ConfigError::MissingField {
                    context: self.context.clone(),
                    field,
                },
            );
        }
        value
    }

    fn strings(&mut self, field: &'static str) -> Vec<String> {
        match self.obj.get(field) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            // A comma-separated string is accepted as well
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(raw) => {
                let raw = raw.clone();
                self.malformed(field, &raw, "[]".into());
                Vec::new()
            }
        }
    }
}
