//! Player-tunable settings and the built-in Snacks processor they describe.

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, resources, SNACKS_PROCESSOR_NAME};
use crate::processor::ProcessorDefinition;
use crate::rule::ProcessedResource;

/// Thresholds the penalty layer reads when deciding on outcomes.
///
/// Each penalty is independently switchable. Thresholds count consecutive
/// missed meals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltySettings {
    pub fainting_enabled: bool,
    pub meals_before_fainting: u32,
    pub faint_duration_seconds: f64,
    pub death_enabled: bool,
    pub meals_before_death: u32,
    pub funds_loss_enabled: bool,
    pub funds_per_snack: f64,
    pub rep_loss_enabled: bool,
    /// Fraction of current reputation lost per missed meal.
    pub rep_loss_per_meal: f64,
}

impl Default for PenaltySettings {
    fn default() -> Self {
        Self {
            fainting_enabled: true,
            meals_before_fainting: defaults::MEALS_BEFORE_FAINTING,
            faint_duration_seconds: defaults::FAINT_DURATION_SECONDS,
            death_enabled: false,
            meals_before_death: defaults::MEALS_BEFORE_DEATH,
            funds_loss_enabled: false,
            funds_per_snack: defaults::FUNDS_PER_SNACK,
            rep_loss_enabled: false,
            rep_loss_per_meal: defaults::REP_LOSS_PER_MEAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnacksSettings {
    pub snacks_per_meal: f64,
    pub meals_per_day: u32,
    pub day_length_seconds: f64,
    /// Produce Soil from eaten Snacks.
    pub soil_recycling_enabled: bool,
    pub soil_ratio: f64,
    /// Crew names that never eat and never suffer penalties.
    pub exempt_crew: Vec<String>,
    pub penalties: PenaltySettings,
}

impl Default for SnacksSettings {
    fn default() -> Self {
        Self {
            snacks_per_meal: defaults::SNACKS_PER_MEAL,
            meals_per_day: defaults::MEALS_PER_DAY,
            day_length_seconds: defaults::DAY_LENGTH_SECONDS,
            soil_recycling_enabled: true,
            soil_ratio: defaults::SOIL_RATIO,
            exempt_crew: Vec::new(),
            penalties: PenaltySettings::default(),
        }
    }
}

impl SnacksSettings {
    /// Length of one meal cycle.
    pub fn seconds_per_meal(&self) -> f64 {
        self.day_length_seconds / f64::from(self.meals_per_day.max(1))
    }

    pub fn is_exempt(&self, name: &str) -> bool {
        self.exempt_crew.iter().any(|n| n == name)
    }

    /// The built-in processor: crew eat Snacks every meal and, when recycling
    /// is on, leave Soil behind in proportion to what they actually ate.
    pub fn snacks_processor(&self) -> ProcessorDefinition {
        let mut definition = ProcessorDefinition::new(SNACKS_PROCESSOR_NAME, self.seconds_per_meal())
            .with_input(ProcessedResource::input(resources::SNACKS, self.snacks_per_meal));
        if self.soil_recycling_enabled {
            definition = definition.with_output(
                ProcessedResource::output(resources::SOIL, self.soil_ratio)
                    .related_to(resources::SNACKS),
            );
        }
        definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snacks_processor() {
        let settings = SnacksSettings::default();
        let def = settings.snacks_processor();
        assert_eq!(def.name, SNACKS_PROCESSOR_NAME);
        assert_eq!(def.seconds_per_cycle, defaults::DAY_LENGTH_SECONDS);
        assert_eq!(def.inputs.len(), 1);
        assert_eq!(def.inputs[0].resource_name, resources::SNACKS);
        assert!(def.inputs[0].applied_per_crew);
        assert_eq!(
            def.outputs[0].related_resource_name.as_deref(),
            Some(resources::SNACKS)
        );
    }

    #[test]
    fn test_meals_per_day_splits_cycle() {
        let settings = SnacksSettings {
            meals_per_day: 3,
            day_length_seconds: 86_400.0,
            ..SnacksSettings::default()
        };
        assert!((settings.seconds_per_meal() - 28_800.0).abs() < 1e-9);

        let zero = SnacksSettings {
            meals_per_day: 0,
            ..SnacksSettings::default()
        };
        assert_eq!(zero.seconds_per_meal(), zero.day_length_seconds);
    }

    #[test]
    fn test_recycling_off_drops_soil() {
        let settings = SnacksSettings {
            soil_recycling_enabled: false,
            ..SnacksSettings::default()
        };
        assert!(settings.snacks_processor().outputs.is_empty());
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: SnacksSettings =
            serde_json::from_str(r#"{ "meals_per_day": 2, "exempt_crew": ["Jeb"] }"#).unwrap();
        assert_eq!(settings.meals_per_day, 2);
        assert!(settings.is_exempt("Jeb"));
        assert_eq!(settings.snacks_per_meal, defaults::SNACKS_PER_MEAL);
    }
}
