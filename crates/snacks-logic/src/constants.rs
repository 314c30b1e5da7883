//! Shared constants: resource names, tolerances and default timings.
//!
//! Plain values with no runtime dependency. The session crate, the config
//! loader and the simtest harness all read these.

pub mod resources {
    /// Food consumed by crew every meal.
    pub const SNACKS: &str = "Snacks";
    /// Waste produced from eaten snacks.
    pub const SOIL: &str = "Soil";
}

/// Tolerance used when comparing supplied and demanded amounts.
pub const RESOURCE_EPSILON: f64 = 1e-6;

/// Most cycles a single `advance` hands out; any backlog past this is dropped.
pub const MAX_CYCLES_PER_ADVANCE: u32 = 1_000_000;

/// Name of the processor generated from [`crate::settings::SnacksSettings`].
pub const SNACKS_PROCESSOR_NAME: &str = "Snacks!";

pub mod defaults {
    /// Cycle length used when a processor definition has none (one hour).
    pub const SECONDS_PER_CYCLE: f64 = 3600.0;
    /// Six-hour day of the stock home planet.
    pub const DAY_LENGTH_SECONDS: f64 = 21_600.0;
    pub const MEALS_PER_DAY: u32 = 1;
    pub const SNACKS_PER_MEAL: f64 = 1.0;
    /// Soil produced per snack eaten.
    pub const SOIL_RATIO: f64 = 1.0;
    pub const MEALS_BEFORE_FAINTING: u32 = 3;
    pub const FAINT_DURATION_SECONDS: f64 = 180.0;
    pub const MEALS_BEFORE_DEATH: u32 = 42;
    pub const FUNDS_PER_SNACK: f64 = 150.0;
    pub const REP_LOSS_PER_MEAL: f64 = 0.0025;
    /// Consumed-rule ratio when the config value is unusable.
    pub const RULE_RATIO: f64 = 1.0;
}
