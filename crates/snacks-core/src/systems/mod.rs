//! Systems that act on the vessel world each session update.

pub mod background;
pub mod consumption;
pub mod outcome;

pub use background::{
    BackgroundConverterRecord, ConversionPhase, ConverterDefinition, ConverterId,
    ConverterScheduler, LedgerSource, ResourceRatio, SchedulerTick, YieldSettings,
};
pub use consumption::{account_cycle, resolve_affected_crew, DeficitReport};
pub use outcome::{Outcome, OutcomeRegistry};
