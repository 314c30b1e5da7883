//! Component definitions for the vessel world.
//!
//! Components are pure data attached to vessel entities; the ledger component
//! is [`snacks_logic::ledger::ContainerLedger`] itself.

mod crew;
mod vessel;

pub use crew::*;
pub use vessel::*;
