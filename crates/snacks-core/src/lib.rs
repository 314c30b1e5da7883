//! Snacks Core - life-support session engine
//!
//! Runs the crew's life-support processors against every vessel the host
//! registers, keeps per-crew deficit counters, and catches up converters on
//! vessels that are not being actively simulated.
//!
//! # Architecture
//!
//! Vessels live in an ECS world via `hecs`:
//! - **Entities**: one per vessel
//! - **Components**: `Vessel`, `ContainerLedger`, `CrewManifest`, `SimulationState`
//! - **Systems**: crew accounting, outcome dispatch, background conversion
//!
//! # Example
//!
//! ```rust
//! use snacks_core::prelude::*;
//! use snacks_logic::ledger::{ContainerLedger, ResourceContainer};
//!
//! let mut session = SnacksSession::default();
//! session.add_vessel(
//!     Vessel::new("v1", "Kerbal X"),
//!     ContainerLedger::new().with_container(ResourceContainer::new("Snacks", 10.0, 10.0)),
//!     CrewManifest::new(vec!["Jeb".into()], 3),
//!     true,
//! );
//!
//! let reports = session.update(6.0 * 3600.0);
//! assert_eq!(reports.len(), 1);
//! assert!(!reports[0].has_deficit());
//! ```

pub mod components;
pub mod persistence;
pub mod roster;
pub mod session;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::roster::AstronautRoster;
    pub use crate::session::SnacksSession;
    pub use crate::systems::{DeficitReport, Outcome, OutcomeRegistry};
}
