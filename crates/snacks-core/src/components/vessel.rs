//! Vessel components: identity and simulation state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-assigned vessel identifier, stable across save/load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VesselId(pub String);

impl VesselId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VesselId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Vessel identity component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vessel {
    pub id: VesselId,
    pub name: String,
}

impl Vessel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: VesselId::new(id),
            name: name.into(),
        }
    }
}

/// Whether the host is simulating the vessel live or it sits in the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimulationState {
    /// Under live simulation; converters are run by the host.
    Loaded,
    /// Off-screen; converters are caught up by the background scheduler.
    #[default]
    Unloaded,
}

impl SimulationState {
    pub fn from_loaded(loaded: bool) -> Self {
        if loaded {
            Self::Loaded
        } else {
            Self::Unloaded
        }
    }

    pub fn is_loaded(self) -> bool {
        self == Self::Loaded
    }
}
