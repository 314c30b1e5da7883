//! Per-cycle outcome records for each processed resource.

use serde::{Deserialize, Serialize};

/// Whether a result came from drawing inputs or storing outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultType {
    Consumption,
    Production,
}

/// Crew figures a cycle runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewContext {
    /// Crew members that eat (exempt crew excluded).
    pub crew_count: u32,
    pub crew_capacity: u32,
}

impl CrewContext {
    pub fn new(crew_count: u32, crew_capacity: u32) -> Self {
        Self {
            crew_count,
            crew_capacity: crew_capacity.max(crew_count),
        }
    }
}

/// What happened to one resource during one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub resource_name: String,
    pub result_type: ResultType,
    pub completed_successfully: bool,
    pub applied_per_crew: bool,
    /// Whether a failure here counts toward crew penalties.
    pub applies_outcomes: bool,
    /// Crew members who went without their full share.
    pub affected_crew_count: u32,
    pub crew_count: u32,
    pub crew_capacity: u32,
    /// Amount the rule asked the ledger for.
    pub requested_amount: f64,
    /// Amount actually drawn or stored.
    pub transferred_amount: f64,
    /// Ledger totals after the transfer.
    pub current_amount: f64,
    pub max_amount: f64,
}

impl ProcessingResult {
    /// Fraction of the request that was satisfied, in `0.0..=1.0`.
    ///
    /// A zero request counts as fully satisfied.
    pub fn percent_acquired(&self) -> f64 {
        if self.requested_amount <= 0.0 {
            1.0
        } else {
            (self.transferred_amount / self.requested_amount).clamp(0.0, 1.0)
        }
    }

    /// Unmet portion of the request.
    pub fn deficit(&self) -> f64 {
        (self.requested_amount - self.transferred_amount).max(0.0)
    }

    pub fn is_consumption(&self) -> bool {
        self.result_type == ResultType::Consumption
    }
}
