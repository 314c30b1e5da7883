//! Resource ledger: every container aboard a vessel seen as one pool per
//! resource name.
//!
//! The same [`ContainerLedger`] backs a live vessel and a frozen snapshot of an
//! unloaded one; hosts with their own storage implement [`ResourceLedger`].
//!
//! Both transfer operations walk containers greedily in iteration order, so
//! splitting a demand into several calls never draws or stores more than a
//! single call would.

use serde::{Deserialize, Serialize};

/// One tank, pantry or bin holding a single resource.
///
/// `amount` stays within `0..=max_amount`; it only changes through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredContainer")]
pub struct ResourceContainer {
    pub resource_name: String,
    amount: f64,
    max_amount: f64,
    /// Locked containers are invisible to requests and deposits.
    pub flow_enabled: bool,
}

/// Serialized form; clamped on the way in.
#[derive(Deserialize)]
struct StoredContainer {
    resource_name: String,
    amount: f64,
    max_amount: f64,
    flow_enabled: bool,
}

impl From<StoredContainer> for ResourceContainer {
    fn from(stored: StoredContainer) -> Self {
        Self::new(stored.resource_name, stored.amount, stored.max_amount)
            .with_flow(stored.flow_enabled)
    }
}

impl ResourceContainer {
    /// Create a flow-enabled container, clamping `amount` into `0..=max_amount`.
    pub fn new(resource_name: impl Into<String>, amount: f64, max_amount: f64) -> Self {
        let max_amount = if max_amount.is_finite() { max_amount.max(0.0) } else { 0.0 };
        let amount = if amount.is_finite() { amount.clamp(0.0, max_amount) } else { 0.0 };
        Self {
            resource_name: resource_name.into(),
            amount,
            max_amount,
            flow_enabled: true,
        }
    }

    pub fn with_flow(mut self, enabled: bool) -> Self {
        self.flow_enabled = enabled;
        self
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn max_amount(&self) -> f64 {
        self.max_amount
    }

    pub fn free_space(&self) -> f64 {
        (self.max_amount - self.amount).max(0.0)
    }

    fn accepts(&self, name: &str) -> bool {
        self.flow_enabled && self.resource_name == name
    }
}

/// Aggregate read/write access to a vessel's resources.
///
/// Implementations never fail: a request nothing can satisfy returns `0.0`.
pub trait ResourceLedger {
    /// Drain up to `amount` of `name`; returns what was actually obtained.
    fn request(&mut self, name: &str, amount: f64) -> f64;

    /// Store up to `amount` of `name`; returns what actually fit.
    ///
    /// When no container holds `name` the result is `0.0` and the caller
    /// decides what to do with the remainder.
    fn deposit(&mut self, name: &str, amount: f64) -> f64;

    /// Total amount of `name` across flow-enabled containers.
    fn amount(&self, name: &str) -> f64;

    /// Total capacity for `name` across flow-enabled containers.
    fn max_amount(&self, name: &str) -> f64;

    /// Whether any flow-enabled container holds `name`.
    fn has_resource(&self, name: &str) -> bool;
}

/// Ordered list of containers; the default ledger implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerLedger {
    containers: Vec<ResourceContainer>,
}

impl ContainerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(mut self, container: ResourceContainer) -> Self {
        self.containers.push(container);
        self
    }

    pub fn add_container(&mut self, container: ResourceContainer) {
        self.containers.push(container);
    }

    pub fn containers(&self) -> &[ResourceContainer] {
        &self.containers
    }

    /// Lock or unlock every container of `name`. Returns how many changed.
    pub fn set_flow(&mut self, name: &str, enabled: bool) -> usize {
        let mut changed = 0;
        for container in self
            .containers
            .iter_mut()
            .filter(|c| c.resource_name == name && c.flow_enabled != enabled)
        {
            container.flow_enabled = enabled;
            changed += 1;
        }
        changed
    }

    /// Fraction of capacity filled (0.0 when there is no capacity).
    pub fn fill_level(&self, name: &str) -> f64 {
        let max = self.max_amount(name);
        if max <= 0.0 {
            0.0
        } else {
            (self.amount(name) / max).clamp(0.0, 1.0)
        }
    }
}

fn usable(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

impl ResourceLedger for ContainerLedger {
    fn request(&mut self, name: &str, amount: f64) -> f64 {
        if !usable(amount) {
            return 0.0;
        }

        let mut supplied = 0.0;
        for container in self.containers.iter_mut().filter(|c| c.accepts(name)) {
            let remaining = amount - supplied;
            if remaining <= 0.0 {
                break;
            }
            let take = container.amount.min(remaining);
            container.amount = (container.amount - take).max(0.0);
            supplied += take;
        }
        supplied.min(amount)
    }

    fn deposit(&mut self, name: &str, amount: f64) -> f64 {
        if !usable(amount) {
            return 0.0;
        }

        let mut stored = 0.0;
        for container in self.containers.iter_mut().filter(|c| c.accepts(name)) {
            let remaining = amount - stored;
            if remaining <= 0.0 {
                break;
            }
            let put = container.free_space().min(remaining);
            container.amount = (container.amount + put).min(container.max_amount);
            stored += put;
        }
        stored.min(amount)
    }

    fn amount(&self, name: &str) -> f64 {
        self.containers
            .iter()
            .filter(|c| c.accepts(name))
            .map(|c| c.amount)
            .sum()
    }

    fn max_amount(&self, name: &str) -> f64 {
        self.containers
            .iter()
            .filter(|c| c.accepts(name))
            .map(|c| c.max_amount)
            .sum()
    }

    fn has_resource(&self, name: &str) -> bool {
        self.containers.iter().any(|c| c.accepts(name))
    }
}
