//! Crew components and per-astronaut accounting records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who is aboard a vessel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewManifest {
    /// Crew names, unique across the session.
    pub crew: Vec<String>,
    pub capacity: u32,
}

impl CrewManifest {
    pub fn new(crew: Vec<String>, capacity: u32) -> Self {
        let capacity = capacity.max(crew.len() as u32);
        Self { crew, capacity }
    }

    pub fn is_empty(&self) -> bool {
        self.crew.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.crew.iter().any(|c| c == name)
    }
}

/// Condition tags the penalty layer sets on crew
pub mod conditions {
    pub const FAINTED: &str = "Fainted";
    pub const ON_STRIKE: &str = "OnStrike";
    pub const STARVING: &str = "Starving";
}

/// Per-crew life-support accounting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AstronautRecord {
    pub name: String,
    /// Exempt crew don't eat and are never penalized. Derived by the roster
    /// from `exempt_by_host` and the settings exemption list.
    pub is_exempt: bool,
    /// Exemption set through `AstronautRoster::set_exempt`.
    pub exempt_by_host: bool,
    /// Consecutive Snacks meals missed.
    pub meals_missed: u32,
    /// Comma-joined active condition tags.
    pub condition_summary: String,
    /// Consecutive fully-supplied cycles per resource.
    pub resource_successes: BTreeMap<String, u32>,
    /// Consecutive short cycles per resource.
    pub resource_failures: BTreeMap<String, u32>,
}

impl AstronautRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.condition_summary
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn has_condition(&self, tag: &str) -> bool {
        self.conditions().any(|c| c == tag)
    }

    /// Add a condition tag. Returns false if it was already set.
    pub fn add_condition(&mut self, tag: &str) -> bool {
        if tag.is_empty() || self.has_condition(tag) {
            return false;
        }
        let mut tags: Vec<&str> = self.conditions().collect();
        tags.push(tag);
        self.condition_summary = tags.join(",");
        true
    }

    /// Remove a condition tag. Returns false if it wasn't set.
    pub fn remove_condition(&mut self, tag: &str) -> bool {
        if !self.has_condition(tag) {
            return false;
        }
        let tags: Vec<&str> = self.conditions().filter(|c| *c != tag).collect();
        self.condition_summary = tags.join(",");
        true
    }

    pub fn successes(&self, resource: &str) -> u32 {
        self.resource_successes.get(resource).copied().unwrap_or(0)
    }

    pub fn failures(&self, resource: &str) -> u32 {
        self.resource_failures.get(resource).copied().unwrap_or(0)
    }

    pub fn record_success(&mut self, resource: &str) {
        *self.resource_successes.entry(resource.to_string()).or_insert(0) += 1;
        self.resource_failures.insert(resource.to_string(), 0);
    }

    pub fn record_failure(&mut self, resource: &str) {
        *self.resource_failures.entry(resource.to_string()).or_insert(0) += 1;
        self.resource_successes.insert(resource.to_string(), 0);
    }
}
