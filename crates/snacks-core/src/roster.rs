//! Astronaut roster: every crew member the session has seen, by name.
//!
//! Records are created on first reference and live until the host removes
//! the crew member (death, retirement). Moving between vessels keeps the
//! record.

use std::collections::{BTreeMap, BTreeSet};

use crate::components::AstronautRecord;

#[derive(Debug, Clone, Default)]
pub struct AstronautRoster {
    records: BTreeMap<String, AstronautRecord>,
    /// Names exempted by settings; applied when records are created.
    exempt_names: BTreeSet<String>,
}

impl AstronautRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the settings-driven exemption list.
    ///
    /// Every record is re-derived, so crew dropped from the list eat again
    /// unless the host exempted them.
    pub fn set_exempt_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exempt_names = names.into_iter().map(Into::into).collect();
        for record in self.records.values_mut() {
            record.is_exempt = record.exempt_by_host || self.exempt_names.contains(&record.name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&AstronautRecord> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AstronautRecord> {
        self.records.get_mut(name)
    }

    pub fn get_or_create(&mut self, name: &str) -> &mut AstronautRecord {
        let exempt = self.exempt_names.contains(name);
        self.records.entry(name.to_string()).or_insert_with(|| {
            let mut record = AstronautRecord::new(name);
            record.is_exempt = exempt;
            record
        })
    }

    /// Insert a restored record, replacing any existing one.
    pub fn insert(&mut self, mut record: AstronautRecord) {
        record.is_exempt = record.exempt_by_host || self.exempt_names.contains(&record.name);
        self.records.insert(record.name.clone(), record);
    }

    pub fn remove(&mut self, name: &str) -> Option<AstronautRecord> {
        self.records.remove(name)
    }

    /// Set or clear the host exemption. Creates the record if needed. A name
    /// on the settings list stays exempt either way.
    pub fn set_exempt(&mut self, name: &str, exempt: bool) {
        let listed = self.exempt_names.contains(name);
        let record = self.get_or_create(name);
        record.exempt_by_host = exempt;
        record.is_exempt = exempt || listed;
    }

    /// Whether `name` is exempt, without creating a record.
    pub fn is_exempt(&self, name: &str) -> bool {
        match self.records.get(name) {
            Some(record) => record.is_exempt,
            None => self.exempt_names.contains(name),
        }
    }

    /// Crew from `crew` who eat, in manifest order.
    pub fn eaters(&mut self, crew: &[String]) -> Vec<String> {
        crew.iter()
            .filter(|name| !self.get_or_create(name).is_exempt)
            .cloned()
            .collect()
    }

    /// Number of crew from `crew` that count toward demand.
    pub fn crew_count(&mut self, crew: &[String]) -> u32 {
        self.eaters(crew).len() as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = &AstronautRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exempt_crew_do_not_count() {
        let mut roster = AstronautRoster::new();
        roster.set_exempt_names(["Jeb", "Bill"]);
        let crew = names(&["Jeb", "Bill", "Bob", "Val", "Gene"]);

        assert_eq!(roster.crew_count(&crew), 3);
        assert_eq!(roster.eaters(&crew), names(&["Bob", "Val", "Gene"]));
        assert_eq!(roster.len(), 5);
    }

    #[test]
    fn test_exemption_applies_to_existing_records() {
        let mut roster = AstronautRoster::new();
        roster.get_or_create("Jeb");
        roster.set_exempt_names(["Jeb"]);
        assert!(roster.get("Jeb").unwrap().is_exempt);
    }

    #[test]
    fn test_host_exemption_survives_settings_change() {
        let mut roster = AstronautRoster::new();
        roster.set_exempt("Tourist", true);
        roster.set_exempt_names(Vec::<String>::new());
        assert!(roster.get("Tourist").unwrap().is_exempt);
    }

    #[test]
    fn test_dropping_name_from_list_restores_eating() {
        let mut roster = AstronautRoster::new();
        roster.set_exempt_names(["Jeb"]);
        let crew = names(&["Jeb"]);
        assert!(roster.eaters(&crew).is_empty());

        roster.set_exempt_names(Vec::<String>::new());
        assert!(!roster.get("Jeb").unwrap().is_exempt);
        assert_eq!(roster.eaters(&crew), crew);
    }

    #[test]
    fn test_host_exemption_outlives_list_entry() {
        let mut roster = AstronautRoster::new();
        roster.set_exempt_names(["Val"]);
        roster.set_exempt("Val", true);
        roster.set_exempt_names(Vec::<String>::new());
        assert!(roster.is_exempt("Val"));

        roster.set_exempt("Val", false);
        assert!(!roster.is_exempt("Val"));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut roster = AstronautRoster::new();
        assert!(roster.remove("Nobody").is_none());
        assert!(roster.is_empty());
    }
}
