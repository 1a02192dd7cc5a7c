//! Sweep results.

use anyhow::Result;
use gridtune_space::Configuration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One measured configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningRecord {
    /// Canonical identity: the configuration's values joined with `_`.
    pub instance: String,
    /// The full name→value assignment behind the identity.
    pub params: Configuration,
    /// Robust average execution time in milliseconds.
    pub time_ms: f64,
}

/// Append-only table of measured configurations.
///
/// Records keep insertion order, which matches the enumeration order of the
/// sweep; the best configuration is selected by a full scan at sweep end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuningResults {
    records: Vec<TuningRecord>,
}

impl TuningResults {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: TuningRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TuningRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &TuningRecord> {
        self.records.iter()
    }

    pub fn get(&self, instance: &str) -> Option<&TuningRecord> {
        self.records.iter().find(|r| r.instance == instance)
    }

    /// The fastest measured configuration; the earliest record wins ties.
    /// `None` when every configuration was pruned or skipped.
    pub fn best(&self) -> Option<&TuningRecord> {
        self.records.iter().fold(None, |best, record| match best {
            Some(current) if current.time_ms <= record.time_ms => Some(current),
            _ => Some(record),
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let blob = serde_json::to_vec_pretty(self)?;
        fs::write(path, blob)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let results = serde_json::from_slice(&data)?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridtune_space::Configuration;

    fn record(instance: &str, time_ms: f64) -> TuningRecord {
        TuningRecord {
            instance: instance.to_string(),
            params: Configuration::from_pairs([("x", 1)]),
            time_ms,
        }
    }

    #[test]
    fn test_best_picks_minimum_time() {
        let mut results = TuningResults::new();
        results.push(record("64", 2.0));
        results.push(record("128", 1.0));
        results.push(record("256", 3.0));
        assert_eq!(results.best().map(|r| r.instance.as_str()), Some("128"));
    }

    #[test]
    fn test_best_prefers_earliest_on_tie() {
        let mut results = TuningResults::new();
        results.push(record("a", 1.0));
        results.push(record("b", 1.0));
        assert_eq!(results.best().map(|r| r.instance.as_str()), Some("a"));
    }

    #[test]
    fn test_empty_results_have_no_best() {
        assert!(TuningResults::new().best().is_none());
    }

    #[test]
    fn test_lookup_by_instance() {
        let mut results = TuningResults::new();
        results.push(record("64", 2.0));
        assert!(results.get("64").is_some());
        assert!(results.get("65").is_none());
    }
}
