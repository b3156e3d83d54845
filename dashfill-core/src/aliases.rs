//! Alias table mapping source metric names to dashboard labels

use crate::error::{Error, Result};
use crate::extractor::{MetricMapping, MetricRecord, metric_key};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Source-side name to destination-side name, applied in a single hop
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Normalized source key -> (source name, destination name)
    entries: BTreeMap<String, (String, String)>,
    match_case: bool,
}

impl AliasTable {
    pub fn new(match_case: bool) -> Self {
        Self {
            entries: BTreeMap::new(),
            match_case,
        }
    }

    /// Load the alias file, or an empty table when the file does not exist
    pub fn load_or_empty<P: AsRef<Path>>(path: P, match_case: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(
                "alias file {} not found, metric names are matched as-is",
                path.display()
            );
            return Ok(Self::new(match_case));
        }
        Self::from_file(path, match_case)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, match_case: bool) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content, match_case)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a JSON object of `"source name": "dashboard label"` pairs
    pub fn from_json_str(json: &str, match_case: bool) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid alias JSON: {e}")))?;
        let serde_json::Value::Object(object) = raw else {
            return Err(Error::Config(
                "metric aliases must be a JSON object".to_string(),
            ));
        };

        let mut table = Self::new(match_case);
        for (source, destination) in object {
            let serde_json::Value::String(destination) = destination else {
                return Err(Error::Config(format!(
                    "alias for '{source}' must be a string"
                )));
            };
            table.insert(&source, &destination);
        }
        Ok(table)
    }

    /// Add an alias; entries with a blank side are ignored
    pub fn insert(&mut self, source: &str, destination: &str) {
        let (source, destination) = (source.trim(), destination.trim());
        if source.is_empty() || destination.is_empty() {
            return;
        }
        self.entries.insert(
            metric_key(source, self.match_case),
            (source.to_string(), destination.to_string()),
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dashboard label declared for a source name
    pub fn destination_for(&self, source: &str) -> Option<&str> {
        self.entries
            .get(&metric_key(source, self.match_case))
            .map(|(_, destination)| destination.as_str())
    }

    /// Find the value for a dashboard label
    ///
    /// An exact match in the mapping wins. Otherwise the first record (in
    /// mapping order) whose alias equals the label is used. Aliases are never
    /// chained.
    pub fn lookup<'m>(&self, mapping: &'m MetricMapping, label: &str) -> Option<&'m MetricRecord> {
        if let Some(record) = mapping.get(label) {
            return Some(record);
        }

        let wanted = mapping.key(label);
        mapping.iter().find(|record| {
            self.destination_for(&record.name)
                .is_some_and(|destination| mapping.key(destination) == wanted)
        })
    }
}
