//! Container settings records and the stores that persist them.
//!
//! The settings backend is a collaborator: the dashboard only queries all
//! records once and writes single records back through [`SettingsStore`].
//! Two stores are provided, a JSON file on disk and an in-memory store for
//! sessions started without `--settings-file`.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::thresholds::ThresholdSet;

/// Persisted settings for one container model.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSettings {
    pub model: String,
    #[serde(default)]
    pub thresholds: ThresholdSet,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

/// Body of a save or reset request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SavePayload {
    pub data: SaveData,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SaveData {
    pub model: String,
    pub parameters: BTreeMap<String, f64>,
    pub thresholds: ThresholdSet,
    pub site: String,
}

impl SavePayload {
    pub fn new(
        model: impl Into<String>,
        site: impl Into<String>,
        thresholds: ThresholdSet,
        parameters: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            data: SaveData {
                model: model.into(),
                parameters,
                thresholds,
                site: site.into(),
            },
        }
    }

    /// Record this payload creates or replaces.
    pub fn to_settings(&self) -> ContainerSettings {
        ContainerSettings {
            model: self.data.model.clone(),
            thresholds: self.data.thresholds.clone(),
            parameters: self.data.parameters.clone(),
        }
    }
}

/// Settings backend.
pub trait SettingsStore {
    /// Fetch every stored record.
    fn load(&self) -> Result<Vec<ContainerSettings>>;

    /// Create or replace the record for the payload's model.
    fn save(&mut self, payload: &SavePayload) -> Result<()>;
}

/// Replace the record with the same model, or append.
fn upsert(records: &mut Vec<ContainerSettings>, record: ContainerSettings) {
    match records.iter_mut().find(|r| r.model == record.model) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

/// Settings kept in a JSON array on disk.
#[derive(Clone, Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn load(&self) -> Result<Vec<ContainerSettings>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&mut self, payload: &SavePayload) -> Result<()> {
        let mut records = self.load()?;
        upsert(&mut records, payload.to_settings());

        // Replace atomically
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&records)?)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(model = %payload.data.model, path = %self.path.display(), "settings written");
        Ok(())
    }
}

/// Session-only settings store.
#[derive(Clone, Debug, Default)]
pub struct MemorySettingsStore {
    records: Vec<ContainerSettings>,
    reject_writes: Option<String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ContainerSettings>) -> Self {
        Self {
            records,
            reject_writes: None,
        }
    }

    /// Store whose writes all fail with `reason`.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            reject_writes: Some(reason.into()),
        }
    }

    pub fn records(&self) -> &[ContainerSettings] {
        &self.records
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Vec<ContainerSettings>> {
        Ok(self.records.clone())
    }

    fn save(&mut self, payload: &SavePayload) -> Result<()> {
        if let Some(reason) = &self.reject_writes {
            return Err(Error::Settings {
                model: payload.data.model.clone(),
                reason: reason.clone(),
            });
        }
        upsert(&mut self.records, payload.to_settings());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::{BandKind, LevelKey, Quantity, ThresholdBand};

    fn payload(model: &str, critical_high: f64) -> SavePayload {
        let band =
            ThresholdBand::from_values(BandKind::Temperature, [30.0, 39.0, 42.0, 46.0, critical_high]);
        SavePayload::new(
            model,
            "site-a",
            ThresholdSet::new().with(Quantity::OilTemperature, band),
            BTreeMap::from([("fanSpeed".to_string(), 80.0)]),
        )
    }

    #[test]
    fn test_payload_json_shape() {
        let value = serde_json::to_value(payload("bd", 48.0)).unwrap();
        assert_eq!(value["data"]["model"], "bd");
        assert_eq!(value["data"]["site"], "site-a");
        assert_eq!(value["data"]["parameters"]["fanSpeed"], 80.0);
        assert_eq!(value["data"]["thresholds"]["oilTemperature"]["criticalHigh"], 48.0);
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettingsStore::new(dir.path().join("settings.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_upserts_by_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileSettingsStore::new(dir.path().join("settings.json"));

        store.save(&payload("bd", 48.0)).unwrap();
        store.save(&payload("mbt", 50.0)).unwrap();
        store.save(&payload("bd", 49.0)).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        let bd = records.iter().find(|r| r.model == "bd").unwrap();
        let oil = bd.thresholds.get(Quantity::OilTemperature).unwrap();
        assert_eq!(oil.get(LevelKey::CriticalHigh), Some(49.0));
        assert_eq!(bd.parameters.get("fanSpeed"), Some(&80.0));
    }

    #[test]
    fn test_file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileSettingsStore::new(&path);
        assert!(matches!(store.load(), Err(Error::Json(_))));
    }

    #[test]
    fn test_rejecting_store_keeps_records() {
        let mut store = MemorySettingsStore::rejecting("backend unavailable");
        let err = store.save(&payload("bd", 48.0)).unwrap_err();
        assert!(err.to_string().contains("backend unavailable"));
        assert!(store.records().is_empty());
    }
}
