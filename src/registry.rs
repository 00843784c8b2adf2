//! Container families, built-in threshold tables and threshold resolution.
//!
//! The [`ThresholdRegistry`] is built once at startup and handed around by
//! reference. [`ThresholdRegistry::resolve`] picks the active set for a
//! container: saved settings, then thresholds carried by the container
//! payload, then the built-in table for its family.

use std::collections::BTreeMap;
use std::fmt;

use crate::settings::ContainerSettings;
use crate::thresholds::{BandKind, Quantity, ThresholdBand, ThresholdSet};

/// Container type declared by a raw model string.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ContainerType {
    Bitdeer,
    MicrobtWonder,
    MicrobtKehua,
    AntspaceHydro,
    AntspaceImmersion,
}

impl ContainerType {
    /// Parse a raw model such as `container-bd-d40-a1346`.
    ///
    /// The leading `container-` segment is optional, so settings models
    /// (`bd`, `mbt`, `hydro`, `immersion`) parse as well.
    pub fn from_model(model: &str) -> Option<Self> {
        let mut tokens = model
            .split('-')
            .filter(|t| !t.is_empty())
            .map(str::to_ascii_lowercase);
        let mut family = tokens.next()?;
        if family == "container" {
            family = tokens.next()?;
        }
        let variant = tokens.next();

        match (family.as_str(), variant.as_deref()) {
            ("bd", _) => Some(ContainerType::Bitdeer),
            ("mbt", Some("kehua")) => Some(ContainerType::MicrobtKehua),
            ("mbt", _) => Some(ContainerType::MicrobtWonder),
            ("as", Some("hk3" | "hydro")) | ("hydro", _) => Some(ContainerType::AntspaceHydro),
            ("as", Some("immersion")) | ("immersion", _) => Some(ContainerType::AntspaceImmersion),
            _ => None,
        }
    }

    pub fn family(self) -> SettingsFamily {
        match self {
            ContainerType::Bitdeer => SettingsFamily::Bitdeer,
            ContainerType::MicrobtWonder | ContainerType::MicrobtKehua => SettingsFamily::Microbt,
            ContainerType::AntspaceHydro => SettingsFamily::AntspaceHydro,
            ContainerType::AntspaceImmersion => SettingsFamily::AntspaceImmersion,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContainerType::Bitdeer => "Bitdeer",
            ContainerType::MicrobtWonder => "MicroBT Wonder",
            ContainerType::MicrobtKehua => "MicroBT Kehua",
            ContainerType::AntspaceHydro => "Antspace Hydro",
            ContainerType::AntspaceImmersion => "Antspace Immersion",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Family whose containers share one settings record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum SettingsFamily {
    Bitdeer,
    Microbt,
    AntspaceHydro,
    AntspaceImmersion,
}

impl SettingsFamily {
    /// Model string used for the family's settings record.
    pub fn settings_model(self) -> &'static str {
        match self {
            SettingsFamily::Bitdeer => "bd",
            SettingsFamily::Microbt => "mbt",
            SettingsFamily::AntspaceHydro => "hydro",
            SettingsFamily::AntspaceImmersion => "immersion",
        }
    }
}

/// Settings model derived from a raw model string, e.g.
/// `container-bd-d40-a1346` -> `bd`.
pub fn settings_model(model: &str) -> Option<&'static str> {
    ContainerType::from_model(model).map(|t| t.family().settings_model())
}

/// Model under which a container's settings are written.
pub fn persistence_model(model: &str) -> String {
    settings_model(model)
        .map(str::to_string)
        .unwrap_or_else(|| model.to_string())
}

/// Saved record that applies to `model`: exact match first, then the
/// derived settings model. Records without thresholds are ignored.
pub fn find_saved<'a>(saved: &'a [ContainerSettings], model: &str) -> Option<&'a ContainerSettings> {
    let usable = |record: &&ContainerSettings| !record.thresholds.is_empty();
    saved
        .iter()
        .filter(usable)
        .find(|r| r.model == model)
        .or_else(|| {
            let derived = settings_model(model)?;
            saved.iter().filter(usable).find(|r| r.model == derived)
        })
}

/// Where an active threshold set came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ThresholdSource {
    Saved,
    Parent,
    Default,
    None,
}

impl ThresholdSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdSource::Saved => "saved",
            ThresholdSource::Parent => "parent",
            ThresholdSource::Default => "default",
            ThresholdSource::None => "none",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedThresholds {
    pub set: ThresholdSet,
    pub source: ThresholdSource,
    /// Model of the saved record the set came from
    pub saved_model: Option<String>,
}

impl ResolvedThresholds {
    /// Model that edits of these thresholds are written under: the saved
    /// record's own model, else the family settings model.
    pub fn write_model(&self, raw_model: &str) -> String {
        self.saved_model
            .clone()
            .unwrap_or_else(|| persistence_model(raw_model))
    }
}

/// Read-only table of built-in thresholds per family.
#[derive(Clone, Debug)]
pub struct ThresholdRegistry {
    defaults: BTreeMap<SettingsFamily, ThresholdSet>,
}

impl Default for ThresholdRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThresholdRegistry {
    /// Registry with the factory tables for every known family.
    pub fn builtin() -> Self {
        let temperature = |v| ThresholdBand::from_values(BandKind::Temperature, v);
        let pressure = |v| ThresholdBand::from_values(BandKind::Pressure, v);

        let defaults = BTreeMap::from([
            (
                SettingsFamily::Bitdeer,
                ThresholdSet::new()
                    .with(Quantity::OilTemperature, temperature([30.0, 39.0, 42.0, 46.0, 48.0]))
                    .with(Quantity::TankPressure, pressure([1.0, 1.5, 2.0, 3.5, 4.0])),
            ),
            (
                SettingsFamily::Microbt,
                ThresholdSet::new()
                    .with(Quantity::WaterTemperature, pressure([25.0, 33.0, 35.0, 37.0, 39.0])),
            ),
            (
                SettingsFamily::AntspaceHydro,
                ThresholdSet::new()
                    .with(Quantity::WaterTemperature, pressure([20.0, 25.0, 30.0, 38.0, 40.0]))
                    .with(Quantity::SupplyLiquidPressure, pressure([1.0, 1.5, 2.0, 3.0, 3.5])),
            ),
            (
                SettingsFamily::AntspaceImmersion,
                ThresholdSet::new()
                    .with(Quantity::OilTemperature, temperature([30.0, 35.0, 40.0, 45.0, 48.0])),
            ),
        ]);

        Self { defaults }
    }

    pub fn defaults_for(&self, family: SettingsFamily) -> Option<&ThresholdSet> {
        self.defaults.get(&family)
    }

    /// Built-in set for a raw model; empty for unknown families.
    pub fn defaults_for_model(&self, model: &str) -> ThresholdSet {
        ContainerType::from_model(model)
            .and_then(|t| self.defaults_for(t.family()))
            .cloned()
            .unwrap_or_default()
    }

    /// Active thresholds for a container. First non-empty source wins:
    /// saved settings, parent thresholds, built-in defaults.
    pub fn resolve(
        &self,
        saved: &[ContainerSettings],
        parent: Option<&ThresholdSet>,
        model: &str,
    ) -> ResolvedThresholds {
        if let Some(record) = find_saved(saved, model) {
            return ResolvedThresholds {
                set: record.thresholds.clone(),
                source: ThresholdSource::Saved,
                saved_model: Some(record.model.clone()),
            };
        }
        if let Some(parent) = parent.filter(|p| !p.is_empty()) {
            return ResolvedThresholds {
                set: parent.clone(),
                source: ThresholdSource::Parent,
                saved_model: None,
            };
        }
        let set = self.defaults_for_model(model);
        let source = if set.is_empty() {
            ThresholdSource::None
        } else {
            ThresholdSource::Default
        };
        ResolvedThresholds {
            set,
            source,
            saved_model: None,
        }
    }
}
