//! Threshold bands and severity classification for coolwatch.
//!
//! This module defines the ordered level bands that apply to one physical
//! quantity, the [`Severity`] scale a reading is mapped onto, and the
//! generic [`classify`] routine shared by every container family.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of level slots in every band.
pub const LEVEL_COUNT: usize = 5;

const CRITICAL_LOW: usize = 0;
const ALARM_LOW: usize = 1;
const ALARM_HIGH: usize = 3;
const CRITICAL_HIGH: usize = 4;

/// Severity of a single reading.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Severity {
    /// Below the critical-low ceiling
    CriticalLow,
    /// Between the critical-low and alarm-low ceilings
    AlarmLow,
    /// Inside the normal band
    Normal,
    /// At or above the alarm-high floor
    AlarmHigh,
    /// At or above the critical-high floor
    CriticalHigh,
    /// Channel is disabled (cooling off, pump off, container not running)
    Neutral,
    /// No usable value or band
    #[default]
    Unknown,
}

impl Severity {
    /// Display color used by the dashboard.
    pub fn color(self) -> &'static str {
        match self {
            Severity::CriticalLow | Severity::CriticalHigh => "red",
            Severity::AlarmLow => "gold",
            Severity::Normal => "green",
            Severity::AlarmHigh => "orange",
            Severity::Neutral => "white",
            Severity::Unknown => "gray",
        }
    }

    /// Whether a reading in this band needs visual attention.
    pub fn should_flash(self) -> bool {
        !matches!(
            self,
            Severity::Normal | Severity::Neutral | Severity::Unknown
        )
    }

    /// Rank used to pick the worst channel of a container.
    pub fn rank(self) -> u8 {
        match self {
            Severity::CriticalHigh => 6,
            Severity::CriticalLow => 5,
            Severity::AlarmHigh => 4,
            Severity::AlarmLow => 3,
            Severity::Normal => 2,
            Severity::Neutral => 1,
            Severity::Unknown => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::CriticalLow => "criticalLow",
            Severity::AlarmLow => "alarmLow",
            Severity::Normal => "normal",
            Severity::AlarmHigh => "alarmHigh",
            Severity::CriticalHigh => "criticalHigh",
            Severity::Neutral => "neutral",
            Severity::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named threshold level.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum LevelKey {
    CriticalLow,
    Alert,
    AlarmLow,
    Normal,
    Alarm,
    AlarmHigh,
    CriticalHigh,
}

impl LevelKey {
    pub fn as_str(self) -> &'static str {
        match self {
            LevelKey::CriticalLow => "criticalLow",
            LevelKey::Alert => "alert",
            LevelKey::AlarmLow => "alarmLow",
            LevelKey::Normal => "normal",
            LevelKey::Alarm => "alarm",
            LevelKey::AlarmHigh => "alarmHigh",
            LevelKey::CriticalHigh => "criticalHigh",
        }
    }
}

impl fmt::Display for LevelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "criticalLow" => Ok(LevelKey::CriticalLow),
            "alert" => Ok(LevelKey::Alert),
            "alarmLow" => Ok(LevelKey::AlarmLow),
            "normal" => Ok(LevelKey::Normal),
            "alarm" => Ok(LevelKey::Alarm),
            "alarmHigh" => Ok(LevelKey::AlarmHigh),
            "criticalHigh" => Ok(LevelKey::CriticalHigh),
            other => Err(format!("unknown threshold level '{other}'")),
        }
    }
}

/// Shape of a band: which key sequence it uses.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum BandKind {
    /// `criticalLow, alert, normal, alarm, criticalHigh`
    Temperature,
    /// `criticalLow, alarmLow, normal, alarmHigh, criticalHigh`
    Pressure,
}

impl BandKind {
    /// Canonical key sequence, low to high.
    pub fn keys(self) -> [LevelKey; LEVEL_COUNT] {
        match self {
            BandKind::Temperature => [
                LevelKey::CriticalLow,
                LevelKey::Alert,
                LevelKey::Normal,
                LevelKey::Alarm,
                LevelKey::CriticalHigh,
            ],
            BandKind::Pressure => [
                LevelKey::CriticalLow,
                LevelKey::AlarmLow,
                LevelKey::Normal,
                LevelKey::AlarmHigh,
                LevelKey::CriticalHigh,
            ],
        }
    }

    /// Slot of `key` in this kind's sequence.
    pub fn index_of(self, key: LevelKey) -> Option<usize> {
        self.keys().iter().position(|k| *k == key)
    }
}

/// Physical quantity a band applies to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Quantity {
    OilTemperature,
    TankPressure,
    WaterTemperature,
    SupplyLiquidPressure,
}

impl Quantity {
    pub const ALL: [Quantity; 4] = [
        Quantity::OilTemperature,
        Quantity::TankPressure,
        Quantity::WaterTemperature,
        Quantity::SupplyLiquidPressure,
    ];

    pub fn kind(self) -> BandKind {
        match self {
            Quantity::OilTemperature => BandKind::Temperature,
            Quantity::TankPressure | Quantity::WaterTemperature | Quantity::SupplyLiquidPressure => {
                BandKind::Pressure
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quantity::OilTemperature => "oilTemperature",
            Quantity::TankPressure => "tankPressure",
            Quantity::WaterTemperature => "waterTemperature",
            Quantity::SupplyLiquidPressure => "supplyLiquidPressure",
        }
    }

    /// Unit shown next to values.
    pub fn unit(self) -> &'static str {
        match self {
            Quantity::OilTemperature | Quantity::WaterTemperature => "°C",
            Quantity::TankPressure | Quantity::SupplyLiquidPressure => "bar",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quantity::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("unknown quantity '{s}'"))
    }
}

/// Ordered threshold levels for one quantity.
///
/// Levels live in a fixed array indexed by their position in the kind's
/// canonical sequence. Present levels are expected to be non-decreasing
/// once an edit has been committed; see [`ThresholdBand::is_ordered`].
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdBand {
    kind: BandKind,
    levels: [Option<f64>; LEVEL_COUNT],
}

impl ThresholdBand {
    /// Band with no levels set.
    pub fn new(kind: BandKind) -> Self {
        Self {
            kind,
            levels: [None; LEVEL_COUNT],
        }
    }

    /// Band with every level set, low to high.
    pub fn from_values(kind: BandKind, values: [f64; LEVEL_COUNT]) -> Self {
        Self {
            kind,
            levels: values.map(Some),
        }
    }

    pub fn kind(&self) -> BandKind {
        self.kind
    }

    pub fn get(&self, key: LevelKey) -> Option<f64> {
        self.kind.index_of(key).and_then(|i| self.levels[i])
    }

    /// Set a level. Returns `false` when the key does not belong to this
    /// band's kind or the value is not finite.
    pub fn set(&mut self, key: LevelKey, value: f64) -> bool {
        match self.kind.index_of(key) {
            Some(index) if value.is_finite() => {
                self.levels[index] = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.levels.get(index).copied().flatten()
    }

    pub(crate) fn set_at(&mut self, index: usize, value: f64) {
        self.levels[index] = Some(value);
    }

    /// Present levels in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (LevelKey, f64)> + '_ {
        self.kind
            .keys()
            .into_iter()
            .zip(self.levels)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Option::is_none)
    }

    /// Whether present levels are non-decreasing low to high.
    pub fn is_ordered(&self) -> bool {
        let present: Vec<f64> = self.levels.iter().flatten().copied().collect();
        present.windows(2).all(|pair| pair[0] <= pair[1])
    }

    /// Severity of `value` against this band.
    ///
    /// The two low levels are ceilings of the low bands and the two high
    /// levels are floors of the high bands. The nominal `normal` level is
    /// not a boundary. Absent levels are skipped.
    pub fn severity_of(&self, value: f64) -> Severity {
        let reached = |slot: usize| self.levels[slot].is_some_and(|level| value >= level);
        let below = |slot: usize| self.levels[slot].is_some_and(|level| value < level);

        if reached(CRITICAL_HIGH) {
            Severity::CriticalHigh
        } else if reached(ALARM_HIGH) {
            Severity::AlarmHigh
        } else if below(CRITICAL_LOW) {
            Severity::CriticalLow
        } else if below(ALARM_LOW) {
            Severity::AlarmLow
        } else {
            Severity::Normal
        }
    }

    fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect()
    }

    fn from_json(kind: BandKind, raw: &Value) -> Self {
        let mut band = Self::new(kind);
        if let Some(levels) = raw.as_object() {
            for (name, value) in levels {
                let (Ok(key), Some(number)) = (name.parse::<LevelKey>(), value.as_f64()) else {
                    continue;
                };
                band.set(key, number);
            }
        }
        band
    }
}

/// Active bands of one container, keyed by quantity.
///
/// JSON form is `{ "<quantity>": { "<level>": number } }`. Unknown
/// quantities, unknown level keys and non-numeric values are dropped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, BTreeMap<String, f64>>"
)]
pub struct ThresholdSet {
    bands: BTreeMap<Quantity, ThresholdBand>,
}

impl ThresholdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, quantity: Quantity, band: ThresholdBand) -> Self {
        self.insert(quantity, band);
        self
    }

    pub fn insert(&mut self, quantity: Quantity, band: ThresholdBand) {
        self.bands.insert(quantity, band);
    }

    pub fn get(&self, quantity: Quantity) -> Option<&ThresholdBand> {
        self.bands.get(&quantity)
    }

    /// Band for `quantity`, created empty if missing.
    pub fn band_mut(&mut self, quantity: Quantity) -> &mut ThresholdBand {
        self.bands
            .entry(quantity)
            .or_insert_with(|| ThresholdBand::new(quantity.kind()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Quantity, &ThresholdBand)> {
        self.bands.iter().map(|(q, b)| (*q, b))
    }

    pub fn quantities(&self) -> Vec<Quantity> {
        self.bands.keys().copied().collect()
    }

    /// True when no band carries a level.
    pub fn is_empty(&self) -> bool {
        self.bands.values().all(ThresholdBand::is_empty)
    }
}

impl From<BTreeMap<String, Value>> for ThresholdSet {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        let mut set = ThresholdSet::new();
        for (name, levels) in &raw {
            let Ok(quantity) = name.parse::<Quantity>() else {
                continue;
            };
            set.insert(quantity, ThresholdBand::from_json(quantity.kind(), levels));
        }
        set
    }
}

impl From<ThresholdSet> for BTreeMap<String, BTreeMap<String, f64>> {
    fn from(set: ThresholdSet) -> Self {
        set.bands
            .iter()
            .map(|(quantity, band)| (quantity.as_str().to_string(), band.to_map()))
            .collect()
    }
}

/// Gating applied before a value is compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassifyContext {
    /// Cooling off, pump off or container not running.
    pub disabled: bool,
}

impl ClassifyContext {
    pub fn enabled(on: bool) -> Self {
        Self { disabled: !on }
    }
}

/// Outcome of classifying one reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub severity: Severity,
    pub should_flash: bool,
    /// Drives audible alarms.
    pub is_critically_high: bool,
    /// Computed for completeness; never drives audible alarms.
    pub is_critically_low: bool,
}

impl Classification {
    pub fn of(severity: Severity) -> Self {
        Self {
            severity,
            should_flash: severity.should_flash(),
            is_critically_high: severity == Severity::CriticalHigh,
            is_critically_low: severity == Severity::CriticalLow,
        }
    }
}

/// Classify a reading against a band.
///
/// A disabled context always wins and yields [`Severity::Neutral`]. An
/// absent or non-finite value, or an absent or empty band, yields
/// [`Severity::Unknown`].
pub fn classify(
    value: Option<f64>,
    band: Option<&ThresholdBand>,
    context: ClassifyContext,
) -> Classification {
    if context.disabled {
        return Classification::of(Severity::Neutral);
    }
    match (value, band) {
        (Some(v), Some(band)) if v.is_finite() && !band.is_empty() => {
            Classification::of(band.severity_of(v))
        }
        _ => Classification::of(Severity::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water_band() -> ThresholdBand {
        ThresholdBand::from_values(BandKind::Pressure, [25.0, 33.0, 35.0, 37.0, 39.0])
    }

    fn on() -> ClassifyContext {
        ClassifyContext::enabled(true)
    }

    #[test]
    fn test_water_temperature_scenarios() {
        let band = water_band();

        let c = classify(Some(-1000.0), Some(&band), on());
        assert_eq!(c.severity.color(), "red");
        assert!(c.should_flash);
        assert!(c.is_critically_low);

        let c = classify(Some(24.9), Some(&band), on());
        assert_eq!(c.severity.color(), "red");
        assert!(c.should_flash);

        let c = classify(Some(25.0), Some(&band), on());
        assert_eq!(c.severity, Severity::AlarmLow);
        assert_eq!(c.severity.color(), "gold");
        assert!(c.should_flash);

        let c = classify(Some(34.0), Some(&band), on());
        assert_eq!(c.severity, Severity::Normal);
        assert!(!c.should_flash);

        let c = classify(Some(37.0), Some(&band), on());
        assert_eq!(c.severity.color(), "orange");
        assert!(c.should_flash);
        assert!(!c.is_critically_high);

        let c = classify(Some(39.0), Some(&band), on());
        assert_eq!(c.severity.color(), "red");
        assert!(c.should_flash);
        assert!(c.is_critically_high);
    }

    #[test]
    fn test_disabled_is_neutral() {
        let band = water_band();
        for value in [-1000.0, 24.9, 25.0, 34.0, 37.0, 39.0, 1000.0, f64::NAN] {
            let c = classify(Some(value), Some(&band), ClassifyContext::enabled(false));
            assert_eq!(c.severity, Severity::Neutral);
            assert_eq!(c.severity.color(), "white");
            assert!(!c.should_flash);
            assert!(!c.is_critically_high);
        }
    }

    #[test]
    fn test_missing_inputs_are_unknown() {
        let band = water_band();
        assert_eq!(classify(None, Some(&band), on()).severity, Severity::Unknown);
        assert_eq!(classify(Some(30.0), None, on()).severity, Severity::Unknown);
        assert_eq!(
            classify(Some(f64::INFINITY), Some(&band), on()).severity,
            Severity::Unknown
        );
        let empty = ThresholdBand::new(BandKind::Pressure);
        let c = classify(Some(30.0), Some(&empty), on());
        assert_eq!(c.severity, Severity::Unknown);
        assert!(!c.should_flash);
    }

    #[test]
    fn test_absent_levels_are_skipped() {
        let mut band = ThresholdBand::new(BandKind::Temperature);
        band.set(LevelKey::CriticalHigh, 48.0);
        assert_eq!(band.severity_of(10.0), Severity::Normal);
        assert_eq!(band.severity_of(48.0), Severity::CriticalHigh);
    }

    #[test]
    fn test_set_rejects_foreign_key() {
        let mut band = ThresholdBand::new(BandKind::Temperature);
        assert!(!band.set(LevelKey::AlarmHigh, 3.0));
        assert!(band.set(LevelKey::Alarm, 46.0));
        assert!(!band.set(LevelKey::Alarm, f64::NAN));
        assert_eq!(band.get(LevelKey::Alarm), Some(46.0));
    }

    #[test]
    fn test_is_ordered_allows_ties() {
        let band = ThresholdBand::from_values(BandKind::Temperature, [45.0, 45.0, 45.0, 46.0, 48.0]);
        assert!(band.is_ordered());
        let band = ThresholdBand::from_values(BandKind::Temperature, [45.0, 39.0, 42.0, 46.0, 48.0]);
        assert!(!band.is_ordered());
    }

    #[test]
    fn test_threshold_set_json_shape() {
        let json = r#"{
            "oilTemperature": {"criticalLow": 30, "alert": 39, "normal": 42, "alarm": 46, "criticalHigh": 48, "bogus": 1},
            "tankPressure": {"alarmHigh": 3.5, "criticalHigh": null},
            "hashrate": {"normal": 100}
        }"#;
        let set: ThresholdSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.quantities(), vec![Quantity::OilTemperature, Quantity::TankPressure]);

        let oil = set.get(Quantity::OilTemperature).unwrap();
        assert_eq!(oil.get(LevelKey::Alert), Some(39.0));
        let tank = set.get(Quantity::TankPressure).unwrap();
        assert_eq!(tank.get(LevelKey::AlarmHigh), Some(3.5));
        assert_eq!(tank.get(LevelKey::CriticalHigh), None);

        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["oilTemperature"]["alarm"], 46.0);
        assert!(value["oilTemperature"].get("bogus").is_none());
        assert!(value.get("hashrate").is_none());
    }

    #[test]
    fn test_empty_set() {
        let mut set = ThresholdSet::new();
        assert!(set.is_empty());
        set.insert(Quantity::TankPressure, ThresholdBand::new(BandKind::Pressure));
        assert!(set.is_empty());
        set.band_mut(Quantity::TankPressure).set(LevelKey::Normal, 2.0);
        assert!(!set.is_empty());
    }
}
