//! Raw telemetry mapping for coolwatch.
//!
//! Each container family reports its cooling loop with different field
//! names. The structs here map those fields one to one; nothing is
//! converted or validated. A payload that does not match its family's
//! shape maps to the all-empty default, which classifies as unknown.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Map a raw `last` payload into a family's typed readings.
pub fn map_readings<T: DeserializeOwned + Default>(raw: &Value) -> T {
    if raw.is_null() {
        return T::default();
    }
    match T::deserialize(raw) {
        Ok(readings) => readings,
        Err(err) => {
            tracing::debug!(error = %err, "telemetry did not match family shape");
            T::default()
        }
    }
}

/// Bitdeer container: two oil pumps, two tanks.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct BitdeerTelemetry {
    #[serde(default)]
    pub cooling_system: BitdeerCoolingSystem,
    pub tank1_bar: Option<f64>,
    pub tank2_bar: Option<f64>,
}

impl BitdeerTelemetry {
    /// Pressure of the tank served by pump `index`.
    pub fn tank_bar(&self, index: usize) -> Option<f64> {
        match index {
            0 => self.tank1_bar,
            1 => self.tank2_bar,
            _ => None,
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct BitdeerCoolingSystem {
    #[serde(default)]
    pub oil_pump: Vec<OilPump>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OilPump {
    /// Oil temperature on the cold side of the pump
    pub cold_temp_c: Option<f64>,
    #[serde(default = "pump_enabled_by_default")]
    pub enabled: bool,
}

fn pump_enabled_by_default() -> bool {
    true
}

/// MicroBT container (Wonder and Kehua share the CDU layout).
#[derive(Deserialize, Clone, Debug, Default)]
pub struct MicrobtTelemetry {
    #[serde(default)]
    pub cdu: Cdu,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Cdu {
    /// Water temperature at the unit inlet
    pub unit_inlet_temp_t2: Option<f64>,
    /// Circulating pump running, i.e. cooling on
    #[serde(default)]
    pub circulating_pump: bool,
}

/// Antspace Hydro container.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct HydroTelemetry {
    pub supply_liquid_temp: Option<f64>,
    pub second_supply_temp1: Option<f64>,
    pub second_supply_temp2: Option<f64>,
    pub supply_liquid_pressure: Option<f64>,
}

/// Antspace (Bitmain) Immersion container.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ImmersionTelemetry {
    pub supply_liquid_temp: Option<f64>,
    pub second_supply_temp1: Option<f64>,
    pub second_supply_temp2: Option<f64>,
}
