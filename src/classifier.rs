//! Per-family severity classification.
//!
//! Every container family implements [`ClassifierStrategy`]. A strategy maps
//! the family's telemetry into channels, applies the family's gating rules
//! and classifies each channel against the active [`ThresholdSet`].

use serde_json::Value;

use crate::registry::{ContainerType, SettingsFamily};
use crate::telemetry::{
    map_readings, BitdeerTelemetry, HydroTelemetry, ImmersionTelemetry, MicrobtTelemetry,
};
use crate::thresholds::{classify, Classification, ClassifyContext, Quantity, ThresholdSet};

/// Number of oil pumps (and tanks) on a Bitdeer container.
const BITDEER_PUMPS: usize = 2;

/// One classified reading of a container.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelReport {
    pub label: String,
    pub quantity: Quantity,
    pub value: Option<f64>,
    pub classification: Classification,
}

impl ChannelReport {
    fn new(
        label: impl Into<String>,
        quantity: Quantity,
        value: Option<f64>,
        thresholds: &ThresholdSet,
        context: ClassifyContext,
    ) -> Self {
        Self {
            label: label.into(),
            quantity,
            value,
            classification: classify(value, thresholds.get(quantity), context),
        }
    }
}

/// Classification rules of one container family.
pub trait ClassifierStrategy: Sync {
    fn family(&self) -> SettingsFamily;

    /// Classify every relevant channel of a running container.
    fn channels(&self, telemetry: &Value, thresholds: &ThresholdSet) -> Vec<ChannelReport>;
}

/// Strategy for a container type.
pub fn strategy_for(container_type: ContainerType) -> &'static dyn ClassifierStrategy {
    match container_type {
        ContainerType::Bitdeer => &BitdeerStrategy,
        ContainerType::MicrobtWonder | ContainerType::MicrobtKehua => &MicrobtStrategy,
        ContainerType::AntspaceHydro => &AntspaceHydroStrategy,
        ContainerType::AntspaceImmersion => &AntspaceImmersionStrategy,
    }
}

/// Bitdeer: each pump gates its own oil channel and its tank's pressure.
pub struct BitdeerStrategy;

impl ClassifierStrategy for BitdeerStrategy {
    fn family(&self) -> SettingsFamily {
        SettingsFamily::Bitdeer
    }

    fn channels(&self, telemetry: &Value, thresholds: &ThresholdSet) -> Vec<ChannelReport> {
        let readings: BitdeerTelemetry = map_readings(telemetry);
        let mut reports = Vec::with_capacity(BITDEER_PUMPS * 2);

        for index in 0..BITDEER_PUMPS {
            let pump = readings.cooling_system.oil_pump.get(index);
            let context = ClassifyContext::enabled(pump.map_or(true, |p| p.enabled));

            reports.push(ChannelReport::new(
                format!("Oil T{}", index + 1),
                Quantity::OilTemperature,
                pump.and_then(|p| p.cold_temp_c),
                thresholds,
                context,
            ));
            reports.push(ChannelReport::new(
                format!("Tank{}", index + 1),
                Quantity::TankPressure,
                readings.tank_bar(index),
                thresholds,
                context,
            ));
        }

        reports
    }
}

/// MicroBT: nothing flashes while the circulating pump is off.
pub struct MicrobtStrategy;

impl ClassifierStrategy for MicrobtStrategy {
    fn family(&self) -> SettingsFamily {
        SettingsFamily::Microbt
    }

    fn channels(&self, telemetry: &Value, thresholds: &ThresholdSet) -> Vec<ChannelReport> {
        let readings: MicrobtTelemetry = map_readings(telemetry);
        vec![ChannelReport::new(
            "Water T2",
            Quantity::WaterTemperature,
            readings.cdu.unit_inlet_temp_t2,
            thresholds,
            ClassifyContext::enabled(readings.cdu.circulating_pump),
        )]
    }
}

/// Antspace Hydro: primary and secondary supply temperatures plus supply
/// pressure.
pub struct AntspaceHydroStrategy;

impl ClassifierStrategy for AntspaceHydroStrategy {
    fn family(&self) -> SettingsFamily {
        SettingsFamily::AntspaceHydro
    }

    fn channels(&self, telemetry: &Value, thresholds: &ThresholdSet) -> Vec<ChannelReport> {
        let readings: HydroTelemetry = map_readings(telemetry);
        let on = ClassifyContext::default();
        vec![
            ChannelReport::new(
                "Supply T",
                Quantity::WaterTemperature,
                readings.supply_liquid_temp,
                thresholds,
                on,
            ),
            ChannelReport::new(
                "Supply T1",
                Quantity::WaterTemperature,
                readings.second_supply_temp1,
                thresholds,
                on,
            ),
            ChannelReport::new(
                "Supply T2",
                Quantity::WaterTemperature,
                readings.second_supply_temp2,
                thresholds,
                on,
            ),
            ChannelReport::new(
                "Supply P",
                Quantity::SupplyLiquidPressure,
                readings.supply_liquid_pressure,
                thresholds,
                on,
            ),
        ]
    }
}

/// Antspace Immersion: primary and secondary oil supply temperatures.
pub struct AntspaceImmersionStrategy;

impl ClassifierStrategy for AntspaceImmersionStrategy {
    fn family(&self) -> SettingsFamily {
        SettingsFamily::AntspaceImmersion
    }

    fn channels(&self, telemetry: &Value, thresholds: &ThresholdSet) -> Vec<ChannelReport> {
        let readings: ImmersionTelemetry = map_readings(telemetry);
        let on = ClassifyContext::default();
        [
            ("Supply T", readings.supply_liquid_temp),
            ("Supply T1", readings.second_supply_temp1),
            ("Supply T2", readings.second_supply_temp2),
        ]
        .into_iter()
        .map(|(label, value)| {
            ChannelReport::new(label, Quantity::OilTemperature, value, thresholds, on)
        })
        .collect()
    }
}
