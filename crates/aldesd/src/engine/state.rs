use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Unit string used by every temperature sensor reporting in Celsius.
pub const TEMP_CELSIUS: &str = "°C";

/// Device class for numeric sensors, matching Home Assistant's sensor device classes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorDeviceClass {
    Temperature,
    Humidity,
    Pressure,
    CarbonDioxide,
}

/// State of a numeric sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorState {
    /// Last known reading, `None` until the integration has seen one.
    pub value: Option<f64>,

    /// Display name at the time the state was written.
    pub name: Option<String>,

    pub device_class: Option<SensorDeviceClass>,

    pub unit_of_measurement: Option<String>,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub sensors: HashMap<String, SensorState>,
}
