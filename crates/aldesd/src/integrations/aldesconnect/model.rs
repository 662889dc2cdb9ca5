//! Product records as returned by the AldesConnect cloud API.
//!
//! Only the fields the sensor platform reads are modelled; everything else in
//! the payload is ignored. A record missing one of the modelled fields fails
//! to decode, there is no partial recovery.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use super::Error;

/// One Aldes product (e.g. a T.One heat pump) and its live indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub serial_number: String,

    /// Product model code
    pub reference: String,

    pub indicator: Indicator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub thermostats: Vec<Thermostat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thermostat {
    #[serde(rename = "ThermostatId")]
    pub id: ThermostatId,

    #[serde(rename = "Name")]
    pub name: String,

    /// Degrees Celsius
    #[serde(rename = "CurrentTemperature")]
    pub current_temperature: f64,
}

/// Thermostat identifier, unique within a product.
///
/// The API sends it as a JSON number; strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ThermostatId(String);

impl ThermostatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThermostatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThermostatId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for ThermostatId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Unsigned(n) => Self(n.to_string()),
            Raw::Signed(n) => Self(n.to_string()),
        })
    }
}

/// Decode a products list from its JSON text.
pub fn parse_products(json: &str) -> Result<Vec<Product>, Error> {
    serde_json::from_str(json).map_err(Error::Decode)
}

/// Decode a products list from an already parsed JSON value.
pub fn products_from_value(value: serde_json::Value) -> Result<Vec<Product>, Error> {
    serde_json::from_value(value).map_err(Error::Decode)
}

/// Read and decode a products list from a JSON file.
pub fn load_products(path: impl AsRef<Path>) -> Result<Vec<Product>, Error> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Io(path.as_ref().to_path_buf(), e))?;
    parse_products(&contents)
}
