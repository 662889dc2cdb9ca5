//! Thermostat temperature sensors.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use super::ConfigEntry;
use super::DOMAIN;
use super::MANUFACTURER;
use super::coordinator::Coordinator;
use super::entity::CoordinatorEntity;
use super::entity::CoordinatorListener;
use super::entity::StateSink;
use super::model::Product;
use super::model::Thermostat;
use super::model::ThermostatId;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::SensorDeviceClass;
use crate::engine::SensorState;
use crate::engine::state::TEMP_CELSIUS;

/// Create one sensor per thermostat found in the coordinator's current snapshot
/// and hand them to `add_entities` as a single batch.
///
/// Products are visited in snapshot order and thermostats in per-product order.
/// An empty snapshot produces an empty batch.
pub fn setup_entry<C, F>(coordinator: Arc<C>, entry: &ConfigEntry, add_entities: F)
where
    C: Coordinator,
    F: FnOnce(Vec<AldesConnectSensor<C>>),
{
    let data = coordinator.data();

    let mut sensors = Vec::new();
    for product in data.iter() {
        for thermostat in &product.indicator.thermostats {
            sensors.push(AldesConnectSensor::new(
                coordinator.clone(),
                entry.clone(),
                product.serial_number.clone(),
                product.reference.clone(),
                thermostat.id.clone(),
            ));
        }
    }

    info!(
        "[{}] discovered {} thermostat sensor(s) across {} product(s)",
        entry.entry_id,
        sensors.len(),
        data.len()
    );

    add_entities(sensors);
}

/// Find the thermostat record for `(serial_number, thermostat_id)`.
///
/// The search stops at the first product whose serial number matches: if that
/// product does not list the thermostat, the result is `None` even when a later
/// product carries the same serial number.
pub fn find_thermostat<'a>(
    products: &'a [Product],
    serial_number: &str,
    thermostat_id: &ThermostatId,
) -> Option<&'a Thermostat> {
    let product = products.iter().find(|p| p.serial_number == serial_number)?;
    product
        .indicator
        .thermostats
        .iter()
        .find(|t| &t.id == thermostat_id)
}

/// Current temperature of one Aldes thermostat.
pub struct AldesConnectSensor<C: Coordinator> {
    base: CoordinatorEntity<C>,
    thermostat_id: ThermostatId,
    native_value: Option<f64>,
}

impl<C: Coordinator> AldesConnectSensor<C> {
    pub fn new(
        coordinator: Arc<C>,
        config_entry: ConfigEntry,
        product_serial_number: String,
        reference: String,
        thermostat_id: ThermostatId,
    ) -> Self {
        let mut sensor = Self {
            base: CoordinatorEntity::new(
                coordinator,
                config_entry,
                product_serial_number,
                reference,
            ),
            thermostat_id,
            native_value: None,
        };
        sensor.update_attrs();
        sensor
    }

    pub fn thermostat_id(&self) -> &ThermostatId {
        &self.thermostat_id
    }

    pub fn product_serial_number(&self) -> &str {
        self.base.product_serial_number()
    }

    pub fn reference(&self) -> &str {
        self.base.reference()
    }

    /// Last observed temperature, in °C.
    pub fn native_value(&self) -> Option<f64> {
        self.native_value
    }

    pub fn device_class(&self) -> SensorDeviceClass {
        SensorDeviceClass::Temperature
    }

    pub fn native_unit_of_measurement(&self) -> &'static str {
        TEMP_CELSIUS
    }

    /// Connect to the engine so state changes get published.
    pub fn attach(&mut self, sink: Arc<dyn StateSink>) {
        self.base.attach(sink);
    }

    pub fn sensor_state(&self) -> SensorState {
        SensorState {
            value: self.native_value,
            name: self.name(),
            device_class: Some(self.device_class()),
            unit_of_measurement: Some(self.native_unit_of_measurement().to_string()),
        }
    }

    /// Publish the current state. Returns whether the entity was attached.
    pub fn write_state(&self) -> bool {
        self.base.write_state(self.entity_id(), self.sensor_state())
    }

    /// Copy the current temperature from the snapshot. A missing record leaves
    /// the previous value in place.
    fn update_attrs(&mut self) {
        let data = self.base.coordinator().data();
        if let Some(thermostat) =
            find_thermostat(&data, self.base.product_serial_number(), &self.thermostat_id)
        {
            self.native_value = Some(thermostat.current_temperature);
        }
    }
}

impl<C: Coordinator> CoordinatorListener for AldesConnectSensor<C> {
    fn handle_coordinator_update(&mut self) {
        self.update_attrs();
        self.write_state();
    }
}

impl<C: Coordinator> Entity for AldesConnectSensor<C> {
    fn unique_id(&self) -> String {
        format!(
            "{}_{}_{}_temperature",
            DOMAIN,
            self.base.product_serial_number(),
            self.thermostat_id
        )
    }

    fn name(&self) -> Option<String> {
        let data = self.base.coordinator().data();
        find_thermostat(&data, self.base.product_serial_number(), &self.thermostat_id)
            .map(|t| format!("{} temperature", t.name))
    }

    fn platform(&self) -> &'static str {
        "sensor"
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(DeviceInfo {
            identifiers: BTreeSet::from([(DOMAIN.to_string(), self.thermostat_id.to_string())]),
            manufacturer: Some(MANUFACTURER.to_string()),
            model: None,
            name: Some(format!("Thermostat {}", self.thermostat_id)),
        })
    }

    fn state_json(&self) -> serde_json::Value {
        serde_json::json!({
            "entity_id": self.entity_id(),
            "unique_id": self.unique_id(),
            "platform": self.platform(),
            "config_entry": self.base.config_entry().entry_id,
            "reference": self.base.reference(),
            "state": self.sensor_state(),
        })
    }
}
