use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ConfigEntry;
use super::DOMAIN;
use super::Error;
use super::coordinator::Coordinator;
use super::coordinator::DataUpdateCoordinator;
use super::coordinator::ListenerId;
use super::entity::StateBuffer;
use super::entity::subscribe_entity;
use super::model;
use super::model::Product;
use super::sensor;
use super::sensor::AldesConnectSensor;
use crate::config::AldesConnectConfig;
use crate::engine::Entity;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

/// Type alias for a sensor shared between the integration and its coordinator listener
type SensorHandle = Arc<Mutex<AldesConnectSensor<DataUpdateCoordinator>>>;

/// Everything set up for one config entry
struct LoadedEntry {
    entry: ConfigEntry,
    coordinator: Arc<DataUpdateCoordinator>,
    sensors: Vec<SensorHandle>,
    listeners: Vec<ListenerId>,
}

/// AldesConnect integration for aldesd
///
/// Owns one coordinator per config entry and the temperature sensors built
/// from its snapshot. Snapshots arrive from outside, either from the entry's
/// `products_file` at startup or through `ToIntegrationMessage::RefreshSnapshot`.
pub struct AldesConnectIntegration {
    config: AldesConnectConfig,
    entries: HashMap<String, LoadedEntry>,
    states: Arc<StateBuffer>,
    to_engine: Option<FromIntegrationSender>,
}

impl AldesConnectIntegration {
    pub fn new(config: &AldesConnectConfig) -> Self {
        Self {
            config: config.clone(),
            entries: HashMap::new(),
            states: Arc::new(StateBuffer::new()),
            to_engine: None,
        }
    }

    /// Coordinator of a loaded config entry
    pub fn coordinator(&self, entry_id: &str) -> Option<&Arc<DataUpdateCoordinator>> {
        self.entries.get(entry_id).map(|e| &e.coordinator)
    }

    /// Number of sensors registered for a config entry
    pub fn sensor_count(&self, entry_id: &str) -> usize {
        self.entries.get(entry_id).map_or(0, |e| e.sensors.len())
    }

    /// Set up one config entry from an initial snapshot
    ///
    /// Runs sensor discovery, then adds every sensor: attach it to the state
    /// buffer, report it, publish its first state and subscribe it to refreshes.
    async fn load_entry(
        &mut self,
        entry: ConfigEntry,
        products: Vec<Product>,
        tx: &FromIntegrationSender,
    ) -> Result<usize, Error> {
        let coordinator = Arc::new(DataUpdateCoordinator::new(entry.entry_id.clone(), products));

        let mut batch = Vec::new();
        sensor::setup_entry(coordinator.clone(), &entry, |sensors| batch = sensors);

        let mut sensors = Vec::with_capacity(batch.len());
        let mut listeners = Vec::with_capacity(batch.len());
        for mut sensor in batch {
            sensor.attach(self.states.clone());

            tx.send(FromIntegrationMessage::EntityDiscovered {
                entity_id: sensor.entity_id(),
                unique_id: sensor.unique_id(),
                integration_name: DOMAIN.to_string(),
                device: sensor.device_info(),
            })
            .await
            .map_err(|_| Error::EngineClosed)?;
            sensor.write_state();
            self.states.flush(tx).await?;

            let handle = Arc::new(Mutex::new(sensor));
            listeners.push(subscribe_entity(&handle, coordinator.as_ref()));
            sensors.push(handle);
        }

        let count = sensors.len();
        info!(
            "[{}] AldesConnect entry '{}' ready with {} sensor(s)",
            entry.entry_id, entry.title, count
        );

        self.entries.insert(
            entry.entry_id.clone(),
            LoadedEntry {
                entry,
                coordinator,
                sensors,
                listeners,
            },
        );
        Ok(count)
    }

    /// Replace an entry's snapshot, then send every state the refresh published.
    async fn refresh(&self, entry_id: &str, data: serde_json::Value) -> Result<(), Error> {
        let loaded = self
            .entries
            .get(entry_id)
            .ok_or_else(|| Error::UnknownEntry(entry_id.to_string()))?;

        let products = model::products_from_value(data)?;
        debug!(
            "[{}] refreshing snapshot with {} product(s)",
            loaded.entry.entry_id,
            products.len()
        );
        loaded.coordinator.set_data(products);

        match &self.to_engine {
            Some(tx) => {
                let sent = self.states.flush(tx).await?;
                debug!("[{}] published {} state(s)", loaded.entry.entry_id, sent);
                Ok(())
            }
            None => Err(Error::EngineClosed),
        }
    }
}

#[async_trait]
impl Integration for AldesConnectIntegration {
    fn name(&self) -> &str {
        DOMAIN
    }

    async fn setup(
        &mut self,
        tx: FromIntegrationSender,
    ) -> Result<(), Box<dyn StdError + Send>> {
        self.to_engine = Some(tx.clone());

        let entries = self.config.entries.clone();
        for (entry_id, entry_config) in entries {
            let products = match &entry_config.products_file {
                Some(path) => match model::load_products(path) {
                    Ok(products) => products,
                    Err(e) => {
                        warn!("[{}] Skipping entry, snapshot unusable: {}", entry_id, e);
                        if let Some(source) = e.source() {
                            warn!("[{}] Caused by: {}", entry_id, source);
                        }
                        continue;
                    }
                },
                None => Vec::new(),
            };

            let title = entry_config.title.unwrap_or_else(|| entry_id.clone());
            self.load_entry(ConfigEntry::new(entry_id, title), products, &tx)
                .await
                .map_err(Error::boxed)?;
        }

        info!(
            "AldesConnect integration setup complete ({} entr(y/ies))",
            self.entries.len()
        );
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn StdError + Send>> {
        match msg {
            ToIntegrationMessage::RefreshSnapshot { entry_id, data } => {
                self.refresh(&entry_id, data).await.map_err(Error::boxed)
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn StdError + Send>> {
        info!("AldesConnect integration shutting down");

        for (entry_id, loaded) in self.entries.drain() {
            for id in &loaded.listeners {
                loaded.coordinator.unsubscribe(*id);
            }

            if let Some(tx) = &self.to_engine {
                for sensor in &loaded.sensors {
                    let Ok(sensor) = sensor.lock() else {
                        continue;
                    };
                    let entity_id = sensor.entity_id();
                    if tx
                        .try_send(FromIntegrationMessage::EntityRemoved { entity_id })
                        .is_err()
                    {
                        debug!("[{}] engine gone, not reporting removals", entry_id);
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}
