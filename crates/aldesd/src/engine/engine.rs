use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::device::Device;
use super::device::DeviceInfo;
use super::event::Event;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::State;
use crate::engine::IntegrationContext;

/// aldesd engine
///
/// This structure handles the flow of events, sending commands to the correct
/// integration, and maintaining a view of the world with State and the device registry.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Device registry, keyed by device id
    devices: std::sync::Mutex<HashMap<String, Device>>,

    /// Map of entity_id -> device id, for unlinking on removal
    entity_devices: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,

    /// Fan-out of automation-level events
    event_tx: broadcast::Sender<Event>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

/// Events kept per subscriber before a slow one starts lagging
const EVENT_CHANNEL_SIZE: usize = 256;

fn boxed_error(kind: std::io::ErrorKind, msg: String) -> Box<dyn Error + Send> {
    Box::new(std::io::Error::new(kind, msg))
}

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            devices: std::sync::Mutex::new(HashMap::new()),
            entity_devices: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
            event_tx,
        }
    }

    /// Receive every `Event` the engine emits from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Register integrations from configuration
    ///
    /// Walks the integration registry; each factory decides from the config
    /// whether its integration is enabled.
    pub fn register_integrations_from_config(&mut self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.insert(name.clone(), to_integration_tx);
        }

        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        if let Ok(mut handles) = self.integration_handles.lock() {
            handles.push(handle);
        }
    }

    /// Send a command to the named integration
    pub fn send_to_integration(
        &self,
        integration: &str,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        let channels = self
            .integration_channels
            .lock()
            .map_err(|e| boxed_error(std::io::ErrorKind::Other, e.to_string()))?;

        let tx = channels.get(integration).ok_or_else(|| {
            boxed_error(
                std::io::ErrorKind::NotFound,
                format!("Integration channel not found: {}", integration),
            )
        })?;

        tx.send(msg)
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
    }

    /// Hand a freshly fetched data snapshot to one config entry of an integration
    pub fn refresh_snapshot(
        &self,
        integration: &str,
        entry_id: String,
        data: serde_json::Value,
    ) -> Result<(), Box<dyn Error + Send>> {
        self.send_to_integration(
            integration,
            ToIntegrationMessage::RefreshSnapshot { entry_id, data },
        )
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            if let Err(e) = self.handle_event(msg).await {
                warn!("Error handling event: {}", e);
            }
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Close every integration channel and wait for the integrations to shut down.
    pub async fn close(&self) {
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }

        let handles: Vec<JoinHandle<()>> = match self.integration_handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(_) => Vec::new(),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// All registered devices, sorted by id
    pub fn devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = match self.devices.lock() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Link an entity to the device described by `info`, creating the device if needed.
    fn upsert_device(&self, entity_id: &str, info: &DeviceInfo) {
        let Ok(mut devices) = self.devices.lock() else {
            return;
        };

        let device_id = match devices.values_mut().find(|d| d.matches(info)) {
            Some(device) => {
                device.merge(info);
                device.add_entity(entity_id.to_string());
                device.id.clone()
            }
            None => {
                let Some(mut device) = Device::from_info(info) else {
                    debug!("Entity {} reported device info without identifiers", entity_id);
                    return;
                };
                info!("Device registered: {} ({})", device.name, device.id);
                device.add_entity(entity_id.to_string());
                let id = device.id.clone();
                devices.insert(id.clone(), device);
                id
            }
        };

        if let Ok(mut map) = self.entity_devices.lock() {
            map.insert(entity_id.to_string(), device_id);
        }
    }

    /// Handle an event from an integration
    async fn handle_event(&self, msg: FromIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                unique_id,
                integration_name,
                device,
            } => {
                info!(
                    "Entity discovered: {} (unique_id={}, from {})",
                    entity_id, unique_id, integration_name
                );

                // State is not populated until the first state-change message arrives.
                if let Some(info) = device {
                    self.upsert_device(&entity_id, &info);
                }
            }
            FromIntegrationMessage::EntityRemoved { entity_id } => {
                info!("Entity removed: {}", entity_id);

                {
                    let mut state = State::clone(&self.state.load());
                    state.sensors.remove(&entity_id);
                    self.state.store(Arc::new(state));
                }

                let device_id = self
                    .entity_devices
                    .lock()
                    .ok()
                    .and_then(|mut map| map.remove(&entity_id));
                if let Some(device_id) = device_id {
                    if let Ok(mut devices) = self.devices.lock() {
                        if let Some(device) = devices.get_mut(&device_id) {
                            device.remove_entity(&entity_id);
                        }
                    }
                }
            }
            FromIntegrationMessage::SensorStateChanged { entity_id, state } => {
                debug!(
                    "Sensor state changed: {} -> {:?} {}",
                    entity_id,
                    state.value,
                    state.unit_of_measurement.as_deref().unwrap_or("")
                );

                {
                    let mut snapshot = State::clone(&self.state.load());
                    snapshot.sensors.insert(entity_id.clone(), state.clone());
                    self.state.store(Arc::new(snapshot));
                }

                if self
                    .event_tx
                    .send(Event::SensorStateChanged { entity_id, state })
                    .is_err()
                {
                    trace!("No event subscribers");
                }
            }
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;

    use super::*;
    use crate::engine::SensorState;

    fn thermostat_info(id: &str) -> DeviceInfo {
        DeviceInfo {
            identifiers: BTreeSet::from([("aldesconnect".to_string(), id.to_string())]),
            manufacturer: Some("Aldes".to_string()),
            model: None,
            name: Some(format!("Thermostat {}", id)),
        }
    }

    #[tokio::test]
    async fn test_sensor_state_changed_updates_snapshot() {
        let engine = Engine::new();
        let state = SensorState {
            value: Some(21.5),
            ..Default::default()
        };

        engine
            .handle_event(FromIntegrationMessage::SensorStateChanged {
                entity_id: "sensor.a".to_string(),
                state: state.clone(),
            })
            .await
            .unwrap();

        let snapshot = engine.state_snapshot();
        assert_eq!(snapshot.sensors.get("sensor.a"), Some(&state));
    }

    #[tokio::test]
    async fn test_sensor_state_changed_emits_event() {
        let engine = Engine::new();
        let mut events = engine.subscribe_events();
        let state = SensorState {
            value: Some(19.0),
            ..Default::default()
        };

        engine
            .handle_event(FromIntegrationMessage::SensorStateChanged {
                entity_id: "sensor.b".to_string(),
                state: state.clone(),
            })
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            Event::SensorStateChanged {
                entity_id,
                state: emitted,
            } => {
                assert_eq!(entity_id, "sensor.b");
                assert_eq!(emitted, state);
            }
        }
    }

    #[tokio::test]
    async fn test_sensor_state_changed_without_subscribers() {
        let engine = Engine::new();
        engine
            .handle_event(FromIntegrationMessage::SensorStateChanged {
                entity_id: "sensor.c".to_string(),
                state: SensorState::default(),
            })
            .await
            .unwrap();
        assert!(engine.state_snapshot().sensors.contains_key("sensor.c"));
    }

    #[tokio::test]
    async fn test_discovery_groups_entities_by_device() {
        let engine = Engine::new();
        for entity_id in ["sensor.a", "sensor.b"] {
            engine
                .handle_event(FromIntegrationMessage::EntityDiscovered {
                    entity_id: entity_id.to_string(),
                    unique_id: entity_id.to_string(),
                    integration_name: "test".to_string(),
                    device: Some(thermostat_info("1")),
                })
                .await
                .unwrap();
        }

        let devices = engine.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "aldesconnect:1");
        assert_eq!(devices[0].entity_ids, vec!["sensor.a", "sensor.b"]);
    }

    #[tokio::test]
    async fn test_entity_removed_clears_state_and_device_link() {
        let engine = Engine::new();
        engine
            .handle_event(FromIntegrationMessage::EntityDiscovered {
                entity_id: "sensor.a".to_string(),
                unique_id: "a".to_string(),
                integration_name: "test".to_string(),
                device: Some(thermostat_info("1")),
            })
            .await
            .unwrap();
        engine
            .handle_event(FromIntegrationMessage::SensorStateChanged {
                entity_id: "sensor.a".to_string(),
                state: SensorState::default(),
            })
            .await
            .unwrap();
        engine
            .handle_event(FromIntegrationMessage::EntityRemoved {
                entity_id: "sensor.a".to_string(),
            })
            .await
            .unwrap();

        assert!(engine.state_snapshot().sensors.is_empty());
        assert!(engine.devices()[0].entity_ids.is_empty());
    }

    #[test]
    fn test_send_to_unknown_integration_fails() {
        let engine = Engine::new();
        let result = engine.refresh_snapshot("missing", "entry".to_string(), serde_json::json!([]));
        assert!(result.is_err());
    }

    /// Integration that records every command it is sent.
    struct Recorder {
        seen: Arc<std::sync::Mutex<Vec<ToIntegrationMessage>>>,
        shut_down: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Integration for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn setup(&mut self, _tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            self.seen.lock().unwrap().push(msg);
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            self.shut_down
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_commands_reach_integration_and_close_shuts_down() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let shut_down = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut engine = Engine::new();
        engine.register_integration(
            "recorder".to_string(),
            Box::new(Recorder {
                seen: seen.clone(),
                shut_down: shut_down.clone(),
            }),
        );

        engine
            .refresh_snapshot("recorder", "entry".to_string(), serde_json::json!([]))
            .unwrap();
        engine.close().await;

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(shut_down.load(std::sync::atomic::Ordering::SeqCst));
    }
}
